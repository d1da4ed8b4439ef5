//! Artifact builders and fake transports for integration tests.

#![allow(dead_code)]

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use printq::config::PrinterDefinition;
use printq::printer::{
    ArtifactUploader, CommandPublisher, ReportHandler, TelemetrySubscriber, TelemetrySubscription,
};
use printq::TransportError;

/// Writes a ZIP artifact with the given entries to `path`.
pub fn build_artifact(path: &Path, entries: &[(&str, &[u8])]) {
    let file = std::fs::File::create(path).expect("Failed to create artifact file");
    let mut writer = ZipWriter::new(file);
    for (name, content) in entries {
        writer
            .start_file(*name, SimpleFileOptions::default())
            .expect("Failed to start archive entry");
        writer.write_all(content).expect("Failed to write entry");
    }
    writer.finish().expect("Failed to finish archive");
}

/// A telemetry report payload with the fields the coordinator inspects,
/// plus a few unknown neighbors for schema-drift tolerance.
pub fn report_payload(gcode_state: &str, gcode_file: &str, mc_percent: Option<i64>) -> String {
    let percent = mc_percent
        .map(|p| format!("\"mc_percent\":{},", p))
        .unwrap_or_default();
    format!(
        "{{\"print\":{{\"wifi_signal\":\"-42dBm\",\"gcode_state\":\"{}\",{}\"gcode_file\":\"{}\",\"layer_num\":3}}}}",
        gcode_state, percent, gcode_file
    )
}

#[derive(Debug)]
pub struct RecordedUpload {
    pub host: String,
    pub local_path: PathBuf,
    pub remote_name: String,
}

#[derive(Default)]
pub struct FakeUploader {
    pub uploads: Mutex<Vec<RecordedUpload>>,
    pub fail: AtomicBool,
}

impl ArtifactUploader for FakeUploader {
    fn upload(
        &self,
        printer: &PrinterDefinition,
        local_path: &Path,
        remote_name: &str,
    ) -> Result<(), TransportError> {
        if self.fail.load(Ordering::Relaxed) {
            return Err(TransportError::Ftps("injected upload failure".to_string()));
        }
        self.uploads.lock().unwrap().push(RecordedUpload {
            host: printer.host.clone(),
            local_path: local_path.to_path_buf(),
            remote_name: remote_name.to_string(),
        });
        Ok(())
    }
}

#[derive(Default)]
pub struct FakePublisher {
    pub publishes: Mutex<Vec<(String, String)>>,
    pub fail: AtomicBool,
}

impl CommandPublisher for FakePublisher {
    fn publish(
        &self,
        _printer: &PrinterDefinition,
        topic: &str,
        payload: &str,
    ) -> Result<(), TransportError> {
        if self.fail.load(Ordering::Relaxed) {
            return Err(TransportError::Publish("injected publish failure".to_string()));
        }
        self.publishes
            .lock()
            .unwrap()
            .push((topic.to_string(), payload.to_string()));
        Ok(())
    }
}

struct NoopSubscription;

impl TelemetrySubscription for NoopSubscription {
    fn stop(&mut self) {}
}

/// Records subscriptions and lets a test inject telemetry into them.
#[derive(Default)]
pub struct FakeSubscriber {
    handlers: Mutex<Vec<(String, ReportHandler)>>,
}

impl FakeSubscriber {
    pub fn subscribed_topics(&self) -> Vec<String> {
        self.handlers
            .lock()
            .unwrap()
            .iter()
            .map(|(topic, _)| topic.clone())
            .collect()
    }

    /// Delivers a payload to every handler subscribed to `topic`.
    pub fn deliver(&self, topic: &str, payload: &str) {
        let handlers: Vec<ReportHandler> = self
            .handlers
            .lock()
            .unwrap()
            .iter()
            .filter(|(t, _)| t == topic)
            .map(|(_, h)| h.clone())
            .collect();
        for handler in handlers {
            handler(topic, payload);
        }
    }
}

impl TelemetrySubscriber for FakeSubscriber {
    fn subscribe(
        &self,
        _printer: &PrinterDefinition,
        topic: &str,
        handler: ReportHandler,
    ) -> Result<Box<dyn TelemetrySubscription>, TransportError> {
        self.handlers
            .lock()
            .unwrap()
            .push((topic.to_string(), handler));
        Ok(Box::new(NoopSubscription))
    }
}
