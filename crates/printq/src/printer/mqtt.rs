//! MQTT transport: start-command publishing and telemetry subscriptions.
//!
//! Printers run an MQTT broker on port 8883 (TLS, self-signed certificate,
//! user `bblp` with the per-printer access code). Publishing opens a
//! short-lived connection and waits for the broker's acknowledgement; a
//! subscription owns a reader thread that feeds incoming reports to the
//! coordinator's handler for the lifetime of the process. A subscription
//! whose connection drops is not re-established here.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use log::{debug, info, warn};
use rumqttc::{Client, Event, MqttOptions, Outgoing, Packet, QoS, TlsConfiguration, Transport};

use crate::config::PrinterDefinition;
use crate::error::TransportError;

use super::{ReportHandler, TelemetrySubscriber, TelemetrySubscription};

const MQTT_PORT: u16 = 8883;
const MQTT_USER: &str = "bblp";
const ACK_TIMEOUT: Duration = Duration::from_secs(15);

static CLIENT_SEQ: AtomicU64 = AtomicU64::new(0);

pub struct MqttTransport;

fn mqtt_options(printer: &PrinterDefinition) -> Result<MqttOptions, TransportError> {
    let client_id = format!(
        "printq-{}-{}",
        std::process::id(),
        CLIENT_SEQ.fetch_add(1, Ordering::Relaxed)
    );
    let mut options = MqttOptions::new(client_id, &printer.host, MQTT_PORT);
    options.set_credentials(MQTT_USER, &printer.access_code);
    options.set_keep_alive(Duration::from_secs(30));

    let connector = native_tls::TlsConnector::builder()
        .danger_accept_invalid_certs(true)
        .danger_accept_invalid_hostnames(true)
        .build()
        .map_err(|e| TransportError::Tls(e.to_string()))?;
    options.set_transport(Transport::tls_with_config(TlsConfiguration::NativeConnector(
        connector,
    )));

    Ok(options)
}

impl super::CommandPublisher for MqttTransport {
    fn publish(
        &self,
        printer: &PrinterDefinition,
        topic: &str,
        payload: &str,
    ) -> Result<(), TransportError> {
        if printer.host.is_empty() || printer.access_code.is_empty() {
            return Err(TransportError::MissingCredentials(printer.key().to_string()));
        }

        let (client, mut connection) = Client::new(mqtt_options(printer)?, 10);
        client
            .publish(topic, QoS::AtLeastOnce, false, payload.as_bytes())
            .map_err(|e| TransportError::Publish(e.to_string()))?;

        // Drive the connection until the broker acknowledges the publish.
        let deadline = std::time::Instant::now() + ACK_TIMEOUT;
        let mut acked = false;
        for event in connection.iter() {
            match event {
                Ok(Event::Incoming(Packet::PubAck(_))) => {
                    acked = true;
                    let _ = client.disconnect();
                }
                Ok(Event::Outgoing(Outgoing::Disconnect)) => break,
                Ok(_) => {}
                Err(e) => {
                    if !acked {
                        return Err(TransportError::Publish(e.to_string()));
                    }
                    break;
                }
            }
            if !acked && std::time::Instant::now() > deadline {
                return Err(TransportError::Publish(
                    "timed out waiting for broker acknowledgement".to_string(),
                ));
            }
        }

        if acked {
            info!("Published to {}", topic);
            Ok(())
        } else {
            Err(TransportError::Publish(
                "connection closed before acknowledgement".to_string(),
            ))
        }
    }
}

impl TelemetrySubscriber for MqttTransport {
    fn subscribe(
        &self,
        printer: &PrinterDefinition,
        topic: &str,
        handler: ReportHandler,
    ) -> Result<Box<dyn TelemetrySubscription>, TransportError> {
        if printer.host.is_empty() || printer.access_code.is_empty() {
            return Err(TransportError::MissingCredentials(printer.key().to_string()));
        }

        let (client, mut connection) = Client::new(mqtt_options(printer)?, 10);
        client
            .subscribe(topic, QoS::AtMostOnce)
            .map_err(|e| TransportError::Subscribe(e.to_string()))?;

        let stop = Arc::new(AtomicBool::new(false));
        let reader_stop = Arc::clone(&stop);
        let topic_name = topic.to_string();
        let handle = std::thread::Builder::new()
            .name(format!("telemetry-{}", printer.key()))
            .spawn(move || {
                for event in connection.iter() {
                    if reader_stop.load(Ordering::Relaxed) {
                        break;
                    }
                    match event {
                        Ok(Event::Incoming(Packet::Publish(publish))) => {
                            let payload = String::from_utf8_lossy(&publish.payload).into_owned();
                            handler(&publish.topic, &payload);
                        }
                        Ok(_) => {}
                        Err(e) => {
                            if !reader_stop.load(Ordering::Relaxed) {
                                warn!("Telemetry connection for {} ended: {}", topic_name, e);
                            }
                            break;
                        }
                    }
                }
                debug!("Telemetry reader for {} stopped", topic_name);
            })
            .map_err(|e| TransportError::Subscribe(e.to_string()))?;

        info!("Subscribed to {}", topic);
        Ok(Box::new(MqttSubscription {
            client,
            stop,
            handle: Some(handle),
        }))
    }
}

struct MqttSubscription {
    client: Client,
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl TelemetrySubscription for MqttSubscription {
    fn stop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        let _ = self.client.disconnect();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for MqttSubscription {
    fn drop(&mut self) {
        self.stop();
    }
}
