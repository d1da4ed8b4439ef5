//! Printer coordinator.
//!
//! One session per configured printer: a telemetry subscription on the
//! device's report topic, a dispatch path that uploads the next queued job
//! and issues the start command, and reconciliation of persisted job state
//! from incoming reports. Per session, report handling and dispatch are
//! mutually exclusive; the database stays authoritative whenever the
//! in-memory `is_printing` flag disagrees.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use log::{info, warn};

use crate::config::{AppConfig, PrinterDefinition};
use crate::db::{job_repo, printer_repo, Database, DatabaseError};
use crate::db::{STATUS_COMPLETED, STATUS_PRINTING};
use crate::error::TransportError;

pub mod command;
pub mod ftps;
pub mod mqtt;
pub mod report;

pub use ftps::FtpsUploader;
pub use mqtt::MqttTransport;

/// Callback invoked with `(topic, payload)` for every telemetry message.
pub type ReportHandler = Arc<dyn Fn(&str, &str) + Send + Sync>;

/// Uploads a local artifact to the printer's storage.
pub trait ArtifactUploader: Send + Sync {
    fn upload(
        &self,
        printer: &PrinterDefinition,
        local_path: &Path,
        remote_name: &str,
    ) -> Result<(), TransportError>;
}

/// Publishes a command payload to a printer topic.
pub trait CommandPublisher: Send + Sync {
    fn publish(
        &self,
        printer: &PrinterDefinition,
        topic: &str,
        payload: &str,
    ) -> Result<(), TransportError>;
}

/// A live telemetry subscription; dropping or stopping it ends the reader.
pub trait TelemetrySubscription: Send {
    fn stop(&mut self);
}

/// Opens telemetry subscriptions on printer report topics.
pub trait TelemetrySubscriber: Send + Sync {
    fn subscribe(
        &self,
        printer: &PrinterDefinition,
        topic: &str,
        handler: ReportHandler,
    ) -> Result<Box<dyn TelemetrySubscription>, TransportError>;
}

/// Per-printer in-memory state. `is_printing` is the only state variable;
/// it is set by dispatch or a printing-like report and cleared only by a
/// completed-like report at >= 99%.
pub struct PrinterSession {
    pub definition: PrinterDefinition,
    pub printer_id: i64,
    pub is_printing: bool,
}

struct CoordinatorShared {
    db: Arc<Database>,
    jobs_dir: PathBuf,
    completed_dir: PathBuf,
    uploader: Arc<dyn ArtifactUploader>,
    publisher: Arc<dyn CommandPublisher>,
    sessions: Mutex<HashMap<String, Arc<Mutex<PrinterSession>>>>,
}

pub struct PrinterCoordinator {
    shared: Arc<CoordinatorShared>,
    subscriber: Arc<dyn TelemetrySubscriber>,
    printers: Vec<PrinterDefinition>,
    subscriptions: Vec<Box<dyn TelemetrySubscription>>,
}

impl PrinterCoordinator {
    pub fn new(
        config: &AppConfig,
        db: Arc<Database>,
        uploader: Arc<dyn ArtifactUploader>,
        publisher: Arc<dyn CommandPublisher>,
        subscriber: Arc<dyn TelemetrySubscriber>,
    ) -> Self {
        Self {
            shared: Arc::new(CoordinatorShared {
                db,
                jobs_dir: config.jobs_dir.clone(),
                completed_dir: config.completed_dir.clone(),
                uploader,
                publisher,
                sessions: Mutex::new(HashMap::new()),
            }),
            subscriber,
            printers: config.printers.clone(),
            subscriptions: Vec::new(),
        }
    }

    /// Allocates printer rows, creates one session per usable printer,
    /// subscribes to its report topic, and attempts an initial dispatch.
    pub fn start(&mut self) -> Result<(), DatabaseError> {
        if self.printers.is_empty() {
            return Ok(());
        }

        let printer_ids = printer_repo::ensure_printers(&self.shared.db, &self.printers)?;

        for printer in &self.printers {
            if printer.host.is_empty() || printer.access_code.is_empty() || printer.serial.is_empty()
            {
                warn!(
                    "Skipping printer '{}': missing host, access code, or serial",
                    printer.key()
                );
                continue;
            }

            let key = printer.key().to_string();
            let printer_id = printer_ids.get(&key).copied().unwrap_or(0);
            let session = Arc::new(Mutex::new(PrinterSession {
                definition: printer.clone(),
                printer_id,
                is_printing: false,
            }));
            lock(&self.shared.sessions).insert(key.clone(), session);

            let report_topic = format!("device/{}/report", printer.serial);
            let shared = Arc::clone(&self.shared);
            let handler_key = key.clone();
            let handler: ReportHandler = Arc::new(move |_topic, payload| {
                shared.handle_report(&handler_key, payload);
            });
            match self.subscriber.subscribe(printer, &report_topic, handler) {
                Ok(subscription) => self.subscriptions.push(subscription),
                Err(e) => warn!("Failed to subscribe to {}: {}", report_topic, e),
            }

            self.shared.dispatch_next(&key);
        }

        Ok(())
    }

    /// Attempts to dispatch the next queued job on the given session.
    pub fn dispatch_next(&self, key: &str) -> bool {
        self.shared.dispatch_next(key)
    }

    /// Stops all telemetry subscriptions. In-flight uploads and publishes
    /// run to completion on their own threads.
    pub fn stop(&mut self) {
        for subscription in &mut self.subscriptions {
            subscription.stop();
        }
        self.subscriptions.clear();
    }

    /// Current `is_printing` state of a session, if it exists.
    pub fn is_printing(&self, key: &str) -> Option<bool> {
        let session = lock(&self.shared.sessions).get(key).cloned()?;
        let session = session.lock().unwrap_or_else(PoisonError::into_inner);
        Some(session.is_printing)
    }
}

impl Drop for PrinterCoordinator {
    fn drop(&mut self) {
        self.stop();
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl CoordinatorShared {
    fn session(&self, key: &str) -> Option<Arc<Mutex<PrinterSession>>> {
        lock(&self.sessions).get(key).cloned()
    }

    fn dispatch_next(&self, key: &str) -> bool {
        let Some(session) = self.session(key) else {
            return false;
        };
        let mut session = session.lock().unwrap_or_else(PoisonError::into_inner);
        self.dispatch_session(&mut session)
    }

    /// Dispatch with the session lock held: upload the next queued job's
    /// artifact, publish the start command, then persist the assignment and
    /// status. Upload or publish failure leaves the job queued; the next
    /// telemetry-triggered reconciliation retries.
    fn dispatch_session(&self, session: &mut PrinterSession) -> bool {
        if session.is_printing {
            return true;
        }

        let job = match job_repo::get_next_queued_job(&self.db, session.printer_id) {
            Ok(Some(job)) => job,
            Ok(None) => return true,
            Err(e) => {
                warn!("Failed to query queued jobs: {}", e);
                return false;
            }
        };

        let remote_name = match job.file_path.file_name() {
            Some(name) => name.to_string_lossy().into_owned(),
            None => {
                warn!("Job {} has no usable file path", job.id);
                return false;
            }
        };

        if let Err(e) = self
            .uploader
            .upload(&session.definition, &job.file_path, &remote_name)
        {
            warn!("FTPS upload failed for job {}: {}", job.id, e);
            return false;
        }

        let payload = command::build_project_file_payload(&remote_name, job.plate_index);
        let command_topic = format!("device/{}/request", session.definition.serial);
        if let Err(e) = self
            .publisher
            .publish(&session.definition, &command_topic, &payload)
        {
            warn!("MQTT publish failed for job {}: {}", job.id, e);
            return false;
        }

        if let Err(e) = job_repo::assign_job_to_printer(&self.db, job.id, session.printer_id) {
            warn!("Failed to assign job {} to printer: {}", job.id, e);
        }
        if let Err(e) = job_repo::update_job_status(
            &self.db,
            job.id,
            STATUS_PRINTING,
            &self.jobs_dir,
            &self.completed_dir,
        ) {
            warn!("Failed to mark job {} printing: {}", job.id, e);
        }
        session.is_printing = true;
        info!(
            "Dispatched job {} to printer '{}'",
            job.id,
            session.definition.key()
        );
        true
    }

    /// Reconciles job state from one telemetry report. Reports that do not
    /// carry both `gcode_state` and `gcode_file`, or that reference no known
    /// active job, are ignored; they may belong to prints started elsewhere.
    fn handle_report(&self, key: &str, payload: &str) {
        let Some(session) = self.session(key) else {
            return;
        };
        let mut session = session.lock().unwrap_or_else(PoisonError::into_inner);

        let Some(state) = report::extract_string(payload, "gcode_state") else {
            return;
        };
        let Some(file) = report::extract_string(payload, "gcode_file") else {
            return;
        };
        let percent = report::extract_int(payload, "mc_percent");

        let file_name = Path::new(&file)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or(file.clone());
        let job_id = match job_repo::find_active_job_by_file_name(
            &self.db,
            &file_name,
            session.printer_id,
        ) {
            Ok(Some(id)) => id,
            Ok(None) => return,
            Err(e) => {
                warn!("Failed to look up job for '{}': {}", file_name, e);
                return;
            }
        };

        if report::is_printing_state(&state) {
            match job_repo::update_job_status(
                &self.db,
                job_id,
                STATUS_PRINTING,
                &self.jobs_dir,
                &self.completed_dir,
            ) {
                Ok(()) => session.is_printing = true,
                Err(e) => warn!("Failed to mark job {} printing: {}", job_id, e),
            }
            return;
        }

        // The percent guard filters transient idle reports during mid-print
        // pauses; a missing mc_percent counts as done.
        if report::is_completed_state(&state) && percent.unwrap_or(100) >= 99 {
            match job_repo::update_job_status(
                &self.db,
                job_id,
                STATUS_COMPLETED,
                &self.jobs_dir,
                &self.completed_dir,
            ) {
                Ok(()) => {
                    session.is_printing = false;
                    self.dispatch_session(&mut session);
                }
                Err(e) => warn!("Failed to mark job {} completed: {}", job_id, e),
            }
        }
    }
}
