//! Import directory watcher.
//!
//! A background thread scans the import directory on a fixed interval and
//! tracks every `*.gcode.3mf` entry it sees. A file becomes *ready* once its
//! size and modification time have been unchanged for two consecutive scans,
//! which keeps in-progress copies out of the ready set. Ready files are only
//! imported through [`ImportWatcher::import_files`]; the scan itself never
//! triggers an import.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;
use std::time::{Duration, SystemTime};

use log::{debug, warn};
use walkdir::WalkDir;

use crate::error::{ImportError, WatcherError};
use crate::importer::ArtifactImporter;

/// Default scan interval.
const SCAN_INTERVAL: Duration = Duration::from_secs(2);

/// Scans needed with unchanged size/mtime before a file counts as ready.
const STABLE_CHECKS_REQUIRED: u32 = 2;

/// A ready file offered for import.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportCandidate {
    pub path: PathBuf,
    pub display_name: String,
}

#[derive(Debug, Clone)]
struct PendingFile {
    size: u64,
    modified: Option<SystemTime>,
    stable_checks: u32,
    ready: bool,
}

pub struct ImportWatcher {
    import_dir: PathBuf,
    scan_interval: Duration,
    importer: Arc<ArtifactImporter>,
    pending: Arc<Mutex<HashMap<PathBuf, PendingFile>>>,
    shutdown: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl ImportWatcher {
    pub fn new<P: AsRef<Path>>(import_dir: P, importer: ArtifactImporter) -> Self {
        Self {
            import_dir: import_dir.as_ref().to_path_buf(),
            scan_interval: SCAN_INTERVAL,
            importer: Arc::new(importer),
            pending: Arc::new(Mutex::new(HashMap::new())),
            shutdown: Arc::new(AtomicBool::new(false)),
            handle: None,
        }
    }

    /// Overrides the scan interval (tests use a short one).
    pub fn with_scan_interval(mut self, interval: Duration) -> Self {
        self.scan_interval = interval;
        self
    }

    /// Starts the periodic scan thread. The first scan runs immediately.
    pub fn start(&mut self) -> Result<(), WatcherError> {
        if self.import_dir.as_os_str().is_empty() {
            return Err(WatcherError::MissingImportDirectory);
        }
        if self.handle.is_some() {
            return Ok(());
        }

        self.shutdown.store(false, Ordering::Relaxed);
        let import_dir = self.import_dir.clone();
        let pending = Arc::clone(&self.pending);
        let shutdown = Arc::clone(&self.shutdown);
        let interval = self.scan_interval;

        let handle = std::thread::Builder::new()
            .name("import-watcher".to_string())
            .spawn(move || {
                while !shutdown.load(Ordering::Relaxed) {
                    scan_directory(&import_dir, &pending);
                    wait_interval(&shutdown, interval);
                }
                debug!("Import watcher stopped");
            })
            .map_err(|e| WatcherError::SpawnFailed(e.to_string()))?;

        self.handle = Some(handle);
        Ok(())
    }

    /// Stops the scan thread and waits for it to exit.
    pub fn stop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }

    /// Runs one scan pass immediately. Normally driven by the background
    /// thread; exposed so callers can refresh the ready set on demand.
    pub fn scan(&self) {
        scan_directory(&self.import_dir, &self.pending);
    }

    /// Number of pending files currently ready for import.
    pub fn ready_count(&self) -> usize {
        self.lock_pending().values().filter(|p| p.ready).count()
    }

    /// All ready files, sorted case-insensitively by display name.
    pub fn ready_candidates(&self) -> Vec<ImportCandidate> {
        let mut candidates: Vec<ImportCandidate> = self
            .lock_pending()
            .iter()
            .filter(|(_, pending)| pending.ready)
            .map(|(path, _)| ImportCandidate {
                path: path.clone(),
                display_name: path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default(),
            })
            .collect();

        candidates.sort_by(|a, b| {
            a.display_name
                .to_lowercase()
                .cmp(&b.display_name.to_lowercase())
        });
        candidates
    }

    /// Imports the requested files, removing each successfully imported one
    /// from the pending set. Failures are collected per path and reported as
    /// one combined error after all paths were attempted.
    pub fn import_files(&self, paths: &[PathBuf]) -> Result<(), ImportError> {
        let mut failures = Vec::new();
        let mut attempted = 0;

        for path in paths {
            if path.as_os_str().is_empty() {
                continue;
            }
            attempted += 1;

            match self.importer.import_file(path) {
                Ok(()) => {
                    self.lock_pending().remove(path);
                }
                Err(e) => {
                    warn!("Failed to import {}: {}", path.display(), e);
                    failures.push(format!("{}: {}", path.display(), e));
                }
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(ImportError::Batch {
                failed: failures.len(),
                total: attempted,
                details: failures.join("; "),
            })
        }
    }

    fn lock_pending(&self) -> std::sync::MutexGuard<'_, HashMap<PathBuf, PendingFile>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for ImportWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

fn is_artifact_file(path: &Path) -> bool {
    path.file_name()
        .map(|n| n.to_string_lossy().to_lowercase().ends_with(".gcode.3mf"))
        .unwrap_or(false)
}

fn scan_directory(import_dir: &Path, pending: &Mutex<HashMap<PathBuf, PendingFile>>) {
    let mut seen: Vec<(PathBuf, u64, Option<SystemTime>)> = Vec::new();

    for entry in WalkDir::new(import_dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        if !entry.file_type().is_file() || !is_artifact_file(path) {
            continue;
        }

        match entry.metadata() {
            Ok(metadata) => {
                seen.push((path.to_path_buf(), metadata.len(), metadata.modified().ok()));
            }
            Err(e) => {
                debug!("Skipping {} during scan: {}", path.display(), e);
            }
        }
    }

    let mut pending = pending.lock().unwrap_or_else(PoisonError::into_inner);

    for (path, size, modified) in &seen {
        let entry = pending.entry(path.clone()).or_insert(PendingFile {
            size: *size,
            modified: *modified,
            stable_checks: 0,
            ready: false,
        });

        if entry.stable_checks == 0 {
            entry.size = *size;
            entry.modified = *modified;
            entry.stable_checks = 1;
        } else if entry.size == *size && entry.modified == *modified {
            entry.stable_checks += 1;
        } else {
            entry.size = *size;
            entry.modified = *modified;
            entry.stable_checks = 1;
        }

        if entry.stable_checks >= STABLE_CHECKS_REQUIRED {
            entry.ready = true;
        }
    }

    // Files removed or renamed out of the import directory drop off the map.
    pending.retain(|path, _| seen.iter().any(|(seen_path, _, _)| seen_path == path));
}

fn wait_interval(shutdown: &AtomicBool, interval: Duration) {
    let step = Duration::from_millis(50);
    let mut waited = Duration::ZERO;
    while waited < interval && !shutdown.load(Ordering::Relaxed) {
        let chunk = (interval - waited).min(step);
        std::thread::sleep(chunk);
        waited += chunk;
    }
}
