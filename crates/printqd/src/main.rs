use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::mpsc;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use printq::printer::{FtpsUploader, MqttTransport};
use printq::{AppConfig, ArtifactImporter, Database, ImportWatcher, PrinterCoordinator};

/// Print queue daemon: watches an import directory, persists jobs, and
/// dispatches them to networked printers.
#[derive(Debug, Parser)]
#[command(name = "printqd", version, about)]
struct Args {
    /// Path to the JSON config file. Defaults to <base-dir>/config.json.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Base directory for data, jobs, completed, and import directories.
    #[arg(long, default_value = "/var/lib/printq")]
    base_dir: PathBuf,
}

fn main() -> ExitCode {
    // Bridge log:: macros from the core library into tracing.
    if let Err(e) = tracing_log::LogTracer::init() {
        eprintln!("Failed to initialize log bridge: {}", e);
        return ExitCode::FAILURE;
    }
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return ExitCode::FAILURE;
    }

    info!("Starting printqd v{}", env!("CARGO_PKG_VERSION"));

    match run(Args::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> printq::Result<()> {
    let config = load_or_default_config(&args)?;
    config.ensure_directories()?;

    let db = Arc::new(Database::initialize(&config.data_dir)?);

    let importer = ArtifactImporter::new(&config.jobs_dir, Arc::clone(&db));
    let mut watcher = ImportWatcher::new(&config.import_dir, importer);
    watcher.start()?;

    let mqtt = Arc::new(MqttTransport);
    let mqtt_publisher: Arc<dyn printq::printer::CommandPublisher> = Arc::clone(&mqtt) as _;
    let mqtt_subscriber: Arc<dyn printq::printer::TelemetrySubscriber> = mqtt;
    let mut coordinator = PrinterCoordinator::new(
        &config,
        Arc::clone(&db),
        Arc::new(FtpsUploader),
        mqtt_publisher,
        mqtt_subscriber,
    );
    coordinator.start()?;

    info!(
        "Watching {} for artifacts; {} printer(s) configured",
        config.import_dir.display(),
        config.printers.len()
    );

    wait_for_shutdown();

    info!("Shutting down");
    coordinator.stop();
    watcher.stop();
    Ok(())
}

fn load_or_default_config(args: &Args) -> Result<AppConfig, printq::ConfigError> {
    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| args.base_dir.join("config.json"));

    if config_path.exists() {
        info!("Loading config from {}", config_path.display());
        printq::load_config(&config_path)
    } else {
        warn!(
            "No config file at {}; using defaults under {}",
            config_path.display(),
            args.base_dir.display()
        );
        let config = AppConfig::with_base_dir(&args.base_dir);
        write_default_config(&config_path, &config);
        Ok(config)
    }
}

/// Writes the derived defaults back so the operator has a file to edit.
/// Failure is non-fatal.
fn write_default_config(path: &std::path::Path, config: &AppConfig) {
    if let Some(parent) = path.parent() {
        if let Err(e) = std::fs::create_dir_all(parent) {
            warn!("Could not create {}: {}", parent.display(), e);
            return;
        }
    }
    match serde_json::to_string_pretty(config) {
        Ok(json) => {
            if let Err(e) = std::fs::write(path, json) {
                warn!("Could not write default config to {}: {}", path.display(), e);
            }
        }
        Err(e) => warn!("Could not serialize default config: {}", e),
    }
}

fn wait_for_shutdown() {
    let (tx, rx) = mpsc::channel();
    if let Err(e) = ctrlc::set_handler(move || {
        let _ = tx.send(());
    }) {
        warn!("Could not install signal handler ({}); running until killed", e);
        loop {
            std::thread::park();
        }
    }
    let _ = rx.recv();
}
