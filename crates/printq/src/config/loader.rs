use std::path::Path;

use log::warn;

use crate::config::schema::AppConfig;
use crate::error::ConfigError;

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<AppConfig, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content)
}

pub fn load_config_from_str(content: &str) -> Result<AppConfig, ConfigError> {
    let mut config: AppConfig = serde_json::from_str(content)?;

    // Printer entries with neither a name nor a host cannot be addressed;
    // drop them at load so downstream code never sees them.
    let before = config.printers.len();
    config
        .printers
        .retain(|p| !p.name.is_empty() || !p.host.is_empty());
    if config.printers.len() < before {
        warn!(
            "Dropped {} printer entry(ies) without name or host",
            before - config.printers.len()
        );
    }

    config.validate()?;

    Ok(config)
}
