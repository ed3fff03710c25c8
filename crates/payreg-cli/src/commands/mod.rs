//! CLI subcommands.

pub mod config;
pub mod extract;
pub mod run;

use std::path::{Path, PathBuf};

use payreg_core::PayregConfig;

/// `<config dir>/payreg/config.json`.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("payreg")
        .join("config.json")
}

/// Configuration from `--config`, else the default file if it exists, else
/// built-in defaults.
pub fn load_config(config_path: Option<&Path>) -> anyhow::Result<PayregConfig> {
    if let Some(path) = config_path {
        return PayregConfig::from_file(path).map_err(|e| {
            anyhow::anyhow!("Failed to read config {}: {}", path.display(), e)
        });
    }

    let default_path = default_config_path();
    if default_path.exists() {
        Ok(PayregConfig::from_file(&default_path)?)
    } else {
        Ok(PayregConfig::default())
    }
}
