mod config;
pub mod database;

pub use config::{Config, PlannerConfig, SyncConfig, TimerConfig};
pub use database::{Database, SessionRecord, Stats};

use std::path::PathBuf;

use crate::error::ConfigError;

/// Returns the data directory, creating it if needed.
///
/// `TIMORA_DATA_DIR` wins when set. Otherwise `~/.config/timora/`, or
/// `~/.config/timora-dev/` with `TIMORA_ENV=dev`.
///
/// # Errors
/// Returns `ConfigError::DataDir` if the directory cannot be created.
pub fn data_dir() -> Result<PathBuf, ConfigError> {
    let dir = match std::env::var_os("TIMORA_DATA_DIR") {
        Some(dir) if !dir.is_empty() => PathBuf::from(dir),
        _ => {
            let base_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config");
            let env = std::env::var("TIMORA_ENV").unwrap_or_else(|_| "production".to_string());
            if env == "dev" {
                base_dir.join("timora-dev")
            } else {
                base_dir.join("timora")
            }
        }
    };

    std::fs::create_dir_all(&dir)
        .map_err(|e| ConfigError::DataDir(format!("{}: {e}", dir.display())))?;
    Ok(dir)
}
