//! Defines all configuration structures for the Cinescape engine.
//!
//! These structs are deserialized through the `config` crate, layering an
//! optional TOML file and `CINESCAPE_*` environment variables over the
//! defaults. This allows timer cadence and the storage location to be defined
//! externally from the application code.

use crate::error::Result;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// The top-level configuration for the `RoomEngine`.
#[derive(Debug, Clone, Deserialize)]
pub struct RoomConfig {
    /// Defaults applied to timers created through the engine.
    #[serde(default)]
    pub timer: TimerConfig,

    /// Where entity records are persisted.
    #[serde(default)]
    pub storage: StorageConfig,

    /// The default `tracing` filter used by the binaries.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Defaults for engine-created timers.
#[derive(Debug, Clone, Deserialize)]
pub struct TimerConfig {
    /// Milliseconds between two ticks.
    #[serde(default = "default_speed_ms")]
    pub speed_ms: u64,
    /// How much `time` advances per tick.
    #[serde(default = "default_step")]
    pub step: i64,
    /// The time, in seconds, at which a level timer stops.
    #[serde(default = "default_stop_time")]
    pub stop_time: i64,
    #[serde(default)]
    pub autostart: bool,
}

impl TimerConfig {
    pub fn speed(&self) -> Duration {
        Duration::from_millis(self.speed_ms)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StorageConfig {
    /// JSON file backing the store. In-memory storage is used when unset.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl RoomConfig {
    /// Loads the configuration from an optional TOML file and the environment.
    ///
    /// Environment variables use the `CINESCAPE_` prefix and `__` between
    /// nested keys, e.g. `CINESCAPE_TIMER__SPEED_MS=250`.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(false));
        }
        let config = builder
            .add_source(
                config::Environment::with_prefix("CINESCAPE")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;
        Ok(config.try_deserialize()?)
    }
}

// --- Default value functions for serde ---

fn default_log_level() -> String {
    "info".to_string()
}

fn default_speed_ms() -> u64 {
    1000
}

fn default_step() -> i64 {
    1
}

fn default_stop_time() -> i64 {
    600
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            speed_ms: default_speed_ms(),
            step: default_step(),
            stop_time: default_stop_time(),
            autostart: false,
        }
    }
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            timer: TimerConfig::default(),
            storage: StorageConfig::default(),
            log_level: default_log_level(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = RoomConfig::load(Some(&dir.path().join("absent.toml"))).unwrap();

        assert_eq!(config.timer.speed(), Duration::from_secs(1));
        assert_eq!(config.timer.step, 1);
        assert!(config.storage.path.is_none());
    }

    #[test]
    fn toml_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cinescape.toml");
        fs::write(
            &path,
            r#"
log_level = "debug"

[timer]
speed_ms = 250
stop_time = 90

[storage]
path = "/tmp/cinescape.json"
"#,
        )
        .unwrap();

        let config = RoomConfig::load(Some(&path)).unwrap();

        assert_eq!(config.log_level, "debug");
        assert_eq!(config.timer.speed_ms, 250);
        assert_eq!(config.timer.stop_time, 90);
        assert_eq!(config.timer.step, 1);
        assert_eq!(
            config.storage.path.as_deref(),
            Some(Path::new("/tmp/cinescape.json"))
        );
    }
}
