//! Dashboard configuration: TOML file with serde defaults, plus
//! environment overrides for deployment-specific values.

use std::env;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{DashError, DashResult};

/// Parse an environment variable as a typed value with a default fallback.
fn env_var_or_default<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DashConfig {
    /// Base URL of the monitoring backend.
    pub backend_url: String,
    /// Fixed delay before a single reconnect attempt per disconnect.
    pub reconnect_backoff_secs: u64,
    /// Cadence of the one-shot status poll while the metrics stream is down.
    pub fallback_poll_secs: u64,
    /// TUI tick rate in milliseconds.
    pub tick_ms: u64,
    /// Rolling window sizes.
    pub time_series_capacity: usize,
    pub log_capacity: usize,
    pub failover_history_capacity: usize,
    /// Keep the log view pinned to the newest line.
    pub auto_scroll_logs: bool,
}

impl Default for DashConfig {
    fn default() -> Self {
        Self {
            backend_url: env_var_or_default(
                "HADASH_URL",
                "http://localhost:8000".to_string(),
            ),
            reconnect_backoff_secs: 5,
            fallback_poll_secs: 15,
            tick_ms: 250,
            time_series_capacity: 50,
            log_capacity: 1000,
            failover_history_capacity: 20,
            auto_scroll_logs: true,
        }
    }
}

impl DashConfig {
    pub fn load(path: &Path) -> DashResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: DashConfig = toml::from_str(&raw).map_err(|e| DashError::Configuration {
            message: format!("failed to parse {}: {e}", path.display()),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path` when given, otherwise fall back to defaults.
    pub fn load_or_default(path: Option<&Path>) -> DashResult<Self> {
        match path {
            Some(path) => Self::load(path),
            None => {
                let config = Self::default();
                config.validate()?;
                Ok(config)
            }
        }
    }

    pub fn validate(&self) -> DashResult<()> {
        for (name, value) in [
            ("time_series_capacity", self.time_series_capacity),
            ("log_capacity", self.log_capacity),
            ("failover_history_capacity", self.failover_history_capacity),
        ] {
            if value == 0 {
                return Err(DashError::Configuration {
                    message: format!("{name} must be at least 1"),
                });
            }
        }
        if self.tick_ms == 0 {
            return Err(DashError::Configuration {
                message: "tick_ms must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    pub fn reconnect_backoff(&self) -> Duration {
        Duration::from_secs(self.reconnect_backoff_secs)
    }

    pub fn fallback_poll(&self) -> Duration {
        Duration::from_secs(self.fallback_poll_secs)
    }

    pub fn tick_rate(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_match_observed_capacities() {
        let config = DashConfig::default();
        assert_eq!(config.reconnect_backoff_secs, 5);
        assert_eq!(config.time_series_capacity, 50);
        assert_eq!(config.log_capacity, 1000);
        assert_eq!(config.failover_history_capacity, 20);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_file_overrides_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "backend_url = \"http://dashboard:9000\"\nfallback_poll_secs = 30"
        )
        .unwrap();

        let config = DashConfig::load(file.path()).unwrap();
        assert_eq!(config.backend_url, "http://dashboard:9000");
        assert_eq!(config.fallback_poll_secs, 30);
        // Untouched fields keep their defaults.
        assert_eq!(config.time_series_capacity, 50);
    }

    #[test]
    fn zero_capacity_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "log_capacity = 0").unwrap();
        assert!(matches!(
            DashConfig::load(file.path()),
            Err(DashError::Configuration { .. })
        ));
    }
}
