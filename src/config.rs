//! Host configuration loaded via Figment.
//!
//! Configuration is loaded from:
//! 1. sensord.toml file (base configuration)
//! 2. Environment variables (prefixed with SENSORD_)
//!
//! Every field has a default, so the host also runs with no config file at
//! all.
//!
//! # Environment Variable Overrides
//!
//! ```text
//! SENSORD_HOST_LOG_LEVEL=debug
//! SENSORD_PLUGINS_EXTERNAL_DIR=/var/lib/sensord/plugins
//! ```

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::AppResult;

/// Top-level host configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct HostConfig {
    /// Runtime settings
    #[serde(default)]
    pub host: HostSection,
    /// Plugin discovery and activation settings
    #[serde(default)]
    pub plugins: PluginsSection,
}

/// Runtime settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostSection {
    /// Logging level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Cadence of the monitor loop that drives manual-update plugins
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
    /// Settle delay before the first tick of each plugin update loop
    #[serde(default = "default_settle_delay")]
    pub settle_delay_ms: u64,
    /// Optional upper bound on waiting for a plugin's update loop to stop.
    ///
    /// Absent means wait indefinitely; a stalled plugin then stalls its own
    /// stop, never the rest of the host.
    #[serde(default)]
    pub stop_timeout_ms: Option<u64>,
}

/// Plugin discovery and activation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginsSection {
    /// Directory of plugins shipped with the host
    #[serde(default = "default_bundled_dir")]
    pub bundled_dir: PathBuf,
    /// Folder names accepted inside the bundled directory
    #[serde(default)]
    pub bundled_allow: Vec<String>,
    /// Directory of user-installed plugins (also where installer archives
    /// are dropped)
    #[serde(default = "default_external_dir")]
    pub external_dir: PathBuf,
    /// Filename prefix required of installer archives
    #[serde(default = "default_archive_prefix")]
    pub archive_prefix: String,
    /// Plugins whose name or id contains any of these substrings
    /// (case-insensitive) are never started
    #[serde(default)]
    pub deny_list: Vec<String>,
    /// File recording user-deactivated plugin binaries, one path per line
    #[serde(default = "default_deactivated_file")]
    pub deactivated_file: PathBuf,
    /// Rolling-average window for sensor entries of bundled plugins
    #[serde(default = "default_sensor_window")]
    pub sensor_window: usize,
}

impl Default for HostSection {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            poll_interval_ms: default_poll_interval(),
            settle_delay_ms: default_settle_delay(),
            stop_timeout_ms: None,
        }
    }
}

impl Default for PluginsSection {
    fn default() -> Self {
        Self {
            bundled_dir: default_bundled_dir(),
            bundled_allow: Vec::new(),
            external_dir: default_external_dir(),
            archive_prefix: default_archive_prefix(),
            deny_list: Vec::new(),
            deactivated_file: default_deactivated_file(),
            sensor_window: default_sensor_window(),
        }
    }
}

impl HostConfig {
    /// Load configuration from sensord.toml and environment variables
    pub fn load() -> AppResult<Self> {
        Self::load_from("sensord.toml")
    }

    /// Load configuration from a specific file path
    pub fn load_from<P: AsRef<Path>>(path: P) -> AppResult<Self> {
        let config: Self = Figment::from(Serialized::defaults(HostConfig::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("SENSORD_").split("_"))
            .extract()?;
        Ok(config)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.host.poll_interval_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.host.settle_delay_ms)
    }

    pub fn stop_timeout(&self) -> Option<Duration> {
        self.host.stop_timeout_ms.map(Duration::from_millis)
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_poll_interval() -> u64 {
    100
}

fn default_settle_delay() -> u64 {
    300
}

fn default_bundled_dir() -> PathBuf {
    PathBuf::from("plugins")
}

fn default_external_dir() -> PathBuf {
    PathBuf::from("plugins-ext")
}

fn default_archive_prefix() -> String {
    "SensordPlugin".to_string()
}

fn default_deactivated_file() -> PathBuf {
    PathBuf::from("plugins-disabled.txt")
}

fn default_sensor_window() -> usize {
    crate::data::DEFAULT_SENSOR_WINDOW
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_without_file() {
        let config = HostConfig::load_from("/nonexistent/sensord.toml").unwrap();
        assert_eq!(config.host.poll_interval_ms, 100);
        assert_eq!(config.host.settle_delay_ms, 300);
        assert!(config.stop_timeout().is_none());
        assert_eq!(config.plugins.archive_prefix, "SensordPlugin");
    }

    #[test]
    fn test_file_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sensord.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            "[host]\npoll_interval_ms = 250\n\n[plugins]\ndeny_list = [\"legacy\"]"
        )
        .unwrap();

        let config = HostConfig::load_from(&path).unwrap();
        assert_eq!(config.poll_interval(), Duration::from_millis(250));
        assert_eq!(config.plugins.deny_list, vec!["legacy".to_string()]);
        // Unset fields keep their defaults.
        assert_eq!(config.host.settle_delay_ms, 300);
    }
}
