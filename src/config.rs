use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::connection::{DISCONNECT_AFTER, PROBE_INTERVAL};
use crate::error::{Error, Result};
use crate::tabs::{DEFAULT_CAPACITY, DEFAULT_MAX_AGE};

pub const CONFIG_FILE: &str = "config.toml";
pub const HOME_ENV: &str = "CR_ASSISTANT_HOME";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Loopback port of the panel HTTP surface.
    pub port: u16,
    pub request_timeout_secs: u64,
    /// How long to wait for the extension to answer, and how long without a
    /// confirming signal before the page is considered disconnected.
    pub page_timeout_secs: u64,
    pub probe_interval_ms: u64,
    pub tab_max_age_secs: u64,
    pub tab_capacity: usize,
    pub sweep_interval_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 58421,
            request_timeout_secs: 30,
            page_timeout_secs: DISCONNECT_AFTER.as_secs(),
            probe_interval_ms: PROBE_INTERVAL.as_millis() as u64,
            tab_max_age_secs: DEFAULT_MAX_AGE.as_secs(),
            tab_capacity: DEFAULT_CAPACITY,
            sweep_interval_secs: 60,
        }
    }
}

impl Config {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn page_timeout(&self) -> Duration {
        Duration::from_secs(self.page_timeout_secs)
    }

    pub fn probe_interval(&self) -> Duration {
        Duration::from_millis(self.probe_interval_ms.max(1))
    }

    pub fn tab_max_age(&self) -> Duration {
        Duration::from_secs(self.tab_max_age_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }
}

/// `$CR_ASSISTANT_HOME`, or `~/.cr-assistant`. Created if missing.
pub fn get_config_dir() -> Result<PathBuf> {
    let path = match std::env::var_os(HOME_ENV) {
        Some(dir) => PathBuf::from(dir),
        None => dirs::home_dir()
            .ok_or_else(|| Error::Config("cannot determine home directory".to_string()))?
            .join(".cr-assistant"),
    };
    if !path.exists() {
        fs::create_dir_all(&path)?;
    }
    Ok(path)
}

/// Reads `config.toml` from `dir`, writing the defaults on first run.
/// A malformed file is reported and replaced by defaults in memory only.
pub fn load_config(dir: &Path) -> Result<Config> {
    let path = dir.join(CONFIG_FILE);

    if path.exists() {
        let content = fs::read_to_string(&path)?;
        Ok(toml::from_str(&content).unwrap_or_else(|e| {
            tracing::warn!("error parsing {}: {}. Using defaults.", path.display(), e);
            Config::default()
        }))
    } else {
        let config = Config::default();
        fs::write(&path, toml::to_string_pretty(&config)?)?;
        tracing::info!("wrote default config to {}", path.display());
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_run_writes_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(dir.path()).unwrap();
        assert_eq!(config, Config::default());

        let written = fs::read_to_string(dir.path().join(CONFIG_FILE)).unwrap();
        assert!(written.contains("port = 58421"));
        assert!(written.contains("tab_capacity = 20"));
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(CONFIG_FILE), "port = 9000\npage_timeout_secs = 2\n").unwrap();
        let config = load_config(dir.path()).unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.page_timeout(), Duration::from_secs(2));
        assert_eq!(config.tab_max_age(), Duration::from_secs(1800));
    }

    #[test]
    fn test_malformed_file_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(CONFIG_FILE), "port = \"not a number\"").unwrap();
        assert_eq!(load_config(dir.path()).unwrap(), Config::default());
    }
}
