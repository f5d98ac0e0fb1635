//! virtnet configuration.
//!
//! Loaded from `<home>/config.yaml`, where home is `$VIRTNET_HOME` or
//! `~/.virtnet`. Every field has a default so a missing file is valid.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{NetError, Result};

/// Environment variable overriding the virtnet home directory.
pub const HOME_ENV: &str = "VIRTNET_HOME";

/// Polling cadence: wait `delay_ms`, then probe at most every `interval_ms`
/// until `timeout_ms` has elapsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollConfig {
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,

    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,

    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_delay_ms() -> u64 {
    5_000
}

fn default_interval_ms() -> u64 {
    3_000
}

fn default_timeout_ms() -> u64 {
    60_000
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            delay_ms: default_delay_ms(),
            interval_ms: default_interval_ms(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl PollConfig {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.timeout_ms == 0 {
            return Err(NetError::ConfigError(
                "poll timeout must be greater than zero".to_string(),
            ));
        }
        if self.interval_ms == 0 {
            return Err(NetError::ConfigError(
                "poll interval must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VirtnetConfig {
    /// Hypervisor connection URI (e.g. "qemu:///system"). `None` uses the
    /// virsh default.
    #[serde(default)]
    pub connect_uri: Option<String>,

    /// virsh executable.
    #[serde(default = "default_virsh_path")]
    pub virsh_path: PathBuf,

    /// Waiting for a created network to become active.
    #[serde(default)]
    pub create_poll: PollConfig,

    /// Waiting for a deleted network to disappear.
    #[serde(default)]
    pub delete_poll: PollConfig,
}

fn default_virsh_path() -> PathBuf {
    PathBuf::from("virsh")
}

impl Default for VirtnetConfig {
    fn default() -> Self {
        Self {
            connect_uri: None,
            virsh_path: default_virsh_path(),
            create_poll: PollConfig::default(),
            delete_poll: PollConfig::default(),
        }
    }
}

impl VirtnetConfig {
    /// Load from a YAML file. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let data = std::fs::read_to_string(path)?;
        let config: VirtnetConfig = serde_yaml::from_str(&data).map_err(|e| {
            NetError::ConfigError(format!("failed to parse {}: {}", path.display(), e))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `<home>/config.yaml`.
    pub fn load_default() -> Result<Self> {
        Self::load(&home_dir()?.join("config.yaml"))
    }

    pub fn validate(&self) -> Result<()> {
        self.create_poll.validate()?;
        self.delete_poll.validate()
    }
}

/// The virtnet home directory: `$VIRTNET_HOME`, else `~/.virtnet`.
pub fn home_dir() -> Result<PathBuf> {
    if let Ok(home) = std::env::var(HOME_ENV) {
        return Ok(PathBuf::from(home));
    }

    dirs::home_dir()
        .map(|h| h.join(".virtnet"))
        .ok_or_else(|| NetError::ConfigError("cannot determine home directory".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_poll_config_defaults() {
        let poll = PollConfig::default();
        assert_eq!(poll.delay(), Duration::from_secs(5));
        assert_eq!(poll.interval(), Duration::from_secs(3));
        assert_eq!(poll.timeout(), Duration::from_secs(60));
        assert!(poll.validate().is_ok());
    }

    #[test]
    fn test_poll_config_validate() {
        let zero_timeout = PollConfig {
            timeout_ms: 0,
            ..Default::default()
        };
        assert!(zero_timeout.validate().is_err());

        let zero_interval = PollConfig {
            interval_ms: 0,
            ..Default::default()
        };
        assert!(zero_interval.validate().is_err());
    }

    #[test]
    fn test_load_missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = VirtnetConfig::load(&dir.path().join("config.yaml")).unwrap();
        assert_eq!(config, VirtnetConfig::default());
        assert_eq!(config.virsh_path, PathBuf::from("virsh"));
    }

    #[test]
    fn test_load_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(
            &path,
            "connect_uri: qemu:///system\ndelete_poll:\n  timeout_ms: 120000\n",
        )
        .unwrap();

        let config = VirtnetConfig::load(&path).unwrap();
        assert_eq!(config.connect_uri.as_deref(), Some("qemu:///system"));
        assert_eq!(config.delete_poll.timeout_ms, 120_000);
        assert_eq!(config.delete_poll.delay_ms, 5_000);
        assert_eq!(config.create_poll, PollConfig::default());
    }

    #[test]
    fn test_load_malformed_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "create_poll: [not, a, map]\n").unwrap();
        assert!(matches!(
            VirtnetConfig::load(&path),
            Err(NetError::ConfigError(_))
        ));
    }

    #[test]
    fn test_load_rejects_zero_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "create_poll:\n  timeout_ms: 0\n").unwrap();
        assert!(VirtnetConfig::load(&path).is_err());
    }
}
