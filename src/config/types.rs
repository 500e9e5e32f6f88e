//! Core configuration types and loading.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use super::defaults::{
    MAX_BACKOFF_PERIODS, default_config_dir, default_linked_servers, default_save_period,
    default_true, default_write_version,
};
use super::duration;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Server information.
    pub server: ServerConfig,
    /// Snapshot database settings (`[permchanneldb]`).
    #[serde(default)]
    pub permchanneldb: PermChannelDbConfig,
    /// Hand-authored permanent channels (`[[permchannels]]`).
    #[serde(default)]
    pub permchannels: Vec<PermChannelBlock>,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }
}

/// Server identity configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Server name (e.g., "irc.straylight.net"); default topic setter on load.
    pub name: String,
    /// Base directory that relative file names are resolved against.
    #[serde(default = "default_config_dir")]
    pub config_dir: PathBuf,
    /// Servers currently known to this node, itself included.
    #[serde(default = "default_linked_servers")]
    pub linked_servers: usize,
}

/// `[permchanneldb]` block.
#[derive(Debug, Clone, Deserialize)]
pub struct PermChannelDbConfig {
    /// Snapshot path. Empty disables writing.
    #[serde(default)]
    pub filename: String,
    /// Persist list modes (bans, exceptions, invexes).
    #[serde(default = "default_true")]
    pub listmodes: bool,
    /// Restrict `+P` to IRC operators.
    #[serde(default = "default_true")]
    pub operonly: bool,
    /// Base flush interval.
    #[serde(default = "default_save_period", deserialize_with = "duration::deserialize")]
    pub saveperiod: Duration,
    /// Interval multiplier after a failed write. 0 and 1 disable growth.
    #[serde(default)]
    pub backoff: u8,
    /// Upper bound for the backed-off interval.
    #[serde(default, deserialize_with = "duration::deserialize_option")]
    pub maxbackoff: Option<Duration>,
    /// Snapshot format version to write (1 or 2).
    #[serde(default = "default_write_version")]
    pub writeversion: u8,
}

impl Default for PermChannelDbConfig {
    fn default() -> Self {
        Self {
            filename: String::new(),
            listmodes: true,
            operonly: true,
            saveperiod: default_save_period(),
            backoff: 0,
            maxbackoff: None,
            writeversion: default_write_version(),
        }
    }
}

impl PermChannelDbConfig {
    /// Effective backoff cap: `maxbackoff`, else 120 save periods, never
    /// below the save period itself.
    pub fn max_backoff(&self) -> Duration {
        self.maxbackoff
            .unwrap_or_else(|| self.saveperiod.saturating_mul(MAX_BACKOFF_PERIODS))
            .max(self.saveperiod)
    }

    /// Resolve `filename` against `base`. `None` when persistence is disabled.
    pub fn target_path(&self, base: &Path) -> Option<PathBuf> {
        if self.filename.is_empty() {
            return None;
        }
        let path = Path::new(&self.filename);
        if path.is_absolute() {
            Some(path.to_path_buf())
        } else {
            Some(base.join(path))
        }
    }
}

/// `[[permchannels]]` pre-seed block: a hand-written snapshot record.
///
/// List modes are given as `<listmode>list = "mask setter time ..."` keys,
/// collected into `lists`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PermChannelBlock {
    pub channel: String,
    #[serde(default)]
    pub ts: Option<i64>,
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default)]
    pub topicts: Option<i64>,
    #[serde(default)]
    pub topicsetby: Option<String>,
    #[serde(default)]
    pub modes: String,
    #[serde(flatten)]
    pub lists: BTreeMap<String, toml::Value>,
}
