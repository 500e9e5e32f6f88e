//! Configuration validation.
//!
//! Validates configuration at startup to catch common errors early.

use super::Config;
use crate::state::is_channel_name;
use thiserror::Error;

/// Validation errors for configuration.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("server.name is required")]
    MissingServerName,
    #[error("permchanneldb.writeversion must be 1 or 2, got {0}")]
    InvalidWriteVersion(u8),
    #[error("permchanneldb.saveperiod must be at least one second")]
    ZeroSavePeriod,
    #[error("permchanneldb.filename parent directory does not exist: {0}")]
    SnapshotDirMissing(String),
    #[error("permchannels block has an invalid channel name: {0:?}")]
    InvalidSeedChannel(String),
}

/// Validate a configuration, returning all errors found.
pub fn validate(config: &Config) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.server.name.is_empty() {
        errors.push(ValidationError::MissingServerName);
    }

    let db = &config.permchanneldb;
    if !(1..=2).contains(&db.writeversion) {
        errors.push(ValidationError::InvalidWriteVersion(db.writeversion));
    }
    if db.saveperiod.as_secs() == 0 {
        errors.push(ValidationError::ZeroSavePeriod);
    }

    if let Some(path) = db.target_path(&config.server.config_dir)
        && let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
        && !parent.exists()
    {
        errors.push(ValidationError::SnapshotDirMissing(
            parent.display().to_string(),
        ));
    }

    for block in &config.permchannels {
        if !is_channel_name(&block.channel) {
            errors.push(ValidationError::InvalidSeedChannel(block.channel.clone()));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
