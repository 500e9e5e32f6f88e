//! Default value functions for configuration.
//!
//! Separated into its own module for clarity and reuse.

use std::path::PathBuf;
use std::time::Duration;

/// Returns `true` (for serde defaults).
pub fn default_true() -> bool {
    true
}

// =============================================================================
// Server Defaults
// =============================================================================

pub fn default_config_dir() -> PathBuf {
    PathBuf::from(".")
}

/// This server alone.
pub fn default_linked_servers() -> usize {
    1
}

// =============================================================================
// Permanent Channel Database Defaults
// =============================================================================

pub fn default_save_period() -> Duration {
    Duration::from_secs(5)
}

pub fn default_write_version() -> u8 {
    2
}

/// Multiplier applied to the save period when `maxbackoff` is not set.
pub const MAX_BACKOFF_PERIODS: u32 = 120;
