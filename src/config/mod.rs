//! Configuration loading and management.
//!
//! This module is split into logical submodules:
//! - [`types`]: Core config struct definitions (Config, ServerConfig, PermChannelDbConfig)
//! - [`defaults`]: serde default value functions
//! - [`duration`]: duration strings ("5s", "1h30m")
//! - [`validation`]: startup checks

mod defaults;
pub mod duration;
mod types;
pub mod validation;

pub use types::{Config, ConfigError, PermChannelBlock, PermChannelDbConfig, ServerConfig};
