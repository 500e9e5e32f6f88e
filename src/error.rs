//! Unified error handling for slircd-permchan.
//!
//! Nothing in this crate is fatal to the host: flush errors are retried with
//! backoff and load errors skip the offending record or item.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

// ============================================================================
// Persistence Errors (flush path)
// ============================================================================

/// Errors raised while writing the snapshot file.
///
/// The previous snapshot is never touched when any of these occur; the
/// temporary file may be left behind.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("cannot create database {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot write to new database {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot replace old database {} with new database {}: {source}", to.display(), from.display())]
    Rename {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl PersistError {
    /// Get a static error code string for metrics labeling.
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Open { .. } => "open_failed",
            Self::Write { .. } => "write_failed",
            Self::Rename { .. } => "rename_failed",
        }
    }
}

// ============================================================================
// Load Errors (startup replay)
// ============================================================================

/// Per-record and per-item problems found while replaying a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    #[error("invalid channel name: {0:?}")]
    InvalidName(String),

    #[error("malformed record on line {line}: {reason}")]
    MalformedRecord { line: usize, reason: String },

    #[error("unresolvable mode {letter:?} on {channel}")]
    UnresolvableMode { channel: String, letter: char },

    #[error("snapshot {} unavailable: {reason}", path.display())]
    DecodeUnavailable { path: PathBuf, reason: String },
}

impl LoadError {
    /// Get a static error code string for metrics labeling.
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidName(_) => "invalid_name",
            Self::MalformedRecord { .. } => "malformed_record",
            Self::UnresolvableMode { .. } => "unresolvable_mode",
            Self::DecodeUnavailable { .. } => "decode_unavailable",
        }
    }
}

// ============================================================================
// Channel Errors (registry operations)
// ============================================================================

/// Channel registry errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChannelError {
    #[error("no such channel: {0}")]
    NoSuchChannel(String),

    #[error("channel already exists: {0}")]
    ChannelExists(String),

    #[error("invalid channel name: {0}")]
    InvalidName(String),

    #[error("unknown mode: {0}")]
    UnknownMode(char),

    #[error("mode {0} is already registered")]
    DuplicateMode(char),

    #[error("mode {0} needs a parameter")]
    NeedsParam(char),

    #[error("mode {0} may only be set by IRC operators")]
    OperOnly(char),

    #[error("channel {0} may not be deleted")]
    DeleteDenied(String),
}
