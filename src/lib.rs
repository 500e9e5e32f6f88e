//! slircd-permchan - permanent channel persistence for slircd-ng.
//!
//! Channels carrying the permanent mode (`+P`) survive a restart: their
//! creation time, topic, modes and access lists are flushed to a snapshot
//! file on a timer and replayed into the channel registry at startup.

pub mod config;
pub mod error;
pub mod metrics;
pub mod permchan;
pub mod state;
