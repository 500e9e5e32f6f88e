//! Prometheus metrics for permanent channel persistence.
//!
//! - `permchan_flushes_total` - Successful snapshot writes
//! - `permchan_flush_failures_total{error}` - Failed writes by stage
//! - `permchan_channels_loaded_total` - Channels recreated at startup
//! - `permchan_load_errors_total{error}` - Rejected records, dropped list
//!   entries and unreadable files
//! - `permchan_flush_interval_seconds` - Current (possibly backed-off) interval
//!
//! Recording before [`init`] is a no-op.

use crate::error::{LoadError, PersistError};
use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use std::sync::OnceLock;
use std::time::Duration;

/// Global Prometheus registry for all metrics.
pub static REGISTRY: OnceLock<Registry> = OnceLock::new();

pub fn registry() -> &'static Registry {
    REGISTRY.get_or_init(Registry::new)
}

// ========================================================================
// Counters
// ========================================================================

pub static FLUSHES: OnceLock<IntCounter> = OnceLock::new();

pub static FLUSH_FAILURES: OnceLock<IntCounterVec> = OnceLock::new();

pub static CHANNELS_LOADED: OnceLock<IntCounter> = OnceLock::new();

pub static LOAD_ERRORS: OnceLock<IntCounterVec> = OnceLock::new();

// ========================================================================
// Gauges
// ========================================================================

/// Seconds until the next flush attempt.
pub static FLUSH_INTERVAL: OnceLock<IntGauge> = OnceLock::new();

/// Initialize the Prometheus metrics registry.
///
/// Call once at startup. Later calls are harmless.
pub fn init() {
    let r = registry();

    macro_rules! register {
        ($metric:ident, $init:expr) => {
            match $init {
                Ok(m) => {
                    if let Err(e) = r.register(Box::new(m.clone())) {
                        tracing::warn!(error = %e, concat!("Failed to register metric ", stringify!($metric)));
                    }
                    let _ = $metric.set(m);
                }
                Err(e) => {
                    tracing::warn!(error = %e, concat!("Failed to create metric ", stringify!($metric)));
                }
            }
        };
    }

    register!(FLUSHES, IntCounter::new("permchan_flushes_total", "Permanent channel snapshots written"));
    register!(FLUSH_FAILURES, IntCounterVec::new(Opts::new("permchan_flush_failures_total", "Failed permanent channel snapshot writes"), &["error"]));
    register!(CHANNELS_LOADED, IntCounter::new("permchan_channels_loaded_total", "Permanent channels recreated at startup"));
    register!(LOAD_ERRORS, IntCounterVec::new(Opts::new("permchan_load_errors_total", "Permanent channel records that could not be loaded"), &["error"]));
    register!(FLUSH_INTERVAL, IntGauge::new("permchan_flush_interval_seconds", "Current permanent channel flush interval"));
}

/// Gather all metrics and encode them in Prometheus text format.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = registry().gather();
    let mut buffer = vec![];
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "Failed to encode Prometheus metrics");
        return String::new();
    }
    match String::from_utf8(buffer) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, "Prometheus metrics were not valid UTF-8");
            String::new()
        }
    }
}

#[inline]
pub fn record_flush() {
    if let Some(c) = FLUSHES.get() {
        c.inc();
    }
}

#[inline]
pub fn record_flush_failure(error: &PersistError) {
    if let Some(c) = FLUSH_FAILURES.get() {
        c.with_label_values(&[error.error_code()]).inc();
    }
}

#[inline]
pub fn record_channel_loaded() {
    if let Some(c) = CHANNELS_LOADED.get() {
        c.inc();
    }
}

#[inline]
pub fn record_load_error(error: &LoadError) {
    if let Some(c) = LOAD_ERRORS.get() {
        c.with_label_values(&[error.error_code()]).inc();
    }
}

/// List entries lost to malformed `mask setter time` triples.
#[inline]
pub fn record_dropped_list_entries(count: usize) {
    if count == 0 {
        return;
    }
    if let Some(c) = LOAD_ERRORS.get() {
        c.with_label_values(&["malformed_list_entry"])
            .inc_by(u64::try_from(count).unwrap_or(u64::MAX));
    }
}

#[inline]
pub fn set_flush_interval(interval: Duration) {
    if let Some(g) = FLUSH_INTERVAL.get() {
        g.set(i64::try_from(interval.as_secs()).unwrap_or(i64::MAX));
    }
}
