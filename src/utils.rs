//! Utility functions and helpers
//!
//! Time, hash rate formatting and logging setup used by the miner and binary.

use crate::config::LogFormat;
use std::time::Duration;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Get current timestamp in seconds since Unix epoch
pub fn current_timestamp_secs() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Compute hash rate over a time period
pub fn compute_hash_rate(hashes: u64, elapsed: Duration) -> f64 {
    if elapsed.as_secs_f64() > 0.0 {
        hashes as f64 / elapsed.as_secs_f64()
    } else {
        0.0
    }
}

/// Format hash rate as a human-readable string
pub fn format_hash_rate(hashes_per_sec: f64) -> String {
    const UNITS: &[&str] = &["H/s", "KH/s", "MH/s", "GH/s", "TH/s", "PH/s"];
    let mut rate = hashes_per_sec;
    let mut unit_index = 0;

    while rate >= 1000.0 && unit_index < UNITS.len() - 1 {
        rate /= 1000.0;
        unit_index += 1;
    }

    format!("{:.2} {}", rate, UNITS[unit_index])
}

/// Format an elapsed duration with millisecond precision
pub fn format_duration(elapsed: Duration) -> String {
    let rounded = Duration::from_millis(elapsed.as_millis() as u64);
    humantime::format_duration(rounded).to_string()
}

/// Install the global tracing subscriber
///
/// `RUST_LOG` takes precedence over `level` when set.
pub fn init_logging(level: &str, format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Json => registry
            .with(fmt::layer().json().with_thread_names(true))
            .init(),
        LogFormat::Pretty => registry
            .with(fmt::layer().pretty().with_thread_names(true))
            .init(),
        LogFormat::Plain => registry.with(fmt::layer().with_target(false)).init(),
    }
}
