//! Statistical helpers for latency and throughput figures

use crate::models::metrics::SpeedSample;
use std::time::Duration;

/// Smallest value, 0 for an empty slice
pub fn min(values: &[f64]) -> f64 {
    values.iter().copied().fold(None, |acc: Option<f64>, v| match acc {
        Some(current) if current <= v => Some(current),
        _ => Some(v),
    })
    .unwrap_or(0.0)
}

/// Arithmetic mean, 0 for an empty slice
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Mean absolute difference between consecutive values.
///
/// Needs at least two values; anything shorter yields 0.
pub fn mean_successive_difference(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }

    let total: f64 = values
        .windows(2)
        .map(|pair| (pair[1] - pair[0]).abs())
        .sum();

    total / (values.len() - 1) as f64
}

/// `part` as a percentage of `whole`, 0 when `whole` is 0
pub fn percentage(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    part as f64 / whole as f64 * 100.0
}

/// Convert a byte count moved over `seconds` into megabits per second
pub fn bytes_to_mbps(bytes: u64, seconds: f64) -> f64 {
    if seconds <= 0.0 {
        return 0.0;
    }
    (bytes as f64 * 8.0) / (seconds * 1_000_000.0)
}

/// Human-readable speed with precision that shrinks as the value grows
pub fn format_speed(mbps: f64) -> String {
    if mbps >= 1000.0 {
        format!("{:.1} Gbps", mbps / 1000.0)
    } else if mbps >= 100.0 {
        format!("{:.0} Mbps", mbps)
    } else if mbps >= 10.0 {
        format!("{:.1} Mbps", mbps)
    } else {
        format!("{:.2} Mbps", mbps)
    }
}

/// Rolling throughput figures for one transfer phase.
///
/// Fed with the cumulative byte counter at every tick; keeps the previous
/// total to derive the per-tick delta and the running peak.
#[derive(Debug, Clone)]
pub struct ThroughputTracker {
    tick: Duration,
    last_total: u64,
    peak_mbps: f64,
    samples: u32,
}

impl ThroughputTracker {
    pub fn new(tick: Duration) -> Self {
        Self {
            tick,
            last_total: 0,
            peak_mbps: 0.0,
            samples: 0,
        }
    }

    /// Record the counter value observed `elapsed` after the phase started
    pub fn record(&mut self, total_bytes: u64, elapsed: Duration) -> SpeedSample {
        let delta = total_bytes.saturating_sub(self.last_total);
        self.last_total = total_bytes;

        let instantaneous_mbps = bytes_to_mbps(delta, self.tick.as_secs_f64());
        if instantaneous_mbps > self.peak_mbps {
            self.peak_mbps = instantaneous_mbps;
        }
        self.samples += 1;

        SpeedSample {
            instantaneous_mbps,
            peak_mbps: self.peak_mbps,
            average_mbps: bytes_to_mbps(total_bytes, elapsed.as_secs_f64()),
        }
    }

    pub fn peak_mbps(&self) -> f64 {
        self.peak_mbps
    }

    pub fn samples(&self) -> u32 {
        self.samples
    }
}
