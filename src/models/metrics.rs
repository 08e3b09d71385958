//! Measurement data models: latency statistics, throughput samples and
//! the session snapshot handed to the presentation layer

use crate::stats;
use crate::types::{TestPhase, TransferDirection};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// RTT reported when no probe succeeded
pub const OFFLINE_RTT_MS: f64 = 999.0;

/// Latency statistics computed once from a fixed-size batch of probes
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatencyStats {
    pub min_rtt_ms: f64,
    pub avg_rtt_ms: f64,
    /// Mean absolute difference between consecutive successful RTTs
    pub jitter_ms: f64,
    /// Failed probes as a share of attempts, in [0, 100]
    pub loss_percent: f64,
}

impl LatencyStats {
    /// Sentinel used when every probe failed
    pub fn offline() -> Self {
        Self {
            min_rtt_ms: OFFLINE_RTT_MS,
            avg_rtt_ms: OFFLINE_RTT_MS,
            jitter_ms: 0.0,
            loss_percent: 100.0,
        }
    }

    /// Build statistics from the RTTs of successful probes, in probe order.
    ///
    /// `attempts` is the number of probes sent (warm-up excluded). Every
    /// attempt without an RTT counts as lost.
    pub fn from_rtts(rtts_ms: &[f64], attempts: u32) -> Self {
        if rtts_ms.is_empty() || attempts == 0 {
            return Self::offline();
        }

        let successes = rtts_ms.len().min(attempts as usize);
        let failures = attempts as usize - successes;

        Self {
            min_rtt_ms: stats::min(rtts_ms),
            avg_rtt_ms: stats::mean(rtts_ms),
            jitter_ms: stats::mean_successive_difference(rtts_ms),
            loss_percent: stats::percentage(failures as u64, attempts as u64),
        }
    }

    /// True when this is the all-probes-failed sentinel
    pub fn is_offline(&self) -> bool {
        self.loss_percent >= 100.0
    }

    /// Ping figure shown to users (minimum RTT, rounded)
    pub fn ping_ms(&self) -> u32 {
        self.min_rtt_ms.round() as u32
    }
}

/// One throughput sample taken at a tick of a running transfer
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpeedSample {
    /// Per-tick delta rate
    pub instantaneous_mbps: f64,
    /// Highest instantaneous rate seen so far in this phase
    pub peak_mbps: f64,
    /// Cumulative rate since the phase started
    pub average_mbps: f64,
}

/// Outcome of one complete transfer phase
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TransferSummary {
    pub direction: TransferDirection,
    /// `total_bytes * 8 / duration` in Mbps
    pub average_mbps: f64,
    pub peak_mbps: f64,
    pub total_bytes: u64,
    pub duration_ms: u64,
    /// Number of samples reported during the phase
    pub samples: u32,
}

impl TransferSummary {
    /// Summary of a phase that never moved any data
    pub fn empty(direction: TransferDirection, duration_ms: u64) -> Self {
        Self {
            direction,
            average_mbps: 0.0,
            peak_mbps: 0.0,
            total_bytes: 0,
            duration_ms,
            samples: 0,
        }
    }
}

/// Current / peak / average speed for one direction, as shown in a snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SpeedFigures {
    pub current_mbps: f64,
    pub peak_mbps: f64,
    pub average_mbps: f64,
}

impl From<SpeedSample> for SpeedFigures {
    fn from(sample: SpeedSample) -> Self {
        Self {
            current_mbps: sample.instantaneous_mbps,
            peak_mbps: sample.peak_mbps,
            average_mbps: sample.average_mbps,
        }
    }
}

impl From<TransferSummary> for SpeedFigures {
    fn from(summary: TransferSummary) -> Self {
        Self {
            current_mbps: summary.average_mbps,
            peak_mbps: summary.peak_mbps,
            average_mbps: summary.average_mbps,
        }
    }
}

/// Public address and operator name of the network the test runs on
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkIdentity {
    pub ip: String,
    pub isp: String,
}

impl NetworkIdentity {
    pub const OFFLINE_IP: &'static str = "Offline";
    pub const OFFLINE_ISP: &'static str = "Check Connection";

    /// Sentinel returned whenever the lookup fails
    pub fn offline() -> Self {
        Self {
            ip: Self::OFFLINE_IP.to_string(),
            isp: Self::OFFLINE_ISP.to_string(),
        }
    }

    pub fn is_offline(&self) -> bool {
        self.ip == Self::OFFLINE_IP && self.isp == Self::OFFLINE_ISP
    }
}

/// Snapshot of a running speed test session.
///
/// Each emission is a fresh value; the orchestrator never mutates one
/// after sending it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestResult {
    pub session_id: String,
    pub phase: TestPhase,
    /// Human-readable description of the active step
    pub status: String,
    pub identity: Option<NetworkIdentity>,
    pub latency: Option<LatencyStats>,
    pub download: SpeedFigures,
    pub upload: SpeedFigures,
    pub timestamp: DateTime<Utc>,
}

impl TestResult {
    /// Create the first snapshot of a session
    pub fn new(session_id: String) -> Self {
        Self {
            session_id,
            phase: TestPhase::Identity,
            status: String::new(),
            identity: None,
            latency: None,
            download: SpeedFigures::default(),
            upload: SpeedFigures::default(),
            timestamp: Utc::now(),
        }
    }

    /// Copy of this snapshot moved to another phase with a new status line
    pub fn advance(&self, phase: TestPhase, status: impl Into<String>) -> Self {
        Self {
            phase,
            status: status.into(),
            timestamp: Utc::now(),
            ..self.clone()
        }
    }

    /// Copy of this snapshot with fresh figures for one direction
    pub fn with_speed(&self, direction: TransferDirection, figures: SpeedFigures) -> Self {
        let mut next = self.clone();
        match direction {
            TransferDirection::Download => next.download = figures,
            TransferDirection::Upload => next.upload = figures,
        }
        next.timestamp = Utc::now();
        next
    }

    pub fn is_terminal(&self) -> bool {
        self.phase.is_terminal()
    }
}
