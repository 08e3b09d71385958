//! Speed test session sequencing
//!
//! A session runs identity → latency → download → upload and pushes a
//! fresh `TestResult` snapshot into a channel at every step. The last
//! snapshot always has phase `Complete`, however degraded the network.

use crate::{
    error::Result,
    identity::NetworkIdentityResolver,
    latency::LatencyProbe,
    logging::{ErrorEventLogger, LoggerFactory, PhaseLogger},
    models::{Config, LatencyStats, TestResult, TransferSummary},
    stats,
    transfer::TransferEngine,
    types::{TestPhase, TransferDirection},
};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

/// Drives one speed test per `start_test` call
#[derive(Clone)]
pub struct TestSessionOrchestrator {
    config: Config,
    identity: NetworkIdentityResolver,
    latency: LatencyProbe,
    transfer: TransferEngine,
}

impl TestSessionOrchestrator {
    pub fn new(
        config: Config,
        identity: NetworkIdentityResolver,
        latency: LatencyProbe,
        transfer: TransferEngine,
    ) -> Self {
        Self {
            config,
            identity,
            latency,
            transfer,
        }
    }

    /// Validate `config` and build every component from it
    pub fn from_config(config: Config) -> Result<Self> {
        config.validate()?;
        Ok(Self::new(
            config.clone(),
            NetworkIdentityResolver::from_config(&config)?,
            LatencyProbe::from_config(&config)?,
            TransferEngine::from_config(&config)?,
        ))
    }

    /// Start a session in the background and return its snapshot stream.
    ///
    /// The stream ends after the `Complete` snapshot. Dropping the
    /// receiver stops the session at the next phase boundary.
    pub fn start_test(&self) -> UnboundedReceiver<TestResult> {
        let (tx, rx) = mpsc::unbounded_channel();
        let session = self.clone();
        tokio::spawn(async move { session.run_session(tx).await });
        rx
    }

    async fn run_session(self, tx: UnboundedSender<TestResult>) {
        let factory = LoggerFactory::new(self.config.clone());
        let mut phases = factory.create_phase_logger().await;
        let errors = factory.create_error_logger().await;

        // Component loggers were built with the orchestrator; tag them with this session
        for logger in [self.identity.logger(), self.latency.logger(), self.transfer.logger()] {
            logger.set_session_id(factory.session_id().to_string()).await;
        }

        let mut snapshot = TestResult::new(factory.session_id().to_string());

        // Identity
        snapshot = snapshot.advance(TestPhase::Identity, "Resolving network identity...");
        if !emit(&tx, &snapshot) {
            return;
        }
        phases.start_phase(TestPhase::Identity).await;
        let identity = self.identity.resolve().await;
        phases.end_phase(TestPhase::Identity, !identity.is_offline()).await;
        snapshot.identity = Some(identity);

        // Latency
        snapshot = snapshot.advance(TestPhase::Latency, "Measuring ping...");
        if !emit(&tx, &snapshot) {
            return;
        }
        phases.start_phase(TestPhase::Latency).await;
        let latency = match self.latency.measure(&self.config.ping_url, self.config.ping_attempts).await {
            Ok(latency) => latency,
            Err(e) => {
                errors.record(&e, "Latency phase").await;
                LatencyStats::offline()
            }
        };
        phases.end_phase(TestPhase::Latency, !latency.is_offline()).await;
        snapshot.latency = Some(latency);

        for direction in [TransferDirection::Download, TransferDirection::Upload] {
            let phase = TestPhase::from(direction);
            snapshot = snapshot.advance(phase, format!("Testing {} speed...", direction));
            if !emit(&tx, &snapshot) {
                return;
            }

            phases.start_phase(phase).await;
            let summary = self.run_transfer(direction, &snapshot, &tx, &errors).await;
            phases.end_phase(phase, summary.total_bytes > 0).await;

            snapshot = snapshot.with_speed(direction, summary.into());
        }

        let status = complete_status(&snapshot);
        report_headline(&phases, &snapshot).await;
        emit(&tx, &snapshot.advance(TestPhase::Complete, status));
    }

    async fn run_transfer(
        &self,
        direction: TransferDirection,
        base: &TestResult,
        tx: &UnboundedSender<TestResult>,
        errors: &ErrorEventLogger,
    ) -> TransferSummary {
        let result = self
            .transfer
            .run(
                direction,
                self.config.transfer_duration_ms,
                self.config.parallel_connections,
                self.config.tick_ms,
                |sample| {
                    let _ = tx.send(base.with_speed(direction, sample.into()));
                },
            )
            .await;

        match result {
            Ok(summary) => summary,
            Err(e) => {
                errors.record(&e, &format!("{} phase", direction)).await;
                TransferSummary::empty(direction, self.config.transfer_duration_ms)
            }
        }
    }
}

/// Send a snapshot; false once nobody is listening
fn emit(tx: &UnboundedSender<TestResult>, snapshot: &TestResult) -> bool {
    tx.send(snapshot.clone()).is_ok()
}

fn complete_status(snapshot: &TestResult) -> String {
    let offline = snapshot.latency.map_or(true, |l| l.is_offline())
        && snapshot.download.average_mbps == 0.0
        && snapshot.upload.average_mbps == 0.0;
    if offline {
        "Test complete (no connectivity)".to_string()
    } else {
        "Test complete".to_string()
    }
}

async fn report_headline(phases: &PhaseLogger, snapshot: &TestResult) {
    let mut entry = phases
        .logger()
        .info(&format!(
            "Session finished: down {}, up {}",
            stats::format_speed(snapshot.download.average_mbps),
            stats::format_speed(snapshot.upload.average_mbps)
        ))
        .field("session_id", &snapshot.session_id)
        .field("download_mbps", snapshot.download.average_mbps)
        .field("upload_mbps", snapshot.upload.average_mbps);
    if let Some(latency) = &snapshot.latency {
        entry = entry.latency(latency);
    }
    entry.log().await;
}
