//! Parallel bulk transfer engine
//!
//! A phase runs `parallelism` workers against one endpoint for a fixed
//! wall-clock duration. Workers share a single atomic byte counter and
//! keep opening new connections until the deadline; a coordinator on the
//! calling task samples the counter every tick.
//!
//! Two aggregation policies are used and never mixed:
//! - the live `instantaneous_mbps` is the per-tick delta over the nominal
//!   tick length
//! - every `average_mbps` (live and final) is cumulative bytes over
//!   elapsed time; the final one uses the nominal phase duration

pub mod http;

pub use http::HttpTransport;

use crate::{
    error::{AppError, Result},
    logging::Logger,
    models::{Config, SpeedSample, TransferSummary},
    stats::{self, ThroughputTracker},
    types::TransferDirection,
};
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::{sleep_until, Instant, MissedTickBehavior};

/// How long cancelled workers get to unwind before they are abandoned
const CANCEL_GRACE: Duration = Duration::from_millis(250);

/// Pause before a worker reconnects after a connection that failed or moved nothing
const RECONNECT_BACKOFF: Duration = Duration::from_millis(50);

/// Byte counter shared by every worker of one phase.
///
/// A handle from [`ByteCounter::for_connection`] also keeps a private
/// tally, so a worker can tell whether its own connection moved anything.
#[derive(Debug, Clone, Default)]
pub struct ByteCounter {
    phase: Arc<AtomicU64>,
    connection: Arc<AtomicU64>,
}

impl ByteCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle that adds to the same phase total with a fresh connection tally
    pub fn for_connection(&self) -> Self {
        Self {
            phase: Arc::clone(&self.phase),
            connection: Arc::default(),
        }
    }

    pub fn add(&self, bytes: u64) {
        self.phase.fetch_add(bytes, Ordering::Relaxed);
        self.connection.fetch_add(bytes, Ordering::Relaxed);
    }

    /// Bytes moved by every connection of the phase
    pub fn total(&self) -> u64 {
        self.phase.load(Ordering::Relaxed)
    }

    /// Bytes moved through this handle
    pub fn connection_bytes(&self) -> u64 {
        self.connection.load(Ordering::Relaxed)
    }
}

/// Moves bytes over one connection.
///
/// Implementations add every chunk to `counter` as it is read or
/// produced, and return once the connection ends, fails, or `deadline`
/// passes. The engine calls this again for as long as the phase runs.
#[async_trait]
pub trait TransferTransport: Send + Sync {
    async fn run_connection(
        &self,
        direction: TransferDirection,
        deadline: Instant,
        counter: &ByteCounter,
    ) -> Result<()>;
}

/// Drives one download or upload phase
#[derive(Clone)]
pub struct TransferEngine {
    transport: Arc<dyn TransferTransport>,
    logger: Logger,
}

impl TransferEngine {
    pub fn new(transport: Arc<dyn TransferTransport>, logger: Logger) -> Self {
        Self { transport, logger }
    }

    pub fn logger(&self) -> &Logger {
        &self.logger
    }

    /// Build an engine over HTTP using the endpoints in `config`
    pub fn from_config(config: &Config) -> Result<Self> {
        let transport = HttpTransport::from_config(config)?;
        Ok(Self::new(
            Arc::new(transport),
            Logger::with_config("TRANSFER".to_string(), config),
        ))
    }

    /// Run one phase and return its summary.
    ///
    /// `on_sample` is called exactly `duration_ms / tick_ms` times, in tick
    /// order, from the calling task. Worker failures never end the phase.
    pub async fn run<F>(
        &self,
        direction: TransferDirection,
        duration_ms: u64,
        parallelism: usize,
        tick_ms: u64,
        mut on_sample: F,
    ) -> Result<TransferSummary>
    where
        F: FnMut(SpeedSample) + Send,
    {
        if duration_ms == 0 || tick_ms == 0 {
            return Err(AppError::validation("Transfer duration and tick must be greater than 0"));
        }
        if tick_ms > duration_ms {
            return Err(AppError::validation("Tick interval cannot exceed the transfer duration"));
        }
        if parallelism == 0 {
            return Err(AppError::validation("Transfer needs at least one connection"));
        }

        let duration = Duration::from_millis(duration_ms);
        let tick = Duration::from_millis(tick_ms);
        let counter = ByteCounter::new();
        let start = Instant::now();
        let deadline = start + duration;

        self.logger
            .info(&format!("Starting {} phase", direction))
            .field("direction", direction.as_str())
            .field("duration_ms", duration_ms)
            .field("parallelism", parallelism)
            .field("tick_ms", tick_ms)
            .log()
            .await;

        let mut workers = JoinSet::new();
        for worker_id in 0..parallelism {
            workers.spawn(worker_loop(
                worker_id,
                Arc::clone(&self.transport),
                direction,
                deadline,
                counter.clone(),
                self.logger.clone(),
            ));
        }

        let mut tracker = ThroughputTracker::new(tick);
        let mut interval = tokio::time::interval_at(start + tick, tick);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        for tick_index in 1..=duration_ms / tick_ms {
            interval.tick().await;
            let sample = tracker.record(counter.total(), start.elapsed());
            self.logger
                .trace(&format!("{} tick {}", direction, tick_index))
                .sample(&sample)
                .log()
                .await;
            on_sample(sample);
        }

        sleep_until(deadline).await;
        let total_bytes = counter.total();

        workers.abort_all();
        let _ = tokio::time::timeout(CANCEL_GRACE, async {
            while workers.join_next().await.is_some() {}
        })
        .await;
        // Whatever is still running is detached here; dropping the set aborts it.
        drop(workers);

        let summary = TransferSummary {
            direction,
            average_mbps: stats::bytes_to_mbps(total_bytes, duration.as_secs_f64()),
            peak_mbps: tracker.peak_mbps(),
            total_bytes,
            duration_ms,
            samples: tracker.samples(),
        };

        self.logger
            .info(&format!(
                "{} finished: avg {}, peak {}",
                direction,
                stats::format_speed(summary.average_mbps),
                stats::format_speed(summary.peak_mbps)
            ))
            .field("direction", direction.as_str())
            .field("total_bytes", total_bytes)
            .field("average_mbps", summary.average_mbps)
            .field("peak_mbps", summary.peak_mbps)
            .field("samples", summary.samples)
            .log()
            .await;

        Ok(summary)
    }
}

async fn worker_loop(
    worker_id: usize,
    transport: Arc<dyn TransferTransport>,
    direction: TransferDirection,
    deadline: Instant,
    counter: ByteCounter,
    logger: Logger,
) {
    let mut connections = 0u32;
    while Instant::now() < deadline {
        connections += 1;
        let connection = counter.for_connection();
        match transport.run_connection(direction, deadline, &connection).await {
            Ok(()) if connection.connection_bytes() > 0 => continue,
            Ok(()) => {
                crate::log_debug!(logger, "Worker {} connection {} closed without data", worker_id, connections);
            }
            Err(e) => {
                crate::log_debug!(logger, "Worker {} connection {} ended: {}", worker_id, connections, e);
            }
        }
        sleep_until((Instant::now() + RECONNECT_BACKOFF).min(deadline)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Adds `chunk` bytes every `every` until the deadline
    struct ConstantRate {
        chunk: u64,
        every: Duration,
    }

    #[async_trait]
    impl TransferTransport for ConstantRate {
        async fn run_connection(
            &self,
            _direction: TransferDirection,
            deadline: Instant,
            counter: &ByteCounter,
        ) -> Result<()> {
            while Instant::now() < deadline {
                tokio::time::sleep(self.every).await;
                counter.add(self.chunk);
            }
            Ok(())
        }
    }

    /// Every connection fails immediately
    struct Refusing;

    #[async_trait]
    impl TransferTransport for Refusing {
        async fn run_connection(
            &self,
            _direction: TransferDirection,
            _deadline: Instant,
            _counter: &ByteCounter,
        ) -> Result<()> {
            Err(AppError::network("connection refused"))
        }
    }

    /// Delivers a short burst and then closes the connection
    struct ShortLived;

    #[async_trait]
    impl TransferTransport for ShortLived {
        async fn run_connection(
            &self,
            _direction: TransferDirection,
            _deadline: Instant,
            counter: &ByteCounter,
        ) -> Result<()> {
            tokio::time::sleep(Duration::from_millis(100)).await;
            counter.add(1_000);
            Ok(())
        }
    }

    /// Accepts the connection and closes it at once without any data
    #[derive(Clone, Default)]
    struct EmptyBody(Arc<AtomicU64>);

    #[async_trait]
    impl TransferTransport for EmptyBody {
        async fn run_connection(
            &self,
            _direction: TransferDirection,
            _deadline: Instant,
            _counter: &ByteCounter,
        ) -> Result<()> {
            self.0.fetch_add(1, Ordering::Relaxed);
            Ok(())
        }
    }

    fn engine(transport: impl TransferTransport + 'static) -> TransferEngine {
        TransferEngine::new(
            Arc::new(transport),
            Logger::with_config("TRANSFER".to_string(), &Config::default()),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_constant_rate_download() {
        // 4 workers x 31_250 bytes every 10ms = 12.5 MB/s aggregate
        let engine = engine(ConstantRate { chunk: 31_250, every: Duration::from_millis(10) });

        let mut samples = Vec::new();
        let summary = engine
            .run(TransferDirection::Download, 10_000, 4, 250, |s| samples.push(s))
            .await
            .unwrap();

        assert_eq!(samples.len(), 40);
        assert_eq!(summary.samples, 40);
        assert!((summary.average_mbps - 100.0).abs() < 1.0, "average {}", summary.average_mbps);
        assert_eq!(
            summary.average_mbps,
            stats::bytes_to_mbps(summary.total_bytes, 10.0)
        );

        let mut last_peak = 0.0;
        for sample in &samples {
            assert!(sample.peak_mbps >= last_peak);
            assert!(sample.peak_mbps >= sample.instantaneous_mbps);
            last_peak = sample.peak_mbps;
        }
        assert_eq!(summary.peak_mbps, last_peak);

        // Steady state sits at the configured rate
        let middle = samples[20];
        assert!((middle.instantaneous_mbps - 100.0).abs() < 15.0);
        assert!((middle.average_mbps - 100.0).abs() < 5.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sample_count_ignores_partial_tick() {
        let engine = engine(ConstantRate { chunk: 1_000, every: Duration::from_millis(5) });
        let mut count = 0;
        let summary = engine
            .run(TransferDirection::Upload, 1_100, 2, 250, |_| count += 1)
            .await
            .unwrap();

        assert_eq!(count, 4);
        assert_eq!(summary.duration_ms, 1_100);
        assert_eq!(summary.direction, TransferDirection::Upload);
        assert_eq!(
            summary.average_mbps,
            stats::bytes_to_mbps(summary.total_bytes, Duration::from_millis(1_100).as_secs_f64())
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_failing_workers_do_not_abort_phase() {
        let engine = engine(Refusing);
        let mut samples = Vec::new();
        let summary = engine
            .run(TransferDirection::Download, 2_000, 4, 250, |s| samples.push(s))
            .await
            .unwrap();

        assert_eq!(samples.len(), 8);
        assert_eq!(summary.total_bytes, 0);
        assert_eq!(summary.average_mbps, 0.0);
        assert_eq!(summary.peak_mbps, 0.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_workers_reconnect_after_stream_ends() {
        let engine = engine(ShortLived);
        let summary = engine
            .run(TransferDirection::Download, 1_000, 1, 250, |_| {})
            .await
            .unwrap();

        // One reopened connection per 100ms
        assert!(summary.total_bytes >= 9_000, "total {}", summary.total_bytes);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_connections_are_paced() {
        let transport = EmptyBody::default();
        let opened = Arc::clone(&transport.0);
        let summary = engine(transport)
            .run(TransferDirection::Download, 500, 1, 100, |_| {})
            .await
            .unwrap();

        // One attempt per backoff period at most, not a tight loop
        let connections = opened.load(Ordering::Relaxed);
        assert!(connections >= 2, "connections {}", connections);
        assert!(connections <= 11, "connections {}", connections);
        assert_eq!(summary.total_bytes, 0);
    }

    #[tokio::test]
    async fn test_invalid_arguments_rejected() {
        let engine = engine(Refusing);
        for (duration, parallel, tick) in [(0, 4, 250), (1_000, 0, 250), (1_000, 4, 0), (200, 4, 250)] {
            let result = engine
                .run(TransferDirection::Download, duration, parallel, tick, |_| {})
                .await;
            assert!(matches!(result, Err(AppError::Validation(_))));
        }
    }

    #[test]
    fn test_byte_counter_is_shared() {
        let counter = ByteCounter::new();
        let clone = counter.clone();
        counter.add(10);
        clone.add(5);
        assert_eq!(counter.total(), 15);
    }

    #[test]
    fn test_connection_tally_is_per_handle() {
        let phase = ByteCounter::new();
        let first = phase.for_connection();
        let second = phase.for_connection();
        first.add(100);
        second.add(20);

        assert_eq!(phase.total(), 120);
        assert_eq!(first.connection_bytes(), 100);
        assert_eq!(second.connection_bytes(), 20);
        assert_eq!(second.total(), 120);
    }
}
