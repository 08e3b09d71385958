//! Round-trip latency measurement
//!
//! A probe run sends one warm-up request that is never counted, then a
//! fixed number of sequential HEAD requests. Each request carries a
//! cache-busting query parameter and `Cache-Control: no-store` so it
//! reaches the origin. Failed or timed-out attempts count toward loss
//! but never toward the RTT figures.

use crate::{
    client::{ClientFactory, HttpUtils, NO_STORE},
    error::{AppError, Result},
    logging::{Logger, NetworkLogger},
    models::{Config, LatencyStats},
};
use reqwest::{header, Client};
use std::time::Duration;
use tokio::time::{timeout, Instant};

/// Measures min RTT, jitter and loss against a single endpoint
#[derive(Debug, Clone)]
pub struct LatencyProbe {
    client: Client,
    attempt_timeout: Duration,
    network: NetworkLogger,
}

impl LatencyProbe {
    pub fn new(client: Client, attempt_timeout: Duration, network: NetworkLogger) -> Self {
        Self {
            client,
            attempt_timeout,
            network,
        }
    }

    /// Build a probe with the probe client and timeouts from `config`
    pub fn from_config(config: &Config) -> Result<Self> {
        let client = ClientFactory::new(config).create_probe_client()?;
        Ok(Self::new(client, config.read_timeout(), NetworkLogger::new(config)))
    }

    pub fn logger(&self) -> &Logger {
        self.network.logger()
    }

    /// Run `attempts` probes against `endpoint` after one ignored warm-up.
    ///
    /// Never fails because of network conditions: when every probe fails
    /// the offline sentinel is returned. Only an invalid endpoint or a
    /// zero attempt count is an error.
    pub async fn measure(&self, endpoint: &str, attempts: u32) -> Result<LatencyStats> {
        HttpUtils::validate_url(endpoint)?;
        if attempts == 0 {
            return Err(AppError::validation("Latency probe needs at least one attempt"));
        }

        if let Err(e) = self.probe_once(endpoint).await {
            self.network.logger()
                .debug(&format!("Warm-up request failed: {}", e))
                .field("endpoint", endpoint)
                .log()
                .await;
        }

        let mut rtts = Vec::with_capacity(attempts as usize);
        for attempt in 1..=attempts {
            match self.probe_once(endpoint).await {
                Ok(rtt_ms) => rtts.push(rtt_ms),
                Err(e) => {
                    self.network.logger()
                        .debug(&format!("Probe {}/{} failed: {}", attempt, attempts, e))
                        .field("attempt", attempt)
                        .error_info(&e)
                        .log()
                        .await;
                }
            }
        }

        let stats = LatencyStats::from_rtts(&rtts, attempts);
        self.network.logger()
            .info(&format!(
                "Latency: min {:.1}ms, jitter {:.1}ms, loss {:.1}%",
                stats.min_rtt_ms, stats.jitter_ms, stats.loss_percent
            ))
            .latency(&stats)
            .field("successes", rtts.len())
            .field("attempts", attempts)
            .log()
            .await;

        Ok(stats)
    }

    /// One HEAD request; returns the RTT in milliseconds on a 2xx answer
    async fn probe_once(&self, endpoint: &str) -> Result<f64> {
        let url = HttpUtils::with_cache_buster(endpoint)?;
        let request = self.client
            .head(url)
            .header(header::CACHE_CONTROL, NO_STORE)
            .header(header::PRAGMA, "no-cache");

        let start = Instant::now();
        let result = timeout(self.attempt_timeout, request.send()).await;
        let rtt_ms = start.elapsed().as_secs_f64() * 1000.0;

        let response = match result {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                self.network.http_exchange("HEAD", endpoint, None, rtt_ms).await;
                return Err(e.into());
            }
            Err(_) => {
                self.network.http_exchange("HEAD", endpoint, None, rtt_ms).await;
                return Err(AppError::timeout(format!(
                    "Probe exceeded {}ms",
                    self.attempt_timeout.as_millis()
                )));
            }
        };

        let status = response.status();
        self.network.http_exchange("HEAD", endpoint, Some(status.as_u16()), rtt_ms).await;

        if !status.is_success() {
            return Err(AppError::http_request(format!("Probe returned HTTP {}", status)));
        }

        Ok(rtt_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::{
        matchers::{header as header_eq, method, path},
        Mock, MockServer, ResponseTemplate,
    };

    fn probe(attempt_timeout: Duration) -> LatencyProbe {
        let config = Config::default();
        let client = ClientFactory::new(&config).create_probe_client().unwrap();
        LatencyProbe::new(client, attempt_timeout, NetworkLogger::new(&config))
    }

    #[tokio::test]
    async fn test_all_probes_succeed() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(path("/ping"))
            .and(header_eq("cache-control", "no-store"))
            .respond_with(ResponseTemplate::new(200))
            .expect(9) // warm-up + 8 attempts
            .mount(&server)
            .await;

        let stats = probe(Duration::from_secs(2))
            .measure(&format!("{}/ping", server.uri()), 8)
            .await
            .unwrap();

        assert_eq!(stats.loss_percent, 0.0);
        assert!(stats.min_rtt_ms > 0.0);
        assert!(stats.min_rtt_ms <= stats.avg_rtt_ms);
        assert!(stats.jitter_ms >= 0.0);
    }

    #[tokio::test]
    async fn test_two_of_twelve_time_out() {
        let server = MockServer::start().await;

        // Warm-up answers fast
        Mock::given(method("HEAD"))
            .respond_with(ResponseTemplate::new(200))
            .up_to_n_times(1)
            .with_priority(1)
            .mount(&server)
            .await;

        // The next two requests stall past the probe timeout
        Mock::given(method("HEAD"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(1500)))
            .up_to_n_times(2)
            .with_priority(2)
            .mount(&server)
            .await;

        Mock::given(method("HEAD"))
            .respond_with(ResponseTemplate::new(200))
            .with_priority(3)
            .mount(&server)
            .await;

        let stats = probe(Duration::from_millis(300))
            .measure(&server.uri(), 12)
            .await
            .unwrap();

        assert_eq!(stats.loss_percent.round(), (2.0f64 / 12.0 * 100.0).round());
        assert!(!stats.is_offline());
    }

    #[tokio::test]
    async fn test_error_status_counts_as_loss() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let stats = probe(Duration::from_secs(1))
            .measure(&server.uri(), 5)
            .await
            .unwrap();

        assert!(stats.is_offline());
        assert_eq!(stats.min_rtt_ms, crate::models::metrics::OFFLINE_RTT_MS);
        assert_eq!(stats.jitter_ms, 0.0);
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_offline_not_error() {
        let stats = probe(Duration::from_millis(200))
            .measure("http://127.0.0.1:1/ping", 3)
            .await
            .unwrap();

        assert_eq!(stats.loss_percent, 100.0);
    }

    #[tokio::test]
    async fn test_invalid_input_fails_fast() {
        let probe = probe(Duration::from_millis(200));
        assert!(matches!(
            probe.measure("ftp://example.com", 3).await,
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            probe.measure("https://example.com", 0).await,
            Err(AppError::Validation(_))
        ));
    }
}
