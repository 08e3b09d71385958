//! HTTP client construction and URL helpers shared by the measurement engines

use crate::{
    error::{AppError, Result},
    models::Config,
};
use reqwest::{header, Client, Url};
use std::time::Duration;

/// Header value that keeps intermediaries from answering probes out of cache
pub const NO_STORE: &str = "no-store";

/// Query parameter appended to probe URLs
pub const CACHE_BUSTER_PARAM: &str = "nocache";

/// HTTP client factory for the different measurement roles.
///
/// Each role gets its own `reqwest::Client` so timeouts and pool settings
/// do not leak between latency probes and bulk transfers.
#[derive(Debug, Clone)]
pub struct ClientFactory {
    connect_timeout: Duration,
    read_timeout: Duration,
    identity_timeout: Duration,
    user_agent: String,
}

impl ClientFactory {
    pub fn new(config: &Config) -> Self {
        Self {
            connect_timeout: config.connect_timeout(),
            read_timeout: config.read_timeout(),
            identity_timeout: config.identity_timeout(),
            user_agent: crate::defaults::USER_AGENT.to_string(),
        }
    }

    /// Client for latency probes: one short-lived request at a time
    pub fn create_probe_client(&self) -> Result<Client> {
        Client::builder()
            .connect_timeout(self.connect_timeout)
            .timeout(self.read_timeout)
            .user_agent(self.user_agent.clone())
            .build()
            .map_err(|e| AppError::network(format!("Failed to create probe client: {}", e)))
    }

    /// Client for bulk transfers.
    ///
    /// No overall request timeout: workers are stopped by the phase
    /// deadline instead.
    pub fn create_transfer_client(&self, parallelism: usize) -> Result<Client> {
        Client::builder()
            .connect_timeout(self.connect_timeout)
            .pool_max_idle_per_host(parallelism)
            .tcp_nodelay(true)
            .user_agent(self.user_agent.clone())
            .build()
            .map_err(|e| AppError::network(format!("Failed to create transfer client: {}", e)))
    }

    /// Client for the public identity lookup
    pub fn create_identity_client(&self) -> Result<Client> {
        let mut headers = header::HeaderMap::new();
        headers.insert(header::ACCEPT, header::HeaderValue::from_static("application/json"));

        Client::builder()
            .connect_timeout(self.connect_timeout)
            .timeout(self.identity_timeout)
            .default_headers(headers)
            .user_agent(self.user_agent.clone())
            .build()
            .map_err(|e| AppError::network(format!("Failed to create identity client: {}", e)))
    }
}

/// Utility functions for HTTP operations
pub struct HttpUtils;

impl HttpUtils {
    /// Validate URL format
    pub fn validate_url(url: &str) -> Result<()> {
        let parsed = Url::parse(url)
            .map_err(|e| AppError::validation(format!("Invalid URL format: {}", e)))?;

        match parsed.scheme() {
            "http" | "https" => {}
            scheme => return Err(AppError::validation(format!("Unsupported URL scheme: {}", scheme))),
        }

        if parsed.host().is_none() {
            return Err(AppError::validation("URL must have a host"));
        }

        Ok(())
    }

    /// Append a unique query parameter so every probe reaches the origin
    pub fn with_cache_buster(url: &str) -> Result<Url> {
        let mut parsed = Url::parse(url)
            .map_err(|e| AppError::parse(format!("Invalid URL: {}", e)))?;

        let nonce = uuid::Uuid::new_v4().simple().to_string();
        parsed.query_pairs_mut().append_pair(CACHE_BUSTER_PARAM, &nonce);

        Ok(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_url() {
        assert!(HttpUtils::validate_url("https://speed.cloudflare.com/__up").is_ok());
        assert!(HttpUtils::validate_url("http://127.0.0.1:8080/x").is_ok());
        assert!(HttpUtils::validate_url("ftp://example.com").is_err());
        assert!(HttpUtils::validate_url("not a url").is_err());
    }

    #[test]
    fn test_cache_buster_keeps_existing_query() {
        let first = HttpUtils::with_cache_buster("https://speed.cloudflare.com/__down?bytes=1").unwrap();
        let second = HttpUtils::with_cache_buster("https://speed.cloudflare.com/__down?bytes=1").unwrap();

        let pairs: Vec<_> = first.query_pairs().map(|(k, _)| k.to_string()).collect();
        assert_eq!(pairs, vec!["bytes".to_string(), CACHE_BUSTER_PARAM.to_string()]);
        assert_ne!(first, second);
        assert_eq!(first.path(), "/__down");
    }

    #[test]
    fn test_factory_builds_all_clients() {
        let factory = ClientFactory::new(&Config::default());
        assert!(factory.create_probe_client().is_ok());
        assert!(factory.create_transfer_client(4).is_ok());
        assert!(factory.create_identity_client().is_ok());
    }
}
