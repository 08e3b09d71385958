//! Public IP and ISP lookup

use crate::{
    client::{ClientFactory, HttpUtils},
    error::{AppError, Result},
    logging::{Logger, NetworkLogger},
    models::{Config, NetworkIdentity},
};
use reqwest::{header, Client};
use serde::Deserialize;
use tokio::time::Instant;

/// Some lookup services refuse non-browser agents
const BROWSER_USER_AGENT: &str = "Mozilla/5.0";

pub const UNKNOWN_IP: &str = "Unknown IP";
pub const UNKNOWN_ISP: &str = "Unknown ISP";

/// Fields read from the lookup response; everything else is ignored
#[derive(Debug, Default, Deserialize)]
struct IdentityPayload {
    ip: Option<String>,
    /// ip-api.com style address field
    query: Option<String>,
    org: Option<String>,
    isp: Option<String>,
    /// ipapi.co reports rate limiting as `{"error": true, ...}`
    #[serde(default)]
    error: bool,
}

impl IdentityPayload {
    fn into_identity(self) -> NetworkIdentity {
        NetworkIdentity {
            ip: non_blank(self.ip.or(self.query)).unwrap_or_else(|| UNKNOWN_IP.to_string()),
            isp: non_blank(self.org.or(self.isp)).unwrap_or_else(|| UNKNOWN_ISP.to_string()),
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Resolves the caller's public address and network operator
#[derive(Debug, Clone)]
pub struct NetworkIdentityResolver {
    client: Client,
    endpoint: String,
    network: NetworkLogger,
}

impl NetworkIdentityResolver {
    pub fn new(client: Client, endpoint: String, network: NetworkLogger) -> Self {
        Self {
            client,
            endpoint,
            network,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        HttpUtils::validate_url(&config.identity_url)?;
        let client = ClientFactory::new(config).create_identity_client()?;
        Ok(Self::new(client, config.identity_url.clone(), NetworkLogger::new(config)))
    }

    pub fn logger(&self) -> &Logger {
        self.network.logger()
    }

    /// Look up the public identity; any failure yields the offline sentinel
    pub async fn resolve(&self) -> NetworkIdentity {
        match self.lookup().await {
            Ok(identity) => identity,
            Err(e) => {
                self.network.logger()
                    .debug(&format!("Identity lookup failed: {}", e))
                    .field("endpoint", &self.endpoint)
                    .error_info(&e)
                    .log()
                    .await;
                NetworkIdentity::offline()
            }
        }
    }

    async fn lookup(&self) -> Result<NetworkIdentity> {
        let start = Instant::now();
        let result = self.client
            .get(&self.endpoint)
            .header(header::USER_AGENT, BROWSER_USER_AGENT)
            .send()
            .await;
        let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;

        let response = match result {
            Ok(response) => response,
            Err(e) => {
                self.network.http_exchange("GET", &self.endpoint, None, elapsed_ms).await;
                return Err(e.into());
            }
        };

        let status = response.status();
        self.network.http_exchange("GET", &self.endpoint, Some(status.as_u16()), elapsed_ms).await;
        if !status.is_success() {
            return Err(AppError::http_request(format!("Identity lookup returned HTTP {}", status)));
        }

        let body = response.text().await?;
        if body.trim().is_empty() {
            return Err(AppError::parse("Identity lookup returned an empty body"));
        }

        let payload: IdentityPayload = serde_json::from_str(&body)?;
        if payload.error {
            return Err(AppError::http_request("Identity service reported an error"));
        }

        Ok(payload.into_identity())
    }
}
