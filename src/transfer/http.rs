//! reqwest-backed transfer transport

use super::{ByteCounter, TransferTransport};
use crate::{
    client::{ClientFactory, HttpUtils, NO_STORE},
    defaults::CHUNK_SIZE,
    error::{AppError, Result},
    models::Config,
    types::TransferDirection,
};
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{header, Body, Client};
use std::time::Duration;
use tokio::time::{timeout_at, Instant};

/// Upload payload, resent for as long as the phase runs
static FILLER: [u8; CHUNK_SIZE] = [0x5a; CHUNK_SIZE];

/// GETs the download endpoint and POSTs generated bodies to the upload endpoint
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    download_url: String,
    upload_url: String,
    /// Longest silence tolerated between two body chunks
    read_timeout: Duration,
}

impl HttpTransport {
    pub fn new(client: Client, download_url: String, upload_url: String, read_timeout: Duration) -> Self {
        Self {
            client,
            download_url,
            upload_url,
            read_timeout,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        HttpUtils::validate_url(&config.download_url)?;
        HttpUtils::validate_url(&config.upload_url)?;

        let client = ClientFactory::new(config).create_transfer_client(config.parallel_connections)?;
        Ok(Self::new(
            client,
            config.download_url.clone(),
            config.upload_url.clone(),
            config.read_timeout(),
        ))
    }

    async fn download(&self, deadline: Instant, counter: &ByteCounter) -> Result<()> {
        let url = HttpUtils::with_cache_buster(&self.download_url)?;
        let request = self.client
            .get(url)
            .header(header::CACHE_CONTROL, NO_STORE)
            .send();

        let response = match timeout_at(deadline, request).await {
            Ok(response) => response?.error_for_status()?,
            Err(_) => return Ok(()),
        };

        let mut stream = response.bytes_stream();
        loop {
            let read_deadline = (Instant::now() + self.read_timeout).min(deadline);
            match timeout_at(read_deadline, stream.next()).await {
                Ok(Some(chunk)) => counter.add(chunk?.len() as u64),
                Ok(None) => return Ok(()),
                Err(_) if Instant::now() >= deadline => return Ok(()),
                Err(_) => {
                    return Err(AppError::timeout(format!(
                        "No data for {}ms",
                        self.read_timeout.as_millis()
                    )));
                }
            }
        }
    }

    async fn upload(&self, deadline: Instant, counter: &ByteCounter) -> Result<()> {
        let produced = counter.clone();
        let body = futures::stream::unfold((), move |()| {
            let produced = produced.clone();
            async move {
                if Instant::now() >= deadline {
                    return None;
                }
                produced.add(FILLER.len() as u64);
                Some((Ok::<&'static [u8], std::io::Error>(&FILLER[..]), ()))
            }
        });

        let request = self.client
            .post(&self.upload_url)
            .header(header::CACHE_CONTROL, NO_STORE)
            .header(header::CONTENT_TYPE, "application/octet-stream")
            .body(Body::wrap_stream(body))
            .send();

        match timeout_at(deadline, request).await {
            Ok(response) => {
                response?.error_for_status()?;
                Ok(())
            }
            Err(_) => Ok(()),
        }
    }
}

#[async_trait]
impl TransferTransport for HttpTransport {
    async fn run_connection(
        &self,
        direction: TransferDirection,
        deadline: Instant,
        counter: &ByteCounter,
    ) -> Result<()> {
        match direction {
            TransferDirection::Download => self.download(deadline, counter).await,
            TransferDirection::Upload => self.upload(deadline, counter).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::Logger;
    use crate::transfer::TransferEngine;
    use std::sync::Arc;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;
    use wiremock::{
        matchers::{method, path},
        Mock, MockServer, ResponseTemplate,
    };

    fn transport(download_url: String, upload_url: String) -> HttpTransport {
        let client = ClientFactory::new(&Config::default()).create_transfer_client(2).unwrap();
        HttpTransport::new(client, download_url, upload_url, Duration::from_secs(2))
    }

    #[tokio::test]
    async fn test_download_counts_body_bytes() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/down"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![7u8; 256 * 1024]))
            .mount(&server)
            .await;

        let transport = transport(format!("{}/down", server.uri()), format!("{}/up", server.uri()));
        let counter = ByteCounter::new();
        let deadline = Instant::now() + Duration::from_secs(5);

        transport
            .run_connection(TransferDirection::Download, deadline, &counter)
            .await
            .unwrap();

        assert_eq!(counter.total(), 256 * 1024);
    }

    #[tokio::test]
    async fn test_download_error_status_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let transport = transport(server.uri(), server.uri());
        let counter = ByteCounter::new();
        let deadline = Instant::now() + Duration::from_secs(5);

        let result = transport
            .run_connection(TransferDirection::Download, deadline, &counter)
            .await;
        assert!(result.is_err());
        assert_eq!(counter.total(), 0);
    }

    #[tokio::test]
    async fn test_upload_phase_against_sink() {
        // Accepts connections and discards everything it reads
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                tokio::spawn(async move {
                    let mut buf = vec![0u8; 64 * 1024];
                    while let Ok(n) = socket.read(&mut buf).await {
                        if n == 0 {
                            break;
                        }
                    }
                });
            }
        });

        let transport = transport(format!("http://{}/down", addr), format!("http://{}/up", addr));
        let engine = TransferEngine::new(
            Arc::new(transport),
            Logger::with_config("TRANSFER".to_string(), &Config::default()),
        );

        let mut samples = 0;
        let summary = engine
            .run(TransferDirection::Upload, 600, 2, 200, |_| samples += 1)
            .await
            .unwrap();

        assert_eq!(samples, 3);
        assert!(summary.total_bytes > 0);
        assert!(summary.average_mbps > 0.0);
    }

    #[tokio::test]
    async fn test_download_phase_end_to_end() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![1u8; 512 * 1024]))
            .mount(&server)
            .await;

        let transport = transport(server.uri(), server.uri());
        let engine = TransferEngine::new(
            Arc::new(transport),
            Logger::with_config("TRANSFER".to_string(), &Config::default()),
        );

        let summary = engine
            .run(TransferDirection::Download, 500, 2, 100, |_| {})
            .await
            .unwrap();

        assert_eq!(summary.samples, 5);
        assert!(summary.total_bytes >= 512 * 1024);
        assert!(summary.peak_mbps > 0.0);
    }

    #[tokio::test]
    async fn test_empty_download_body_does_not_flood_origin() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let transport = transport(server.uri(), server.uri());
        let engine = TransferEngine::new(
            Arc::new(transport),
            Logger::with_config("TRANSFER".to_string(), &Config::default()),
        );

        let summary = engine
            .run(TransferDirection::Download, 500, 1, 100, |_| {})
            .await
            .unwrap();

        let requests = server.received_requests().await.unwrap().len();
        assert!(requests >= 1);
        assert!(requests <= 12, "{} requests in 500ms", requests);
        assert_eq!(summary.total_bytes, 0);
    }
}
