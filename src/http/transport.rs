use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{AppError, Result};
use crate::http::pool::create_http_client;

/// Outcome of a dispatched request, whatever its status code.
/// `body` is empty if the response headers arrived but the body could not be read.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: StatusCode,
    pub body: String,
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// POST `body` to `url` with the given headers.
    /// An `Err` means the request was not dispatched. Once response headers have
    /// arrived the request counts as dispatched and `Ok` is returned.
    async fn send(&self, url: &str, body: Vec<u8>, headers: HeaderMap) -> Result<TransportResponse>;
}

#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(connect_timeout: Duration, request_timeout: Duration) -> Result<Self> {
        let client = create_http_client(connect_timeout, request_timeout)?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, url: &str, body: Vec<u8>, headers: HeaderMap) -> Result<TransportResponse> {
        let start = std::time::Instant::now();
        let response = self.client.post(url)
            .headers(headers)
            .body(body)
            .send()
            .await
            .map_err(|e| AppError::Transport(format!("Reqwest error: {}", e)))?;

        let status = response.status();
        let body = match response.bytes().await {
            Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            Err(e) => {
                warn!("POST {} -> {}, failed to read body: {}", url, status, e);
                String::new()
            }
        };

        debug!("POST {} -> {} in {}ms", url, status, start.elapsed().as_millis());

        Ok(TransportResponse { status, body })
    }
}
