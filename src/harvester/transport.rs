//! Page transport
//!
//! The harvester only needs "give me the HTML behind this URL". The
//! production implementation goes through an unlocker API that fetches the
//! page on our behalf and returns the raw document.

use crate::config::TransportConfig;
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

/// Errors raised by a transport; all of them are transient to the fetcher
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,

    #[error("unlocker returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Fetches the HTML of a page
///
/// Implementations must be callable from many tasks at once.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn fetch_html(&self, url: &str) -> Result<String, TransportError>;
}

/// Request body for the unlocker API
#[derive(Debug, Serialize)]
struct UnlockerRequest<'a> {
    zone: &'a str,
    url: &'a str,
    format: &'static str,
}

/// Transport backed by a Web-Unlocker style HTTP API
pub struct UnlockerTransport {
    client: Client,
    api_url: String,
    api_key: String,
    zone: String,
}

impl UnlockerTransport {
    /// Builds the transport and its HTTP client
    ///
    /// # Arguments
    ///
    /// * `config` - API url, zone and per-request timeout
    /// * `api_key` - Bearer token for the API
    pub fn new(config: &TransportConfig, api_key: String) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: build_http_client(config.timeout())?,
            api_url: config.api_url.clone(),
            api_key,
            zone: config.zone.clone(),
        })
    }
}

/// Builds an HTTP client with the given per-request timeout
pub fn build_http_client(timeout: Duration) -> Result<Client, reqwest::Error> {
    Client::builder()
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
}

#[async_trait]
impl Transport for UnlockerTransport {
    async fn fetch_html(&self, url: &str) -> Result<String, TransportError> {
        tracing::debug!("Requesting {} through unlocker zone {}", url, self.zone);

        let body = UnlockerRequest {
            zone: &self.zone,
            url,
            format: "raw",
        };

        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(classify)?;

        let status = response.status();
        let text = response.text().await.map_err(classify)?;

        if !status.is_success() {
            return Err(TransportError::Status {
                status: status.as_u16(),
                body: text.chars().take(200).collect(),
            });
        }

        Ok(text.trim().to_string())
    }
}

fn classify(error: reqwest::Error) -> TransportError {
    if error.is_timeout() {
        TransportError::Timeout
    } else {
        TransportError::Http(error)
    }
}
