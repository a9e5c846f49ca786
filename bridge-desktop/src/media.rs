//! Media Type Detection using HTTP HEAD requests

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    media::{MediaKind, MediaTypeSniffer},
};
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

use crate::transfer::USER_AGENT;

/// Classifies URLs by the `Content-Type` of a HEAD response.
///
/// Falls back to the URL extension, then to audio, when the server does not
/// send a media type.
pub struct ReqwestMediaSniffer {
    client: Client,
}

impl ReqwestMediaSniffer {
    pub fn new() -> Result<Self> {
        Self::with_timeout(Duration::from_secs(10))
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| BridgeError::OperationFailed(format!("HTTP client: {}", e)))?;

        Ok(Self { client })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl MediaTypeSniffer for ReqwestMediaSniffer {
    async fn classify(&self, url: &str) -> Result<MediaKind> {
        let response = self
            .client
            .head(url)
            .send()
            .await
            .map_err(|e| BridgeError::OperationFailed(format!("HEAD request failed: {}", e)))?;

        let from_header = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .and_then(MediaKind::from_content_type);

        let kind = from_header
            .or_else(|| MediaKind::from_url(url))
            .unwrap_or(MediaKind::Audio);

        debug!(?kind, from_header = from_header.is_some(), "Classified media");
        Ok(kind)
    }
}
