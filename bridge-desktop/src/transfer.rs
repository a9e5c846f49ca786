//! Media Transfer Implementation using Reqwest

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    transfer::{ProgressSender, TransferClient, TransferRequest},
};
use futures_util::StreamExt;
use reqwest::Client;
use std::path::PathBuf;
use std::time::Duration;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;

pub(crate) const USER_AGENT: &str = concat!("offline-media-core/", env!("CARGO_PKG_VERSION"));

/// Reqwest-based transfer client
///
/// Streams the response body into `<destination>.part` and renames it once
/// the body is complete. Progress is reported from `Content-Length`; servers
/// that omit it only get a final `1.0`.
pub struct ReqwestTransferClient {
    client: Client,
}

impl ReqwestTransferClient {
    /// Create a new transfer client with default configuration
    pub fn new() -> Result<Self> {
        Self::with_connect_timeout(Duration::from_secs(10))
    }

    /// Media files are large, so only the connect phase is bounded.
    pub fn with_connect_timeout(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(timeout)
            .pool_max_idle_per_host(4)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| BridgeError::OperationFailed(format!("HTTP client: {}", e)))?;

        Ok(Self { client })
    }

    /// Create a new transfer client around an existing reqwest client
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    fn failed(url: &str, message: impl Into<String>) -> BridgeError {
        BridgeError::TransferFailed {
            url: url.to_string(),
            message: message.into(),
        }
    }
}

#[async_trait]
impl TransferClient for ReqwestTransferClient {
    async fn transfer(&self, request: TransferRequest, progress: ProgressSender) -> Result<PathBuf> {
        if !request.replace_existing && fs::try_exists(&request.destination).await? {
            return Err(BridgeError::InvalidInput(format!(
                "{} already exists",
                request.destination.display()
            )));
        }

        let response = self
            .client
            .get(&request.url)
            .send()
            .await
            .map_err(|e| Self::failed(&request.url, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Self::failed(&request.url, format!("HTTP {}", status.as_u16())));
        }

        let total = response.content_length().filter(|len| *len > 0);
        let partial = request.partial_path();
        if let Some(parent) = partial.parent() {
            fs::create_dir_all(parent).await?;
        }

        let mut file = fs::File::create(&partial).await?;
        let mut body = response.bytes_stream();
        let mut received: u64 = 0;

        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(|e| Self::failed(&request.url, e.to_string()))?;
            file.write_all(&chunk).await?;
            received += chunk.len() as u64;

            if let Some(total) = total {
                // The receiver going away only means nobody is watching.
                let _ = progress.send((received as f64 / total as f64).min(1.0));
            }
        }

        file.flush().await?;
        drop(file);

        if let Some(total) = total {
            if received < total {
                return Err(Self::failed(
                    &request.url,
                    format!("body ended after {} of {} bytes", received, total),
                ));
            }
        }

        fs::rename(&partial, &request.destination).await?;
        let _ = progress.send(1.0);

        debug!(
            bytes = received,
            destination = ?request.destination,
            "Transfer finished"
        );
        Ok(request.destination)
    }
}
