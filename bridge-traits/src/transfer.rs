//! Media Transfer Abstraction
//!
//! Cancellable, progress-reporting downloads of a remote URL to a local path.

use async_trait::async_trait;
use std::ffi::OsString;
use std::path::PathBuf;
use tokio::sync::mpsc::UnboundedSender;

use crate::error::Result;

/// Sender side of a transfer's progress channel.
///
/// Values are fractions in `[0, 1]`.
pub type ProgressSender = UnboundedSender<f64>;

/// A single transfer job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRequest {
    /// Remote resource
    pub url: String,
    /// Final location of the downloaded file
    pub destination: PathBuf,
    /// Overwrite a file already present at `destination`
    pub replace_existing: bool,
}

impl TransferRequest {
    pub fn new(url: impl Into<String>, destination: impl Into<PathBuf>) -> Self {
        Self {
            url: url.into(),
            destination: destination.into(),
            replace_existing: true,
        }
    }

    /// Staging path used while bytes are still arriving (`<destination>.part`).
    ///
    /// Callers that abort a transfer delete this path as well as `destination`.
    pub fn partial_path(&self) -> PathBuf {
        let mut name: OsString = self
            .destination
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".part");
        self.destination.with_file_name(name)
    }
}

/// Transfer client trait
///
/// Implementations stream `request.url` into `request.destination`, pushing
/// progress fractions into `progress` as bytes arrive, and resolve to the
/// final path on success.
///
/// Dropping the returned future cancels the transfer. A cancelled transfer
/// may leave bytes at [`TransferRequest::partial_path`].
///
/// # Example
///
/// ```ignore
/// use bridge_traits::transfer::{TransferClient, TransferRequest};
///
/// async fn fetch(client: &dyn TransferClient) -> Result<PathBuf> {
///     let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
///     tokio::spawn(async move {
///         while let Some(fraction) = rx.recv().await {
///             println!("{:.0}%", fraction * 100.0);
///         }
///     });
///     client
///         .transfer(TransferRequest::new("https://cdn/ep1.mp3", "/docs/ep1.mp3"), tx)
///         .await
/// }
/// ```
#[async_trait]
pub trait TransferClient: Send + Sync {
    async fn transfer(&self, request: TransferRequest, progress: ProgressSender)
        -> Result<PathBuf>;
}
