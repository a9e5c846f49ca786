//! # Desktop Bridge Implementations
//!
//! Default implementations of bridge traits for desktop platforms
//! (macOS, Windows, Linux).
//!
//! ## Overview
//!
//! This crate provides production-ready implementations of the bridges the
//! download engine needs, using desktop-appropriate libraries:
//! - `TransferClient` streaming to disk with `reqwest`
//! - `MediaTypeSniffer` via HTTP HEAD with `reqwest`
//! - `FileSystemAccess` using `tokio::fs` and the `dirs` platform directories
//! - `NetworkMonitor` polling a TCP reachability probe
//! - `AnalyticsSink` forwarding events to `tracing`
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::{ReqwestTransferClient, TokioFileSystem};
//!
//! #[tokio::main]
//! async fn main() -> bridge_traits::error::Result<()> {
//!     let transfers = ReqwestTransferClient::new()?;
//!     let fs = TokioFileSystem::new();
//!
//!     // Use in core configuration
//!     Ok(())
//! }
//! ```

mod analytics;
mod filesystem;
mod media;
mod network;
mod transfer;

#[cfg(test)]
mod test_server;

pub use analytics::TracingAnalyticsSink;
pub use filesystem::TokioFileSystem;
pub use media::ReqwestMediaSniffer;
pub use network::DesktopNetworkMonitor;
pub use transfer::ReqwestTransferClient;
