//! # Host Bridge Traits
//!
//! Platform abstraction traits that must be implemented by each host platform.
//!
//! ## Overview
//!
//! This crate defines the contract between the download core and
//! platform-specific implementations. Each trait represents a capability that
//! the core requires but that must be implemented differently per platform
//! (desktop, iOS, Android).
//!
//! ## Traits
//!
//! ### Networking & I/O
//! - [`TransferClient`](transfer::TransferClient) - Cancellable, progressed media downloads
//! - [`MediaTypeSniffer`](media::MediaTypeSniffer) - Audio/video classification of a URL
//! - [`FileSystemAccess`](storage::FileSystemAccess) - Documents directory and file removal
//!
//! ### Platform Integration
//! - [`NetworkMonitor`](network::NetworkMonitor) - Connectivity and metered network detection
//! - [`AnalyticsSink`](analytics::AnalyticsSink) - Fire-and-forget tracking events
//!
//! ### Utilities
//! - [`Clock`](time::Clock) - Time source for deterministic testing
//! - [`LoggerSink`](time::LoggerSink) - Forward structured logs to host logging
//!
//! ## Platform Requirements
//!
//! | Platform | Implementation Crate | Status |
//! |----------|---------------------|--------|
//! | Desktop  | `bridge-desktop`    | ✅ In Progress |
//! | iOS      | TBD                 | 📋 Planned |
//! | Android  | TBD                 | 📋 Planned |
//!
//! ## Fail-Fast Strategy
//!
//! The core fails fast with descriptive errors when a required capability is
//! missing (see `core_runtime::config::CoreConfigBuilder::build`).
//!
//! ## Error Handling
//!
//! All bridge traits use the [`BridgeError`](error::BridgeError) type. Platform
//! implementations should convert platform-specific errors to `BridgeError` and
//! include context such as the URL or path involved.
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` bounds so one instance can be shared
//! by the download engine's tasks.

pub mod analytics;
pub mod error;
pub mod media;
pub mod network;
pub mod storage;
pub mod time;
pub mod transfer;

pub use error::BridgeError;

// Re-export commonly used types
pub use analytics::{AnalyticsEvent, AnalyticsSink, NoopAnalyticsSink};
pub use media::{ExtensionSniffer, MediaKind, MediaTypeSniffer};
pub use network::{
    Connectivity, NetworkChangeStream, NetworkInfo, NetworkMonitor, NetworkStatus, NetworkType,
};
pub use storage::FileSystemAccess;
pub use time::{Clock, ConsoleLogger, LogEntry, LogLevel, LoggerSink, ManualClock, SystemClock};
pub use transfer::{ProgressSender, TransferClient, TransferRequest};
