//! # Core Configuration Module
//!
//! Provides configuration management for the offline media core.
//!
//! ## Overview
//!
//! The configuration system uses a builder pattern to construct a `CoreConfig`
//! instance that holds the bridges and settings the download engine needs. It
//! enforces fail-fast validation so a host learns about a missing capability
//! at startup rather than on the first download.
//!
//! ## Required Dependencies
//!
//! - `TransferClient` - Performs the media downloads
//! - `FileSystemAccess` - Locates the documents directory, deletes files
//!
//! ## Optional Dependencies (with defaults)
//!
//! - `MediaTypeSniffer` - Audio/video detection (default: URL extension)
//! - `NetworkMonitor` - Connectivity detection (required by the feature flags)
//! - `AnalyticsSink` - Tracking events (default: discard)
//! - `Clock` - Time source (default: system clock)
//!
//! When the `desktop-shims` feature is enabled, desktop-ready defaults from
//! `bridge-desktop` are injected for every bridge that was not provided.
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::CoreConfig;
//! use std::sync::Arc;
//!
//! let config = CoreConfig::builder()
//!     .database_path("/path/to/downloads.db")
//!     .transfer_client(Arc::new(MyTransferClient))
//!     .file_system(Arc::new(MyFileSystem))
//!     .network_monitor(Arc::new(MyReachability))
//!     .enable_auto_download(true)
//!     .build()?;
//! ```

use crate::error::{Error, Result};
use bridge_traits::{
    AnalyticsSink, Clock, FileSystemAccess, MediaTypeSniffer, NetworkMonitor,
    SystemClock, TransferClient,
};
use std::path::PathBuf;
use std::sync::Arc;

/// Core configuration for the offline media core.
///
/// Use [`CoreConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct CoreConfig {
    /// Path to the SQLite database holding the download catalog
    pub database_path: PathBuf,

    /// Directory for downloaded media; `None` means the platform documents
    /// directory
    pub downloads_dir: Option<PathBuf>,

    pub transfer_client: Arc<dyn TransferClient>,

    pub media_sniffer: Arc<dyn MediaTypeSniffer>,

    pub file_system: Arc<dyn FileSystemAccess>,

    /// Network connectivity monitor
    pub network_monitor: Option<Arc<dyn NetworkMonitor>>,

    pub analytics: Arc<dyn AnalyticsSink>,

    pub clock: Arc<dyn Clock>,

    /// Features flags
    pub features: FeatureFlags,
}

impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field("database_path", &self.database_path)
            .field("downloads_dir", &self.downloads_dir)
            .field("transfer_client", &"TransferClient { ... }")
            .field("media_sniffer", &"MediaTypeSniffer { ... }")
            .field("file_system", &"FileSystemAccess { ... }")
            .field(
                "network_monitor",
                &self
                    .network_monitor
                    .as_ref()
                    .map(|_| "NetworkMonitor { ... }"),
            )
            .field("features", &self.features)
            .finish()
    }
}

/// Feature flags control optional functionality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FeatureFlags {
    /// Download new episodes of opted-in channels automatically
    /// (requires NetworkMonitor)
    pub enable_auto_download: bool,

    /// Restart failed downloads when connectivity returns
    /// (requires NetworkMonitor)
    pub enable_network_awareness: bool,
}

impl CoreConfig {
    /// Creates a new builder for constructing a `CoreConfig`.
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Validates the configuration and returns an error if invalid.
    ///
    /// This checks:
    /// - Database path is not empty
    /// - Downloads directory, when set, is not empty
    /// - Feature flags are consistent with available bridges
    pub fn validate(&self) -> Result<()> {
        if self.database_path.as_os_str().is_empty() {
            return Err(Error::Config("Database path cannot be empty".to_string()));
        }

        if matches!(&self.downloads_dir, Some(dir) if dir.as_os_str().is_empty()) {
            return Err(Error::Config(
                "Downloads directory cannot be empty when set".to_string(),
            ));
        }

        if self.features.enable_network_awareness && self.network_monitor.is_none() {
            return Err(Error::Config(
                "Network awareness enabled but no NetworkMonitor provided. \
                 Disable the feature or inject a NetworkMonitor implementation."
                    .to_string(),
            ));
        }

        if self.features.enable_auto_download && self.network_monitor.is_none() {
            return Err(Error::Config(
                "Automatic downloads enabled but no NetworkMonitor provided. \
                 Automatic downloads are only allowed on unmetered connections, \
                 which cannot be detected without a monitor."
                    .to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_transfer_client() -> Result<Arc<dyn TransferClient>> {
    Err(Error::missing(
        "TransferClient",
        "TransferClient implementation is required to download media. \
         Desktop: ensure the 'desktop-shims' feature is enabled to use the default ReqwestTransferClient. \
         Mobile: inject the platform download service (URLSession/DownloadManager).",
    ))
}

#[cfg(feature = "desktop-shims")]
fn provide_default_transfer_client() -> Result<Arc<dyn TransferClient>> {
    let client = bridge_desktop::ReqwestTransferClient::new().map_err(|e| {
        Error::Internal(format!("Failed to create default TransferClient: {}", e))
    })?;
    Ok(Arc::new(client))
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_file_system() -> Result<Arc<dyn FileSystemAccess>> {
    Err(Error::missing(
        "FileSystemAccess",
        "FileSystemAccess implementation is required to store downloaded media. \
         Desktop: ensure the 'desktop-shims' feature is enabled to use the default TokioFileSystem. \
         Mobile: inject the sandboxed documents directory adapter.",
    ))
}

#[cfg(feature = "desktop-shims")]
fn provide_default_file_system() -> Result<Arc<dyn FileSystemAccess>> {
    Ok(Arc::new(bridge_desktop::TokioFileSystem::new()))
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_media_sniffer() -> Result<Arc<dyn MediaTypeSniffer>> {
    Ok(Arc::new(bridge_traits::ExtensionSniffer))
}

#[cfg(feature = "desktop-shims")]
fn provide_default_media_sniffer() -> Result<Arc<dyn MediaTypeSniffer>> {
    let sniffer = bridge_desktop::ReqwestMediaSniffer::new().map_err(|e| {
        Error::Internal(format!("Failed to create default MediaTypeSniffer: {}", e))
    })?;
    Ok(Arc::new(sniffer))
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_network_monitor(_features: FeatureFlags) -> Option<Arc<dyn NetworkMonitor>> {
    None
}

#[cfg(feature = "desktop-shims")]
fn provide_default_network_monitor(features: FeatureFlags) -> Option<Arc<dyn NetworkMonitor>> {
    if features.enable_auto_download || features.enable_network_awareness {
        Some(Arc::new(bridge_desktop::DesktopNetworkMonitor::new()))
    } else {
        None
    }
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_analytics() -> Arc<dyn AnalyticsSink> {
    Arc::new(bridge_traits::NoopAnalyticsSink)
}

#[cfg(feature = "desktop-shims")]
fn provide_default_analytics() -> Arc<dyn AnalyticsSink> {
    Arc::new(bridge_desktop::TracingAnalyticsSink)
}

/// Builder for constructing [`CoreConfig`] instances.
///
/// Use this builder to incrementally set configuration options and then
/// call [`build()`](CoreConfigBuilder::build) to create the final config.
#[derive(Default)]
pub struct CoreConfigBuilder {
    database_path: Option<PathBuf>,
    downloads_dir: Option<PathBuf>,
    transfer_client: Option<Arc<dyn TransferClient>>,
    media_sniffer: Option<Arc<dyn MediaTypeSniffer>>,
    file_system: Option<Arc<dyn FileSystemAccess>>,
    network_monitor: Option<Arc<dyn NetworkMonitor>>,
    analytics: Option<Arc<dyn AnalyticsSink>>,
    clock: Option<Arc<dyn Clock>>,
    features: FeatureFlags,
}

impl CoreConfigBuilder {
    /// Sets the path of the SQLite database holding the download catalog.
    pub fn database_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.database_path = Some(path.into());
        self
    }

    /// Stores downloads somewhere other than the documents directory.
    pub fn downloads_dir<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.downloads_dir = Some(path.into());
        self
    }

    pub fn transfer_client(mut self, client: Arc<dyn TransferClient>) -> Self {
        self.transfer_client = Some(client);
        self
    }

    pub fn media_sniffer(mut self, sniffer: Arc<dyn MediaTypeSniffer>) -> Self {
        self.media_sniffer = Some(sniffer);
        self
    }

    pub fn file_system(mut self, fs: Arc<dyn FileSystemAccess>) -> Self {
        self.file_system = Some(fs);
        self
    }

    pub fn network_monitor(mut self, monitor: Arc<dyn NetworkMonitor>) -> Self {
        self.network_monitor = Some(monitor);
        self
    }

    pub fn analytics(mut self, sink: Arc<dyn AnalyticsSink>) -> Self {
        self.analytics = Some(sink);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Enables or disables automatic downloads of new episodes.
    pub fn enable_auto_download(mut self, enabled: bool) -> Self {
        self.features.enable_auto_download = enabled;
        self
    }

    /// Enables or disables retry-on-reconnect.
    pub fn enable_network_awareness(mut self, enabled: bool) -> Self {
        self.features.enable_network_awareness = enabled;
        self
    }

    /// Replaces all feature flags at once.
    pub fn features(mut self, features: FeatureFlags) -> Self {
        self.features = features;
        self
    }

    /// Builds the final `CoreConfig` instance.
    ///
    /// # Returns
    ///
    /// Returns `Ok(CoreConfig)` on success, or an error if:
    /// - The database path is missing
    /// - Required bridges are missing (TransferClient, FileSystemAccess)
    /// - Feature flags are inconsistent with available bridges
    pub fn build(self) -> Result<CoreConfig> {
        let database_path = self.database_path.ok_or_else(|| {
            Error::Config("Database path is required. Use .database_path() to set it.".to_string())
        })?;

        let transfer_client = match self.transfer_client {
            Some(client) => client,
            None => provide_default_transfer_client()?,
        };

        let file_system = match self.file_system {
            Some(fs) => fs,
            None => provide_default_file_system()?,
        };

        let media_sniffer = match self.media_sniffer {
            Some(sniffer) => sniffer,
            None => provide_default_media_sniffer()?,
        };

        let network_monitor = self
            .network_monitor
            .or_else(|| provide_default_network_monitor(self.features));

        let config = CoreConfig {
            database_path,
            downloads_dir: self.downloads_dir,
            transfer_client,
            media_sniffer,
            file_system,
            network_monitor,
            analytics: self.analytics.unwrap_or_else(provide_default_analytics),
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            features: self.features,
        };

        config.validate()?;

        Ok(config)
    }
}
