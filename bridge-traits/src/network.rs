//! Network Monitoring Abstraction
//!
//! Provides connectivity information and a change stream used to drive
//! download retries.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Network connection type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkType {
    /// Cellular/mobile data connection
    Cellular,
    /// WiFi connection
    WiFi,
    /// Ethernet connection
    Ethernet,
    /// Other or unknown connection type
    Other,
}

/// Network connection status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkStatus {
    /// Connected to network
    Connected,
    /// Not connected to any network
    Disconnected,
    /// Connection status unknown or indeterminate
    Indeterminate,
}

/// Network information
#[derive(Debug, Clone)]
pub struct NetworkInfo {
    pub status: NetworkStatus,
    pub network_type: Option<NetworkType>,
    /// Whether the connection is metered (has data limits/costs)
    pub is_metered: bool,
    /// Whether the connection is considered expensive by the OS
    pub is_expensive: bool,
}

impl NetworkInfo {
    /// Info for a plain, unmetered connection.
    pub fn connected(network_type: NetworkType) -> Self {
        Self {
            status: NetworkStatus::Connected,
            network_type: Some(network_type),
            is_metered: false,
            is_expensive: false,
        }
    }

    /// Info for a metered cellular connection.
    pub fn metered() -> Self {
        Self {
            status: NetworkStatus::Connected,
            network_type: Some(NetworkType::Cellular),
            is_metered: true,
            is_expensive: true,
        }
    }

    /// Info for no connection at all.
    pub fn unavailable() -> Self {
        Self {
            status: NetworkStatus::Disconnected,
            network_type: None,
            is_metered: false,
            is_expensive: false,
        }
    }

    /// Collapse the raw info into the three states the download engine acts on.
    pub fn connectivity(&self) -> Connectivity {
        match self.status {
            NetworkStatus::Connected => {
                if self.is_metered
                    || self.is_expensive
                    || self.network_type == Some(NetworkType::Cellular)
                {
                    Connectivity::ConnectedMetered
                } else {
                    Connectivity::Connected
                }
            }
            NetworkStatus::Disconnected | NetworkStatus::Indeterminate => {
                Connectivity::Unavailable
            }
        }
    }
}

/// Connectivity as seen by download policies.
///
/// Cellular connections are always treated as metered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Connectivity {
    Unavailable,
    Connected,
    ConnectedMetered,
}

impl Connectivity {
    pub fn is_connected(self) -> bool {
        !matches!(self, Connectivity::Unavailable)
    }

    pub fn is_metered(self) -> bool {
        matches!(self, Connectivity::ConnectedMetered)
    }
}

/// Network monitor trait
///
/// Provides network connectivity information to allow the core to:
/// - Skip automatic downloads on metered connections
/// - Restart failed downloads when connectivity returns
///
/// # Platform Support
///
/// - **Desktop**: Polling reachability probe (`bridge-desktop`)
/// - **iOS**: Network framework, Reachability
/// - **Android**: ConnectivityManager
///
/// # Example
///
/// ```ignore
/// use bridge_traits::network::{Connectivity, NetworkMonitor};
///
/// async fn may_auto_download(monitor: &dyn NetworkMonitor) -> bool {
///     monitor.connectivity().await == Connectivity::Connected
/// }
/// ```
#[async_trait]
pub trait NetworkMonitor: Send + Sync {
    /// Get current network information
    async fn get_network_info(&self) -> Result<NetworkInfo>;

    /// Current connectivity; lookup errors read as unavailable.
    async fn connectivity(&self) -> Connectivity {
        self.get_network_info()
            .await
            .map(|info| info.connectivity())
            .unwrap_or(Connectivity::Unavailable)
    }

    /// Check if currently connected to any network
    async fn is_connected(&self) -> bool {
        self.connectivity().await.is_connected()
    }

    /// Check if connection is metered
    async fn is_metered(&self) -> bool {
        self.connectivity().await.is_metered()
    }

    /// Subscribe to network status changes
    ///
    /// Returns a stream of network info updates. Implementations should
    /// emit an event whenever network status changes.
    async fn subscribe_changes(&self) -> Result<Box<dyn NetworkChangeStream>>;
}

/// Stream of network status changes
#[async_trait]
pub trait NetworkChangeStream: Send {
    /// Get the next network info update
    ///
    /// Returns `None` when the stream is closed.
    async fn next(&mut self) -> Option<NetworkInfo>;
}
