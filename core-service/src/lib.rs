//! Core service façade and bootstrap helpers.
//!
//! This crate wires host-provided bridge implementations (transfers, media
//! detection, file system, connectivity, analytics) into the download engine.
//! Desktop apps typically enable the `desktop-shims` feature, which lets
//! [`CoreConfigBuilder`](core_runtime::config::CoreConfigBuilder) fall back to
//! the `bridge-desktop` adapters for anything the host did not inject.

pub mod error;

pub use error::{CoreError, Result};

use std::path::Path;
use std::sync::Arc;

use core_downloads::db::{create_pool, DatabaseConfig};
use core_downloads::{
    AutoDownloadPolicy, DownloadCatalog, DownloadConfig, DownloadOrchestrator, FeedSource,
    OrchestratorDeps, SqliteDownloadCatalog,
};
use core_runtime::config::CoreConfig;
use tokio::task::JoinHandle;
use tracing::{info, instrument};

/// Primary façade exposed to host applications.
///
/// Owns the download queue, the automatic download policy and, when network
/// awareness is on, the task that restarts failed downloads on reconnect.
pub struct DownloadService {
    orchestrator: DownloadOrchestrator,
    policy: AutoDownloadPolicy,
    connectivity_watcher: Option<JoinHandle<()>>,
}

impl DownloadService {
    /// Open the catalog and start the download queue.
    ///
    /// `CoreConfig::downloads_dir` overrides the directory in `downloads`.
    /// Automatic downloads are on only when both the feature flag and
    /// `DownloadConfig::auto_download_enabled` say so.
    ///
    /// ```ignore
    /// let core = CoreConfig::builder()
    ///     .database_path("/data/downloads.db")
    ///     .enable_network_awareness(true)
    ///     .build()?;
    /// let service = DownloadService::bootstrap(core, DownloadConfig::default(), None).await?;
    /// service.orchestrator().download(post, DownloadReason::Manual).await;
    /// ```
    #[instrument(skip_all, fields(database = %core.database_path.display()))]
    pub async fn bootstrap(
        core: CoreConfig,
        mut downloads: DownloadConfig,
        feed: Option<Arc<dyn FeedSource>>,
    ) -> Result<Self> {
        if let Some(dir) = &core.downloads_dir {
            downloads = downloads.with_downloads_directory(dir.clone());
        }
        downloads.validate()?;

        if let Some(parent) = core
            .database_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
        {
            core.file_system.create_dir_all(parent).await?;
        }

        let catalog = open_catalog(&core.database_path).await?;

        let deps = OrchestratorDeps {
            catalog,
            transfer_client: Arc::clone(&core.transfer_client),
            media_sniffer: Arc::clone(&core.media_sniffer),
            file_system: Arc::clone(&core.file_system),
            analytics: Arc::clone(&core.analytics),
            clock: Arc::clone(&core.clock),
        };

        let orchestrator =
            DownloadOrchestrator::spawn(deps, downloads.clone(), core.network_monitor.clone())?;
        orchestrator.initialize().await?;

        let connectivity_watcher = match &core.network_monitor {
            Some(monitor) if core.features.enable_network_awareness => {
                Some(orchestrator.watch_connectivity(Arc::clone(monitor)))
            }
            _ => None,
        };

        let auto_enabled = core.features.enable_auto_download && downloads.auto_download_enabled;
        let mut policy =
            AutoDownloadPolicy::new(orchestrator.clone(), core.network_monitor.clone(), auto_enabled);
        if let Some(feed) = feed {
            policy = policy.with_feed(feed);
        }

        info!(
            auto_download = auto_enabled,
            network_awareness = connectivity_watcher.is_some(),
            "Download service ready"
        );

        Ok(Self {
            orchestrator,
            policy,
            connectivity_watcher,
        })
    }

    pub fn orchestrator(&self) -> &DownloadOrchestrator {
        &self.orchestrator
    }

    pub fn policy(&self) -> &AutoDownloadPolicy {
        &self.policy
    }

    /// Whether failed downloads restart on reconnect.
    pub fn is_watching_connectivity(&self) -> bool {
        self.connectivity_watcher.is_some()
    }

    /// Stop the connectivity watcher, cancel running transfers and stop the
    /// queue.
    pub async fn shutdown(mut self) {
        if let Some(watcher) = self.connectivity_watcher.take() {
            watcher.abort();
        }
        self.orchestrator.shutdown().await;
        info!("Download service stopped");
    }
}

async fn open_catalog(path: &Path) -> Result<Arc<dyn DownloadCatalog>> {
    let pool = create_pool(DatabaseConfig::new(path)).await?;
    let catalog = SqliteDownloadCatalog::new(pool);
    catalog.initialize().await?;
    Ok(Arc::new(catalog))
}
