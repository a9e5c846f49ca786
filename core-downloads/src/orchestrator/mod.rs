//! # Download Orchestrator
//!
//! Owns the download queue: starts transfers, tracks their progress, persists
//! every state change and fans events out to listeners.
//!
//! ## Architecture
//!
//! [`DownloadOrchestrator`] is a cheap-to-clone handle. All mutations go
//! through one actor task that owns the record map, so callers on any thread
//! see a consistent queue without locks. Each transfer attempt runs on its own
//! task and reports back to the actor; listeners are served by the
//! [`ListenerRegistry`] notification task.
//!
//! ```text
//!  caller ──Command──▶ queue actor ──spawn──▶ attempt task ──▶ TransferClient
//!                        │   ▲                    │
//!                        │   └──Progress/Finished─┘
//!                        ├──▶ DownloadCatalog
//!                        └──▶ ListenerRegistry ──▶ subscribers
//! ```
//!
//! Mutating operations resolve once the actor applied them. Their outcome is
//! only visible through events and the accessors.
//!
//! ## Usage
//!
//! ```ignore
//! let orchestrator = DownloadOrchestrator::spawn(deps, DownloadConfig::default(), None)?;
//! orchestrator.initialize().await?;
//!
//! let mut subscription = orchestrator.subscribe();
//! orchestrator.download(post, DownloadReason::Manual).await;
//! while let Some(event) = subscription.receiver.recv().await {
//!     // ...
//! }
//! ```

mod actor;
mod attempt;
mod messages;

pub use actor::OrchestratorDeps;

use bridge_traits::{Connectivity, NetworkMonitor};
use chrono::TimeZone;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedSender};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use crate::config::DownloadConfig;
use crate::error::{DownloadError, Result};
use crate::grouping::{group_by_day, DayGroup};
use crate::listeners::{ListenerId, ListenerRegistry, ListenerSubscription};
use crate::models::{DownloadReason, DownloadRecord, PostSnapshot};
use actor::QueueActor;
use messages::Command;

/// Handle to the download queue.
#[derive(Clone)]
pub struct DownloadOrchestrator {
    commands: UnboundedSender<Command>,
    listeners: ListenerRegistry,
    network_monitor: Option<Arc<dyn NetworkMonitor>>,
}

impl DownloadOrchestrator {
    /// Validate `config` and start the queue actor on the current tokio
    /// runtime.
    ///
    /// The queue starts empty; call [`initialize`](Self::initialize) to load
    /// the catalog.
    pub fn spawn(
        deps: OrchestratorDeps,
        config: DownloadConfig,
        network_monitor: Option<Arc<dyn NetworkMonitor>>,
    ) -> Result<Self> {
        config.validate()?;

        let listeners = ListenerRegistry::new();
        let (commands, inbox) = mpsc::unbounded_channel();
        let actor = QueueActor::new(deps, config, listeners.clone(), commands.downgrade());
        tokio::spawn(actor.run(inbox));

        Ok(Self {
            commands,
            listeners,
            network_monitor,
        })
    }

    async fn request<T>(&self, make: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(make(reply))
            .map_err(|_| DownloadError::ShutDown)?;
        response.await.map_err(|_| DownloadError::ShutDown)
    }

    async fn apply(&self, operation: &str, make: impl FnOnce(oneshot::Sender<()>) -> Command) {
        if self.request(make).await.is_err() {
            warn!(operation, "Download queue is not running");
        }
    }

    /// Load the catalog.
    ///
    /// Downloads interrupted by a previous process exit are marked failed so
    /// they are picked up by the next restart.
    #[instrument(skip(self))]
    pub async fn initialize(&self) -> Result<()> {
        self.request(|reply| Command::Initialize { reply }).await?
    }

    /// Download the media of `post`.
    ///
    /// No-op when the post has no media, is already downloaded or is being
    /// downloaded.
    #[instrument(skip(self, post), fields(post_id = %post.id))]
    pub async fn download(&self, post: PostSnapshot, reason: DownloadReason) {
        self.apply("download", |reply| Command::Download {
            post,
            reason,
            reply,
        })
        .await
    }

    /// Cancel, delete and forget the download of a post.
    #[instrument(skip(self))]
    pub async fn remove_from_downloads(&self, post_id: &str) {
        let id = post_id.to_string();
        self.apply("remove_from_downloads", |reply| Command::Remove { id, reply })
            .await
    }

    /// Remove every automatic download of a channel.
    #[instrument(skip(self))]
    pub async fn remove_auto_downloads(&self, channel_id: &str) {
        let channel_id = channel_id.to_string();
        self.apply("remove_auto_downloads", |reply| {
            Command::RemoveAutoDownloads { channel_id, reply }
        })
        .await
    }

    /// Remove every download. Listeners get a single `AllRemoved` event.
    #[instrument(skip(self))]
    pub async fn remove_all(&self) {
        self.apply("remove_all", |reply| Command::RemoveAll { reply })
            .await
    }

    /// Reload the queue from the catalog, keeping running downloads as they are.
    #[instrument(skip(self))]
    pub async fn update_items(&self) {
        self.apply("update_items", |reply| Command::UpdateItems { reply })
            .await
    }

    /// Replace the stored post metadata of an existing download.
    #[instrument(skip(self, post), fields(post_id = %post.id))]
    pub async fn update_post(&self, post: PostSnapshot) {
        self.apply("update_post", |reply| Command::UpdatePost { post, reply })
            .await
    }

    /// Restart failed downloads unless the connection is metered or down.
    #[instrument(skip(self))]
    pub async fn restart_failed_items_if_needed(&self) {
        let connectivity = match &self.network_monitor {
            Some(monitor) => monitor.connectivity().await,
            None => Connectivity::Connected,
        };
        self.restart_failed_items_with(connectivity).await
    }

    async fn restart_failed_items_with(&self, connectivity: Connectivity) {
        self.apply("restart_failed_items", |reply| Command::RestartFailed {
            connectivity,
            reply,
        })
        .await
    }

    pub async fn is_post_downloaded(&self, post_id: &str) -> bool {
        let id = post_id.to_string();
        self.request(|reply| Command::IsPostDownloaded { id, reply })
            .await
            .unwrap_or(false)
    }

    /// Local file of a completed download.
    pub async fn get_file_url(&self, post_id: &str) -> Option<PathBuf> {
        let id = post_id.to_string();
        self.request(|reply| Command::GetFileUrl { id, reply })
            .await
            .ok()
            .flatten()
    }

    pub async fn item(&self, post_id: &str) -> Option<DownloadRecord> {
        let id = post_id.to_string();
        self.request(|reply| Command::Item { id, reply })
            .await
            .ok()
            .flatten()
    }

    /// Every record, oldest enqueued first.
    pub async fn items(&self) -> Vec<DownloadRecord> {
        self.request(|reply| Command::Items { reply })
            .await
            .unwrap_or_default()
    }

    /// Records grouped by the local day they were enqueued, newest day first.
    pub async fn grouped_items<Tz: TimeZone>(&self, tz: &Tz) -> Vec<DayGroup> {
        let items = self.items().await;
        group_by_day(&items, tz)
    }

    pub fn subscribe(&self) -> ListenerSubscription {
        self.listeners.subscribe()
    }

    pub fn unsubscribe(&self, id: ListenerId) {
        self.listeners.unsubscribe(id)
    }

    /// Restart failed downloads whenever the device moves onto an unmetered
    /// connection.
    pub fn watch_connectivity(&self, monitor: Arc<dyn NetworkMonitor>) -> JoinHandle<()> {
        let orchestrator = self.clone();
        tokio::spawn(async move {
            let mut changes = match monitor.subscribe_changes().await {
                Ok(changes) => changes,
                Err(e) => {
                    warn!(error = %e, "Connectivity changes unavailable, retry on reconnect disabled");
                    return;
                }
            };

            let mut last = monitor.connectivity().await;
            info!(?last, "Watching connectivity");

            while let Some(info) = changes.next().await {
                let current = info.connectivity();
                if current == last {
                    continue;
                }
                debug!(from = ?last, to = ?current, "Connectivity changed");
                if current == Connectivity::Connected {
                    orchestrator.restart_failed_items_with(current).await;
                }
                last = current;
            }

            debug!("Connectivity stream closed");
        })
    }

    /// Cancel running transfers and stop the queue.
    ///
    /// Commands sent before the call are applied first.
    pub async fn shutdown(&self) {
        if self
            .request(|reply| Command::Shutdown { reply })
            .await
            .is_err()
        {
            debug!("Download queue already stopped");
        }
    }
}
