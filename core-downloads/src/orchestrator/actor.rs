//! The download queue actor.
//!
//! Owns the record map and applies every mutation in command order. Catalog
//! writes, listener notifications and analytics for one id therefore happen
//! in the order the mutations were requested.

use bridge_traits::{
    AnalyticsEvent, AnalyticsSink, Clock, Connectivity, FileSystemAccess, MediaTypeSniffer,
    TransferClient,
};
use core_runtime::logging::{redact_url, strip_path};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{UnboundedReceiver, WeakUnboundedSender};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::attempt::{spawn_attempt, AttemptContext};
use super::messages::{AttemptId, AttemptOutcome, Command};
use crate::catalog::DownloadCatalog;
use crate::config::DownloadConfig;
use crate::error::Result;
use crate::events::DownloadEvent;
use crate::listeners::ListenerRegistry;
use crate::models::{DownloadReason, DownloadRecord, DownloadStatus, PostSnapshot};
use crate::policy::select_eviction_victims;

/// Collaborators of the download queue.
#[derive(Clone)]
pub struct OrchestratorDeps {
    pub catalog: Arc<dyn DownloadCatalog>,
    pub transfer_client: Arc<dyn TransferClient>,
    pub media_sniffer: Arc<dyn MediaTypeSniffer>,
    pub file_system: Arc<dyn FileSystemAccess>,
    pub analytics: Arc<dyn AnalyticsSink>,
    pub clock: Arc<dyn Clock>,
}

struct ActiveAttempt {
    attempt: AttemptId,
    token: CancellationToken,
    handle: JoinHandle<()>,
}

pub(crate) struct QueueActor {
    deps: OrchestratorDeps,
    config: DownloadConfig,
    listeners: ListenerRegistry,
    commands: WeakUnboundedSender<Command>,
    records: HashMap<String, DownloadRecord>,
    active: HashMap<String, ActiveAttempt>,
    /// Cancelled attempts that may still be cleaning up
    retired: HashMap<String, JoinHandle<()>>,
    next_attempt: AttemptId,
}

impl QueueActor {
    pub(crate) fn new(
        deps: OrchestratorDeps,
        config: DownloadConfig,
        listeners: ListenerRegistry,
        commands: WeakUnboundedSender<Command>,
    ) -> Self {
        Self {
            deps,
            config,
            listeners,
            commands,
            records: HashMap::new(),
            active: HashMap::new(),
            retired: HashMap::new(),
            next_attempt: 1,
        }
    }

    pub(crate) async fn run(mut self, mut inbox: UnboundedReceiver<Command>) {
        debug!("Download queue started");
        while let Some(command) = inbox.recv().await {
            match command {
                Command::Shutdown { reply } => {
                    self.cancel_all();
                    let _ = reply.send(());
                    break;
                }
                command => self.handle(command).await,
            }
        }
        debug!("Download queue stopped");
    }

    async fn handle(&mut self, command: Command) {
        match command {
            Command::Initialize { reply } => {
                let _ = reply.send(self.initialize().await);
            }
            Command::Download {
                post,
                reason,
                reply,
            } => {
                self.download(post, reason).await;
                let _ = reply.send(());
            }
            Command::Remove { id, reply } => {
                self.remove(&id).await;
                let _ = reply.send(());
            }
            Command::RemoveAutoDownloads { channel_id, reply } => {
                self.remove_auto_downloads(&channel_id).await;
                let _ = reply.send(());
            }
            Command::RemoveAll { reply } => {
                self.remove_all().await;
                let _ = reply.send(());
            }
            Command::UpdateItems { reply } => {
                self.update_items().await;
                let _ = reply.send(());
            }
            Command::UpdatePost { post, reply } => {
                self.update_post(post).await;
                let _ = reply.send(());
            }
            Command::RestartFailed {
                connectivity,
                reply,
            } => {
                self.restart_failed(connectivity).await;
                let _ = reply.send(());
            }
            Command::IsPostDownloaded { id, reply } => {
                let downloaded = self
                    .records
                    .get(&id)
                    .map(DownloadRecord::is_downloaded)
                    .unwrap_or(false);
                let _ = reply.send(downloaded);
            }
            Command::GetFileUrl { id, reply } => {
                let file = self
                    .records
                    .get(&id)
                    .filter(|r| r.is_downloaded())
                    .and_then(|r| r.local_file.clone());
                let _ = reply.send(file);
            }
            Command::Item { id, reply } => {
                let _ = reply.send(self.records.get(&id).cloned());
            }
            Command::Items { reply } => {
                let mut items: Vec<DownloadRecord> = self.records.values().cloned().collect();
                items.sort_by(|a, b| {
                    a.enqueued_at
                        .cmp(&b.enqueued_at)
                        .then_with(|| a.id.cmp(&b.id))
                });
                let _ = reply.send(items);
            }
            Command::Progress {
                id,
                attempt,
                progress,
            } => self.apply_progress(&id, attempt, progress),
            Command::Finished {
                id,
                attempt,
                outcome,
            } => self.finish(&id, attempt, outcome).await,
            Command::Shutdown { reply } => {
                let _ = reply.send(());
            }
        }
    }

    // ========================================================================
    // Persistence helpers
    // ========================================================================

    async fn persist(&self, record: &DownloadRecord) {
        match self.deps.catalog.insert_or_update(record).await {
            Ok(true) => {}
            Ok(false) => warn!(id = %record.id, status = %record.status, "Catalog did not store download"),
            Err(e) => warn!(id = %record.id, status = %record.status, error = %e, "Failed to persist download"),
        }
    }

    async fn unpersist(&self, id: &str) {
        match self.deps.catalog.remove(id).await {
            Ok(true) => {}
            Ok(false) => debug!(id, "No catalog row to remove"),
            Err(e) => warn!(id, error = %e, "Failed to remove download from catalog"),
        }
    }

    async fn delete_file(&self, path: &Path) {
        match self.deps.file_system.remove_file_if_exists(path).await {
            Ok(true) => debug!(file = %strip_path(&path.to_string_lossy()), "Deleted downloaded file"),
            Ok(false) => {}
            Err(e) => warn!(
                file = %strip_path(&path.to_string_lossy()),
                error = %e,
                "Failed to delete downloaded file"
            ),
        }
    }

    fn notify_state(&self, record: &DownloadRecord) {
        self.listeners
            .notify(DownloadEvent::StateChanged(record.clone()));
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    async fn initialize(&mut self) -> Result<()> {
        let rows = self.deps.catalog.fetch_all().await?;
        let mut records = HashMap::with_capacity(rows.len());

        for mut record in rows {
            if record.status.is_in_flight() && !self.active.contains_key(&record.id) {
                info!(id = %record.id, "Marking interrupted download as failed");
                record.status = DownloadStatus::Failure;
                record.prev_status = Some(DownloadStatus::Progress);
                record.local_file = None;
                self.persist(&record).await;
            }
            records.insert(record.id.clone(), record);
        }

        // Anything running keeps its in-memory state.
        for id in self.active.keys() {
            if let Some(record) = self.records.get(id) {
                records.insert(id.clone(), record.clone());
            }
        }

        info!(count = records.len(), "Download queue loaded");
        self.records = records;
        self.listeners.notify(DownloadEvent::QueueRefreshed);
        Ok(())
    }

    async fn download(&mut self, post: PostSnapshot, reason: DownloadReason) {
        let Some(url) = post.media_url.clone().filter(|u| !u.trim().is_empty()) else {
            warn!(post_id = %post.id, "Cannot download a post without media");
            return;
        };

        let existing = self.records.get(&post.id);
        if let Some(existing) = existing {
            if existing.is_downloaded() {
                debug!(post_id = %post.id, "Post already downloaded");
                return;
            }
            if existing.status.is_in_flight() && self.active.contains_key(&post.id) {
                debug!(post_id = %post.id, "Download already running");
                return;
            }
        }

        // A manual request always wins over an automatic one.
        let reason = match existing.map(|r| r.reason) {
            Some(DownloadReason::Manual) => DownloadReason::Manual,
            _ => reason,
        };
        let attempts = match (reason, existing) {
            (DownloadReason::Automatic, Some(existing)) => existing.attempts,
            _ => 0,
        };
        let is_new_automatic = reason == DownloadReason::Automatic
            && !existing.map(DownloadRecord::is_automatic).unwrap_or(false);

        if is_new_automatic {
            self.evict_for(&post.id).await;
        }

        let record = match DownloadRecord::new(post, reason, self.deps.clock.now()) {
            Ok(mut record) => {
                record.attempts = attempts;
                record
            }
            Err(e) => {
                warn!(error = %e, "Rejected download request");
                return;
            }
        };

        info!(
            post_id = %record.id,
            reason = %record.reason,
            source_url = %redact_url(&url),
            "Download requested"
        );

        self.persist(&record).await;
        self.notify_state(&record);
        self.deps.analytics.track(
            AnalyticsEvent::new("download_started")
                .with_property("post_id", record.id.clone())
                .with_property("channel_id", record.post.channel_id.clone())
                .with_property("reason", record.reason.as_str()),
        );

        let id = record.id.clone();
        self.records.insert(id.clone(), record);
        self.start_attempt(&id, Duration::ZERO).await;
    }

    async fn evict_for(&mut self, incoming_id: &str) {
        let victims = select_eviction_victims(
            self.records.values(),
            self.config.max_automatic_downloads,
            incoming_id,
        );
        for victim in victims {
            info!(id = %victim, "Evicting oldest automatic download");
            self.remove(&victim).await;
        }
    }

    async fn start_attempt(&mut self, id: &str, delay: Duration) {
        let Some(commands) = self.commands.upgrade() else {
            debug!(id, "Download queue is shutting down, not starting transfer");
            return;
        };

        let previous = self.take_previous_attempt(id);

        let Some(record) = self.records.get_mut(id) else {
            return;
        };
        record.attempts = record.attempts.saturating_add(1);
        record.mark_in_progress();
        let snapshot = record.clone();

        self.persist(&snapshot).await;
        self.notify_state(&snapshot);

        let attempt = self.next_attempt;
        self.next_attempt += 1;
        let token = CancellationToken::new();

        let handle = spawn_attempt(AttemptContext {
            id: id.to_string(),
            attempt,
            url: snapshot.source_url.clone(),
            delay,
            previous,
            token: token.clone(),
            downloads_directory: self.config.downloads_directory.clone(),
            progress_threshold: self.config.progress_threshold,
            transfer_client: Arc::clone(&self.deps.transfer_client),
            media_sniffer: Arc::clone(&self.deps.media_sniffer),
            file_system: Arc::clone(&self.deps.file_system),
            commands,
        });

        debug!(id, attempt, attempts = snapshot.attempts, "Transfer attempt spawned");
        self.active.insert(
            id.to_string(),
            ActiveAttempt {
                attempt,
                token,
                handle,
            },
        );
    }

    /// Cancel the running attempt for `id`, if any, and keep its handle so
    /// the next attempt can wait for its cleanup.
    fn cancel_attempt(&mut self, id: &str) {
        if let Some(active) = self.active.remove(id) {
            debug!(id, attempt = active.attempt, "Cancelling transfer");
            active.token.cancel();
            self.retired.retain(|_, handle| !handle.is_finished());
            self.retired.insert(id.to_string(), active.handle);
        }
    }

    fn take_previous_attempt(&mut self, id: &str) -> Option<JoinHandle<()>> {
        self.cancel_attempt(id);
        self.retired.remove(id)
    }

    fn cancel_all(&mut self) {
        for (id, active) in self.active.drain() {
            debug!(id = %id, "Cancelling transfer on shutdown");
            active.token.cancel();
        }
    }

    fn apply_progress(&mut self, id: &str, attempt: AttemptId, progress: f64) {
        if !self.is_current(id, attempt) {
            return;
        }
        if let Some(record) = self.records.get_mut(id) {
            if record.apply_progress(progress) {
                self.listeners.notify(DownloadEvent::ProgressChanged {
                    id: id.to_string(),
                    progress: record.progress,
                });
            }
        }
    }

    fn is_current(&self, id: &str, attempt: AttemptId) -> bool {
        self.active
            .get(id)
            .map(|active| active.attempt == attempt)
            .unwrap_or(false)
    }

    async fn finish(&mut self, id: &str, attempt: AttemptId, outcome: AttemptOutcome) {
        if !self.is_current(id, attempt) {
            debug!(id, attempt, "Ignoring outcome of a stale attempt");
            if let AttemptOutcome::Completed(path) = outcome {
                let owned = self
                    .records
                    .get(id)
                    .and_then(|r| r.local_file.as_deref())
                    .map(|file| file == path.as_path())
                    .unwrap_or(false);
                if !owned {
                    self.delete_file(&path).await;
                }
            }
            return;
        }
        self.active.remove(id);

        let Some(record) = self.records.get_mut(id) else {
            return;
        };

        match outcome {
            AttemptOutcome::Completed(path) => {
                record.mark_succeeded(path);
                let snapshot = record.clone();
                info!(id, attempts = snapshot.attempts, "Download completed");
                self.persist(&snapshot).await;
                self.notify_state(&snapshot);
            }
            AttemptOutcome::Failed(message) => {
                record.mark_failed();
                let snapshot = record.clone();
                warn!(id, attempts = snapshot.attempts, error = %message, "Download failed");
                self.persist(&snapshot).await;
                self.notify_state(&snapshot);
                self.deps.analytics.track(
                    AnalyticsEvent::new("download_failed")
                        .with_property("post_id", id)
                        .with_property("reason", snapshot.reason.as_str())
                        .with_property("attempts", snapshot.attempts.to_string())
                        .with_property("error", message),
                );
            }
        }
    }

    // ========================================================================
    // Removal
    // ========================================================================

    async fn remove(&mut self, id: &str) {
        self.cancel_attempt(id);

        let file = self.records.get(id).and_then(|r| r.local_file.clone());
        if let Some(file) = file {
            self.delete_file(&file).await;
        }
        self.unpersist(id).await;

        if let Some(mut record) = self.records.remove(id) {
            record.reset_removed();
            info!(id, "Download removed");
            self.notify_state(&record);
        }
    }

    async fn remove_auto_downloads(&mut self, channel_id: &str) {
        let mut ids: Vec<String> = self
            .records
            .values()
            .filter(|r| r.is_automatic() && r.post.channel_id == channel_id)
            .map(|r| r.id.clone())
            .collect();
        ids.sort();

        info!(channel_id, count = ids.len(), "Removing automatic downloads of channel");
        for id in ids {
            self.remove(&id).await;
        }
    }

    async fn remove_all(&mut self) {
        let mut ids: HashSet<String> = self.records.keys().cloned().collect();
        match self.deps.catalog.fetch_all().await {
            Ok(rows) => ids.extend(rows.into_iter().map(|r| r.id)),
            Err(e) => warn!(error = %e, "Could not list catalog rows, removing known downloads only"),
        }

        let files: Vec<PathBuf> = self
            .records
            .values()
            .filter_map(|r| r.local_file.clone())
            .collect();

        for id in &ids {
            self.cancel_attempt(id);
        }
        for file in files {
            self.delete_file(&file).await;
        }
        for id in &ids {
            self.unpersist(id).await;
        }

        info!(count = ids.len(), "All downloads removed");
        self.records.clear();
        self.listeners.notify(DownloadEvent::AllRemoved);
    }

    // ========================================================================
    // Refresh and updates
    // ========================================================================

    async fn update_items(&mut self) {
        let rows = match self.deps.catalog.fetch_all().await {
            Ok(rows) => rows,
            Err(e) => {
                warn!(error = %e, "Failed to reload downloads, keeping current queue");
                return;
            }
        };

        let mut records: HashMap<String, DownloadRecord> =
            rows.into_iter().map(|r| (r.id.clone(), r)).collect();
        for id in self.active.keys() {
            if let Some(record) = self.records.get(id) {
                records.insert(id.clone(), record.clone());
            }
        }

        debug!(count = records.len(), "Download queue reloaded");
        self.records = records;
        self.listeners.notify(DownloadEvent::QueueRefreshed);
    }

    async fn update_post(&mut self, post: PostSnapshot) {
        let Some(record) = self.records.get_mut(&post.id) else {
            debug!(post_id = %post.id, "No download for updated post");
            return;
        };
        record.post = post;
        let snapshot = record.clone();
        self.persist(&snapshot).await;
        self.notify_state(&snapshot);
    }

    async fn restart_failed(&mut self, connectivity: Connectivity) {
        match connectivity {
            Connectivity::ConnectedMetered => {
                debug!("Metered connection, not restarting failed downloads");
                return;
            }
            Connectivity::Unavailable => {
                debug!("Offline, not restarting failed downloads");
                return;
            }
            Connectivity::Connected => {}
        }

        let mut failed: Vec<&DownloadRecord> = self
            .records
            .values()
            .filter(|r| r.status == DownloadStatus::Failure && !self.active.contains_key(&r.id))
            .collect();
        failed.sort_by(|a, b| a.enqueued_at.cmp(&b.enqueued_at).then_with(|| a.id.cmp(&b.id)));

        let max_attempts = self.config.max_retry_attempts;
        let (retry, exhausted): (Vec<&DownloadRecord>, Vec<&DownloadRecord>) =
            failed.into_iter().partition(|r| r.attempts < max_attempts);

        for record in exhausted {
            debug!(id = %record.id, attempts = record.attempts, "Retry budget exhausted");
        }

        let retry: Vec<(String, u32)> = retry
            .into_iter()
            .map(|r| (r.id.clone(), r.attempts))
            .collect();

        if !retry.is_empty() {
            info!(count = retry.len(), "Restarting failed downloads");
        }

        for (id, attempts) in retry {
            let Some(record) = self.records.get_mut(&id) else {
                continue;
            };
            record.mark_start();
            let snapshot = record.clone();
            self.persist(&snapshot).await;
            self.notify_state(&snapshot);

            let delay = self.config.retry_delay(attempts);
            self.start_attempt(&id, delay).await;
        }
    }
}
