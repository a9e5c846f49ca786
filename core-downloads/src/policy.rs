//! # Automatic Download Policy
//!
//! Decides when new episodes are downloaded without a user request and which
//! automatic downloads are evicted to respect the automatic budget.
//!
//! A post is downloaded automatically only when:
//! - the global switch is on
//! - the post's channel opted in
//! - the device is connected to an unmetered network
//! - the post is not downloaded yet
//!
//! Eviction itself happens inside the download queue, right before a new
//! automatic record is added, so the budget holds with concurrent callers.

use async_trait::async_trait;
use bridge_traits::{Connectivity, NetworkMonitor};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, instrument};

use crate::error::Result;
use crate::models::{DownloadReason, DownloadRecord, PostSnapshot};
use crate::orchestrator::DownloadOrchestrator;

/// Source of the current feed snapshot for batch automatic downloads.
#[async_trait]
pub trait FeedSource: Send + Sync {
    /// Latest posts of the subscribed channels.
    async fn latest_posts(&self) -> Result<Vec<PostSnapshot>>;
}

/// Ids of the automatic records to evict before `incoming_id` is added.
///
/// Evicts oldest-enqueued first (ties broken by id) until fewer than
/// `max_automatic` automatic records remain. `incoming_id` itself is never a
/// victim and is not counted.
pub fn select_eviction_victims<'a, I>(
    records: I,
    max_automatic: usize,
    incoming_id: &str,
) -> Vec<String>
where
    I: IntoIterator<Item = &'a DownloadRecord>,
{
    let mut automatic: Vec<&DownloadRecord> = records
        .into_iter()
        .filter(|r| r.is_automatic() && r.id != incoming_id)
        .collect();

    if automatic.len() < max_automatic {
        return Vec::new();
    }

    automatic.sort_by(|a, b| a.enqueued_at.cmp(&b.enqueued_at).then_with(|| a.id.cmp(&b.id)));

    let excess = automatic.len() + 1 - max_automatic.max(1);
    automatic
        .into_iter()
        .take(excess)
        .map(|r| r.id.clone())
        .collect()
}

/// Automatic download policy.
///
/// Cloning is cheap; clones share the global switch.
#[derive(Clone)]
pub struct AutoDownloadPolicy {
    orchestrator: DownloadOrchestrator,
    network_monitor: Option<Arc<dyn NetworkMonitor>>,
    feed: Option<Arc<dyn FeedSource>>,
    enabled: Arc<AtomicBool>,
}

impl AutoDownloadPolicy {
    pub fn new(
        orchestrator: DownloadOrchestrator,
        network_monitor: Option<Arc<dyn NetworkMonitor>>,
        enabled: bool,
    ) -> Self {
        Self {
            orchestrator,
            network_monitor,
            feed: None,
            enabled: Arc::new(AtomicBool::new(enabled)),
        }
    }

    pub fn with_feed(mut self, feed: Arc<dyn FeedSource>) -> Self {
        self.feed = Some(feed);
        self
    }

    pub fn set_enabled(&self, enabled: bool) {
        info!(enabled, "Automatic downloads toggled");
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    async fn connectivity(&self) -> Connectivity {
        match &self.network_monitor {
            Some(monitor) => monitor.connectivity().await,
            None => Connectivity::Unavailable,
        }
    }

    async fn eligible(&self, post: &PostSnapshot, connectivity: Connectivity) -> bool {
        if !self.is_enabled() {
            debug!(post_id = %post.id, "Automatic downloads disabled");
            return false;
        }
        if !post.channel_auto_download {
            debug!(post_id = %post.id, "Channel did not opt in to automatic downloads");
            return false;
        }
        if post.media_url.is_none() {
            debug!(post_id = %post.id, "Post has no media");
            return false;
        }
        if connectivity != Connectivity::Connected {
            debug!(post_id = %post.id, ?connectivity, "No unmetered connection");
            return false;
        }
        !self.orchestrator.is_post_downloaded(&post.id).await
    }

    /// Download `post` automatically when the policy allows it.
    ///
    /// Returns whether a download was requested.
    #[instrument(skip(self, post), fields(post_id = %post.id))]
    pub async fn auto_download_new_episode_if_needed(&self, post: PostSnapshot) -> bool {
        let connectivity = self.connectivity().await;
        if !self.eligible(&post, connectivity).await {
            return false;
        }
        self.orchestrator
            .download(post, DownloadReason::Automatic)
            .await;
        true
    }

    /// Batch variant over the feed snapshot.
    ///
    /// Returns how many downloads were requested.
    #[instrument(skip(self))]
    pub async fn auto_download_new_episodes_if_needed(&self) -> Result<usize> {
        let Some(feed) = &self.feed else {
            debug!("No feed source configured");
            return Ok(0);
        };
        if !self.is_enabled() {
            return Ok(0);
        }

        let connectivity = self.connectivity().await;
        if connectivity != Connectivity::Connected {
            debug!(?connectivity, "Skipping automatic downloads");
            return Ok(0);
        }

        let posts = feed.latest_posts().await?;
        let mut requested = 0;
        for post in posts {
            if self.eligible(&post, connectivity).await {
                self.orchestrator
                    .download(post, DownloadReason::Automatic)
                    .await;
                requested += 1;
            }
        }

        info!(requested, "Automatic download pass finished");
        Ok(requested)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap()
    }

    fn record(id: &str, reason: DownloadReason, minutes: i64) -> DownloadRecord {
        let post = PostSnapshot::new(id, "c-1", t0())
            .with_media_url(format!("https://cdn.example.com/{}.mp3", id));
        DownloadRecord::new(post, reason, t0() + Duration::minutes(minutes)).unwrap()
    }

    #[test]
    fn test_no_victims_below_budget() {
        let records: Vec<_> = (0..9)
            .map(|i| record(&format!("a{}", i), DownloadReason::Automatic, i))
            .collect();
        assert!(select_eviction_victims(&records, 10, "new").is_empty());
    }

    #[test]
    fn test_oldest_automatic_evicted_at_budget() {
        let mut records: Vec<_> = (0..10)
            .map(|i| record(&format!("a{}", i), DownloadReason::Automatic, 10 - i))
            .collect();
        records.push(record("manual-oldest", DownloadReason::Manual, -100));

        assert_eq!(select_eviction_victims(&records, 10, "new"), vec!["a9"]);
    }

    #[test]
    fn test_excess_evicted_in_fifo_order_with_id_tiebreak() {
        let records = vec![
            record("b", DownloadReason::Automatic, 0),
            record("a", DownloadReason::Automatic, 0),
            record("c", DownloadReason::Automatic, 5),
            record("d", DownloadReason::Automatic, 6),
        ];
        assert_eq!(select_eviction_victims(&records, 2, "new"), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_incoming_record_is_not_counted() {
        let records = vec![
            record("x", DownloadReason::Automatic, 0),
            record("y", DownloadReason::Automatic, 1),
        ];
        assert!(select_eviction_victims(&records, 2, "y").is_empty());
        assert_eq!(select_eviction_victims(&records, 2, "z"), vec!["x"]);
    }
}
