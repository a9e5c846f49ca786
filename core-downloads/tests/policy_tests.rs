mod common;

use async_trait::async_trait;
use bridge_traits::{Connectivity, NetworkMonitor};
use common::*;
use core_downloads::{
    AutoDownloadPolicy, DownloadError, DownloadReason, DownloadStatus, FeedSource, PostSnapshot,
    Result,
};
use std::sync::Arc;

struct StaticFeed(Vec<PostSnapshot>);

#[async_trait]
impl FeedSource for StaticFeed {
    async fn latest_posts(&self) -> Result<Vec<PostSnapshot>> {
        Ok(self.0.clone())
    }
}

struct BrokenFeed;

#[async_trait]
impl FeedSource for BrokenFeed {
    async fn latest_posts(&self) -> Result<Vec<PostSnapshot>> {
        Err(DownloadError::InvalidConfig("feed offline".to_string()))
    }
}

fn policy_for(h: &Harness) -> AutoDownloadPolicy {
    let monitor: Arc<dyn NetworkMonitor> = h.monitor.clone();
    AutoDownloadPolicy::new(h.orchestrator.clone(), Some(monitor), true)
}

#[tokio::test]
async fn test_opted_in_post_downloads_on_unmetered_network() {
    let h = Harness::new().await;
    let policy = policy_for(&h);

    assert!(policy.auto_download_new_episode_if_needed(auto_post("n", "c-1")).await);

    let record = h.orchestrator.item("n").await.unwrap();
    assert_eq!(record.reason, DownloadReason::Automatic);
    h.wait_for_status("n", DownloadStatus::Success).await;

    // Already downloaded.
    assert!(!policy.auto_download_new_episode_if_needed(auto_post("n", "c-1")).await);
}

#[tokio::test]
async fn test_ineligible_posts_are_skipped() {
    let h = Harness::new().await;
    let policy = policy_for(&h);

    assert!(!policy.auto_download_new_episode_if_needed(post("no-opt-in", "c-1")).await);

    let mut bare = auto_post("bare", "c-1");
    bare.media_url = None;
    assert!(!policy.auto_download_new_episode_if_needed(bare).await);

    h.monitor.set(Connectivity::ConnectedMetered);
    assert!(!policy.auto_download_new_episode_if_needed(auto_post("metered", "c-1")).await);

    h.monitor.set(Connectivity::Unavailable);
    assert!(!policy.auto_download_new_episode_if_needed(auto_post("offline", "c-1")).await);

    h.monitor.set(Connectivity::Connected);
    policy.set_enabled(false);
    assert!(!policy.is_enabled());
    assert!(!policy.auto_download_new_episode_if_needed(auto_post("disabled", "c-1")).await);

    assert!(h.orchestrator.items().await.is_empty());
    assert!(h.transfers.requests().is_empty());
}

#[tokio::test]
async fn test_missing_monitor_counts_as_offline() {
    let h = Harness::new().await;
    let policy = AutoDownloadPolicy::new(h.orchestrator.clone(), None, true);

    assert!(!policy.auto_download_new_episode_if_needed(auto_post("x", "c-1")).await);
}

#[tokio::test]
async fn test_clones_share_the_switch() {
    let h = Harness::new().await;
    let policy = policy_for(&h);
    let clone = policy.clone();

    clone.set_enabled(false);
    assert!(!policy.is_enabled());
}

#[tokio::test]
async fn test_batch_pass_over_feed() {
    let h = Harness::new().await;
    let feed = StaticFeed(vec![
        auto_post("e1", "news"),
        auto_post("e2", "news"),
        post("manual-only", "sports"),
    ]);
    let policy = policy_for(&h).with_feed(Arc::new(feed));

    assert_eq!(policy.auto_download_new_episodes_if_needed().await.unwrap(), 2);
    h.wait_for_status("e1", DownloadStatus::Success).await;
    h.wait_for_status("e2", DownloadStatus::Success).await;

    // Second pass finds nothing new.
    assert_eq!(policy.auto_download_new_episodes_if_needed().await.unwrap(), 0);
}

#[tokio::test]
async fn test_batch_pass_respects_budget() {
    let h = Harness::with_config(test_config().with_max_automatic_downloads(3)).await;
    let feed = StaticFeed((1..=5).map(|i| auto_post(&format!("e{}", i), "news")).collect());
    let policy = policy_for(&h).with_feed(Arc::new(feed));

    assert_eq!(policy.auto_download_new_episodes_if_needed().await.unwrap(), 5);

    let ids: Vec<String> = h
        .orchestrator
        .items()
        .await
        .into_iter()
        .map(|r| r.id)
        .collect();
    assert_eq!(ids, vec!["e3", "e4", "e5"]);
}

#[tokio::test]
async fn test_batch_pass_without_feed_or_connection() {
    let h = Harness::new().await;

    assert_eq!(
        policy_for(&h).auto_download_new_episodes_if_needed().await.unwrap(),
        0
    );

    let metered = policy_for(&h).with_feed(Arc::new(StaticFeed(vec![auto_post("m", "c-1")])));
    h.monitor.set(Connectivity::ConnectedMetered);
    assert_eq!(metered.auto_download_new_episodes_if_needed().await.unwrap(), 0);

    h.monitor.set(Connectivity::Connected);
    let broken = policy_for(&h).with_feed(Arc::new(BrokenFeed));
    assert!(broken.auto_download_new_episodes_if_needed().await.is_err());
}
