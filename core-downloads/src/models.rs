//! # Download Domain Models
//!
//! Records tracked by the download queue and the post metadata they carry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use crate::error::{DownloadError, Result};

/// Highest progress an in-flight record can report.
///
/// A progress of exactly 1.0 is reserved for completed downloads.
pub const MAX_IN_FLIGHT_PROGRESS: f64 = 0.99;

/// Denormalized post metadata stored alongside each download.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostSnapshot {
    pub id: String,
    pub title: String,
    pub published_at: DateTime<Utc>,
    pub channel_id: String,
    /// Whether the owning channel opted in to automatic downloads
    pub channel_auto_download: bool,
    /// Remote media location; posts without media cannot be downloaded
    pub media_url: Option<String>,
    /// Last known playback position
    pub playback_offset_secs: Option<f64>,
}

impl PostSnapshot {
    pub fn new(
        id: impl Into<String>,
        channel_id: impl Into<String>,
        published_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            title: String::new(),
            published_at,
            channel_id: channel_id.into(),
            channel_auto_download: false,
            media_url: None,
            playback_offset_secs: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_media_url(mut self, url: impl Into<String>) -> Self {
        self.media_url = Some(url.into());
        self
    }

    pub fn with_channel_auto_download(mut self, enabled: bool) -> Self {
        self.channel_auto_download = enabled;
        self
    }

    pub fn with_playback_offset(mut self, secs: f64) -> Self {
        self.playback_offset_secs = Some(secs);
        self
    }
}

/// Download lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DownloadStatus {
    Start,
    Progress,
    Success,
    Failure,
}

impl DownloadStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            DownloadStatus::Start => "start",
            DownloadStatus::Progress => "progress",
            DownloadStatus::Success => "success",
            DownloadStatus::Failure => "failure",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "start" => Some(DownloadStatus::Start),
            "progress" => Some(DownloadStatus::Progress),
            "success" => Some(DownloadStatus::Success),
            "failure" => Some(DownloadStatus::Failure),
            _ => None,
        }
    }

    /// Whether a transfer is expected to be running for a record in this state.
    pub fn is_in_flight(self) -> bool {
        matches!(self, DownloadStatus::Start | DownloadStatus::Progress)
    }
}

impl fmt::Display for DownloadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a download was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DownloadReason {
    /// Explicit user request
    Manual,
    /// Issued by the automatic download policy; subject to eviction
    Automatic,
}

impl DownloadReason {
    pub fn as_str(self) -> &'static str {
        match self {
            DownloadReason::Manual => "manual",
            DownloadReason::Automatic => "automatic",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "manual" => Some(DownloadReason::Manual),
            "automatic" => Some(DownloadReason::Automatic),
            _ => None,
        }
    }
}

impl fmt::Display for DownloadReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of the download queue, keyed by post id.
///
/// `local_file` is set exactly when `status` is [`DownloadStatus::Success`],
/// and `progress` is 1.0 exactly in that state too.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownloadRecord {
    pub id: String,
    pub post: PostSnapshot,
    pub status: DownloadStatus,
    pub prev_status: Option<DownloadStatus>,
    pub reason: DownloadReason,
    pub progress: f64,
    pub source_url: String,
    pub local_file: Option<PathBuf>,
    pub enqueued_at: DateTime<Utc>,
    /// Transfer attempts issued since the last manual request
    pub attempts: u32,
}

impl DownloadRecord {
    /// Build a fresh `Start` record for a post.
    ///
    /// Fails when the post has no media URL.
    pub fn new(
        post: PostSnapshot,
        reason: DownloadReason,
        enqueued_at: DateTime<Utc>,
    ) -> Result<Self> {
        let source_url = post
            .media_url
            .clone()
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| DownloadError::InvalidInput {
                field: "media_url".to_string(),
                message: format!("post {} has no media url", post.id),
            })?;

        Ok(Self {
            id: post.id.clone(),
            post,
            status: DownloadStatus::Start,
            prev_status: None,
            reason,
            progress: 0.0,
            source_url,
            local_file: None,
            enqueued_at,
            attempts: 0,
        })
    }

    pub fn is_downloaded(&self) -> bool {
        self.status == DownloadStatus::Success
    }

    pub fn is_automatic(&self) -> bool {
        self.reason == DownloadReason::Automatic
    }

    fn transition(&mut self, status: DownloadStatus) {
        self.prev_status = Some(self.status);
        self.status = status;
    }

    /// Re-arm the record for a new transfer attempt.
    pub fn mark_start(&mut self) {
        self.transition(DownloadStatus::Start);
        self.progress = 0.0;
        self.local_file = None;
    }

    /// Transfer is about to hit the network.
    pub fn mark_in_progress(&mut self) {
        self.transition(DownloadStatus::Progress);
        self.progress = 0.0;
        self.local_file = None;
    }

    /// Apply a progress report, keeping progress monotonic within the attempt.
    ///
    /// Returns whether the stored value changed.
    pub fn apply_progress(&mut self, fraction: f64) -> bool {
        if self.status != DownloadStatus::Progress || !fraction.is_finite() {
            return false;
        }
        let next = fraction.clamp(0.0, MAX_IN_FLIGHT_PROGRESS);
        if next > self.progress {
            self.progress = next;
            true
        } else {
            false
        }
    }

    pub fn mark_succeeded(&mut self, local_file: PathBuf) {
        self.transition(DownloadStatus::Success);
        self.progress = 1.0;
        self.local_file = Some(local_file);
    }

    pub fn mark_failed(&mut self) {
        self.transition(DownloadStatus::Failure);
        self.local_file = None;
        if self.progress >= 1.0 {
            self.progress = 0.0;
        }
    }

    /// Reset after the backing file and row were removed.
    pub fn reset_removed(&mut self) {
        self.mark_start();
        self.attempts = 0;
    }
}
