//! Messages consumed by the download queue actor.
//!
//! Requests from [`DownloadOrchestrator`](super::DownloadOrchestrator) carry a
//! oneshot `reply` that is answered once the mutation has been applied.
//! Reports from transfer attempts carry no reply.

use bridge_traits::Connectivity;
use std::path::PathBuf;
use tokio::sync::oneshot;

use crate::error::Result;
use crate::models::{DownloadReason, DownloadRecord, PostSnapshot};

/// Monotonic number identifying one transfer attempt.
pub(crate) type AttemptId = u64;

#[derive(Debug)]
pub(crate) enum Command {
    /// Load the catalog and demote interrupted records.
    Initialize { reply: oneshot::Sender<Result<()>> },
    Download {
        post: PostSnapshot,
        reason: DownloadReason,
        reply: oneshot::Sender<()>,
    },
    Remove {
        id: String,
        reply: oneshot::Sender<()>,
    },
    RemoveAutoDownloads {
        channel_id: String,
        reply: oneshot::Sender<()>,
    },
    RemoveAll { reply: oneshot::Sender<()> },
    UpdateItems { reply: oneshot::Sender<()> },
    UpdatePost {
        post: PostSnapshot,
        reply: oneshot::Sender<()>,
    },
    /// Restart failed records, given the connectivity observed by the caller.
    RestartFailed {
        connectivity: Connectivity,
        reply: oneshot::Sender<()>,
    },
    IsPostDownloaded {
        id: String,
        reply: oneshot::Sender<bool>,
    },
    GetFileUrl {
        id: String,
        reply: oneshot::Sender<Option<PathBuf>>,
    },
    Item {
        id: String,
        reply: oneshot::Sender<Option<DownloadRecord>>,
    },
    Items { reply: oneshot::Sender<Vec<DownloadRecord>> },
    /// Coalesced progress from an attempt task.
    Progress {
        id: String,
        attempt: AttemptId,
        progress: f64,
    },
    /// Terminal outcome of an attempt task.
    Finished {
        id: String,
        attempt: AttemptId,
        outcome: AttemptOutcome,
    },
    /// Cancel running attempts and stop the actor.
    Shutdown { reply: oneshot::Sender<()> },
}

/// How a transfer attempt ended.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum AttemptOutcome {
    /// File written to this path.
    Completed(PathBuf),
    /// Description of the error.
    Failed(String),
}
