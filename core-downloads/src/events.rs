//! # Download Events
//!
//! Notifications fanned out to download listeners.
//!
//! Every mutation of the download queue produces exactly one event. Listeners
//! receive them through a [`ListenerSubscription`](crate::listeners::ListenerSubscription)
//! in the order the queue applied the mutations.

use serde::{Deserialize, Serialize};

use crate::models::DownloadRecord;

// ============================================================================
// Download Events
// ============================================================================

/// Events emitted by the download orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "payload")]
pub enum DownloadEvent {
    /// A record changed lifecycle state, or was reset after removal.
    StateChanged(DownloadRecord),
    /// Coalesced progress of an in-flight download.
    ProgressChanged {
        /// Post id of the record.
        id: String,
        /// Fraction in `[0, 1)`.
        progress: f64,
    },
    /// Every record was removed at once.
    AllRemoved,
    /// The queue was reloaded from the catalog.
    QueueRefreshed,
}

impl DownloadEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            DownloadEvent::StateChanged(_) => "Download state changed",
            DownloadEvent::ProgressChanged { .. } => "Download in progress",
            DownloadEvent::AllRemoved => "All downloads removed",
            DownloadEvent::QueueRefreshed => "Download queue refreshed",
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            DownloadEvent::StateChanged(record) => match record.status {
                crate::models::DownloadStatus::Failure => EventSeverity::Warning,
                crate::models::DownloadStatus::Success => EventSeverity::Info,
                _ => EventSeverity::Debug,
            },
            DownloadEvent::AllRemoved => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }

    /// Id of the record the event is about, if it concerns a single record.
    pub fn record_id(&self) -> Option<&str> {
        match self {
            DownloadEvent::StateChanged(record) => Some(&record.id),
            DownloadEvent::ProgressChanged { id, .. } => Some(id),
            DownloadEvent::AllRemoved | DownloadEvent::QueueRefreshed => None,
        }
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    /// Debug-level events (verbose)
    Debug,
    /// Informational events
    Info,
    /// Warning events
    Warning,
    /// Error events
    Error,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DownloadReason, PostSnapshot};
    use chrono::Utc;
    use std::path::PathBuf;

    fn record() -> DownloadRecord {
        let post = PostSnapshot::new("p-9", "c-1", Utc::now())
            .with_media_url("https://cdn.example.com/p-9.mp4");
        DownloadRecord::new(post, DownloadReason::Manual, Utc::now()).unwrap()
    }

    #[test]
    fn test_event_severity() {
        let mut rec = record();
        assert_eq!(
            DownloadEvent::StateChanged(rec.clone()).severity(),
            EventSeverity::Debug
        );

        rec.mark_failed();
        assert_eq!(
            DownloadEvent::StateChanged(rec.clone()).severity(),
            EventSeverity::Warning
        );

        rec.mark_succeeded(PathBuf::from("/docs/p-9.mp4"));
        assert_eq!(
            DownloadEvent::StateChanged(rec).severity(),
            EventSeverity::Info
        );

        assert!(EventSeverity::Error > EventSeverity::Warning);
    }

    #[test]
    fn test_record_id_and_description() {
        let event = DownloadEvent::ProgressChanged {
            id: "p-9".to_string(),
            progress: 0.25,
        };
        assert_eq!(event.record_id(), Some("p-9"));
        assert_eq!(event.description(), "Download in progress");
        assert_eq!(DownloadEvent::AllRemoved.record_id(), None);
    }

    #[test]
    fn test_event_serialization() {
        let event = DownloadEvent::ProgressChanged {
            id: "p-9".to_string(),
            progress: 0.5,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert_eq!(
            json,
            r#"{"event":"ProgressChanged","payload":{"id":"p-9","progress":0.5}}"#
        );

        let all: DownloadEvent = serde_json::from_str(r#"{"event":"AllRemoved"}"#).unwrap();
        assert_eq!(all, DownloadEvent::AllRemoved);

        let state = DownloadEvent::StateChanged(record());
        let round: DownloadEvent =
            serde_json::from_str(&serde_json::to_string(&state).unwrap()).unwrap();
        assert_eq!(round, state);
    }
}
