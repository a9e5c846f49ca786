//! # Core Downloads
//!
//! Offline media downloads: a bounded, persistent queue of media files pulled
//! from remote URLs.
//!
//! ## Overview
//!
//! - [`DownloadOrchestrator`] - the download queue (actor handle)
//! - [`AutoDownloadPolicy`] - automatic downloads of new episodes with FIFO
//!   eviction of the oldest automatic downloads
//! - [`ListenerRegistry`] - event fan-out to any number of subscribers
//! - [`group_by_day`] - day-grouped view of the queue
//! - [`DownloadCatalog`] - persistence contract, with a SQLite implementation
//!
//! Platform capabilities (transfers, media detection, file system,
//! connectivity, analytics) come from `bridge-traits`.
//!
//! ## Events
//!
//! Every change to the queue is published as a [`DownloadEvent`]:
//! state changes, coalesced progress, removal of everything and reloads.

pub mod catalog;
pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod grouping;
pub mod listeners;
pub mod models;
pub mod orchestrator;
pub mod policy;
pub mod progress;

pub use catalog::{DownloadCatalog, SqliteDownloadCatalog};
pub use config::DownloadConfig;
pub use error::{DownloadError, Result};
pub use events::{DownloadEvent, EventSeverity};
pub use grouping::{group_by_day, DayGroup};
pub use listeners::{ListenerId, ListenerRegistry, ListenerSubscription};
pub use models::{DownloadReason, DownloadRecord, DownloadStatus, PostSnapshot};
pub use orchestrator::{DownloadOrchestrator, OrchestratorDeps};
pub use policy::{select_eviction_victims, AutoDownloadPolicy, FeedSource};
pub use progress::ProgressCoalescer;
