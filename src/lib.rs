//! Umbrella crate for the offline media download core.
//!
//! Host applications depend on `offline-media-workspace` and pick features
//! instead of wiring `core-service` and `core-downloads` individually:
//!
//! - `desktop-shims` (default): service façade with the desktop bridges.
//! - `downloads`: exposes the download engine types directly.

#[cfg(any(feature = "desktop-shims", feature = "downloads"))]
pub use core_service as service;

#[cfg(feature = "downloads")]
pub use core_downloads as downloads;
