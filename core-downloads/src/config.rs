//! # Download Configuration
//!
//! Tunables for the download queue, retry behavior and automatic downloads.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{DownloadError, Result};

/// Download engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Minimum progress delta (fraction) before a new progress event is emitted.
    ///
    /// Default: 0.05.
    #[serde(default = "default_progress_threshold")]
    pub progress_threshold: f64,

    /// Automatic downloads kept before the oldest one is evicted.
    ///
    /// Default: 10.
    #[serde(default = "default_max_automatic_downloads")]
    pub max_automatic_downloads: usize,

    /// Transfer attempts allowed before automatic restarts give up on an item.
    ///
    /// A manual download request resets the count.
    ///
    /// Default: 5.
    #[serde(default = "default_max_retry_attempts")]
    pub max_retry_attempts: u32,

    /// Delay before the first automatic restart; doubles per attempt.
    ///
    /// Default: 2 seconds.
    #[serde(default = "default_retry_base_delay")]
    pub retry_base_delay: Duration,

    /// Upper bound for the restart delay.
    ///
    /// Default: 5 minutes.
    #[serde(default = "default_retry_max_delay")]
    pub retry_max_delay: Duration,

    /// Where media files are written. `None` uses the documents directory of
    /// the file system bridge.
    #[serde(default)]
    pub downloads_directory: Option<PathBuf>,

    /// Initial state of the global automatic download switch.
    ///
    /// Default: true.
    #[serde(default = "default_auto_download_enabled")]
    pub auto_download_enabled: bool,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            progress_threshold: default_progress_threshold(),
            max_automatic_downloads: default_max_automatic_downloads(),
            max_retry_attempts: default_max_retry_attempts(),
            retry_base_delay: default_retry_base_delay(),
            retry_max_delay: default_retry_max_delay(),
            downloads_directory: None,
            auto_download_enabled: default_auto_download_enabled(),
        }
    }
}

impl DownloadConfig {
    pub fn with_progress_threshold(mut self, threshold: f64) -> Self {
        self.progress_threshold = threshold;
        self
    }

    pub fn with_max_automatic_downloads(mut self, max: usize) -> Self {
        self.max_automatic_downloads = max;
        self
    }

    pub fn with_max_retry_attempts(mut self, max: u32) -> Self {
        self.max_retry_attempts = max;
        self
    }

    pub fn with_retry_delays(mut self, base: Duration, max: Duration) -> Self {
        self.retry_base_delay = base;
        self.retry_max_delay = max;
        self
    }

    pub fn with_downloads_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.downloads_directory = Some(dir.into());
        self
    }

    pub fn with_auto_download_enabled(mut self, enabled: bool) -> Self {
        self.auto_download_enabled = enabled;
        self
    }

    /// Delay before the automatic restart that follows `attempts` prior attempts.
    ///
    /// `retry_base_delay * 2^(attempts - 1)`, capped at `retry_max_delay`.
    /// No delay before the first attempt.
    pub fn retry_delay(&self, attempts: u32) -> Duration {
        if attempts == 0 {
            return Duration::ZERO;
        }
        let factor = 2u32.saturating_pow(attempts - 1);
        self.retry_base_delay
            .checked_mul(factor)
            .unwrap_or(self.retry_max_delay)
            .min(self.retry_max_delay)
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..1.0).contains(&self.progress_threshold) {
            return Err(DownloadError::InvalidConfig(
                "progress_threshold must be in [0.0, 1.0)".to_string(),
            ));
        }

        if self.max_automatic_downloads == 0 {
            return Err(DownloadError::InvalidConfig(
                "max_automatic_downloads must be > 0".to_string(),
            ));
        }

        if self.max_retry_attempts == 0 {
            return Err(DownloadError::InvalidConfig(
                "max_retry_attempts must be > 0".to_string(),
            ));
        }

        if self.retry_base_delay > self.retry_max_delay {
            return Err(DownloadError::InvalidConfig(
                "retry_base_delay cannot exceed retry_max_delay".to_string(),
            ));
        }

        if matches!(&self.downloads_directory, Some(dir) if dir.as_os_str().is_empty()) {
            return Err(DownloadError::InvalidConfig(
                "downloads_directory cannot be empty when set".to_string(),
            ));
        }

        Ok(())
    }
}

fn default_progress_threshold() -> f64 {
    0.05
}

fn default_max_automatic_downloads() -> usize {
    10
}

fn default_max_retry_attempts() -> u32 {
    5
}

fn default_retry_base_delay() -> Duration {
    Duration::from_secs(2)
}

fn default_retry_max_delay() -> Duration {
    Duration::from_secs(300)
}

fn default_auto_download_enabled() -> bool {
    true
}
