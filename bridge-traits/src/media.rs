//! Media Type Detection
//!
//! Classifies a remote resource as audio or video before a transfer starts so
//! the local file gets the right extension.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Kind of media behind a URL
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Audio,
    Video,
}

impl MediaKind {
    /// File extension used for downloads of this kind.
    pub fn extension(self) -> &'static str {
        match self {
            MediaKind::Audio => "mp3",
            MediaKind::Video => "mp4",
        }
    }

    /// Classify a MIME type such as `video/mp4; codecs=avc1`.
    pub fn from_content_type(content_type: &str) -> Option<Self> {
        let essence = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();

        if essence.starts_with("video/") || essence == "application/x-mpegurl" {
            Some(MediaKind::Video)
        } else if essence.starts_with("audio/") {
            Some(MediaKind::Audio)
        } else {
            None
        }
    }

    /// Guess from the extension of the URL path, ignoring query and fragment.
    pub fn from_url(url: &str) -> Option<Self> {
        let path = url.split(['?', '#']).next().unwrap_or(url);
        let last_segment = path.rsplit('/').next().unwrap_or(path);
        let (_, ext) = last_segment.rsplit_once('.')?;

        match ext.to_ascii_lowercase().as_str() {
            "mp4" | "m4v" | "mov" | "webm" | "mkv" | "m3u8" => Some(MediaKind::Video),
            "mp3" | "m4a" | "aac" | "ogg" | "oga" | "opus" | "wav" | "flac" => {
                Some(MediaKind::Audio)
            }
            _ => None,
        }
    }
}

/// Media type sniffer trait
///
/// May probe the resource over the network, hence async.
#[async_trait]
pub trait MediaTypeSniffer: Send + Sync {
    async fn classify(&self, url: &str) -> Result<MediaKind>;
}

/// Sniffer that only looks at the URL extension and defaults to audio.
#[derive(Debug, Clone, Default)]
pub struct ExtensionSniffer;

#[async_trait]
impl MediaTypeSniffer for ExtensionSniffer {
    async fn classify(&self, url: &str) -> Result<MediaKind> {
        Ok(MediaKind::from_url(url).unwrap_or(MediaKind::Audio))
    }
}
