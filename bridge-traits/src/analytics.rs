//! Analytics / Tracking Abstraction
//!
//! Fire-and-forget diagnostic events forwarded to the host's tracking pipeline.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A named tracking event with string properties.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalyticsEvent {
    pub name: String,
    pub properties: BTreeMap<String, String>,
}

impl AnalyticsEvent {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            properties: BTreeMap::new(),
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }
}

/// Analytics sink trait
///
/// `track` must not block; implementations queue or drop the event.
pub trait AnalyticsSink: Send + Sync {
    fn track(&self, event: AnalyticsEvent);
}

/// Sink that discards every event.
#[derive(Debug, Clone, Default)]
pub struct NoopAnalyticsSink;

impl AnalyticsSink for NoopAnalyticsSink {
    fn track(&self, _event: AnalyticsEvent) {}
}
