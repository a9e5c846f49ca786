//! Analytics sink that writes events to the tracing pipeline

use bridge_traits::analytics::{AnalyticsEvent, AnalyticsSink};
use tracing::info;

/// Desktop hosts have no tracking backend; events become `info` logs under
/// the `analytics` target.
#[derive(Debug, Clone, Default)]
pub struct TracingAnalyticsSink;

impl AnalyticsSink for TracingAnalyticsSink {
    fn track(&self, event: AnalyticsEvent) {
        info!(
            target: "analytics",
            event = %event.name,
            properties = ?event.properties,
            "Analytics event"
        );
    }
}
