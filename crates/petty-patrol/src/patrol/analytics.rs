use std::collections::BTreeMap;

use serde_json::Value;
use tracing::info;

pub type EventProperties = BTreeMap<String, Value>;

/// Fire-and-forget event sink. Implementations must not block or fail the caller.
pub trait AnalyticsSink: Send + Sync {
    fn track(&self, event: &str, properties: EventProperties);
}

/// Emits events as structured log lines under the `analytics` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAnalytics;

impl AnalyticsSink for TracingAnalytics {
    fn track(&self, event: &str, properties: EventProperties) {
        let properties = Value::Object(properties.into_iter().collect());
        info!(target: "analytics", event, %properties);
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopAnalytics;

impl AnalyticsSink for NoopAnalytics {
    fn track(&self, _event: &str, _properties: EventProperties) {}
}

pub(crate) fn props<const N: usize>(entries: [(&str, Value); N]) -> EventProperties {
    entries
        .into_iter()
        .map(|(key, value)| (key.to_string(), value))
        .collect()
}
