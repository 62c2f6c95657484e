//! Usage telemetry sink.
//!
//! Events carry a name and a flat property bag. Callers only ever put counts
//! and flags in there, never connection contents.

use serde_json::{Map, Value};

/// Flat property bag attached to a telemetry event
pub type TrackingProps = Map<String, Value>;

pub trait Telemetry {
    fn track(&self, event: &str, properties: TrackingProps);
}

/// Forwards events to `tracing` at debug level
#[derive(Debug, Clone, Default)]
pub struct TracingTelemetry;

impl Telemetry for TracingTelemetry {
    fn track(&self, event: &str, properties: TrackingProps) {
        tracing::debug!(
            target: "telemetry",
            event,
            properties = %serde_json::Value::Object(properties),
            "Telemetry event"
        );
    }
}

/// Drops every event
#[derive(Debug, Clone, Default)]
pub struct NoopTelemetry;

impl Telemetry for NoopTelemetry {
    fn track(&self, _event: &str, _properties: TrackingProps) {}
}

impl<T: Telemetry + ?Sized> Telemetry for &T {
    fn track(&self, event: &str, properties: TrackingProps) {
        (**self).track(event, properties)
    }
}

/// Keeps every event in memory for assertions
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct RecordingTelemetry {
    events: std::sync::Mutex<Vec<(String, TrackingProps)>>,
}

#[cfg(test)]
impl RecordingTelemetry {
    pub(crate) fn events(&self) -> Vec<(String, TrackingProps)> {
        self.events.lock().unwrap().clone()
    }
}

#[cfg(test)]
impl Telemetry for RecordingTelemetry {
    fn track(&self, event: &str, properties: TrackingProps) {
        self.events
            .lock()
            .unwrap()
            .push((event.to_string(), properties));
    }
}
