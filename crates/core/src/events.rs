//! Structured log events.
//!
//! Components report what they did as [`LogEvent`]s handed to an injected
//! [`LogSink`]. The binary wires in [`TracingSink`]; tests use
//! [`RecordingSink`] to assert on what was reported.

use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;

/// Event severity, ordered from least to most urgent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Info,
    Warning,
    Error,
    /// Needs an operator, but the process keeps running.
    Alert,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "INFO",
            Severity::Warning => "WARNING",
            Severity::Error => "ERROR",
            Severity::Alert => "ALERT",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEvent {
    pub severity: Severity,
    pub message: String,
    pub fields: Vec<(&'static str, String)>,
}

impl LogEvent {
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            severity,
            message: message.into(),
            fields: Vec::new(),
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(Severity::Info, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(Severity::Error, message)
    }

    pub fn alert(message: impl Into<String>) -> Self {
        Self::new(Severity::Alert, message)
    }

    pub fn field(mut self, key: &'static str, value: impl fmt::Display) -> Self {
        self.fields.push((key, value.to_string()));
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }

    fn rendered_fields(&self) -> String {
        self.fields
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Receives every significant event.
pub trait LogSink: Send + Sync {
    fn emit(&self, event: LogEvent);
}

impl<S: LogSink + ?Sized> LogSink for Arc<S> {
    fn emit(&self, event: LogEvent) {
        (**self).emit(event)
    }
}

/// Forwards events to `tracing`. Alerts are logged at error level with
/// `alert = true` so log pipelines can route them separately.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn emit(&self, event: LogEvent) {
        let fields = event.rendered_fields();
        match event.severity {
            Severity::Info => tracing::info!(fields = %fields, "{}", event.message),
            Severity::Warning => tracing::warn!(fields = %fields, "{}", event.message),
            Severity::Error => tracing::error!(fields = %fields, "{}", event.message),
            Severity::Alert => {
                tracing::error!(alert = true, fields = %fields, "{}", event.message)
            }
        }
    }
}

/// Keeps every event in memory.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<LogEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<LogEvent> {
        self.events.lock().clone()
    }

    pub fn with_severity(&self, severity: Severity) -> Vec<LogEvent> {
        self.events
            .lock()
            .iter()
            .filter(|e| e.severity == severity)
            .cloned()
            .collect()
    }

    pub fn contains(&self, message: &str) -> bool {
        self.events.lock().iter().any(|e| e.message == message)
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl LogSink for RecordingSink {
    fn emit(&self, event: LogEvent) {
        self.events.lock().push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_order() {
        assert!(Severity::Info < Severity::Warning);
        assert!(Severity::Warning < Severity::Error);
        assert!(Severity::Error < Severity::Alert);
        assert_eq!(Severity::Alert.to_string(), "ALERT");
    }

    #[test]
    fn test_event_fields() {
        let event = LogEvent::warning("read failed")
            .field("account", "0xabc")
            .field("attempt", 2);
        assert_eq!(event.get("attempt"), Some("2"));
        assert_eq!(event.get("missing"), None);
        assert_eq!(event.rendered_fields(), "account=0xabc attempt=2");
    }

    #[test]
    fn test_recording_sink() {
        let sink = Arc::new(RecordingSink::new());
        let shared: Arc<dyn LogSink> = sink.clone();
        shared.emit(LogEvent::info("a"));
        shared.emit(LogEvent::alert("b"));

        assert_eq!(sink.events().len(), 2);
        assert_eq!(sink.with_severity(Severity::Alert).len(), 1);
        assert!(sink.contains("a"));

        sink.clear();
        assert!(sink.events().is_empty());
    }
}
