//! Log events
//!
//! A [`LogEvent`] is built once per accepted logging call and never mutated
//! afterwards. Consumers share it as `Arc<LogEvent>`.

use std::backtrace::Backtrace;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};

use crate::severity::Severity;

/// Tie-breaker for events created within the same clock tick
static SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Process-unique event identifier
///
/// Ordered by wall-clock timestamp first and by a process-wide sequence
/// number second, so two events created in the same instant still differ.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct EventId {
    timestamp_micros: i64,
    sequence: u64,
}

impl EventId {
    fn next(at: DateTime<Utc>) -> Self {
        Self {
            timestamp_micros: at.timestamp_micros(),
            sequence: SEQUENCE.fetch_add(1, Ordering::Relaxed),
        }
    }

    /// Microseconds since the Unix epoch at creation
    pub fn timestamp_micros(&self) -> i64 {
        self.timestamp_micros
    }

    /// Process-wide sequence number
    pub fn sequence(&self) -> u64 {
        self.sequence
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:x}-{:x}", self.timestamp_micros, self.sequence)
    }
}

/// A structured metadata value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    List(Vec<MetadataValue>),
    Map(BTreeMap<String, MetadataValue>),
}

/// Metadata attached to an event, keyed by name
pub type Metadata = BTreeMap<String, MetadataValue>;

impl From<bool> for MetadataValue {
    fn from(value: bool) -> Self {
        MetadataValue::Bool(value)
    }
}

impl From<i64> for MetadataValue {
    fn from(value: i64) -> Self {
        MetadataValue::Int(value)
    }
}

impl From<i32> for MetadataValue {
    fn from(value: i32) -> Self {
        MetadataValue::Int(value.into())
    }
}

impl From<u32> for MetadataValue {
    fn from(value: u32) -> Self {
        MetadataValue::Int(value.into())
    }
}

impl From<f64> for MetadataValue {
    fn from(value: f64) -> Self {
        MetadataValue::Float(value)
    }
}

impl From<&str> for MetadataValue {
    fn from(value: &str) -> Self {
        MetadataValue::String(value.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(value: String) -> Self {
        MetadataValue::String(value)
    }
}

impl From<Vec<MetadataValue>> for MetadataValue {
    fn from(value: Vec<MetadataValue>) -> Self {
        MetadataValue::List(value)
    }
}

impl From<Metadata> for MetadataValue {
    fn from(value: Metadata) -> Self {
        MetadataValue::Map(value)
    }
}

impl fmt::Display for MetadataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetadataValue::Bool(v) => write!(f, "{}", v),
            MetadataValue::Int(v) => write!(f, "{}", v),
            MetadataValue::Float(v) => write!(f, "{}", v),
            MetadataValue::String(v) => f.write_str(v),
            other => match serde_json::to_string(other) {
                Ok(json) => f.write_str(&json),
                Err(_) => Err(fmt::Error),
            },
        }
    }
}

/// Optional context supplied with a single logging call
#[derive(Debug, Clone, Default)]
pub struct LogOptions {
    error: Option<Arc<anyhow::Error>>,
    trace: Option<String>,
    tags: Vec<String>,
    metadata: Metadata,
}

impl LogOptions {
    /// Create empty options
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach an error
    pub fn error(mut self, error: impl Into<anyhow::Error>) -> Self {
        self.error = Some(Arc::new(error.into()));
        self
    }

    /// Attach an explicit trace. Suppresses automatic trace capture.
    pub fn trace(mut self, trace: impl Into<String>) -> Self {
        self.trace = Some(trace.into());
        self
    }

    /// Append a tag
    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// Append several tags, keeping their order
    pub fn tags<I, T>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    /// Set a metadata entry, replacing any previous value for the key
    pub fn meta(mut self, key: impl Into<String>, value: impl Into<MetadataValue>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub(crate) fn has_trace(&self) -> bool {
        self.trace.is_some()
    }
}

/// One logged occurrence
#[derive(Debug, Clone, Serialize)]
pub struct LogEvent {
    id: EventId,
    timestamp: DateTime<Utc>,
    severity: Severity,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    source_name: Option<String>,
    #[serde(
        serialize_with = "serialize_error",
        skip_serializing_if = "Option::is_none"
    )]
    error: Option<Arc<anyhow::Error>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    trace: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tags: Vec<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    metadata: Metadata,
}

fn serialize_error<S>(error: &Option<Arc<anyhow::Error>>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match error {
        Some(error) => serializer.serialize_some(&format!("{:#}", error)),
        None => serializer.serialize_none(),
    }
}

impl LogEvent {
    /// Create an event with no source name and no extra context
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self::with_options(severity, message, None, LogOptions::default())
    }

    /// Create an event from a logging call's full set of inputs
    pub fn with_options(
        severity: Severity,
        message: impl Into<String>,
        source_name: Option<&str>,
        options: LogOptions,
    ) -> Self {
        let timestamp = Utc::now();
        Self {
            id: EventId::next(timestamp),
            timestamp,
            severity,
            message: message.into(),
            source_name: source_name.map(str::to_string),
            error: options.error,
            trace: options.trace,
            tags: options.tags,
            metadata: options.metadata,
        }
    }

    pub fn id(&self) -> EventId {
        self.id
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Name of the named logger that produced the event, if any
    pub fn source_name(&self) -> Option<&str> {
        self.source_name.as_deref()
    }

    pub fn error(&self) -> Option<&anyhow::Error> {
        self.error.as_deref()
    }

    pub fn trace(&self) -> Option<&str> {
        self.trace.as_deref()
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Render as a single JSON object
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Capture the current execution trace as text
pub(crate) fn capture_trace() -> String {
    Backtrace::force_capture().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_ids_are_unique_within_same_instant() {
        let events: Vec<LogEvent> = (0..100)
            .map(|i| LogEvent::new(Severity::Info, format!("msg {}", i)))
            .collect();

        for pair in events.windows(2) {
            assert_ne!(pair[0].id(), pair[1].id());
            assert!(pair[0].id().sequence() < pair[1].id().sequence());
        }
    }

    #[test]
    fn test_event_with_options() {
        let options = LogOptions::new()
            .tag("db")
            .tag("slow")
            .tag("db")
            .meta("rows", 42)
            .meta("table", "users")
            .trace("frame 0");

        let event = LogEvent::with_options(Severity::Warning, "query", Some("Store"), options);

        assert_eq!(event.severity(), Severity::Warning);
        assert_eq!(event.message(), "query");
        assert_eq!(event.source_name(), Some("Store"));
        assert_eq!(event.tags(), ["db", "slow", "db"]);
        assert!(event.has_tag("slow"));
        assert_eq!(event.metadata().get("rows"), Some(&MetadataValue::Int(42)));
        assert_eq!(event.trace(), Some("frame 0"));
        assert!(event.error().is_none());
    }

    #[test]
    fn test_event_error_is_kept() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing file");
        let event = LogEvent::with_options(
            Severity::Error,
            "read failed",
            None,
            LogOptions::new().error(io),
        );

        let error = event.error().unwrap();
        assert_eq!(error.to_string(), "missing file");
    }

    #[test]
    fn test_event_json_shape() {
        let options = LogOptions::new()
            .error(anyhow::anyhow!("boom"))
            .tag("net")
            .meta("retry", true);
        let event = LogEvent::with_options(Severity::Error, "send failed", None, options);

        let value: serde_json::Value = serde_json::from_str(&event.to_json().unwrap()).unwrap();
        assert_eq!(value["severity"], "error");
        assert_eq!(value["message"], "send failed");
        assert_eq!(value["error"], "boom");
        assert_eq!(value["tags"][0], "net");
        assert_eq!(value["metadata"]["retry"], true);
        assert!(value.get("source_name").is_none());
        assert!(value.get("trace").is_none());
    }

    #[test]
    fn test_metadata_value_nested() {
        let mut inner = Metadata::new();
        inner.insert("port".to_string(), 8080.into());
        let value = MetadataValue::from(inner);

        assert_eq!(value.to_string(), r#"{"port":8080}"#);
        assert_eq!(MetadataValue::from("x").to_string(), "x");
    }

    #[test]
    fn test_metadata_value_deserialize() {
        let value: MetadataValue = serde_json::from_str(r#"{"a":[1,2.5,"s",false]}"#).unwrap();
        let MetadataValue::Map(map) = value else {
            panic!("expected map");
        };
        assert_eq!(
            map["a"],
            MetadataValue::List(vec![
                MetadataValue::Int(1),
                MetadataValue::Float(2.5),
                MetadataValue::String("s".to_string()),
                MetadataValue::Bool(false),
            ])
        );
    }

    #[test]
    fn test_capture_trace_is_not_empty() {
        assert!(!capture_trace().is_empty());
    }
}
