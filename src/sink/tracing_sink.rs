//! Bridge into the `tracing` ecosystem

use anyhow::Result;

use super::Sink;
use crate::event::LogEvent;
use crate::severity::Severity;

/// Re-emits every event as a `tracing` event on the `loghub` target
///
/// `Fatal` events are emitted at `ERROR` with `fatal = true`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl TracingSink {
    pub fn new() -> Self {
        Self
    }
}

impl Sink for TracingSink {
    fn name(&self) -> &str {
        "tracing"
    }

    fn write(&self, event: &LogEvent) -> Result<()> {
        let source = event.source_name().unwrap_or("");
        let error = event.error().map(|e| format!("{:#}", e));
        let error = error.as_deref();
        let tags = event.tags().join(",");
        let tags = tags.as_str();
        let message = event.message();

        match event.severity() {
            Severity::Trace => {
                tracing::trace!(target: "loghub", source, tags, error, "{}", message)
            }
            Severity::Debug => {
                tracing::debug!(target: "loghub", source, tags, error, "{}", message)
            }
            Severity::Info => {
                tracing::info!(target: "loghub", source, tags, error, "{}", message)
            }
            Severity::Warning => {
                tracing::warn!(target: "loghub", source, tags, error, "{}", message)
            }
            Severity::Error => {
                tracing::error!(target: "loghub", source, tags, error, "{}", message)
            }
            Severity::Fatal => {
                tracing::error!(target: "loghub", fatal = true, source, tags, error, "{}", message)
            }
        }

        Ok(())
    }
}
