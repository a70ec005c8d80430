//! Plain-text and JSON-lines console output

use std::fmt::Write as _;
use std::io::Write;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use super::Sink;
use crate::event::LogEvent;

/// Which standard stream a [`ConsoleSink`] writes to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsoleStream {
    #[default]
    Stdout,
    Stderr,
}

/// Line format of a [`ConsoleSink`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsoleFormat {
    /// `2026-01-21T14:30:45.123Z INFO    [Auth] message`
    #[default]
    Plain,
    /// One JSON object per line
    Json,
}

/// Writes each event as one line to stdout or stderr
#[derive(Debug, Clone, Default)]
pub struct ConsoleSink {
    stream: ConsoleStream,
    format: ConsoleFormat,
}

impl ConsoleSink {
    pub fn new(stream: ConsoleStream, format: ConsoleFormat) -> Self {
        Self { stream, format }
    }

    pub fn stdout() -> Self {
        Self::new(ConsoleStream::Stdout, ConsoleFormat::Plain)
    }

    pub fn stderr() -> Self {
        Self::new(ConsoleStream::Stderr, ConsoleFormat::Plain)
    }

    /// Switch to JSON-lines output
    pub fn json(mut self) -> Self {
        self.format = ConsoleFormat::Json;
        self
    }

    fn render(&self, event: &LogEvent) -> Result<String> {
        match self.format {
            ConsoleFormat::Plain => Ok(format_line(event)),
            ConsoleFormat::Json => event.to_json().context("Failed to serialize event"),
        }
    }
}

impl Sink for ConsoleSink {
    fn name(&self) -> &str {
        match self.stream {
            ConsoleStream::Stdout => "console:stdout",
            ConsoleStream::Stderr => "console:stderr",
        }
    }

    fn write(&self, event: &LogEvent) -> Result<()> {
        let line = self.render(event)?;
        match self.stream {
            ConsoleStream::Stdout => writeln!(std::io::stdout().lock(), "{}", line),
            ConsoleStream::Stderr => writeln!(std::io::stderr().lock(), "{}", line),
        }
        .context("Failed to write to console")
    }

    fn close(&self) -> Result<()> {
        match self.stream {
            ConsoleStream::Stdout => std::io::stdout().flush(),
            ConsoleStream::Stderr => std::io::stderr().flush(),
        }
        .context("Failed to flush console")
    }
}

/// Format an event as a single plain-text line
///
/// Format: `<rfc3339 timestamp> <SEVERITY> [<source>] <message> #tag key=value: <error>`
/// Traces are appended on the following lines.
pub fn format_line(event: &LogEvent) -> String {
    let mut line = format!(
        "{} {:<7} ",
        event
            .timestamp()
            .to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
        event.severity()
    );

    if let Some(source) = event.source_name() {
        let _ = write!(line, "[{}] ", source);
    }
    line.push_str(event.message());

    for tag in event.tags() {
        let _ = write!(line, " #{}", tag);
    }
    for (key, value) in event.metadata() {
        let _ = write!(line, " {}={}", key, value);
    }
    if let Some(error) = event.error() {
        let _ = write!(line, ": {:#}", error);
    }
    if let Some(trace) = event.trace() {
        line.push('\n');
        line.push_str(trace.trim_end());
    }

    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::LogOptions;
    use crate::severity::Severity;

    #[test]
    fn test_format_line_root() {
        let event = LogEvent::new(Severity::Info, "Starting application");
        let line = format_line(&event);
        assert!(line.ends_with(" INFO    Starting application"), "{}", line);
        assert!(!line.contains('['));
    }

    #[test]
    fn test_format_line_full() {
        let options = LogOptions::new()
            .tag("db")
            .meta("rows", 3)
            .error(anyhow::anyhow!("timeout"));
        let event = LogEvent::with_options(Severity::Error, "query failed", Some("Store"), options);

        let line = format_line(&event);
        assert!(
            line.ends_with(" ERROR   [Store] query failed #db rows=3: timeout"),
            "{}",
            line
        );
    }

    #[test]
    fn test_format_line_with_trace() {
        let options = LogOptions::new().trace("at main\n");
        let event = LogEvent::with_options(Severity::Fatal, "crash", None, options);

        let line = format_line(&event);
        let mut lines = line.lines();
        assert!(lines.next().unwrap().ends_with("FATAL   crash"));
        assert_eq!(lines.next(), Some("at main"));
    }

    #[test]
    fn test_console_sink_json_render() {
        let sink = ConsoleSink::stderr().json();
        let rendered = sink
            .render(&LogEvent::new(Severity::Warning, "disk low"))
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&rendered).unwrap();
        assert_eq!(value["severity"], "warning");
        assert_eq!(value["message"], "disk low");
    }

    #[test]
    fn test_console_sink_names() {
        assert_eq!(ConsoleSink::stdout().name(), "console:stdout");
        assert_eq!(ConsoleSink::stderr().name(), "console:stderr");
    }
}
