//! Output sinks
//!
//! A sink is a destination that records accepted events somewhere visible or
//! durable. The dispatcher calls `write` once per accepted event and `close`
//! exactly once, either when the sink is removed or at shutdown.

mod console;
mod memory;
mod tracing_sink;

pub use console::{format_line, ConsoleFormat, ConsoleSink, ConsoleStream};
pub use memory::MemorySink;
pub use tracing_sink::TracingSink;

use anyhow::Result;

use crate::event::LogEvent;

/// Destination for accepted events
///
/// Implementations must be cheap and non-blocking; the dispatcher calls
/// `write` inline on the logging thread. Errors and panics are isolated and
/// reported through [`crate::diagnostics`].
pub trait Sink: Send + Sync {
    /// Name used in diagnostics
    fn name(&self) -> &str {
        "sink"
    }

    /// Record one event
    fn write(&self, event: &LogEvent) -> Result<()>;

    /// Release resources
    fn close(&self) -> Result<()> {
        Ok(())
    }
}
