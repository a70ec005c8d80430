//! Fallback diagnostic channel
//!
//! Faults that happen inside dispatch (a failing listener, a failing sink, a
//! panic while building an event) are never returned to the logging caller.
//! They are reported here instead: through `tracing` when a global subscriber
//! is installed, otherwise as a plain line on stderr.

use std::any::Any;
use std::fmt;
use std::io::Write;

use anyhow::Result;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Target used for internal fault reports
pub const DIAGNOSTICS_TARGET: &str = "loghub::diagnostics";

/// Where in the dispatch pipeline a fault happened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultStage {
    /// Building the event or evaluating filters
    Dispatch,
    /// A synchronous listener
    Listener,
    /// A sink's `write`
    SinkWrite,
    /// A sink's `close`
    SinkClose,
}

impl FaultStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            FaultStage::Dispatch => "dispatch",
            FaultStage::Listener => "listener",
            FaultStage::SinkWrite => "sink write",
            FaultStage::SinkClose => "sink close",
        }
    }
}

impl fmt::Display for FaultStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Report an internal fault. Never fails and never panics.
pub fn report(stage: FaultStage, origin: &str, detail: &dyn fmt::Display) {
    if tracing::dispatcher::has_been_set() {
        tracing::warn!(
            target: DIAGNOSTICS_TARGET,
            stage = %stage,
            origin,
            "{}",
            detail
        );
    } else {
        let mut stderr = std::io::stderr().lock();
        let _ = writeln!(stderr, "[loghub] {} fault in {}: {}", stage, origin, detail);
    }
}

/// Render a caught panic payload as text
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panicked: {}", s)
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panicked: {}", s)
    } else {
        "panicked".to_string()
    }
}

/// Install a global `tracing` subscriber writing to stderr
///
/// The filter comes from `RUST_LOG`, falling back to `default_directive`
/// (for example `"loghub=warn"`). Fails if a global subscriber is already set.
pub fn init_tracing(default_directive: &str) -> Result<()> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_directive.into());

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_target(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_panic_message_str() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "panicked: boom");
    }

    #[test]
    fn test_panic_message_string() {
        let payload: Box<dyn Any + Send> = Box::new(String::from("bad state"));
        assert_eq!(panic_message(payload.as_ref()), "panicked: bad state");
    }

    #[test]
    fn test_panic_message_unknown_payload() {
        let payload: Box<dyn Any + Send> = Box::new(42u32);
        assert_eq!(panic_message(payload.as_ref()), "panicked");
    }

    #[test]
    fn test_report_does_not_panic() {
        report(FaultStage::SinkWrite, "console", &"disk on fire");
        report(FaultStage::Listener, "listener", &anyhow::anyhow!("nope"));
    }

    #[test]
    fn test_fault_stage_display() {
        assert_eq!(FaultStage::SinkClose.to_string(), "sink close");
    }
}
