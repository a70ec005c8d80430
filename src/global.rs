//! Process-wide default dispatcher
//!
//! Convenience wrappers around a lazily created [`Dispatcher`]. Libraries and
//! tests that need isolation should construct their own dispatcher instead.

use std::sync::OnceLock;

use crate::config::Config;
use crate::dispatcher::Dispatcher;
use crate::event::LogOptions;
use crate::named::NamedLogger;
use crate::severity::Severity;

static GLOBAL: OnceLock<Dispatcher> = OnceLock::new();

/// The process-wide dispatcher, initialized with defaults on first use
pub fn global() -> &'static Dispatcher {
    GLOBAL.get_or_init(Dispatcher::uninitialized)
}

/// (Re)initialize the process-wide dispatcher
pub fn init(config: Config) {
    global().initialize(config);
}

/// Shut down the process-wide dispatcher. Idempotent.
pub fn shutdown() {
    global().shutdown();
}

/// A named logger on the process-wide dispatcher
pub fn named(name: impl Into<String>) -> NamedLogger {
    global().named(name)
}

pub fn log(severity: Severity, message: impl Into<String>) {
    global().log(severity, message);
}

pub fn log_with(severity: Severity, message: impl Into<String>, options: LogOptions) {
    global().log_with(severity, message, options);
}

pub fn trace(message: impl Into<String>) {
    global().trace(message);
}

pub fn debug(message: impl Into<String>) {
    global().debug(message);
}

pub fn info(message: impl Into<String>) {
    global().info(message);
}

pub fn warning(message: impl Into<String>) {
    global().warning(message);
}

pub fn error(message: impl Into<String>) {
    global().error(message);
}

pub fn fatal(message: impl Into<String>) {
    global().fatal(message);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::MemorySink;
    use std::sync::Arc;

    // The only test touching the global dispatcher
    #[test]
    fn test_global_dispatcher_round_trip() {
        assert!(std::ptr::eq(global(), global()));

        init(Config {
            enable_in_release: true,
            min_severity: Severity::Info,
            ..Config::default()
        });
        let sink = Arc::new(MemorySink::new());
        global().add_sink(sink.clone()).unwrap();

        debug("filtered");
        info("root message");
        named("Auth").warning("named message");

        assert_eq!(sink.messages(), ["root message", "named message"]);
        assert_eq!(sink.events()[1].source_name(), Some("Auth"));

        shutdown();
        shutdown();
        assert!(sink.is_closed());
        info("after shutdown");
        assert_eq!(sink.len(), 2);
    }
}
