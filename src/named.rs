//! Named loggers
//!
//! A [`NamedLogger`] binds a name to a [`Dispatcher`]. It has no state of its
//! own: every call goes through the dispatcher's pipeline with the event's
//! source name set to the bound name.

use std::fmt;
use std::sync::Arc;

use crate::dispatcher::Dispatcher;
use crate::event::LogOptions;
use crate::severity::Severity;

/// A dispatcher handle that tags every event with a source name
#[derive(Clone)]
pub struct NamedLogger {
    name: Arc<str>,
    dispatcher: Dispatcher,
}

impl NamedLogger {
    pub(crate) fn new(dispatcher: Dispatcher, name: String) -> Self {
        Self {
            name: name.into(),
            dispatcher,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The dispatcher this logger forwards to
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// A logger named `<this name>.<suffix>` on the same dispatcher
    pub fn child(&self, suffix: &str) -> NamedLogger {
        NamedLogger::new(self.dispatcher.clone(), format!("{}.{}", self.name, suffix))
    }

    pub fn log(&self, severity: Severity, message: impl Into<String>) {
        self.log_with(severity, message, LogOptions::default());
    }

    pub fn log_with(&self, severity: Severity, message: impl Into<String>, options: LogOptions) {
        self.dispatcher
            .dispatch(severity, message, Some(self.name()), options);
    }

    pub fn trace(&self, message: impl Into<String>) {
        self.log(Severity::Trace, message);
    }

    pub fn debug(&self, message: impl Into<String>) {
        self.log(Severity::Debug, message);
    }

    pub fn info(&self, message: impl Into<String>) {
        self.log(Severity::Info, message);
    }

    pub fn warning(&self, message: impl Into<String>) {
        self.log(Severity::Warning, message);
    }

    pub fn error(&self, message: impl Into<String>) {
        self.log(Severity::Error, message);
    }

    pub fn fatal(&self, message: impl Into<String>) {
        self.log(Severity::Fatal, message);
    }
}

impl fmt::Debug for NamedLogger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NamedLogger")
            .field("name", &self.name)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::sink::MemorySink;

    fn dispatcher() -> Dispatcher {
        Dispatcher::new(Config {
            enable_in_release: true,
            ..Config::default()
        })
    }

    #[test]
    fn test_named_logger_sets_source_name() {
        let dispatcher = dispatcher();
        let sink = Arc::new(MemorySink::new());
        dispatcher.add_sink(sink.clone()).unwrap();

        dispatcher.named("Auth").info("login");
        dispatcher.info("root");

        let events = sink.events();
        assert_eq!(events[0].source_name(), Some("Auth"));
        assert_eq!(events[0].severity(), Severity::Info);
        assert_eq!(events[1].source_name(), None);
    }

    #[test]
    fn test_named_loggers_share_dispatcher_state() {
        let dispatcher = dispatcher();
        let auth = dispatcher.named("Auth");
        let db = dispatcher.named("Db");

        auth.info("a1");
        db.warning("d1");
        auth.error("a2");

        let sources: Vec<Option<String>> = dispatcher
            .history()
            .iter()
            .map(|e| e.source_name().map(str::to_string))
            .collect();
        assert_eq!(
            sources,
            [
                Some("Auth".to_string()),
                Some("Db".to_string()),
                Some("Auth".to_string())
            ]
        );

        dispatcher.disable();
        auth.info("muted");
        assert_eq!(dispatcher.history().len(), 3);
    }

    #[test]
    fn test_child_logger_name() {
        let dispatcher = dispatcher();
        let child = dispatcher.named("Auth").child("tokens");
        assert_eq!(child.name(), "Auth.tokens");

        child.log_with(Severity::Warning, "expired", LogOptions::new().tag("jwt"));

        let history = dispatcher.history();
        assert_eq!(history[0].source_name(), Some("Auth.tokens"));
        assert!(history[0].has_tag("jwt"));
    }
}
