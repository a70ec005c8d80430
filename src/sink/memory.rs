//! In-memory sink that keeps every event it receives

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use anyhow::{bail, Result};

use super::Sink;
use crate::event::LogEvent;

/// Collects written events in order. Useful for tests and embedding.
#[derive(Debug, Default)]
pub struct MemorySink {
    name: String,
    events: Mutex<Vec<LogEvent>>,
    close_calls: AtomicUsize,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::named("memory")
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Copy of every event written so far
    pub fn events(&self) -> Vec<LogEvent> {
        self.lock().clone()
    }

    /// Messages of every event written so far
    pub fn messages(&self) -> Vec<String> {
        self.lock().iter().map(|e| e.message().to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_closed(&self) -> bool {
        self.close_calls() > 0
    }

    /// Number of times `close` was called
    pub fn close_calls(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<LogEvent>> {
        self.events.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Sink for MemorySink {
    fn name(&self) -> &str {
        &self.name
    }

    fn write(&self, event: &LogEvent) -> Result<()> {
        if self.is_closed() {
            bail!("sink '{}' is closed", self.name);
        }
        self.lock().push(event.clone());
        Ok(())
    }

    fn close(&self) -> Result<()> {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
