//! Dispatcher facade
//!
//! The [`Dispatcher`] owns the configuration, the filter chain, the event
//! history, the registered listeners and sinks, and the broadcast stream. Every
//! logging call runs the same pipeline:
//!
//! 1. return immediately if logging is disabled (no event is built)
//! 2. build the event, capturing a trace for Error/Fatal when configured
//! 3. evaluate the filter chain; rejected events go nowhere
//! 4. append to the history buffer
//! 5. emit on the broadcast stream
//! 6. call each listener in registration order
//! 7. write to each sink in registration order
//!
//! Steps 5 to 7 are isolated from each other's failures, and nothing that goes
//! wrong inside the pipeline reaches the caller. Faults are reported through
//! [`crate::diagnostics`] and counted.
//!
//! Each call takes one snapshot of the active core. Reinitializing swaps in a
//! fresh core and shuts the old one down; a call already in flight finishes
//! against the old core, skipping sinks that have been closed meanwhile.

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use anyhow::Result;
use uuid::Uuid;

use crate::buffer::RingBuffer;
use crate::config::Config;
use crate::diagnostics::{self, panic_message, FaultStage};
use crate::error::LogError;
use crate::event::{capture_trace, LogEvent, LogOptions};
use crate::filter::{Filter, ThresholdFilter};
use crate::named::NamedLogger;
use crate::severity::Severity;
use crate::sink::Sink;
use crate::stream::{EventStream, Subscription};

/// Handle returned when registering a listener
pub type ListenerId = Uuid;

/// Handle returned when registering a sink
pub type SinkId = Uuid;

/// Handle returned when registering a filter
pub type FilterId = Uuid;

type Listener = Arc<dyn Fn(&LogEvent) -> Result<()> + Send + Sync>;

/// Externally visible lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatcherState {
    /// No initialization yet; the first use initializes with defaults
    Uninitialized,
    /// Accepting events
    Active,
    /// Initialized but every logging call is a no-op
    Disabled,
    /// Shut down; only an explicit reinitialization revives it
    Closed,
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|e| e.into_inner())
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|e| e.into_inner())
}

/// Run a consumer callback, turning errors and panics into a description
fn isolate(f: impl FnOnce() -> Result<()>) -> std::result::Result<(), String> {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(format!("{:#}", e)),
        Err(payload) => Err(panic_message(payload.as_ref())),
    }
}

/// Counts and reports internal faults
#[derive(Debug, Default)]
struct FaultLog {
    count: AtomicU64,
    #[cfg(test)]
    origins: std::sync::Mutex<Vec<String>>,
}

impl FaultLog {
    fn record(&self, stage: FaultStage, origin: &str, detail: &dyn fmt::Display) {
        self.count.fetch_add(1, Ordering::Relaxed);
        #[cfg(test)]
        self.origins
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(origin.to_string());
        diagnostics::report(stage, origin, detail);
    }

    fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }
}

/// A registered sink and its close state
///
/// No lock is held while the sink runs, so a sink may shut the dispatcher
/// down or remove itself from inside `write`. A close requested while writes
/// are in flight is carried out by the last of those writes as it returns; no
/// write starts once a close has been requested.
struct SinkSlot {
    id: SinkId,
    sink: Arc<dyn Sink>,
    closing: AtomicBool,
    closed: AtomicBool,
    writers: AtomicUsize,
}

impl SinkSlot {
    fn new(id: SinkId, sink: Arc<dyn Sink>) -> Self {
        Self {
            id,
            sink,
            closing: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            writers: AtomicUsize::new(0),
        }
    }

    fn write(&self, event: &LogEvent, faults: &FaultLog) {
        self.writers.fetch_add(1, Ordering::SeqCst);
        if !self.closing.load(Ordering::SeqCst) {
            if let Err(detail) = isolate(|| self.sink.write(event)) {
                faults.record(FaultStage::SinkWrite, self.sink.name(), &detail);
            }
        }
        if self.writers.fetch_sub(1, Ordering::SeqCst) == 1 && self.closing.load(Ordering::SeqCst)
        {
            self.finish_close(faults);
        }
    }

    fn close(&self, faults: &FaultLog) {
        if self.closing.swap(true, Ordering::SeqCst) {
            return;
        }
        if self.writers.load(Ordering::SeqCst) == 0 {
            self.finish_close(faults);
        }
    }

    fn finish_close(&self, faults: &FaultLog) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Err(detail) = isolate(|| self.sink.close()) {
            faults.record(FaultStage::SinkClose, self.sink.name(), &detail);
        }
    }
}

fn listener_origin(id: ListenerId) -> String {
    format!("listener {}", id)
}

/// All state belonging to one initialization
struct Core {
    config: Config,
    enabled: AtomicBool,
    min_severity: AtomicU8,
    filters: RwLock<Vec<(FilterId, Arc<dyn Filter>)>>,
    buffer: Option<RingBuffer>,
    stream: EventStream,
    listeners: RwLock<Vec<(ListenerId, Listener)>>,
    sinks: RwLock<Vec<Arc<SinkSlot>>>,
    closed: AtomicBool,
}

impl Core {
    fn new(config: Config) -> Self {
        let enabled = config.initially_enabled(cfg!(debug_assertions));
        let buffer =
            (config.buffer_capacity > 0).then(|| RingBuffer::new(config.buffer_capacity));
        Self {
            enabled: AtomicBool::new(enabled),
            min_severity: AtomicU8::new(config.min_severity.rank()),
            filters: RwLock::new(Vec::new()),
            buffer,
            stream: EventStream::new(config.stream_capacity),
            listeners: RwLock::new(Vec::new()),
            sinks: RwLock::new(Vec::new()),
            closed: AtomicBool::new(false),
            config,
        }
    }

    fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire) && !self.closed.load(Ordering::Acquire)
    }

    fn min_severity(&self) -> Severity {
        Severity::from_rank(self.min_severity.load(Ordering::Acquire)).unwrap_or_default()
    }

    fn passes(&self, event: &LogEvent) -> bool {
        if !ThresholdFilter::new(self.min_severity()).should_log(event) {
            return false;
        }
        let filters: Vec<Arc<dyn Filter>> = read(&self.filters)
            .iter()
            .map(|(_, f)| Arc::clone(f))
            .collect();
        filters.iter().all(|f| f.should_log(event))
    }

    fn dispatch(
        &self,
        severity: Severity,
        message: String,
        source_name: Option<&str>,
        mut options: LogOptions,
        faults: &FaultLog,
    ) {
        if self.config.capture_traces && severity.captures_trace() && !options.has_trace() {
            options = options.trace(capture_trace());
        }
        let event = LogEvent::with_options(severity, message, source_name, options);

        if !self.passes(&event) {
            return;
        }
        let event = Arc::new(event);

        if let Some(buffer) = &self.buffer {
            buffer.add(Arc::clone(&event));
        }

        self.stream.emit(Arc::clone(&event));

        let listeners: Vec<(ListenerId, Listener)> = read(&self.listeners).clone();
        for (id, listener) in listeners {
            if let Err(detail) = isolate(|| listener(&event)) {
                faults.record(FaultStage::Listener, &listener_origin(id), &detail);
            }
        }

        let sinks: Vec<Arc<SinkSlot>> = read(&self.sinks).iter().cloned().collect();
        for slot in sinks {
            slot.write(&event, faults);
        }
    }

    fn shutdown(&self, faults: &FaultLog) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.enabled.store(false, Ordering::Release);
        self.stream.close();
        write(&self.listeners).clear();
        write(&self.filters).clear();

        let sinks: Vec<Arc<SinkSlot>> = write(&self.sinks).drain(..).collect();
        for slot in sinks {
            slot.close(faults);
        }

        if let Some(buffer) = &self.buffer {
            buffer.clear();
        }
    }
}

enum Lifecycle {
    Uninitialized,
    Running(Arc<Core>),
    Closed,
}

struct Shared {
    lifecycle: RwLock<Lifecycle>,
    faults: FaultLog,
}

/// The logging facade
///
/// Cloning is cheap and every clone refers to the same dispatcher. All methods
/// take `&self` and are safe to call from any number of threads.
#[derive(Clone)]
pub struct Dispatcher {
    shared: Arc<Shared>,
}

impl Dispatcher {
    /// Create an active dispatcher
    pub fn new(config: Config) -> Self {
        Self::with_lifecycle(Lifecycle::Running(Arc::new(Core::new(config))))
    }

    /// Create a dispatcher that initializes itself with defaults on first use
    pub fn uninitialized() -> Self {
        Self::with_lifecycle(Lifecycle::Uninitialized)
    }

    fn with_lifecycle(lifecycle: Lifecycle) -> Self {
        Self {
            shared: Arc::new(Shared {
                lifecycle: RwLock::new(lifecycle),
                faults: FaultLog::default(),
            }),
        }
    }

    /// Replace all state with a fresh initialization
    ///
    /// The previous state, if any, is shut down: its stream subscriptions end,
    /// its sinks are closed, and its listeners, filters and history are dropped.
    /// Also revives a closed dispatcher.
    pub fn initialize(&self, config: Config) {
        let core = Arc::new(Core::new(config));
        let previous = std::mem::replace(
            &mut *write(&self.shared.lifecycle),
            Lifecycle::Running(core),
        );
        if let Lifecycle::Running(old) = previous {
            old.shutdown(&self.shared.faults);
        }
    }

    /// Close the stream, close every sink, and drop listeners and history
    ///
    /// Idempotent. Later logging calls are no-ops until [`Dispatcher::initialize`].
    pub fn shutdown(&self) {
        let previous = std::mem::replace(&mut *write(&self.shared.lifecycle), Lifecycle::Closed);
        if let Lifecycle::Running(old) = previous {
            old.shutdown(&self.shared.faults);
        }
    }

    /// Current lifecycle state. Does not trigger lazy initialization.
    pub fn state(&self) -> DispatcherState {
        match &*read(&self.shared.lifecycle) {
            Lifecycle::Uninitialized => DispatcherState::Uninitialized,
            Lifecycle::Closed => DispatcherState::Closed,
            Lifecycle::Running(core) if core.is_enabled() => DispatcherState::Active,
            Lifecycle::Running(_) => DispatcherState::Disabled,
        }
    }

    /// Snapshot of the active core, initializing with defaults if needed
    fn core(&self) -> Option<Arc<Core>> {
        match &*read(&self.shared.lifecycle) {
            Lifecycle::Running(core) => return Some(Arc::clone(core)),
            Lifecycle::Closed => return None,
            Lifecycle::Uninitialized => {}
        }

        let mut lifecycle = write(&self.shared.lifecycle);
        match &*lifecycle {
            Lifecycle::Running(core) => Some(Arc::clone(core)),
            Lifecycle::Closed => None,
            Lifecycle::Uninitialized => {
                let core = Arc::new(Core::new(Config::default()));
                *lifecycle = Lifecycle::Running(Arc::clone(&core));
                Some(core)
            }
        }
    }

    fn open_core(&self) -> std::result::Result<Arc<Core>, LogError> {
        self.core().ok_or(LogError::Closed)
    }

    /// Active configuration, or `None` once shut down
    pub fn config(&self) -> Option<Config> {
        self.core().map(|core| core.config.clone())
    }

    /// Number of internal faults reported so far, across reinitializations
    pub fn internal_fault_count(&self) -> u64 {
        self.shared.faults.count()
    }

    // Logging

    /// Log a message at the given severity
    pub fn log(&self, severity: Severity, message: impl Into<String>) {
        self.dispatch(severity, message, None, LogOptions::default());
    }

    /// Log a message with an attached error, trace, tags or metadata
    pub fn log_with(&self, severity: Severity, message: impl Into<String>, options: LogOptions) {
        self.dispatch(severity, message, None, options);
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

    /// A logger that tags every event with `name`
    pub fn named(&self, name: impl Into<String>) -> NamedLogger {
        NamedLogger::new(self.clone(), name.into())
    }

    /// Run one event through the pipeline. Never panics.
    pub(crate) fn dispatch(
        &self,
        severity: Severity,
        message: impl Into<String>,
        source_name: Option<&str>,
        options: LogOptions,
    ) {
        let faults = &self.shared.faults;
        let outcome = catch_unwind(AssertUnwindSafe(|| {
            let Some(core) = self.core() else {
                return;
            };
            if !core.is_enabled() || severity < core.min_severity() {
                return;
            }
            core.dispatch(severity, message.into(), source_name, options, faults);
        }));

        if let Err(payload) = outcome {
            faults.record(
                FaultStage::Dispatch,
                source_name.unwrap_or("root"),
                &panic_message(payload.as_ref()),
            );
        }
    }

    // Enabled flag and threshold

    pub fn is_enabled(&self) -> bool {
        self.core().is_some_and(|core| core.is_enabled())
    }

    /// Whether an event at `severity` would pass the threshold right now
    pub fn is_enabled_for(&self, severity: Severity) -> bool {
        self.core()
            .is_some_and(|core| core.is_enabled() && severity >= core.min_severity())
    }

    /// Toggle between Active and Disabled. No effect once shut down.
    pub fn set_enabled(&self, enabled: bool) {
        if let Some(core) = self.core() {
            core.enabled.store(enabled, Ordering::Release);
        }
    }

    pub fn enable(&self) {
        self.set_enabled(true);
    }

    pub fn disable(&self) {
        self.set_enabled(false);
    }

    pub fn min_severity(&self) -> Option<Severity> {
        self.core().map(|core| core.min_severity())
    }

    pub fn set_min_severity(&self, severity: Severity) {
        if let Some(core) = self.core() {
            core.min_severity.store(severity.rank(), Ordering::Release);
        }
    }

    // Filters

    /// Append a filter to the chain
    pub fn add_filter(
        &self,
        filter: impl Filter + 'static,
    ) -> std::result::Result<FilterId, LogError> {
        let core = self.open_core()?;
        let id = Uuid::new_v4();
        let filter: Arc<dyn Filter> = Arc::new(filter);
        write(&core.filters).push((id, filter));
        Ok(id)
    }

    pub fn remove_filter(&self, id: FilterId) -> bool {
        let Some(core) = self.core() else {
            return false;
        };
        let mut filters = write(&core.filters);
        let before = filters.len();
        filters.retain(|(fid, _)| *fid != id);
        filters.len() != before
    }

    /// Remove every added filter. The severity threshold stays.
    pub fn clear_filters(&self) {
        if let Some(core) = self.core() {
            write(&core.filters).clear();
        }
    }

    // Listeners

    /// Register a callback invoked synchronously for every accepted event
    pub fn add_listener<F>(&self, listener: F) -> std::result::Result<ListenerId, LogError>
    where
        F: Fn(&LogEvent) -> Result<()> + Send + Sync + 'static,
    {
        let core = self.open_core()?;
        let id = Uuid::new_v4();
        let listener: Listener = Arc::new(listener);
        write(&core.listeners).push((id, listener));
        Ok(id)
    }

    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let Some(core) = self.core() else {
            return false;
        };
        let mut listeners = write(&core.listeners);
        let before = listeners.len();
        listeners.retain(|(lid, _)| *lid != id);
        listeners.len() != before
    }

    pub fn listener_count(&self) -> usize {
        self.core()
            .map(|core| read(&core.listeners).len())
            .unwrap_or(0)
    }

    // Sinks

    /// Register a sink; it is closed when removed or at shutdown
    pub fn add_sink(&self, sink: Arc<dyn Sink>) -> std::result::Result<SinkId, LogError> {
        let core = self.open_core()?;
        let id = Uuid::new_v4();
        write(&core.sinks).push(Arc::new(SinkSlot::new(id, sink)));
        Ok(id)
    }

    /// Unregister and close a sink
    pub fn remove_sink(&self, id: SinkId) -> bool {
        let Some(core) = self.core() else {
            return false;
        };
        let removed = {
            let mut sinks = write(&core.sinks);
            let index = sinks.iter().position(|slot| slot.id == id);
            index.map(|index| sinks.remove(index))
        };
        match removed {
            Some(slot) => {
                slot.close(&self.shared.faults);
                true
            }
            None => false,
        }
    }

    pub fn sink_count(&self) -> usize {
        self.core().map(|core| read(&core.sinks).len()).unwrap_or(0)
    }

    // Stream

    /// Subscribe to accepted events from now on
    ///
    /// Once shut down, the returned subscription is already finished.
    pub fn subscribe(&self) -> Subscription {
        match self.core() {
            Some(core) => core.stream.subscribe(),
            None => Subscription::finished(),
        }
    }

    // History

    /// Every retained event, oldest first
    pub fn history(&self) -> Vec<Arc<LogEvent>> {
        self.with_buffer(|buffer| buffer.all())
    }

    /// The last `count` retained events, oldest first
    pub fn recent(&self, count: usize) -> Vec<Arc<LogEvent>> {
        self.with_buffer(|buffer| buffer.recent(count))
    }

    /// Retained events satisfying `predicate`, oldest first
    pub fn history_matching<P>(&self, predicate: P) -> Vec<Arc<LogEvent>>
    where
        P: FnMut(&LogEvent) -> bool,
    {
        self.with_buffer(|buffer| buffer.matching(predicate))
    }

    pub fn clear_history(&self) {
        if let Some(buffer) = self.core().as_ref().and_then(|core| core.buffer.as_ref()) {
            buffer.clear();
        }
    }

    /// History capacity; 0 when buffering is disabled or the dispatcher is closed
    pub fn buffer_capacity(&self) -> usize {
        self.core()
            .and_then(|core| core.buffer.as_ref().map(RingBuffer::capacity))
            .unwrap_or(0)
    }

    fn with_buffer(
        &self,
        f: impl FnOnce(&RingBuffer) -> Vec<Arc<LogEvent>>,
    ) -> Vec<Arc<LogEvent>> {
        match self.core() {
            Some(core) => core.buffer.as_ref().map(f).unwrap_or_default(),
            None => Vec::new(),
        }
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::uninitialized()
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("state", &self.state())
            .field("internal_faults", &self.internal_fault_count())
            .finish()
    }
}
