//! loghub - structured, leveled logging core
//!
//! Accepts log events from application code, filters them, keeps a bounded
//! recent history, and fans them out to listeners, a broadcast stream and
//! pluggable sinks. Logging calls never fail and never panic.

pub mod buffer;
pub mod config;
pub mod diagnostics;
pub mod dispatcher;
pub mod error;
pub mod event;
pub mod filter;
pub mod global;
pub mod named;
pub mod severity;
pub mod sink;
pub mod stream;

pub use buffer::RingBuffer;
pub use config::Config;
pub use dispatcher::{Dispatcher, DispatcherState, FilterId, ListenerId, SinkId};
pub use error::LogError;
pub use event::{EventId, LogEvent, LogOptions, Metadata, MetadataValue};
pub use filter::{CompositeFilter, Filter, NameFilter, NamePattern, ThresholdFilter};
pub use global::global;
pub use named::NamedLogger;
pub use severity::Severity;
pub use sink::{ConsoleSink, MemorySink, Sink, TracingSink};
pub use stream::{EventStream, Subscription};
