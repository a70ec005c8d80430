//! Event filters
//!
//! A filter is a pure predicate over a [`LogEvent`]. Filters never fail at
//! evaluation time: anything that can go wrong (such as a malformed regular
//! expression) is rejected when the filter is constructed.

use std::sync::Arc;

use regex::Regex;

use crate::error::LogError;
use crate::event::LogEvent;
use crate::severity::Severity;

/// Decides whether an event is processed further
pub trait Filter: Send + Sync {
    fn should_log(&self, event: &LogEvent) -> bool;
}

impl<F> Filter for F
where
    F: Fn(&LogEvent) -> bool + Send + Sync,
{
    fn should_log(&self, event: &LogEvent) -> bool {
        self(event)
    }
}

/// Passes events at or above a minimum severity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThresholdFilter {
    min: Severity,
}

impl ThresholdFilter {
    pub fn new(min: Severity) -> Self {
        Self { min }
    }

    pub fn min(&self) -> Severity {
        self.min
    }
}

impl Filter for ThresholdFilter {
    fn should_log(&self, event: &LogEvent) -> bool {
        event.severity() >= self.min
    }
}

/// How a [`NameFilter`] matches source names
#[derive(Debug, Clone)]
pub enum NamePattern {
    /// Plain substring match
    Substring(String),
    /// Regular expression, searched anywhere in the name
    Regex(Regex),
}

impl NamePattern {
    /// Compile a regular expression pattern
    pub fn regex(pattern: &str) -> Result<Self, LogError> {
        Regex::new(pattern)
            .map(NamePattern::Regex)
            .map_err(|source| LogError::InvalidPattern {
                pattern: pattern.to_string(),
                source,
            })
    }

    pub fn is_match(&self, name: &str) -> bool {
        match self {
            NamePattern::Substring(needle) => name.contains(needle.as_str()),
            NamePattern::Regex(re) => re.is_match(name),
        }
    }
}

impl From<&str> for NamePattern {
    fn from(value: &str) -> Self {
        NamePattern::Substring(value.to_string())
    }
}

impl From<String> for NamePattern {
    fn from(value: String) -> Self {
        NamePattern::Substring(value)
    }
}

impl From<Regex> for NamePattern {
    fn from(value: Regex) -> Self {
        NamePattern::Regex(value)
    }
}

/// Includes or excludes events by the name of the logger that produced them
///
/// Events without a source name pass only exclusion filters.
#[derive(Debug, Clone)]
pub struct NameFilter {
    pattern: NamePattern,
    include: bool,
}

impl NameFilter {
    pub fn new(pattern: impl Into<NamePattern>, include: bool) -> Self {
        Self {
            pattern: pattern.into(),
            include,
        }
    }

    /// Keep only events whose source name matches
    pub fn include(pattern: impl Into<NamePattern>) -> Self {
        Self::new(pattern, true)
    }

    /// Drop events whose source name matches
    pub fn exclude(pattern: impl Into<NamePattern>) -> Self {
        Self::new(pattern, false)
    }

    /// Build a filter from a regular expression, failing on a malformed pattern
    pub fn regex(pattern: &str, include: bool) -> Result<Self, LogError> {
        Ok(Self::new(NamePattern::regex(pattern)?, include))
    }
}

impl Filter for NameFilter {
    fn should_log(&self, event: &LogEvent) -> bool {
        match event.source_name() {
            None => !self.include,
            Some(name) => self.pattern.is_match(name) == self.include,
        }
    }
}

/// AND of its sub-filters, evaluated in order and short-circuiting on the first rejection
#[derive(Clone, Default)]
pub struct CompositeFilter {
    filters: Vec<Arc<dyn Filter>>,
}

impl CompositeFilter {
    pub fn new(filters: Vec<Arc<dyn Filter>>) -> Self {
        Self { filters }
    }

    pub fn push(&mut self, filter: impl Filter + 'static) {
        self.filters.push(Arc::new(filter));
    }

    pub fn with(mut self, filter: impl Filter + 'static) -> Self {
        self.push(filter);
        self
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }
}

impl Filter for CompositeFilter {
    fn should_log(&self, event: &LogEvent) -> bool {
        self.filters.iter().all(|f| f.should_log(event))
    }
}
