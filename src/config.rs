//! Configuration for the dispatcher

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::LogError;
use crate::severity::Severity;
use crate::stream::DEFAULT_STREAM_CAPACITY;

/// Environment variable overriding [`Config::min_severity`]
pub const ENV_MIN_SEVERITY: &str = "LOGHUB_MIN_SEVERITY";
/// Environment variable overriding [`Config::buffer_capacity`]
pub const ENV_BUFFER_CAPACITY: &str = "LOGHUB_BUFFER_CAPACITY";
/// Environment variable overriding [`Config::enabled`]
pub const ENV_ENABLED: &str = "LOGHUB_ENABLED";
/// Environment variable overriding [`Config::capture_traces`]
pub const ENV_CAPTURE_TRACES: &str = "LOGHUB_CAPTURE_TRACES";

/// Dispatcher initialization parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Events below this severity are discarded (default: trace)
    #[serde(default)]
    pub min_severity: Severity,

    /// Number of recent events kept in history; 0 disables buffering (default: 1000)
    #[serde(default = "default_buffer_capacity")]
    pub buffer_capacity: usize,

    /// Whether logging starts enabled (default: true)
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Allow logging in release builds (default: false)
    ///
    /// Debug builds always honor `enabled`; release builds additionally
    /// require this flag.
    #[serde(default)]
    pub enable_in_release: bool,

    /// Capture a backtrace for Error and Fatal events without an explicit trace (default: true)
    #[serde(default = "default_capture_traces")]
    pub capture_traces: bool,

    /// Events a stream subscriber may fall behind before missing some (default: 1024)
    #[serde(default = "default_stream_capacity")]
    pub stream_capacity: usize,
}

fn default_buffer_capacity() -> usize {
    1000
}

fn default_enabled() -> bool {
    true
}

fn default_capture_traces() -> bool {
    true
}

fn default_stream_capacity() -> usize {
    DEFAULT_STREAM_CAPACITY
}

impl Default for Config {
    fn default() -> Self {
        Self {
            min_severity: Severity::default(),
            buffer_capacity: default_buffer_capacity(),
            enabled: default_enabled(),
            enable_in_release: false,
            capture_traces: default_capture_traces(),
            stream_capacity: default_stream_capacity(),
        }
    }
}

impl Config {
    /// Load configuration from the default file, or return defaults if not found
    pub fn load() -> Result<Self> {
        Self::load_from(&config_file_path())
    }

    /// Load configuration from a TOML file, or return defaults if it does not exist
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path).context("Failed to read config file")?;
            toml::from_str(&content).context("Failed to parse config file")
        } else {
            Ok(Self::default())
        }
    }

    /// Apply `LOGHUB_*` overrides from the process environment
    pub fn with_env_overrides(self) -> Result<Self, LogError> {
        self.apply_env_overrides(|key| std::env::var(key).ok())
    }

    /// Apply `LOGHUB_*` overrides looked up through `lookup`
    pub fn apply_env_overrides<F>(mut self, lookup: F) -> Result<Self, LogError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(ENV_MIN_SEVERITY) {
            self.min_severity = value.parse()?;
        }
        if let Some(value) = lookup(ENV_BUFFER_CAPACITY) {
            self.buffer_capacity = value
                .trim()
                .parse()
                .map_err(|_| invalid_override(ENV_BUFFER_CAPACITY, &value))?;
        }
        if let Some(value) = lookup(ENV_ENABLED) {
            self.enabled = parse_bool(ENV_ENABLED, &value)?;
        }
        if let Some(value) = lookup(ENV_CAPTURE_TRACES) {
            self.capture_traces = parse_bool(ENV_CAPTURE_TRACES, &value)?;
        }
        Ok(self)
    }

    /// Whether logging starts enabled under the given build mode
    pub fn initially_enabled(&self, debug_build: bool) -> bool {
        self.enabled && (debug_build || self.enable_in_release)
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool, LogError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(invalid_override(key, value)),
    }
}

fn invalid_override(key: &str, value: &str) -> LogError {
    LogError::InvalidOverride {
        key: key.to_string(),
        value: value.to_string(),
    }
}

/// Get the base configuration directory (~/.loghub)
/// Falls back to ./.loghub if home directory cannot be determined
pub fn config_dir() -> PathBuf {
    try_config_dir().unwrap_or_else(|| {
        tracing::warn!("Could not determine home directory, using current directory for config");
        PathBuf::from(".loghub")
    })
}

/// Try to get the base configuration directory, returning None if home dir is unavailable
pub fn try_config_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".loghub"))
}

/// Get the path to the config file
pub fn config_file_path() -> PathBuf {
    config_dir().join("config.toml")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| vars.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.min_severity, Severity::Trace);
        assert_eq!(config.buffer_capacity, 1000);
        assert!(config.enabled);
        assert!(!config.enable_in_release);
        assert!(config.capture_traces);
        assert_eq!(config.stream_capacity, 1024);
    }

    #[test]
    fn test_config_serialization() {
        let config = Config {
            min_severity: Severity::Warning,
            buffer_capacity: 0,
            ..Config::default()
        };
        let toml_str = toml::to_string(&config).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_config_partial_file_uses_defaults() {
        let parsed: Config = toml::from_str("min_severity = \"warn\"\n").unwrap();
        assert_eq!(parsed.min_severity, Severity::Warning);
        assert_eq!(parsed.buffer_capacity, 1000);
        assert!(parsed.capture_traces);
    }

    #[test]
    fn test_load_from_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let config = Config::load_from(&temp_dir.path().join("config.toml")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(&path, "buffer_capacity = 3\ncapture_traces = false\n").unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.buffer_capacity, 3);
        assert!(!config.capture_traces);
    }

    #[test]
    fn test_load_from_invalid_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(&path, "buffer_capacity = \"lots\"\n").unwrap();

        assert!(Config::load_from(&path).is_err());
    }

    #[test]
    fn test_env_overrides() {
        let config = Config::default()
            .apply_env_overrides(lookup(&[
                (ENV_MIN_SEVERITY, "error"),
                (ENV_BUFFER_CAPACITY, "5"),
                (ENV_ENABLED, "off"),
                (ENV_CAPTURE_TRACES, "0"),
            ]))
            .unwrap();

        assert_eq!(config.min_severity, Severity::Error);
        assert_eq!(config.buffer_capacity, 5);
        assert!(!config.enabled);
        assert!(!config.capture_traces);
    }

    #[test]
    fn test_env_overrides_reject_bad_values() {
        let err = Config::default()
            .apply_env_overrides(lookup(&[(ENV_BUFFER_CAPACITY, "-1")]))
            .unwrap_err();
        assert!(matches!(err, LogError::InvalidOverride { .. }));

        let err = Config::default()
            .apply_env_overrides(lookup(&[(ENV_MIN_SEVERITY, "loud")]))
            .unwrap_err();
        assert!(matches!(err, LogError::UnknownSeverity(_)));
    }

    #[test]
    fn test_initially_enabled_policy() {
        let config = Config::default();
        assert!(config.initially_enabled(true));
        assert!(!config.initially_enabled(false));

        let release = Config {
            enable_in_release: true,
            ..Config::default()
        };
        assert!(release.initially_enabled(false));

        let off = Config {
            enabled: false,
            enable_in_release: true,
            ..Config::default()
        };
        assert!(!off.initially_enabled(true));
    }

    #[test]
    fn test_config_dir_does_not_panic() {
        let dir = config_dir();
        assert!(dir.ends_with(".loghub"));
        assert!(config_file_path().ends_with("config.toml"));
    }

    #[test]
    fn test_config_dir_prefers_home() {
        match try_config_dir() {
            Some(dir) => assert_eq!(config_dir(), dir),
            None => assert_eq!(config_dir(), PathBuf::from(".loghub")),
        }
    }
}
