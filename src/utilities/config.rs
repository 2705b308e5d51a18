//! Run configuration.
//!
//! A run is described by a [`RunConfig`]. Values are layered: built-in
//! defaults, then an optional YAML file, then explicit overrides (usually
//! from the command line). The merged result is validated before any worker
//! starts.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::utilities::errors::ConfigError;

/// Default number of slots in the buffer.
pub const DEFAULT_CAPACITY: usize = 20;

/// Configuration for one run of the bounded buffer and its workers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunConfig {
    /// Number of slots in the buffer.
    pub capacity: usize,
    /// Number of producer workers.
    pub producers: usize,
    /// Number of consumer workers.
    pub consumers: usize,
    /// Pause after each production, in milliseconds.
    pub producer_interval_ms: u64,
    /// Pause before each consumption, in milliseconds.
    pub consumer_interval_ms: u64,
    /// Upper bound on how long a consumer waits for an item before
    /// re-checking its stop token, in milliseconds.
    pub poll_interval_ms: u64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            producers: 1,
            consumers: 1,
            producer_interval_ms: 1000,
            consumer_interval_ms: 2000,
            poll_interval_ms: 100,
        }
    }
}

/// Optional overrides applied on top of a [`RunConfig`].
///
/// `None` keeps the underlying value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigOverrides {
    pub capacity: Option<usize>,
    pub producers: Option<usize>,
    pub consumers: Option<usize>,
    pub producer_interval_ms: Option<u64>,
    pub consumer_interval_ms: Option<u64>,
    pub poll_interval_ms: Option<u64>,
}

impl RunConfig {
    /// Parse a configuration from YAML text.
    ///
    /// `origin` is only used to label errors.
    pub fn from_yaml_str(yaml: &str, origin: &Path) -> Result<Self, ConfigError> {
        serde_yaml::from_str(yaml).map_err(|source| ConfigError::Parse {
            path: origin.to_path_buf(),
            source,
        })
    }

    /// Load a configuration from a YAML file. Missing keys take their defaults.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&text, path)
    }

    /// Apply overrides, returning the merged configuration.
    pub fn merge(mut self, overrides: &ConfigOverrides) -> Self {
        if let Some(capacity) = overrides.capacity {
            self.capacity = capacity;
        }
        if let Some(producers) = overrides.producers {
            self.producers = producers;
        }
        if let Some(consumers) = overrides.consumers {
            self.consumers = consumers;
        }
        if let Some(ms) = overrides.producer_interval_ms {
            self.producer_interval_ms = ms;
        }
        if let Some(ms) = overrides.consumer_interval_ms {
            self.consumer_interval_ms = ms;
        }
        if let Some(ms) = overrides.poll_interval_ms {
            self.poll_interval_ms = ms;
        }
        self
    }

    /// Check every field that has a constraint.
    ///
    /// Pacing intervals may be zero (workers then run flat out); the poll
    /// interval may not, since a zero poll would turn an idle consumer into a
    /// busy loop.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.capacity == 0 {
            return Err(ConfigError::InvalidCapacity {
                capacity: self.capacity,
            });
        }
        if self.producers == 0 {
            return Err(ConfigError::InvalidWorkerCount {
                role: "producer",
                value: self.producers.to_string(),
            });
        }
        if self.consumers == 0 {
            return Err(ConfigError::InvalidWorkerCount {
                role: "consumer",
                value: self.consumers.to_string(),
            });
        }
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::InvalidInterval {
                name: "poll_interval_ms",
            });
        }
        Ok(())
    }

    pub fn producer_interval(&self) -> Duration {
        Duration::from_millis(self.producer_interval_ms)
    }

    pub fn consumer_interval(&self) -> Duration {
        Duration::from_millis(self.consumer_interval_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Parse a user-supplied worker count.
///
/// Surrounding whitespace is ignored. Zero, negative and non-numeric input
/// are all rejected.
pub fn parse_count(input: &str, role: &'static str) -> Result<usize, ConfigError> {
    match input.trim().parse::<usize>() {
        Ok(count) if count > 0 => Ok(count),
        _ => Err(ConfigError::InvalidWorkerCount {
            role,
            value: input.to_string(),
        }),
    }
}
