//! Error types for the bounded buffer and its run layer.
//!
//! Configuration problems are reported before any worker starts; the buffer
//! itself has a single, invariant-guarding failure mode.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while building or validating a run configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Buffer capacity must be a positive integer.
    #[error("Invalid buffer capacity: {capacity} (must be at least 1)")]
    InvalidCapacity { capacity: usize },

    /// A producer or consumer count was zero or not a number.
    #[error("Invalid {role} count: {value:?} (expected a positive integer)")]
    InvalidWorkerCount { role: &'static str, value: String },

    /// A pacing or polling interval that must be non-zero was zero.
    #[error("Invalid interval `{name}`: must be greater than zero")]
    InvalidInterval { name: &'static str },

    /// The configuration file could not be read.
    #[error("Failed to read config file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid YAML for a run configuration.
    #[error("Failed to parse config file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

/// Errors raised by buffer operations.
#[derive(Debug, Error)]
pub enum BufferError {
    /// An admission token was granted but the slot scan found nothing to
    /// act on. Admission tokens and slot occupancy have diverged.
    #[error("Slot accounting mismatch during {operation} (capacity {capacity})")]
    SlotAccounting {
        operation: &'static str,
        capacity: usize,
    },
}

/// Errors raised while starting or stopping a run of workers.
#[derive(Debug, Error)]
pub enum RunError {
    /// The run configuration was rejected.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A worker thread could not be spawned.
    #[error("Failed to spawn worker thread {name}: {source}")]
    Spawn {
        name: String,
        #[source]
        source: std::io::Error,
    },

    /// A worker thread panicked.
    #[error("Worker thread {name} panicked")]
    WorkerPanicked { name: String },

    /// A worker stopped because a buffer operation failed.
    #[error("Worker {name} failed: {source}")]
    Worker {
        name: String,
        #[source]
        source: BufferError,
    },
}
