//! Cross-cutting helpers: configuration, error types and console output.

pub mod config;
pub mod errors;
pub mod printer;

pub use config::{parse_count, ConfigOverrides, RunConfig, DEFAULT_CAPACITY};
pub use errors::{BufferError, ConfigError, RunError};
pub use printer::{ColoredText, Printer, PrinterColor};
