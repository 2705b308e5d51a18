//! Command-line front end.
//!
//! Arguments override values from an optional YAML config file, which in
//! turn override the built-in defaults.

use std::path::PathBuf;

use clap::Parser;

use crate::utilities::config::{parse_count, ConfigOverrides, RunConfig};
use crate::utilities::errors::ConfigError;

/// Run producers and consumers against a bounded buffer.
#[derive(Debug, Parser)]
#[command(name = "bounded-buffer", version, about)]
pub struct Cli {
    /// YAML file with run settings.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Number of slots in the buffer.
    #[arg(long)]
    pub capacity: Option<usize>,

    /// Number of producer threads.
    #[arg(long, value_parser = parse_producers)]
    pub producers: Option<usize>,

    /// Number of consumer threads.
    #[arg(long, value_parser = parse_consumers)]
    pub consumers: Option<usize>,

    /// Pause after each production, in milliseconds.
    #[arg(long, value_name = "MS")]
    pub producer_interval_ms: Option<u64>,

    /// Pause before each consumption, in milliseconds.
    #[arg(long, value_name = "MS")]
    pub consumer_interval_ms: Option<u64>,

    /// How often an idle consumer re-checks for shutdown, in milliseconds.
    #[arg(long, value_name = "MS")]
    pub poll_interval_ms: Option<u64>,

    /// Stop after this many seconds instead of waiting for Ctrl-C.
    #[arg(long, value_name = "SECS")]
    pub duration_secs: Option<u64>,

    /// Print events as JSON lines instead of colored text.
    #[arg(long)]
    pub json: bool,
}

fn parse_producers(input: &str) -> Result<usize, ConfigError> {
    parse_count(input, "producer")
}

fn parse_consumers(input: &str) -> Result<usize, ConfigError> {
    parse_count(input, "consumer")
}

impl Cli {
    /// Values given on the command line, `None` where omitted.
    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            capacity: self.capacity,
            producers: self.producers,
            consumers: self.consumers,
            producer_interval_ms: self.producer_interval_ms,
            consumer_interval_ms: self.consumer_interval_ms,
            poll_interval_ms: self.poll_interval_ms,
        }
    }

    /// Merge defaults, the config file (if any) and the arguments, then
    /// validate the result.
    pub fn run_config(&self) -> Result<RunConfig, ConfigError> {
        let base = match &self.config {
            Some(path) => RunConfig::from_yaml_file(path)?,
            None => RunConfig::default(),
        };
        let config = base.merge(&self.overrides());
        config.validate()?;
        Ok(config)
    }
}
