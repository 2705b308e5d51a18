//! bounded-buffer console binary.
//!
//! Starts producer and consumer threads against one bounded buffer and
//! prints every buffer change and activity line until Ctrl-C (or
//! `--duration-secs`), then prints what each side managed.
//!
//! # Environment Variables
//!
//! - `RUST_LOG`: tracing filter (default: "info"); logs go to stderr.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin bounded-buffer -- --producers 3 --consumers 2
//! cargo run --bin bounded-buffer -- --config run.yaml --json --duration-secs 10
//! ```

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;

use bounded_buffer::cli::Cli;
use bounded_buffer::render::{render_state, summary_segments, ConsoleListener, JsonLinesListener};
use bounded_buffer::utilities::printer::Printer;
use bounded_buffer::{BoundedBuffer, Run};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = cli.run_config().context("invalid configuration")?;

    let buffer = Arc::new(BoundedBuffer::new(config.capacity)?);
    if cli.json {
        buffer.event_bus().register("json", JsonLinesListener);
    } else {
        println!("{}", render_state(&buffer.snapshot()));
        buffer
            .event_bus()
            .register("console", ConsoleListener::default());
    }

    let run = Run::start_with(&config, Arc::clone(&buffer)).context("failed to start workers")?;
    let stop = run.stop_token();
    {
        let stop = stop.clone();
        ctrlc::set_handler(move || stop.stop()).context("failed to install Ctrl-C handler")?;
    }

    match cli.duration_secs {
        Some(secs) => {
            stop.sleep(Duration::from_secs(secs));
        }
        None => stop.wait(),
    }

    let summary = run.stop().context("run ended with an error")?;
    buffer.event_bus().shutdown();

    let remaining = buffer.snapshot();
    if cli.json {
        println!("{}", serde_json::to_string(&summary)?);
    } else {
        Printer::new().print_colored(&summary_segments(&summary, &remaining));
    }
    Ok(())
}
