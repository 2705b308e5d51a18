//! Text presentation of the buffer's notification feeds.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::buffer::BufferSnapshot;
use crate::events::{Activity, BufferEvent, EventListener, WorkerRole};
use crate::run::RunSummary;
use crate::utilities::printer::{ColoredText, Printer, PrinterColor};

/// Slot contents followed by the number of occupied slots.
pub fn render_state(snapshot: &BufferSnapshot) -> String {
    format!(
        "buffer {} occupied {}/{}",
        snapshot,
        snapshot.occupied(),
        snapshot.capacity()
    )
}

/// End-of-run totals. Items still in the buffer are shown in red.
pub fn summary_segments(summary: &RunSummary, remaining: &BufferSnapshot) -> Vec<ColoredText> {
    vec![
        ColoredText::new(
            format!("produced {}", summary.produced().len()),
            PrinterColor::BoldGreen,
        ),
        ColoredText::new(
            format!(", consumed {}", summary.consumed().len()),
            PrinterColor::BoldYellow,
        ),
        ColoredText::new(", left in buffer ", PrinterColor::White),
        ColoredText::new(remaining.to_string(), PrinterColor::Red),
    ]
}

/// Prints both feeds to stdout.
///
/// Snapshots can arrive out of order when several workers publish at once;
/// a snapshot older than the newest one already printed is skipped.
pub struct ConsoleListener {
    printer: Printer,
    last_state: AtomicU64,
}

impl ConsoleListener {
    pub fn new(printer: Printer) -> Self {
        Self {
            printer,
            last_state: AtomicU64::new(0),
        }
    }

    /// Colored activity line, without printing it.
    pub fn format_activity(&self, activity: &Activity) -> String {
        let color = match activity.role {
            WorkerRole::Producer => PrinterColor::Green,
            WorkerRole::Consumer => PrinterColor::Cyan,
        };
        self.printer.format(&[
            ColoredText::new(format!("#{:<5} ", activity.sequence), PrinterColor::White),
            ColoredText::new(activity.description(), color),
            ColoredText::new(format!(" (slot {})", activity.slot), PrinterColor::Yellow),
        ])
    }

    /// Returns the line to print, or `None` for a stale snapshot.
    pub fn format_state(&self, snapshot: &BufferSnapshot) -> Option<String> {
        let previous = self.last_state.fetch_max(snapshot.sequence, Ordering::AcqRel);
        if previous >= snapshot.sequence {
            return None;
        }
        Some(self.printer.format(&[ColoredText::new(
            render_state(snapshot),
            PrinterColor::BoldYellow,
        )]))
    }
}

impl Default for ConsoleListener {
    fn default() -> Self {
        Self::new(Printer::new())
    }
}

impl EventListener for ConsoleListener {
    fn on_buffer_state(&self, snapshot: &BufferSnapshot) {
        if let Some(line) = self.format_state(snapshot) {
            println!("{}", line);
        }
    }

    fn on_activity(&self, activity: &Activity) {
        println!("{}", self.format_activity(activity));
    }
}

/// Prints every event as one line of JSON.
#[derive(Debug, Default)]
pub struct JsonLinesListener;

impl JsonLinesListener {
    pub fn format(event: &BufferEvent) -> Option<String> {
        match serde_json::to_string(event) {
            Ok(line) => Some(line),
            Err(err) => {
                tracing::warn!(error = %err, sequence = event.sequence(), "failed to encode event");
                None
            }
        }
    }
}

impl EventListener for JsonLinesListener {
    fn on_event(&self, event: &BufferEvent) {
        if let Some(line) = Self::format(event) {
            println!("{}", line);
        }
    }
}
