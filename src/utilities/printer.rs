//! Console printer with optional ANSI colors.

/// Colors used for console output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrinterColor {
    Red,
    Green,
    Yellow,
    Cyan,
    White,
    BoldGreen,
    BoldYellow,
}

impl PrinterColor {
    /// ANSI escape code for this color.
    fn ansi_code(&self) -> &'static str {
        match self {
            Self::Red => "\x1b[31m",
            Self::Green => "\x1b[32m",
            Self::Yellow => "\x1b[33m",
            Self::Cyan => "\x1b[36m",
            Self::White => "\x1b[37m",
            Self::BoldGreen => "\x1b[1;32m",
            Self::BoldYellow => "\x1b[1;33m",
        }
    }
}

/// ANSI reset code.
const RESET: &str = "\x1b[0m";

/// A piece of colored text.
pub struct ColoredText {
    pub text: String,
    pub color: PrinterColor,
}

impl ColoredText {
    pub fn new(text: impl Into<String>, color: PrinterColor) -> Self {
        Self {
            text: text.into(),
            color,
        }
    }
}

/// Printer for console output.
///
/// With colors disabled the same segments are written as plain text, which
/// keeps piped output free of escape codes.
#[derive(Debug, Clone)]
pub struct Printer {
    colored: bool,
}

impl Default for Printer {
    fn default() -> Self {
        Self::new()
    }
}

impl Printer {
    /// Create a printer that emits ANSI colors.
    pub fn new() -> Self {
        Self { colored: true }
    }

    /// Create a printer that never emits escape codes.
    pub fn plain() -> Self {
        Self { colored: false }
    }

    /// Format colored segments into a single line without printing it.
    pub fn format(&self, segments: &[ColoredText]) -> String {
        let mut line = String::new();
        for segment in segments {
            if self.colored {
                line.push_str(segment.color.ansi_code());
                line.push_str(&segment.text);
                line.push_str(RESET);
            } else {
                line.push_str(&segment.text);
            }
        }
        line
    }

    /// Print multiple colored text segments on a single line.
    pub fn print_colored(&self, segments: &[ColoredText]) {
        println!("{}", self.format(segments));
    }
}
