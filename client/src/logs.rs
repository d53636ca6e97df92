//! Colored `label: value` log lines for send tracing and demos.
//!
//! Log lines build fluently and print on [`LogEntry::log`], the same
//! consuming-builder discipline the rest of the SDK uses. Labels always
//! render in the fixed label color; hues accent the value side only.

use std::fmt;

use colored::{
    Color,
    Colorize,
};

/// Accent applied to a logged value.
#[derive(Clone, Copy, Debug, Default)]
pub enum LogHue {
    /// Ordinary output.
    #[default]
    Plain,
    /// Progress worth noticing: signatures, confirmations.
    Info,
    /// Degraded but not failed: missing accounts, unconfirmed sends.
    Warning,
    Error,
}

impl LogHue {
    fn color(self) -> Color {
        match self {
            LogHue::Plain => Color::BrightBlack,
            LogHue::Info => Color::Green,
            LogHue::Warning => Color::Yellow,
            LogHue::Error => Color::Red,
        }
    }
}

const LABEL_COLOR: Color = Color::Cyan;

/// One labeled log line.
pub struct LogEntry {
    label: String,
    value: String,
    hue: LogHue,
}

impl LogEntry {
    pub fn new(label: impl fmt::Display, value: impl fmt::Display) -> Self {
        Self {
            label: label.to_string(),
            value: value.to_string(),
            hue: LogHue::default(),
        }
    }

    pub fn hue(mut self, hue: LogHue) -> Self {
        self.hue = hue;
        self
    }

    pub fn log(self) {
        println!("{self}");
    }
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {}",
            self.label.as_str().color(LABEL_COLOR),
            self.value.as_str().color(self.hue.color()),
        )
    }
}
