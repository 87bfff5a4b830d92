//! Log record types
//!
//! A `LogRecord` is what a producer asks to write; a `LogLine` is the rendered
//! text that travels through the worker queue.

use super::LogLevel;
use crate::constants::LEVEL_FIELD_WIDTH;
use chrono::{NaiveDateTime, Timelike};

/// Message submitted by a producer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    pub level: LogLevel,
    pub message: String,
}

/// Rendered record, ready to be appended to a destination
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLine {
    pub level: LogLevel,
    /// Full line including the trailing newline
    pub text: String,
}

impl LogRecord {
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
        }
    }

    /// Render as `<timestamp> [<LEVEL>]    :: <message>\n`
    pub fn render(&self, at: NaiveDateTime) -> LogLine {
        LogLine {
            level: self.level,
            text: format_line(self.level, &self.message, at),
        }
    }
}

impl LogLine {
    #[inline]
    pub fn len(&self) -> usize {
        self.text.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        self.text.as_bytes()
    }
}

/// `YYYY-MM-DD HH:MM:SS.mmmm` (milliseconds, zero-padded to four digits)
pub fn format_timestamp(at: NaiveDateTime) -> String {
    // Leap seconds report nanos >= 1e9
    let millis = (at.nanosecond() / 1_000_000).min(999);
    format!("{}.{:04}", at.format("%Y-%m-%d %H:%M:%S"), millis)
}

pub fn format_line(level: LogLevel, message: &str, at: NaiveDateTime) -> String {
    let tag = format!("[{}]", level.as_str());
    format!(
        "{} {:<width$} :: {}\n",
        format_timestamp(at),
        tag,
        message,
        width = LEVEL_FIELD_WIDTH
    )
}
