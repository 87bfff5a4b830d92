//! Console mirror of processed records
//!
//! Colours follow the level; output goes to stdout and is best effort.

use super::{LogLevel, LogLine};
use crossterm::style::{Attribute, Color, ContentStyle, Stylize};
use std::io::{self, Write};

/// Style for a level's console line
pub fn level_style(level: LogLevel) -> ContentStyle {
    let style = ContentStyle::new();
    match level {
        LogLevel::Trace => style.with(Color::Grey),
        LogLevel::Debug => style.with(Color::DarkCyan).attribute(Attribute::Bold),
        LogLevel::Info => style.with(Color::White),
        LogLevel::Important => style.with(Color::DarkYellow),
        LogLevel::Warning => style.with(Color::Yellow).attribute(Attribute::Bold),
        LogLevel::Error => style.with(Color::Red),
        LogLevel::Critical => style
            .with(Color::White)
            .on(Color::DarkRed)
            .attribute(Attribute::Bold),
        LogLevel::Fatal => style
            .with(Color::White)
            .on(Color::Red)
            .attribute(Attribute::Bold),
        LogLevel::None => style,
    }
}

/// Plain console text for a line, without styling
pub fn console_text(handle: usize, line: &LogLine) -> String {
    format!("[File: {}]{}", handle, line.text)
}

/// Print a processed line to stdout
pub fn echo(handle: usize, line: &LogLine) {
    let styled = level_style(line.level).apply(console_text(handle, line));
    let mut out = io::stdout().lock();
    let _ = write!(out, "{}", styled);
    let _ = out.flush();
}
