//! Command-line interface definition using clap
//!
//! Provides structured argument parsing with automatic help generation.

use clap::Parser;
use logger_daemon::LogLevel;
use std::path::PathBuf;

// =============================================================================
// CLI Definition
// =============================================================================

/// Interactive front-end: every line typed on stdin is logged as INFO
#[derive(Parser, Debug, Default)]
#[command(name = "logger-daemon")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose debug output (logger self-diagnostics)
    #[arg(short, long)]
    pub verbose: bool,

    /// Settings file (TOML)
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Base log directory (overrides config)
    #[arg(long, value_name = "DIR")]
    pub log_root: Option<PathBuf>,

    /// Minimum level to record (overrides config)
    #[arg(long, value_name = "LEVEL")]
    pub level: Option<LogLevel>,

    /// Mirror records on the console
    #[arg(long)]
    pub console: bool,

    /// Base name of the log file
    #[arg(long, value_name = "NAME", default_value = "ProgramRun")]
    pub name: String,
}

// =============================================================================
// Tests
// =============================================================================
