//! Logger Daemon - buffered multi-file logger
//!
//! Application threads submit leveled records; one background worker thread
//! appends them to per-destination memory buffers and flushes those to disk
//! when they fill up, when they go stale, and at shutdown.
//!
//! Modules:
//! - `engine` - `Logger` facade and the worker-side `Dispatcher`
//! - `destination` - Buffered log files and the per-run directory layout
//! - `daemon` - Generic single-consumer worker thread
//! - `logging` - Levels, records, line format and console echo
//! - `config` - `Settings` loaded from TOML

pub mod clock;
pub mod config;
pub mod constants;
pub mod daemon;
pub mod destination;
pub mod engine;
pub mod error;
pub mod logging;
pub mod stats;

pub use clock::{Clock, FixedClock, SystemClock};
pub use config::Settings;
pub use daemon::DaemonState;
pub use engine::{Handle, Logger};
pub use error::{LoggerError, Result};
pub use logging::{LogLevel, LogLine, LogRecord};
pub use stats::StatsSnapshot;
