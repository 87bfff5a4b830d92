//! Centralized error types for the logger
//!
//! All logger errors are represented by the `LoggerError` enum.
//! Use `Result<T>` as shorthand for `std::result::Result<T, LoggerError>`.

use std::fmt;
use std::path::PathBuf;

/// All logger errors
#[derive(Debug)]
pub enum LoggerError {
    // === Addressing ===
    /// A destination handle that was never returned by `register`
    InvalidHandle { handle: usize, registered: usize },

    // === IO ===
    /// File system operation failed (buffered bytes are kept for retry)
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Bytes given up after flushes kept failing past the retention ceiling
    DataLoss { path: PathBuf, bytes: u64 },

    // === Lifecycle ===
    /// Write attempted after stop was signaled
    ShutdownInProgress,
    /// Destination registered after the worker started
    RegistrationClosed,
    /// `start` called twice
    AlreadyStarted,
    /// Operation requires a started worker
    NotStarted,
    /// The worker thread could not be spawned
    Spawn { source: std::io::Error },
    /// The worker thread panicked before finishing its epilogue
    WorkerPanicked,

    // === Config ===
    /// Failed to read a config file
    ConfigRead {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Config file is not valid TOML for `Settings`
    ConfigParse { path: PathBuf, reason: String },
    /// Invalid config value
    ConfigValidation { field: &'static str, reason: String },
}

impl std::error::Error for LoggerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. }
            | Self::Spawn { source }
            | Self::ConfigRead { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl fmt::Display for LoggerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidHandle { handle, registered } => write!(
                f,
                "Invalid log file handle {} ({} registered)",
                handle, registered
            ),
            Self::Io { path, source } => write!(f, "IO error: {}: {}", path.display(), source),
            Self::DataLoss { path, bytes } => write!(
                f,
                "Lost {} byte(s) for {} after repeated write failures",
                bytes,
                path.display()
            ),
            Self::ShutdownInProgress => write!(f, "Logger is shutting down"),
            Self::RegistrationClosed => {
                write!(f, "Log files must be registered before the logger starts")
            }
            Self::AlreadyStarted => write!(f, "Logger already started"),
            Self::NotStarted => write!(f, "Logger not started"),
            Self::Spawn { source } => write!(f, "Cannot spawn logger thread: {}", source),
            Self::WorkerPanicked => write!(f, "Logger thread panicked"),
            Self::ConfigRead { path, .. } => write!(f, "Cannot read config: {}", path.display()),
            Self::ConfigParse { path, reason } => {
                write!(f, "Config parse error in {}: {}", path.display(), reason)
            }
            Self::ConfigValidation { field, reason } => {
                write!(f, "Invalid {}: {}", field, reason)
            }
        }
    }
}

/// Alias for Result with LoggerError
pub type Result<T> = std::result::Result<T, LoggerError>;
