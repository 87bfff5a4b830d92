//! Logger settings
//!
//! Settings are plain data, usually read from a TOML file. They are moved into
//! the `Logger` at construction and only exposed read-only afterwards.

use crate::constants::{
    BUFFER_RESERVE, DEFAULT_BUFFER_CAPACITY, DEFAULT_LOG_ROOT, DEFAULT_MAX_IDLE_CYCLES,
    DEFAULT_TICK_INTERVAL_MS,
};
use crate::error::{LoggerError, Result};
use crate::logging::LogLevel;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Records below this level are dropped before they are queued
    pub minimum_level: LogLevel,
    /// Base directory; each run writes into a dated sub-directory
    pub log_root: PathBuf,
    /// Persist records to files
    pub write_to_file: bool,
    /// Mirror processed records on stdout
    pub echo_to_console: bool,
    /// Recursively delete `log_root` before creating the run directory
    pub clear_root_on_init: bool,
    /// Emit the logger's own operational trace through `tracing`
    pub self_diagnostics: bool,

    // =========================================================================
    // Tuning
    // =========================================================================
    /// Worker tick interval (milliseconds)
    pub tick_interval_ms: u64,
    /// Ticks without a flush before a destination is flushed anyway
    pub max_idle_cycles: u32,
    /// Per-destination buffer capacity (bytes)
    pub buffer_capacity: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            minimum_level: LogLevel::Debug,
            log_root: PathBuf::from(DEFAULT_LOG_ROOT),
            write_to_file: true,
            echo_to_console: false,
            clear_root_on_init: false,
            self_diagnostics: false,
            tick_interval_ms: DEFAULT_TICK_INTERVAL_MS,
            max_idle_cycles: DEFAULT_MAX_IDLE_CYCLES,
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
        }
    }
}

impl Settings {
    /// Parse settings from TOML text; missing keys take their defaults
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let settings: Settings =
            toml::from_str(content).map_err(|e| LoggerError::ConfigParse {
                path: PathBuf::from("<inline>"),
                reason: e.to_string(),
            })?;
        settings.validate()?;
        Ok(settings)
    }

    /// Read and validate a TOML settings file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| LoggerError::ConfigRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        let settings: Settings =
            toml::from_str(&content).map_err(|e| LoggerError::ConfigParse {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if self.tick_interval_ms == 0 {
            return Err(LoggerError::ConfigValidation {
                field: "tick_interval_ms",
                reason: "must be greater than zero".into(),
            });
        }
        if self.max_idle_cycles == 0 {
            return Err(LoggerError::ConfigValidation {
                field: "max_idle_cycles",
                reason: "must be greater than zero".into(),
            });
        }
        if self.buffer_capacity <= BUFFER_RESERVE {
            return Err(LoggerError::ConfigValidation {
                field: "buffer_capacity",
                reason: format!("must be larger than {} byte(s)", BUFFER_RESERVE),
            });
        }
        Ok(())
    }

    #[inline]
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

// ============================================================================
// Tests
// ============================================================================
