//! Application-wide constants
//!
//! Centralized constants to avoid duplication and ensure consistency.

// =============================================================================
// Buffers
// =============================================================================

/// Per-destination buffer capacity in bytes
pub const DEFAULT_BUFFER_CAPACITY: usize = 4096;

/// Bytes kept free at the end of every buffer (terminator slot)
pub const BUFFER_RESERVE: usize = 1;

/// Upper bound on bytes kept in memory while flushes keep failing
pub const MAX_RETAINED_BYTES: usize = 1024 * 1024;

// =============================================================================
// Timing
// =============================================================================

/// Worker tick interval (milliseconds)
pub const DEFAULT_TICK_INTERVAL_MS: u64 = 20;

/// Ticks without a flush before a destination is flushed anyway
pub const DEFAULT_MAX_IDLE_CYCLES: u32 = 50;

// =============================================================================
// Layout
// =============================================================================

/// Default log root directory
pub const DEFAULT_LOG_ROOT: &str = "./Logs/";

/// Prefix of the dated run directory created under the log root
pub const ROTATION_DIR_PREFIX: &str = "Logs_";

/// Minimum width of the bracketed level field (`[IMPORTANT]` fits exactly)
pub const LEVEL_FIELD_WIDTH: usize = 11;

/// Name of the worker thread
pub const WORKER_THREAD_NAME: &str = "logger-daemon-worker";
