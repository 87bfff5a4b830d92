//! Log record model
//!
//! - `LogLevel` - Severity levels and threshold checks
//! - `LogRecord` / `LogLine` - Producer message and its rendered line
//! - `console` - Coloured stdout mirror

pub mod console;
pub mod level;
pub mod record;

pub use level::LogLevel;
pub use record::{format_line, format_timestamp, LogLine, LogRecord};

/// Initialize tracing for the logger's own diagnostics
///
/// Call early in main() before any logging occurs.
/// Set `verbose` to true for debug-level output.
pub fn init_tracing(verbose: bool) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let level = if verbose { "debug" } else { "info" };

    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_file(false)
                .compact(),
        )
        .with(tracing_subscriber::EnvFilter::new(level))
        .try_init();
}
