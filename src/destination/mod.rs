//! Log file destinations
//!
//! - `Destination` - One file plus its write buffer and staleness counter
//! - `Registry` - Handle-indexed destinations and the per-run directory

pub mod buffer;
pub mod registry;

pub use buffer::{AppendOutcome, Destination};
pub use registry::{create_run_dir, log_file_name, rotation_dir_name, Registry};
