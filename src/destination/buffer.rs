//! Per-file write buffer
//!
//! Lines accumulate in memory and reach the disk in one append when:
//! - the next line would not fit (`append`)
//! - the destination went too many ticks without a flush (`note_idle_cycle`)
//! - someone asks for it (`flush`, used at shutdown)
//!
//! A failed flush keeps everything in memory so the next trigger retries it.

use crate::constants::{BUFFER_RESERVE, MAX_RETAINED_BYTES};
use crate::error::{LoggerError, Result};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

/// What `append` did with the bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    /// Kept in memory
    Buffered,
    /// Written to disk together with the previously buffered bytes
    Flushed,
}

/// One log file and its in-memory buffer
#[derive(Debug)]
pub struct Destination {
    handle: usize,
    path: PathBuf,
    buffer: Vec<u8>,
    capacity: usize,
    max_idle_cycles: u32,
    idle_cycles: u32,
    /// Bytes discarded because flushes kept failing past `MAX_RETAINED_BYTES`
    dropped_bytes: u64,
}

impl Destination {
    pub fn new(handle: usize, path: PathBuf, capacity: usize, max_idle_cycles: u32) -> Self {
        Self {
            handle,
            path,
            buffer: Vec::with_capacity(capacity),
            capacity,
            max_idle_cycles,
            idle_cycles: 0,
            dropped_bytes: 0,
        }
    }

    #[inline]
    pub fn handle(&self) -> usize {
        self.handle
    }

    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Bytes currently held in memory
    #[inline]
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Ticks since the last flush
    #[inline]
    pub fn idle_cycles(&self) -> u32 {
        self.idle_cycles
    }

    #[inline]
    pub fn dropped_bytes(&self) -> u64 {
        self.dropped_bytes
    }

    /// Buffer `bytes`, or flush with `bytes` as the tail if they would not fit
    pub fn append(&mut self, bytes: &[u8]) -> Result<AppendOutcome> {
        let limit = self.capacity.saturating_sub(BUFFER_RESERVE);
        if self.buffer.len() + bytes.len() < limit {
            self.buffer.extend_from_slice(bytes);
            return Ok(AppendOutcome::Buffered);
        }

        self.flush(Some(bytes))?;
        Ok(AppendOutcome::Flushed)
    }

    /// Append the buffer, then `extra`, to the file and clear the buffer.
    ///
    /// An empty flush still opens the file; it is how idle destinations reset
    /// their counter.
    pub fn flush(&mut self, extra: Option<&[u8]>) -> Result<()> {
        let kept = self.buffer.len();
        if let Some(extra) = extra {
            self.buffer.extend_from_slice(extra);
        }

        match self.write_out() {
            Ok(()) => {
                self.buffer.clear();
                self.idle_cycles = 0;
                Ok(())
            }
            Err(source) => {
                if self.buffer.len() > MAX_RETAINED_BYTES {
                    self.dropped_bytes += (self.buffer.len() - kept) as u64;
                    self.buffer.truncate(kept);
                }
                Err(LoggerError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        }
    }

    /// Count one tick; flush once `max_idle_cycles` ticks passed without one.
    ///
    /// Returns whether a flush happened.
    pub fn note_idle_cycle(&mut self) -> Result<bool> {
        self.idle_cycles = self.idle_cycles.saturating_add(1);
        if self.idle_cycles < self.max_idle_cycles {
            return Ok(false);
        }
        self.flush(None)?;
        Ok(true)
    }

    fn write_out(&self) -> std::io::Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        if !self.buffer.is_empty() {
            file.write_all(&self.buffer)?;
        }
        Ok(())
    }
}
