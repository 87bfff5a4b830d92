//! Destination registry and run directory layout
//!
//! Layout on disk:
//!
//! ```text
//! <log_root>/Logs_<YYYY-MM-DD>[_<N>]/<name>_<YYYY-MM-DD>.log
//! ```
//!
//! `N` starts at the number of entries in `log_root` already starting with
//! `Logs_<YYYY-MM-DD>` and moves past any name still taken, so every run of
//! the same day gets its own directory even after earlier ones were deleted.

use super::Destination;
use crate::constants::ROTATION_DIR_PREFIX;
use crate::error::{LoggerError, Result};
use chrono::NaiveDate;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

/// Name of the run directory for `date`, given what `root` already contains
pub fn rotation_dir_name(root: &Path, date: NaiveDate) -> io::Result<String> {
    let base = format!("{}{}", ROTATION_DIR_PREFIX, date.format("%Y-%m-%d"));

    let mut count = 0usize;
    if root.exists() {
        for entry in fs::read_dir(root)? {
            let entry = entry?;
            if entry.file_name().to_string_lossy().starts_with(&base) {
                count += 1;
            }
        }
    }

    let mut suffix = count;
    loop {
        let name = if suffix > 0 {
            format!("{}_{}", base, suffix)
        } else {
            base.clone()
        };
        if !root.join(&name).exists() {
            return Ok(name);
        }
        suffix += 1;
    }
}

/// Create this run's directory under `root` and return its path
pub fn create_run_dir(root: &Path, date: NaiveDate) -> Result<PathBuf> {
    let name = rotation_dir_name(root, date).map_err(|e| LoggerError::Io {
        path: root.to_path_buf(),
        source: e,
    })?;
    let dir = root.join(name);
    fs::create_dir_all(&dir).map_err(|e| LoggerError::Io {
        path: dir.clone(),
        source: e,
    })?;
    Ok(dir)
}

/// `<name>_<YYYY-MM-DD>.log`
pub fn log_file_name(name: &str, date: NaiveDate) -> String {
    format!("{}_{}.log", name, date.format("%Y-%m-%d"))
}

/// Ordered set of destinations addressed by their registration index
#[derive(Debug)]
pub struct Registry {
    /// `None` when file output is disabled: handles are still issued, no file is touched
    run_dir: Option<PathBuf>,
    destinations: Vec<Destination>,
    buffer_capacity: usize,
    max_idle_cycles: u32,
}

impl Registry {
    pub fn new(run_dir: Option<PathBuf>, buffer_capacity: usize, max_idle_cycles: u32) -> Self {
        Self {
            run_dir,
            destinations: Vec::new(),
            buffer_capacity,
            max_idle_cycles,
        }
    }

    #[inline]
    pub fn run_dir(&self) -> Option<&Path> {
        self.run_dir.as_deref()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.destinations.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.destinations.is_empty()
    }

    /// Add a destination and return its handle.
    ///
    /// The file is created empty, replacing a same-named file from earlier in this run.
    pub fn register(&mut self, name: &str, date: NaiveDate) -> Result<usize> {
        let file_name = log_file_name(name, date);
        let path = match &self.run_dir {
            Some(dir) => {
                let path = dir.join(&file_name);
                File::create(&path).map_err(|e| LoggerError::Io {
                    path: path.clone(),
                    source: e,
                })?;
                path
            }
            None => PathBuf::from(file_name),
        };

        let handle = self.destinations.len();
        self.destinations.push(Destination::new(
            handle,
            path,
            self.buffer_capacity,
            self.max_idle_cycles,
        ));
        Ok(handle)
    }

    pub fn get(&self, handle: usize) -> Result<&Destination> {
        let registered = self.destinations.len();
        self.destinations
            .get(handle)
            .ok_or(LoggerError::InvalidHandle { handle, registered })
    }

    pub fn get_mut(&mut self, handle: usize) -> Result<&mut Destination> {
        let registered = self.destinations.len();
        self.destinations
            .get_mut(handle)
            .ok_or(LoggerError::InvalidHandle { handle, registered })
    }

    pub fn iter(&self) -> impl Iterator<Item = &Destination> {
        self.destinations.iter()
    }

    /// Total bytes given up across all destinations
    pub fn dropped_bytes(&self) -> u64 {
        self.destinations.iter().map(Destination::dropped_bytes).sum()
    }

    /// Count one tick on every destination.
    ///
    /// Every destination is visited even if one fails; the first error is returned.
    pub fn note_idle_cycle_all(&mut self) -> Result<usize> {
        let mut flushed = 0;
        let mut first_err = None;
        for dest in &mut self.destinations {
            match dest.note_idle_cycle() {
                Ok(true) => flushed += 1,
                Ok(false) => {}
                Err(e) => {
                    first_err.get_or_insert(e);
                }
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(flushed),
        }
    }

    /// Flush every destination; the first error is returned after trying all
    pub fn flush_all(&mut self) -> Result<()> {
        let mut first_err = None;
        for dest in &mut self.destinations {
            if let Err(e) = dest.flush(None) {
                first_err.get_or_insert(e);
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
