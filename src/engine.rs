//! Dispatch engine
//!
//! `Logger` is the producer-facing side: it gates by level, renders the line
//! and queues it for the worker. `Dispatcher` is the worker-facing side: it
//! owns the destinations and implements the tick hooks.
//!
//! Producers never touch files. Destinations are only mutated on the worker
//! thread, and the registry is handed to that thread at `start`, so nothing
//! inside a destination needs locking.
//!
//! Writes after `stop` are rejected with `ShutdownInProgress`. Writes before
//! `start` are queued; joining or dropping a logger that never started drains
//! them on the caller's thread.

use crate::clock::{Clock, SystemClock};
use crate::config::Settings;
use crate::constants::WORKER_THREAD_NAME;
use crate::daemon::{Daemon, DaemonHooks, DaemonState, Mailbox};
use crate::destination::{create_run_dir, AppendOutcome, Registry};
use crate::error::{LoggerError, Result};
use crate::logging::{console, LogLevel, LogLine, LogRecord};
use crate::stats::{Stats, StatsSnapshot};
use parking_lot::Mutex;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

/// Handle of a registered log file
pub type Handle = usize;

/// Operational trace, only when `self_diagnostics` is on
macro_rules! self_log {
    ($settings:expr, $($arg:tt)*) => {
        if $settings.self_diagnostics {
            info!(target: "logger_daemon", $($arg)*);
        }
    };
}

// =============================================================================
// Worker side
// =============================================================================

/// Tick hooks run on the worker thread
pub struct Dispatcher {
    settings: Arc<Settings>,
    registry: Registry,
    stats: Arc<Stats>,
    /// Dropped bytes already added to `stats`
    reported_dropped: u64,
}

impl Dispatcher {
    pub fn new(settings: Arc<Settings>, registry: Registry, stats: Arc<Stats>) -> Self {
        Self {
            settings,
            registry,
            stats,
            reported_dropped: 0,
        }
    }

    fn track<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(LoggerError::Io { .. }) = &result {
            self.stats.add_flush_failure();
            let dropped = self.registry.dropped_bytes();
            if dropped > self.reported_dropped {
                self.stats.add_dropped_bytes(dropped - self.reported_dropped);
                self.reported_dropped = dropped;
            }
        }
        result
    }

    /// First destination that gave up bytes during this run
    fn data_loss(&self) -> Option<LoggerError> {
        self.registry
            .iter()
            .find(|dest| dest.dropped_bytes() > 0)
            .map(|dest| LoggerError::DataLoss {
                path: dest.path().to_path_buf(),
                bytes: dest.dropped_bytes(),
            })
    }
}

impl DaemonHooks<LogLine> for Dispatcher {
    fn pre_cycle(&mut self) -> Result<()> {
        if !self.settings.write_to_file {
            return Ok(());
        }
        let result = self.registry.note_idle_cycle_all();
        let flushed = self.track(result)?;
        self.stats.add_flushes(flushed as u64);
        Ok(())
    }

    fn process(&mut self, handle: Handle, line: LogLine) -> Result<()> {
        self.stats.add_processed();

        let written = if self.settings.write_to_file {
            let result = self
                .registry
                .get_mut(handle)
                .and_then(|dest| dest.append(line.as_bytes()));
            match self.track(result) {
                Ok(AppendOutcome::Flushed) => {
                    self.stats.add_flushes(1);
                    Ok(())
                }
                Ok(AppendOutcome::Buffered) => Ok(()),
                Err(e) => Err(e),
            }
        } else {
            Ok(())
        };

        if self.settings.echo_to_console {
            console::echo(handle, &line);
        }

        written
    }

    fn epilogue(&mut self, mailbox: &Mailbox<LogLine>) -> Result<()> {
        let mut first_err = None;
        let mut drained = 0usize;

        while let Some((handle, line)) = mailbox.try_dequeue() {
            drained += 1;
            if let Err(e) = self.process(handle, line) {
                first_err.get_or_insert(e);
            }
        }

        if self.settings.write_to_file {
            let result = self.registry.flush_all();
            match self.track(result) {
                Ok(()) => self.stats.add_flushes(self.registry.len() as u64),
                Err(e) => {
                    first_err.get_or_insert(e);
                }
            }
        }

        if let Some(loss) = self.data_loss() {
            first_err.get_or_insert(loss);
        }

        self_log!(
            self.settings,
            "Drained {} queued record(s), flushed {} file(s)",
            drained,
            self.registry.len()
        );

        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

// =============================================================================
// Producer side
// =============================================================================

/// Asynchronous multi-file logger.
///
/// Typical use:
///
/// ```no_run
/// use logger_daemon::{Logger, Settings};
///
/// let logger = Logger::new(Settings::default())?;
/// let app = logger.register("ProgramRun")?;
/// logger.start()?;
/// logger.info_to(app, "started")?;
/// logger.join()?;
/// # Ok::<(), logger_daemon::LoggerError>(())
/// ```
pub struct Logger {
    settings: Arc<Settings>,
    clock: Arc<dyn Clock>,
    run_dir: Option<PathBuf>,
    /// Registry until `start` hands it to the worker
    pending: Mutex<Option<Registry>>,
    registered: AtomicUsize,
    daemon: Daemon<LogLine>,
    stats: Arc<Stats>,
}

impl Logger {
    /// Create a logger using the local system clock
    pub fn new(settings: Settings) -> Result<Self> {
        Self::with_clock(settings, Arc::new(SystemClock))
    }

    /// Create a logger reading time from `clock`.
    ///
    /// Clears `log_root` if asked to, then creates this run's directory.
    pub fn with_clock(settings: Settings, clock: Arc<dyn Clock>) -> Result<Self> {
        settings.validate()?;

        self_log!(
            settings,
            "Settings: log_root={}; minimum_level={}; write_to_file={}; echo_to_console={}; clear_root_on_init={}",
            settings.log_root.display(),
            settings.minimum_level,
            settings.write_to_file,
            settings.echo_to_console,
            settings.clear_root_on_init
        );

        if settings.clear_root_on_init {
            self_log!(settings, "Removing folder: {}", settings.log_root.display());
            remove_root(&settings.log_root)?;
        }

        let run_dir = if settings.write_to_file {
            let dir = create_run_dir(&settings.log_root, clock.now().date())?;
            self_log!(settings, "Created folder: {}", dir.display());
            Some(dir)
        } else {
            None
        };

        let registry = Registry::new(
            run_dir.clone(),
            settings.buffer_capacity,
            settings.max_idle_cycles,
        );
        let daemon = Daemon::new(WORKER_THREAD_NAME, settings.tick_interval());

        Ok(Self {
            settings: Arc::new(settings),
            clock,
            run_dir,
            pending: Mutex::new(Some(registry)),
            registered: AtomicUsize::new(0),
            daemon,
            stats: Arc::new(Stats::new()),
        })
    }

    /// Settings this logger was built with (read-only)
    #[inline]
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// This run's directory, when file output is enabled
    #[inline]
    pub fn run_dir(&self) -> Option<&Path> {
        self.run_dir.as_deref()
    }

    #[inline]
    pub fn state(&self) -> DaemonState {
        self.daemon.state()
    }

    #[inline]
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Number of registered log files
    #[inline]
    pub fn registered(&self) -> usize {
        self.registered.load(Ordering::Acquire)
    }

    // === Lifecycle ===

    /// Add a log file named `<name>_<YYYY-MM-DD>.log` and return its handle.
    ///
    /// Only allowed before `start`.
    pub fn register(&self, name: &str) -> Result<Handle> {
        let mut pending = self.pending.lock();
        let registry = pending.as_mut().ok_or(LoggerError::RegistrationClosed)?;
        let handle = registry.register(name, self.clock.now().date())?;
        self.registered.store(registry.len(), Ordering::Release);

        if let Ok(dest) = registry.get(handle) {
            self_log!(self.settings, "File added: {}", dest.path().display());
        }
        Ok(handle)
    }

    /// Start the worker; registration closes
    pub fn start(&self) -> Result<()> {
        let registry = self
            .pending
            .lock()
            .take()
            .ok_or(LoggerError::AlreadyStarted)?;
        let files = registry.len();
        self.daemon.start(self.dispatcher(registry))?;
        self_log!(self.settings, "Started with {} file(s)", files);
        Ok(())
    }

    /// Stop accepting records and let the worker drain. Does not wait.
    pub fn stop(&self) -> Result<()> {
        self.daemon.stop()?;
        self_log!(self.settings, "Stop requested");
        Ok(())
    }

    /// Stop observing the worker; dropping a detached logger does not wait
    pub fn detach(&self) -> Result<()> {
        self.daemon.detach()
    }

    /// Stop and wait until every accepted record is on disk.
    ///
    /// On a logger that never started, records queued so far are written on
    /// the calling thread.
    pub fn join(&self) -> Result<()> {
        let pending = self.pending.lock().take();
        let result = match pending {
            Some(registry) => self.daemon.drain_inline(self.dispatcher(registry)),
            None => self.daemon.join(),
        };
        self_log!(self.settings, "Stopped");
        result
    }

    fn dispatcher(&self, registry: Registry) -> Dispatcher {
        Dispatcher::new(
            Arc::clone(&self.settings),
            registry,
            Arc::clone(&self.stats),
        )
    }

    // === Writes ===

    /// Queue `message` at `level` for the file `handle`.
    ///
    /// Below the minimum level this is a silent no-op.
    pub fn write(
        &self,
        handle: Handle,
        level: LogLevel,
        message: impl fmt::Display,
    ) -> Result<()> {
        if !level.passes(self.settings.minimum_level) {
            self.stats.add_gated();
            return Ok(());
        }

        let registered = self.registered();
        if handle >= registered {
            return Err(LoggerError::InvalidHandle { handle, registered });
        }

        let line = LogRecord::new(level, message.to_string()).render(self.clock.now());
        match self.daemon.enqueue(handle, line) {
            Ok(()) => {
                self.stats.add_enqueued();
                Ok(())
            }
            Err(e) => {
                self.stats.add_rejected();
                Err(e)
            }
        }
    }

    /// Write to the first registered file
    #[inline]
    pub fn log(&self, level: LogLevel, message: impl fmt::Display) -> Result<()> {
        self.write(0, level, message)
    }

    pub fn trace(&self, message: impl fmt::Display) -> Result<()> {
        self.write(0, LogLevel::Trace, message)
    }

    pub fn trace_to(&self, handle: Handle, message: impl fmt::Display) -> Result<()> {
        self.write(handle, LogLevel::Trace, message)
    }

    pub fn debug(&self, message: impl fmt::Display) -> Result<()> {
        self.write(0, LogLevel::Debug, message)
    }

    pub fn debug_to(&self, handle: Handle, message: impl fmt::Display) -> Result<()> {
        self.write(handle, LogLevel::Debug, message)
    }

    pub fn info(&self, message: impl fmt::Display) -> Result<()> {
        self.write(0, LogLevel::Info, message)
    }

    pub fn info_to(&self, handle: Handle, message: impl fmt::Display) -> Result<()> {
        self.write(handle, LogLevel::Info, message)
    }

    pub fn important(&self, message: impl fmt::Display) -> Result<()> {
        self.write(0, LogLevel::Important, message)
    }

    pub fn important_to(&self, handle: Handle, message: impl fmt::Display) -> Result<()> {
        self.write(handle, LogLevel::Important, message)
    }

    pub fn warning(&self, message: impl fmt::Display) -> Result<()> {
        self.write(0, LogLevel::Warning, message)
    }

    pub fn warning_to(&self, handle: Handle, message: impl fmt::Display) -> Result<()> {
        self.write(handle, LogLevel::Warning, message)
    }

    pub fn error(&self, message: impl fmt::Display) -> Result<()> {
        self.write(0, LogLevel::Error, message)
    }

    pub fn error_to(&self, handle: Handle, message: impl fmt::Display) -> Result<()> {
        self.write(handle, LogLevel::Error, message)
    }

    pub fn critical(&self, message: impl fmt::Display) -> Result<()> {
        self.write(0, LogLevel::Critical, message)
    }

    pub fn critical_to(&self, handle: Handle, message: impl fmt::Display) -> Result<()> {
        self.write(handle, LogLevel::Critical, message)
    }

    pub fn fatal(&self, message: impl fmt::Display) -> Result<()> {
        self.write(0, LogLevel::Fatal, message)
    }

    pub fn fatal_to(&self, handle: Handle, message: impl fmt::Display) -> Result<()> {
        self.write(handle, LogLevel::Fatal, message)
    }
}

impl Drop for Logger {
    fn drop(&mut self) {
        let result = match self.state() {
            DaemonState::Stopped => return,
            DaemonState::Running | DaemonState::Stopping if self.daemon.is_detached() => {
                let _ = self.daemon.stop();
                return;
            }
            _ => self.join(),
        };
        if let Err(e) = result {
            warn!("Logger shutdown failed: {}", e);
        }
    }
}

fn remove_root(root: &Path) -> Result<()> {
    match fs::remove_dir_all(root) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(LoggerError::Io {
            path: root.to_path_buf(),
            source: e,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use chrono::{NaiveDate, NaiveDateTime};

    fn unique_temp_dir(tag: &str) -> PathBuf {
        let base = std::env::temp_dir();
        let pid = std::process::id();
        let ts = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        base.join(format!("logger-daemon-engine-{}-{}-{}", tag, pid, ts))
    }

    fn noon() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2022, 3, 14)
            .and_then(|d| d.and_hms_milli_opt(12, 0, 0, 250))
            .unwrap()
    }

    fn settings(root: &Path) -> Settings {
        Settings {
            log_root: root.to_path_buf(),
            minimum_level: LogLevel::Trace,
            tick_interval_ms: 2,
            ..Settings::default()
        }
    }

    fn logger(settings: Settings) -> Logger {
        Logger::with_clock(settings, Arc::new(FixedClock(noon()))).unwrap()
    }

    #[test]
    fn test_new_creates_run_dir() {
        let root = unique_temp_dir("rundir");
        let logger = logger(settings(&root));

        assert_eq!(logger.run_dir(), Some(root.join("Logs_2022-03-14").as_path()));
        assert!(root.join("Logs_2022-03-14").is_dir());
        assert_eq!(logger.state(), DaemonState::Unstarted);

        drop(logger);
        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn test_clear_root_on_init_removes_previous_runs() {
        let root = unique_temp_dir("clear");
        fs::create_dir_all(root.join("Logs_2022-03-14")).unwrap();
        fs::write(root.join("old.txt"), "x").unwrap();

        let logger = logger(Settings {
            clear_root_on_init: true,
            ..settings(&root)
        });

        assert!(!root.join("old.txt").exists());
        assert_eq!(logger.run_dir(), Some(root.join("Logs_2022-03-14").as_path()));

        drop(logger);
        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn test_register_after_start_is_refused() {
        let root = unique_temp_dir("closed");
        let logger = logger(settings(&root));
        logger.register("app").unwrap();
        logger.start().unwrap();

        assert!(matches!(
            logger.register("late"),
            Err(LoggerError::RegistrationClosed)
        ));
        assert!(matches!(logger.start(), Err(LoggerError::AlreadyStarted)));

        logger.join().unwrap();
        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn test_gated_write_is_not_queued() {
        let root = unique_temp_dir("gated");
        let logger = logger(Settings {
            minimum_level: LogLevel::Warning,
            ..settings(&root)
        });
        let app = logger.register("app").unwrap();

        logger.info_to(app, "quiet").unwrap();
        logger.debug_to(app, "quieter").unwrap();
        logger.error_to(app, "loud").unwrap();

        let stats = logger.stats();
        assert_eq!(stats.gated, 2);
        assert_eq!(stats.enqueued, 1);

        logger.start().unwrap();
        logger.join().unwrap();

        let text = fs::read_to_string(root.join("Logs_2022-03-14/app_2022-03-14.log")).unwrap();
        assert_eq!(text, "2022-03-14 12:00:00.0250 [ERROR]     :: loud\n");

        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn test_gating_skips_handle_check() {
        let root = unique_temp_dir("gatedhandle");
        let logger = logger(Settings {
            minimum_level: LogLevel::None,
            ..settings(&root)
        });

        // Nothing registered, but nothing would be written either
        logger.fatal_to(9, "dropped").unwrap();
        assert_eq!(logger.stats().gated, 1);

        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn test_invalid_handle_surfaces_to_caller() {
        let root = unique_temp_dir("invalid");
        let logger = logger(settings(&root));
        logger.register("app").unwrap();

        match logger.info_to(1, "nowhere") {
            Err(LoggerError::InvalidHandle { handle, registered }) => {
                assert_eq!(handle, 1);
                assert_eq!(registered, 1);
            }
            other => panic!("Expected InvalidHandle, got {:?}", other),
        }
        assert_eq!(logger.stats().enqueued, 0);

        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn test_write_after_stop_is_rejected() {
        let root = unique_temp_dir("rejected");
        let logger = logger(settings(&root));
        logger.register("app").unwrap();
        logger.start().unwrap();
        logger.stop().unwrap();

        assert!(matches!(
            logger.info("too late"),
            Err(LoggerError::ShutdownInProgress)
        ));
        assert_eq!(logger.stats().rejected, 1);

        logger.join().unwrap();
        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn test_records_before_start_reach_disk() {
        let root = unique_temp_dir("early");
        let logger = logger(settings(&root));
        logger.register("app").unwrap();

        logger.important("queued early").unwrap();
        logger.start().unwrap();
        logger.join().unwrap();

        let text = fs::read_to_string(root.join("Logs_2022-03-14/app_2022-03-14.log")).unwrap();
        assert!(text.ends_with("[IMPORTANT] :: queued early\n"));
        assert_eq!(logger.stats().processed, 1);

        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn test_file_output_disabled_writes_nothing() {
        let root = unique_temp_dir("nofile");
        let logger = logger(Settings {
            write_to_file: false,
            ..settings(&root)
        });
        let app = logger.register("app").unwrap();
        logger.start().unwrap();
        logger.info_to(app, "memory only").unwrap();
        logger.join().unwrap();

        assert!(logger.run_dir().is_none());
        assert!(!root.exists());
        assert_eq!(logger.stats().processed, 1);
    }

    #[test]
    fn test_drop_without_start_writes_queued_records() {
        let root = unique_temp_dir("nostart-drop");
        let path = root.join("Logs_2022-03-14/app_2022-03-14.log");
        {
            let logger = logger(settings(&root));
            logger.register("app").unwrap();
            logger.info("accepted before start").unwrap();
            assert_eq!(logger.stats().enqueued, 1);
        }

        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(
            text,
            "2022-03-14 12:00:00.0250 [INFO]      :: accepted before start\n"
        );

        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn test_join_without_start_writes_queued_records() {
        let root = unique_temp_dir("nostart-join");
        let logger = logger(settings(&root));
        logger.register("app").unwrap();
        logger.warning("never started").unwrap();

        logger.join().unwrap();

        let text = fs::read_to_string(root.join("Logs_2022-03-14/app_2022-03-14.log")).unwrap();
        assert!(text.ends_with("[WARNING]   :: never started\n"));
        assert_eq!(logger.state(), DaemonState::Stopped);
        assert_eq!(logger.stats().processed, 1);
        assert!(matches!(
            logger.info("after join"),
            Err(LoggerError::ShutdownInProgress)
        ));
        assert!(matches!(logger.start(), Err(LoggerError::AlreadyStarted)));

        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn test_join_reports_bytes_lost_past_ceiling() {
        let root = unique_temp_dir("loss");
        let dir = root.join("Logs_2022-03-14");
        let logger = logger(Settings {
            buffer_capacity: 64,
            ..settings(&root)
        });
        logger.register("app").unwrap();
        fs::remove_dir_all(&dir).unwrap();
        logger.start().unwrap();

        let big = "x".repeat(crate::constants::MAX_RETAINED_BYTES);
        logger.info("kept").unwrap();
        logger.info(&big).unwrap();

        let deadline = std::time::Instant::now() + std::time::Duration::from_secs(2);
        while logger.stats().dropped_bytes == 0 && std::time::Instant::now() < deadline {
            std::thread::sleep(std::time::Duration::from_millis(2));
        }
        assert!(logger.stats().dropped_bytes > 0);
        fs::create_dir_all(&dir).unwrap();

        match logger.join() {
            Err(LoggerError::DataLoss { path, bytes }) => {
                assert_eq!(path, dir.join("app_2022-03-14.log"));
                assert!(bytes > crate::constants::MAX_RETAINED_BYTES as u64);
            }
            other => panic!("Expected DataLoss, got {:?}", other),
        }
        assert!(logger.stats().flush_failures >= 1);

        let text = fs::read_to_string(dir.join("app_2022-03-14.log")).unwrap();
        assert!(text.ends_with(":: kept\n"));

        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn test_drop_joins_running_logger() {
        let root = unique_temp_dir("drop");
        let path = root.join("Logs_2022-03-14/app_2022-03-14.log");
        {
            let logger = logger(settings(&root));
            logger.register("app").unwrap();
            logger.start().unwrap();
            logger.info("flushed by drop").unwrap();
        }

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.ends_with(":: flushed by drop\n"));

        let _ = fs::remove_dir_all(&root);
    }
}
