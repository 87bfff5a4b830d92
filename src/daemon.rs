//! Generic single-consumer background worker
//!
//! Producers on any thread `enqueue` `(id, item)` pairs. One worker thread
//! runs ticks at a fixed interval; every tick calls `DaemonHooks::pre_cycle`
//! and then hands each queued item to `DaemonHooks::process`. After `stop`,
//! no more items are accepted, the tick loop ends and `DaemonHooks::epilogue`
//! runs exactly once with the remaining queue. `join` waits for that and
//! returns the epilogue's result.
//!
//! A daemon that never started can still be drained with `drain_inline`,
//! which runs the epilogue on the caller's thread.
//!
//! Lifecycle: `Unstarted -> Running -> Stopping -> Stopped`.

use crate::error::{LoggerError, Result};
use parking_lot::{Condvar, Mutex, RwLock};
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle, Thread};
use std::time::Duration;
use tracing::warn;

/// Callbacks run on the worker thread, never concurrently with each other
pub trait DaemonHooks<T>: Send + 'static {
    /// Start of every tick, before the queue is drained
    fn pre_cycle(&mut self) -> Result<()>;

    /// One dequeued item
    fn process(&mut self, id: usize, item: T) -> Result<()>;

    /// Once, after the last tick. Items still queued are reachable through `mailbox`.
    fn epilogue(&mut self, mailbox: &Mailbox<T>) -> Result<()>;
}

/// Worker-side view of the queue
pub struct Mailbox<T> {
    rx: Receiver<(usize, T)>,
    queued: Arc<AtomicUsize>,
}

impl<T> Mailbox<T> {
    /// Next queued item, if any, without blocking
    #[inline]
    pub fn try_dequeue(&self) -> Option<(usize, T)> {
        let item = self.rx.try_recv().ok()?;
        self.queued.fetch_sub(1, Ordering::AcqRel);
        Some(item)
    }

    /// Items queued right now; may include sends still in flight
    #[inline]
    pub fn queued(&self) -> usize {
        self.queued.load(Ordering::Acquire)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum DaemonState {
    Unstarted = 0,
    Running = 1,
    Stopping = 2,
    Stopped = 3,
}

impl DaemonState {
    const fn from_u8(value: u8) -> Self {
        match value {
            0 => DaemonState::Unstarted,
            1 => DaemonState::Running,
            2 => DaemonState::Stopping,
            _ => DaemonState::Stopped,
        }
    }
}

#[derive(Default)]
struct Outcome {
    finished: bool,
    result: Option<Result<()>>,
}

struct Shared {
    state: AtomicU8,
    outcome: Mutex<Outcome>,
    done: Condvar,
}

impl Shared {
    fn state(&self) -> DaemonState {
        DaemonState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn finish(&self, result: Result<()>) {
        let mut outcome = self.outcome.lock();
        outcome.finished = true;
        outcome.result = Some(result);
        self.state.store(DaemonState::Stopped as u8, Ordering::Release);
        self.done.notify_all();
    }
}

/// Reports `WorkerPanicked` if the worker unwinds before finishing
struct CompletionGuard<'a> {
    shared: &'a Shared,
    armed: bool,
}

impl CompletionGuard<'_> {
    fn complete(mut self, result: Result<()>) {
        self.armed = false;
        self.shared.finish(result);
    }
}

impl Drop for CompletionGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.shared.finish(Err(LoggerError::WorkerPanicked));
        }
    }
}

pub struct Daemon<T> {
    name: String,
    interval: Duration,
    sender: RwLock<Option<Sender<(usize, T)>>>,
    receiver: Mutex<Option<Receiver<(usize, T)>>>,
    queued: Arc<AtomicUsize>,
    worker: Mutex<Option<Thread>>,
    handle: Mutex<Option<JoinHandle<()>>>,
    detached: AtomicBool,
    shared: Arc<Shared>,
}

impl<T: Send + 'static> Daemon<T> {
    pub fn new(name: impl Into<String>, interval: Duration) -> Self {
        let (tx, rx) = channel();
        Self {
            name: name.into(),
            interval,
            sender: RwLock::new(Some(tx)),
            receiver: Mutex::new(Some(rx)),
            queued: Arc::new(AtomicUsize::new(0)),
            worker: Mutex::new(None),
            handle: Mutex::new(None),
            detached: AtomicBool::new(false),
            shared: Arc::new(Shared {
                state: AtomicU8::new(DaemonState::Unstarted as u8),
                outcome: Mutex::new(Outcome::default()),
                done: Condvar::new(),
            }),
        }
    }

    #[inline]
    pub fn state(&self) -> DaemonState {
        self.shared.state()
    }

    #[inline]
    pub fn is_detached(&self) -> bool {
        self.detached.load(Ordering::Acquire)
    }

    /// Queue an item from any thread.
    ///
    /// Items queued before `start` wait for the first tick. After `stop`
    /// the queue is closed and this returns `ShutdownInProgress`.
    pub fn enqueue(&self, id: usize, item: T) -> Result<()> {
        let sender = self.sender.read();
        let tx = sender.as_ref().ok_or(LoggerError::ShutdownInProgress)?;
        // Counted before the send so the worker never sees fewer than it dequeues
        self.queued.fetch_add(1, Ordering::AcqRel);
        tx.send((id, item)).map_err(|_| {
            self.queued.fetch_sub(1, Ordering::AcqRel);
            LoggerError::ShutdownInProgress
        })
    }

    fn mailbox(&self, rx: Receiver<(usize, T)>) -> Mailbox<T> {
        Mailbox {
            rx,
            queued: Arc::clone(&self.queued),
        }
    }

    /// Spawn the worker thread running `hooks`
    ///
    /// If the thread cannot be spawned, the queue is closed and the epilogue
    /// runs on the calling thread; its result is left for `join`.
    pub fn start<H: DaemonHooks<T>>(&self, hooks: H) -> Result<()> {
        let rx = self
            .receiver
            .lock()
            .take()
            .ok_or(LoggerError::AlreadyStarted)?;

        self.shared
            .state
            .store(DaemonState::Running as u8, Ordering::Release);

        // Shared with the thread so a failed spawn can take the hooks back
        let parcel = Arc::new(Mutex::new(Some((hooks, self.mailbox(rx)))));
        let theirs = Arc::clone(&parcel);
        let shared = Arc::clone(&self.shared);
        let interval = self.interval;
        let spawned = thread::Builder::new()
            .name(self.name.clone())
            .spawn(move || {
                let guard = CompletionGuard {
                    shared: &shared,
                    armed: true,
                };
                let Some((mut hooks, mailbox)) = theirs.lock().take() else {
                    guard.complete(Ok(()));
                    return;
                };
                run_ticks(&shared, &mut hooks, &mailbox, interval);
                let result = hooks.epilogue(&mailbox);
                guard.complete(result);
            });

        match spawned {
            Ok(handle) => {
                *self.worker.lock() = Some(handle.thread().clone());
                *self.handle.lock() = Some(handle);
                Ok(())
            }
            Err(source) => {
                self.sender.write().take();
                let result = match parcel.lock().take() {
                    Some((mut hooks, mailbox)) => hooks.epilogue(&mailbox),
                    None => Ok(()),
                };
                self.shared.finish(result);
                Err(LoggerError::Spawn { source })
            }
        }
    }

    /// Close the queue and run `hooks.epilogue` on the calling thread.
    ///
    /// For a daemon that was never started: items queued so far still reach
    /// the epilogue. Returns its result, like `join`.
    pub fn drain_inline<H: DaemonHooks<T>>(&self, mut hooks: H) -> Result<()> {
        let rx = self
            .receiver
            .lock()
            .take()
            .ok_or(LoggerError::AlreadyStarted)?;

        self.sender.write().take();
        self.shared
            .state
            .store(DaemonState::Stopping as u8, Ordering::Release);
        let result = hooks.epilogue(&self.mailbox(rx));
        self.shared.finish(result);
        self.join()
    }

    /// Close the queue and ask the worker to finish. Does not wait.
    pub fn stop(&self) -> Result<()> {
        match self.state() {
            DaemonState::Unstarted => return Err(LoggerError::NotStarted),
            DaemonState::Stopping | DaemonState::Stopped => return Ok(()),
            DaemonState::Running => {}
        }

        // Dropping the only sender closes the queue; taking the write lock
        // waits out any enqueue in flight.
        self.sender.write().take();
        let _ = self.shared.state.compare_exchange(
            DaemonState::Running as u8,
            DaemonState::Stopping as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
        if let Some(worker) = self.worker.lock().as_ref() {
            worker.unpark();
        }
        Ok(())
    }

    /// Let the worker run on its own; `join` still works afterwards
    pub fn detach(&self) -> Result<()> {
        if self.state() == DaemonState::Unstarted {
            return Err(LoggerError::NotStarted);
        }
        self.detached.store(true, Ordering::Release);
        drop(self.handle.lock().take());
        Ok(())
    }

    /// Stop (if needed) and block until the epilogue finished.
    ///
    /// The epilogue's error is returned to the first caller only.
    pub fn join(&self) -> Result<()> {
        self.stop()?;

        let result = {
            let mut outcome = self.shared.outcome.lock();
            while !outcome.finished {
                self.shared.done.wait(&mut outcome);
            }
            outcome.result.take()
        };

        let handle = self.handle.lock().take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                return Err(LoggerError::WorkerPanicked);
            }
        }

        result.unwrap_or(Ok(()))
    }
}

fn run_ticks<T, H: DaemonHooks<T>>(
    shared: &Shared,
    hooks: &mut H,
    mailbox: &Mailbox<T>,
    interval: Duration,
) {
    while shared.state() == DaemonState::Running {
        if let Err(e) = hooks.pre_cycle() {
            warn!("Worker tick failed: {}", e);
        }
        // Only what was queued when the tick began; later items wait a tick
        for _ in 0..mailbox.queued() {
            let Some((id, item)) = mailbox.try_dequeue() else {
                break;
            };
            if let Err(e) = hooks.process(id, item) {
                warn!("Worker failed to process item {}: {}", id, e);
            }
        }
        thread::park_timeout(interval);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    /// Hooks that record what the worker did
    #[derive(Clone, Default)]
    struct Recorder {
        ticks: Arc<AtomicUsize>,
        processed: Arc<Mutex<Vec<(usize, u32)>>>,
        drained: Arc<Mutex<Vec<u32>>>,
        epilogues: Arc<AtomicUsize>,
        fail_epilogue: bool,
    }

    impl DaemonHooks<u32> for Recorder {
        fn pre_cycle(&mut self) -> Result<()> {
            self.ticks.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn process(&mut self, id: usize, item: u32) -> Result<()> {
            self.processed.lock().push((id, item));
            Ok(())
        }

        fn epilogue(&mut self, mailbox: &Mailbox<u32>) -> Result<()> {
            while let Some((id, item)) = mailbox.try_dequeue() {
                self.drained.lock().push(item);
                self.process(id, item)?;
            }
            self.epilogues.fetch_add(1, Ordering::SeqCst);
            if self.fail_epilogue {
                return Err(LoggerError::Io {
                    path: "epilogue".into(),
                    source: std::io::Error::other("disk gone"),
                });
            }
            Ok(())
        }
    }

    #[test]
    fn test_lifecycle_states() {
        let daemon = Daemon::<u32>::new("test-daemon", Duration::from_millis(5));
        assert_eq!(daemon.state(), DaemonState::Unstarted);

        daemon.start(Recorder::default()).unwrap();
        assert_eq!(daemon.state(), DaemonState::Running);

        daemon.join().unwrap();
        assert_eq!(daemon.state(), DaemonState::Stopped);
    }

    #[test]
    fn test_items_processed_in_order_and_epilogue_runs_once() {
        let daemon = Daemon::<u32>::new("test-daemon", Duration::from_millis(5));
        let recorder = Recorder::default();
        daemon.start(recorder.clone()).unwrap();

        for i in 0..100 {
            daemon.enqueue(1, i).unwrap();
        }
        daemon.join().unwrap();

        let processed = recorder.processed.lock();
        let items: Vec<u32> = processed.iter().map(|(_, item)| *item).collect();
        assert_eq!(items, (0..100).collect::<Vec<_>>());
        assert!(processed.iter().all(|(id, _)| *id == 1));
        assert_eq!(recorder.epilogues.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_items_queued_before_start_are_processed() {
        let daemon = Daemon::<u32>::new("test-daemon", Duration::from_millis(5));
        daemon.enqueue(0, 7).unwrap();
        let recorder = Recorder::default();

        daemon.start(recorder.clone()).unwrap();
        daemon.join().unwrap();

        assert_eq!(*recorder.processed.lock(), vec![(0, 7)]);
    }

    #[test]
    fn test_ticks_run_while_idle() {
        let daemon = Daemon::<u32>::new("test-daemon", Duration::from_millis(1));
        let recorder = Recorder::default();
        daemon.start(recorder.clone()).unwrap();

        thread::sleep(Duration::from_millis(50));
        daemon.join().unwrap();

        assert!(recorder.ticks.load(Ordering::SeqCst) >= 2);
    }

    #[test]
    fn test_enqueue_after_stop_is_rejected() {
        let daemon = Daemon::<u32>::new("test-daemon", Duration::from_millis(5));
        daemon.start(Recorder::default()).unwrap();
        daemon.stop().unwrap();

        assert!(matches!(
            daemon.enqueue(0, 1),
            Err(LoggerError::ShutdownInProgress)
        ));
        daemon.join().unwrap();
    }

    #[test]
    fn test_double_start_fails() {
        let daemon = Daemon::<u32>::new("test-daemon", Duration::from_millis(5));
        daemon.start(Recorder::default()).unwrap();
        assert!(matches!(
            daemon.start(Recorder::default()),
            Err(LoggerError::AlreadyStarted)
        ));
        daemon.join().unwrap();
    }

    #[test]
    fn test_stop_and_join_require_start() {
        let daemon = Daemon::<u32>::new("test-daemon", Duration::from_millis(5));
        assert!(matches!(daemon.stop(), Err(LoggerError::NotStarted)));
        assert!(matches!(daemon.join(), Err(LoggerError::NotStarted)));
        assert!(matches!(daemon.detach(), Err(LoggerError::NotStarted)));
    }

    #[test]
    fn test_join_returns_epilogue_error() {
        let daemon = Daemon::<u32>::new("test-daemon", Duration::from_millis(5));
        let recorder = Recorder {
            fail_epilogue: true,
            ..Recorder::default()
        };
        daemon.start(recorder).unwrap();

        assert!(matches!(daemon.join(), Err(LoggerError::Io { .. })));
        // Reported once
        assert!(daemon.join().is_ok());
    }

    /// Hooks that queue a follow-up item for every item they process
    struct Relay {
        daemon: Arc<Daemon<u32>>,
        ticks: Arc<AtomicUsize>,
    }

    impl DaemonHooks<u32> for Relay {
        fn pre_cycle(&mut self) -> Result<()> {
            self.ticks.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn process(&mut self, id: usize, item: u32) -> Result<()> {
            let _ = self.daemon.enqueue(id, item + 1);
            Ok(())
        }

        fn epilogue(&mut self, mailbox: &Mailbox<u32>) -> Result<()> {
            while mailbox.try_dequeue().is_some() {}
            Ok(())
        }
    }

    #[test]
    fn test_busy_queue_does_not_starve_ticks() {
        let daemon = Arc::new(Daemon::<u32>::new("test-daemon", Duration::from_millis(1)));
        let ticks = Arc::new(AtomicUsize::new(0));
        daemon
            .start(Relay {
                daemon: Arc::clone(&daemon),
                ticks: Arc::clone(&ticks),
            })
            .unwrap();
        daemon.enqueue(0, 0).unwrap();

        thread::sleep(Duration::from_millis(100));
        daemon.join().unwrap();

        assert!(ticks.load(Ordering::SeqCst) >= 5);
    }

    #[test]
    fn test_queued_tracks_enqueue_and_dequeue() {
        let daemon = Daemon::<u32>::new("test-daemon", Duration::from_millis(5));
        daemon.enqueue(0, 1).unwrap();
        daemon.enqueue(0, 2).unwrap();

        let rx = daemon.receiver.lock().take().unwrap();
        let mailbox = daemon.mailbox(rx);
        assert_eq!(mailbox.queued(), 2);
        assert_eq!(mailbox.try_dequeue(), Some((0, 1)));
        assert_eq!(mailbox.queued(), 1);
    }

    #[test]
    fn test_drain_inline_hands_queue_to_epilogue() {
        let daemon = Daemon::<u32>::new("test-daemon", Duration::from_millis(5));
        daemon.enqueue(0, 4).unwrap();
        daemon.enqueue(1, 5).unwrap();
        let recorder = Recorder::default();

        daemon.drain_inline(recorder.clone()).unwrap();

        assert_eq!(*recorder.drained.lock(), vec![4, 5]);
        assert_eq!(recorder.epilogues.load(Ordering::SeqCst), 1);
        assert_eq!(recorder.ticks.load(Ordering::SeqCst), 0);
        assert_eq!(daemon.state(), DaemonState::Stopped);
        assert!(matches!(
            daemon.enqueue(0, 6),
            Err(LoggerError::ShutdownInProgress)
        ));
        assert!(matches!(
            daemon.start(Recorder::default()),
            Err(LoggerError::AlreadyStarted)
        ));
    }

    #[test]
    fn test_drain_inline_returns_epilogue_error() {
        let daemon = Daemon::<u32>::new("test-daemon", Duration::from_millis(5));
        let recorder = Recorder {
            fail_epilogue: true,
            ..Recorder::default()
        };

        assert!(matches!(
            daemon.drain_inline(recorder),
            Err(LoggerError::Io { .. })
        ));
        assert!(daemon.join().is_ok());
    }

    #[test]
    fn test_join_after_detach_waits_for_epilogue() {
        let daemon = Daemon::<u32>::new("test-daemon", Duration::from_millis(5));
        let recorder = Recorder::default();
        daemon.start(recorder.clone()).unwrap();
        daemon.detach().unwrap();
        assert!(daemon.is_detached());

        for i in 0..10 {
            daemon.enqueue(0, i).unwrap();
        }
        daemon.join().unwrap();

        assert_eq!(recorder.processed.lock().len(), 10);
        assert_eq!(recorder.epilogues.load(Ordering::SeqCst), 1);
        assert_eq!(daemon.state(), DaemonState::Stopped);
    }
}
