// SPDX-License-Identifier: MIT OR Apache-2.0
//! One-shot timers for navigation timeouts.
//!
//! Timers run callbacks on a shared scheduler rather than on a thread of
//! their own. A callback must not assume it runs before or after any given
//! render tick; the navigator guards its state with a lock and a generation
//! number instead.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

/// Work run when a timer fires
pub type TimerCallback = Box<dyn FnOnce() + Send + 'static>;

/// Identifies a scheduled timer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerHandle(u64);

/// Scheduler of one-shot callbacks at absolute deadlines
pub trait TimerService: Send + Sync {
    /// Run `callback` once `deadline` has passed
    fn schedule(&self, deadline: Instant, callback: TimerCallback) -> TimerHandle;

    /// Cancel a timer that has not fired yet; false if it already fired or is unknown
    fn cancel(&self, handle: TimerHandle) -> bool;

    /// Cancel `previous` (if any) and schedule anew
    fn reschedule(
        &self,
        previous: Option<TimerHandle>,
        deadline: Instant,
        callback: TimerCallback,
    ) -> TimerHandle {
        if let Some(previous) = previous {
            self.cancel(previous);
        }
        self.schedule(deadline, callback)
    }
}

/// Timers as tasks on a tokio runtime
pub struct TokioTimerService {
    runtime: Handle,
    next_id: AtomicU64,
    tasks: Mutex<HashMap<u64, JoinHandle<()>>>,
}

impl TokioTimerService {
    /// Schedule on the given runtime
    pub fn new(runtime: Handle) -> Self {
        Self {
            runtime,
            next_id: AtomicU64::new(0),
            tasks: Mutex::new(HashMap::new()),
        }
    }

    /// Schedule on the runtime of the calling context, if there is one
    pub fn from_current() -> Option<Self> {
        Handle::try_current().ok().map(Self::new)
    }

    /// Number of timers that have not finished yet
    pub fn pending_count(&self) -> usize {
        self.tasks.lock().values().filter(|task| !task.is_finished()).count()
    }
}

impl TimerService for TokioTimerService {
    fn schedule(&self, deadline: Instant, callback: TimerCallback) -> TimerHandle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let deadline = tokio::time::Instant::from_std(deadline);
        let task = self.runtime.spawn(async move {
            tokio::time::sleep_until(deadline).await;
            callback();
        });

        let mut tasks = self.tasks.lock();
        tasks.retain(|_, task| !task.is_finished());
        tasks.insert(id, task);
        TimerHandle(id)
    }

    fn cancel(&self, handle: TimerHandle) -> bool {
        match self.tasks.lock().remove(&handle.0) {
            Some(task) if !task.is_finished() => {
                task.abort();
                true
            }
            _ => false,
        }
    }
}

impl Drop for TokioTimerService {
    fn drop(&mut self) {
        for (_, task) in self.tasks.get_mut().drain() {
            task.abort();
        }
    }
}

impl fmt::Debug for TokioTimerService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokioTimerService")
            .field("tasks", &self.tasks.lock().len())
            .finish()
    }
}

/// Timers that fire only when driven explicitly
#[derive(Default)]
pub struct ManualTimerService {
    next_id: AtomicU64,
    pending: Mutex<Vec<(TimerHandle, Instant, TimerCallback)>>,
}

impl ManualTimerService {
    /// Create a service with no timers
    pub fn new() -> Self {
        Self::default()
    }

    /// Run every callback whose deadline is at or before `now`, earliest first.
    ///
    /// Callbacks run after the internal lock is released, so they may
    /// schedule or cancel timers themselves. Returns how many fired.
    pub fn fire_due(&self, now: Instant) -> usize {
        let mut due = {
            let mut pending = self.pending.lock();
            let (due, waiting): (Vec<_>, Vec<_>) =
                pending.drain(..).partition(|(_, deadline, _)| *deadline <= now);
            *pending = waiting;
            due
        };
        due.sort_by_key(|(_, deadline, _)| *deadline);

        let fired = due.len();
        for (_, _, callback) in due {
            callback();
        }
        fired
    }

    /// Number of timers waiting to fire
    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    /// Earliest pending deadline
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.lock().iter().map(|(_, deadline, _)| *deadline).min()
    }
}

impl TimerService for ManualTimerService {
    fn schedule(&self, deadline: Instant, callback: TimerCallback) -> TimerHandle {
        let handle = TimerHandle(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.pending.lock().push((handle, deadline, callback));
        handle
    }

    fn cancel(&self, handle: TimerHandle) -> bool {
        let mut pending = self.pending.lock();
        let before = pending.len();
        pending.retain(|(id, _, _)| *id != handle);
        pending.len() != before
    }
}

impl fmt::Debug for ManualTimerService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManualTimerService")
            .field("pending", &self.pending.lock().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;
    use std::time::Duration;

    fn counter() -> (Arc<AtomicUsize>, impl Fn() -> TimerCallback) {
        let count = Arc::new(AtomicUsize::new(0));
        let shared = Arc::clone(&count);
        let make = move || -> TimerCallback {
            let count = Arc::clone(&shared);
            Box::new(move || {
                count.fetch_add(1, Ordering::SeqCst);
            })
        };
        (count, make)
    }

    #[test]
    fn test_manual_fires_only_due_timers() {
        let timers = ManualTimerService::new();
        let (count, callback) = counter();
        let start = Instant::now();

        timers.schedule(start + Duration::from_secs(1), callback());
        timers.schedule(start + Duration::from_secs(5), callback());
        assert_eq!(timers.next_deadline(), Some(start + Duration::from_secs(1)));

        assert_eq!(timers.fire_due(start), 0);
        assert_eq!(timers.fire_due(start + Duration::from_secs(2)), 1);
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(timers.pending_count(), 1);
    }

    #[test]
    fn test_manual_cancel_and_reschedule() {
        let timers = ManualTimerService::new();
        let (count, callback) = counter();
        let start = Instant::now();

        let first = timers.schedule(start + Duration::from_secs(1), callback());
        let second = timers.reschedule(Some(first), start + Duration::from_secs(3), callback());
        assert!(!timers.cancel(first));

        assert_eq!(timers.fire_due(start + Duration::from_secs(2)), 0);
        assert_eq!(timers.fire_due(start + Duration::from_secs(3)), 1);
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(!timers.cancel(second));
    }

    #[test]
    fn test_manual_callback_may_schedule() {
        let timers = Arc::new(ManualTimerService::new());
        let start = Instant::now();
        let inner = Arc::clone(&timers);
        timers.schedule(
            start,
            Box::new(move || {
                inner.schedule(start + Duration::from_secs(1), Box::new(|| {}));
            }),
        );

        assert_eq!(timers.fire_due(start), 1);
        assert_eq!(timers.pending_count(), 1);
    }

    #[tokio::test]
    async fn test_tokio_timer_fires() {
        let timers = TokioTimerService::from_current().unwrap();
        let (count, callback) = counter();

        timers.schedule(Instant::now() + Duration::from_millis(10), callback());
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(timers.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_tokio_timer_cancel() {
        let timers = TokioTimerService::from_current().unwrap();
        let (count, callback) = counter();

        let handle = timers.schedule(Instant::now() + Duration::from_millis(50), callback());
        assert!(timers.cancel(handle));
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }
}
