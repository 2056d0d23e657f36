//! Thread-safe FIFO task queue with blocking, timed, and non-blocking pops.
//!
//! The queue never reorders: priority is payload for consumers only. Pushes
//! always succeed and pops report absence with `None` instead of an error.
//! Shutdown is in-band (see `Task::terminate`); a consumer blocked in
//! `pop_blocking` with no sentinel on the way stays blocked forever, and that
//! liveness contract belongs to the caller.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::Duration;

use crate::types::Task;

/// Unbounded multi-producer/multi-consumer hand-off of task ownership.
pub struct TaskQueue {
    inner: Mutex<TaskQueueState>,
    available: Condvar,
}

struct TaskQueueState {
    queue: VecDeque<Task>,
    /// Consumers currently parked on `available`.
    waiting: usize,
}

impl TaskQueue {
    /// Create an empty task queue.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(TaskQueueState {
                queue: VecDeque::new(),
                waiting: 0,
            }),
            available: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, TaskQueueState> {
        self.inner.lock().expect("task queue mutex poisoned")
    }

    /// Append a task at the tail and wake at most one waiter.
    pub fn push(&self, task: Task) {
        let mut guard = self.lock();
        guard.queue.push_back(task);
        // Notify while holding the lock so a waiter cannot miss the item.
        self.available.notify_one();
    }

    /// Block until a task is available and take the head.
    pub fn pop_blocking(&self) -> Task {
        let mut guard = self.lock();
        loop {
            if let Some(task) = guard.queue.pop_front() {
                return task;
            }
            guard.waiting += 1;
            // Wait releases the lock and re-acquires it before returning.
            guard = self.available.wait(guard).expect("condvar wait failed");
            guard.waiting -= 1;
        }
    }

    /// Wait up to `timeout` for a task; `None` if nothing arrived in time.
    pub fn pop_timeout(&self, timeout: Duration) -> Option<Task> {
        let mut guard = self.lock();
        if let Some(task) = guard.queue.pop_front() {
            return Some(task);
        }
        guard.waiting += 1;
        // One deadline for the whole call; spurious wakeups do not extend it.
        let (mut guard, _) = self
            .available
            .wait_timeout_while(guard, timeout, |state| state.queue.is_empty())
            .expect("condvar wait failed");
        guard.waiting -= 1;
        guard.queue.pop_front()
    }

    /// Take the head immediately, never waiting.
    pub fn try_pop(&self) -> Option<Task> {
        self.lock().queue.pop_front()
    }

    /// Number of queued tasks; advisory once the lock is released.
    pub fn len(&self) -> usize {
        self.lock().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().queue.is_empty()
    }

    /// Number of consumers currently blocked in a pop.
    pub fn waiting(&self) -> usize {
        self.lock().waiting
    }
}

impl Default for TaskQueue {
    fn default() -> Self {
        Self::new()
    }
}
