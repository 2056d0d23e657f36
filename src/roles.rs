//! Producer, consumer, and timeout-consumer roles driving a shared queue.
//!
//! Each role runs on its own OS thread. Shutdown is signalled in-band with
//! sentinel tasks: a caller running N blocking consumers must push exactly N
//! sentinels in total, otherwise the excess consumers block forever.

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, info};

use crate::error::{DemoError, Result};
use crate::task_queue::TaskQueue;
use crate::types::{Task, TaskId};

/// Rotating labels given to produced tasks.
pub const TASK_DESCRIPTIONS: [&str; 10] = [
    "Process user registration",
    "Send welcome email",
    "Update database records",
    "Generate monthly report",
    "Backup system files",
    "Validate user input",
    "Calculate statistics",
    "Clean temporary files",
    "Synchronize data",
    "Optimize database queries",
];

/// Why a consumer loop ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExitReason {
    /// Popped a sentinel task.
    Sentinel,
    /// Hit the consecutive-timeout threshold.
    TimeoutLimit,
    /// Observed the external stop flag.
    Stopped,
}

/// What a consumer did before it terminated.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConsumerReport {
    /// Non-sentinel tasks processed.
    pub processed: usize,
    /// Ids of processed tasks, in processing order.
    pub processed_ids: Vec<TaskId>,
    /// Total timed-out waits (always 0 for blocking consumers).
    pub timeouts: u32,
    pub exit: ExitReason,
}

impl ConsumerReport {
    fn new(processed_ids: Vec<TaskId>, timeouts: u32, exit: ExitReason) -> Self {
        Self {
            processed: processed_ids.len(),
            processed_ids,
            timeouts,
            exit,
        }
    }
}

fn pause(duration: Duration) {
    if !duration.is_zero() {
        thread::sleep(duration);
    }
}

/// Emits a fixed number of tasks at a fixed pace, then one sentinel.
pub struct Producer {
    tasks: usize,
    pace: Duration,
}

impl Producer {
    pub fn new(tasks: usize, pace: Duration) -> Self {
        Self { tasks, pace }
    }

    /// Task emitted at position `index`: ids start at 1, priority cycles 1..=3.
    pub fn task_at(index: usize) -> Task {
        let description = TASK_DESCRIPTIONS[index % TASK_DESCRIPTIONS.len()];
        let priority = (index % 3) as u8 + 1;
        Task::new(index as TaskId + 1, description, priority)
    }

    pub fn run(&self, queue: &TaskQueue) {
        info!(tasks = self.tasks, "producer starting");
        for index in 0..self.tasks {
            let task = Self::task_at(index);
            info!("producer creating {task}");
            // Ownership moves into the queue here.
            queue.push(task);
            pause(self.pace);
        }
        queue.push(Task::terminate());
        info!("producer finished");
    }
}

/// Blocking consumer that runs until it pops a sentinel.
pub struct Consumer {
    unit: Duration,
}

impl Consumer {
    /// `unit` scales the simulated processing time of `Task::work_units`.
    pub fn new(unit: Duration) -> Self {
        Self { unit }
    }

    pub fn run(&self, queue: &TaskQueue) -> ConsumerReport {
        info!("consumer starting");
        let mut processed_ids = Vec::new();
        loop {
            let mut task = queue.pop_blocking();
            if task.is_sentinel() {
                info!("consumer received termination signal");
                break;
            }
            info!("consumer processing {task}");
            pause(self.unit * task.work_units());
            task.complete();
            info!("consumer completed {task}");
            processed_ids.push(task.id);
        }
        info!(processed = processed_ids.len(), "consumer finished");
        ConsumerReport::new(processed_ids, 0, ExitReason::Sentinel)
    }
}

/// Consumer that waits with a bound and gives up after repeated timeouts.
pub struct TimeoutConsumer {
    wait: Duration,
    max_timeouts: u32,
    work: Duration,
}

impl TimeoutConsumer {
    /// `work` is the fixed simulated processing time per task.
    pub fn new(wait: Duration, max_timeouts: u32, work: Duration) -> Self {
        Self {
            wait,
            max_timeouts,
            work,
        }
    }

    /// Run until a sentinel, the timeout threshold, or `stop` is observed.
    ///
    /// `stop` is only checked between iterations; an in-flight wait or task
    /// finishes first.
    pub fn run(&self, queue: &TaskQueue, stop: &AtomicBool) -> ConsumerReport {
        info!(wait_ms = self.wait.as_millis() as u64, "timeout consumer starting");
        let mut processed_ids = Vec::new();
        let mut consecutive = 0u32;
        let mut timeouts = 0u32;

        let exit = loop {
            if stop.load(Ordering::SeqCst) {
                debug!("timeout consumer observed stop flag");
                break ExitReason::Stopped;
            }
            let Some(mut task) = queue.pop_timeout(self.wait) else {
                consecutive += 1;
                timeouts += 1;
                info!("timeout consumer timeout #{consecutive} - no tasks available");
                if consecutive >= self.max_timeouts {
                    info!("timeout consumer saw too many timeouts, stopping");
                    break ExitReason::TimeoutLimit;
                }
                continue;
            };
            consecutive = 0;
            if task.is_sentinel() {
                info!("timeout consumer received termination signal");
                break ExitReason::Sentinel;
            }
            info!("timeout consumer processing {task}");
            pause(self.work);
            task.complete();
            processed_ids.push(task.id);
        };

        info!(processed = processed_ids.len(), ?exit, "timeout consumer finished");
        ConsumerReport::new(processed_ids, timeouts, exit)
    }
}

/// Spawn a role on a named OS thread.
pub fn spawn_role<T, F>(name: &str, role: F) -> Result<JoinHandle<T>>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    thread::Builder::new()
        .name(name.to_string())
        .spawn(role)
        .map_err(|source| DemoError::Spawn {
            role: name.to_string(),
            source,
        })
}

/// Join a role thread, turning a panic into `DemoError::RolePanicked`.
pub fn join_role<T>(handle: JoinHandle<T>) -> Result<T> {
    let name = handle.thread().name().unwrap_or("unnamed").to_string();
    handle.join().map_err(|_| DemoError::RolePanicked(name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::time::Instant;

    #[test]
    fn producer_cycles_priority_and_descriptions() {
        let first = Producer::task_at(0);
        assert_eq!(first.id, 1);
        assert_eq!(first.priority, 1);
        assert_eq!(first.description, TASK_DESCRIPTIONS[0]);

        assert_eq!(Producer::task_at(2).priority, 3);
        assert_eq!(Producer::task_at(3).priority, 1);
        assert_eq!(Producer::task_at(10).description, TASK_DESCRIPTIONS[0]);
    }

    #[test]
    fn producer_ends_with_single_sentinel() {
        let queue = TaskQueue::new();
        Producer::new(4, Duration::ZERO).run(&queue);
        assert_eq!(queue.len(), 5);

        let tasks: Vec<Task> = std::iter::from_fn(|| queue.try_pop()).collect();
        let ids: Vec<TaskId> = tasks.iter().map(|task| task.id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4, -1]);
        assert_eq!(tasks.iter().filter(|task| task.is_sentinel()).count(), 1);
        assert!(tasks.iter().all(|task| !task.completed));
    }

    #[test]
    fn consumer_processes_until_sentinel() {
        let queue = Arc::new(TaskQueue::new());
        let producer_queue = Arc::clone(&queue);
        let producer = spawn_role("producer", move || {
            Producer::new(5, Duration::from_millis(1)).run(&producer_queue)
        })
        .expect("spawn producer");

        let consumer_queue = Arc::clone(&queue);
        let consumer = spawn_role("consumer", move || {
            Consumer::new(Duration::from_millis(1)).run(&consumer_queue)
        })
        .expect("spawn consumer");

        join_role(producer).expect("producer panicked");
        let report = join_role(consumer).expect("consumer panicked");
        assert_eq!(report.processed, 5);
        assert_eq!(report.processed_ids, vec![1, 2, 3, 4, 5]);
        assert_eq!(report.exit, ExitReason::Sentinel);
        assert!(queue.is_empty());
    }

    #[test]
    fn competing_consumers_neither_lose_nor_duplicate() {
        let queue = Arc::new(TaskQueue::new());
        let consumers = 3;
        let tasks = 40;

        let mut handles = Vec::new();
        for index in 0..consumers {
            let queue = Arc::clone(&queue);
            handles.push(
                spawn_role(&format!("consumer-{index}"), move || {
                    Consumer::new(Duration::ZERO).run(&queue)
                })
                .expect("spawn consumer"),
            );
        }

        Producer::new(tasks, Duration::ZERO).run(&queue);
        // The producer sent one sentinel; top up to one per consumer.
        for _ in 1..consumers {
            queue.push(Task::terminate());
        }

        let mut seen = HashSet::new();
        let mut processed = 0;
        for handle in handles {
            let report = join_role(handle).expect("consumer panicked");
            processed += report.processed;
            for id in report.processed_ids {
                assert!(seen.insert(id), "task {id} delivered twice");
            }
        }
        assert_eq!(processed, tasks);
        assert!(queue.is_empty());
    }

    #[test]
    fn timeout_consumer_gives_up_after_threshold() {
        let queue = TaskQueue::new();
        let stop = AtomicBool::new(false);
        let wait = Duration::from_millis(20);

        let start = Instant::now();
        let report = TimeoutConsumer::new(wait, 3, Duration::ZERO).run(&queue, &stop);
        assert_eq!(report.exit, ExitReason::TimeoutLimit);
        assert_eq!(report.processed, 0);
        assert_eq!(report.timeouts, 3);
        assert!(start.elapsed() >= wait * 3);
    }

    #[test]
    fn timeout_consumer_honours_stop_flag_between_iterations() {
        let queue = TaskQueue::new();
        queue.push(Task::new(201, "Timeout test task 1", 2));
        let stop = AtomicBool::new(true);

        let report =
            TimeoutConsumer::new(Duration::from_secs(5), 3, Duration::ZERO).run(&queue, &stop);
        assert_eq!(report.exit, ExitReason::Stopped);
        assert_eq!(report.processed, 0);
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn timeout_consumer_stops_on_sentinel() {
        let queue = TaskQueue::new();
        queue.push(Task::new(201, "Timeout test task 1", 2));
        queue.push(Task::new(202, "Timeout test task 2", 1));
        queue.push(Task::terminate());
        queue.push(Task::new(203, "left behind", 3));
        let stop = AtomicBool::new(false);

        let report =
            TimeoutConsumer::new(Duration::from_secs(5), 3, Duration::ZERO).run(&queue, &stop);
        assert_eq!(report.exit, ExitReason::Sentinel);
        assert_eq!(report.processed_ids, vec![201, 202]);
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn successful_pop_resets_consecutive_timeouts() {
        let queue = Arc::new(TaskQueue::new());
        let wait = Duration::from_millis(200);
        let consumer_queue = Arc::clone(&queue);
        let handle = spawn_role("timeout-consumer", move || {
            let stop = AtomicBool::new(false);
            TimeoutConsumer::new(wait, 2, Duration::ZERO).run(&consumer_queue, &stop)
        })
        .expect("spawn timeout consumer");

        // Land the push inside the second wait, after one timeout.
        let start = Instant::now();
        while queue.waiting() == 0 {
            assert!(start.elapsed() < Duration::from_secs(5));
            thread::sleep(Duration::from_millis(1));
        }
        thread::sleep(wait + wait / 2);
        queue.push(Task::new(7, "mid-run", 2));

        let report = join_role(handle).expect("timeout consumer panicked");
        assert_eq!(report.exit, ExitReason::TimeoutLimit);
        assert_eq!(report.processed_ids, vec![7]);
        assert_eq!(report.timeouts, 3);
    }
}
