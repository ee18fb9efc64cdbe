use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::Notify;
use tokio::time;

use crate::mailbox::ActorQueue;
use crate::mailbox::ring::RingQueue;
use crate::sync::lock;

/// Default capacity hint of the global queue.
pub const DEFAULT_GLOBAL_QUEUE_CAPACITY: usize = 64;

/// The queue of runnable actor queues.
///
/// Holds every [`ActorQueue`] that has messages waiting and is not currently
/// being serviced. Dispatchers take from the head and return unfinished
/// queues to the tail, which gives round-robin service across actors.
///
/// # Thread Safety
/// - One short lock around a doubling ring buffer
/// - `Notify` wakes one parked worker per scheduled queue
///
/// # Invariants
/// - A queue appears here at most once (enforced by the queue's own
///   `in_global` flag, never by this type)
/// - Strict FIFO over queues
pub struct GlobalScheduler {
    queues: Mutex<RingQueue<Arc<ActorQueue>>>,
    notify: Notify,
}

impl GlobalScheduler {
    /// Creates an empty scheduler. The ring starts at the next power of two
    /// not below `capacity_hint`.
    pub fn new(capacity_hint: usize) -> Self {
        Self {
            queues: Mutex::new(RingQueue::with_capacity(capacity_hint.max(1).next_power_of_two())),
            notify: Notify::new(),
        }
    }

    /// Appends a runnable queue at the tail and wakes one idle worker.
    pub fn schedule(&self, queue: Arc<ActorQueue>) {
        lock(&self.queues).push(queue);
        self.notify.notify_one();
    }

    /// Takes the queue at the head.
    pub fn next(&self) -> Option<Arc<ActorQueue>> {
        lock(&self.queues).pop()
    }

    /// Waits until a queue is scheduled or `idle` elapses, whichever is first.
    ///
    /// Returns immediately if work is already pending. A stored `notify_one`
    /// permit from an earlier schedule also completes the wait, so a wakeup
    /// issued between a failed `next` and this call is not lost.
    pub async fn wait_for_work(&self, idle: Duration) {
        if !self.is_empty() {
            return;
        }
        tokio::select! {
            _ = self.notify.notified() => {}
            _ = time::sleep(idle) => {}
        }
    }

    /// Wakes every worker currently parked in [`GlobalScheduler::wait_for_work`].
    pub fn wake_all(&self) {
        self.notify.notify_waiters();
    }

    /// Number of queues waiting. A snapshot.
    pub fn len(&self) -> usize {
        lock(&self.queues).len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.queues).is_empty()
    }
}

impl fmt::Debug for GlobalScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GlobalScheduler")
            .field("len", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use starling_api::{Handle, Message};

    use super::*;

    fn runnable(handle: u32, scheduler: &GlobalScheduler) -> Arc<ActorQueue> {
        let queue = ActorQueue::new(Handle::new(handle), 4);
        queue.push(Message::timer_expiry(0), scheduler).unwrap();
        queue.activate(scheduler);
        queue
    }

    #[test]
    fn test_fifo_over_queues() {
        let scheduler = GlobalScheduler::new(2);
        for handle in 1..=5 {
            runnable(handle, &scheduler);
        }
        assert_eq!(scheduler.len(), 5);

        let order: Vec<u32> = std::iter::from_fn(|| scheduler.next())
            .map(|q| q.handle().raw())
            .collect();
        assert_eq!(order, vec![1, 2, 3, 4, 5]);
        assert!(scheduler.next().is_none());
    }

    #[tokio::test]
    async fn test_wait_for_work_returns_when_pending() {
        let scheduler = GlobalScheduler::new(4);
        runnable(1, &scheduler);

        let started = Instant::now();
        scheduler.wait_for_work(Duration::from_secs(5)).await;
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_wait_for_work_times_out_when_idle() {
        let scheduler = GlobalScheduler::new(4);
        let started = Instant::now();
        scheduler.wait_for_work(Duration::from_millis(20)).await;
        assert!(started.elapsed() >= Duration::from_millis(20));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_schedule_wakes_waiter() {
        let scheduler = Arc::new(GlobalScheduler::new(4));
        let waiter = {
            let scheduler = Arc::clone(&scheduler);
            tokio::spawn(async move {
                let started = Instant::now();
                scheduler.wait_for_work(Duration::from_secs(5)).await;
                started.elapsed()
            })
        };

        time::sleep(Duration::from_millis(20)).await;
        runnable(9, &scheduler);
        let waited = waiter.await.unwrap();
        assert!(waited < Duration::from_secs(5));
    }
}
