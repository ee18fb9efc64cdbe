//! # Actor Mailboxes
//!
//! Every actor owns one [`ActorQueue`]: an unbounded FIFO of messages plus the
//! bookkeeping that ties it to the [`GlobalScheduler`].
//!
//! ## Scheduling State
//!
//! A queue is either *idle* (not referenced by the scheduler) or *scheduled*
//! (`in_global` set: sitting in the scheduler, or being serviced by exactly one
//! dispatcher). The transitions are:
//!
//! - idle → scheduled: a push arrives on an idle queue; the pusher publishes it
//! - scheduled → scheduled: a dispatcher finishes a run and messages remain;
//!   the queue is re-appended to the scheduler's tail
//! - scheduled → idle: a dispatcher finishes a run and the queue is empty
//! - idle → released: the owning actor is destroyed
//!
//! The flag, the release marker and the buffer share one lock, so the
//! "empty? then go idle" decision and a concurrent push can never interleave.
//! Because a scheduled queue is never published a second time, at most one
//! dispatcher services a given actor at any instant.

pub mod ring;

use std::fmt;
use std::sync::{Arc, Mutex};

use starling_api::{Handle, Message};

use crate::scheduler::GlobalScheduler;
use crate::sync::lock;
use ring::RingQueue;

/// Initial per-actor queue capacity.
pub const DEFAULT_MAILBOX_CAPACITY: usize = 64;

struct QueueState {
    messages: RingQueue<Message>,
    in_global: bool,
    released: bool,
}

/// Per-actor message queue.
pub struct ActorQueue {
    handle: Handle,
    state: Mutex<QueueState>,
}

impl ActorQueue {
    /// Creates a queue for `handle` in the held state.
    ///
    /// A held queue buffers pushes without publishing itself, which keeps the
    /// actor from being dispatched before its `init` has finished. Call
    /// [`ActorQueue::activate`] to hand it to the scheduler.
    pub fn new(handle: Handle, capacity: usize) -> Arc<Self> {
        Arc::new(Self {
            handle,
            state: Mutex::new(QueueState {
                messages: RingQueue::with_capacity(capacity),
                in_global: true,
                released: false,
            }),
        })
    }

    /// Handle of the actor owning this queue.
    pub fn handle(&self) -> Handle {
        self.handle
    }

    /// Appends a message and publishes the queue if it was idle.
    ///
    /// A released queue refuses the message and hands it back.
    pub fn push(self: &Arc<Self>, message: Message, scheduler: &GlobalScheduler) -> Result<(), Message> {
        let publish = {
            let mut state = lock(&self.state);
            if state.released {
                return Err(message);
            }
            state.messages.push(message);
            !std::mem::replace(&mut state.in_global, true)
        };
        if publish {
            scheduler.schedule(Arc::clone(self));
        }
        Ok(())
    }

    /// Removes the message at the head. Does not touch the scheduling state.
    pub fn pop(&self) -> Option<Message> {
        lock(&self.state).messages.pop()
    }

    /// Decides what happens to a scheduled queue once a dispatcher is done
    /// with it.
    ///
    /// - released: drained and left idle; the drained messages are returned
    /// - empty: marked idle, so the next push publishes it again
    /// - otherwise: re-appended to the scheduler's tail
    pub fn finish_run(self: &Arc<Self>, scheduler: &GlobalScheduler) -> Vec<Message> {
        {
            let mut state = lock(&self.state);
            if state.released {
                state.in_global = false;
                return state.messages.drain();
            }
            if state.messages.is_empty() {
                state.in_global = false;
                return Vec::new();
            }
        }
        scheduler.schedule(Arc::clone(self));
        Vec::new()
    }

    /// Hands a held queue to the scheduler once its actor is ready.
    pub fn activate(self: &Arc<Self>, scheduler: &GlobalScheduler) -> Vec<Message> {
        self.finish_run(scheduler)
    }

    /// Marks the queue for release when its actor is destroyed.
    ///
    /// An idle queue is released at once and its remaining messages returned.
    /// A scheduled queue is only flagged; the dispatcher that next services it
    /// drains it in [`ActorQueue::finish_run`] instead of re-publishing it.
    pub fn mark_release(&self) -> Vec<Message> {
        let mut state = lock(&self.state);
        state.released = true;
        if state.in_global {
            Vec::new()
        } else {
            state.messages.drain()
        }
    }

    /// Releases the queue unconditionally and returns what was left in it.
    ///
    /// Only for a caller that currently owns the scheduled state, such as a
    /// dispatcher that popped the queue for an actor that no longer exists.
    pub fn release_now(&self) -> Vec<Message> {
        let mut state = lock(&self.state);
        state.released = true;
        state.in_global = false;
        state.messages.drain()
    }

    pub fn len(&self) -> usize {
        lock(&self.state).messages.len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.state).messages.is_empty()
    }

    /// Whether the queue is currently referenced by the scheduler (or being
    /// serviced).
    pub fn is_scheduled(&self) -> bool {
        lock(&self.state).in_global
    }

    pub fn is_released(&self) -> bool {
        lock(&self.state).released
    }

    pub fn capacity(&self) -> usize {
        lock(&self.state).messages.capacity()
    }
}

impl fmt::Debug for ActorQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = lock(&self.state);
        f.debug_struct("ActorQueue")
            .field("handle", &self.handle)
            .field("len", &state.messages.len())
            .field("in_global", &state.in_global)
            .field("released", &state.released)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(session: i32) -> Message {
        Message::new(Some(Handle::new(1)), session, vec![session as u8])
    }

    fn idle_queue(scheduler: &GlobalScheduler) -> Arc<ActorQueue> {
        let queue = ActorQueue::new(Handle::new(7), DEFAULT_MAILBOX_CAPACITY);
        assert!(queue.activate(scheduler).is_empty());
        queue
    }

    #[test]
    fn test_growth_keeps_all_messages_in_order() {
        let scheduler = GlobalScheduler::new(4);
        let queue = idle_queue(&scheduler);

        for session in 0..65 {
            queue.push(msg(session), &scheduler).unwrap();
        }
        assert_eq!(queue.len(), 65);
        assert_eq!(queue.capacity(), 128);

        let sessions: Vec<i32> = std::iter::from_fn(|| queue.pop()).map(|m| m.session).collect();
        assert_eq!(sessions, (0..65).collect::<Vec<_>>());
    }

    #[test]
    fn test_held_queue_does_not_publish() {
        let scheduler = GlobalScheduler::new(4);
        let queue = ActorQueue::new(Handle::new(7), 4);

        queue.push(msg(1), &scheduler).unwrap();
        assert!(scheduler.is_empty());

        queue.activate(&scheduler);
        assert_eq!(scheduler.len(), 1);
    }

    #[test]
    fn test_push_publishes_idle_queue_once() {
        let scheduler = GlobalScheduler::new(4);
        let queue = idle_queue(&scheduler);
        assert!(!queue.is_scheduled());

        queue.push(msg(1), &scheduler).unwrap();
        queue.push(msg(2), &scheduler).unwrap();
        assert!(queue.is_scheduled());
        assert_eq!(scheduler.len(), 1);
    }

    #[test]
    fn test_finish_run_requeues_or_goes_idle() {
        let scheduler = GlobalScheduler::new(4);
        let queue = idle_queue(&scheduler);
        queue.push(msg(1), &scheduler).unwrap();
        queue.push(msg(2), &scheduler).unwrap();

        let serviced = scheduler.next().unwrap();
        assert_eq!(serviced.pop().unwrap().session, 1);
        serviced.finish_run(&scheduler);
        assert_eq!(scheduler.len(), 1);
        assert!(queue.is_scheduled());

        let serviced = scheduler.next().unwrap();
        assert_eq!(serviced.pop().unwrap().session, 2);
        serviced.finish_run(&scheduler);
        assert!(scheduler.is_empty());
        assert!(!queue.is_scheduled());

        // The next push makes it runnable again
        queue.push(msg(3), &scheduler).unwrap();
        assert_eq!(scheduler.len(), 1);
    }

    #[test]
    fn test_push_while_serviced_does_not_double_schedule() {
        let scheduler = GlobalScheduler::new(4);
        let queue = idle_queue(&scheduler);
        queue.push(msg(1), &scheduler).unwrap();

        let serviced = scheduler.next().unwrap();
        serviced.pop().unwrap();
        // A producer races with the dispatcher
        queue.push(msg(2), &scheduler).unwrap();
        assert!(scheduler.is_empty());

        serviced.finish_run(&scheduler);
        assert_eq!(scheduler.len(), 1);
    }

    #[test]
    fn test_mark_release_idle_drains_immediately() {
        let scheduler = GlobalScheduler::new(4);
        let queue = ActorQueue::new(Handle::new(7), 4);
        queue.push(msg(1), &scheduler).unwrap();
        queue.push(msg(2), &scheduler).unwrap();
        // Still held, so release is deferred
        assert!(queue.mark_release().is_empty());
        assert!(queue.is_released());
        assert_eq!(queue.release_now().len(), 2);

        let idle = idle_queue(&scheduler);
        assert!(idle.mark_release().is_empty());
        assert!(idle.push(msg(3), &scheduler).is_err());
    }

    #[test]
    fn test_mark_release_scheduled_defers_to_dispatcher() {
        let scheduler = GlobalScheduler::new(4);
        let queue = idle_queue(&scheduler);
        queue.push(msg(1), &scheduler).unwrap();
        queue.push(msg(2), &scheduler).unwrap();

        assert!(queue.mark_release().is_empty());
        let serviced = scheduler.next().unwrap();
        let dropped = serviced.finish_run(&scheduler);
        assert_eq!(dropped.len(), 2);
        assert!(scheduler.is_empty());
        assert!(!queue.is_scheduled());
    }
}
