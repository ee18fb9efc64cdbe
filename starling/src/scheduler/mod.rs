//! # Scheduling
//!
//! The global queue of runnable actor queues and the worker threads that
//! drain it.
//!
//! ## Key Concepts
//! - Two levels: each actor owns an [`ActorQueue`](crate::mailbox::ActorQueue);
//!   the [`GlobalScheduler`] holds the actor queues that have work
//! - Round-robin: a serviced queue that still has messages goes back to the
//!   tail of the global queue
//! - Workers: named OS threads running the dispatcher loop, parking on the
//!   global queue's notifier when idle

pub mod queue;
mod worker;

pub use queue::{DEFAULT_GLOBAL_QUEUE_CAPACITY, GlobalScheduler};
pub(crate) use worker::Worker;
