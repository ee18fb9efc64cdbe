//! # Actor Contexts
//!
//! [`ActorContext`] is the runtime's record of one live actor: its handle,
//! the instance created by its module, the callback registered by that
//! instance, its message queue and its session counter.
//!
//! ## Lifetime
//!
//! Contexts are shared through `Arc`. The handle table holds one strong
//! reference for as long as the actor is registered, and every successful
//! `grab` holds another for the duration of a single operation. Retiring a
//! handle only drops the table's reference; the context is destroyed when the
//! last holder lets go, which is never in the middle of a callback.
//!
//! Destruction releases the queue. Whatever was still queued is reported as
//! dead letters.

use std::fmt;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};

use starling_api::{
    ActorBehavior, Address, CallbackError, Command, CommandError, CommandReply, Handle, SendError,
    ServiceContext, ServiceInstance,
};

use crate::dead_letter::{DeadLetterSink, DropReason};
use crate::log_lifecycle;
use crate::mailbox::ActorQueue;
use crate::sync::lock;
use crate::system::RuntimeCore;

/// Allocates the next session from `counter`.
///
/// Sessions are strictly positive. After `i32::MAX` the counter wraps back
/// to 1.
pub(crate) fn allocate_session(counter: &AtomicI32) -> i32 {
    let mut current = counter.load(Ordering::Relaxed);
    loop {
        let next = if current >= i32::MAX || current < 0 { 1 } else { current + 1 };
        match counter.compare_exchange_weak(current, next, Ordering::Relaxed, Ordering::Relaxed) {
            Ok(_) => return next,
            Err(actual) => current = actual,
        }
    }
}

/// Runtime record of one actor.
pub struct ActorContext {
    handle: Handle,
    module_name: String,
    instance: Mutex<Box<dyn ServiceInstance>>,
    behavior: OnceLock<Mutex<Box<dyn ActorBehavior>>>,
    queue: Arc<ActorQueue>,
    session_counter: AtomicI32,
    dead_letters: DeadLetterSink,
}

impl ActorContext {
    pub fn new(
        handle: Handle,
        module_name: impl Into<String>,
        instance: Box<dyn ServiceInstance>,
        queue: Arc<ActorQueue>,
        dead_letters: DeadLetterSink,
    ) -> Self {
        Self {
            handle,
            module_name: module_name.into(),
            instance: Mutex::new(instance),
            behavior: OnceLock::new(),
            queue,
            session_counter: AtomicI32::new(0),
            dead_letters,
        }
    }

    pub fn handle(&self) -> Handle {
        self.handle
    }

    pub fn module_name(&self) -> &str {
        &self.module_name
    }

    pub fn queue(&self) -> &Arc<ActorQueue> {
        &self.queue
    }

    /// Registers the message callback. Only the first registration wins.
    pub fn set_behavior(&self, behavior: Box<dyn ActorBehavior>) -> Result<(), CallbackError> {
        self.behavior
            .set(Mutex::new(behavior))
            .map_err(|_| CallbackError::AlreadySet(self.handle))
    }

    pub fn has_behavior(&self) -> bool {
        self.behavior.get().is_some()
    }

    /// The registered callback, locked for one invocation.
    ///
    /// The lock is uncontended: a queue is serviced by one dispatcher at a
    /// time.
    pub(crate) fn behavior(&self) -> Option<MutexGuard<'_, Box<dyn ActorBehavior>>> {
        self.behavior.get().map(lock)
    }

    pub(crate) fn instance(&self) -> MutexGuard<'_, Box<dyn ServiceInstance>> {
        lock(&self.instance)
    }

    /// Allocates a fresh positive session for a message sent by this actor.
    pub fn next_session(&self) -> i32 {
        allocate_session(&self.session_counter)
    }
}

impl Drop for ActorContext {
    fn drop(&mut self) {
        let remaining = self.queue.mark_release();
        self.dead_letters.record_all(self.handle, remaining, DropReason::Retired);
        log_lifecycle!(self.handle, self.module_name.as_str(), "destroyed");
    }
}

impl fmt::Debug for ActorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActorContext")
            .field("handle", &self.handle)
            .field("module", &self.module_name)
            .field("has_behavior", &self.has_behavior())
            .finish()
    }
}

/// The [`ServiceContext`] handed to an actor while its `init` or callback
/// runs. Borrows the runtime and the actor for exactly that call.
pub(crate) struct Scope<'a> {
    core: &'a Arc<RuntimeCore>,
    actor: &'a ActorContext,
}

impl<'a> Scope<'a> {
    pub(crate) fn new(core: &'a Arc<RuntimeCore>, actor: &'a ActorContext) -> Self {
        Self { core, actor }
    }
}

impl ServiceContext for Scope<'_> {
    fn handle(&self) -> Handle {
        self.actor.handle()
    }

    fn send(&self, destination: &Address, session: i32, payload: Vec<u8>) -> Result<i32, SendError> {
        let session = if session < 0 {
            self.actor.next_session()
        } else {
            session
        };
        self.core
            .send_resolved(Some(self.actor.handle()), destination, session, payload)
    }

    fn set_callback(&self, behavior: Box<dyn ActorBehavior>) -> Result<(), CallbackError> {
        self.actor.set_behavior(behavior)
    }

    fn command(&self, command: Command) -> Result<CommandReply, CommandError> {
        self.core.execute(self.actor.handle(), command)
    }
}
