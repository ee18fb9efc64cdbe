//! # Dispatcher
//!
//! One dispatch step takes the queue at the head of the global queue,
//! delivers a bounded number of its messages to the owning actor's callback,
//! then either returns the queue to the tail or lets it go idle.
//!
//! ## Core Algorithm
//! 1. Take the next runnable queue; report `Blocked` if there is none
//! 2. Resolve its actor; a queue whose actor is gone is drained into dead
//!    letters and reported as `Dropped`
//! 3. Deliver up to `max_messages_per_run` messages, each under
//!    `catch_unwind` so a panicking actor does not take the worker down
//! 4. Release the actor reference, then hand the queue to `finish_run`
//!
//! Because a queue stays marked as scheduled for the whole step, no other
//! dispatcher can service the same actor concurrently.

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use starling_api::Message;
use tracing::{error, warn};

use crate::actor_span;
use crate::context::{ActorContext, Scope};
use crate::dead_letter::DropReason;
use crate::system::RuntimeCore;

/// Result of one [`Dispatcher::dispatch_once`] call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Nothing was runnable.
    Blocked,
    /// A queue was serviced; the count is the number of callbacks invoked.
    Dispatched(usize),
    /// A queue was taken whose actor no longer exists; its messages became
    /// dead letters.
    Dropped,
}

/// Drives message delivery. Cheap to clone; every worker owns one.
#[derive(Clone)]
pub struct Dispatcher {
    core: Arc<RuntimeCore>,
}

impl Dispatcher {
    pub(crate) fn new(core: Arc<RuntimeCore>) -> Self {
        Self { core }
    }

    /// Services one runnable queue.
    pub fn dispatch_once(&self) -> DispatchOutcome {
        let Some(queue) = self.core.scheduler.next() else {
            return DispatchOutcome::Blocked;
        };
        let handle = queue.handle();

        let Some(actor) = self.core.handles.grab(handle) else {
            let dropped = queue.release_now();
            warn!(handle = %handle, dropped = dropped.len(), "queue of a retired actor");
            self.core
                .dead_letters
                .record_all(handle, dropped, DropReason::Retired);
            return DispatchOutcome::Dropped;
        };

        let mut invoked = 0;
        for _ in 0..self.core.config.max_messages_per_run {
            let Some(message) = queue.pop() else {
                break;
            };
            if self.deliver(&actor, message) {
                invoked += 1;
            }
        }
        drop(actor);

        let dropped = queue.finish_run(&self.core.scheduler);
        self.core
            .dead_letters
            .record_all(handle, dropped, DropReason::Retired);
        DispatchOutcome::Dispatched(invoked)
    }

    /// Runs `dispatch_once` until nothing is runnable. Returns the number of
    /// callbacks invoked.
    pub fn run_until_idle(&self) -> usize {
        let mut invoked = 0;
        loop {
            match self.dispatch_once() {
                DispatchOutcome::Blocked => return invoked,
                DispatchOutcome::Dispatched(n) => invoked += n,
                DispatchOutcome::Dropped => {}
            }
        }
    }

    fn deliver(&self, actor: &ActorContext, message: Message) -> bool {
        let handle = actor.handle();
        let Some(mut behavior) = actor.behavior() else {
            self.core
                .dead_letters
                .record(handle, message, DropReason::NoCallback);
            return false;
        };

        let session = message.session;
        let _span = actor_span!(handle, actor.module_name(), session).entered();
        let scope = Scope::new(&self.core, actor);
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| behavior.on_message(&scope, message)));
        if let Err(payload) = outcome {
            error!(handle = %handle, session, "callback panicked: {}", panic_message(payload.as_ref()));
        }
        true
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("max_messages_per_run", &self.core.config.max_messages_per_run)
            .finish()
    }
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(text) = payload.downcast_ref::<&str>() {
        text.to_string()
    } else if let Some(text) = payload.downcast_ref::<String>() {
        text.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
