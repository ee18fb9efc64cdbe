use std::fmt;
use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tokio::runtime::Handle as RuntimeHandle;

use crate::dispatcher::{DispatchOutcome, Dispatcher};
use crate::log_scheduler;
use crate::logging;
use crate::system::RuntimeCore;

/// # Worker Thread
///
/// One OS thread of the dispatcher pool.
///
/// ## Core Algorithm
/// 1. Dispatch until nothing is runnable
/// 2. Park on the global queue until a queue is scheduled or the idle sleep
///    elapses
/// 3. Repeat until the runtime is shutting down
///
/// Parking goes through the tokio runtime handle, so an idle worker costs no
/// CPU while still noticing shutdown within one idle sleep.
pub(crate) struct Worker {
    index: usize,
    dispatcher: Dispatcher,
    core: Arc<RuntimeCore>,
    runtime_handle: RuntimeHandle,
}

impl Worker {
    pub(crate) fn new(
        index: usize,
        dispatcher: Dispatcher,
        core: Arc<RuntimeCore>,
        runtime_handle: RuntimeHandle,
    ) -> Self {
        Self {
            index,
            dispatcher,
            core,
            runtime_handle,
        }
    }

    /// Starts the worker on a thread called `name`. The thread logs through
    /// the caller's tracing subscriber.
    pub(crate) fn spawn(self, name: String) -> io::Result<JoinHandle<()>> {
        let subscriber = logging::current_subscriber();
        thread::Builder::new()
            .name(name)
            .spawn(move || tracing::dispatcher::with_default(&subscriber, || self.run()))
    }

    fn run(self) {
        log_scheduler!("worker", "started", worker = self.index);
        let idle_sleep = self.core.config.idle_sleep;
        let mut delivered: u64 = 0;

        while !self.core.is_shutting_down() {
            match self.dispatcher.dispatch_once() {
                DispatchOutcome::Dispatched(n) => delivered += n as u64,
                DispatchOutcome::Dropped => {}
                DispatchOutcome::Blocked => {
                    self.runtime_handle
                        .block_on(self.core.scheduler.wait_for_work(idle_sleep));
                }
            }
        }

        log_scheduler!("worker", "stopped", worker = self.index, delivered);
    }
}

impl fmt::Debug for Worker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Worker")
            .field("index", &self.index)
            .finish()
    }
}
