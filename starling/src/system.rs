//! # Actor System
//!
//! [`ActorSystem`] is the host-facing entry point. It owns one
//! [`RuntimeCore`], the worker threads that drive dispatch and the tick task
//! that drives the timer wheel.
//!
//! ## Key Concepts
//! - Runtime core: handle table, global queue, timer wheel, dead-letter sink
//!   and module loader, shared through `Arc` with no process-global state
//! - Message funnel: every delivery (sends, timer expiries, zero-delay
//!   timeouts) goes through `RuntimeCore::push_message`
//! - Actor creation: module lookup, instance creation, registration, `init`,
//!   then activation of the actor's queue
//! - Lifecycle: `start` spawns workers and the tick task; `shutdown` stops
//!   them and retires every actor
//!
//! ## Thread Model
//! Workers are named OS threads. When idle they park on the global queue's
//! notifier through the tokio runtime handle given to [`ActorSystem::new`],
//! which must belong to a multi-threaded runtime.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use anyhow::anyhow;
use flume::Receiver;
use starling_api::{
    Address, Command, CommandError, CommandReply, Handle, InitError, Message, ModuleLoader,
    NameError, SendError, ServiceInstance, SpawnError,
};
use tokio::runtime::Handle as RuntimeHandle;
use tokio::task::JoinHandle as TaskHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::config::RuntimeConfig;
use crate::context::{ActorContext, Scope, allocate_session};
use crate::dead_letter::{DeadLetter, DeadLetterSink, DropReason};
use crate::dispatcher::{Dispatcher, panic_message};
use crate::error::SystemError;
use crate::handle::HandleTable;
use crate::mailbox::ActorQueue;
use crate::scheduler::{GlobalScheduler, Worker};
use crate::sync::lock;
use crate::timer::TimerWheel;
use crate::{actor_span, log_lifecycle};

/// State shared by every worker, the tick task and every actor scope.
pub(crate) struct RuntimeCore {
    pub(crate) config: RuntimeConfig,
    pub(crate) handles: HandleTable,
    pub(crate) scheduler: GlobalScheduler,
    pub(crate) timer: TimerWheel,
    pub(crate) dead_letters: DeadLetterSink,
    loader: Arc<dyn ModuleLoader>,
    system_sessions: AtomicI32,
    shutting_down: AtomicBool,
}

impl RuntimeCore {
    pub(crate) fn new(config: RuntimeConfig, loader: Arc<dyn ModuleLoader>) -> Arc<Self> {
        Arc::new(Self {
            handles: HandleTable::new(config.handle_slots),
            scheduler: GlobalScheduler::new(config.global_queue_capacity),
            timer: TimerWheel::new(config.tick),
            dead_letters: DeadLetterSink::bounded(config.dead_letter_capacity),
            loader,
            system_sessions: AtomicI32::new(0),
            shutting_down: AtomicBool::new(false),
            config,
        })
    }

    pub(crate) fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::Acquire)
    }

    /// Appends `message` to the queue of `destination`.
    ///
    /// Every undeliverable message is recorded as a dead letter before the
    /// error is returned.
    pub(crate) fn push_message(&self, destination: Handle, message: Message) -> Result<(), SendError> {
        if self.is_shutting_down() {
            self.dead_letters
                .record(destination, message, DropReason::ShuttingDown);
            return Err(SendError::ShuttingDown);
        }
        let Some(actor) = self.handles.grab(destination) else {
            self.dead_letters
                .record(destination, message, DropReason::UnknownHandle);
            return Err(SendError::UnknownHandle(destination));
        };
        let pushed = actor.queue().push(message, &self.scheduler);
        drop(actor);

        pushed.map_err(|message| {
            self.dead_letters
                .record(destination, message, DropReason::Released);
            SendError::Released(destination)
        })
    }

    /// Resolves `destination` and delivers with an already-decided session.
    pub(crate) fn send_resolved(
        &self,
        source: Option<Handle>,
        destination: &Address,
        session: i32,
        payload: Vec<u8>,
    ) -> Result<i32, SendError> {
        let message = Message::new(source, session, payload);
        let handle = match destination {
            Address::Handle(handle) => *handle,
            Address::Name(name) => match self.handles.find_by_name(name) {
                Some(handle) => handle,
                None => {
                    self.dead_letters
                        .record(destination, message, DropReason::UnknownName);
                    return Err(SendError::UnknownName(name.clone()));
                }
            },
        };
        self.push_message(handle, message).map(|()| session)
    }

    /// Sends on behalf of `source`, allocating a session from the source's
    /// counter (or the system counter) when `session` is negative.
    pub(crate) fn send(
        &self,
        source: Option<Handle>,
        destination: &Address,
        session: i32,
        payload: Vec<u8>,
    ) -> Result<i32, SendError> {
        let session = if session >= 0 {
            session
        } else {
            match source.and_then(|handle| self.handles.grab(handle)) {
                Some(actor) => actor.next_session(),
                None => allocate_session(&self.system_sessions),
            }
        };
        self.send_resolved(source, destination, session, payload)
    }

    /// Schedules a timer message for `handle`. Expiries go through
    /// [`RuntimeCore::push_message`].
    pub(crate) fn timeout(&self, handle: Handle, ticks: u32, session: i32) {
        self.timer.timeout(handle, ticks, session, |target, message| {
            let _ = self.push_message(target, message);
        });
    }

    /// Advances the timer wheel by exactly one tick.
    pub(crate) fn advance(&self) {
        self.timer.advance(|target, message| {
            let _ = self.push_message(target, message);
        });
    }

    /// Advances the timer wheel to the monotonic clock.
    pub(crate) fn update_time(&self) -> u64 {
        self.timer.update_time(|target, message| {
            let _ = self.push_message(target, message);
        })
    }

    /// Retires `handle`. Returns whether it was live.
    pub(crate) fn retire(&self, handle: Handle) -> bool {
        let Some(actor) = self.handles.grab(handle) else {
            return false;
        };
        let retired = self.handles.retire(handle);
        if retired {
            log_lifecycle!(handle, actor.module_name(), "retired");
        }
        retired
    }

    /// Creates, registers and initializes an actor from `module_name`.
    pub(crate) fn create_actor(self: &Arc<Self>, module_name: &str, args: &str) -> Result<Handle, SpawnError> {
        if self.is_shutting_down() {
            return Err(SpawnError::SystemShutdown);
        }
        let module = self
            .loader
            .query(module_name)
            .ok_or_else(|| SpawnError::ModuleNotFound(module_name.to_string()))?;
        let instance = module.create().map_err(|e| SpawnError::CreateFailed {
            module: module_name.to_string(),
            reason: e.to_string(),
        })?;

        let actor = self.handles.register_with(|handle| {
            Arc::new(ActorContext::new(
                handle,
                module_name,
                instance,
                ActorQueue::new(handle, self.config.mailbox_capacity),
                self.dead_letters.clone(),
            ))
        });
        let handle = actor.handle();

        match self.init_actor(&actor, args) {
            Ok(()) => {
                let dropped = actor.queue().activate(&self.scheduler);
                self.dead_letters
                    .record_all(handle, dropped, DropReason::Retired);
                log_lifecycle!(handle, module_name, "launched", args);
                Ok(handle)
            }
            Err(source) => {
                self.handles.retire(handle);
                let dropped = actor.queue().release_now();
                self.dead_letters
                    .record_all(handle, dropped, DropReason::InitFailed);
                log_lifecycle!(handle, module_name, "init failed", error = %source);
                Err(SpawnError::InitFailed {
                    module: module_name.to_string(),
                    source,
                })
            }
        }
    }

    fn init_actor(self: &Arc<Self>, actor: &ActorContext, args: &str) -> Result<(), InitError> {
        let _span = actor_span!(actor.handle(), actor.module_name()).entered();
        let scope = Scope::new(self, actor);
        let mut instance = actor.instance();
        panic::catch_unwind(AssertUnwindSafe(|| instance.init(&scope, args))).unwrap_or_else(|payload| {
            Err(InitError::Failed(format!(
                "init panicked: {}",
                panic_message(payload.as_ref())
            )))
        })
    }

    /// Executes a control-plane command on behalf of `caller`.
    pub(crate) fn execute(self: &Arc<Self>, caller: Handle, command: Command) -> Result<CommandReply, CommandError> {
        debug!(handle = %caller, command = command.keyword(), "command");
        match command {
            Command::Reg(None) => Ok(CommandReply::Handle(caller)),
            Command::Reg(Some(name)) => {
                self.handles.bind_name(caller, &name)?;
                Ok(CommandReply::Name(name))
            }
            Command::Exit => {
                self.retire(caller);
                Ok(CommandReply::Done)
            }
            Command::Now => Ok(CommandReply::Now(self.timer.now())),
            Command::Timeout { ticks, session } => {
                self.timeout(caller, ticks, session);
                Ok(CommandReply::Done)
            }
            Command::Launch { module, args } => {
                let handle = self.create_actor(&module, &args)?;
                Ok(CommandReply::Handle(handle))
            }
        }
    }

    /// Runs `f` on the instance of `handle` if it is of type `T`.
    pub(crate) fn with_instance<T, R>(&self, handle: Handle, f: impl FnOnce(&mut T) -> R) -> Option<R>
    where
        T: ServiceInstance,
    {
        let actor = self.handles.grab(handle)?;
        let mut guard = actor.instance();
        let instance: &mut dyn ServiceInstance = &mut **guard;
        instance.downcast_mut::<T>().map(f)
    }

    /// Retires every actor and turns queues still waiting in the global
    /// queue into dead letters.
    fn drain(&self) {
        for handle in self.handles.handles() {
            self.retire(handle);
        }
        while let Some(queue) = self.scheduler.next() {
            self.dead_letters
                .record_all(queue.handle(), queue.release_now(), DropReason::ShuttingDown);
        }
    }
}

impl fmt::Debug for RuntimeCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuntimeCore")
            .field("handles", &self.handles)
            .field("scheduler", &self.scheduler)
            .field("timer", &self.timer)
            .field("shutting_down", &self.is_shutting_down())
            .finish()
    }
}

/// Point-in-time counters of a running system.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SystemMetrics {
    /// Live actors.
    pub actors: usize,
    /// Queues waiting in the global queue.
    pub scheduled_queues: usize,
    /// Timers not yet expired.
    pub pending_timers: usize,
    /// Current tick.
    pub now: u32,
    /// Running worker threads.
    pub workers: usize,
}

/// The actor runtime.
///
/// # Examples
///
/// ```rust,no_run
/// use std::sync::Arc;
///
/// use starling::{ActorSystem, ModuleRegistry, RuntimeConfig};
/// use starling_api::{Address, InitError, Message, ServiceContext, ServiceInstance};
///
/// struct Greeter;
///
/// impl ServiceInstance for Greeter {
///     fn init(&mut self, ctx: &dyn ServiceContext, _args: &str) -> Result<(), InitError> {
///         ctx.set_callback(Box::new(|_: &dyn ServiceContext, msg: Message| {
///             println!("{}", String::from_utf8_lossy(&msg.payload));
///         }))?;
///         ctx.command_str("REG", ".greeter")?;
///         Ok(())
///     }
/// }
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let registry = ModuleRegistry::new();
///     registry.register("greeter", || Box::new(Greeter) as Box<dyn ServiceInstance>)?;
///
///     let system = ActorSystem::new(
///         RuntimeConfig::default(),
///         Arc::new(registry),
///         tokio::runtime::Handle::current(),
///     )?;
///     system.start()?;
///     system.create_actor("greeter", "")?;
///     system.send(None, &Address::Name("greeter".into()), 0, b"hello".to_vec())?;
///     system.shutdown()?;
///     Ok(())
/// }
/// ```
pub struct ActorSystem {
    core: Arc<RuntimeCore>,
    runtime_handle: RuntimeHandle,
    workers: Mutex<Vec<JoinHandle<()>>>,
    tick_task: Mutex<Option<TaskHandle<()>>>,
    running: AtomicBool,
}

impl ActorSystem {
    /// Builds a system. Nothing runs until [`ActorSystem::start`].
    ///
    /// # Parameters
    /// * `config` - Validated before anything is allocated
    /// * `loader` - Resolves module names for `create_actor` and `LAUNCH`
    /// * `runtime_handle` - Multi-threaded tokio runtime used for idle parking
    ///   and the tick task
    pub fn new(
        config: RuntimeConfig,
        loader: Arc<dyn ModuleLoader>,
        runtime_handle: RuntimeHandle,
    ) -> Result<Self, SystemError> {
        config.validate()?;
        info!(
            workers = config.worker_threads,
            tick_ms = config.tick.as_millis() as u64,
            "actor system created"
        );
        Ok(Self {
            core: RuntimeCore::new(config, loader),
            runtime_handle,
            workers: Mutex::new(Vec::new()),
            tick_task: Mutex::new(None),
            running: AtomicBool::new(false),
        })
    }

    /// Spawns the worker threads and the tick task.
    pub fn start(&self) -> Result<(), SystemError> {
        if self.core.is_shutting_down() {
            return Err(SystemError::ShuttingDown);
        }
        if self.running.swap(true, Ordering::AcqRel) {
            return Err(SystemError::AlreadyRunning);
        }

        let config = &self.core.config;
        let mut workers = lock(&self.workers);
        for index in 0..config.worker_threads {
            let worker = Worker::new(
                index,
                Dispatcher::new(Arc::clone(&self.core)),
                Arc::clone(&self.core),
                self.runtime_handle.clone(),
            );
            let name = format!("{}{}", config.thread_name_prefix, index);
            let thread = worker
                .spawn(name)
                .map_err(|e| SystemError::ThreadSetup(e.to_string()))?;
            workers.push(thread);
        }
        drop(workers);

        let core = Arc::clone(&self.core);
        let tick = config.tick;
        let task = self.runtime_handle.spawn(async move {
            let mut interval = time::interval(tick);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            while !core.is_shutting_down() {
                interval.tick().await;
                core.update_time();
            }
        });
        *lock(&self.tick_task) = Some(task);

        info!(workers = config.worker_threads, "actor system started");
        Ok(())
    }

    /// Stops workers and the tick task, then retires every actor.
    ///
    /// Idempotent. Messages still queued become dead letters.
    pub fn shutdown(&self) -> Result<(), SystemError> {
        if self.core.shutting_down.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        info!("actor system shutting down");

        if let Some(task) = lock(&self.tick_task).take() {
            task.abort();
        }

        let workers: Vec<JoinHandle<()>> = lock(&self.workers).drain(..).collect();
        let mut panicked = Vec::new();
        for worker in workers {
            // A worker may be between its shutdown check and parking; keep
            // waking until it is gone
            while !worker.is_finished() {
                self.core.scheduler.wake_all();
                std::thread::sleep(Duration::from_millis(1));
            }
            let name = worker.thread().name().unwrap_or("worker").to_string();
            if worker.join().is_err() {
                panicked.push(name);
            }
        }

        self.core.drain();
        self.running.store(false, Ordering::Release);
        info!("actor system stopped");

        if panicked.is_empty() {
            Ok(())
        } else {
            Err(SystemError::Other(anyhow!(
                "worker threads panicked: {}",
                panicked.join(", ")
            )))
        }
    }

    /// Launches an actor from a registered module.
    pub fn create_actor(&self, module: &str, args: &str) -> Result<Handle, SpawnError> {
        self.core.create_actor(module, args)
    }

    /// Sends `payload` to `destination`.
    ///
    /// A negative `session` allocates a fresh one, from `source`'s counter
    /// when `source` is a live actor. Returns the session used.
    pub fn send(
        &self,
        source: Option<Handle>,
        destination: &Address,
        session: i32,
        payload: Vec<u8>,
    ) -> Result<i32, SendError> {
        self.core.send(source, destination, session, payload)
    }

    /// Delivers an empty message with `session` to `handle` after `ticks`
    /// ticks.
    pub fn timeout(&self, handle: Handle, ticks: u32, session: i32) {
        self.core.timeout(handle, ticks, session);
    }

    /// Current tick count.
    pub fn now(&self) -> u32 {
        self.core.timer.now()
    }

    /// Executes a command as if `caller` had issued it.
    pub fn command(&self, caller: Handle, command: Command) -> Result<CommandReply, CommandError> {
        self.core.execute(caller, command)
    }

    pub fn retire(&self, handle: Handle) -> bool {
        self.core.retire(handle)
    }

    pub fn find_by_name(&self, name: &str) -> Option<Handle> {
        self.core.handles.find_by_name(name)
    }

    pub fn bind_name(&self, handle: Handle, name: &str) -> Result<(), NameError> {
        self.core.handles.bind_name(handle, name)
    }

    /// Typed access to an actor's instance. `None` if the actor is gone or
    /// its instance is not a `T`.
    pub fn with_instance<T, R>(&self, handle: Handle, f: impl FnOnce(&mut T) -> R) -> Option<R>
    where
        T: ServiceInstance,
    {
        self.core.with_instance(handle, f)
    }

    /// A dispatcher over this system, for hosts that drive delivery
    /// themselves instead of calling [`ActorSystem::start`].
    pub fn dispatcher(&self) -> Dispatcher {
        Dispatcher::new(Arc::clone(&self.core))
    }

    /// Advances the timer wheel to the clock. Hosts that do not call
    /// [`ActorSystem::start`] call this once per tick.
    pub fn update_time(&self) -> u64 {
        self.core.update_time()
    }

    /// Advances the timer wheel by one tick regardless of the clock,
    /// queueing whatever expires. Not meant to be mixed with a started
    /// system, whose tick task already drives the wheel.
    pub fn advance(&self) {
        self.core.advance();
    }

    /// Receiver of undeliverable messages.
    ///
    /// Dead letters are published only while at least one receiver returned
    /// here is alive; before that, and after every receiver is dropped, they
    /// are only logged.
    pub fn dead_letters(&self) -> Receiver<DeadLetter> {
        self.core.dead_letters.subscribe()
    }

    pub fn metrics(&self) -> SystemMetrics {
        SystemMetrics {
            actors: self.core.handles.len(),
            scheduled_queues: self.core.scheduler.len(),
            pending_timers: self.core.timer.pending(),
            now: self.core.timer.now(),
            workers: lock(&self.workers).len(),
        }
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.core.config
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

impl Drop for ActorSystem {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            warn!("shutdown on drop failed: {}", e);
        }
    }
}

impl fmt::Debug for ActorSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActorSystem")
            .field("config", &self.core.config)
            .field("core", &self.core)
            .field("running", &self.is_running())
            .finish()
    }
}
