// Shared services and helpers for the runtime integration tests
#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use starling::{ActorSystem, ModuleRegistry, RuntimeConfig};
use starling_api::{
    Address, ALLOCATE_SESSION, Handle, InitError, Message, ServiceContext, ServiceInstance,
};

pub type Log = Arc<Mutex<Vec<Message>>>;

/// Binds the name given in `args` (if any) and records every message.
pub struct Collector {
    pub log: Log,
}

impl ServiceInstance for Collector {
    fn init(&mut self, ctx: &dyn ServiceContext, args: &str) -> Result<(), InitError> {
        if !args.is_empty() {
            ctx.command_str("REG", args)?;
        }
        let log = Arc::clone(&self.log);
        ctx.set_callback(Box::new(move |_: &dyn ServiceContext, msg: Message| {
            log.lock().unwrap().push(msg);
        }))?;
        Ok(())
    }
}

/// Sends "hello" to the address in `args` from inside `init`.
pub struct Greeter;

impl ServiceInstance for Greeter {
    fn init(&mut self, ctx: &dyn ServiceContext, args: &str) -> Result<(), InitError> {
        let destination: Address = args.parse().map_err(|e| InitError::Failed(format!("{}", e)))?;
        ctx.send(&destination, ALLOCATE_SESSION, b"hello".to_vec())?;
        ctx.set_callback(Box::new(|_: &dyn ServiceContext, _: Message| {}))?;
        Ok(())
    }
}

/// Replies to the sender with the same session and payload.
pub struct Echo;

impl ServiceInstance for Echo {
    fn init(&mut self, ctx: &dyn ServiceContext, args: &str) -> Result<(), InitError> {
        if !args.is_empty() {
            ctx.command_str("REG", args)?;
        }
        ctx.set_callback(Box::new(|ctx: &dyn ServiceContext, msg: Message| {
            if let Some(source) = msg.source {
                let _ = ctx.send(&source.into(), msg.session, msg.payload);
            }
        }))?;
        Ok(())
    }
}

/// Refuses to start.
pub struct Refuser;

impl ServiceInstance for Refuser {
    fn init(&mut self, _ctx: &dyn ServiceContext, _args: &str) -> Result<(), InitError> {
        Err(InitError::Failed("refused".to_string()))
    }
}

/// Tracks how many callbacks run at once for this actor.
pub struct Guarded {
    pub in_flight: Arc<AtomicUsize>,
    pub overlaps: Arc<AtomicUsize>,
    pub log: Log,
}

impl ServiceInstance for Guarded {
    fn init(&mut self, ctx: &dyn ServiceContext, _args: &str) -> Result<(), InitError> {
        let in_flight = Arc::clone(&self.in_flight);
        let overlaps = Arc::clone(&self.overlaps);
        let log = Arc::clone(&self.log);
        ctx.set_callback(Box::new(move |_: &dyn ServiceContext, msg: Message| {
            if in_flight.fetch_add(1, Ordering::SeqCst) != 0 {
                overlaps.fetch_add(1, Ordering::SeqCst);
            }
            std::thread::yield_now();
            log.lock().unwrap().push(msg);
            in_flight.fetch_sub(1, Ordering::SeqCst);
        }))?;
        Ok(())
    }
}

pub struct Fixture {
    pub registry: ModuleRegistry,
    pub log: Log,
    pub in_flight: Arc<AtomicUsize>,
    pub overlaps: Arc<AtomicUsize>,
}

/// A registry with every test service registered.
pub fn fixture() -> Fixture {
    let registry = ModuleRegistry::new();
    let log: Log = Arc::default();
    let in_flight = Arc::new(AtomicUsize::new(0));
    let overlaps = Arc::new(AtomicUsize::new(0));

    let collector_log = Arc::clone(&log);
    registry
        .register("collector", move || {
            Box::new(Collector {
                log: Arc::clone(&collector_log),
            }) as Box<dyn ServiceInstance>
        })
        .unwrap();
    registry
        .register("greeter", || Box::new(Greeter) as Box<dyn ServiceInstance>)
        .unwrap();
    registry
        .register("echo", || Box::new(Echo) as Box<dyn ServiceInstance>)
        .unwrap();
    registry
        .register("refuser", || Box::new(Refuser) as Box<dyn ServiceInstance>)
        .unwrap();

    let (guarded_in_flight, guarded_overlaps, guarded_log) =
        (Arc::clone(&in_flight), Arc::clone(&overlaps), Arc::clone(&log));
    registry
        .register("guarded", move || {
            Box::new(Guarded {
                in_flight: Arc::clone(&guarded_in_flight),
                overlaps: Arc::clone(&guarded_overlaps),
                log: Arc::clone(&guarded_log),
            }) as Box<dyn ServiceInstance>
        })
        .unwrap();

    Fixture {
        registry,
        log,
        in_flight,
        overlaps,
    }
}

/// Builds a system on the current tokio runtime. Not started.
pub fn system(registry: ModuleRegistry, config: RuntimeConfig) -> ActorSystem {
    starling::logging::init_test();
    ActorSystem::new(config, Arc::new(registry), tokio::runtime::Handle::current()).unwrap()
}

pub fn sent_by(log: &Log, source: Handle) -> Vec<Message> {
    log.lock()
        .unwrap()
        .iter()
        .filter(|m| m.source == Some(source))
        .cloned()
        .collect()
}

/// Polls `condition` until it holds or five seconds pass.
pub async fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}
