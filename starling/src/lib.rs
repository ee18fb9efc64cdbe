//! # Starling Actor Runtime
//!
//! A multi-threaded actor runtime. Independently addressable actors talk only
//! through asynchronous messages routed by handle; a fixed pool of worker
//! threads delivers those messages so that each actor sees its messages one
//! at a time and in order.
//!
//! ## Core Components
//!
//! - [`handle`]: the table mapping handles to live actors and names to handles
//! - [`mailbox`]: per-actor message queues
//! - [`scheduler`]: the global queue of runnable actor queues and the workers
//! - [`timer`]: the hierarchical timer wheel behind `TIMEOUT`
//! - [`dispatcher`]: one delivery step
//! - [`system`]: actor creation, message routing, commands and lifecycle
//! - [`dead_letter`]: reporting of undeliverable messages
//! - [`logging`]: `tracing` subscriber setup and event macros
//!
//! The actor-facing traits (`ServiceInstance`, `ServiceContext`, ...) live in
//! the `starling-api` crate.

pub mod config;
pub mod context;
pub mod dead_letter;
pub mod dispatcher;
pub mod error;
pub mod handle;
pub mod logging;
pub mod mailbox;
pub mod module;
pub mod scheduler;
pub mod system;
pub mod timer;

mod sync;

pub use config::RuntimeConfig;
pub use dead_letter::{DeadLetter, DropReason};
pub use dispatcher::{DispatchOutcome, Dispatcher};
pub use error::{ConfigError, SystemError};
pub use module::ModuleRegistry;
pub use system::{ActorSystem, SystemMetrics};
