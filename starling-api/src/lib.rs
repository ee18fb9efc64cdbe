//! # Starling Actor Runtime API
//!
//! Starling is an actor runtime in which independently addressable services
//! communicate only through asynchronous messages routed by handle. This crate
//! is the interface layer shared by the runtime and the services it hosts; it
//! contains no scheduling code.
//!
//! ## Core Components
//!
//! - **Handles**: opaque 32-bit actor identifiers, rendered as `:XXXXXXXX`
//! - **Messages**: `(source, session, payload)` triples with owned payloads
//! - **Addresses**: a handle or a bound name
//! - **Services**: a [`Module`] creates a [`ServiceInstance`], whose `init`
//!   registers an [`ActorBehavior`] callback through the [`ServiceContext`]
//! - **Commands**: the `REG`/`EXIT`/`NOW`/`TIMEOUT`/`LAUNCH` vocabulary
//!
//! ## Usage Example
//!
//! ```rust
//! use starling_api::{ActorBehavior, InitError, Message, ServiceContext, ServiceInstance};
//!
//! struct Echo;
//!
//! impl ServiceInstance for Echo {
//!     fn init(&mut self, ctx: &dyn ServiceContext, _args: &str) -> Result<(), InitError> {
//!         ctx.set_callback(Box::new(|ctx: &dyn ServiceContext, msg: Message| {
//!             if let Some(source) = msg.source {
//!                 let _ = ctx.send(&source.into(), msg.session, msg.payload);
//!             }
//!         }))?;
//!         Ok(())
//!     }
//! }
//! ```
//!
//! ## Module Organization
//!
//! - [`types`]: handles, messages and session constants
//! - [`address`]: destination addressing
//! - [`actor`]: behavior, instance, module and loader traits
//! - [`context`]: the runtime view given to running actors
//! - [`command`]: control-plane commands
//! - [`errors`]: error types

pub mod actor;
pub mod address;
pub mod command;
pub mod context;
pub mod errors;
pub mod types;

pub use actor::{ActorBehavior, Module, ModuleLoader, ServiceInstance};
pub use address::Address;
pub use command::{Command, CommandReply};
pub use context::ServiceContext;
pub use errors::{
    AddressError, CallbackError, CommandError, InitError, NameError, SendError, SpawnError,
};
pub use types::{Handle, Message, ALLOCATE_SESSION};
