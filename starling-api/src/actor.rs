//! # Actor Traits
//!
//! An actor is made of two parts supplied by a [`Module`]:
//!
//! - a [`ServiceInstance`], the opaque state created by the module and owned
//!   by the runtime for the actor's whole life;
//! - an [`ActorBehavior`], the message callback the instance registers
//!   (exactly once) from inside its own `init`.
//!
//! Modules are looked up by name through a [`ModuleLoader`].

use std::sync::Arc;

use downcast_rs::{impl_downcast, Downcast};

use crate::context::ServiceContext;
use crate::errors::InitError;
use crate::types::Message;

/// Message callback of an actor.
///
/// The runtime guarantees that `on_message` is never invoked concurrently for
/// the same actor, and that messages arrive in the order they were enqueued.
/// The callback takes ownership of the message payload.
pub trait ActorBehavior: Send {
    fn on_message(&mut self, ctx: &dyn ServiceContext, message: Message);
}

impl<F> ActorBehavior for F
where
    F: FnMut(&dyn ServiceContext, Message) + Send,
{
    fn on_message(&mut self, ctx: &dyn ServiceContext, message: Message) {
        self(ctx, message)
    }
}

/// Per-actor state created by a module.
///
/// `init` runs once, after the actor has been registered and before any
/// message is dispatched to it. Messages sent to the actor while `init` runs
/// (including ones it sends to itself) are buffered and delivered afterwards.
pub trait ServiceInstance: Downcast + Send {
    fn init(&mut self, ctx: &dyn ServiceContext, args: &str) -> Result<(), InitError>;
}
impl_downcast!(ServiceInstance);

/// Factory for service instances.
pub trait Module: Send + Sync {
    fn create(&self) -> Result<Box<dyn ServiceInstance>, InitError>;
}

impl<F> Module for F
where
    F: Fn() -> Box<dyn ServiceInstance> + Send + Sync,
{
    fn create(&self) -> Result<Box<dyn ServiceInstance>, InitError> {
        Ok(self())
    }
}

/// Resolves module names to modules.
pub trait ModuleLoader: Send + Sync {
    fn query(&self, name: &str) -> Option<Arc<dyn Module>>;
}
