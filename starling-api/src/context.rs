//! # Service Context
//!
//! The view of the runtime an actor gets while its `init` or `on_message`
//! runs. The context is only valid for the duration of that call; an actor
//! that needs to talk to itself later keeps its [`Handle`], not the context.

use crate::actor::ActorBehavior;
use crate::address::Address;
use crate::command::{Command, CommandReply};
use crate::errors::{CallbackError, CommandError, SendError};
use crate::types::Handle;

/// Runtime operations available to a running actor.
pub trait ServiceContext {
    /// Handle of the actor this context belongs to.
    fn handle(&self) -> Handle;

    /// Sends `payload` to `destination` with this actor as the source.
    ///
    /// A negative `session` allocates a fresh positive session from this
    /// actor's counter. Returns the session actually used.
    fn send(&self, destination: &Address, session: i32, payload: Vec<u8>) -> Result<i32, SendError>;

    /// Registers the actor's message callback. Fails if one is already set.
    fn set_callback(&self, behavior: Box<dyn ActorBehavior>) -> Result<(), CallbackError>;

    /// Executes a control-plane command on behalf of this actor.
    fn command(&self, command: Command) -> Result<CommandReply, CommandError>;

    /// Parses and executes a textual command such as `("TIMEOUT", "5:42")`.
    fn command_str(&self, command: &str, arg: &str) -> Result<CommandReply, CommandError> {
        self.command(Command::parse(command, arg)?)
    }

    /// Schedules a timer message back to this actor after `ticks` ticks.
    fn timeout(&self, ticks: u32, session: i32) -> Result<(), CommandError> {
        self.command(Command::Timeout { ticks, session }).map(|_| ())
    }

    /// Retires this actor.
    fn exit(&self) -> Result<(), CommandError> {
        self.command(Command::Exit).map(|_| ())
    }
}
