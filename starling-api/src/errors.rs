//! # Error Types
//!
//! Errors surfaced by the Starling interface layer. None of these represent a
//! crash: an undeliverable message, a name collision or a rejected callback
//! registration are all reported as values and handled locally by the caller.
//!
//! Resource exhaustion is deliberately absent. Allocation failure aborts the
//! process.

use thiserror::Error;

use crate::types::Handle;

/// Errors produced while parsing a textual address.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    #[error("Address is empty")]
    Empty,
    #[error("Malformed address: {0}")]
    Malformed(String),
}

/// Reasons a message could not be delivered.
///
/// The message itself has already been recorded as a dead letter by the time
/// the sender sees one of these.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SendError {
    #[error("No actor is bound to name: {0}")]
    UnknownName(String),
    #[error("No live actor for handle {0}")]
    UnknownHandle(Handle),
    #[error("Actor {0} is being destroyed")]
    Released(Handle),
    #[error("Invalid address: {0}")]
    InvalidAddress(#[from] AddressError),
    #[error("Runtime is shutting down")]
    ShuttingDown,
}

/// Errors from the name registry.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NameError {
    #[error("Name already exists: {0}")]
    AlreadyExists(String),
    #[error("Cannot bind a name to unknown handle {0}")]
    UnknownHandle(Handle),
    #[error("Name must not be empty")]
    Empty,
}

/// Errors from callback registration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CallbackError {
    #[error("Callback already registered for actor {0}")]
    AlreadySet(Handle),
}

/// Errors returned by a service instance's `init`.
#[derive(Error, Debug)]
pub enum InitError {
    #[error("Initialization failed: {0}")]
    Failed(String),
    #[error(transparent)]
    Callback(#[from] CallbackError),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// `CommandError` can wrap a `SpawnError`, which wraps an `InitError`, so these
// conversions go through `Other` instead of `#[from]` variants.
impl From<CommandError> for InitError {
    fn from(err: CommandError) -> Self {
        InitError::Other(err.into())
    }
}

impl From<SendError> for InitError {
    fn from(err: SendError) -> Self {
        InitError::Other(err.into())
    }
}

/// Errors produced while creating an actor.
#[derive(Error, Debug)]
pub enum SpawnError {
    #[error("Module not found: {0}")]
    ModuleNotFound(String),
    #[error("Module already registered: {0}")]
    ModuleExists(String),
    #[error("Module {module} failed to create an instance: {reason}")]
    CreateFailed { module: String, reason: String },
    #[error("Module {module} failed to initialize: {source}")]
    InitFailed {
        module: String,
        #[source]
        source: InitError,
    },
    #[error("Runtime is shutting down")]
    SystemShutdown,
}

/// Errors from the control-plane command vocabulary.
#[derive(Error, Debug)]
pub enum CommandError {
    #[error("Unknown command: {0}")]
    UnknownCommand(String),
    #[error("Invalid argument for {command}: {reason}")]
    InvalidArgument { command: String, reason: String },
    #[error(transparent)]
    Name(#[from] NameError),
    #[error(transparent)]
    Spawn(#[from] SpawnError),
    #[error(transparent)]
    Send(#[from] SendError),
}
