//! # Control-Plane Commands
//!
//! The small command vocabulary an actor uses to talk to the runtime:
//!
//! | Keyword   | Argument          | Effect                                         |
//! |-----------|-------------------|------------------------------------------------|
//! | `REG`     | `""` or a name    | Returns own handle, or binds the name          |
//! | `EXIT`    | ignored           | Retires the calling actor                      |
//! | `NOW`     | ignored           | Returns the current tick count                 |
//! | `TIMEOUT` | `"ticks:session"` | Delivers a message to self after `ticks` ticks |
//! | `LAUNCH`  | `"module args"`   | Creates a new actor and returns its handle     |

use std::fmt;

use crate::errors::CommandError;
use crate::types::Handle;

/// A parsed control-plane command.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    /// Bind a name to the caller, or query the caller's own handle when `None`.
    Reg(Option<String>),
    /// Retire the caller.
    Exit,
    /// Read the current tick count.
    Now,
    /// Schedule a timer message back to the caller.
    Timeout { ticks: u32, session: i32 },
    /// Create a new actor from a module.
    Launch { module: String, args: String },
}

impl Command {
    /// Parses the textual `(command, argument)` form.
    pub fn parse(command: &str, arg: &str) -> Result<Self, CommandError> {
        match command {
            "REG" => {
                let name = arg.trim();
                if name.is_empty() {
                    Ok(Command::Reg(None))
                } else {
                    Ok(Command::Reg(Some(name.strip_prefix('.').unwrap_or(name).to_string())))
                }
            }
            "EXIT" => Ok(Command::Exit),
            "NOW" => Ok(Command::Now),
            "TIMEOUT" => {
                let (ticks, session) = arg
                    .split_once(':')
                    .ok_or_else(|| invalid(command, "expected `ticks:session`"))?;
                let ticks = ticks
                    .trim()
                    .parse::<u32>()
                    .map_err(|e| invalid(command, &format!("bad tick count: {}", e)))?;
                let session = session
                    .trim()
                    .parse::<i32>()
                    .map_err(|e| invalid(command, &format!("bad session: {}", e)))?;
                Ok(Command::Timeout { ticks, session })
            }
            "LAUNCH" => {
                let arg = arg.trim_start();
                let (module, args) = match arg.split_once(|c: char| c.is_ascii_whitespace()) {
                    Some((module, rest)) => (module, rest.trim()),
                    None => (arg, ""),
                };
                if module.is_empty() {
                    return Err(invalid(command, "missing module name"));
                }
                Ok(Command::Launch {
                    module: module.to_string(),
                    args: args.to_string(),
                })
            }
            other => Err(CommandError::UnknownCommand(other.to_string())),
        }
    }

    /// The command keyword.
    pub fn keyword(&self) -> &'static str {
        match self {
            Command::Reg(_) => "REG",
            Command::Exit => "EXIT",
            Command::Now => "NOW",
            Command::Timeout { .. } => "TIMEOUT",
            Command::Launch { .. } => "LAUNCH",
        }
    }
}

fn invalid(command: &str, reason: &str) -> CommandError {
    CommandError::InvalidArgument {
        command: command.to_string(),
        reason: reason.to_string(),
    }
}

/// Result of a successfully executed command.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CommandReply {
    /// The command has no result value.
    Done,
    /// A handle, from `REG ""` or `LAUNCH`.
    Handle(Handle),
    /// The name that was bound by `REG name`.
    Name(String),
    /// Current tick count from `NOW`.
    Now(u32),
}

/// Renders the textual result form (`""`, `:XXXXXXXX`, the name, or ticks).
impl fmt::Display for CommandReply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandReply::Done => Ok(()),
            CommandReply::Handle(handle) => write!(f, "{}", handle),
            CommandReply::Name(name) => write!(f, "{}", name),
            CommandReply::Now(ticks) => write!(f, "{}", ticks),
        }
    }
}
