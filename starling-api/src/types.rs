//! # Core Value Types
//!
//! Handles, sessions and messages shared by every Starling component.

use std::fmt;
use std::str::FromStr;

use crate::errors::AddressError;

/// Session value a sender passes to request a freshly allocated session.
///
/// Any negative session has the same meaning; this constant is the
/// conventional spelling.
pub const ALLOCATE_SESSION: i32 = -1;

/// Opaque identifier of one registered actor.
///
/// Handles are issued by the runtime's handle table. A numeric value is never
/// issued twice while a previous holder of the same value is still live, and
/// the value `0` is never issued at all.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Handle(u32);

impl Handle {
    /// Wraps a raw handle value.
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Returns the raw numeric value.
    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl From<u32> for Handle {
    fn from(raw: u32) -> Self {
        Self(raw)
    }
}

/// Renders the textual handle form `:XXXXXXXX`.
impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, ":{:08X}", self.0)
    }
}

impl FromStr for Handle {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s
            .strip_prefix(':')
            .ok_or_else(|| AddressError::Malformed(s.to_string()))?;
        if digits.is_empty() {
            return Err(AddressError::Malformed(s.to_string()));
        }
        u32::from_str_radix(digits, 16)
            .map(Handle)
            .map_err(|_| AddressError::Malformed(s.to_string()))
    }
}

/// A message travelling through the runtime.
///
/// The payload is exclusively owned by the message until it is delivered, at
/// which point ownership moves into the receiving actor's callback.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Message {
    /// Sending actor, or `None` for messages originating from the runtime
    /// itself (timer expiries).
    pub source: Option<Handle>,
    /// Correlation id for request/response matching.
    pub session: i32,
    /// Message body. Empty for timer expiries.
    pub payload: Vec<u8>,
}

impl Message {
    pub fn new(source: Option<Handle>, session: i32, payload: Vec<u8>) -> Self {
        Self {
            source,
            session,
            payload,
        }
    }

    /// The zero-payload message a timer delivers when it expires.
    pub fn timer_expiry(session: i32) -> Self {
        Self {
            source: None,
            session,
            payload: Vec::new(),
        }
    }

    /// True for messages injected by the runtime rather than another actor.
    pub fn is_system(&self) -> bool {
        self.source.is_none()
    }

    /// Length of the payload in bytes.
    pub fn size(&self) -> usize {
        self.payload.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_display_is_padded_hex() {
        assert_eq!(Handle::new(10).to_string(), ":0000000A");
        assert_eq!(Handle::new(0xDEADBEEF).to_string(), ":DEADBEEF");
    }

    #[test]
    fn test_handle_parse() {
        assert_eq!(":0000000A".parse::<Handle>().unwrap(), Handle::new(10));
        assert_eq!(":ff".parse::<Handle>().unwrap(), Handle::new(255));
        assert!("0000000A".parse::<Handle>().is_err());
        assert!(":".parse::<Handle>().is_err());
        assert!(":xyz".parse::<Handle>().is_err());
    }

    #[test]
    fn test_timer_expiry_message() {
        let msg = Message::timer_expiry(42);
        assert!(msg.is_system());
        assert_eq!(msg.session, 42);
        assert_eq!(msg.size(), 0);
    }
}
