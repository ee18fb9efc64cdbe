//! # Addresses
//!
//! A destination is either a numeric handle or a name bound in the runtime's
//! name registry. The textual grammar is `:XXXXXXXX` for handles (hex) and
//! `.name` for bound names; a bare string without either prefix is read as a
//! name.

use std::fmt;
use std::str::FromStr;

use crate::errors::AddressError;
use crate::types::Handle;

/// Message destination.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Address {
    Handle(Handle),
    Name(String),
}

impl Address {
    /// Builds a name address without parsing.
    pub fn name(name: impl Into<String>) -> Self {
        Address::Name(name.into())
    }

    /// Returns the handle if this address is numeric.
    pub fn as_handle(&self) -> Option<Handle> {
        match self {
            Address::Handle(handle) => Some(*handle),
            Address::Name(_) => None,
        }
    }
}

impl From<Handle> for Address {
    fn from(handle: Handle) -> Self {
        Address::Handle(handle)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Address::Handle(handle) => write!(f, "{}", handle),
            Address::Name(name) => write!(f, ".{}", name),
        }
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(AddressError::Empty);
        }
        if s.starts_with(':') {
            return s.parse::<Handle>().map(Address::Handle);
        }
        let name = s.strip_prefix('.').unwrap_or(s);
        if name.is_empty() {
            return Err(AddressError::Malformed(s.to_string()));
        }
        Ok(Address::Name(name.to_string()))
    }
}
