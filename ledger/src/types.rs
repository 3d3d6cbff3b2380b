//! Primitive ledger types.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Native value in smallest units. The ledger never divides.
pub type Amount = u64;

/// Monotonic operation counter.
pub type Counter = u64;

/// The owner of a vault.
///
/// Opaque to the ledger: whatever the host uses to authenticate a caller
/// (an address, a hex public key, an account handle) is wrapped as-is.
/// A caller only ever touches its own vault, so equality is the only
/// property the ledger relies on.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(String);

impl Identity {
    /// Wraps a caller identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Identity {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for Identity {
    fn from(id: String) -> Self {
        Self(id)
    }
}
