//! # Ledger Configuration
//!
//! The two caps that bound a ledger for its whole lifetime. They are
//! validated exactly once, in [`LedgerConfig::new`], and there is no setter
//! afterwards. Deserialization funnels through the same constructor, so a
//! malformed config document fails to load instead of producing a ledger
//! that violates `per_operation_cap <= global_cap`.

use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::error::VaultError;
use crate::types::Amount;

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

/// Default per-withdrawal cap for devnet ledgers.
pub const DEFAULT_PER_OPERATION_CAP: Amount = 1_000_000_000;

/// Default custody ceiling for devnet ledgers. 100x the per-operation cap.
pub const DEFAULT_GLOBAL_CAP: Amount = 100_000_000_000;

// ---------------------------------------------------------------------------
// LedgerConfig
// ---------------------------------------------------------------------------

/// Immutable caps for a [`VaultLedger`](crate::ledger::VaultLedger).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawLedgerConfig", into = "RawLedgerConfig")]
pub struct LedgerConfig {
    per_operation_cap: Amount,
    global_cap: Amount,
}

/// Wire shape of [`LedgerConfig`] before validation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawLedgerConfig {
    per_operation_cap: Amount,
    global_cap: Amount,
}

impl LedgerConfig {
    /// Validates and fixes the caps.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::ZeroCap`] if either cap is zero (the
    /// per-operation cap is checked first). Returns
    /// [`VaultError::CapExceedsGlobal`] if `per_operation_cap > global_cap`.
    pub fn new(per_operation_cap: Amount, global_cap: Amount) -> Result<Self, VaultError> {
        if per_operation_cap == 0 {
            return Err(VaultError::ZeroCap);
        }
        if global_cap == 0 {
            return Err(VaultError::ZeroCap);
        }
        if per_operation_cap > global_cap {
            return Err(VaultError::CapExceedsGlobal {
                per_operation_cap,
                global_cap,
            });
        }

        Ok(Self {
            per_operation_cap,
            global_cap,
        })
    }

    /// Maximum value a single withdrawal may move.
    pub fn per_operation_cap(&self) -> Amount {
        self.per_operation_cap
    }

    /// Maximum value the ledger may custody across all vaults.
    pub fn global_cap(&self) -> Amount {
        self.global_cap
    }

    /// Parses a JSON config document.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Reads and parses a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read ledger config: {}", path.display()))?;
        Self::from_json(&raw)
            .with_context(|| format!("invalid ledger config: {}", path.display()))
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            per_operation_cap: DEFAULT_PER_OPERATION_CAP,
            global_cap: DEFAULT_GLOBAL_CAP,
        }
    }
}

impl TryFrom<RawLedgerConfig> for LedgerConfig {
    type Error = VaultError;

    fn try_from(raw: RawLedgerConfig) -> Result<Self, Self::Error> {
        Self::new(raw.per_operation_cap, raw.global_cap)
    }
}

impl From<LedgerConfig> for RawLedgerConfig {
    fn from(config: LedgerConfig) -> Self {
        Self {
            per_operation_cap: config.per_operation_cap,
            global_cap: config.global_cap,
        }
    }
}
