//! # Error Taxonomy
//!
//! Four families, matching where in an operation's life a failure can
//! happen:
//!
//! - **configuration** — `ZeroCap`, `CapExceedsGlobal` (construction only)
//! - **admission** — `ZeroAmount`, `GlobalCapExceeded`,
//!   `PerOperationCapExceeded`, `InsufficientBalance` (checks, before any
//!   state is touched)
//! - **settlement** — `TransferFailed` (the outbound push of a withdrawal)
//! - **boundary** — `DirectTransferNotAllowed` (value arriving outside the
//!   deposit path), `ReentrantCall` (a mutation attempted from inside a
//!   pending transfer)
//!
//! None of them is fatal to the ledger. Retrying is the caller's business.

use thiserror::Error;

use crate::types::Amount;

// ---------------------------------------------------------------------------
// VaultError
// ---------------------------------------------------------------------------

/// Errors returned by ledger construction and operations.
#[derive(Debug, Error)]
pub enum VaultError {
    /// One of the configured caps is zero.
    #[error("caps must be non-zero")]
    ZeroCap,

    /// The per-operation cap is larger than the global cap.
    #[error("per-operation cap {per_operation_cap} exceeds global cap {global_cap}")]
    CapExceedsGlobal {
        /// The requested per-operation cap.
        per_operation_cap: Amount,
        /// The requested global cap.
        global_cap: Amount,
    },

    /// Zero-amount operations are not permitted.
    #[error("zero-amount operations are not permitted")]
    ZeroAmount,

    /// Accepting the deposit would push custodied value past the global cap.
    #[error(
        "global cap exceeded: {total_vaulted} vaulted + {amount} deposit > {global_cap} cap"
    )]
    GlobalCapExceeded {
        /// Value held in custody when the deposit arrived.
        total_vaulted: Amount,
        /// The rejected deposit.
        amount: Amount,
        /// The configured ceiling.
        global_cap: Amount,
    },

    /// A single withdrawal asked for more than the per-operation cap.
    #[error("per-operation cap exceeded: requested {amount}, cap {per_operation_cap}")]
    PerOperationCapExceeded {
        /// The rejected withdrawal amount.
        amount: Amount,
        /// The configured per-operation cap.
        per_operation_cap: Amount,
    },

    /// The caller's vault holds less than the requested withdrawal.
    #[error("insufficient balance: available {available}, requested {requested}")]
    InsufficientBalance {
        /// The caller's current balance.
        available: Amount,
        /// The amount that was requested.
        requested: Amount,
    },

    /// The outbound transfer failed. The debit has been rolled back.
    #[error("outbound transfer failed: {0}")]
    TransferFailed(#[source] TransferError),

    /// Value was sent to the ledger without selecting the deposit operation.
    #[error("direct transfer of {value} not allowed: value is accepted only through deposit")]
    DirectTransferNotAllowed {
        /// The value that accompanied the call.
        value: Amount,
    },

    /// A deposit or withdrawal arrived while a withdrawal's transfer was
    /// still pending on the same ledger.
    #[error("{operation} refused: a withdrawal transfer is in progress")]
    ReentrantCall {
        /// The refused operation.
        operation: &'static str,
    },
}

impl VaultError {
    /// Stable snake_case label, used as a log field and metric label.
    pub fn kind(&self) -> &'static str {
        match self {
            VaultError::ZeroCap => "zero_cap",
            VaultError::CapExceedsGlobal { .. } => "cap_exceeds_global",
            VaultError::ZeroAmount => "zero_amount",
            VaultError::GlobalCapExceeded { .. } => "global_cap_exceeded",
            VaultError::PerOperationCapExceeded { .. } => "per_operation_cap_exceeded",
            VaultError::InsufficientBalance { .. } => "insufficient_balance",
            VaultError::TransferFailed(_) => "transfer_failed",
            VaultError::DirectTransferNotAllowed { .. } => "direct_transfer_not_allowed",
            VaultError::ReentrantCall { .. } => "reentrant_call",
        }
    }
}

// ---------------------------------------------------------------------------
// TransferError
// ---------------------------------------------------------------------------

/// Failure reported by a [`ValueTransferChannel`](crate::channel::ValueTransferChannel)
/// when pushing value out of custody.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransferError {
    /// The recipient refused the transfer.
    #[error("transfer rejected: {reason}")]
    Rejected {
        /// Human-readable explanation from the channel.
        reason: String,
    },

    /// The channel could not attempt the transfer at all.
    #[error("transfer channel unavailable")]
    Unavailable,
}
