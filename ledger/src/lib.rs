// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Custody Ledger
//!
//! A custodial vault ledger for a single native value unit. Identities
//! deposit value into their own vault and withdraw it back out, one capped
//! withdrawal at a time, while the ledger as a whole never custodies more
//! than a fixed global ceiling.
//!
//! ## Architecture
//!
//! ```text
//! types.rs    — Identity, Amount, Counter
//! config.rs   — LedgerConfig: the two caps, validated once at construction
//! error.rs    — VaultError / TransferError taxonomy
//! channel.rs  — Value Transfer Channel: inbound call context, outbound push
//! audit.rs    — Append-only Deposited / Withdrawn records and replay
//! ledger.rs   — VaultLedger: the accounting state machine
//! metrics.rs  — Prometheus counters and gauges per ledger
//! logging.rs  — tracing subscriber setup for hosts and tests
//! ```
//!
//! ## Design Principles
//!
//! 1. Checks, then effects, then interactions. A withdrawal debits the
//!    vault before value leaves custody, and a failed transfer is undone
//!    by a compensating re-credit.
//! 2. All monetary arithmetic is checked. Money and wrapping arithmetic
//!    do not mix.
//! 3. One coarse reentrant lock over the whole ledger, held across the
//!    outbound transfer. Mutations attempted from inside a transfer are
//!    refused.
//! 4. Every successful mutation leaves exactly one audit record behind.
//!    Failures leave none. Replaying the records reproduces every balance.

pub mod audit;
pub mod channel;
pub mod config;
pub mod error;
pub mod ledger;
pub mod logging;
pub mod metrics;
pub mod types;

pub use audit::{replay, AuditEvent, AuditLog, AuditRecord, ReplayError};
pub use channel::{InboundCall, MemoryChannel, ValueTransferChannel};
pub use config::LedgerConfig;
pub use error::{TransferError, VaultError};
pub use ledger::{LedgerSnapshot, Operation, VaultLedger};
pub use metrics::VaultMetrics;
pub use types::{Amount, Counter, Identity};
