//! # Audit Trail
//!
//! Every committed deposit and withdrawal appends one [`AuditRecord`]. The
//! log is append-only and ordered by commit: `sequence` starts at 0 and has
//! no gaps. Failed operations never reach the log.
//!
//! Replaying the records in sequence order from empty vaults reproduces
//! every recorded `new_balance`; [`replay`] checks exactly that.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::types::{Amount, Identity};

/// What happened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum AuditEvent {
    /// Value entered the caller's vault.
    Deposited {
        /// The depositing identity.
        caller: Identity,
        /// Value deposited.
        amount: Amount,
        /// The caller's balance right after the deposit.
        new_balance: Amount,
    },
    /// Value left the caller's vault and was transferred out.
    Withdrawn {
        /// The withdrawing identity.
        caller: Identity,
        /// Value withdrawn and transferred.
        amount: Amount,
        /// The caller's balance right after the debit.
        new_balance: Amount,
    },
}

impl AuditEvent {
    /// The identity that acted.
    pub fn caller(&self) -> &Identity {
        match self {
            AuditEvent::Deposited { caller, .. } | AuditEvent::Withdrawn { caller, .. } => caller,
        }
    }

    /// The amount moved.
    pub fn amount(&self) -> Amount {
        match self {
            AuditEvent::Deposited { amount, .. } | AuditEvent::Withdrawn { amount, .. } => *amount,
        }
    }
}

/// An immutable entry in the audit trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRecord {
    /// Position in the log.
    pub sequence: u64,
    /// Globally unique record identifier.
    pub record_id: Uuid,
    /// The event itself.
    pub event: AuditEvent,
    /// Commit time.
    pub recorded_at: DateTime<Utc>,
}

/// Append-only, ordered sequence of [`AuditRecord`]s.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuditLog {
    records: Vec<AuditRecord>,
}

impl AuditLog {
    /// Creates an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an event and returns its sequence number.
    pub(crate) fn append(&mut self, event: AuditEvent) -> u64 {
        // Sequence == index, so the log never has gaps.
        let sequence = self.records.len() as u64;
        self.records.push(AuditRecord {
            sequence,
            record_id: Uuid::new_v4(),
            event,
            recorded_at: Utc::now(),
        });
        sequence
    }

    /// All records, oldest first.
    pub fn records(&self) -> &[AuditRecord] {
        &self.records
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns `true` if nothing has been committed yet.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records that involve `caller`, oldest first.
    pub fn for_caller<'a>(
        &'a self,
        caller: &'a Identity,
    ) -> impl Iterator<Item = &'a AuditRecord> + 'a {
        self.records
            .iter()
            .filter(move |record| record.event.caller() == caller)
    }

    /// Replays the whole log. See [`replay`].
    pub fn replay(&self) -> Result<BTreeMap<Identity, Amount>, ReplayError> {
        replay(&self.records)
    }

    /// Exports the log as newline-delimited JSON, one record per line.
    pub fn to_json_lines(&self) -> Result<String, serde_json::Error> {
        let mut out = String::new();
        for record in &self.records {
            out.push_str(&serde_json::to_string(record)?);
            out.push('\n');
        }
        Ok(out)
    }
}

// ---------------------------------------------------------------------------
// Replay
// ---------------------------------------------------------------------------

/// A record that does not follow from the records before it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReplayError {
    /// Records are not in gap-free sequence order.
    #[error("expected sequence {expected}, found {found}")]
    OutOfOrder {
        /// The sequence number replay expected next.
        expected: u64,
        /// The sequence number found.
        found: u64,
    },

    /// The recorded balance differs from the replayed one.
    #[error("record {sequence}: recorded balance {recorded}, replayed {replayed:?}")]
    BalanceMismatch {
        /// The offending record.
        sequence: u64,
        /// `new_balance` as stored in the record.
        recorded: Amount,
        /// The balance replay arrived at, if it exists.
        replayed: Option<Amount>,
    },
}

/// Rebuilds vault balances from `records`, checking each record's
/// `new_balance` against the replayed balance.
pub fn replay<'a>(
    records: impl IntoIterator<Item = &'a AuditRecord>,
) -> Result<BTreeMap<Identity, Amount>, ReplayError> {
    let mut balances: BTreeMap<Identity, Amount> = BTreeMap::new();

    for (expected, record) in records.into_iter().enumerate() {
        let expected = expected as u64;
        if record.sequence != expected {
            return Err(ReplayError::OutOfOrder {
                expected,
                found: record.sequence,
            });
        }

        let (caller, replayed, recorded) = match &record.event {
            AuditEvent::Deposited {
                caller,
                amount,
                new_balance,
            } => {
                let current = balances.get(caller).copied().unwrap_or(0);
                (caller, current.checked_add(*amount), *new_balance)
            }
            AuditEvent::Withdrawn {
                caller,
                amount,
                new_balance,
            } => {
                let current = balances.get(caller).copied().unwrap_or(0);
                (caller, current.checked_sub(*amount), *new_balance)
            }
        };

        if replayed != Some(recorded) {
            return Err(ReplayError::BalanceMismatch {
                sequence: record.sequence,
                recorded,
                replayed,
            });
        }
        balances.insert(caller.clone(), recorded);
    }

    Ok(balances)
}
