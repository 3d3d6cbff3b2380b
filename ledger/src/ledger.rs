//! # Vault Ledger
//!
//! The accounting state machine. A [`VaultLedger`] owns every vault balance,
//! the aggregate `total_vaulted`, the operation counters and the audit log,
//! all behind one `parking_lot::ReentrantMutex`.
//!
//! ## Withdrawal ordering
//!
//! ```text
//! lock ─ checks ─ debit vault, total, +in_flight, +withdraw_count, transferring
//!        │
//!        └─ channel.send(caller, amount)     (lock held, state not borrowed)
//!
//!      ─ -in_flight, clear transferring ─┬─ Ok  → append Withdrawn record
//!                                        └─ Err → re-credit vault, total,
//!                                                 -withdraw_count
//! unlock
//! ```
//!
//! The vault is debited before value leaves custody, and the lock is held
//! until the transfer settles, so other threads never observe a half-done
//! withdrawal. The channel runs on the locking thread and may call back
//! into the ledger: reads see the post-debit balance, while deposits and
//! withdrawals are refused with [`VaultError::ReentrantCall`]. Nothing else
//! commits between a debit and its audit record, so replaying the audit
//! trail reproduces every recorded balance.
//!
//! A channel that panics is treated as [`TransferError::Unavailable`] and
//! the withdrawal is rolled back like any other failed transfer.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::panic::{self, AssertUnwindSafe};

use chrono::{DateTime, Utc};
use parking_lot::ReentrantMutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::audit::{AuditEvent, AuditLog, AuditRecord};
use crate::channel::{InboundCall, ValueTransferChannel};
use crate::config::LedgerConfig;
use crate::error::{TransferError, VaultError};
use crate::metrics::VaultMetrics;
use crate::types::{Amount, Counter, Identity};

// ---------------------------------------------------------------------------
// Operations
// ---------------------------------------------------------------------------

/// Operation selector carried by an inbound call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operation {
    /// Credit the value attached to the call to the caller's vault.
    Deposit,
    /// Move `amount` out of the caller's vault back to the caller.
    Withdraw {
        /// Value to withdraw.
        amount: Amount,
    },
}

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct LedgerState {
    balances: HashMap<Identity, Amount>,
    total_vaulted: Amount,
    in_flight: Amount,
    deposit_count: Counter,
    withdraw_count: Counter,
    audit: AuditLog,
    /// Set while a withdrawal's transfer is pending.
    transferring: bool,
}

impl LedgerState {
    fn balance_of(&self, identity: &Identity) -> Amount {
        self.balances.get(identity).copied().unwrap_or(0)
    }
}

/// Point-in-time copy of a ledger's state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    /// The ledger's caps.
    pub config: LedgerConfig,
    /// Every vault that has ever been credited, including emptied ones.
    pub balances: BTreeMap<Identity, Amount>,
    /// Value held in custody.
    pub total_vaulted: Amount,
    /// Value debited by a withdrawal still awaiting its transfer.
    pub in_flight: Amount,
    /// Committed deposits.
    pub deposit_count: Counter,
    /// Withdrawals debited (including one still in flight).
    pub withdraw_count: Counter,
    /// Length of the audit log.
    pub audit_len: usize,
    /// When the snapshot was taken.
    pub taken_at: DateTime<Utc>,
}

impl LedgerSnapshot {
    /// Sum of all vault balances. Equals `total_vaulted` on a healthy ledger.
    pub fn balances_sum(&self) -> u128 {
        self.balances.values().map(|b| u128::from(*b)).sum()
    }
}

// ---------------------------------------------------------------------------
// VaultLedger
// ---------------------------------------------------------------------------

/// Custodial ledger with a per-withdrawal cap and a global custody ceiling.
///
/// Every operation takes `&self`; share a ledger across threads with `Arc`.
pub struct VaultLedger<C> {
    config: LedgerConfig,
    // Reentrant so the channel can read the ledger from inside a withdrawal.
    // A `RefMut` is never held across `channel.send`.
    state: ReentrantMutex<RefCell<LedgerState>>,
    channel: C,
    metrics: VaultMetrics,
}

impl<C: ValueTransferChannel> VaultLedger<C> {
    /// Creates an empty ledger over an already-validated config.
    pub fn new(config: LedgerConfig, channel: C) -> Self {
        info!(
            per_operation_cap = config.per_operation_cap(),
            global_cap = config.global_cap(),
            "vault ledger constructed"
        );
        Self {
            config,
            state: ReentrantMutex::new(RefCell::new(LedgerState::default())),
            channel,
            metrics: VaultMetrics::new(),
        }
    }

    /// Validates the caps and creates an empty ledger.
    ///
    /// # Errors
    ///
    /// Same as [`LedgerConfig::new`]: [`VaultError::ZeroCap`] or
    /// [`VaultError::CapExceedsGlobal`].
    pub fn with_caps(
        per_operation_cap: Amount,
        global_cap: Amount,
        channel: C,
    ) -> Result<Self, VaultError> {
        let config = LedgerConfig::new(per_operation_cap, global_cap)?;
        Ok(Self::new(config, channel))
    }

    // -----------------------------------------------------------------------
    // Mutations
    // -----------------------------------------------------------------------

    /// Credits `amount` to `caller`'s vault and returns the new balance.
    ///
    /// The value is assumed to have arrived with the call already; the
    /// ledger performs no transfer of its own here.
    ///
    /// # Errors
    ///
    /// Checked in order, before any state changes:
    ///
    /// 1. [`VaultError::ReentrantCall`] if called from inside a pending
    ///    withdrawal transfer.
    /// 2. [`VaultError::ZeroAmount`] if `amount` is 0.
    /// 3. [`VaultError::GlobalCapExceeded`] if accepting it would take
    ///    `total_vaulted` past the global cap.
    pub fn deposit(&self, caller: &Identity, amount: Amount) -> Result<Amount, VaultError> {
        let guard = self.state.lock();
        let mut state = guard.borrow_mut();

        if state.transferring {
            let err = VaultError::ReentrantCall {
                operation: "deposit",
            };
            return Err(self.rejected("deposit", caller, amount, err));
        }

        if amount == 0 {
            return Err(self.rejected("deposit", caller, amount, VaultError::ZeroAmount));
        }

        let within_cap = state
            .total_vaulted
            .checked_add(amount)
            .is_some_and(|next| next <= self.config.global_cap());
        if !within_cap {
            let err = VaultError::GlobalCapExceeded {
                total_vaulted: state.total_vaulted,
                amount,
                global_cap: self.config.global_cap(),
            };
            return Err(self.rejected("deposit", caller, amount, err));
        }

        // Bounded by the cap check above, so none of these can overflow.
        let balance = state.balances.entry(caller.clone()).or_insert(0);
        *balance += amount;
        let new_balance = *balance;
        state.total_vaulted += amount;
        state.deposit_count = state.deposit_count.saturating_add(1);

        let sequence = state.audit.append(AuditEvent::Deposited {
            caller: caller.clone(),
            amount,
            new_balance,
        });

        self.metrics.deposits_total.inc();
        self.metrics
            .total_vaulted
            .set(gauge_value(state.total_vaulted));

        info!(
            caller = %caller,
            amount,
            new_balance,
            total_vaulted = state.total_vaulted,
            sequence,
            "deposited"
        );

        Ok(new_balance)
    }

    /// Debits `amount` from `caller`'s vault, transfers it to `caller`
    /// through the channel and returns the new balance.
    ///
    /// # Errors
    ///
    /// Checked in order, before any state changes:
    ///
    /// 1. [`VaultError::ReentrantCall`] if called from inside a pending
    ///    withdrawal transfer.
    /// 2. [`VaultError::ZeroAmount`] if `amount` is 0.
    /// 3. [`VaultError::PerOperationCapExceeded`] if `amount` is above the
    ///    per-operation cap.
    /// 4. [`VaultError::InsufficientBalance`] if the vault holds less.
    ///
    /// After the debit, [`VaultError::TransferFailed`] if the channel
    /// reports failure or panics. The debit is reversed before returning.
    pub fn withdraw(&self, caller: &Identity, amount: Amount) -> Result<Amount, VaultError> {
        // Held until the transfer settles; other threads queue here.
        let guard = self.state.lock();

        let new_balance = {
            let mut state = guard.borrow_mut();

            if state.transferring {
                let err = VaultError::ReentrantCall {
                    operation: "withdraw",
                };
                return Err(self.rejected("withdraw", caller, amount, err));
            }

            if amount == 0 {
                return Err(self.rejected("withdraw", caller, amount, VaultError::ZeroAmount));
            }

            let per_operation_cap = self.config.per_operation_cap();
            if amount > per_operation_cap {
                let err = VaultError::PerOperationCapExceeded {
                    amount,
                    per_operation_cap,
                };
                return Err(self.rejected("withdraw", caller, amount, err));
            }

            let available = state.balance_of(caller);
            if amount > available {
                let err = VaultError::InsufficientBalance {
                    available,
                    requested: amount,
                };
                return Err(self.rejected("withdraw", caller, amount, err));
            }

            let new_balance = available - amount;
            state.balances.insert(caller.clone(), new_balance);
            state.total_vaulted -= amount;
            state.in_flight += amount;
            state.withdraw_count = state.withdraw_count.saturating_add(1);
            state.transferring = true;

            self.metrics
                .total_vaulted
                .set(gauge_value(state.total_vaulted));
            self.metrics.in_flight.set(gauge_value(state.in_flight));

            new_balance
        };

        debug!(caller = %caller, amount, new_balance, "vault debited, transferring out");
        let outcome = self.transfer_out(caller, amount);

        let mut state = guard.borrow_mut();
        state.transferring = false;
        state.in_flight -= amount;
        self.metrics.in_flight.set(gauge_value(state.in_flight));

        match outcome {
            Ok(()) => {
                let sequence = state.audit.append(AuditEvent::Withdrawn {
                    caller: caller.clone(),
                    amount,
                    new_balance,
                });
                self.metrics.withdrawals_total.inc();

                info!(
                    caller = %caller,
                    amount,
                    new_balance,
                    total_vaulted = state.total_vaulted,
                    sequence,
                    "withdrawn"
                );
                Ok(new_balance)
            }
            Err(transfer_err) => {
                // Nothing else committed while the transfer was pending, so
                // the re-credit lands exactly where the debit started.
                *state.balances.entry(caller.clone()).or_insert(0) += amount;
                state.total_vaulted += amount;
                state.withdraw_count = state.withdraw_count.saturating_sub(1);

                self.metrics
                    .total_vaulted
                    .set(gauge_value(state.total_vaulted));
                self.metrics.transfer_failures_total.inc();

                warn!(
                    caller = %caller,
                    amount,
                    restored_balance = state.balance_of(caller),
                    error = %transfer_err,
                    "outbound transfer failed, withdrawal rolled back"
                );
                Err(VaultError::TransferFailed(transfer_err))
            }
        }
    }

    /// Catch-all for value sent without selecting an operation.
    ///
    /// # Errors
    ///
    /// Always [`VaultError::DirectTransferNotAllowed`].
    pub fn receive(&self, call: &InboundCall) -> Result<Amount, VaultError> {
        let err = VaultError::DirectTransferNotAllowed { value: call.value };
        Err(self.rejected("receive", &call.caller, call.value, err))
    }

    /// Routes an inbound call to the selected operation.
    ///
    /// `Deposit` credits the value attached to the call. `Withdraw` must not
    /// carry value; value attached to it is value arriving outside the
    /// deposit path. No selector at all falls through to [`receive`](Self::receive).
    pub fn dispatch(
        &self,
        call: &InboundCall,
        operation: Option<Operation>,
    ) -> Result<Amount, VaultError> {
        match operation {
            Some(Operation::Deposit) => self.deposit(&call.caller, call.value),
            Some(Operation::Withdraw { .. }) if call.value != 0 => self.receive(call),
            Some(Operation::Withdraw { amount }) => self.withdraw(&call.caller, amount),
            None => self.receive(call),
        }
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// Balance of `identity`'s vault. Zero for identities never seen.
    pub fn balance_of(&self, identity: &Identity) -> Amount {
        self.state.lock().borrow().balance_of(identity)
    }

    /// Value currently held in custody across all vaults.
    pub fn total_vaulted(&self) -> Amount {
        self.state.lock().borrow().total_vaulted
    }

    /// Value debited by a withdrawal whose transfer has not settled yet.
    pub fn in_flight(&self) -> Amount {
        self.state.lock().borrow().in_flight
    }

    /// Number of committed deposits.
    pub fn deposit_count(&self) -> Counter {
        self.state.lock().borrow().deposit_count
    }

    /// Number of withdrawals, excluding any rolled back.
    pub fn withdraw_count(&self) -> Counter {
        self.state.lock().borrow().withdraw_count
    }

    /// Maximum value a single withdrawal may move.
    pub fn per_operation_cap(&self) -> Amount {
        self.config.per_operation_cap()
    }

    /// Maximum value the ledger may custody.
    pub fn global_cap(&self) -> Amount {
        self.config.global_cap()
    }

    /// The ledger's caps.
    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// Copy of the audit trail, oldest first.
    pub fn audit_log(&self) -> Vec<AuditRecord> {
        self.state.lock().borrow().audit.records().to_vec()
    }

    /// Audit trail exported as newline-delimited JSON.
    pub fn audit_json_lines(&self) -> Result<String, serde_json::Error> {
        self.state.lock().borrow().audit.to_json_lines()
    }

    /// Consistent copy of the whole ledger state.
    pub fn snapshot(&self) -> LedgerSnapshot {
        let guard = self.state.lock();
        let state = guard.borrow();
        LedgerSnapshot {
            config: self.config,
            balances: state
                .balances
                .iter()
                .map(|(id, amount)| (id.clone(), *amount))
                .collect(),
            total_vaulted: state.total_vaulted,
            in_flight: state.in_flight,
            deposit_count: state.deposit_count,
            withdraw_count: state.withdraw_count,
            audit_len: state.audit.len(),
            taken_at: Utc::now(),
        }
    }

    /// The ledger's metrics.
    pub fn metrics(&self) -> &VaultMetrics {
        &self.metrics
    }

    /// The channel withdrawals are paid through.
    pub fn channel(&self) -> &C {
        &self.channel
    }

    // -----------------------------------------------------------------------
    // Internal Helpers
    // -----------------------------------------------------------------------

    /// Runs the channel, turning a panic into [`TransferError::Unavailable`].
    fn transfer_out(&self, to: &Identity, amount: Amount) -> Result<(), TransferError> {
        match panic::catch_unwind(AssertUnwindSafe(|| self.channel.send(to, amount))) {
            Ok(outcome) => outcome,
            Err(payload) => {
                let message = payload
                    .downcast_ref::<&str>()
                    .copied()
                    .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
                    .unwrap_or("<non-string panic payload>");
                error!(to = %to, amount, panic = message, "value transfer channel panicked");
                Err(TransferError::Unavailable)
            }
        }
    }

    fn rejected(
        &self,
        operation: &'static str,
        caller: &Identity,
        amount: Amount,
        err: VaultError,
    ) -> VaultError {
        self.metrics.reject(err.kind());
        warn!(operation, caller = %caller, amount, reason = err.kind(), "{err}");
        err
    }
}

impl<C> std::fmt::Debug for VaultLedger<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let guard = self.state.lock();
        let mut out = f.debug_struct("VaultLedger");
        out.field("config", &self.config);
        match guard.try_borrow() {
            Ok(state) => out.field("state", &*state),
            Err(_) => out.field("state", &"<borrowed>"),
        };
        out.finish_non_exhaustive()
    }
}

fn gauge_value(amount: Amount) -> i64 {
    i64::try_from(amount).unwrap_or(i64::MAX)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
