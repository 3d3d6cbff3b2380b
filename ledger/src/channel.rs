//! # Value Transfer Channel
//!
//! The ledger keeps the books; the channel moves the value. Two directions:
//!
//! - **Inbound**: the host reports who called and how much value came with
//!   the call as an [`InboundCall`]. The ledger never pulls value in.
//! - **Outbound**: on withdrawal the ledger pushes value to the caller via
//!   [`ValueTransferChannel::send`] and learns synchronously whether it
//!   landed.
//!
//! [`MemoryChannel`] is an in-process channel that records every payout.
//! Hosts embedding the ledger in tests or simulations use it directly.

use std::collections::{HashMap, HashSet};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::TransferError;
use crate::types::{Amount, Identity};

// ---------------------------------------------------------------------------
// Inbound
// ---------------------------------------------------------------------------

/// An inbound call as reported by the host: the authenticated caller and
/// the value that accompanied the call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundCall {
    /// Who made the call.
    pub caller: Identity,
    /// Native value sent along with the call. Zero for plain calls.
    pub value: Amount,
}

impl InboundCall {
    /// A call that carries value.
    pub fn with_value(caller: impl Into<Identity>, value: Amount) -> Self {
        Self {
            caller: caller.into(),
            value,
        }
    }

    /// A call that carries no value.
    pub fn plain(caller: impl Into<Identity>) -> Self {
        Self::with_value(caller, 0)
    }
}

// ---------------------------------------------------------------------------
// Outbound
// ---------------------------------------------------------------------------

/// Pushes value out of custody.
///
/// Implementations may block, and may call back into the ledger that
/// invoked them. The ledger guarantees the caller's vault has already been
/// debited when `send` runs.
pub trait ValueTransferChannel: Send + Sync {
    /// Transfers `amount` to `to`. Returns once the outcome is known.
    fn send(&self, to: &Identity, amount: Amount) -> Result<(), TransferError>;
}

impl<C: ValueTransferChannel + ?Sized> ValueTransferChannel for std::sync::Arc<C> {
    fn send(&self, to: &Identity, amount: Amount) -> Result<(), TransferError> {
        (**self).send(to, amount)
    }
}

// ---------------------------------------------------------------------------
// MemoryChannel
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct MemoryChannelState {
    paid: HashMap<Identity, Amount>,
    transfers: Vec<(Identity, Amount)>,
    refusing: HashSet<Identity>,
    offline: bool,
}

/// In-memory [`ValueTransferChannel`] that records payouts.
///
/// Individual recipients can be made to refuse transfers, or the whole
/// channel can be taken offline, to exercise the ledger's failure path.
#[derive(Debug, Default)]
pub struct MemoryChannel {
    state: Mutex<MemoryChannelState>,
}

impl MemoryChannel {
    /// Creates an online channel with no recorded transfers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every future transfer to `identity` fail with
    /// [`TransferError::Rejected`].
    pub fn refuse(&self, identity: &Identity) {
        self.state.lock().refusing.insert(identity.clone());
    }

    /// Lets `identity` receive transfers again.
    pub fn accept(&self, identity: &Identity) {
        self.state.lock().refusing.remove(identity);
    }

    /// Toggles whether the channel is reachable at all.
    pub fn set_offline(&self, offline: bool) {
        self.state.lock().offline = offline;
    }

    /// Total value successfully pushed to `identity`.
    pub fn paid_to(&self, identity: &Identity) -> Amount {
        self.state.lock().paid.get(identity).copied().unwrap_or(0)
    }

    /// Every successful transfer, in order.
    pub fn transfers(&self) -> Vec<(Identity, Amount)> {
        self.state.lock().transfers.clone()
    }
}

impl ValueTransferChannel for MemoryChannel {
    fn send(&self, to: &Identity, amount: Amount) -> Result<(), TransferError> {
        let mut state = self.state.lock();

        if state.offline {
            return Err(TransferError::Unavailable);
        }
        if state.refusing.contains(to) {
            return Err(TransferError::Rejected {
                reason: format!("recipient {to} refused transfer"),
            });
        }

        *state.paid.entry(to.clone()).or_insert(0) += amount;
        state.transfers.push((to.clone(), amount));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_successful_transfers() {
        let channel = MemoryChannel::new();
        let alice = Identity::new("alice");

        channel.send(&alice, 40).unwrap();
        channel.send(&alice, 60).unwrap();

        assert_eq!(channel.paid_to(&alice), 100);
        assert_eq!(channel.transfers().len(), 2);
    }

    #[test]
    fn refused_recipient_gets_nothing() {
        let channel = MemoryChannel::new();
        let bob = Identity::new("bob");
        channel.refuse(&bob);

        let result = channel.send(&bob, 10);
        assert!(matches!(result, Err(TransferError::Rejected { .. })));
        assert_eq!(channel.paid_to(&bob), 0);

        channel.accept(&bob);
        channel.send(&bob, 10).unwrap();
        assert_eq!(channel.paid_to(&bob), 10);
    }

    #[test]
    fn offline_channel_is_unavailable() {
        let channel = MemoryChannel::new();
        channel.set_offline(true);
        assert_eq!(
            channel.send(&Identity::new("carol"), 1),
            Err(TransferError::Unavailable)
        );
        assert!(channel.transfers().is_empty());
    }

    #[test]
    fn inbound_call_constructors() {
        let call = InboundCall::with_value("alice", 300);
        assert_eq!(call.caller, Identity::new("alice"));
        assert_eq!(call.value, 300);
        assert_eq!(InboundCall::plain("alice").value, 0);
    }
}
