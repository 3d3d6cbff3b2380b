//! Property-based tests for ledger invariants
//!
//! These tests use proptest to verify, for arbitrary operation sequences:
//! - Conservation: total_vaulted == Σ(balances) after every step
//! - Ceiling: total_vaulted never exceeds the global cap
//! - Per-operation cap: no single payout exceeds it
//! - Failed operations leave state and audit log untouched
//! - Replaying the audit log reproduces the live balances

use custody_ledger::{replay, Amount, Identity, MemoryChannel, VaultError, VaultLedger};
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Step {
    Deposit { who: usize, amount: Amount },
    Withdraw { who: usize, amount: Amount },
    ToggleRefusal { who: usize },
}

const IDENTITIES: usize = 4;

fn identity(who: usize) -> Identity {
    Identity::new(format!("vault-{who}"))
}

/// Strategy for generating caps with per_operation_cap <= global_cap
fn caps_strategy() -> impl Strategy<Value = (Amount, Amount)> {
    (1u64..10_000).prop_flat_map(|global| (1..=global, Just(global)))
}

/// Strategy for generating amounts, biased toward the interesting edges
fn amount_strategy() -> impl Strategy<Value = Amount> {
    prop_oneof![
        Just(0u64),
        1u64..500,
        500u64..20_000,
        Just(u64::MAX),
    ]
}

fn step_strategy() -> impl Strategy<Value = Step> {
    prop_oneof![
        4 => (0..IDENTITIES, amount_strategy())
            .prop_map(|(who, amount)| Step::Deposit { who, amount }),
        4 => (0..IDENTITIES, amount_strategy())
            .prop_map(|(who, amount)| Step::Withdraw { who, amount }),
        1 => (0..IDENTITIES).prop_map(|who| Step::ToggleRefusal { who }),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn books_balance_after_every_step(
        (per_op, global) in caps_strategy(),
        steps in prop::collection::vec(step_strategy(), 1..60),
    ) {
        let vault = VaultLedger::with_caps(per_op, global, MemoryChannel::new()).unwrap();
        let mut refusing = [false; IDENTITIES];

        for step in steps {
            let before = vault.snapshot();
            let result = match step {
                Step::Deposit { who, amount } => vault.deposit(&identity(who), amount),
                Step::Withdraw { who, amount } => vault.withdraw(&identity(who), amount),
                Step::ToggleRefusal { who } => {
                    refusing[who] = !refusing[who];
                    if refusing[who] {
                        vault.channel().refuse(&identity(who));
                    } else {
                        vault.channel().accept(&identity(who));
                    }
                    continue;
                }
            };

            let after = vault.snapshot();
            prop_assert_eq!(after.balances_sum(), u128::from(after.total_vaulted));
            prop_assert!(after.total_vaulted <= global);
            prop_assert_eq!(after.in_flight, 0);

            if result.is_err() {
                prop_assert_eq!(&after.balances, &before.balances);
                prop_assert_eq!(after.total_vaulted, before.total_vaulted);
                prop_assert_eq!(after.deposit_count, before.deposit_count);
                prop_assert_eq!(after.withdraw_count, before.withdraw_count);
                prop_assert_eq!(after.audit_len, before.audit_len);
            } else {
                prop_assert_eq!(after.audit_len, before.audit_len + 1);
            }
        }

        for (_, amount) in vault.channel().transfers() {
            prop_assert!(amount <= per_op);
        }

        let replayed = replay(&vault.audit_log());
        prop_assert_eq!(replayed, Ok(vault.snapshot().balances));
    }

    #[test]
    fn zero_deposit_always_rejected(
        (per_op, global) in caps_strategy(),
        seed in 0u64..1_000,
    ) {
        let vault = VaultLedger::with_caps(per_op, global, MemoryChannel::new()).unwrap();
        let who = identity(0);
        let _ = vault.deposit(&who, seed.min(global).max(1));
        let before = vault.snapshot();

        prop_assert!(matches!(vault.deposit(&who, 0), Err(VaultError::ZeroAmount)));

        let after = vault.snapshot();
        prop_assert_eq!(after.balances, before.balances);
        prop_assert_eq!(after.deposit_count, before.deposit_count);
    }

    #[test]
    fn overdraft_always_rejected(
        deposit in 1u64..1_000,
        excess in 1u64..1_000,
    ) {
        let vault = VaultLedger::with_caps(10_000, 10_000, MemoryChannel::new()).unwrap();
        let who = identity(1);
        vault.deposit(&who, deposit).unwrap();

        let result = vault.withdraw(&who, deposit + excess);
        let is_insufficient = matches!(
            result,
            Err(VaultError::InsufficientBalance { available, requested })
                if available == deposit && requested == deposit + excess
        );
        prop_assert!(is_insufficient);
        prop_assert_eq!(vault.balance_of(&who), deposit);
        prop_assert_eq!(vault.withdraw_count(), 0);
    }

    #[test]
    fn withdrawals_above_cap_rejected_regardless_of_balance(
        per_op in 1u64..1_000,
        over in 1u64..1_000,
    ) {
        let vault = VaultLedger::with_caps(per_op, 1_000_000, MemoryChannel::new()).unwrap();
        let who = identity(2);
        vault.deposit(&who, 1_000_000).unwrap();

        let is_capped = matches!(
            vault.withdraw(&who, per_op + over),
            Err(VaultError::PerOperationCapExceeded { .. })
        );
        prop_assert!(is_capped);
        prop_assert!(vault.channel().transfers().is_empty());
    }

    #[test]
    fn invalid_caps_never_construct(
        per_op in 0u64..1_000,
        global in 0u64..1_000,
    ) {
        let result = VaultLedger::with_caps(per_op, global, MemoryChannel::new());
        let valid = per_op > 0 && global > 0 && per_op <= global;
        prop_assert_eq!(result.is_ok(), valid);
    }
}
