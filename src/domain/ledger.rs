use std::collections::HashMap;

use super::{Balance, EventKind, LedgerEntry, UserId};

const ZERO: Balance = Balance {
    deposit_cents: 0,
    reserve_cents: 0,
};

/// Apply one entry's effect to a running balance. The single place the
/// replay rule is written down.
fn apply_entry(entry: &LedgerEntry, balance: &mut Balance) {
    match entry.event {
        // Deposit credited or debited; the signed delta carries
        // the direction that the magnitude column dropped.
        EventKind::Add => balance.deposit_cents += entry.delta_cents(),
        // Deposit -> reserve, conserving the total.
        EventKind::Reserve => {
            balance.deposit_cents += entry.delta_cents();
            balance.reserve_cents += entry.amount_cents;
        }
        // Reserved funds withdrawn for good.
        EventKind::Take => balance.reserve_cents += entry.delta_cents(),
    }
}

/// Replay a user's ledger entries, in append order, from a zero balance.
/// The result must match the stored account; anything else means the
/// audit trail and the balance table have diverged.
pub fn replay_balances(entries: &[LedgerEntry]) -> Balance {
    let mut balance = ZERO;
    for entry in entries {
        apply_entry(entry, &mut balance);
    }
    balance
}

/// Replay a mixed-user entry stream into per-user balances.
pub fn replay_all_balances(entries: &[LedgerEntry]) -> HashMap<UserId, Balance> {
    let mut balances: HashMap<UserId, Balance> = HashMap::new();

    for entry in entries {
        apply_entry(entry, balances.entry(entry.user_id).or_insert(ZERO));
    }

    balances
}

/// Check that each entry's start snapshot matches the balance produced
/// by replaying everything before it. Returns the index of the first
/// entry that breaks the chain, if any.
pub fn find_chain_break(entries: &[LedgerEntry]) -> Option<usize> {
    let mut balance = ZERO;

    for (idx, entry) in entries.iter().enumerate() {
        let expected_start = match entry.event {
            EventKind::Add | EventKind::Reserve => balance.deposit_cents,
            EventKind::Take => balance.reserve_cents,
        };
        if entry.start_cents != expected_start {
            return Some(idx);
        }
        apply_entry(entry, &mut balance);
    }
    None
}
