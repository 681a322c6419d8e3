use serde::{Deserialize, Serialize};

use super::Cents;

/// Opaque user identifier, resolved by a trusted caller.
pub type UserId = i64;

/// Per-user balance record: a spendable deposit account and a reserve
/// account holding funds earmarked for pending orders.
///
/// Both balances are non-negative at all observable times; the storage
/// layer enforces this with CHECK constraints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub user_id: UserId,
    /// Funds available for new reservations and withdrawals.
    pub deposit_cents: Cents,
    /// Funds earmarked against pending orders, no longer spendable.
    pub reserve_cents: Cents,
}

impl Account {
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            deposit_cents: 0,
            reserve_cents: 0,
        }
    }

    /// Total funds held for the user across both accounts.
    pub fn total_cents(&self) -> Cents {
        self.deposit_cents + self.reserve_cents
    }
}

/// A point-in-time balance snapshot returned by read-only queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    pub deposit_cents: Cents,
    pub reserve_cents: Cents,
}

impl From<Account> for Balance {
    fn from(account: Account) -> Self {
        Self {
            deposit_cents: account.deposit_cents,
            reserve_cents: account.reserve_cents,
        }
    }
}
