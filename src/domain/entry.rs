use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Cents, UserId};

/// Kind of balance-changing event recorded in the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EventKind {
    /// Deposit account credited or debited (deposit / withdraw).
    Add,
    /// Funds moved from the deposit account into the reserve account.
    Reserve,
    /// Reserved funds permanently withdrawn (order confirmed).
    Take,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Add => "ADD",
            EventKind::Reserve => "RESERVE",
            EventKind::Take => "TAKE",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "ADD" => Some(EventKind::Add),
            "RESERVE" => Some(EventKind::Reserve),
            "TAKE" => Some(EventKind::Take),
            _ => None,
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An immutable audit record of a single balance mutation.
/// Entries are append-only: never updated, never deleted.
///
/// `start_cents`/`end_cents` snapshot the account the event affects:
/// the deposit account for `Add` and `Reserve`, the reserve account for
/// `Take`. `amount_cents` is always the non-negative magnitude moved;
/// for `Add` the direction survives in the signed `end - start` delta.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Auto-assigned by the ledger table, monotonically increasing in
    /// append order. Zero until persisted.
    pub id: i64,
    pub user_id: UserId,
    pub timestamp: DateTime<Utc>,
    /// Magnitude of the movement, always >= 0.
    pub amount_cents: Cents,
    pub start_cents: Cents,
    pub end_cents: Cents,
    pub event: EventKind,
    /// Free-text context, may embed a service/order reference.
    pub message: String,
}

impl LedgerEntry {
    /// Create an entry describing a transition, ready to be appended.
    /// The id is assigned by the repository on insert.
    pub fn new(
        user_id: UserId,
        event: EventKind,
        amount_cents: Cents,
        start_cents: Cents,
        end_cents: Cents,
        message: String,
    ) -> Self {
        debug_assert!(amount_cents >= 0, "ledger amount must be a magnitude");
        Self {
            id: 0,
            user_id,
            timestamp: Utc::now(),
            amount_cents,
            start_cents,
            end_cents,
            event,
            message,
        }
    }

    /// Signed balance delta on the account this entry snapshots.
    pub fn delta_cents(&self) -> Cents {
        self.end_cents - self.start_cents
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_kind_round_trip() {
        for kind in [EventKind::Add, EventKind::Reserve, EventKind::Take] {
            assert_eq!(EventKind::from_str(kind.as_str()), Some(kind));
        }
        assert_eq!(EventKind::from_str("REFUND"), None);
    }

    #[test]
    fn test_delta_is_signed() {
        let credit = LedgerEntry::new(1, EventKind::Add, 5000, 0, 5000, String::new());
        assert_eq!(credit.delta_cents(), 5000);

        let debit = LedgerEntry::new(1, EventKind::Add, 2000, 5000, 3000, String::new());
        assert_eq!(debit.amount_cents, 2000);
        assert_eq!(debit.delta_cents(), -2000);
    }
}
