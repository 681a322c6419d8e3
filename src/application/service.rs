use tracing::debug;

use crate::domain::{format_cents, Balance, Cents, LedgerEntry, UserId};
use crate::storage::Repository;

use super::AppError;

/// Application service for the balance operations. This is the primary
/// interface for any caller (HTTP handler, CLI, job runner): it
/// validates inputs, builds the audit message, and delegates the atomic
/// balance-plus-ledger write to the repository.
pub struct AccountService {
    repo: Repository,
}

impl AccountService {
    /// Create a new account service with the given repository.
    pub fn new(repo: Repository) -> Self {
        Self { repo }
    }

    /// Initialize a new database at the given path.
    pub async fn init(database_path: &str) -> Result<Self, AppError> {
        let db_url = format!("sqlite:{}?mode=rwc", database_path);
        let repo = Repository::init(&db_url).await?;
        Ok(Self::new(repo))
    }

    /// Connect to an existing database.
    pub async fn connect(database_path: &str) -> Result<Self, AppError> {
        let db_url = format!("sqlite:{}", database_path);
        let repo = Repository::connect(&db_url).await?;
        Ok(Self::new(repo))
    }

    /// Current deposit and reserve balances for a user. Pure read: no
    /// mutation, no ledger entry, no writer exclusion.
    pub async fn get_balance(&self, user_id: UserId) -> Result<Balance, AppError> {
        self.repo
            .get_account(user_id)
            .await?
            .map(Balance::from)
            .ok_or(AppError::AccountNotFound(user_id))
    }

    /// Credit the user's deposit account. The account record is created
    /// implicitly on first deposit.
    pub async fn deposit(
        &self,
        user_id: UserId,
        amount_cents: Cents,
        details: &str,
    ) -> Result<LedgerEntry, AppError> {
        require_positive(amount_cents)?;

        let message = with_details(
            format!("deposit {} to account", format_cents(amount_cents)),
            details,
        );

        let entry = self
            .repo
            .credit_deposit(user_id, amount_cents, message)
            .await?;

        debug!(user_id, amount_cents, "deposited to account");
        Ok(entry)
    }

    /// Debit the user's deposit account. Direction is explicit here
    /// rather than carried in the sign of the amount; the ledger still
    /// records the magnitude moved.
    pub async fn withdraw(
        &self,
        user_id: UserId,
        amount_cents: Cents,
        details: &str,
    ) -> Result<LedgerEntry, AppError> {
        require_positive(amount_cents)?;

        let message = with_details(
            format!("withdraw {} from account", format_cents(amount_cents)),
            details,
        );

        let entry = self
            .repo
            .debit_deposit(user_id, amount_cents, message)
            .await?;

        debug!(user_id, amount_cents, "withdrew from account");
        Ok(entry)
    }

    /// Earmark funds for a pending order: moves the amount from the
    /// deposit account to the reserve account, so the order cannot be
    /// double-spent against. The service and order identifiers are
    /// carried into the audit message only.
    pub async fn reserve(
        &self,
        user_id: UserId,
        service_id: i64,
        order_id: i64,
        amount_cents: Cents,
        details: &str,
    ) -> Result<LedgerEntry, AppError> {
        require_positive(amount_cents)?;

        let message = with_details(
            format!(
                "reserve {} on account (service {}, order {})",
                format_cents(amount_cents),
                service_id,
                order_id
            ),
            details,
        );

        let entry = self.repo.reserve(user_id, amount_cents, message).await?;

        debug!(
            user_id,
            service_id, order_id, amount_cents, "reserved funds for order"
        );
        Ok(entry)
    }

    /// Finalize a reservation: permanently withdraw previously reserved
    /// funds. The deposit account is untouched. Releasing a reservation
    /// back to deposit is deliberately not part of this service.
    pub async fn confirm(
        &self,
        user_id: UserId,
        service_id: i64,
        order_id: i64,
        amount_cents: Cents,
        details: &str,
    ) -> Result<LedgerEntry, AppError> {
        require_positive(amount_cents)?;

        let message = with_details(
            format!(
                "take {} from account (service {}, order {})",
                format_cents(amount_cents),
                service_id,
                order_id
            ),
            details,
        );

        let entry = self.repo.confirm(user_id, amount_cents, message).await?;

        debug!(
            user_id,
            service_id, order_id, amount_cents, "confirmed reserved funds"
        );
        Ok(entry)
    }

    /// The user's full audit trail in append order.
    pub async fn history(&self, user_id: UserId) -> Result<Vec<LedgerEntry>, AppError> {
        if self.repo.get_account(user_id).await?.is_none() {
            return Err(AppError::AccountNotFound(user_id));
        }

        Ok(self.repo.entries_for_user(user_id).await?)
    }
}

fn require_positive(amount_cents: Cents) -> Result<(), AppError> {
    if amount_cents <= 0 {
        return Err(AppError::InvalidAmount(
            "Amount must be positive".to_string(),
        ));
    }
    Ok(())
}

fn with_details(mut message: String, details: &str) -> String {
    if !details.is_empty() {
        message.push_str(": ");
        message.push_str(details);
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_details() {
        assert_eq!(
            with_details("deposit 100.00 to account".into(), ""),
            "deposit 100.00 to account"
        );
        assert_eq!(
            with_details("deposit 100.00 to account".into(), "signup bonus"),
            "deposit 100.00 to account: signup bonus"
        );
    }
}
