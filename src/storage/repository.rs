use std::str::FromStr;
use std::time::Duration;

use anyhow::Context;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, Sqlite, SqlitePool, Transaction};
use thiserror::Error;
use tracing::warn;

use crate::domain::{Account, Cents, EventKind, LedgerEntry, UserId};

use super::MIGRATION_001_INITIAL;

/// Typed failure surface of the storage layer. `NotFound` and
/// `Insufficient` leave state untouched; `Backend` means the whole
/// transaction rolled back.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("no account for user {0}")]
    NotFound(UserId),

    #[error("insufficient funds for user {user_id}: available {available}, requested {requested}")]
    Insufficient {
        user_id: UserId,
        available: Cents,
        requested: Cents,
    },

    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

/// Repository for per-user accounts and the append-only ledger.
///
/// Every mutating operation runs one SQLite transaction that contains
/// both the balance update and the ledger append, so neither is ever
/// observable without the other. The precondition (enough funds on the
/// source account) is evaluated inside the UPDATE's WHERE clause, which
/// closes the read-then-write race between concurrent callers.
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Create a new repository with the given SQLite connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to a SQLite database at the given URL.
    /// Creates the database file if it doesn't exist.
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(database_url)
            .context("Invalid database URL")?
            .create_if_missing(true)
            // WAL plus a busy timeout makes concurrent writers queue on
            // the single-writer lock instead of failing with SQLITE_BUSY.
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .connect_with(options)
            .await
            .context("Failed to connect to database")?;
        Ok(Self::new(pool))
    }

    /// Run database migrations.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::query(MIGRATION_001_INITIAL)
            .execute(&self.pool)
            .await
            .context("Failed to run migration 001")?;
        Ok(())
    }

    /// Initialize a new database (connect + migrate).
    pub async fn init(database_url: &str) -> Result<Self, StoreError> {
        let repo = Self::connect(database_url).await?;
        repo.migrate().await?;
        Ok(repo)
    }

    // ========================
    // Reads
    // ========================

    /// Point lookup of a user's account.
    pub async fn get_account(&self, user_id: UserId) -> Result<Option<Account>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT user_id, deposit_cents, reserve_cents
            FROM accounts
            WHERE user_id = ?
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch account")?;

        Ok(row.map(|row| Self::row_to_account(&row)))
    }

    /// List a user's ledger entries in append order.
    pub async fn entries_for_user(&self, user_id: UserId) -> Result<Vec<LedgerEntry>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, timestamp, amount_cents, start_cents, end_cents, event, message
            FROM ledger_entries
            WHERE user_id = ?
            ORDER BY id
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list ledger entries")?;

        rows.iter()
            .map(|row| Self::row_to_entry(row).map_err(StoreError::from))
            .collect()
    }

    // ========================
    // Mutations
    // ========================

    /// Credit the deposit account, creating the account record on first
    /// deposit. Appends one ADD entry.
    pub async fn credit_deposit(
        &self,
        user_id: UserId,
        amount_cents: Cents,
        message: String,
    ) -> Result<LedgerEntry, StoreError> {
        let mut tx = self.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO accounts (user_id, deposit_cents, reserve_cents)
            VALUES (?, ?, 0)
            ON CONFLICT (user_id)
            DO UPDATE SET deposit_cents = deposit_cents + excluded.deposit_cents
            "#,
        )
        .bind(user_id)
        .bind(amount_cents)
        .execute(&mut *tx)
        .await
        .context("Failed to credit deposit account")?;

        let end = Self::deposit_in_tx(&mut tx, user_id).await?;
        let entry = LedgerEntry::new(
            user_id,
            EventKind::Add,
            amount_cents,
            end - amount_cents,
            end,
            message,
        );
        self.append_entry(tx, entry).await
    }

    /// Debit the deposit account. Appends one ADD entry whose amount is
    /// the magnitude withdrawn (the delta is negative).
    pub async fn debit_deposit(
        &self,
        user_id: UserId,
        amount_cents: Cents,
        message: String,
    ) -> Result<LedgerEntry, StoreError> {
        let mut tx = self.begin().await?;

        let updated = sqlx::query(
            r#"
            UPDATE accounts
            SET deposit_cents = deposit_cents - ?
            WHERE user_id = ? AND deposit_cents >= ?
            "#,
        )
        .bind(amount_cents)
        .bind(user_id)
        .bind(amount_cents)
        .execute(&mut *tx)
        .await
        .context("Failed to debit deposit account")?;

        if updated.rows_affected() == 0 {
            return Err(Self::classify_deposit_failure(&mut tx, user_id, amount_cents).await);
        }

        let end = Self::deposit_in_tx(&mut tx, user_id).await?;
        let entry = LedgerEntry::new(
            user_id,
            EventKind::Add,
            amount_cents,
            end + amount_cents,
            end,
            message,
        );
        self.append_entry(tx, entry).await
    }

    /// Move funds from the deposit account into the reserve account.
    /// Appends one RESERVE entry snapshotting the deposit side.
    pub async fn reserve(
        &self,
        user_id: UserId,
        amount_cents: Cents,
        message: String,
    ) -> Result<LedgerEntry, StoreError> {
        let mut tx = self.begin().await?;

        let updated = sqlx::query(
            r#"
            UPDATE accounts
            SET deposit_cents = deposit_cents - ?,
                reserve_cents = reserve_cents + ?
            WHERE user_id = ? AND deposit_cents >= ?
            "#,
        )
        .bind(amount_cents)
        .bind(amount_cents)
        .bind(user_id)
        .bind(amount_cents)
        .execute(&mut *tx)
        .await
        .context("Failed to reserve funds")?;

        if updated.rows_affected() == 0 {
            return Err(Self::classify_deposit_failure(&mut tx, user_id, amount_cents).await);
        }

        let end = Self::deposit_in_tx(&mut tx, user_id).await?;
        let entry = LedgerEntry::new(
            user_id,
            EventKind::Reserve,
            amount_cents,
            end + amount_cents,
            end,
            message,
        );
        self.append_entry(tx, entry).await
    }

    /// Permanently withdraw previously reserved funds. Appends one TAKE
    /// entry snapshotting the reserve side; the deposit account is
    /// untouched.
    pub async fn confirm(
        &self,
        user_id: UserId,
        amount_cents: Cents,
        message: String,
    ) -> Result<LedgerEntry, StoreError> {
        let mut tx = self.begin().await?;

        let updated = sqlx::query(
            r#"
            UPDATE accounts
            SET reserve_cents = reserve_cents - ?
            WHERE user_id = ? AND reserve_cents >= ?
            "#,
        )
        .bind(amount_cents)
        .bind(user_id)
        .bind(amount_cents)
        .execute(&mut *tx)
        .await
        .context("Failed to confirm reservation")?;

        if updated.rows_affected() == 0 {
            return Err(Self::classify_reserve_failure(&mut tx, user_id, amount_cents).await);
        }

        let row = sqlx::query("SELECT reserve_cents FROM accounts WHERE user_id = ?")
            .bind(user_id)
            .fetch_one(&mut *tx)
            .await
            .context("Failed to read reserve balance")?;
        let end: Cents = row.get("reserve_cents");

        let entry = LedgerEntry::new(
            user_id,
            EventKind::Take,
            amount_cents,
            end + amount_cents,
            end,
            message,
        );
        self.append_entry(tx, entry).await
    }

    // ========================
    // Internals
    // ========================

    async fn begin(&self) -> Result<Transaction<'static, Sqlite>, StoreError> {
        Ok(self
            .pool
            .begin()
            .await
            .context("Failed to begin transaction")?)
    }

    /// Insert the ledger entry and commit. A failure at either step
    /// rolls the whole transaction back, balance update included.
    async fn append_entry(
        &self,
        mut tx: Transaction<'static, Sqlite>,
        mut entry: LedgerEntry,
    ) -> Result<LedgerEntry, StoreError> {
        let row = sqlx::query(
            r#"
            INSERT INTO ledger_entries (user_id, timestamp, amount_cents, start_cents, end_cents, event, message)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(entry.user_id)
        .bind(entry.timestamp.to_rfc3339())
        .bind(entry.amount_cents)
        .bind(entry.start_cents)
        .bind(entry.end_cents)
        .bind(entry.event.as_str())
        .bind(&entry.message)
        .fetch_one(&mut *tx)
        .await
        .context("Failed to append ledger entry")?;

        entry.id = row.get("id");

        tx.commit().await.context("Failed to commit transaction")?;
        Ok(entry)
    }

    async fn deposit_in_tx(
        tx: &mut Transaction<'static, Sqlite>,
        user_id: UserId,
    ) -> Result<Cents, StoreError> {
        let row = sqlx::query("SELECT deposit_cents FROM accounts WHERE user_id = ?")
            .bind(user_id)
            .fetch_one(&mut **tx)
            .await
            .context("Failed to read deposit balance")?;
        Ok(row.get("deposit_cents"))
    }

    /// A guarded UPDATE matched no row: either the account is missing
    /// or the deposit balance is short. Distinguish the two.
    async fn classify_deposit_failure(
        tx: &mut Transaction<'static, Sqlite>,
        user_id: UserId,
        requested: Cents,
    ) -> StoreError {
        let row = sqlx::query("SELECT deposit_cents FROM accounts WHERE user_id = ?")
            .bind(user_id)
            .fetch_optional(&mut **tx)
            .await;

        match row {
            Ok(Some(row)) => {
                let available: Cents = row.get("deposit_cents");
                warn!(user_id, available, requested, "rejected update: insufficient deposit funds");
                StoreError::Insufficient {
                    user_id,
                    available,
                    requested,
                }
            }
            Ok(None) => StoreError::NotFound(user_id),
            Err(err) => StoreError::Backend(
                anyhow::Error::new(err).context("Failed to inspect account after rejected update"),
            ),
        }
    }

    async fn classify_reserve_failure(
        tx: &mut Transaction<'static, Sqlite>,
        user_id: UserId,
        requested: Cents,
    ) -> StoreError {
        let row = sqlx::query("SELECT reserve_cents FROM accounts WHERE user_id = ?")
            .bind(user_id)
            .fetch_optional(&mut **tx)
            .await;

        match row {
            Ok(Some(row)) => {
                let available: Cents = row.get("reserve_cents");
                warn!(user_id, available, requested, "rejected update: insufficient reserved funds");
                StoreError::Insufficient {
                    user_id,
                    available,
                    requested,
                }
            }
            Ok(None) => StoreError::NotFound(user_id),
            Err(err) => StoreError::Backend(
                anyhow::Error::new(err).context("Failed to inspect account after rejected update"),
            ),
        }
    }

    fn row_to_account(row: &SqliteRow) -> Account {
        Account {
            user_id: row.get("user_id"),
            deposit_cents: row.get("deposit_cents"),
            reserve_cents: row.get("reserve_cents"),
        }
    }

    fn row_to_entry(row: &SqliteRow) -> anyhow::Result<LedgerEntry> {
        let timestamp_str: String = row.get("timestamp");
        let event_str: String = row.get("event");

        Ok(LedgerEntry {
            id: row.get("id"),
            user_id: row.get("user_id"),
            timestamp: DateTime::parse_from_rfc3339(&timestamp_str)
                .context("Invalid ledger timestamp")?
                .with_timezone(&Utc),
            amount_cents: row.get("amount_cents"),
            start_cents: row.get("start_cents"),
            end_cents: row.get("end_cents"),
            event: EventKind::from_str(&event_str)
                .ok_or_else(|| anyhow::anyhow!("Invalid event kind: {}", event_str))?,
            message: row.get("message"),
        })
    }
}
