//! Postgres implementation of TransactionStore.
//!
//! Ledger-leg updates are conditional on the row's current ledger status
//! (`ledger_status = ANY(expected)`), which is what serializes a webhook and
//! a sweeper retry racing on the same transaction. completed_at is written
//! with COALESCE so the first completion wins and is never overwritten.

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::{TimelineEntry, Transaction, TransactionKind};
use crate::ports::{
    LedgerStatusUpdate, PaymentStatusUpdate, StoreError, StoreResult, TransactionStore,
};
use crate::status::{LedgerStatus, OverallStatus, PaymentStatus};

const RETURNING_COLUMNS: &str = r#"
    id, reference, user_id, amount, currency, kind, payment_method,
    payment_status, ledger_status, overall_status,
    casino_transfer_id, casino_account_id, casino_username,
    timeline, metadata, created_at, updated_at, completed_at
"#;

#[derive(Clone)]
pub struct PostgresTransactionStore {
    pool: PgPool,
}

impl PostgresTransactionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TransactionStore for PostgresTransactionStore {
    async fn insert(&self, tx: &Transaction) -> StoreResult<Transaction> {
        let timeline = serde_json::to_value(&tx.timeline)
            .map_err(|e| StoreError::Decode(e.to_string()))?;

        let row = sqlx::query_as::<_, TransactionRow>(&format!(
            r#"
            INSERT INTO transactions (
                id, reference, user_id, amount, currency, kind, payment_method,
                payment_status, ledger_status, overall_status,
                casino_transfer_id, casino_account_id, casino_username,
                timeline, metadata, created_at, updated_at, completed_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)
            RETURNING {RETURNING_COLUMNS}
            "#
        ))
        .bind(tx.id)
        .bind(&tx.reference)
        .bind(tx.user_id)
        .bind(&tx.amount)
        .bind(&tx.currency)
        .bind(tx.kind.as_str())
        .bind(&tx.payment_method)
        .bind(tx.payment_status.as_str())
        .bind(tx.ledger_status.as_str())
        .bind(tx.overall_status.as_str())
        .bind(&tx.casino_transfer_id)
        .bind(&tx.casino_account_id)
        .bind(&tx.casino_username)
        .bind(timeline)
        .bind(&tx.metadata)
        .bind(tx.created_at)
        .bind(tx.updated_at)
        .bind(tx.completed_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                StoreError::DuplicateReference(tx.reference.clone())
            }
            _ => StoreError::Database(e.to_string()),
        })?;

        row.into_domain()
    }

    async fn get_by_id(&self, id: Uuid) -> StoreResult<Transaction> {
        let row = sqlx::query_as::<_, TransactionRow>(&format!(
            "SELECT {RETURNING_COLUMNS} FROM transactions WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;

        row.ok_or_else(|| StoreError::NotFound(id.to_string()))?
            .into_domain()
    }

    async fn get_by_reference(&self, reference: &str) -> StoreResult<Transaction> {
        let row = sqlx::query_as::<_, TransactionRow>(&format!(
            "SELECT {RETURNING_COLUMNS} FROM transactions WHERE reference = $1"
        ))
        .bind(reference)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;

        row.ok_or_else(|| StoreError::NotFound(reference.to_string()))?
            .into_domain()
    }

    async fn update_payment_status(
        &self,
        update: PaymentStatusUpdate,
    ) -> StoreResult<Transaction> {
        let timeline = serde_json::to_value(&update.timeline)
            .map_err(|e| StoreError::Decode(e.to_string()))?;

        let row = sqlx::query_as::<_, TransactionRow>(&format!(
            r#"
            UPDATE transactions
            SET payment_status = $2,
                overall_status = $3,
                timeline = $4,
                metadata = $5,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {RETURNING_COLUMNS}
            "#
        ))
        .bind(update.id)
        .bind(update.payment_status.as_str())
        .bind(update.overall_status.as_str())
        .bind(timeline)
        .bind(&update.metadata)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;

        row.ok_or_else(|| StoreError::NotFound(update.id.to_string()))?
            .into_domain()
    }

    async fn update_ledger_status(&self, update: LedgerStatusUpdate) -> StoreResult<Transaction> {
        let timeline = serde_json::to_value(&update.timeline)
            .map_err(|e| StoreError::Decode(e.to_string()))?;
        let expected: Vec<String> = update
            .expected
            .iter()
            .map(|s| s.as_str().to_string())
            .collect();

        let row = sqlx::query_as::<_, TransactionRow>(&format!(
            r#"
            UPDATE transactions
            SET ledger_status = $2,
                overall_status = $3,
                casino_transfer_id = COALESCE($4, casino_transfer_id),
                timeline = $5,
                metadata = $6,
                completed_at = COALESCE(completed_at, $7),
                updated_at = NOW()
            WHERE id = $1 AND ledger_status = ANY($8)
            RETURNING {RETURNING_COLUMNS}
            "#
        ))
        .bind(update.id)
        .bind(update.ledger_status.as_str())
        .bind(update.overall_status.as_str())
        .bind(&update.casino_transfer_id)
        .bind(timeline)
        .bind(&update.metadata)
        .bind(update.completed_at)
        .bind(&expected)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;

        match row {
            Some(row) => row.into_domain(),
            // Row exists but its ledger status moved under us: lost the CAS.
            None => match self.get_by_id(update.id).await {
                Ok(current) => Err(StoreError::Conflict(format!(
                    "ledger status of {} is {}, expected one of {:?}",
                    update.id,
                    current.ledger_status.as_str(),
                    expected
                ))),
                Err(e) => Err(e),
            },
        }
    }

    async fn list_stuck_transfers(&self, limit: i64) -> StoreResult<Vec<Transaction>> {
        let rows = sqlx::query_as::<_, TransactionRow>(&format!(
            r#"
            SELECT {RETURNING_COLUMNS} FROM transactions
            WHERE kind = 'deposit'
              AND overall_status = 'payment_completed'
              AND ledger_status IN ('pending', 'error')
            ORDER BY updated_at ASC
            LIMIT $1
            "#
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;

        rows.into_iter().map(|r| r.into_domain()).collect()
    }

    async fn list_expired_pending(
        &self,
        cutoff: DateTime<Utc>,
        limit: i64,
    ) -> StoreResult<Vec<Transaction>> {
        let rows = sqlx::query_as::<_, TransactionRow>(&format!(
            r#"
            SELECT {RETURNING_COLUMNS} FROM transactions
            WHERE payment_status IN ('pending', 'processing')
              AND created_at < $1
            ORDER BY created_at ASC
            LIMIT $2
            "#
        ))
        .bind(cutoff)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;

        rows.into_iter().map(|r| r.into_domain()).collect()
    }
}

/// Internal row type for SQLx. Not exposed outside the adapter.
#[derive(Debug, sqlx::FromRow)]
struct TransactionRow {
    id: Uuid,
    reference: String,
    user_id: Uuid,
    amount: BigDecimal,
    currency: String,
    kind: String,
    payment_method: String,
    payment_status: String,
    ledger_status: String,
    overall_status: String,
    casino_transfer_id: Option<String>,
    casino_account_id: Option<String>,
    casino_username: Option<String>,
    timeline: serde_json::Value,
    metadata: serde_json::Value,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
}

impl TransactionRow {
    fn into_domain(self) -> StoreResult<Transaction> {
        let kind = TransactionKind::from_str(&self.kind)
            .ok_or_else(|| StoreError::Decode(format!("unknown kind: {}", self.kind)))?;
        let payment_status = PaymentStatus::from_str(&self.payment_status).ok_or_else(|| {
            StoreError::Decode(format!("unknown payment status: {}", self.payment_status))
        })?;
        let ledger_status = LedgerStatus::from_str(&self.ledger_status).ok_or_else(|| {
            StoreError::Decode(format!("unknown ledger status: {}", self.ledger_status))
        })?;
        let overall_status = OverallStatus::from_str(&self.overall_status).ok_or_else(|| {
            StoreError::Decode(format!("unknown overall status: {}", self.overall_status))
        })?;
        let timeline: Vec<TimelineEntry> = serde_json::from_value(self.timeline)
            .map_err(|e| StoreError::Decode(format!("timeline: {}", e)))?;

        Ok(Transaction {
            id: self.id,
            reference: self.reference,
            user_id: self.user_id,
            amount: self.amount,
            currency: self.currency,
            kind,
            payment_method: self.payment_method,
            payment_status,
            ledger_status,
            overall_status,
            casino_transfer_id: self.casino_transfer_id,
            casino_account_id: self.casino_account_id,
            casino_username: self.casino_username,
            timeline,
            metadata: self.metadata,
            created_at: self.created_at,
            updated_at: self.updated_at,
            completed_at: self.completed_at,
        })
    }
}
