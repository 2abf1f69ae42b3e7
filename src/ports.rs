//! Trait seams between the reconciliation core and its collaborators: the
//! durable transaction store and the casino ledger RPC.

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::{TimelineEntry, Transaction};
use crate::status::{LedgerStatus, OverallStatus, PaymentStatus};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("duplicate reference: {0}")]
    DuplicateReference(String),

    /// A conditional update lost its compare-and-swap guard. The row was
    /// concurrently moved to a different status by another worker.
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("stored value could not be decoded: {0}")]
    Decode(String),

    #[error("database error: {0}")]
    Database(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Payment-leg field group, written by the webhook handler and the expiry
/// sweep. Last writer wins within the group.
#[derive(Debug, Clone)]
pub struct PaymentStatusUpdate {
    pub id: Uuid,
    pub payment_status: PaymentStatus,
    pub overall_status: OverallStatus,
    pub timeline: Vec<TimelineEntry>,
    pub metadata: serde_json::Value,
}

/// Ledger-leg field group. The `expected` guard makes the write conditional:
/// the update only applies while the row's ledger status is one of the
/// expected values, which serializes a webhook racing a sweeper retry on the
/// same transaction.
#[derive(Debug, Clone)]
pub struct LedgerStatusUpdate {
    pub id: Uuid,
    pub expected: Vec<LedgerStatus>,
    pub ledger_status: LedgerStatus,
    pub overall_status: OverallStatus,
    pub casino_transfer_id: Option<String>,
    pub timeline: Vec<TimelineEntry>,
    pub metadata: serde_json::Value,
    /// Applied with set-once semantics; an already-set completion time is
    /// never overwritten.
    pub completed_at: Option<DateTime<Utc>>,
}

#[async_trait]
pub trait TransactionStore: Send + Sync {
    async fn insert(&self, tx: &Transaction) -> StoreResult<Transaction>;

    async fn get_by_id(&self, id: Uuid) -> StoreResult<Transaction>;

    async fn get_by_reference(&self, reference: &str) -> StoreResult<Transaction>;

    async fn update_payment_status(&self, update: PaymentStatusUpdate)
        -> StoreResult<Transaction>;

    async fn update_ledger_status(&self, update: LedgerStatusUpdate) -> StoreResult<Transaction>;

    /// Deposits whose payment is captured but whose casino credit is still
    /// outstanding and retryable (ledger status pending or error). Other
    /// transaction kinds never move money into the casino and are excluded.
    async fn list_stuck_transfers(&self, limit: i64) -> StoreResult<Vec<Transaction>>;

    /// Transactions whose payment leg is still pending/processing and which
    /// were created before `cutoff`.
    async fn list_expired_pending(
        &self,
        cutoff: DateTime<Utc>,
        limit: i64,
    ) -> StoreResult<Vec<Transaction>>;
}

#[derive(Debug, Clone)]
pub struct TransferRequest {
    pub amount: BigDecimal,
    pub account_id: String,
    pub username: String,
    /// Caller-side idempotency token, derived from the transaction
    /// reference, so a retried call after a timeout cannot double-credit a
    /// provider that deduplicates by nonce.
    pub nonce: String,
}

#[derive(Debug, Clone)]
pub struct TransferReceipt {
    pub success: bool,
    pub transfer_id: Option<String>,
    pub message: Option<String>,
}

#[derive(Debug, Error)]
pub enum TransferError {
    #[error("transfer request failed: {0}")]
    Transport(String),

    /// The call exceeded its deadline with the remote outcome unknown.
    /// Treated as failure-requiring-retry, never as success.
    #[error("transfer timed out")]
    Timeout,

    #[error("transfer service unavailable: {0}")]
    Unavailable(String),
}

/// Outbound casino ledger call. Implementations never touch the transaction
/// store; recording the outcome is the caller's job.
#[async_trait]
pub trait LedgerTransfer: Send + Sync {
    async fn transfer(&self, req: TransferRequest) -> Result<TransferReceipt, TransferError>;
}
