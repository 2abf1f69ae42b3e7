//! Shared test doubles: an in-memory TransactionStore with the same
//! conditional-update semantics as the Postgres adapter, and a scriptable
//! LedgerTransfer mock.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use wallet_core::domain::{Transaction, TransactionKind};
use wallet_core::ports::{
    LedgerStatusUpdate, LedgerTransfer, PaymentStatusUpdate, StoreError, StoreResult,
    TransactionStore, TransferError, TransferReceipt, TransferRequest,
};
use wallet_core::status::{LedgerStatus, OverallStatus, PaymentStatus};

pub struct MemoryStore {
    rows: Mutex<HashMap<Uuid, Transaction>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            rows: Mutex::new(HashMap::new()),
        }
    }

    pub fn seed(&self, tx: Transaction) {
        self.rows.lock().unwrap().insert(tx.id, tx);
    }

    pub fn get(&self, id: Uuid) -> Transaction {
        self.rows.lock().unwrap().get(&id).cloned().unwrap()
    }
}

#[async_trait]
impl TransactionStore for MemoryStore {
    async fn insert(&self, tx: &Transaction) -> StoreResult<Transaction> {
        let mut rows = self.rows.lock().unwrap();
        if rows.values().any(|t| t.reference == tx.reference) {
            return Err(StoreError::DuplicateReference(tx.reference.clone()));
        }
        rows.insert(tx.id, tx.clone());
        Ok(tx.clone())
    }

    async fn get_by_id(&self, id: Uuid) -> StoreResult<Transaction> {
        self.rows
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    async fn get_by_reference(&self, reference: &str) -> StoreResult<Transaction> {
        self.rows
            .lock()
            .unwrap()
            .values()
            .find(|t| t.reference == reference)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(reference.to_string()))
    }

    async fn update_payment_status(
        &self,
        update: PaymentStatusUpdate,
    ) -> StoreResult<Transaction> {
        let mut rows = self.rows.lock().unwrap();
        let tx = rows
            .get_mut(&update.id)
            .ok_or_else(|| StoreError::NotFound(update.id.to_string()))?;
        tx.payment_status = update.payment_status;
        tx.overall_status = update.overall_status;
        tx.timeline = update.timeline;
        tx.metadata = update.metadata;
        tx.updated_at = Utc::now();
        Ok(tx.clone())
    }

    async fn update_ledger_status(&self, update: LedgerStatusUpdate) -> StoreResult<Transaction> {
        let mut rows = self.rows.lock().unwrap();
        let tx = rows
            .get_mut(&update.id)
            .ok_or_else(|| StoreError::NotFound(update.id.to_string()))?;
        if !update.expected.contains(&tx.ledger_status) {
            return Err(StoreError::Conflict(format!(
                "ledger status of {} is {}, expected one of {:?}",
                update.id,
                tx.ledger_status.as_str(),
                update.expected
            )));
        }
        tx.ledger_status = update.ledger_status;
        tx.overall_status = update.overall_status;
        if update.casino_transfer_id.is_some() {
            tx.casino_transfer_id = update.casino_transfer_id;
        }
        tx.timeline = update.timeline;
        tx.metadata = update.metadata;
        if tx.completed_at.is_none() {
            tx.completed_at = update.completed_at;
        }
        tx.updated_at = Utc::now();
        Ok(tx.clone())
    }

    async fn list_stuck_transfers(&self, limit: i64) -> StoreResult<Vec<Transaction>> {
        let rows = self.rows.lock().unwrap();
        let mut stuck: Vec<Transaction> = rows
            .values()
            .filter(|t| {
                t.kind == TransactionKind::Deposit
                    && t.overall_status == OverallStatus::PaymentCompleted
                    && matches!(t.ledger_status, LedgerStatus::Pending | LedgerStatus::Error)
            })
            .cloned()
            .collect();
        stuck.sort_by_key(|t| t.updated_at);
        stuck.truncate(limit as usize);
        Ok(stuck)
    }

    async fn list_expired_pending(
        &self,
        cutoff: DateTime<Utc>,
        limit: i64,
    ) -> StoreResult<Vec<Transaction>> {
        let rows = self.rows.lock().unwrap();
        let mut stale: Vec<Transaction> = rows
            .values()
            .filter(|t| {
                matches!(
                    t.payment_status,
                    PaymentStatus::Pending | PaymentStatus::Processing
                ) && t.created_at < cutoff
            })
            .cloned()
            .collect();
        stale.sort_by_key(|t| t.created_at);
        stale.truncate(limit as usize);
        Ok(stale)
    }
}

/// Scriptable ledger transfer mock. Pops scripted results in order; once the
/// script is exhausted every call succeeds. Optionally sleeps before
/// answering so races between callers can be provoked deterministically.
pub struct MockLedger {
    script: Mutex<VecDeque<Result<TransferReceipt, TransferError>>>,
    calls: AtomicUsize,
    delay: Option<Duration>,
}

impl MockLedger {
    pub fn succeeding() -> Self {
        Self::with_script(Vec::new())
    }

    pub fn with_script(script: Vec<Result<TransferReceipt, TransferError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            calls: AtomicUsize::new(0),
            delay: None,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn success_receipt(transfer_id: &str) -> Result<TransferReceipt, TransferError> {
        Ok(TransferReceipt {
            success: true,
            transfer_id: Some(transfer_id.to_string()),
            message: None,
        })
    }
}

#[async_trait]
impl LedgerTransfer for MockLedger {
    async fn transfer(&self, _req: TransferRequest) -> Result<TransferReceipt, TransferError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let scripted = self.script.lock().unwrap().pop_front();
        match scripted {
            Some(result) => result,
            None => Ok(TransferReceipt {
                success: true,
                transfer_id: Some(format!("LT-{}", call)),
                message: None,
            }),
        }
    }
}

pub fn deposit(reference: &str) -> Transaction {
    Transaction::new_deposit(
        reference.to_string(),
        Uuid::new_v4(),
        BigDecimal::from(500),
        "PHP".to_string(),
        "directpay".to_string(),
        Some("CAS-100".to_string()),
        Some("juan_dc".to_string()),
        None,
    )
}

pub fn deposit_without_destination(reference: &str) -> Transaction {
    Transaction::new_deposit(
        reference.to_string(),
        Uuid::new_v4(),
        BigDecimal::from(500),
        "PHP".to_string(),
        "directpay".to_string(),
        None,
        None,
        None,
    )
}

/// A deposit whose payment leg is already captured but whose casino credit
/// is still outstanding.
pub fn stuck_deposit(reference: &str, ledger_status: LedgerStatus) -> Transaction {
    let mut tx = deposit(reference);
    tx.payment_status = PaymentStatus::Completed;
    tx.ledger_status = ledger_status;
    tx.overall_status = OverallStatus::PaymentCompleted;
    tx
}
