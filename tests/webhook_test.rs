//! End-to-end webhook ingestion scenarios against the in-memory store.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{deposit, MemoryStore, MockLedger};
use serde_json::json;

use wallet_core::error::AppError;
use wallet_core::ports::{TransactionStore, TransferError};
use wallet_core::services::{
    PaymentWebhookPayload, ReconciliationSweeper, SweeperConfig, WebhookService,
};
use wallet_core::status::{LedgerStatus, OverallStatus, PaymentStatus};

fn payload(value: serde_json::Value) -> PaymentWebhookPayload {
    serde_json::from_value(value).unwrap()
}

fn sweeper_config() -> SweeperConfig {
    SweeperConfig {
        interval: Duration::from_secs(5),
        batch_size: 25,
        payment_expiry: Duration::from_secs(30 * 60),
    }
}

#[tokio::test]
async fn test_successful_payment_credits_casino() {
    let store = Arc::new(MemoryStore::new());
    let ledger = Arc::new(MockLedger::succeeding());
    let service = WebhookService::new(store.clone(), ledger.clone());

    let tx = deposit("R1");
    store.seed(tx.clone());

    let outcome = service
        .handle_payment_webhook(payload(json!({"reference": "R1", "status": "SUCCESS"})))
        .await
        .unwrap();

    assert_eq!(outcome.payment_status, PaymentStatus::Completed);
    assert_eq!(outcome.overall_status, OverallStatus::Completed);
    assert!(!outcome.replayed);
    assert_eq!(ledger.calls(), 1);

    let stored = store.get(tx.id);
    assert_eq!(stored.payment_status, PaymentStatus::Completed);
    assert_eq!(stored.ledger_status, LedgerStatus::Completed);
    assert_eq!(stored.overall_status, OverallStatus::Completed);
    assert!(stored.completed_at.is_some());
    assert!(stored.casino_transfer_id.is_some());

    let statuses: Vec<&str> = stored.timeline.iter().map(|e| e.status.as_str()).collect();
    assert!(statuses.len() >= 3);
    assert!(statuses.contains(&"created"));
    assert!(statuses.contains(&"payment_completed"));
    assert!(statuses.contains(&"ledger_completed"));
}

#[tokio::test]
async fn test_transfer_timeout_is_recoverable_via_sweeper() {
    let store = Arc::new(MemoryStore::new());
    let ledger = Arc::new(MockLedger::with_script(vec![Err(TransferError::Timeout)]));
    let service = WebhookService::new(store.clone(), ledger.clone());

    let tx = deposit("R-TIMEOUT");
    store.seed(tx.clone());

    // The webhook is still accepted: the payment leg genuinely succeeded.
    let outcome = service
        .handle_payment_webhook(payload(json!({"reference": "R-TIMEOUT", "status": "PAID"})))
        .await
        .unwrap();

    assert_eq!(outcome.payment_status, PaymentStatus::Completed);
    assert_eq!(outcome.overall_status, OverallStatus::PaymentCompleted);

    let stored = store.get(tx.id);
    assert_eq!(stored.ledger_status, LedgerStatus::Error);
    assert!(stored.completed_at.is_none());
    assert!(stored.metadata.get("ledger_error").is_some());

    // Next sweep retries the stuck credit; the script is exhausted so the
    // mock now succeeds.
    let sweeper = ReconciliationSweeper::new(store.clone(), ledger.clone(), sweeper_config());
    let summary = sweeper.sweep().await;

    assert_eq!(summary.retried, 1);
    assert_eq!(summary.credited, 1);
    assert_eq!(ledger.calls(), 2);

    let stored = store.get(tx.id);
    assert_eq!(stored.ledger_status, LedgerStatus::Completed);
    assert_eq!(stored.overall_status, OverallStatus::Completed);
    assert!(stored.completed_at.is_some());
}

#[tokio::test]
async fn test_expired_webhook_never_touches_ledger() {
    let store = Arc::new(MemoryStore::new());
    let ledger = Arc::new(MockLedger::succeeding());
    let service = WebhookService::new(store.clone(), ledger.clone());

    let tx = deposit("R2");
    store.seed(tx.clone());

    let outcome = service
        .handle_payment_webhook(payload(json!({"reference": "R2", "status": "EXPIRED"})))
        .await
        .unwrap();

    assert_eq!(outcome.payment_status, PaymentStatus::Expired);
    assert_eq!(outcome.overall_status, OverallStatus::Expired);
    assert_eq!(ledger.calls(), 0);

    let stored = store.get(tx.id);
    assert_eq!(stored.ledger_status, LedgerStatus::Pending);
    assert!(stored.completed_at.is_none());
}

#[tokio::test]
async fn test_webhook_replay_is_a_noop() {
    let store = Arc::new(MemoryStore::new());
    let ledger = Arc::new(MockLedger::succeeding());
    let service = WebhookService::new(store.clone(), ledger.clone());

    let tx = deposit("R-REPLAY");
    store.seed(tx.clone());

    let body = json!({"reference": "R-REPLAY", "status": "SUCCESS"});
    service
        .handle_payment_webhook(payload(body.clone()))
        .await
        .unwrap();

    let first = store.get(tx.id);

    let outcome = service.handle_payment_webhook(payload(body)).await.unwrap();

    assert!(outcome.replayed);
    assert_eq!(ledger.calls(), 1);

    let second = store.get(tx.id);
    assert_eq!(second.timeline.len(), first.timeline.len());
    assert_eq!(second.updated_at, first.updated_at);
    assert_eq!(second.completed_at, first.completed_at);
    assert_eq!(second.casino_transfer_id, first.casino_transfer_id);
}

#[tokio::test]
async fn test_conflicting_webhook_cannot_regress_terminal_state() {
    let store = Arc::new(MemoryStore::new());
    let ledger = Arc::new(MockLedger::succeeding());
    let service = WebhookService::new(store.clone(), ledger.clone());

    let tx = deposit("R-CONFLICT");
    store.seed(tx.clone());

    service
        .handle_payment_webhook(payload(
            json!({"reference": "R-CONFLICT", "status": "DECLINED"}),
        ))
        .await
        .unwrap();

    // A late "SUCCESS" for an already-failed payment is logged and ignored.
    let outcome = service
        .handle_payment_webhook(payload(
            json!({"reference": "R-CONFLICT", "status": "SUCCESS"}),
        ))
        .await
        .unwrap();

    assert!(outcome.replayed);
    assert_eq!(outcome.payment_status, PaymentStatus::Failed);
    assert_eq!(ledger.calls(), 0);

    let stored = store.get(tx.id);
    assert_eq!(stored.payment_status, PaymentStatus::Failed);
    assert_eq!(stored.overall_status, OverallStatus::Failed);
}

#[tokio::test]
async fn test_missing_reference_is_rejected_without_state_change() {
    let store = Arc::new(MemoryStore::new());
    let ledger = Arc::new(MockLedger::succeeding());
    let service = WebhookService::new(store.clone(), ledger.clone());

    let tx = deposit("R-UNTOUCHED");
    store.seed(tx.clone());
    let before = store.get(tx.id);

    let result = service
        .handle_payment_webhook(payload(json!({"status": "SUCCESS"})))
        .await;
    assert!(matches!(result, Err(AppError::InvalidPayload(_))));

    let result = service
        .handle_payment_webhook(payload(json!({"reference": "R-UNTOUCHED", "status": ""})))
        .await;
    assert!(matches!(result, Err(AppError::InvalidPayload(_))));

    let after = store.get(tx.id);
    assert_eq!(after.payment_status, before.payment_status);
    assert_eq!(after.updated_at, before.updated_at);
    assert_eq!(ledger.calls(), 0);
}

#[tokio::test]
async fn test_unknown_reference_is_not_created() {
    let store = Arc::new(MemoryStore::new());
    let ledger = Arc::new(MockLedger::succeeding());
    let service = WebhookService::new(store.clone(), ledger.clone());

    let result = service
        .handle_payment_webhook(payload(json!({"reference": "GHOST", "status": "SUCCESS"})))
        .await;

    assert!(matches!(result, Err(AppError::NotFound(_))));
    assert!(store.get_by_reference("GHOST").await.is_err());
}

#[tokio::test]
async fn test_payload_extras_are_captured_in_metadata() {
    let store = Arc::new(MemoryStore::new());
    let ledger = Arc::new(MockLedger::succeeding());
    let service = WebhookService::new(store.clone(), ledger.clone());

    let tx = deposit("R-META");
    store.seed(tx.clone());

    service
        .handle_payment_webhook(payload(json!({
            "reference": "R-META",
            "status": "PROCESSING",
            "invoice_id": "INV-88",
            "description": "GCash QR deposit",
            "channel": "qrph"
        })))
        .await
        .unwrap();

    let stored = store.get(tx.id);
    assert_eq!(stored.payment_status, PaymentStatus::Processing);
    assert_eq!(stored.metadata["invoice_id"], "INV-88");
    assert_eq!(stored.metadata["gateway_status"], "PROCESSING");
    assert_eq!(stored.metadata["gateway_extra"]["channel"], "qrph");
}
