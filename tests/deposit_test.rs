//! Deposit creation lifecycle entry point.

mod common;

use std::sync::Arc;

use bigdecimal::BigDecimal;
use common::MemoryStore;
use uuid::Uuid;

use wallet_core::error::AppError;
use wallet_core::ports::TransactionStore;
use wallet_core::use_cases::{CreateDeposit, DepositInput};

fn input(reference: Option<&str>, amount: i64) -> DepositInput {
    DepositInput {
        user_id: Uuid::new_v4(),
        amount: BigDecimal::from(amount),
        reference: reference.map(str::to_string),
        currency: None,
        payment_method: Some("paygram".to_string()),
        casino_account_id: Some("CAS-5".to_string()),
        casino_username: Some("ana_r".to_string()),
        metadata: None,
    }
}

#[tokio::test]
async fn test_deposit_opens_pending_with_created_timeline() {
    let store = Arc::new(MemoryStore::new());
    let use_case = CreateDeposit::new(store.clone());

    let tx = use_case.execute(input(Some("DEP-1"), 250)).await.unwrap();

    assert_eq!(tx.payment_status.as_str(), "pending");
    assert_eq!(tx.ledger_status.as_str(), "pending");
    assert_eq!(tx.overall_status.as_str(), "pending");
    assert_eq!(tx.currency, "PHP");
    assert_eq!(tx.timeline.len(), 1);
    assert_eq!(tx.timeline[0].status, "created");

    let stored = store.get_by_reference("DEP-1").await.unwrap();
    assert_eq!(stored.id, tx.id);
}

#[tokio::test]
async fn test_reference_is_generated_when_absent() {
    let store = Arc::new(MemoryStore::new());
    let use_case = CreateDeposit::new(store.clone());

    let tx = use_case.execute(input(None, 100)).await.unwrap();
    assert!(tx.reference.starts_with("DEP-"));
}

#[tokio::test]
async fn test_duplicate_reference_is_rejected() {
    let store = Arc::new(MemoryStore::new());
    let use_case = CreateDeposit::new(store.clone());

    use_case.execute(input(Some("DEP-DUP"), 100)).await.unwrap();
    let result = use_case.execute(input(Some("DEP-DUP"), 100)).await;

    assert!(matches!(result, Err(AppError::Conflict(_))));
}

#[tokio::test]
async fn test_non_positive_amount_is_rejected() {
    let store = Arc::new(MemoryStore::new());
    let use_case = CreateDeposit::new(store.clone());

    let result = use_case.execute(input(Some("DEP-ZERO"), 0)).await;
    assert!(matches!(result, Err(AppError::InvalidPayload(_))));

    let result = use_case.execute(input(Some("DEP-NEG"), -5)).await;
    assert!(matches!(result, Err(AppError::InvalidPayload(_))));
}
