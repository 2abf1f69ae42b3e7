//! Create deposit use case.
//! Opens a transaction in the pending/pending state for a user's deposit
//! request, before any gateway or casino activity.

use bigdecimal::BigDecimal;
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::Transaction;
use crate::error::AppError;
use crate::ports::TransactionStore;
use crate::status::providers::PROVIDER_DIRECTPAY;
use crate::timeline::build_timeline;

/// Input for the CreateDeposit use case.
#[derive(Debug)]
pub struct DepositInput {
    pub user_id: Uuid,
    pub amount: BigDecimal,
    /// Optional caller-supplied reference; generated when absent.
    pub reference: Option<String>,
    pub currency: Option<String>,
    pub payment_method: Option<String>,
    pub casino_account_id: Option<String>,
    pub casino_username: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

/// Use case for opening deposits.
pub struct CreateDeposit {
    store: Arc<dyn TransactionStore>,
}

impl CreateDeposit {
    pub fn new(store: Arc<dyn TransactionStore>) -> Self {
        Self { store }
    }

    pub async fn execute(&self, input: DepositInput) -> Result<Transaction, AppError> {
        if input.amount <= BigDecimal::from(0) {
            return Err(AppError::InvalidPayload(
                "amount must be positive".to_string(),
            ));
        }

        let reference = match input.reference {
            Some(reference) if !reference.trim().is_empty() => reference,
            _ => format!("DEP-{}", Uuid::new_v4().simple()),
        };

        let mut tx = Transaction::new_deposit(
            reference,
            input.user_id,
            input.amount,
            input.currency.unwrap_or_else(|| "PHP".to_string()),
            input
                .payment_method
                .unwrap_or_else(|| PROVIDER_DIRECTPAY.to_string()),
            input.casino_account_id,
            input.casino_username,
            input.metadata,
        );
        tx.timeline = build_timeline(&tx);

        let inserted = self.store.insert(&tx).await?;
        Ok(inserted)
    }
}
