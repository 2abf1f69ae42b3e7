//! Shared transfer-attempt primitive.
//!
//! Both the webhook handler and the sweeper credit the casino through this
//! function. The attempt is claimed first with a conditional store update
//! (retryable ledger status -> processing); whichever caller loses that claim
//! backs off, so a webhook and a sweeper racing on the same transaction can
//! never both call the casino.

use chrono::Utc;
use serde_json::json;
use tracing::{debug, warn};

use crate::domain::Transaction;
use crate::ports::{
    LedgerStatusUpdate, LedgerTransfer, StoreError, StoreResult, TransactionStore,
    TransferRequest,
};
use crate::status::{derive_overall_status, LedgerStatus, PaymentStatus};
use crate::timeline::build_timeline;

#[derive(Debug)]
pub enum TransferOutcome {
    /// The casino accepted the transfer; the transaction is fully completed.
    Credited(Transaction),
    /// The call failed or timed out; ledger status is `error` and the sweeper
    /// will retry.
    TransientFailure(Transaction),
    /// The transaction has no usable casino destination; ledger status is
    /// `failed` and no automatic retry will happen.
    MissingDestination(Transaction),
    /// Another worker holds or already finished this transfer. Nothing done.
    AlreadyHandled,
}

/// Attempt the casino credit for a payment-confirmed transaction exactly
/// once, recording the outcome in the store.
pub async fn run_ledger_transfer(
    store: &dyn TransactionStore,
    ledger: &dyn LedgerTransfer,
    tx: &Transaction,
) -> StoreResult<TransferOutcome> {
    if tx.payment_status != PaymentStatus::Completed {
        warn!(
            reference = %tx.reference,
            payment_status = tx.payment_status.as_str(),
            "transfer requested before payment confirmation, skipping"
        );
        return Ok(TransferOutcome::AlreadyHandled);
    }

    // Claim the attempt. Losing the compare-and-swap means a concurrent
    // worker owns it (or it is already completed/terminally failed).
    let mut claiming = tx.clone();
    claiming.ledger_status = LedgerStatus::Processing;
    claiming.updated_at = Utc::now();
    bump_attempt_counter(&mut claiming);
    claiming.timeline = build_timeline(&claiming);

    let claimed = match store
        .update_ledger_status(LedgerStatusUpdate {
            id: tx.id,
            expected: vec![LedgerStatus::Pending, LedgerStatus::Error],
            ledger_status: LedgerStatus::Processing,
            overall_status: derive_overall_status(tx.payment_status, LedgerStatus::Processing),
            casino_transfer_id: None,
            timeline: claiming.timeline.clone(),
            metadata: claiming.metadata.clone(),
            completed_at: None,
        })
        .await
    {
        Ok(t) => t,
        Err(StoreError::Conflict(reason)) => {
            debug!(reference = %tx.reference, %reason, "transfer already handled elsewhere");
            return Ok(TransferOutcome::AlreadyHandled);
        }
        Err(e) => return Err(e),
    };

    let (account_id, username) = match (
        claimed.casino_account_id.clone().filter(|s| !s.is_empty()),
        claimed.casino_username.clone().filter(|s| !s.is_empty()),
    ) {
        (Some(account_id), Some(username)) => (account_id, username),
        _ => {
            // Not transient: without destination identifiers no retry can
            // ever succeed. Freeze the ledger leg for manual intervention.
            let updated = record_outcome(
                store,
                &claimed,
                LedgerStatus::Failed,
                None,
                Some("missing casino account identifiers".to_string()),
            )
            .await?;
            warn!(
                reference = %claimed.reference,
                "casino destination missing, ledger leg frozen"
            );
            return Ok(TransferOutcome::MissingDestination(updated));
        }
    };

    let request = TransferRequest {
        amount: claimed.amount.clone(),
        account_id,
        username,
        nonce: claimed.reference.clone(),
    };

    match ledger.transfer(request).await {
        Ok(receipt) if receipt.success => {
            let updated = record_outcome(
                store,
                &claimed,
                LedgerStatus::Completed,
                receipt.transfer_id,
                None,
            )
            .await?;
            Ok(TransferOutcome::Credited(updated))
        }
        Ok(receipt) => {
            let reason = receipt
                .message
                .unwrap_or_else(|| "transfer rejected by casino".to_string());
            let updated =
                record_outcome(store, &claimed, LedgerStatus::Error, None, Some(reason)).await?;
            Ok(TransferOutcome::TransientFailure(updated))
        }
        Err(e) => {
            let updated =
                record_outcome(store, &claimed, LedgerStatus::Error, None, Some(e.to_string()))
                    .await?;
            Ok(TransferOutcome::TransientFailure(updated))
        }
    }
}

async fn record_outcome(
    store: &dyn TransactionStore,
    claimed: &Transaction,
    ledger_status: LedgerStatus,
    transfer_id: Option<String>,
    error: Option<String>,
) -> StoreResult<Transaction> {
    let now = Utc::now();
    let mut next = claimed.clone();
    next.ledger_status = ledger_status;
    next.updated_at = now;
    if let Some(message) = &error {
        next.merge_metadata(json!({ "ledger_error": message }));
    }
    if ledger_status == LedgerStatus::Completed {
        next.casino_transfer_id = transfer_id.clone();
        next.completed_at = Some(now);
    }
    next.timeline = build_timeline(&next);

    store
        .update_ledger_status(LedgerStatusUpdate {
            id: claimed.id,
            expected: vec![LedgerStatus::Processing],
            ledger_status,
            overall_status: derive_overall_status(claimed.payment_status, ledger_status),
            casino_transfer_id: transfer_id,
            timeline: next.timeline.clone(),
            metadata: next.metadata.clone(),
            completed_at: if ledger_status == LedgerStatus::Completed {
                Some(now)
            } else {
                None
            },
        })
        .await
}

fn bump_attempt_counter(tx: &mut Transaction) {
    let attempts = tx
        .metadata
        .get("transfer_attempts")
        .and_then(|v| v.as_u64())
        .unwrap_or(0);
    tx.merge_metadata(json!({ "transfer_attempts": attempts + 1 }));
}
