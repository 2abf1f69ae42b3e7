//! Webhook ingestion core.
//!
//! Parses and validates gateway notifications, maps the raw status through
//! the transaction's payment provider, persists the payment leg, and on the
//! first confirmation triggers the casino transfer. Ledger-leg failures are
//! absorbed: the payment genuinely happened, so the webhook is still
//! acknowledged and the sweeper picks the credit up later.

use std::sync::Arc;

use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::domain::TransactionKind;
use crate::error::AppError;
use crate::ports::{LedgerTransfer, PaymentStatusUpdate, StoreError, TransactionStore};
use crate::services::transfer::{run_ledger_transfer, TransferOutcome};
use crate::status::providers::provider_for;
use crate::status::{derive_overall_status, OverallStatus, PaymentStatus};
use crate::timeline::build_timeline;

/// Raw gateway notification. Gateways disagree on field names, so the known
/// synonyms are modeled as explicit aliases and everything unrecognized is
/// kept opaquely for the metadata bag.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentWebhookPayload {
    #[serde(default, alias = "ref", alias = "external_id", alias = "reference_id")]
    pub reference: Option<String>,
    #[serde(default, alias = "payment_status", alias = "state")]
    pub status: Option<String>,
    #[serde(default, alias = "invoice", alias = "invoiceId")]
    pub invoice_id: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, alias = "amount_paid")]
    pub amount: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl PaymentWebhookPayload {
    fn reference(&self) -> Option<&str> {
        self.reference.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }

    fn raw_status(&self) -> Option<&str> {
        self.status.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }

    /// Provider-specific debugging payload folded into the transaction's
    /// metadata bag. Never required for correctness.
    fn metadata_patch(&self, provider: &str) -> Value {
        let mut patch = Map::new();
        patch.insert("provider".to_string(), json!(provider));
        if let Some(status) = self.raw_status() {
            patch.insert("gateway_status".to_string(), json!(status));
        }
        if let Some(invoice_id) = &self.invoice_id {
            patch.insert("invoice_id".to_string(), json!(invoice_id));
        }
        if let Some(description) = &self.description {
            patch.insert("description".to_string(), json!(description));
        }
        if let Some(amount) = &self.amount {
            patch.insert("gateway_amount".to_string(), amount.clone());
        }
        if !self.extra.is_empty() {
            patch.insert("gateway_extra".to_string(), Value::Object(self.extra.clone()));
        }
        Value::Object(patch)
    }
}

#[derive(Debug)]
pub struct WebhookOutcome {
    pub transaction_id: Uuid,
    pub reference: String,
    pub payment_status: PaymentStatus,
    pub overall_status: OverallStatus,
    /// True when the webhook was a replay for an already-settled payment leg
    /// and nothing was changed.
    pub replayed: bool,
}

pub struct WebhookService {
    store: Arc<dyn TransactionStore>,
    ledger: Arc<dyn LedgerTransfer>,
}

impl WebhookService {
    pub fn new(store: Arc<dyn TransactionStore>, ledger: Arc<dyn LedgerTransfer>) -> Self {
        Self { store, ledger }
    }

    pub async fn handle_payment_webhook(
        &self,
        payload: PaymentWebhookPayload,
    ) -> Result<WebhookOutcome, AppError> {
        let reference = payload
            .reference()
            .ok_or_else(|| AppError::InvalidPayload("missing reference".to_string()))?
            .to_string();
        let raw_status = payload
            .raw_status()
            .ok_or_else(|| AppError::InvalidPayload("missing status".to_string()))?
            .to_string();

        // Unknown references are rejected, never materialized: a replayed
        // webhook for a reference we do not track must not create state.
        let tx = self.store.get_by_reference(&reference).await.map_err(|e| match e {
            StoreError::NotFound(_) => {
                AppError::NotFound(format!("transaction {} not found", reference))
            }
            other => other.into(),
        })?;

        let provider = provider_for(&tx.payment_method);
        let mapped = provider.map_status(&raw_status);

        if tx.payment_status.is_terminal() {
            if mapped == tx.payment_status {
                debug!(%reference, status = mapped.as_str(), "webhook replay, no-op");
            } else {
                warn!(
                    %reference,
                    current = tx.payment_status.as_str(),
                    incoming = mapped.as_str(),
                    raw = %raw_status,
                    "conflicting webhook for settled payment leg ignored"
                );
            }
            return Ok(WebhookOutcome {
                transaction_id: tx.id,
                reference,
                payment_status: tx.payment_status,
                overall_status: tx.overall_status,
                replayed: true,
            });
        }

        let confirming =
            tx.payment_status != PaymentStatus::Completed && mapped == PaymentStatus::Completed;

        let mut next = tx.clone();
        next.payment_status = mapped;
        next.updated_at = Utc::now();
        next.merge_metadata(payload.metadata_patch(provider.name()));
        next.overall_status = derive_overall_status(mapped, next.ledger_status);
        next.timeline = build_timeline(&next);

        let updated = self
            .store
            .update_payment_status(PaymentStatusUpdate {
                id: next.id,
                payment_status: next.payment_status,
                overall_status: next.overall_status,
                timeline: next.timeline.clone(),
                metadata: next.metadata.clone(),
            })
            .await?;

        info!(
            %reference,
            provider = provider.name(),
            raw = %raw_status,
            status = mapped.as_str(),
            overall = updated.overall_status.as_str(),
            "payment webhook processed"
        );

        if !(confirming && updated.kind == TransactionKind::Deposit) {
            return Ok(WebhookOutcome {
                transaction_id: updated.id,
                reference,
                payment_status: updated.payment_status,
                overall_status: updated.overall_status,
                replayed: false,
            });
        }

        // First confirmation of the payment leg: credit the casino now.
        // Whatever happens to the transfer, the webhook itself succeeded.
        let final_tx = match run_ledger_transfer(self.store.as_ref(), self.ledger.as_ref(), &updated)
            .await
        {
            Ok(TransferOutcome::Credited(t)) => {
                info!(%reference, transfer_id = ?t.casino_transfer_id, "casino credit completed");
                t
            }
            Ok(TransferOutcome::TransientFailure(t)) => {
                warn!(%reference, "casino credit failed, sweeper will retry");
                t
            }
            Ok(TransferOutcome::MissingDestination(t)) => {
                warn!(%reference, "casino credit impossible, destination missing");
                t
            }
            Ok(TransferOutcome::AlreadyHandled) => {
                self.store.get_by_id(updated.id).await.unwrap_or(updated)
            }
            Err(e) => {
                error!(%reference, error = %e, "failed to record casino transfer outcome");
                self.store.get_by_id(updated.id).await.unwrap_or(updated)
            }
        };

        Ok(WebhookOutcome {
            transaction_id: final_tx.id,
            reference,
            payment_status: final_tx.payment_status,
            overall_status: final_tx.overall_status,
            replayed: false,
        })
    }
}
