//! Transaction domain entity.
//! Framework-agnostic representation of a wallet transaction and its audit
//! timeline.

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::status::{derive_overall_status, LedgerStatus, OverallStatus, PaymentStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Deposit,
    Withdraw,
    Transfer,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Deposit => "deposit",
            TransactionKind::Withdraw => "withdraw",
            TransactionKind::Transfer => "transfer",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "deposit" => Some(TransactionKind::Deposit),
            "withdraw" => Some(TransactionKind::Withdraw),
            "transfer" => Some(TransactionKind::Transfer),
            _ => None,
        }
    }
}

/// One row of the append-only audit timeline attached to a transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimelineEntry {
    pub status: String,
    pub label: String,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl TimelineEntry {
    pub fn new(status: &str, label: &str, timestamp: DateTime<Utc>) -> Self {
        Self {
            status: status.to_string(),
            label: label.to_string(),
            timestamp,
            note: None,
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

/// Domain entity representing a wallet transaction.
#[derive(Debug, Clone, Serialize)]
pub struct Transaction {
    pub id: Uuid,
    /// Globally-unique external reference; immutable once created. Webhook
    /// replays and transfer retries all key off it.
    pub reference: String,
    pub user_id: Uuid,
    pub amount: BigDecimal,
    pub currency: String,
    pub kind: TransactionKind,
    pub payment_method: String,
    pub payment_status: PaymentStatus,
    pub ledger_status: LedgerStatus,
    pub overall_status: OverallStatus,
    pub casino_transfer_id: Option<String>,
    pub casino_account_id: Option<String>,
    pub casino_username: Option<String>,
    pub timeline: Vec<TimelineEntry>,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Transaction {
    /// New deposit in the initial pending/pending state.
    #[allow(clippy::too_many_arguments)]
    pub fn new_deposit(
        reference: String,
        user_id: Uuid,
        amount: BigDecimal,
        currency: String,
        payment_method: String,
        casino_account_id: Option<String>,
        casino_username: Option<String>,
        metadata: Option<serde_json::Value>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            reference,
            user_id,
            amount,
            currency,
            kind: TransactionKind::Deposit,
            payment_method,
            payment_status: PaymentStatus::Pending,
            ledger_status: LedgerStatus::Pending,
            overall_status: derive_overall_status(PaymentStatus::Pending, LedgerStatus::Pending),
            casino_transfer_id: None,
            casino_account_id,
            casino_username,
            timeline: Vec::new(),
            metadata: metadata.unwrap_or_else(|| serde_json::json!({})),
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    pub fn overall(&self) -> OverallStatus {
        derive_overall_status(self.payment_status, self.ledger_status)
    }

    /// Whether the transaction carries the identifiers the casino transfer
    /// needs. Without them the ledger leg can never succeed.
    pub fn has_casino_destination(&self) -> bool {
        self.casino_account_id
            .as_deref()
            .map(|s| !s.is_empty())
            .unwrap_or(false)
            && self
                .casino_username
                .as_deref()
                .map(|s| !s.is_empty())
                .unwrap_or(false)
    }

    /// Merge provider payload extras and error strings into the metadata bag.
    /// Existing keys not present in the patch are preserved.
    pub fn merge_metadata(&mut self, extra: serde_json::Value) {
        match (self.metadata.as_object_mut(), extra.as_object()) {
            (Some(base), Some(patch)) => {
                for (k, v) in patch {
                    base.insert(k.clone(), v.clone());
                }
            }
            _ => {
                if !extra.is_null() {
                    self.metadata = extra;
                }
            }
        }
    }
}
