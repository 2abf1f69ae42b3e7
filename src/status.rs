//! Dual-status model for reconciled transactions.
//!
//! A transaction carries two independently-updated sub-statuses: the payment
//! gateway's view and the casino ledger's view. The overall status shown to
//! callers is always derived from the pair, never mutated on its own.

use serde::{Deserialize, Serialize};

pub mod providers;

/// Payment gateway leg of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Expired,
    Cancelled,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Processing => "processing",
            PaymentStatus::Completed => "completed",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Expired => "expired",
            PaymentStatus::Cancelled => "cancelled",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(PaymentStatus::Pending),
            "processing" => Some(PaymentStatus::Processing),
            "completed" => Some(PaymentStatus::Completed),
            "failed" => Some(PaymentStatus::Failed),
            "expired" => Some(PaymentStatus::Expired),
            "cancelled" => Some(PaymentStatus::Cancelled),
            _ => None,
        }
    }

    /// Terminal payment states never regress, regardless of later webhooks.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PaymentStatus::Completed
                | PaymentStatus::Failed
                | PaymentStatus::Expired
                | PaymentStatus::Cancelled
        )
    }
}

/// Casino ledger leg of a transaction.
///
/// `Failed` is permanent (destination account unusable, operator must step
/// in); `Error` is transient (RPC failed or timed out, the sweeper retries).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Error,
}

impl LedgerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LedgerStatus::Pending => "pending",
            LedgerStatus::Processing => "processing",
            LedgerStatus::Completed => "completed",
            LedgerStatus::Failed => "failed",
            LedgerStatus::Error => "error",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(LedgerStatus::Pending),
            "processing" => Some(LedgerStatus::Processing),
            "completed" => Some(LedgerStatus::Completed),
            "failed" => Some(LedgerStatus::Failed),
            "error" => Some(LedgerStatus::Error),
            _ => None,
        }
    }

    /// Statuses from which a transfer attempt may be claimed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, LedgerStatus::Pending | LedgerStatus::Error)
    }
}

/// Overall status derived from the (payment, ledger) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverallStatus {
    Pending,
    Processing,
    PaymentCompleted,
    Completed,
    Failed,
    Expired,
    Cancelled,
}

impl OverallStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OverallStatus::Pending => "pending",
            OverallStatus::Processing => "processing",
            OverallStatus::PaymentCompleted => "payment_completed",
            OverallStatus::Completed => "completed",
            OverallStatus::Failed => "failed",
            OverallStatus::Expired => "expired",
            OverallStatus::Cancelled => "cancelled",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(OverallStatus::Pending),
            "processing" => Some(OverallStatus::Processing),
            "payment_completed" => Some(OverallStatus::PaymentCompleted),
            "completed" => Some(OverallStatus::Completed),
            "failed" => Some(OverallStatus::Failed),
            "expired" => Some(OverallStatus::Expired),
            "cancelled" => Some(OverallStatus::Cancelled),
            _ => None,
        }
    }
}

/// Derive the overall status from the two legs.
///
/// Once the payment is captured, a failed or still-pending ledger leg keeps
/// the transaction in `PaymentCompleted` rather than `Failed`: the money was
/// received and only the internal credit step is outstanding.
pub fn derive_overall_status(payment: PaymentStatus, ledger: LedgerStatus) -> OverallStatus {
    match payment {
        PaymentStatus::Completed => match ledger {
            LedgerStatus::Completed => OverallStatus::Completed,
            _ => OverallStatus::PaymentCompleted,
        },
        PaymentStatus::Failed => OverallStatus::Failed,
        PaymentStatus::Expired => OverallStatus::Expired,
        PaymentStatus::Cancelled => OverallStatus::Cancelled,
        PaymentStatus::Pending | PaymentStatus::Processing => match ledger {
            // Should not happen before payment confirmation, but the function
            // is total: a failed ledger leg without a captured payment is a
            // failed transaction.
            LedgerStatus::Failed | LedgerStatus::Error => OverallStatus::Failed,
            _ => {
                if payment == PaymentStatus::Pending {
                    OverallStatus::Pending
                } else {
                    OverallStatus::Processing
                }
            }
        },
    }
}
