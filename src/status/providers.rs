//! Provider-specific raw-status mapping.
//!
//! Gateways are inconsistent about casing and wording, so every raw status
//! goes through the provider selected by the transaction's payment method
//! tag. Anything unrecognized maps to `Processing` rather than erroring; a
//! strict mapper would silently drop legitimate completions.

use crate::status::PaymentStatus;

pub const PROVIDER_DIRECTPAY: &str = "directpay";
pub const PROVIDER_PAYGRAM: &str = "paygram";
pub const PROVIDER_MANUAL: &str = "manual";

pub trait PaymentProvider: Send + Sync {
    fn name(&self) -> &'static str;

    /// Map a raw gateway status string to the internal enum. Total: never
    /// panics, unknown or empty input yields `Processing`.
    fn map_status(&self, raw: &str) -> PaymentStatus;
}

/// DirectPay QR gateway.
pub struct DirectPay;

impl PaymentProvider for DirectPay {
    fn name(&self) -> &'static str {
        PROVIDER_DIRECTPAY
    }

    fn map_status(&self, raw: &str) -> PaymentStatus {
        match raw.trim().to_ascii_lowercase().as_str() {
            "success" | "successful" | "paid" | "partially_paid" | "completed" | "complete"
            | "settled" => PaymentStatus::Completed,
            "failed" | "failure" | "declined" | "rejected" => PaymentStatus::Failed,
            "expired" | "timed_out" | "timeout" => PaymentStatus::Expired,
            "cancelled" | "canceled" | "voided" => PaymentStatus::Cancelled,
            "pending" | "created" | "unpaid" | "waiting_for_payment" => PaymentStatus::Pending,
            _ => PaymentStatus::Processing,
        }
    }
}

/// Paygram invoice gateway. Same state machine, different vocabulary.
pub struct Paygram;

impl PaymentProvider for Paygram {
    fn name(&self) -> &'static str {
        PROVIDER_PAYGRAM
    }

    fn map_status(&self, raw: &str) -> PaymentStatus {
        match raw.trim().to_ascii_lowercase().as_str() {
            "paid" | "confirmed" | "success" | "completed" | "overpaid" => {
                PaymentStatus::Completed
            }
            "failed" | "invalid" | "underpaid" => PaymentStatus::Failed,
            "expired" => PaymentStatus::Expired,
            "cancelled" | "canceled" => PaymentStatus::Cancelled,
            "new" | "pending" | "waiting" => PaymentStatus::Pending,
            _ => PaymentStatus::Processing,
        }
    }
}

/// Manual adjustments entered by an operator. Statuses arrive already
/// normalized, so only the canonical names are accepted.
pub struct Manual;

impl PaymentProvider for Manual {
    fn name(&self) -> &'static str {
        PROVIDER_MANUAL
    }

    fn map_status(&self, raw: &str) -> PaymentStatus {
        PaymentStatus::from_str(raw.trim().to_ascii_lowercase().as_str())
            .unwrap_or(PaymentStatus::Processing)
    }
}

/// Select the provider for a transaction's payment method tag. Unknown tags
/// fall back to DirectPay semantics, which carries the broadest synonym set.
pub fn provider_for(tag: &str) -> &'static dyn PaymentProvider {
    static DIRECTPAY: DirectPay = DirectPay;
    static PAYGRAM: Paygram = Paygram;
    static MANUAL: Manual = Manual;

    match tag.trim().to_ascii_lowercase().as_str() {
        PROVIDER_PAYGRAM => &PAYGRAM,
        PROVIDER_MANUAL => &MANUAL,
        _ => &DIRECTPAY,
    }
}
