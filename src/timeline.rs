//! Audit timeline synthesis.
//!
//! The timeline is the durable, human-readable history attached to each
//! transaction. Recorded entries are never rewritten; the builder only
//! appends entries for states the transaction has reached that are not yet
//! represented, so it can back-fill gaps (a transaction that jumped straight
//! to completed still gets its "payment received" row) and can be re-run any
//! number of times without duplicating anything.

use chrono::{DateTime, Utc};

use crate::domain::{TimelineEntry, Transaction};
use crate::status::{LedgerStatus, PaymentStatus};

pub const STATUS_CREATED: &str = "created";
pub const STATUS_PAYMENT_PROCESSING: &str = "payment_processing";
pub const STATUS_PAYMENT_COMPLETED: &str = "payment_completed";
pub const STATUS_PAYMENT_FAILED: &str = "payment_failed";
pub const STATUS_PAYMENT_EXPIRED: &str = "payment_expired";
pub const STATUS_PAYMENT_CANCELLED: &str = "payment_cancelled";
pub const STATUS_LEDGER_PROCESSING: &str = "ledger_processing";
pub const STATUS_LEDGER_COMPLETED: &str = "ledger_completed";
pub const STATUS_LEDGER_FAILED: &str = "ledger_failed";
pub const STATUS_LEDGER_ERROR: &str = "ledger_error";

/// Rebuild the display timeline from the transaction's current state.
/// Returns the existing entries plus any missing ones, in order of append.
pub fn build_timeline(tx: &Transaction) -> Vec<TimelineEntry> {
    let mut entries = tx.timeline.clone();

    push_if_missing(
        &mut entries,
        TimelineEntry::new(STATUS_CREATED, "Deposit requested", tx.created_at),
    );

    let payment_ts = payment_timestamp(tx);
    match tx.payment_status {
        PaymentStatus::Pending => {}
        PaymentStatus::Processing => push_if_missing(
            &mut entries,
            TimelineEntry::new(STATUS_PAYMENT_PROCESSING, "Payment in progress", payment_ts),
        ),
        PaymentStatus::Completed => push_if_missing(
            &mut entries,
            TimelineEntry::new(STATUS_PAYMENT_COMPLETED, "Payment received", payment_ts),
        ),
        PaymentStatus::Failed => push_if_missing(
            &mut entries,
            TimelineEntry::new(STATUS_PAYMENT_FAILED, "Payment failed", payment_ts),
        ),
        PaymentStatus::Expired => push_if_missing(
            &mut entries,
            TimelineEntry::new(STATUS_PAYMENT_EXPIRED, "Payment window expired", payment_ts),
        ),
        PaymentStatus::Cancelled => push_if_missing(
            &mut entries,
            TimelineEntry::new(STATUS_PAYMENT_CANCELLED, "Payment cancelled", payment_ts),
        ),
    }

    // Any ledger activity implies the payment leg finished, even when that
    // intermediate state was never explicitly recorded.
    if tx.ledger_status != LedgerStatus::Pending {
        push_if_missing(
            &mut entries,
            TimelineEntry::new(STATUS_PAYMENT_COMPLETED, "Payment received", payment_ts),
        );
    }

    let ledger_note = tx
        .metadata
        .get("ledger_error")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string());

    match tx.ledger_status {
        LedgerStatus::Pending => {}
        LedgerStatus::Processing => push_if_missing(
            &mut entries,
            TimelineEntry::new(
                STATUS_LEDGER_PROCESSING,
                "Casino credit in progress",
                tx.updated_at,
            ),
        ),
        LedgerStatus::Completed => push_if_missing(
            &mut entries,
            TimelineEntry::new(
                STATUS_LEDGER_COMPLETED,
                "Casino balance credited",
                tx.completed_at.unwrap_or(tx.updated_at),
            ),
        ),
        LedgerStatus::Failed => {
            let mut entry =
                TimelineEntry::new(STATUS_LEDGER_FAILED, "Casino credit failed", tx.updated_at);
            if let Some(note) = ledger_note {
                entry = entry.with_note(note);
            }
            push_if_missing(&mut entries, entry);
        }
        LedgerStatus::Error => {
            let mut entry = TimelineEntry::new(
                STATUS_LEDGER_ERROR,
                "Casino credit delayed, retrying",
                tx.updated_at,
            );
            if let Some(note) = ledger_note {
                entry = entry.with_note(note);
            }
            push_if_missing(&mut entries, entry);
        }
    }

    entries
}

fn payment_timestamp(tx: &Transaction) -> DateTime<Utc> {
    if tx.payment_status == PaymentStatus::Pending {
        tx.created_at
    } else {
        tx.updated_at
    }
}

fn push_if_missing(entries: &mut Vec<TimelineEntry>, entry: TimelineEntry) {
    if !entries.iter().any(|e| e.status == entry.status) {
        entries.push(entry);
    }
}
