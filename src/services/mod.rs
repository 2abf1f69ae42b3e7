pub mod sweeper;
pub mod transfer;
pub mod webhook;

pub use sweeper::{ReconciliationSweeper, SweepSummary, SweeperConfig};
pub use transfer::{run_ledger_transfer, TransferOutcome};
pub use webhook::{PaymentWebhookPayload, WebhookOutcome, WebhookService};
