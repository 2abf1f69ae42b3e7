//! Reconciliation sweeper.
//!
//! Periodic background worker with two duties per tick: retry casino credits
//! for transactions whose payment is captured but whose ledger leg is still
//! outstanding, and expire deposits that never saw a payment confirmation.
//! One logical worker only: a tick that fires while the previous sweep is
//! still running is skipped, not queued.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::domain::Transaction;
use crate::ports::{LedgerTransfer, PaymentStatusUpdate, StoreResult, TransactionStore};
use crate::services::transfer::{run_ledger_transfer, TransferOutcome};
use crate::status::{derive_overall_status, PaymentStatus};
use crate::timeline::build_timeline;

#[derive(Debug, Clone)]
pub struct SweeperConfig {
    pub interval: Duration,
    pub batch_size: i64,
    pub payment_expiry: Duration,
}

impl SweeperConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            interval: config.sweep_interval,
            batch_size: config.sweep_batch_size,
            payment_expiry: config.payment_expiry,
        }
    }
}

#[derive(Debug, Default)]
pub struct SweepSummary {
    pub retried: usize,
    pub credited: usize,
    pub failed_permanently: usize,
    pub expired: usize,
    pub errors: usize,
    /// True when the tick was skipped because a sweep was already running.
    pub skipped: bool,
}

impl SweepSummary {
    pub fn is_empty(&self) -> bool {
        self.retried == 0 && self.expired == 0 && self.errors == 0 && !self.skipped
    }
}

pub struct ReconciliationSweeper {
    store: Arc<dyn TransactionStore>,
    ledger: Arc<dyn LedgerTransfer>,
    config: SweeperConfig,
    running: AtomicBool,
}

impl ReconciliationSweeper {
    pub fn new(
        store: Arc<dyn TransactionStore>,
        ledger: Arc<dyn LedgerTransfer>,
        config: SweeperConfig,
    ) -> Self {
        Self {
            store,
            ledger,
            config,
            running: AtomicBool::new(false),
        }
    }

    pub async fn run(self: Arc<Self>, mut shutdown_rx: watch::Receiver<bool>) {
        info!(
            interval_secs = self.config.interval.as_secs(),
            batch_size = self.config.batch_size,
            "reconciliation sweeper started"
        );

        let mut interval = tokio::time::interval(self.config.interval);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let summary = self.sweep().await;
                    if !summary.is_empty() {
                        info!(
                            retried = summary.retried,
                            credited = summary.credited,
                            failed_permanently = summary.failed_permanently,
                            expired = summary.expired,
                            errors = summary.errors,
                            "sweep finished"
                        );
                    }
                }
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("reconciliation sweeper received shutdown signal");
                        break;
                    }
                }
            }
        }

        info!("reconciliation sweeper stopped");
    }

    /// One sweep pass. Every item is handled independently; a failure on one
    /// transaction never aborts the rest of the batch.
    pub async fn sweep(&self) -> SweepSummary {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("sweep already in progress, skipping tick");
            return SweepSummary {
                skipped: true,
                ..Default::default()
            };
        }

        let mut summary = SweepSummary::default();
        self.retry_stuck_transfers(&mut summary).await;
        self.expire_stale_payments(&mut summary).await;

        self.running.store(false, Ordering::SeqCst);
        summary
    }

    async fn retry_stuck_transfers(&self, summary: &mut SweepSummary) {
        let batch = match self.store.list_stuck_transfers(self.config.batch_size).await {
            Ok(batch) => batch,
            Err(e) => {
                error!(error = %e, "failed to list stuck transfers");
                summary.errors += 1;
                return;
            }
        };

        for tx in batch {
            summary.retried += 1;
            match run_ledger_transfer(self.store.as_ref(), self.ledger.as_ref(), &tx).await {
                Ok(TransferOutcome::Credited(t)) => {
                    summary.credited += 1;
                    info!(
                        reference = %t.reference,
                        transfer_id = ?t.casino_transfer_id,
                        "stuck transfer credited"
                    );
                }
                Ok(TransferOutcome::TransientFailure(t)) => {
                    warn!(reference = %t.reference, "transfer still failing, will retry next sweep");
                }
                Ok(TransferOutcome::MissingDestination(t)) => {
                    summary.failed_permanently += 1;
                    warn!(reference = %t.reference, "transfer frozen, casino destination missing");
                }
                Ok(TransferOutcome::AlreadyHandled) => {
                    debug!(reference = %tx.reference, "transfer claimed by another worker");
                }
                Err(e) => {
                    summary.errors += 1;
                    error!(reference = %tx.reference, error = %e, "error retrying stuck transfer");
                }
            }
        }
    }

    async fn expire_stale_payments(&self, summary: &mut SweepSummary) {
        let expiry = chrono::Duration::from_std(self.config.payment_expiry)
            .unwrap_or_else(|_| chrono::Duration::minutes(30));
        let cutoff = Utc::now() - expiry;

        let batch = match self
            .store
            .list_expired_pending(cutoff, self.config.batch_size)
            .await
        {
            Ok(batch) => batch,
            Err(e) => {
                error!(error = %e, "failed to list expired deposits");
                summary.errors += 1;
                return;
            }
        };

        for tx in batch {
            match self.expire_one(&tx).await {
                Ok(_) => {
                    summary.expired += 1;
                    info!(reference = %tx.reference, "unpaid deposit expired");
                }
                Err(e) => {
                    summary.errors += 1;
                    error!(reference = %tx.reference, error = %e, "error expiring deposit");
                }
            }
        }
    }

    /// Expire a single unpaid deposit. Only the payment leg is touched:
    /// nothing was ever credited, so the ledger status stays as it is.
    async fn expire_one(&self, tx: &Transaction) -> StoreResult<Transaction> {
        let mut next = tx.clone();
        next.payment_status = PaymentStatus::Expired;
        next.updated_at = Utc::now();
        next.overall_status = derive_overall_status(PaymentStatus::Expired, next.ledger_status);
        next.timeline = build_timeline(&next);

        self.store
            .update_payment_status(PaymentStatusUpdate {
                id: next.id,
                payment_status: next.payment_status,
                overall_status: next.overall_status,
                timeline: next.timeline.clone(),
                metadata: next.metadata.clone(),
            })
            .await
    }
}
