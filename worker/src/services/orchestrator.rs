use std::{sync::Arc, time::Duration};

use domain::{RefreshSummary, Wallet, WalletFailure};
use indexer::{IngestError, IngestResult, PortfolioService};
use tokio::{
    sync::{watch, OwnedSemaphorePermit, Semaphore},
    task::JoinHandle,
    time::{sleep, Instant},
};
use tracing::{error, info, warn};
use uuid::Uuid;

use super::{portfolio::DbPortfolioService, upstream::PortfolioSource};

impl<P> DbPortfolioService<P>
where
    P: PortfolioSource + 'static,
{
    fn is_shutting_down(&self) -> bool {
        self.shutdown
            .as_ref()
            .map(|rx| *rx.borrow())
            .unwrap_or(false)
    }

    /// `None` when shutdown was requested while waiting for a free slot.
    async fn acquire_slot(&self, semaphore: &Arc<Semaphore>) -> Option<OwnedSemaphorePermit> {
        match &self.shutdown {
            Some(rx) => {
                tokio::select! {
                    permit = semaphore.clone().acquire_owned() => permit.ok(),
                    _ = shutdown_requested(rx.clone()) => None,
                }
            }
            None => semaphore.clone().acquire_owned().await.ok(),
        }
    }

    /// Refreshes every wallet on its own task. One wallet failing never stops the others;
    /// the batch only errors when every wallet failed, carrying the last error seen.
    pub(super) async fn refresh_wallets(
        &self,
        wallets: Vec<Wallet>,
    ) -> IngestResult<RefreshSummary> {
        let mut summary = RefreshSummary {
            total: wallets.len(),
            ..RefreshSummary::default()
        };
        info!(
            wallet_count = summary.total,
            max_concurrency = self.options.max_concurrency,
            ingest_swaps = self.options.ingest_swaps,
            "starting wallet refresh"
        );

        let semaphore = Arc::new(Semaphore::new(self.options.max_concurrency));
        let mut handles: Vec<(Uuid, String, JoinHandle<IngestResult<()>>)> =
            Vec::with_capacity(wallets.len());

        for wallet in wallets {
            if self.is_shutting_down() {
                summary.skipped += 1;
                continue;
            }
            let Some(permit) = self.acquire_slot(&semaphore).await else {
                summary.skipped += 1;
                continue;
            };
            let service = self.clone();
            let (wallet_id, address) = (wallet.id, wallet.address.clone());
            handles.push((
                wallet_id,
                address,
                tokio::spawn(async move {
                    let _permit = permit;
                    let started = Instant::now();
                    let result = service.refresh_wallet(&wallet).await;
                    let outcome = if result.is_ok() { "ok" } else { "error" };
                    metrics::counter!("wallet_refresh_total", "outcome" => outcome).increment(1);
                    metrics::histogram!("wallet_refresh_duration_seconds")
                        .record(started.elapsed().as_secs_f64());
                    result
                }),
            ));
        }

        let mut last_error = None;
        for (wallet_id, address, handle) in handles {
            let err = match handle.await {
                Ok(Ok(())) => {
                    summary.succeeded += 1;
                    continue;
                }
                Ok(Err(err)) => err,
                // a panicking task never reached commit
                Err(join_err) => {
                    IngestError::Persistence(format!("refresh task aborted: {join_err}"))
                }
            };
            warn!(
                error = %err,
                %wallet_id,
                wallet = %address,
                retryable = err.is_retryable(),
                "failed to refresh wallet"
            );
            summary.failed += 1;
            summary.failures.push(WalletFailure {
                wallet_id,
                address,
                error: err.to_string(),
            });
            last_error = Some(err);
        }

        info!(
            total = summary.total,
            succeeded = summary.succeeded,
            failed = summary.failed,
            skipped = summary.skipped,
            "wallet refresh finished"
        );

        if summary.all_failed() {
            if let Some(err) = last_error {
                let failed: Vec<&str> =
                    summary.failures.iter().map(|f| f.address.as_str()).collect();
                error!(error = %err, ?failed, "every wallet failed to refresh");
                return Err(err);
            }
        }
        Ok(summary)
    }
}

/// Resolves once the flag is `true`; never resolves if the sender is gone.
async fn shutdown_requested(mut rx: watch::Receiver<bool>) {
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_secs(60),
        }
    }
}

/// Re-runs a batch that failed as a whole, waiting a fixed backoff between attempts.
/// A shutdown during the backoff ends the retries with the last error.
pub async fn refresh_with_retry(
    service: &dyn PortfolioService,
    wallets: Vec<Wallet>,
    policy: RetryPolicy,
    shutdown: Option<watch::Receiver<bool>>,
) -> IngestResult<RefreshSummary> {
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;
    loop {
        attempt += 1;
        match service.refresh_all(wallets.clone()).await {
            Ok(summary) => return Ok(summary),
            Err(err) if err.is_retryable() && attempt < max_attempts => {
                warn!(
                    error = %err,
                    attempt,
                    max_attempts,
                    backoff_secs = policy.backoff.as_secs(),
                    "refresh batch failed, retrying"
                );
                let interrupted = match &shutdown {
                    Some(rx) => {
                        tokio::select! {
                            _ = sleep(policy.backoff) => false,
                            _ = shutdown_requested(rx.clone()) => true,
                        }
                    }
                    None => {
                        sleep(policy.backoff).await;
                        false
                    }
                };
                if interrupted {
                    info!(attempt, "shutdown requested, abandoning retries");
                    return Err(err);
                }
            }
            Err(err) => return Err(err),
        }
    }
}
