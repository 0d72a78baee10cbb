use tokio::{sync::watch, time::sleep};
use worker::{
    bootstrap::build_state,
    config::AppConfig,
    repositories::PortfolioStore,
    services::{refresh_with_retry, RetryPolicy},
    telemetry,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    telemetry::init_tracing()?;

    let config = AppConfig::from_env()?;
    if let Some(port) = config.metrics_port {
        telemetry::install_metrics_exporter(port)?;
    }

    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
    let state = build_state(&config, Some(shutdown_rx.clone())).await?;

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("shutdown requested, finishing in-flight wallets");
            let _ = shutdown_tx.send(true);
        }
    });

    let retry = RetryPolicy {
        max_attempts: config.refresh_max_attempts,
        backoff: config.refresh_backoff,
    };
    tracing::info!(
        interval_secs = config.refresh_interval.as_secs(),
        max_attempts = retry.max_attempts,
        "refresh worker started"
    );

    loop {
        match state.store.list_wallets().await {
            Ok(wallets) => {
                let outcome = refresh_with_retry(
                    state.portfolio.as_ref(),
                    wallets,
                    retry,
                    Some(shutdown_rx.clone()),
                )
                .await;
                match outcome {
                    Ok(summary) => tracing::info!(
                        total = summary.total,
                        succeeded = summary.succeeded,
                        failed = summary.failed,
                        skipped = summary.skipped,
                        "refresh cycle done"
                    ),
                    Err(err) => tracing::error!(error = %err, "refresh cycle failed"),
                }
            }
            // 資料庫暫時不可用時等下一輪再試
            Err(err) => tracing::error!(error = %err, "failed to list wallets"),
        }

        if *shutdown_rx.borrow() {
            break;
        }
        tokio::select! {
            _ = sleep(config.refresh_interval) => {}
            Ok(()) = shutdown_rx.changed() => break,
        }
    }

    state.db.close().await;
    tracing::info!("refresh worker stopped");
    Ok(())
}
