//! Long-running mode: open the store, optionally reconcile, resume watchers
//! and wait for a termination signal.

use anyhow::Context;
use tracing::{error, info, warn};

use filetracker_config::{DatabaseTarget, TrackerConfig};
use filetracker_core::{DatabaseContext, FileTracker};

/// Open the configured store, apply migrations and compose the tracker.
pub async fn open_tracker(config: &TrackerConfig) -> anyhow::Result<FileTracker> {
    let store_options = config.store_options();
    let context = match config.database.target() {
        DatabaseTarget::Url(url) => DatabaseContext::connect(&url, &store_options)
            .await
            .with_context(|| format!("failed to open database {url}"))?,
        DatabaseTarget::Path(path) => DatabaseContext::open(&path, &store_options)
            .await
            .with_context(|| format!("failed to open database {}", path.display()))?,
    };
    context
        .sqlite()
        .initialize_schema()
        .await
        .context("database migration failed")?;

    Ok(FileTracker::from_context(context, config.tracker_options()))
}

pub async fn run(config: TrackerConfig) -> anyhow::Result<()> {
    let tracker = open_tracker(&config).await?;

    if config.reconcile.on_start {
        reconcile_on_start(&tracker).await?;
    }

    if config.watch.resume_on_start {
        let report = tracker
            .resume_watchers()
            .await
            .context("failed to resume watchers")?;
        for skipped in &report.skipped {
            warn!(
                collection_id = %skipped.collection_id,
                reason = %skipped.reason,
                "Watcher not resumed"
            );
        }
    } else {
        info!("Watcher resume disabled; persisted watches stay stopped");
    }

    let collections = tracker.list_collections().await?.len();
    info!(collections, "filetracker running");

    wait_for_shutdown().await?;

    info!("Shutdown signal received");
    tracker.shutdown().await;
    tracker.context().sqlite().close().await;
    info!("filetracker stopped");
    Ok(())
}

async fn reconcile_on_start(tracker: &FileTracker) -> anyhow::Result<()> {
    let outcomes = tracker
        .reconcile_all()
        .await
        .context("startup reconciliation failed")?;
    let mut failed = 0usize;
    for (id, outcome) in outcomes {
        if let Err(err) = outcome {
            failed += 1;
            error!(collection_id = %id, "Startup reconciliation failed: {err}");
        }
    }
    if failed > 0 {
        warn!(failed, "Some collections were not reconciled; continuing");
    }
    Ok(())
}

async fn wait_for_shutdown() -> anyhow::Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        let mut sigterm = signal(SignalKind::terminate()).context("install SIGTERM handler")?;
        let mut sigint = signal(SignalKind::interrupt()).context("install SIGINT handler")?;
        tokio::select! {
            _ = sigterm.recv() => {},
            _ = sigint.recv() => {},
        }
    }

    #[cfg(not(unix))]
    tokio::signal::ctrl_c()
        .await
        .context("install Ctrl-C handler")?;

    Ok(())
}
