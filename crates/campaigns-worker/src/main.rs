mod config;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use campaigns_reconciler::{HttpChangesetSource, HttpGitClient, Worker};
use campaigns_store::Store;
use clap::Parser;
use chrono::Utc;
use config::Config;
use sqlx::postgres::PgPoolOptions;
use tokio::sync::watch;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::from_default_env()).init();

    let config = Config::parse();

    let pool = PgPoolOptions::new()
        .max_connections(config.worker_concurrency as u32 + 2)
        .connect(&config.database_url)
        .await
        .context("connecting to the campaigns database")?;

    sqlx::migrate!("../campaigns-store/migrations").run(&pool).await.context("running campaigns-store migrations")?;

    let store = Arc::new(Store::new(pool));
    let http_client = reqwest::Client::new();
    let source = Arc::new(HttpChangesetSource::new(http_client.clone(), &config.source_url, config.host_supports_drafts));
    let git = Arc::new(HttpGitClient::new(http_client, &config.gitserver_url));

    let (stop_tx, stop_rx) = watch::channel(false);

    let mut tasks = Vec::new();
    for index in 0..config.worker_concurrency {
        let worker = Worker::new(store.clone(), source.clone(), git.clone(), config.external_url.clone(), config.poll_interval());
        let stop_rx = stop_rx.clone();
        tasks.push(tokio::spawn(async move {
            info!(worker = index, "starting reconciler worker");
            worker.run(stop_rx).await;
        }));
    }

    tasks.push(tokio::spawn(run_cleanup_loop(store.clone(), config.spec_ttl(), config.cleanup_interval(), stop_rx.clone())));

    tokio::signal::ctrl_c().await.context("waiting for shutdown signal")?;
    info!("shutdown signal received, stopping workers");
    stop_tx.send(true).ok();

    for task in tasks {
        if let Err(err) = task.await {
            warn!(error = %err, "reconciler task panicked");
        }
    }

    Ok(())
}

/// Periodically reclaims `CampaignSpec`/`ChangesetSpec` rows that are older
/// than the configured TTL and no longer referenced by any live campaign or
/// changeset, per the TTL-based spec cleanup rule.
async fn run_cleanup_loop(store: Arc<Store>, ttl: chrono::Duration, interval: Duration, mut stop: watch::Receiver<bool>) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        tokio::select! {
            changed = stop.changed() => {
                if changed.is_err() || *stop.borrow() {
                    return;
                }
            }
            _ = ticker.tick() => {
                let cutoff = Utc::now() - ttl;
                match store.changeset_specs().delete_expired(cutoff).await {
                    Ok(n) if n > 0 => info!(deleted = n, "reclaimed expired changeset specs"),
                    Ok(_) => {}
                    Err(err) => warn!(error = %err, "failed to reclaim expired changeset specs"),
                }
                match store.campaign_specs().delete_expired(cutoff).await {
                    Ok(n) if n > 0 => info!(deleted = n, "reclaimed expired campaign specs"),
                    Ok(_) => {}
                    Err(err) => warn!(error = %err, "failed to reclaim expired campaign specs"),
                }
            }
        }
    }
}
