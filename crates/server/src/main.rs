//! pagesync server entry point.
//!
//! Loads configuration, wires the engine, starts the background scheduler and
//! serves the operator tools over MCP stdio. Logging goes to stderr to avoid
//! interfering with the JSON-RPC protocol on stdout.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use pagesync_client::{NotionClient, RetryPolicy, Retrying, WebhookClient};
use pagesync_core::{AppConfig, Caches, LocalDb};
use pagesync_sync::{EngineContext, LogNotifier, MappingProvider, NotificationSink, SyncService, SyncSettings};
use rmcp::service::serve_server;
use rmcp::transport::io::stdio;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

mod error;
mod handler;
mod notifier;
mod tools;

use notifier::{UnconfiguredMappings, WebhookNotifier, WebhookThreads};

/// Extra wait on top of one item timeout before abandoning the scheduler.
const SHUTDOWN_MARGIN: Duration = Duration::from_secs(5);

fn sinks(config: &AppConfig) -> Result<(Arc<dyn NotificationSink>, Arc<dyn MappingProvider>)> {
    match config.webhook_url.as_deref().filter(|url| !url.trim().is_empty()) {
        Some(url) => {
            let client = WebhookClient::new(url, config.timeout()).context("invalid webhook url")?;
            Ok((Arc::new(WebhookNotifier::new(client.clone())), Arc::new(WebhookThreads::new(client))))
        }
        None => {
            tracing::warn!("no webhook configured; deletion notices are only logged");
            Ok((Arc::new(LogNotifier), Arc::new(UnconfiguredMappings)))
        }
    }
}

/// Wait for the scheduler to wind down, giving up after `grace`.
///
/// Returns whether it stopped in time.
async fn join_scheduler(task: JoinHandle<()>, grace: Duration) -> bool {
    match tokio::time::timeout(grace, task).await {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            tracing::error!(error = %e, "scheduler task failed");
            true
        }
        Err(_) => {
            tracing::warn!(grace_ms = grace.as_millis() as u64, "scheduler did not stop in time; exiting");
            false
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load().context("failed to load configuration")?;
    tracing::info!(db_path = %config.db_path.display(), sources = config.sources.len(), "starting pagesync on stdio transport");

    let db = LocalDb::open(&config.db_path).await.context("failed to open local store")?;
    let client = NotionClient::from_app_config(&config).context("failed to build content API client")?;
    let api = Retrying::new(client, RetryPolicy::from_config(&config));
    let (notifier, mappings) = sinks(&config)?;

    let ctx = Arc::new(EngineContext::new(
        Arc::new(api),
        Arc::new(db.clone()),
        Caches::new(&db, &config),
        notifier,
        mappings,
        SyncSettings::from_config(&config),
    ));

    let shutdown = CancellationToken::new();
    let service = Arc::new(SyncService::new(ctx, shutdown.clone()));

    let scheduler = service.scheduler();
    let scheduler_task = tokio::spawn({
        let cancel = shutdown.child_token();
        async move { scheduler.run(cancel).await }
    });

    let server = serve_server(handler::PageSyncServer::new(Arc::clone(&service)), stdio()).await?;
    tokio::select! {
        result = server.waiting() => {
            result?;
            tracing::info!("client disconnected");
        }
        _ = tokio::signal::ctrl_c() => tracing::info!("interrupt received"),
    }

    shutdown.cancel();
    join_scheduler(scheduler_task, config.item_timeout() + SHUTDOWN_MARGIN).await;
    tracing::info!("pagesync stopped");
    Ok(())
}
