//! Process wiring
//!
//! Startup order:
//! 1. open the store and apply the schema
//! 2. restore the cache from persisted documents (fatal on error)
//! 3. bind the durable subscription
//! 4. bind the HTTP listener
//! 5. spawn the ingest worker and serve HTTP until SIGINT/SIGTERM
//!
//! Shutdown runs in reverse: the HTTP server drains, the worker finishes its
//! in-flight message, pending acks are flushed and the pool is closed.

use std::future::Future;
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::api;
use crate::cache::OrderCache;
use crate::config::Config;
use crate::ingest::{
    BrokerError, IngestStats, IngestWorker, JetStreamSource, MessageSource, OrderHandler,
    SubscriptionConfig,
};
use crate::recovery::restore_cache;
use crate::state::AppState;
use crate::store::{OrderStore, PgOrderStore};

/// Run the service until a shutdown signal arrives or ingestion stops.
///
/// Ingestion stopping on its own is reported as an error so the process
/// exits non-zero.
pub async fn run(config: Config) -> anyhow::Result<()> {
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        http_addr = %config.http_addr,
        "Starting order-service"
    );

    let store = PgOrderStore::connect(&config.database_url, config.db_max_connections)
        .await
        .context("failed to open order store")?;

    let cache = OrderCache::new();
    let subscription = SubscriptionConfig::from_config(&config);
    let source = match start(&store, &cache, || JetStreamSource::connect(&subscription)).await {
        Ok(source) => source,
        Err(e) => {
            store.close().await;
            return Err(e);
        }
    };
    let nats = source.client();

    let listener = match bind(&config.http_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            store.close().await;
            return Err(e);
        }
    };

    let app = api::create_router(AppState::new(cache.clone()), Path::new(&config.static_dir));
    let store_handle: Arc<dyn OrderStore> = Arc::new(store.clone());
    let handler = OrderHandler::new(store_handle, cache);

    let result = serve(listener, app, handler, source, shutdown_signal()).await;

    if let Err(e) = nats.flush().await {
        tracing::warn!(error = %e, "Failed to flush broker connection");
    }
    store.close().await;
    tracing::info!("order-service stopped");

    result.map(|stats| {
        tracing::info!(acked = stats.acked, rejected = stats.rejected, "Ingest totals");
    })
}

/// Restore the cache, then subscribe.
///
/// `subscribe` is only invoked once every stored order is in the cache; a
/// failed restore returns without touching the broker.
pub async fn start<S, F, Fut>(
    store: &dyn OrderStore,
    cache: &OrderCache,
    subscribe: F,
) -> anyhow::Result<S>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<S, BrokerError>>,
{
    restore_cache(store, cache)
        .await
        .context("failed to restore order cache")?;

    subscribe()
        .await
        .context("failed to subscribe to order stream")
}

/// Bind the HTTP listener
pub async fn bind(addr: &str) -> anyhow::Result<TcpListener> {
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!(addr = %addr, "HTTP server listening");
    Ok(listener)
}

/// Spawn the ingest worker and serve HTTP until `signal` resolves or the
/// worker stops.
///
/// Returns an error when the worker stopped before `signal` resolved.
pub async fn serve<S>(
    listener: TcpListener,
    app: Router,
    handler: OrderHandler,
    source: S,
    signal: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<IngestStats>
where
    S: MessageSource + Sync + 'static,
{
    let signalled = CancellationToken::new();
    let shutdown = signalled.child_token();

    let worker = IngestWorker::new(source, handler, shutdown.clone());
    let worker_handle = {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            let stats = worker.run().await;
            // A stopped worker takes the HTTP server down with it
            shutdown.cancel();
            stats
        })
    };

    {
        let signalled = signalled.clone();
        tokio::spawn(async move {
            signal.await;
            signalled.cancel();
        });
    }

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.clone().cancelled_owned())
        .await;
    tracing::info!("HTTP server stopped");

    shutdown.cancel();
    let stats = worker_handle.await.context("ingest worker panicked")?;
    served.context("HTTP server error")?;

    if !signalled.is_cancelled() {
        anyhow::bail!("ingest worker stopped before shutdown was requested");
    }
    Ok(stats)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C"),
        _ = terminate => tracing::info!("Received terminate signal"),
    }
}
