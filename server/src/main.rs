mod routes;
mod state;
#[cfg(test)]
mod tests;

use activity_journal::ActivityJournal;
use anyhow::{Context, Result};
use app_core::{CoordinatorPort, PollerPort, StorePort};
use coordinator::Coordinator;
use media_cache::MediaCache;
use push_fabric::PushFabric;
use rate_governor::{GovernorRates, RateGovernor};
use shared::EngineConfig;
use state::AppState;
use std::path::PathBuf;
use std::sync::Arc;
use store_postgres::PgDb;
use tenant_poller::{PollerMode, TenantPoller};
use timer_scheduler::{FileSponsorStatePort, TimerScheduler};
use tokio::signal;
use tracing::info;
use tracing_bunyan_formatter::{BunyanFormattingLayer, JsonStorageLayer};
use tracing_error::ErrorLayer;
use tracing_log::LogTracer;
use tracing_subscriber::{prelude::*, EnvFilter, Registry};

fn init_tracing_bunyan() -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,axum=info"));

    // Name identifies the service in log streams.
    let formatting_layer = BunyanFormattingLayer::new(
        "live-bracket-engine".into(),
        std::io::stdout, // single sink: JSON to stdout; no other outputs supported
    );

    let subscriber = Registry::default()
        .with(env_filter)
        .with(JsonStorageLayer)
        .with(formatting_layer)
        .with(ErrorLayer::default());

    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Spec §5 graceful shutdown: (1) stop accepting new commands, (2) stop
/// tenant poller, (3) cancel all timers, (4) flush journal, (5) close push
/// fabric, (6) close store. Invoked once the axum server itself has
/// stopped accepting connections, which covers step 1.
async fn shutdown(
    poller_task: tokio::task::JoinHandle<()>,
    timers: Arc<TimerScheduler>,
    governor: Arc<RateGovernor>,
) {
    info!("engine_shutdown_begin");
    poller_task.abort();
    timers.shutdown().await;
    governor.close();
    // Step 4 (flush journal) is a no-op: ActivityJournal opens, writes, and
    // closes its append-only file on every call, so there is no buffered
    // writer to flush.
    // Step 5/6 (close push fabric, close store): both are backed by
    // connection pools (broadcast channels, the postgres pool) that are
    // dropped, and therefore closed, along with the process's `Arc`s.
    info!("engine_shutdown_complete");
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    LogTracer::init()?;
    init_tracing_bunyan()?;

    let config = EngineConfig::load().context("failed to load engine configuration")?;

    let database_url = url::Url::parse(&config.database_url).context("DATABASE_URL is not a valid URL")?;
    let db = PgDb::new(database_url).await?;
    db.run_migration().await?;
    let store: Arc<dyn StorePort> = Arc::new(db);

    let push = Arc::new(PushFabric::new(None, config.fallback_delay_ms, config.side_channel_timeout_ms));
    let cache = Arc::new(MediaCache::new(PathBuf::from(&config.media_cache_dir)));
    let journal = Arc::new(ActivityJournal::with_capacity(
        push.clone(),
        PathBuf::from(&config.journal_log_dir),
        config.journal_retention,
    ));

    let poller = Arc::new(TenantPoller::new(
        store.clone(),
        push.clone(),
        cache.clone(),
        PollerMode::MultiTenant,
        config.poll_interval(),
        config.stale_threshold_ms,
    ));
    let poller_port: Arc<dyn PollerPort> = poller.clone();
    let poller_task = poller.spawn();

    let coordinator = Arc::new(Coordinator::new(store.clone(), journal.clone(), poller_port));
    let coordinator_port: Arc<dyn CoordinatorPort> = coordinator.clone();

    let sponsor_store = Arc::new(FileSponsorStatePort::new(PathBuf::from(&config.sponsor_state_dir)));
    let timers = Arc::new(TimerScheduler::new(
        push.clone(),
        coordinator_port.clone(),
        sponsor_store,
        config.dq_warning_threshold(),
    ));

    let governor_rates = GovernorRates {
        idle_rps: config.governor_rate_idle,
        upcoming_rps: config.governor_rate_upcoming,
        active_rps: config.governor_rate_active,
    };
    let governor = Arc::new(RateGovernor::new(store.clone(), governor_rates, config.dev_bypass_duration()));

    let app_state = AppState {
        store: store.clone(),
        coordinator: coordinator_port,
        timers: timers.clone(),
        governor: governor.clone(),
        journal: journal.clone(),
        push: push.clone(),
        cache: cache.clone(),
    };

    let addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(%addr, "listening on http server");

    let app = routes::router(app_state);
    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    shutdown(poller_task, timers, governor).await;
    Ok(())
}
