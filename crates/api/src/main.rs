//! API server entry point.

use api::config::Config;
use event_store::{EventLog, InMemoryEventLog, PostgresConfig, PostgresEventLog};
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::signal;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for SIGINT");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

/// Rebuilds the caches, then serves until a shutdown signal.
async fn serve<L: EventLog + Clone + 'static>(
    log: L,
    config: &Config,
    metrics: PrometheusHandle,
) -> Result<(), BoxError> {
    let state = api::create_state(log, config.domain(), metrics);

    let replayed = api::rebuild_caches(&state.services).await?;
    tracing::info!(replayed, "caches rebuilt");

    if let Some(realm) = &config.acl_admin_realm {
        api::provision_admin(&state.services, realm).await?;
    }

    let app = api::create_app(state);
    let addr = config.addr();
    tracing::info!(%addr, "starting API server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let config = Config::from_env();

    // 1. Initialize tracing
    tracing_subscriber::registry()
        .with(EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 2. Install Prometheus metrics recorder
    let metrics = metrics_exporter_prometheus::PrometheusBuilder::new().install_recorder()?;

    // 3. Open the log and serve
    match &config.database_url {
        Some(url) => {
            let log = PostgresEventLog::connect(url, PostgresConfig::default()).await?;
            log.run_migrations().await?;
            tracing::info!("using the PostgreSQL event log");
            let served = serve(log.clone(), &config, metrics).await;
            log.close().await;
            served?;
        }
        None => {
            tracing::warn!("DATABASE_URL is not set, events are kept in memory only");
            serve(InMemoryEventLog::new(), &config, metrics).await?;
        }
    }

    tracing::info!("server shut down gracefully");
    Ok(())
}
