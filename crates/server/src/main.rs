//! hearth server entry point.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use hearth_common::{Config, config::LoggingConfig};
use hearth_db::ObjectRepository;
use hearth_federation::{
    BlocklistHooks, Database, FederationState, Federator, HttpSignatureAuthenticator, HttpSigner,
    HttpTransport, MemoryStore, Scheduler, Settings, SqlStore, StoreDatabase, SystemClock,
    Transport, router,
};
use tokio::signal;
use tower_http::{
    limit::RequestBodyLimitLayer, timeout::TimeoutLayer, trace::TraceLayer,
};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Largest accepted request body.
const BODY_LIMIT: usize = 1024 * 1024;
/// Upper bound on handling one request, delivery included.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received SIGINT, initiating graceful shutdown...");
        },
        () = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown...");
        },
    }
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "hearth=debug,hearth_federation=debug,tower_http=debug".into());
    let registry = tracing_subscriber::registry().with(filter);
    if logging.json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn open_database(config: &Config) -> anyhow::Result<Arc<dyn Database>> {
    let base = config.server.url.clone();
    let Some(db_config) = &config.database else {
        warn!("No database configured, objects are kept in memory");
        return Ok(Arc::new(StoreDatabase::new(MemoryStore::new(), base)));
    };

    let conn = hearth_db::init(db_config).await?;
    info!("Connected to database");
    info!("Running database migrations...");
    hearth_db::migrate(&conn).await?;
    info!("Migrations completed");

    let store = SqlStore::new(ObjectRepository::new(Arc::new(conn)));
    Ok(Arc::new(StoreDatabase::new(store, base)))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load().context("loading configuration")?;
    init_tracing(&config.logging);

    info!(url = %config.server.url, "Starting hearth server...");

    let federation = &config.federation;
    let clock = Arc::new(SystemClock);
    let scheduler = Scheduler::new(Duration::from_secs(federation.cache_sweep_interval_secs));

    let signer = config
        .signing
        .as_ref()
        .map(|signing| HttpSigner::new(&signing.private_key_pem, signing.key_id.clone()))
        .transpose()
        .context("loading signing key")?;
    if signer.is_none() {
        warn!("No signing key configured, outgoing requests are unsigned");
    }
    let transport: Arc<dyn Transport> = Arc::new(HttpTransport::new(
        &federation.user_agent,
        signer,
        clock.clone(),
        Duration::from_secs(federation.dereference_cache_ttl_secs),
        &scheduler,
    )?);

    let db = open_database(&config).await?;
    let federator = Federator::new(db, transport.clone())
        .with_settings(Settings::from(federation))
        .with_clock(clock.clone())
        .with_hooks(Arc::new(BlocklistHooks::new(&federation.blocked_domains)))
        .with_authenticator(Arc::new(HttpSignatureAuthenticator::new(transport, clock)));

    let app = router(FederationState::new(federator, config.server.url.clone())).layer(
        tower::ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
            .map_response(axum::response::IntoResponse::into_response)
            .layer(RequestBodyLimitLayer::new(BODY_LIMIT)),
    );

    scheduler.start().await;

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("parsing listen address")?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    scheduler.stop().await;
    info!("Server shut down");
    Ok(())
}
