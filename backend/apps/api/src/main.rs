//! API Server Entry Point
//!
//! Application entry point and server initialization.
//! Uses `anyhow` for startup errors. Request-level errors are rendered
//! by the `auth` crate.

mod config;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use auth::domain::repository::SessionRepository;
use auth::presentation::handlers::health;
use auth::{MemorySessionRepository, PgAuthRepository, PhoneLoginService, SessionService};
use axum::{
    Router,
    http::{self, Method, header},
    routing::get,
};
use otp::domain::repository::{ChallengeRepository, RateLimitRepository};
use otp::{MemoryRateLimitRepository, OtpMaintenance, PgOtpRepository, TracingCodeSink};
use platform::clock::{Clock, SystemClock};
use platform::scheduler::spawn_periodic;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{AllowHeaders, AllowMethods, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{AppConfig, EphemeralStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "api=info,auth=info,otp=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env().context("Invalid configuration")?;

    // Database connection
    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .acquire_timeout(config.otp.store_timeout)
        .connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;

    tracing::info!("Connected to database");

    // Run migrations
    sqlx::migrate!("../../../database/migrations")
        .run(&pool)
        .await?;

    tracing::info!("Migrations completed");

    tracing::info!(backend = ?config.ephemeral_store, "Ephemeral store selected");
    match config.ephemeral_store {
        EphemeralStore::Postgres => {
            let store = Arc::new(PgOtpRepository::new(pool.clone()));
            let sessions = Arc::new(PgAuthRepository::new(pool.clone()));
            run(config, pool, store, sessions).await
        }
        EphemeralStore::Memory => {
            let limits = Arc::new(MemoryRateLimitRepository::new());
            let sessions = Arc::new(MemorySessionRepository::new());
            run(config, pool, limits, sessions).await
        }
    }
}

/// Wire the services over the chosen ephemeral backends and serve until a
/// shutdown signal arrives
async fn run<R, S>(
    config: AppConfig,
    pool: PgPool,
    rate_limits: Arc<R>,
    sessions: Arc<S>,
) -> anyhow::Result<()>
where
    R: RateLimitRepository + Send + Sync + 'static,
    S: SessionRepository + Send + Sync + 'static,
{
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let otp_config = Arc::new(config.otp.clone());
    let auth_config = Arc::new(config.auth.clone());

    // Users and challenges are always durable
    let challenges = Arc::new(PgOtpRepository::new(pool.clone()));
    let users = Arc::new(PgAuthRepository::new(pool.clone()));

    let flow = Arc::new(PhoneLoginService::new(
        challenges.clone(),
        rate_limits.clone(),
        Arc::new(TracingCodeSink),
        users,
        sessions.clone(),
        clock.clone(),
        otp_config.clone(),
        auth_config.clone(),
    ));

    let maintenance = Arc::new(OtpMaintenance::new(
        challenges,
        rate_limits,
        clock.clone(),
        otp_config,
    ));
    let session_maintenance = Arc::new(SessionService::new(sessions, clock, auth_config));

    // Startup sweep: failures are logged and do not prevent startup
    sweep(&*maintenance, &*session_maintenance).await;

    let cancel = CancellationToken::new();
    let sweeper = spawn_periodic("maintenance_sweep", config.cleanup_interval, cancel.clone(), {
        let maintenance = maintenance.clone();
        let session_maintenance = session_maintenance.clone();
        move || {
            let maintenance = maintenance.clone();
            let session_maintenance = session_maintenance.clone();
            async move { sweep(&*maintenance, &*session_maintenance).await }
        }
    });

    // CORS configuration
    let allowed_origins: Vec<http::HeaderValue> = config
        .frontend_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(allowed_origins)
        .allow_methods(AllowMethods::list([
            Method::GET,
            Method::POST,
            Method::OPTIONS,
        ]))
        .allow_headers(AllowHeaders::list([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            header::ACCEPT,
        ]));

    // Build router
    let app = Router::new()
        .route("/health", get(health))
        .nest("/api/v1", auth::auth_router(flow))
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Listening on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    let stop = cancel.clone();
    let mut server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move { stop.cancelled().await })
            .await
    });

    tokio::select! {
        result = &mut server => {
            // Server stopped without a signal
            cancel.cancel();
            result??;
        }
        _ = shutdown_signal() => {
            tracing::info!(
                timeout_secs = config.shutdown_timeout.as_secs(),
                "Shutdown signal received, draining connections"
            );
            cancel.cancel();
            match tokio::time::timeout(config.shutdown_timeout, &mut server).await {
                Ok(result) => result??,
                Err(_) => {
                    tracing::warn!("Graceful shutdown timed out, aborting open connections");
                    server.abort();
                }
            }
        }
    }

    if let Err(e) = sweeper.await {
        tracing::warn!(error = %e, "Maintenance task ended abnormally");
    }
    pool.close().await;
    tracing::info!("Shutdown complete");

    Ok(())
}

/// One maintenance pass over every backend without native expiry
async fn sweep<C, R, S>(maintenance: &OtpMaintenance<C, R>, sessions: &SessionService<S>)
where
    C: ChallengeRepository + Send + Sync,
    R: RateLimitRepository + Send + Sync,
    S: SessionRepository + Send + Sync + 'static,
{
    maintenance.sweep().await;

    match sessions.purge_expired().await {
        Ok(purged) => tracing::info!(sessions_purged = purged, "Session cleanup completed"),
        Err(e) => tracing::warn!(error = %e, "Session cleanup failed, retrying next sweep"),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
