//! Mentora API server binary.
//!
//! Serves the REST API over PostgreSQL, or over an in-memory store with
//! `--memory-store` for local development.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use clap::Parser;
use mentora_api::config::ApiConfig;
use mentora_core::auth::password::MIN_PRODUCTION_COST;
use mentora_core::clock::{Clock, SystemClock};
use mentora_core::config::{
    DEFAULT_LOCKOUT_SECS, DEFAULT_MAX_FAILED_ATTEMPTS, DEFAULT_SESSION_TTL_SECS,
};
use mentora_core::models::auth::Role;
use mentora_core::store::{AuthStore, MemoryStore, PgStore};
use sqlx::postgres::PgPoolOptions;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// CLI arguments for the API server.
#[derive(Parser, Debug)]
#[command(name = "mentora_api_server", about = "Mentora API server")]
struct Args {
    /// Address to listen on.
    #[arg(long, env = "BIND_ADDR", default_value = "127.0.0.1:3100")]
    bind: String,

    /// PostgreSQL connection URL.
    #[arg(
        long,
        env = "DATABASE_URL",
        default_value = "postgres://localhost:5432/mentora"
    )]
    database_url: String,

    /// Maximum number of database connections in the pool.
    #[arg(long, default_value_t = 5)]
    max_connections: u32,

    /// Keep identities and sessions in memory instead of PostgreSQL.
    #[arg(long, default_value_t = false)]
    memory_store: bool,

    /// Seconds between expired-session sweeps (0 disables).
    #[arg(long, default_value_t = 3600)]
    session_sweep_secs: u64,

    /// Grant the admin role to this already-registered email at startup.
    #[arg(long, value_name = "EMAIL")]
    grant_admin: Option<String>,

    /// Session and token lifetime in seconds.
    #[arg(long, default_value_t = DEFAULT_SESSION_TTL_SECS)]
    session_ttl_secs: i64,

    /// Failed logins within the lockout window that lock an account.
    #[arg(long, default_value_t = DEFAULT_MAX_FAILED_ATTEMPTS)]
    max_failed_attempts: u32,

    /// Lockout duration in seconds.
    #[arg(long, default_value_t = DEFAULT_LOCKOUT_SECS)]
    lockout_secs: i64,

    /// bcrypt work factor.
    #[arg(long, env = "BCRYPT_COST", default_value_t = MIN_PRODUCTION_COST)]
    bcrypt_cost: u32,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,mentora_api=debug,mentora_core=debug")),
        )
        .init();

    let args = Args::parse();

    let mut config = ApiConfig::from_env();
    config.bind_addr = args.bind.clone();
    config.database_url = args.database_url.clone();
    config.auth.session_ttl = chrono::Duration::try_seconds(args.session_ttl_secs)
        .ok_or("--session-ttl-secs is out of range")?;
    config.auth.max_failed_attempts = args.max_failed_attempts;
    config.auth.lockout_duration = chrono::Duration::try_seconds(args.lockout_secs)
        .ok_or("--lockout-secs is out of range")?;
    config.auth.bcrypt_cost = args.bcrypt_cost;
    config.auth.validate()?;

    info!(
        bind = %config.bind_addr,
        memory_store = args.memory_store,
        "starting mentora_api_server"
    );

    let store: Arc<dyn AuthStore> = if args.memory_store {
        warn!("using in-memory store; nothing survives a restart");
        Arc::new(MemoryStore::new())
    } else {
        info!(
            max_connections = args.max_connections,
            "configuring connection pool"
        );
        let pool = PgPoolOptions::new()
            .max_connections(args.max_connections)
            .acquire_timeout(StdDuration::from_secs(30))
            .connect(&config.database_url)
            .await?;

        info!("running database migrations");
        mentora_api::migrate(&pool).await?;
        Arc::new(PgStore::new(pool))
    };

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let state = mentora_api::AppState::new(store, clock, config.clone())?;

    if let Some(email) = &args.grant_admin {
        let identity = state.users.grant_role(email, Role::Admin).await?;
        info!(identity_id = %identity.id, "admin role granted");
    }

    if args.session_sweep_secs > 0 {
        let sessions = state.auth.sessions().clone();
        let period = StdDuration::from_secs(args.session_sweep_secs);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if let Err(e) = sessions.sweep_expired().await {
                    error!(error = %e, "expired-session sweep failed");
                }
            }
        });
    }

    let app = mentora_api::router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!(addr = %listener.local_addr()?, "REST API listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("shutdown signal received"),
        Err(e) => {
            warn!(error = %e, "could not listen for ctrl-c; running until killed");
            std::future::pending::<()>().await;
        }
    }
}
