//! # Stockyard Server
//!
//! ## Startup Sequence
//! 1. Initialize tracing (logging)
//! 2. Load configuration (`--config <path>`, platform config dir, env)
//! 3. Connect to database & run migrations
//! 4. Build the router and serve until Ctrl+C / SIGTERM

use std::path::PathBuf;

use anyhow::Context;
use stockyard_db::{migrations, Database, DbConfig};
use stockyard_server::auth::JwtKeys;
use stockyard_server::{router, AppState, ServerConfig};
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config_path = config_path_arg();
    let config = ServerConfig::load(config_path.as_deref()).context("loading configuration")?;
    let addr = config.bind_addr()?;
    let db_path = config.database_path()?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        addr = %addr,
        db = %db_path.display(),
        "Starting Stockyard server"
    );

    let db = Database::new(DbConfig::new(&db_path).max_connections(config.database.max_connections))
        .await
        .with_context(|| format!("opening database {}", db_path.display()))?;
    let (total, applied) = migrations::migration_status(db.pool()).await?;
    info!(total, applied, "Database ready");

    let jwt = JwtKeys::new(&config.auth.jwt_secret, config.auth.leeway_secs);
    let state = AppState::new(db.clone(), jwt);
    let app = router(state, &config.server.cors_origins);

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {}", addr))?;
    info!(addr = %addr, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving HTTP")?;

    db.close().await;
    info!("Server stopped");
    Ok(())
}

/// Logs to stdout. `RUST_LOG` overrides the default filter.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,stockyard=debug,sqlx=warn,tower_http=info"));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn config_path_arg() -> Option<PathBuf> {
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--config" || arg == "-c" {
            return args.next().map(PathBuf::from);
        }
    }
    None
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
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
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, starting graceful shutdown...");
}
