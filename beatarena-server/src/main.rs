//! BeatArena server - main entry point
//!
//! Serves the contest API: accounts, contests, excerpt uploads, duel voting
//! and leaderboards.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use beatarena_common::config::{resolve_root_folder, Config, RootFolder, ROOT_FOLDER_ENV};
use beatarena_common::db::{init_database, sessions};
use beatarena_server::{build_router, AppState};
use clap::Parser;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for beatarena-server
#[derive(Parser, Debug)]
#[command(name = "beatarena-server")]
#[command(about = "Beat contest service with duel voting")]
#[command(version)]
struct Args {
    /// Port to listen on (overrides the port of `bind_addr`)
    #[arg(short, long, env = "BEATARENA_PORT")]
    port: Option<u16>,

    /// Root folder holding the database and uploaded excerpts
    #[arg(short, long)]
    root_folder: Option<PathBuf>,

    /// Configuration file (TOML)
    #[arg(short, long, env = "BEATARENA_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "beatarena_server=debug,beatarena_common=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    info!("Starting BeatArena server v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::load(args.config.as_deref()).context("Failed to load configuration")?;

    let root = RootFolder::new(resolve_root_folder(
        args.root_folder.as_deref(),
        ROOT_FOLDER_ENV,
        &config,
    ));
    root.ensure_directories()
        .context("Failed to create root folder")?;
    info!("Root folder: {}", root.path().display());

    let db_path = root.database_path();
    info!("Database path: {}", db_path.display());

    let pool = match init_database(&db_path).await {
        Ok(pool) => {
            info!("✓ Database ready");
            pool
        }
        Err(e) => {
            error!("Failed to initialize database: {}", e);
            return Err(e.into());
        }
    };

    let purged = sessions::purge_expired(&pool).await?;
    if purged > 0 {
        info!("Purged {} expired sessions", purged);
    }

    let mut addr: SocketAddr = config
        .bind_addr
        .parse()
        .with_context(|| format!("Invalid bind_addr: {}", config.bind_addr))?;
    if let Some(port) = args.port {
        addr.set_port(port);
    }

    if config.google.is_some() {
        info!("Google sign-in enabled");
    }

    let state = AppState::new(pool, config, root).context("Failed to initialize OAuth client")?;
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("beatarena-server listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
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
                error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
