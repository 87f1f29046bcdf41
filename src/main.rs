//! School Canteen Backend
//! Menu, feedback and purchase requests behind token authentication

use anyhow::{Context, Result};
use canteen_backend::{
    auth::UserStore,
    build_router,
    config::{load_env_files, Config, Environment},
    store::CanteenStore,
    Services,
};
use clap::Parser;
use std::{path::PathBuf, sync::Arc};
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "canteen")]
#[command(about = "School canteen API server")]
struct Args {
    /// Port to listen on (overrides PORT)
    #[arg(long)]
    port: Option<u16>,

    /// Address to bind (overrides BIND_ADDR)
    #[arg(long)]
    bind: Option<String>,

    /// Path to the SQLite database (overrides DATABASE_PATH)
    #[arg(long)]
    database_path: Option<String>,

    /// Extra .env file to load before reading configuration
    #[arg(long, env = "CANTEEN_ENV_FILE")]
    env_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // The file named on the command line takes precedence over ./.env
    load_env_files(args.env_file.as_deref(), &[PathBuf::from(".env")])
        .context("Failed to load environment")?;
    init_tracing();

    let mut config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Invalid configuration, refusing to start");
            return Err(e).context("Failed to load configuration");
        }
    };

    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(bind) = args.bind {
        config.bind_addr = bind;
    }
    if let Some(path) = args.database_path {
        config.database_path = path;
    }

    info!(
        environment = ?config.environment,
        role_policy = ?config.auth.role_policy,
        token_ttl_hours = config.auth.token_ttl_hours,
        "Starting school canteen backend"
    );

    let user_store = Arc::new(UserStore::new(&config.database_path)?);
    let canteen_store = Arc::new(CanteenStore::new(&config.database_path)?);
    info!("Database initialized at: {}", config.database_path);

    match &config.bootstrap_admin {
        Some(admin) => {
            user_store.ensure_admin(&admin.login, &admin.password, &admin.full_name)?;
        }
        None if user_store.count_admins()? == 0 => {
            warn!("No admin account exists and BOOTSTRAP_ADMIN_LOGIN is not set");
        }
        None => {}
    }

    if config.environment == Environment::Development {
        warn!("Running in development mode");
    }

    let services = Services::new(&config.auth, user_store, canteen_store);
    let app = build_router(&services);

    let addr = format!("{}:{}", config.bind_addr, config.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("API server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
    }
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "canteen_backend=debug,canteen=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

