use anyhow::Context;
use clap::{Parser, Subcommand};
use futures::FutureExt;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use alertanio_relay::{
    alerta::{AlertService, AlertaClient},
    config::{Config, DatabaseArgs, RelayArgs},
    poller::Poller,
    store::{create_store, load_configuration},
    zulip::{ChatClient, ZulipClient},
};

#[derive(Parser)]
#[command(author, version, about = "Relay Alerta alerts to Zulip", long_about = None)]
struct Cli {
    /// Log level (debug, info, warn, error); RUST_LOG takes precedence
    #[arg(short, long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    relay: RelayArgs,
}

#[derive(Subcommand)]
enum Commands {
    /// Poll Alerta and relay notifications (default)
    Run,

    /// Create the configuration tables
    InitDb {
        #[command(flatten)]
        database: DatabaseArgs,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if it exists
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Some(Commands::InitDb { database }) => init_db(&database).await,
        Some(Commands::Run) | None => run(&cli.relay).await,
    }
}

async fn init_db(args: &DatabaseArgs) -> anyhow::Result<()> {
    let database = args.to_config()?;
    let store = create_store(&database)
        .await
        .context("failed to connect to the configuration database")?;
    store.init().await.context("failed to run migrations")?;
    info!("Configuration database is ready");
    Ok(())
}

async fn run(args: &RelayArgs) -> anyhow::Result<()> {
    let config = Config::from_args(args)?;
    info!(
        "Starting alertanio for '{}' (poll every {:?}, repeat interval {} min)",
        config.environment, config.poll.interval, config.poll.repeat_interval_minutes
    );

    // Initialize store and read this environment's configuration
    let store = create_store(&config.database)
        .await
        .context("failed to connect to the configuration database")?;
    store.init().await.context("failed to run migrations")?;
    let snapshot = load_configuration(store.as_ref(), &config.environment)
        .await
        .with_context(|| format!("failed to load configuration '{}'", config.environment))?;

    let alerta: Arc<dyn AlertService> = Arc::new(
        AlertaClient::new(&snapshot.alerta, config.alerta.api_key.clone())
            .context("failed to create Alerta client")?,
    );
    let chat: Arc<dyn ChatClient> =
        Arc::new(ZulipClient::new(&config.zulip).context("failed to create Zulip client")?);

    // Completes on Ctrl-C or SIGTERM; shared by the loop and the server
    let shutdown = shutdown_signal().shared();

    if let Some(server_config) = config.server.clone() {
        let server = alertanio_relay::server::Server::new(config.environment.clone());
        let server_shutdown = shutdown.clone();
        tokio::spawn(async move {
            if let Err(e) = server.start(&server_config.addr, server_shutdown).await {
                error!("Metrics server failed: {}", e);
            }
        });
    }

    let poller = Poller::new(alerta, chat, &snapshot, &config.poll, config.routing.clone());
    poller.run(shutdown).await.context("relay loop failed")?;

    info!("alertanio stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C signal, shutting down"),
            Err(e) => {
                warn!("Failed to install Ctrl+C handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
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
}
