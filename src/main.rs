//! muninlite-bridge - Cached HTTP bridge to a local muninlite node.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use muninlite_bridge::api::ApiServer;
use muninlite_bridge::cache::CacheManager;
use muninlite_bridge::config::{BridgeConfig, ConfigLoader};
use muninlite_bridge::deploy::Deployer;
use muninlite_bridge::executor::ProcessExecutor;
use muninlite_bridge::service::MuninService;

#[derive(Parser)]
#[command(
    name = "muninlite-bridge",
    about = "Cached HTTP bridge to a local muninlite node",
    version
)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Path to a config file (defaults to the standard search paths).
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the munin API over HTTP.
    Serve {
        /// Host address to bind to.
        #[arg(long)]
        host: Option<String>,
        /// Port to listen on.
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Run protocol commands once and print the responses.
    Run {
        /// Commands such as `list` or `fetch cpu`.
        #[arg(required = true)]
        commands: Vec<String>,
    },
    /// Print the responses to every known command as JSON.
    All,
}

fn init_tracing(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn build_service(config: &BridgeConfig, cancel: &CancellationToken) -> Arc<MuninService> {
    let executor = ProcessExecutor::new(&config.munin.binary)
        .args(config.munin.args.iter().cloned())
        .timeout(config.munin.timeout())
        .cancel_token(cancel.clone());
    let cache = CacheManager::with_ttl(Arc::new(executor), config.cache.ttl());
    Arc::new(MuninService::new(cache))
}

async fn deploy(config: &BridgeConfig) -> Result<(), Box<dyn std::error::Error>> {
    let mut deployer = Deployer::new(&config.munin.binary);
    if let Some(source) = &config.munin.source {
        deployer = deployer.with_source(source);
    }
    deployer.ensure_deployed().await?;
    Ok(())
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let loader = match cli.config {
        Some(path) => ConfigLoader::with_path(path),
        None => ConfigLoader::new(),
    };
    let mut config = loader.load()?;

    let cancel = CancellationToken::new();
    let shutdown = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Received Ctrl-C, shutting down");
            shutdown.cancel();
        }
    });

    deploy(&config).await?;
    let service = build_service(&config, &cancel);

    match cli.command {
        Commands::Serve { host, port } => {
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            ApiServer::new(service)
                .with_config(config.server)
                .run(cancel)
                .await?;
        }
        Commands::Run { commands } => {
            for response in service.execute(&commands).await? {
                print!("{response}");
                if !response.ends_with('\n') {
                    println!();
                }
            }
        }
        Commands::All => {
            let responses = service.all_responses().await?;
            println!("{}", serde_json::to_string_pretty(&responses)?);
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "muninlite-bridge failed");
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
