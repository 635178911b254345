//! Mirage mock server - CLI Entry Point

use anyhow::{Context, Result};
use clap::Parser;
use mirage_mock_server::{Server, ServerConfig};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "mirage-mock-server",
    about = "Expectation-driven HTTP mock server with CORS support and JSON persistence",
    version
)]
struct Args {
    /// Path to YAML configuration file
    #[arg(short, long, env = "MIRAGE_CONFIG")]
    config: Option<PathBuf>,

    /// Address to listen on
    #[arg(long, env = "MIRAGE_HOST")]
    host: Option<String>,

    /// Port to listen on
    #[arg(short, long, env = "MIRAGE_PORT")]
    port: Option<u16>,

    /// Add CORS headers to every response
    #[arg(long, env = "MIRAGE_CORS")]
    cors: bool,

    /// Value of Access-Control-Allow-Origin (implies --cors)
    #[arg(long, value_name = "ORIGIN")]
    cors_allow_origin: Option<String>,

    /// Mirror the expectation set to disk on every change
    #[arg(long)]
    persist: bool,

    /// File the expectation set is mirrored to (implies --persist)
    #[arg(long, value_name = "PATH")]
    persisted_expectations_path: Option<PathBuf>,

    /// JSON file of expectations loaded at startup
    #[arg(long, value_name = "PATH")]
    initialization_json_path: Option<PathBuf>,

    /// How long in-flight connections may drain on shutdown
    #[arg(long, value_name = "MS")]
    shutdown_grace_ms: Option<u64>,

    /// Log level when RUST_LOG is not set (trace, debug, info, warn, error)
    #[arg(short = 'L', long, default_value = "info")]
    log_level: String,

    /// Validate configuration and exit
    #[arg(long)]
    validate: bool,
}

impl Args {
    fn apply(&self, config: &mut ServerConfig) {
        if let Some(host) = &self.host {
            config.listen.host = host.clone();
        }
        if let Some(port) = self.port {
            config.listen.port = port;
        }
        if self.cors {
            config.cors.enabled = true;
        }
        if let Some(origin) = &self.cors_allow_origin {
            config.cors.enabled = true;
            config.cors.allow_origin = origin.clone();
        }
        if self.persist {
            config.persistence.enabled = true;
        }
        if let Some(path) = &self.persisted_expectations_path {
            config.persistence.enabled = true;
            config.persistence.path = path.clone();
        }
        if let Some(path) = &self.initialization_json_path {
            config.initialization_path = Some(path.clone());
        }
        if let Some(grace) = self.shutdown_grace_ms {
            config.listen.shutdown_grace_ms = grace;
        }
    }
}

fn load_config(args: &Args) -> Result<ServerConfig> {
    let mut config = match &args.config {
        Some(path) => {
            info!(path = %path.display(), "Loading configuration");
            ServerConfig::from_file(path)?
        }
        None => ServerConfig::default(),
    };
    args.apply(&mut config);
    config.validate().context("invalid configuration")?;
    Ok(config)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
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
                error!("Failed to listen for SIGTERM: {}", e);
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
    info!("Shutdown signal received");
}

async fn run(args: Args) -> Result<()> {
    let config = load_config(&args)?;

    if args.validate {
        println!("Configuration is valid");
        return Ok(());
    }

    let server = Server::new(config)?.bind().await?;
    server.serve(shutdown_signal()).await?;
    info!("Mirage mock server stopped");
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(args.log_level.as_str())),
        )
        .with_target(false)
        .init();

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}
