//! Remedy daemon - auto-remediation service for data-pipeline failures.
//!
//! The daemon hosts:
//! - The recovery orchestrator (playbooks, retries, breakers, health checks)
//! - A REST API for recovery submission and operator inspection

use clap::Parser;
use remedy_engine::{
    CircuitBreakerFabric, EngineSettings, PlaybookExecutor, PlaybookRegistry,
    SimulatedPlatformAdapter,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod api;
mod config;
mod error;
mod server;

use api::rest::state::AppState;
use config::DaemonConfig;
use error::{DaemonError, DaemonResult};
use server::Server;

/// Remedy daemon CLI.
#[derive(Parser)]
#[command(name = "remedyd")]
#[command(about = "Remedy daemon - auto-remediation for data-pipeline failures", long_about = None)]
#[command(version)]
struct Cli {
    /// Daemon configuration file path
    #[arg(short, long, env = "REMEDY_CONFIG")]
    config: Option<String>,

    /// Engine settings file path (knobs also come from the environment)
    #[arg(long, env = "REMEDY_ENGINE_CONFIG")]
    engine_config: Option<String>,

    /// Listen address
    #[arg(
        short,
        long,
        env = "REMEDY_LISTEN_ADDR",
        default_value = "127.0.0.1:8080"
    )]
    listen: String,

    /// Log level
    #[arg(long, env = "REMEDY_LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Enable JSON logging
    #[arg(long, env = "REMEDY_LOG_JSON")]
    json: bool,
}

#[tokio::main]
async fn main() -> DaemonResult<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| cli.log_level.clone().into());

    if cli.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    // Load configuration
    let mut daemon_config = DaemonConfig::load(cli.config.as_deref())
        .map_err(|e| DaemonError::Config(e.to_string()))?;
    daemon_config.server.listen_addr = cli
        .listen
        .parse()
        .map_err(|e| DaemonError::Config(format!("invalid listen address: {e}")))?;

    let settings = Arc::new(EngineSettings::load(cli.engine_config.as_deref())?);

    if !settings.auto_remediation_enabled {
        tracing::warn!(
            "AUTO_REMEDIATION_ENABLED is off; recovery requests will be skipped until enabled"
        );
    }

    // Wire the engine. The simulated adapter stands in until a real
    // platform client is plugged in behind the adapter trait.
    let registry = Arc::new(PlaybookRegistry::builtin());
    let breakers = Arc::new(CircuitBreakerFabric::new());
    let adapter = Arc::new(SimulatedPlatformAdapter::new());
    let executor = Arc::new(PlaybookExecutor::new(
        registry.clone(),
        breakers.clone(),
        adapter,
        settings.clone(),
    ));

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        playbooks = registry.len(),
        listen = %daemon_config.server.listen_addr,
        "starting remedy daemon"
    );

    let state = AppState::new(executor, registry, breakers);
    Server::new(daemon_config, state).run().await
}
