//! # Auto-Oncall Service
//!
//! Binary entry point. Loads configuration, initializes logging, wires the
//! pipeline to OpsGenie and GitHub, optionally starts the routing rule
//! janitor, and serves webhooks until SIGINT/SIGTERM.
//!
//! Exit codes: `0` after a clean shutdown, `1` if the server fails, `3` if
//! the configuration cannot be loaded or is invalid.

use anyhow::Context;
use auto_oncall_api::{
    build_components, build_http_client, run_janitor, start_server, ServiceConfig,
    ServiceMetrics,
};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const CONFIG_EXIT_CODE: i32 = 3;

const DEFAULT_LOG_FILTER: &str =
    "auto_oncall_service=info,auto_oncall_api=info,auto_oncall_core=info,tower_http=info";

/// GitHub webhook receiver that pages the engineer who shipped
#[derive(Parser, Debug)]
#[command(name = "auto-oncall")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "ONCALL_CONFIG_FILE")]
    config: Option<PathBuf>,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Plain, env = "ONCALL_LOG_FORMAT")]
    log_format: LogFormat,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum LogFormat {
    Plain,
    Json,
}

fn init_logging(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into());

    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Plain => registry.with(tracing_subscriber::fmt::layer()).init(),
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
    }
}

fn load_config(path: Option<&PathBuf>) -> ServiceConfig {
    if let Some(path) = path {
        info!(path = %path.display(), "Loading configuration from explicit path");
    }

    let config = match ServiceConfig::load(path.map(PathBuf::as_path)) {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Failed to load configuration; aborting");
            std::process::exit(CONFIG_EXIT_CODE);
        }
    };

    if let Err(e) = config.validate() {
        error!(error = %e, "Service configuration is invalid; aborting");
        std::process::exit(CONFIG_EXIT_CODE);
    }

    config
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_format);

    info!(version = env!("CARGO_PKG_VERSION"), "Starting auto-oncall");

    let config = load_config(cli.config.as_ref());
    info!(
        repositories = config.oncall.repositories.len(),
        users = config.oncall.users.len(),
        team = %config.opsgenie.team_id,
        "Configuration loaded"
    );

    let components = match build_http_client(&config)
        .and_then(|http| build_components(&config, http))
    {
        Ok(components) => components,
        Err(e) => {
            error!(error = %e, "Failed to initialize remote clients; aborting");
            std::process::exit(CONFIG_EXIT_CODE);
        }
    };

    let metrics = ServiceMetrics::new().context("failed to register metrics")?;

    let janitor_task = if config.janitor.enabled {
        Some(tokio::spawn(run_janitor(
            components.janitor,
            Duration::from_secs(config.janitor.interval_seconds),
            metrics.clone(),
        )))
    } else {
        info!("Routing rule janitor disabled");
        None
    };

    let result = start_server(config, components.pipeline, metrics).await;

    if let Some(task) = janitor_task {
        task.abort();
    }

    if let Err(e) = result {
        error!(error = %e, "Server terminated with error");
        return Err(e).context("webhook server failed");
    }

    info!("auto-oncall stopped");
    Ok(())
}
