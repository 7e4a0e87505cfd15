use anyhow::{Context, Result};
use serde_json::Value;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::filter::Directive;

use sleepcycle::config::Config;
use sleepcycle::metrics::ServiceMetrics;
use sleepcycle::{api, cli, server};

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::parse_args();

    if args.help {
        cli::print_help();
        return Ok(());
    }

    // Initialize logging
    let directive: Directive = "sleepcycle=info".parse()?;
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(directive))
        .with_writer(std::io::stderr)
        .init();

    // Handle --now mode: no server, no config needed
    if let Some(now) = args.now {
        return print_wake_times(&now);
    }

    info!("SleepCycle wake-time service v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = Config::from_env()?;
    info!("Configuration loaded");
    info!("  Bind address: {}", config.bind_addr());
    info!("  Request timeout: {}s", config.request_timeout_secs);
    info!("  Max body: {} bytes", config.max_body_bytes);

    // Handle --validate mode
    if args.validate {
        info!("Validating configuration...");
        match config.validate() {
            Ok(()) => {
                info!("Configuration is valid");
                return Ok(());
            }
            Err(e) => {
                error!("{}", e);
                std::process::exit(1);
            }
        }
    }

    if let Err(e) = config.validate() {
        warn!("{}", e);
    }

    let config = Arc::new(config);
    let metrics = Arc::new(ServiceMetrics::new());
    let cancel_token = CancellationToken::new();

    server::spawn_shutdown_listener(cancel_token.clone())
        .context("Failed to install shutdown signal handlers")?;

    server::run_server(config, metrics, cancel_token).await
}

/// One-shot calculation: print the same JSON the API would return
fn print_wake_times(now: &str) -> Result<()> {
    match api::respond_to(&Value::String(now.to_string())) {
        Ok(response) => {
            println!("{}", serde_json::to_string_pretty(&response)?);
            Ok(())
        }
        Err(error) => {
            println!("{}", serde_json::to_string_pretty(&error)?);
            std::process::exit(1);
        }
    }
}
