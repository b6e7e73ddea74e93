//! service-host
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────────▶ listener (HTTP or TLS)
//!                       │
//!                       ▼
//!                 ┌───────────────────────────┐
//!                 │ Context                   │ request id, span, timeout
//!                 │ ForwardedHeaders          │ client address / scheme
//!                 │ ErrorHandler              │ faults → problem+json
//!                 │ RateLimiting              │ fixed window + FIFO queue
//!                 │ Compression               │ gzip negotiation
//!                 │ TimeLogging               │ endpoint counters
//!                 └─────────────┬─────────────┘
//!                               ▼
//!            /health  /alive  /metrics  sample api routes
//! ```

use clap::Parser;
use std::path::PathBuf;

use service_host::config::{load_config, ServiceConfig};
use service_host::http::HttpServer;
use service_host::lifecycle::{log_startup_information, Shutdown};
use service_host::observability::{init_logging, metrics::process_started_at};

#[derive(Debug, Parser)]
#[command(name = "service-host", version, about = "HTTP service host")]
struct Cli {
    /// Path to the TOML configuration file. Defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Validate the configuration and exit.
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    process_started_at();
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ServiceConfig::default(),
    };

    init_logging(&config.observability)?;

    if cli.check {
        tracing::info!(
            config = ?cli.config,
            "Configuration is valid"
        );
        return Ok(());
    }

    log_startup_information(&config);

    let shutdown = Shutdown::new();
    shutdown.trigger_on_signal();

    let server = HttpServer::new(config)?;
    server.serve(shutdown.subscribe()).await?;

    tracing::info!("service-host stopped");
    Ok(())
}
