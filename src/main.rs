//! ssr-handle server binary.
//!
//! # Architecture Overview
//!
//! ```text
//!                  ┌──────────────────────────────────────────────────────┐
//!                  │                      SSR HANDLE                       │
//!                  │                                                      │
//!  Client Request  │  ┌─────────┐    ┌──────────────┐                     │
//!  ────────────────┼─▶│  http   │───▶│   backend    │── answered ─────┐   │
//!                  │  │ server  │    │ dev | static │                 │   │
//!                  │  └─────────┘    └──────┬───────┘                 │   │
//!                  │                        │ fallthrough             │   │
//!                  │                        ▼                         │   │
//!                  │                 ┌──────────────┐                 │   │
//!                  │                 │    render    │                 │   │
//!                  │                 │  resolver +  │                 │   │
//!                  │                 │   pipeline   │                 │   │
//!                  │                 └──────┬───────┘                 │   │
//!  Client Response │                        ▼                         │   │
//!  ◀───────────────┼──────────── 200 page / 302 / 500 ◀───────────────┘   │
//!                  └──────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use ssr_handle::config::{load_config, validation::validate_config, Mode, SsrConfig};
use ssr_handle::lifecycle::signals::spawn_signal_listener;
use ssr_handle::observability::{logging, metrics};
use ssr_handle::{bootstrap, HttpServer, Shutdown};

#[derive(Parser)]
#[command(name = "ssr-handle")]
#[command(about = "Serve server-rendered pages in development or production mode", long_about = None)]
struct Cli {
    /// TOML configuration file.
    #[arg(short, long, env = "SSR_CONFIG")]
    config: Option<PathBuf>,

    /// development | production
    #[arg(short, long, env = "SSR_MODE")]
    mode: Option<Mode>,

    /// Project root.
    #[arg(long)]
    root: Option<PathBuf>,

    /// HTML template.
    #[arg(long)]
    index: Option<PathBuf>,

    /// Production build output directory.
    #[arg(long)]
    dist: Option<PathBuf>,

    /// Listen address.
    #[arg(short, long, env = "SSR_BIND")]
    bind: Option<String>,
}

impl Cli {
    fn apply(self, config: &mut SsrConfig) {
        if let Some(mode) = self.mode {
            config.app.mode = mode;
        }
        if let Some(root) = self.root {
            config.app.root = root;
        }
        if let Some(index) = self.index {
            config.app.index = index;
        }
        if let Some(dist) = self.dist {
            config.app.dist = dist;
        }
        if let Some(bind) = self.bind {
            config.server.bind_address = bind;
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => SsrConfig::default(),
    };
    cli.apply(&mut config);
    if let Err(errors) = validate_config(&config) {
        for error in &errors {
            eprintln!("invalid configuration: {error}");
        }
        return Err("invalid configuration".into());
    }

    logging::init_logging(&config.observability)?;
    tracing::info!(mode = %config.app.mode, "ssr-handle v{} starting", env!("CARGO_PKG_VERSION"));

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr)?,
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let runtime = bootstrap(&config)?;

    let listener = TcpListener::bind(&config.server.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    spawn_signal_listener(shutdown.clone());

    HttpServer::new(runtime, &config.server)
        .run(listener, shutdown.subscribe())
        .await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
