//! Route registry server.
//!
//! ```text
//!     Client Request
//!     ───▶ global layers (request id, trace, timeout, headers, gzip, limit)
//!          ───▶ route middleware (auth, no-cache, cors)
//!               ───▶ compiled handler (bind arguments → controller target)
//!     ◀─── error pipeline (JSON errors)
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::net::TcpListener;

use route_registry::config::{load_config, ServerConfig};
use route_registry::controllers::ServiceController;
use route_registry::lifecycle::{wait_for_signal, Shutdown};
use route_registry::observability::{logging, metrics};
use route_registry::routing::{AxumRouteSink, RouteRegistry};
use route_registry::HttpServer;

#[derive(Parser)]
#[command(name = "route-registry", version, about = "Annotation-driven HTTP route server")]
struct Cli {
    /// TOML configuration file. Defaults apply when omitted.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the mounted controllers (default).
    Serve,
    /// Print the compiled route table as JSON.
    Routes,
}

fn registry() -> RouteRegistry {
    let registry = RouteRegistry::new();
    registry.mount(Arc::new(ServiceController::default()));
    registry
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ServerConfig::default(),
    };

    logging::init(&config.observability);

    match cli.command.unwrap_or(Command::Serve) {
        Command::Routes => {
            let registry = registry();
            let mut sink = AxumRouteSink::new();
            registry.compile_routes(&mut sink);
            println!("{}", serde_json::to_string_pretty(&registry.snapshot())?);
            Ok(())
        }
        Command::Serve => serve(config).await,
    }
}

async fn serve(config: ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!("route-registry v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr)?,
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let registry = registry();
    let server = HttpServer::new(config, &registry);

    let shutdown = Shutdown::new();
    let trigger = shutdown.clone();
    tokio::spawn(async move {
        wait_for_signal().await;
        trigger.trigger();
    });

    server.run(listener, shutdown.signal()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
