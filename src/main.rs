//! Queryloom - Main Entry Point
//!
//! Natural-language-to-SQL translation service over a local SQLite
//! database, with multi-provider LLM fallback and query history.

use clap::Parser;
use mimalloc::MiMalloc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use queryloom::config::AppConfig;
use queryloom::server::create_app;

// Use mimalloc for better performance
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

/// Command-line arguments.
#[derive(Parser, Debug)]
#[command(name = "queryloom")]
#[command(about = "Queryloom - Natural-language-to-SQL translation service")]
#[command(version)]
struct Args {
    /// Host to bind to.
    #[arg(long, env = "QUERYLOOM_HOST")]
    host: Option<String>,

    /// Port to listen on.
    #[arg(short, long, env = "QUERYLOOM_PORT")]
    port: Option<u16>,

    /// Log level.
    #[arg(long, env = "RUST_LOG", default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command-line arguments
    let args = Args::parse();

    // Initialize tracing
    init_tracing(&args.log_level);

    tracing::info!("Starting Queryloom v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration; CLI flags win over file and environment
    let mut config = AppConfig::load()?;
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    tracing::info!("Configuration loaded");

    let addr = format!("{}:{}", config.server.host, config.server.port);

    // Create the application
    let app = create_app(config).await?;
    tracing::info!("Application initialized");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Listening on {}", addr);

    // Run the server
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shut down gracefully");
    Ok(())
}

/// Initialize tracing/logging.
fn init_tracing(log_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Graceful shutdown signal handler.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
