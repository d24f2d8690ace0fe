use anyhow::Result;
use chrono::Utc;
use cspm_server::app;
use cspm_server::config::ServerConfig;
use cspm_server::state::AppState;
use cspm_storage::InventoryStore;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tokio::signal;
use tracing_subscriber::EnvFilter;

#[allow(clippy::print_stderr)]
fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cspm-server [config.toml]    Start the server (defaults apply when omitted)");
}

#[tokio::main]
async fn main() -> Result<()> {
    cspm_common::id::init(1, 1);

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("cspm=info".parse()?))
        .init();

    let args: Vec<String> = std::env::args().collect();
    let config = match args.get(1).map(|s| s.as_str()) {
        Some("-h") | Some("--help") => {
            print_usage();
            return Ok(());
        }
        Some(path) => ServerConfig::load(path)?,
        None => ServerConfig::default(),
    };

    let store = Arc::new(InventoryStore::new(Path::new(&config.data_dir))?);

    let state = AppState {
        store,
        start_time: Utc::now(),
    };
    let app = app::build_http_app(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.http_port));
    tracing::info!(%addr, "HTTP server listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    let _ = signal::ctrl_c().await;
    tracing::info!("Shutdown signal received");
}
