use clap::Parser;
use exn::ResultExt;
use std::net::IpAddr;
use std::path::PathBuf;
use strata::error::{StartupError, StartupResult};
use strata::{AppState, router};
use strata_config::Config;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "strata=info,tower_http=info";

#[derive(Parser)]
#[command(name = "strata", version, about = "Two-tier file storage service over HTTP")]
struct Cli {
    /// Configuration file (defaults to `config.toml` in the platform config directory, if present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to bind (overrides `server.host`)
    #[arg(long)]
    host: Option<IpAddr>,

    /// Port to bind (overrides `server.port`)
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> StartupResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER)))
        .init();
    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref()).or_raise(|| StartupError("configuration"))?;
    if let Some(host) = cli.host {
        config.server.host = host;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }

    let state = AppState::from_config(&config).await?;
    let app = router(state, config.server.max_upload_bytes);
    let addr = config.socket_addr();
    let listener = TcpListener::bind(addr).await.or_raise(|| StartupError("bind"))?;
    tracing::info!(%addr, public_url = %config.public_url(), "Listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .or_raise(|| StartupError("serve"))?;
    tracing::info!("Server stopped");
    Ok(())
}

/// Resolves on Ctrl-C (or SIGTERM on Unix).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Could not listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };
    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            },
            Err(e) => {
                tracing::error!(error = %e, "Could not listen for SIGTERM");
                std::future::pending::<()>().await;
            },
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("Shutting down");
}
