//! camfeed - serve MJPEG streams for the cameras in a TOML config
//!
//! ```text
//! camfeed --config camfeed.toml
//! camfeed --config camfeed.toml --bind 127.0.0.1:8080
//! ```
//!
//! Logging is controlled by `RUST_LOG` and defaults to `camfeed=info`.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use camfeed::capture::UrlBackend;
use camfeed::{AppConfig, Hub, MjpegServer};

#[derive(Debug, Parser)]
#[command(name = "camfeed", version, about = "Multi-camera MJPEG relay")]
struct Args {
    /// Path to the TOML configuration file
    #[arg(short, long, env = "CAMFEED_CONFIG", default_value = "camfeed.toml")]
    config: PathBuf,

    /// Override the bind address from the configuration
    #[arg(short, long)]
    bind: Option<SocketAddr>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("camfeed=info")),
        )
        .init();

    let mut config = AppConfig::load(&args.config)?;
    if let Some(bind) = args.bind {
        config.server.bind = bind;
    }
    tracing::info!(
        config = %args.config.display(),
        cameras = config.cameras.len(),
        "Configuration loaded"
    );

    let hub = Arc::new(Hub::from_config(&config));
    hub.start(Arc::new(UrlBackend::new(config.http_backend())));

    let server = MjpegServer::new(config.server_config(), Arc::clone(&hub));
    let result = server
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for Ctrl+C");
                std::future::pending::<()>().await;
            }
        })
        .await;

    hub.shutdown().await;
    result?;
    Ok(())
}
