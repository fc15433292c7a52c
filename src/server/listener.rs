//! HTTP server listener
//!
//! Binds the TCP listener and serves the camera routes with axum until a
//! shutdown signal.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::Semaphore;

use crate::error::Result;
use crate::hub::Hub;
use crate::server::config::ServerConfig;
use crate::server::routes::{self, GatewayState};

/// MJPEG HTTP server
pub struct MjpegServer {
    config: ServerConfig,
    hub: Arc<Hub>,
}

impl MjpegServer {
    /// Create a server over a hub
    pub fn new(config: ServerConfig, hub: Arc<Hub>) -> Self {
        Self { config, hub }
    }

    /// Get a reference to the hub
    pub fn hub(&self) -> &Arc<Hub> {
        &self.hub
    }

    /// Build the axum router
    pub fn router(&self) -> Router {
        let viewer_limit = if self.config.max_viewers > 0 {
            Some(Arc::new(Semaphore::new(self.config.max_viewers)))
        } else {
            None
        };
        let state = Arc::new(GatewayState {
            hub: Arc::clone(&self.hub),
            viewer_limit,
        });
        routes::router(state, self.config.index_page)
    }

    /// Run the server until the hub shuts down
    pub async fn run(&self) -> Result<()> {
        let shutdown = self.hub.shutdown_token().clone();
        self.run_until(shutdown.cancelled_owned()).await
    }

    /// Bind and serve until `shutdown` resolves
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        self.serve(listener, shutdown).await
    }

    /// Serve on an already bound listener until `shutdown` resolves
    ///
    /// Open streams end when the hub's shutdown token is cancelled, so the
    /// hub must be shut down for this to return.
    pub async fn serve<F>(&self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        tracing::info!(addr = %addr, cameras = self.hub.cameras().len(), "MJPEG server listening");

        let hub = Arc::clone(&self.hub);
        let shutdown = async move {
            shutdown.await;
            tracing::info!("Shutdown signal received");
            hub.shutdown_token().cancel();
        };

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown)
            .await?;

        tracing::info!("MJPEG server stopped");
        Ok(())
    }

    /// Get the configured bind address
    pub fn bind_addr(&self) -> SocketAddr {
        self.config.bind_addr
    }
}
