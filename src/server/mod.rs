//! HTTP server for the matching service
//!
//! Binds the two-endpoint API surface and owns the serve loop. Graceful
//! shutdown optionally stops every active stream so parked callers are
//! released immediately.

pub mod config;
pub mod routes;

pub use config::ServerConfig;
pub use routes::router;

use std::sync::Arc;

use tokio::net::TcpListener;

use crate::error::Result;
use crate::service::StreamService;

/// Output matching HTTP server
pub struct StreamServer {
    config: ServerConfig,
    service: Arc<StreamService>,
}

impl StreamServer {
    /// Create a new server with the given configuration and service
    pub fn new(config: ServerConfig, service: StreamService) -> Self {
        Self {
            config,
            service: Arc::new(service),
        }
    }

    /// Get a reference to the matching service
    pub fn service(&self) -> &Arc<StreamService> {
        &self.service
    }

    /// Get the bind address
    pub fn bind_addr(&self) -> std::net::SocketAddr {
        self.config.bind_addr
    }

    /// Run the server
    ///
    /// This method blocks until the serve loop fails.
    pub async fn run(&self) -> Result<()> {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        tracing::info!(addr = %self.config.bind_addr, "Output matching server listening");

        axum::serve(listener, router(Arc::clone(&self.service))).await?;
        Ok(())
    }

    /// Run the server with graceful shutdown
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        tracing::info!(addr = %self.config.bind_addr, "Output matching server listening");

        axum::serve(listener, router(Arc::clone(&self.service)))
            .with_graceful_shutdown(shutdown)
            .await?;

        tracing::info!("Shutdown signal received");
        if self.config.stop_streams_on_shutdown {
            self.service.stop_all();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::registry::StreamRegistry;

    use super::*;

    #[tokio::test]
    async fn test_server_exposes_service() {
        let service = StreamService::new(Arc::new(StreamRegistry::new()));
        let config = ServerConfig::with_addr("127.0.0.1:0".parse().unwrap());
        let server = StreamServer::new(config, service);

        assert_eq!(server.bind_addr().port(), 0);
        assert_eq!(server.service().registry().stream_count(), 0);
    }

    #[tokio::test]
    async fn test_graceful_shutdown_stops_streams() {
        let service = StreamService::new(Arc::new(StreamRegistry::new()));
        let config = ServerConfig::with_addr("127.0.0.1:0".parse().unwrap());
        let server = StreamServer::new(config, service);

        let buffer = server.service().registry().get_or_create("s1", 10);

        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let shutdown = async move {
            let _ = rx.await;
        };
        let run = server.run_until(shutdown);
        tx.send(()).unwrap();
        run.await.unwrap();

        assert!(buffer.is_stopped());
    }
}
