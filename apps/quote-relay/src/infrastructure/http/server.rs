//! HTTP server lifecycle.

use std::net::SocketAddr;

use axum::Router;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

/// HTTP server bound to a listening socket.
#[derive(Debug)]
pub struct HttpServer {
    listener: TcpListener,
    router: Router,
}

impl HttpServer {
    /// Bind the listening socket on all interfaces.
    ///
    /// Port 0 picks an ephemeral port; see [`HttpServer::local_addr`].
    ///
    /// # Errors
    ///
    /// Returns `ServerError::BindFailed` if the port cannot be bound.
    pub async fn bind(port: u16, router: Router) -> Result<Self, ServerError> {
        let addr = SocketAddr::from(([0, 0, 0, 0], port));
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::BindFailed(port, e.to_string()))?;
        Ok(Self { listener, router })
    }

    /// Address the server is listening on.
    ///
    /// # Errors
    ///
    /// Returns `ServerError::ServerFailed` if the socket address is unavailable.
    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        self.listener
            .local_addr()
            .map_err(|e| ServerError::ServerFailed(e.to_string()))
    }

    /// Serve requests until cancelled.
    ///
    /// # Errors
    ///
    /// Returns `ServerError::ServerFailed` if the server hits a fatal error.
    pub async fn run(self, cancel: CancellationToken) -> Result<(), ServerError> {
        if let Ok(addr) = self.listener.local_addr() {
            tracing::info!(%addr, "HTTP server listening");
        }

        axum::serve(self.listener, self.router)
            .with_graceful_shutdown(cancel.cancelled_owned())
            .await
            .map_err(|e| ServerError::ServerFailed(e.to_string()))?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// HTTP server errors.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Failed to bind to port.
    #[error("failed to bind to port {0}: {1}")]
    BindFailed(u16, String),

    /// Server error.
    #[error("server error: {0}")]
    ServerFailed(String),
}
