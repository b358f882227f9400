use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use skyline_index::PostIndex;
use tokio::net::TcpListener;
use tracing::info;

use crate::config::ServerConfig;
use crate::error::ServerResult;
use crate::handler::AppState;
use crate::router::build_router;

/// Feed generator HTTP server.
pub struct FeedServer {
    config: ServerConfig,
    index: Arc<dyn PostIndex>,
}

impl FeedServer {
    pub fn new(config: ServerConfig, index: Arc<dyn PostIndex>) -> Self {
        Self { config, index }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Build the router (useful for testing).
    pub fn router(&self) -> axum::Router {
        build_router(AppState::new(Arc::clone(&self.index), self.config.clone()))
    }

    /// Claim the configured address. Fails here, not in `serve`, when the
    /// port is taken.
    pub async fn bind(self) -> ServerResult<BoundFeedServer> {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        let addr = listener.local_addr()?;
        info!(%addr, "feed server listening");
        Ok(BoundFeedServer {
            app: self.router(),
            listener,
            addr,
        })
    }

    /// Bind, then serve until `shutdown` resolves.
    pub async fn serve<F>(self, shutdown: F) -> ServerResult<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.bind().await?.serve(shutdown).await
    }
}

/// A feed server holding its listening socket.
#[derive(Debug)]
pub struct BoundFeedServer {
    app: axum::Router,
    listener: TcpListener,
    addr: SocketAddr,
}

impl BoundFeedServer {
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Serve until `shutdown` resolves, then finish in-flight requests.
    pub async fn serve<F>(self, shutdown: F) -> ServerResult<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        axum::serve(self.listener, self.app)
            .with_graceful_shutdown(shutdown)
            .await?;
        info!(addr = %self.addr, "feed server stopped");
        Ok(())
    }
}
