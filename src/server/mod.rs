//! WebSocket replay server
//!
//! [`ReplayServer`] accepts viewer connections, loads the data set on first
//! use, and runs one [`SessionDriver`](crate::session::SessionDriver) per
//! connection. Sessions share only the read-only [`Dataset`].
//!
//! ```rust,no_run
//! use xviz_replay::{ReplayServer, ServeConfig};
//!
//! # async fn example() -> xviz_replay::Result<()> {
//! let server = ReplayServer::bind(ServeConfig::new("/data/generated/circle")).await?;
//! println!("listening on {}", server.local_addr()?);
//!
//! let shutdown = server.shutdown_token();
//! tokio::spawn(async move {
//!     let _ = tokio::signal::ctrl_c().await;
//!     shutdown.cancel();
//! });
//! server.run().await
//! # }
//! ```

mod connection;
mod registry;

pub use registry::{ConnectionGuard, ConnectionRegistry};

use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::OnceCell;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::ServeConfig;
use crate::dataset::Dataset;
use crate::{Result, ServeError};

/// State shared by every connection task.
pub(crate) struct Shared {
    config: ServeConfig,
    dataset: OnceCell<Arc<Dataset>>,
    registry: Arc<ConnectionRegistry>,
}

impl Shared {
    /// The data set, loaded off the executor on first use.
    ///
    /// A failed load is not cached; the next connection tries again.
    async fn dataset(&self) -> Result<Arc<Dataset>> {
        self.dataset
            .get_or_try_init(|| async {
                let directory = self.config.data_directory.clone();
                info!("Loading data set from {}", directory.display());
                let dataset = tokio::task::spawn_blocking(move || Dataset::open(directory))
                    .await
                    .map_err(|e| ServeError::transport_with_source("data set loader failed", Box::new(e)))??;
                Ok(Arc::new(dataset))
            })
            .await
            .cloned()
    }
}

/// Accepts viewers and serves each one its own playback session.
pub struct ReplayServer {
    listener: TcpListener,
    shared: Arc<Shared>,
    shutdown: CancellationToken,
}

impl ReplayServer {
    /// Validate `config` and bind the listening socket.
    pub async fn bind(config: ServeConfig) -> Result<Self> {
        config.validate()?;
        let address = SocketAddr::new(config.bind_address, config.port);
        let listener = TcpListener::bind(address).await.map_err(|e| {
            ServeError::transport_with_source(format!("failed to bind {}", address), Box::new(e))
        })?;

        let shutdown = CancellationToken::new();
        let shared = Arc::new(Shared {
            config,
            dataset: OnceCell::new(),
            registry: ConnectionRegistry::new(shutdown.clone()),
        });
        Ok(Self { listener, shared, shutdown })
    }

    /// Serve an already loaded data set instead of loading on first connection.
    pub fn with_dataset(mut self, dataset: Arc<Dataset>) -> Self {
        self.shared = Arc::new(Shared {
            config: self.shared.config.clone(),
            dataset: OnceCell::new_with(Some(dataset)),
            registry: Arc::clone(&self.shared.registry),
        });
        self
    }

    /// Load the data set now rather than on first connection.
    pub async fn preload(&self) -> Result<Arc<Dataset>> {
        self.shared.dataset().await
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener
            .local_addr()
            .map_err(|e| ServeError::transport_with_source("listener has no address", Box::new(e)))
    }

    pub fn config(&self) -> &ServeConfig {
        &self.shared.config
    }

    pub fn registry(&self) -> Arc<ConnectionRegistry> {
        Arc::clone(&self.shared.registry)
    }

    /// Token that stops the accept loop and closes every session.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Accept connections until the shutdown token is cancelled.
    pub async fn run(self) -> Result<()> {
        info!("Serving XVIZ frames on ws://{}", self.local_addr()?);

        loop {
            let accepted = tokio::select! {
                _ = self.shutdown.cancelled() => break,
                accepted = self.listener.accept() => accepted,
            };

            match accepted {
                Ok((stream, peer)) => {
                    tokio::spawn(connection::serve_connection(stream, peer, Arc::clone(&self.shared)));
                }
                Err(e) => warn!("Accept failed: {}", e),
            }
        }

        info!(active = self.shared.registry.active_count(), "Server shutting down");
        Ok(())
    }
}

impl Drop for ReplayServer {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
