//! Real-time paced replay of recorded XVIZ logs over WebSocket.
//!
//! XVIZ Replay streams a pre-recorded, timestamp-ordered sequence of frames to
//! viewers, pacing delivery in real time and supporting mid-stream seeks and
//! infinite looped playback.
//!
//! # Features
//!
//! - **Frame Catalog**: gap-free `N-frame.glb` / `N-frame.json` scanning with one-time archive extraction
//! - **Timing Index**: precomputed or derived per-frame timestamps with carry-forward
//! - **Looping**: logical-to-physical index resolution with a no-repeat wrap policy
//! - **Live Mode**: timestamps shifted on every loop so viewer clocks keep increasing
//! - **Sessions**: a pure playback state machine per connection, driven by one timer
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use xviz_replay::{ServeConfig, XvizReplay};
//!
//! #[tokio::main]
//! async fn main() -> xviz_replay::Result<()> {
//!     let config = ServeConfig::new("/data/generated/kitti-2011_09_26").with_live(true);
//!     XvizReplay::serve(config).await
//! }
//! ```

pub mod catalog;
pub mod codec;
pub mod config;
pub mod dataset;
mod error;
pub mod gateway;
pub mod resolver;
pub mod server;
pub mod session;
#[cfg_attr(any(test, feature = "benchmark"), path = "test_utils.rs")]
#[cfg(any(test, feature = "benchmark"))]
pub mod test_utils;
pub mod timing;
pub mod types;

// Core exports
pub use error::*;
pub use types::*;

// Main API exports
pub use catalog::FrameCatalog;
pub use codec::{FrameCodec, XvizCodec};
pub use config::ServeConfig;
pub use dataset::{Dataset, MetadataVariants};
pub use gateway::{ChannelGateway, DeliveryGateway, WebSocketGateway};
pub use resolver::{WrapPolicy, resolve_frame_index};
pub use server::{ConnectionRegistry, ReplayServer};
pub use session::{PlaybackMachine, SessionDriver, SessionHandle, SessionSettings, SessionState};
pub use timing::{TimingIndex, TimingSource, extract_timestamp};

use std::path::Path;
use std::sync::Arc;

/// Unified entry point for loading and serving XVIZ logs.
///
/// # Examples
///
/// ## Inspect a data set
/// ```rust,no_run
/// use xviz_replay::XvizReplay;
///
/// #[tokio::main]
/// async fn main() -> xviz_replay::Result<()> {
///     let dataset = XvizReplay::open("/data/generated/circle").await?;
///     println!("{} frames, timing from {:?}", dataset.frame_count(), dataset.timing().source());
///     Ok(())
/// }
/// ```
pub struct XvizReplay;

impl XvizReplay {
    /// Load a data directory: catalog, timing index and metadata.
    ///
    /// Loading reads every frame and may decode all of them, so it runs on
    /// the blocking pool.
    ///
    /// # Errors
    ///
    /// Returns [`ServeError::CatalogUnavailable`] if the directory holds no
    /// frames and no extractable archive.
    pub async fn open<P: AsRef<Path>>(directory: P) -> Result<Arc<Dataset>> {
        let directory = directory.as_ref().to_path_buf();
        let dataset = tokio::task::spawn_blocking(move || Dataset::open(directory))
            .await
            .map_err(|e| ServeError::transport_with_source("data set loader failed", Box::new(e)))??;
        Ok(Arc::new(dataset))
    }

    /// Bind a server for `config` and serve until Ctrl-C.
    ///
    /// The data set is loaded before the first connection is accepted, so a
    /// missing catalog fails here instead of on every connection.
    pub async fn serve(config: ServeConfig) -> Result<()> {
        let server = ReplayServer::bind(config).await?;
        server.preload().await?;

        let shutdown = server.shutdown_token();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    tracing::info!("Ctrl-C received");
                    shutdown.cancel();
                }
                Err(e) => tracing::warn!("Ctrl-C handler unavailable: {}", e),
            }
        });

        server.run().await
    }
}
