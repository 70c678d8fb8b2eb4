//! The shared, read-only view of one data set
//!
//! A [`Dataset`] bundles the frame catalog, its timing index and the two
//! metadata variants. It is built once and shared by every session through
//! an `Arc`; decoded frames are cached per slot on first use.

use serde_json::Value;
use std::path::Path;
use std::sync::{Arc, OnceLock};
use tracing::info;

use crate::Result;
use crate::catalog::{ArchiveExtractor, FrameCatalog, TarExtractor};
use crate::codec::{FrameCodec, XvizCodec};
use crate::timing::TimingIndex;

/// Log and live flavours of the metadata message, both immutable.
///
/// The live variant is derived from the recorded one at construction time by
/// dropping `log_info`, which would otherwise pin viewers to a fixed window.
#[derive(Debug, Clone)]
pub struct MetadataVariants {
    log: Arc<Value>,
    live: Arc<Value>,
}

impl MetadataVariants {
    pub fn new(log: Value) -> Self {
        let mut live = log.clone();
        if let Some(body) = live.as_object_mut() {
            body.remove("log_info");
        }
        if let Some(data) = live.get_mut("data").and_then(Value::as_object_mut) {
            data.remove("log_info");
        }
        Self { log: Arc::new(log), live: Arc::new(live) }
    }

    pub fn log(&self) -> &Arc<Value> {
        &self.log
    }

    pub fn live(&self) -> &Arc<Value> {
        &self.live
    }

    pub fn for_mode(&self, live: bool) -> &Arc<Value> {
        if live { &self.live } else { &self.log }
    }
}

/// Catalog, timing index and metadata for one data directory.
pub struct Dataset {
    catalog: FrameCatalog,
    timing: Arc<TimingIndex>,
    metadata: MetadataVariants,
    codec: Arc<dyn FrameCodec>,
    decoded: Vec<OnceLock<Arc<Value>>>,
}

impl std::fmt::Debug for Dataset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dataset")
            .field("root", &self.catalog.root())
            .field("frames", &self.catalog.frame_count())
            .field("timing", &self.timing.source())
            .finish()
    }
}

impl Dataset {
    /// Load a data directory with the default codec and archive extractor.
    pub fn open<P: AsRef<Path>>(directory: P) -> Result<Self> {
        Self::open_with(directory, &TarExtractor, Arc::new(XvizCodec))
    }

    pub fn open_with<P: AsRef<Path>>(
        directory: P,
        extractor: &dyn ArchiveExtractor,
        codec: Arc<dyn FrameCodec>,
    ) -> Result<Self> {
        let catalog = FrameCatalog::load_with(directory, extractor)?;
        Self::from_catalog(catalog, codec)
    }

    /// Build the timing index and metadata variants for a loaded catalog.
    ///
    /// Decoding every frame for derived timing is blocking work; call this off
    /// the async executor.
    pub fn from_catalog(catalog: FrameCatalog, codec: Arc<dyn FrameCodec>) -> Result<Self> {
        let timing = TimingIndex::build(&catalog, codec.as_ref());
        Self::with_timing(catalog, timing, codec)
    }

    pub fn with_timing(
        catalog: FrameCatalog,
        timing: TimingIndex,
        codec: Arc<dyn FrameCodec>,
    ) -> Result<Self> {
        let metadata = MetadataVariants::new(codec.decode(&catalog.metadata().payload)?);
        let decoded = (0..catalog.frame_count()).map(|_| OnceLock::new()).collect();

        info!(
            root = %catalog.root().display(),
            frames = catalog.frame_count(),
            timing = ?timing.source(),
            "Dataset ready"
        );

        Ok(Self { catalog, timing: Arc::new(timing), metadata, codec, decoded })
    }

    pub fn catalog(&self) -> &FrameCatalog {
        &self.catalog
    }

    pub fn timing(&self) -> &Arc<TimingIndex> {
        &self.timing
    }

    pub fn metadata(&self) -> &MetadataVariants {
        &self.metadata
    }

    pub fn frame_count(&self) -> usize {
        self.catalog.frame_count()
    }

    /// Decoded message for data frame `index`, decoded at most once.
    ///
    /// Returns `Ok(None)` for an index outside the catalog.
    pub fn decoded_frame(&self, index: usize) -> Result<Option<Arc<Value>>> {
        let (Some(slot), Some(record)) = (self.decoded.get(index), self.catalog.frame(index)) else {
            return Ok(None);
        };

        if let Some(message) = slot.get() {
            return Ok(Some(Arc::clone(message)));
        }

        let message = Arc::new(self.codec.decode(&record.payload)?);
        Ok(Some(Arc::clone(slot.get_or_init(|| message))))
    }
}
