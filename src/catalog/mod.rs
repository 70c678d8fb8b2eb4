//! Frame catalog: the ordered set of frame records for one data set.
//!
//! A data directory holds one file per frame, named `<index>-frame.glb` or
//! `<index>-frame.json`:
//!
//! - index `0` is the optional precomputed timing index
//! - index `1` is the metadata frame
//! - indices `2..` are data frames, without gaps
//!
//! When no frames are present the catalog extracts `frames.tar.gz` once and
//! scans again. Extraction goes to a staging directory and frame files are
//! moved into place only after it succeeds, metadata last. Records are read fully into memory at load time and are
//! immutable afterwards.
//!
//! ```rust,no_run
//! use xviz_replay::catalog::FrameCatalog;
//!
//! fn list() -> xviz_replay::Result<()> {
//!     let catalog = FrameCatalog::load("/data/generated/kitti-2011_09_26")?;
//!     println!("{} data frames", catalog.frame_count());
//!     Ok(())
//! }
//! ```

mod archive;

pub use archive::{ArchiveExtractor, TarExtractor};

use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::types::{FrameKind, FramePayload, FrameRecord};
use crate::{Result, ServeError};

/// File index of the precomputed timing artifact.
pub const TIMING_INDEX: usize = 0;
/// File index of the metadata frame, first scanned index.
pub const START_INDEX: usize = 1;
/// Highest file index scanned.
pub const MAX_FRAME_INDEX: usize = 99_999;

pub const FRAME_DATA_SUFFIX: &str = "-frame.glb";
pub const FRAME_DATA_JSON_SUFFIX: &str = "-frame.json";
pub const ARCHIVE_NAME: &str = "frames.tar.gz";
/// Staging directory for archive extraction, inside the data directory.
pub const STAGING_DIR: &str = ".frames-extract";

/// Candidate file names for a frame index, in lookup order.
pub fn frame_file_names(index: usize) -> [String; 2] {
    [format!("{}{}", index, FRAME_DATA_SUFFIX), format!("{}{}", index, FRAME_DATA_JSON_SUFFIX)]
}

/// First existing file for `index` in `directory`.
pub fn find_frame_file(directory: &Path, index: usize) -> Option<PathBuf> {
    frame_file_names(index).into_iter().map(|name| directory.join(name)).find(|path| path.is_file())
}

fn read_record(kind: FrameKind, path: PathBuf) -> Result<FrameRecord> {
    let data = std::fs::read(&path).map_err(|e| ServeError::file_error(&path, e))?;
    Ok(FrameRecord::new(kind, path, FramePayload::from_bytes(data)))
}

/// Ordered, immutable set of frames for one data set.
#[derive(Debug)]
pub struct FrameCatalog {
    root: PathBuf,
    metadata: FrameRecord,
    frames: Vec<FrameRecord>,
    timing: Option<FrameRecord>,
}

impl FrameCatalog {
    /// Load the catalog in `directory`, extracting `frames.tar.gz` if needed.
    pub fn load<P: AsRef<Path>>(directory: P) -> Result<Self> {
        Self::load_with(directory, &TarExtractor)
    }

    /// Load with a custom archive extractor.
    pub fn load_with<P: AsRef<Path>>(directory: P, extractor: &dyn ArchiveExtractor) -> Result<Self> {
        let root = directory.as_ref().to_path_buf();
        if !root.is_dir() {
            return Err(ServeError::catalog_unavailable(&root, "data directory does not exist"));
        }

        if find_frame_file(&root, START_INDEX).is_none() {
            info!("No frames found in {}, checking for archive", root.display());
            Self::extract_staged(&root, extractor)?;
        }

        let paths = Self::scan(&root);
        let mut records = paths.into_iter();
        let Some(metadata_path) = records.next() else {
            return Err(ServeError::catalog_unavailable(&root, "no frames found"));
        };

        let metadata = read_record(FrameKind::Metadata, metadata_path)?;
        let frames = records
            .map(|path| read_record(FrameKind::Data, path))
            .collect::<Result<Vec<_>>>()?;

        let timing = find_frame_file(&root, TIMING_INDEX)
            .map(|path| read_record(FrameKind::Metadata, path))
            .transpose()?;

        Self::from_records(root, metadata, frames, timing)
    }

    /// Extract into [`STAGING_DIR`], then move the results into `root`.
    ///
    /// A failed extraction leaves `root` untouched, so the next load retries.
    fn extract_staged(root: &Path, extractor: &dyn ArchiveExtractor) -> Result<()> {
        let staging = root.join(STAGING_DIR);
        if staging.exists() {
            std::fs::remove_dir_all(&staging).map_err(|e| ServeError::file_error(&staging, e))?;
        }
        std::fs::create_dir(&staging).map_err(|e| ServeError::file_error(&staging, e))?;

        let extracted = extractor
            .extract(&root.join(ARCHIVE_NAME), &staging)
            .and_then(|()| Self::promote(&staging, root));

        if let Err(e) = std::fs::remove_dir_all(&staging) {
            warn!("Failed to remove staging directory {}: {}", staging.display(), e);
        }
        extracted
    }

    /// Move staged entries into `root`. The metadata frame goes last, so an
    /// interrupted move still reads as "no frames" on the next load.
    fn promote(staging: &Path, root: &Path) -> Result<()> {
        let mut entries = std::fs::read_dir(staging)
            .and_then(|dir| dir.map(|entry| entry.map(|e| e.file_name())).collect::<std::io::Result<Vec<_>>>())
            .map_err(|e| ServeError::file_error(staging, e))?;

        let metadata_names = frame_file_names(START_INDEX);
        entries.sort_by_key(|name| metadata_names.iter().any(|m| name.as_os_str() == m.as_str()));

        for name in entries {
            let target = root.join(&name);
            std::fs::rename(staging.join(&name), &target).map_err(|e| {
                ServeError::catalog_unavailable(root, format!("failed to move {}: {}", target.display(), e))
            })?;
        }
        debug!("Promoted extracted frames into {}", root.display());
        Ok(())
    }

    /// Gap-free run of frame files starting at [`START_INDEX`].
    fn scan(root: &Path) -> Vec<PathBuf> {
        let paths: Vec<PathBuf> = (START_INDEX..=MAX_FRAME_INDEX)
            .map_while(|index| find_frame_file(root, index))
            .collect();
        debug!("Found {} frame files in {}", paths.len(), root.display());
        paths
    }

    /// Assemble a catalog from records already in memory.
    pub fn from_records(
        root: impl Into<PathBuf>,
        metadata: FrameRecord,
        frames: Vec<FrameRecord>,
        timing: Option<FrameRecord>,
    ) -> Result<Self> {
        let root = root.into();
        if frames.is_empty() {
            return Err(ServeError::catalog_unavailable(&root, "metadata found but no data frames"));
        }

        info!("Frame catalog {}: {} data frames", root.display(), frames.len());
        Ok(Self { root, metadata, frames, timing })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn metadata(&self) -> &FrameRecord {
        &self.metadata
    }

    /// Data frames; physical index `i` is `frames()[i]`.
    pub fn frames(&self) -> &[FrameRecord] {
        &self.frames
    }

    pub fn frame(&self, index: usize) -> Option<&FrameRecord> {
        self.frames.get(index)
    }

    /// Number of data frames (the metadata frame is not counted).
    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// Precomputed timing artifact, if present.
    pub fn timing_record(&self) -> Option<&FrameRecord> {
        self.timing.as_ref()
    }
}
