//! Frame record types shared by the catalog, codec and sessions

use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Role of a record within a catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    /// The single descriptive header frame (stream schema, styling).
    Metadata,
    /// A timestamped unit of visualization state.
    Data,
}

/// Raw frame bytes as found on disk.
///
/// Payloads are immutable and cheap to clone (`Arc`), so sessions can hold
/// them without copying.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FramePayload {
    /// GLB container holding a binary XVIZ message.
    Binary(Arc<[u8]>),
    /// JSON encoded XVIZ message.
    Json(Arc<str>),
}

impl FramePayload {
    /// Classify raw bytes: anything starting with `{` that is valid UTF-8 is JSON.
    pub fn from_bytes(data: Vec<u8>) -> Self {
        if data.first() == Some(&b'{') {
            match String::from_utf8(data) {
                Ok(text) => return FramePayload::Json(text.into()),
                Err(err) => return FramePayload::Binary(err.into_bytes().into()),
            }
        }
        FramePayload::Binary(data.into())
    }

    pub fn is_binary(&self) -> bool {
        matches!(self, FramePayload::Binary(_))
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            FramePayload::Binary(bytes) => bytes,
            FramePayload::Json(text) => text.as_bytes(),
        }
    }

    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.as_bytes().is_empty()
    }
}

/// One entry in a frame catalog.
#[derive(Debug, Clone)]
pub struct FrameRecord {
    pub kind: FrameKind,
    /// File the record was read from (`<memory>` for synthetic records).
    pub path: PathBuf,
    pub payload: FramePayload,
}

impl FrameRecord {
    pub fn new(kind: FrameKind, path: impl Into<PathBuf>, payload: FramePayload) -> Self {
        Self { kind, path: path.into(), payload }
    }

    /// Build a record that never touched the filesystem.
    pub fn in_memory(kind: FrameKind, payload: FramePayload) -> Self {
        Self::new(kind, "<memory>", payload)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_metadata(&self) -> bool {
        self.kind == FrameKind::Metadata
    }
}
