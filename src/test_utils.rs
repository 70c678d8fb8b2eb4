//! Test utilities for building frame fixtures
//!
//! Provides a self-cleaning data directory plus builders for the XVIZ
//! messages the catalog and timing index expect. Shared by unit tests and
//! the benchmarks.

#![cfg(any(test, feature = "benchmark"))]

use serde_json::{Value, json};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::catalog::FrameCatalog;
use crate::codec::encode_glb;
use crate::types::{FrameKind, FramePayload, FrameRecord};

static NEXT_DIR: AtomicUsize = AtomicUsize::new(0);

/// A data directory under the system temp dir, removed on drop.
#[derive(Debug)]
pub struct TestDataDir {
    path: PathBuf,
    owned: bool,
}

impl TestDataDir {
    /// Create a fresh, empty directory. `label` only helps when debugging leftovers.
    pub fn new(label: &str) -> Self {
        let path = std::env::temp_dir().join(format!(
            "xviz-replay-{}-{}-{}",
            label,
            std::process::id(),
            NEXT_DIR.fetch_add(1, Ordering::Relaxed)
        ));
        if path.exists() {
            let _ = std::fs::remove_dir_all(&path);
        }
        std::fs::create_dir_all(&path).expect("create test data dir");
        Self { path, owned: true }
    }

    /// Borrow an existing directory; it is left in place on drop.
    pub fn wrap(path: &Path) -> Self {
        Self { path: path.to_path_buf(), owned: false }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn write_raw(&self, name: &str, data: &[u8]) -> PathBuf {
        let path = self.path.join(name);
        std::fs::write(&path, data).expect("write fixture");
        path
    }

    pub fn write_json_frame(&self, index: usize, message: &Value) -> PathBuf {
        self.write_raw(&format!("{}-frame.json", index), message.to_string().as_bytes())
    }

    pub fn write_glb_frame(&self, index: usize, message: &Value) -> PathBuf {
        let glb = encode_glb(&json!({"asset": {"version": "2.0"}, "xviz": message}))
            .expect("encode glb");
        self.write_raw(&format!("{}-frame.glb", index), &glb)
    }

    /// Write `0-frame.json` with one `(min, max)` pair per data frame.
    pub fn write_timing_index(&self, timing: &[(f64, f64)]) -> PathBuf {
        let start = timing.first().map(|(min, _)| *min).unwrap_or_default();
        let end = timing.last().map(|(_, max)| *max).unwrap_or_default();
        let pairs: Vec<[f64; 2]> = timing.iter().map(|(min, max)| [*min, *max]).collect();
        self.write_json_frame(0, &json!({"startTime": start, "endTime": end, "timing": pairs}))
    }

    /// Write a complete data set: metadata plus one state update per timestamp.
    pub fn write_data_set(&self, timestamps: &[f64]) {
        self.write_json_frame(1, &metadata_message(timestamps.first().zip(timestamps.last())));
        for (position, ts) in timestamps.iter().enumerate() {
            self.write_json_frame(position + 2, &state_update(*ts));
        }
    }
}

impl Drop for TestDataDir {
    fn drop(&mut self) {
        if self.owned {
            let _ = std::fs::remove_dir_all(&self.path);
        }
    }
}

/// Metadata message, optionally with `log_info` start/end times.
pub fn metadata_message(log_range: Option<(&f64, &f64)>) -> Value {
    let mut message = json!({
        "type": "xviz/metadata",
        "data": {
            "version": "2.0.0",
            "streams": {
                "/vehicle_pose": {},
                "/circle": {"coordinate": "IDENTITY", "stream_style": {"fill_color": [200, 0, 70, 120]}}
            }
        }
    });
    if let Some((start, end)) = log_range {
        message["data"]["log_info"] = json!({"log_start_time": start, "log_end_time": end});
    }
    message
}

/// Current-shape state update with a single update at `timestamp`.
pub fn state_update(timestamp: f64) -> Value {
    json!({
        "type": "xviz/state_update",
        "data": {
            "update_type": "snapshot",
            "updates": [{
                "timestamp": timestamp,
                "poses": {"/vehicle_pose": {"timestamp": timestamp, "position": [0.0, 0.0, 0.0]}},
                "primitives": {"/circle": {"circles": [{"center": [0.0, 0.0, 0.0], "radius": 30.0}]}}
            }]
        }
    })
}

fn json_record(kind: FrameKind, message: &Value) -> FrameRecord {
    FrameRecord::in_memory(kind, FramePayload::Json(message.to_string().into()))
}

/// In-memory catalog with one state update per timestamp.
pub fn memory_catalog(timestamps: &[f64]) -> FrameCatalog {
    FrameCatalog::from_records(
        "<memory>",
        json_record(FrameKind::Metadata, &metadata_message(timestamps.first().zip(timestamps.last()))),
        timestamps.iter().map(|ts| json_record(FrameKind::Data, &state_update(*ts))).collect(),
        None,
    )
    .expect("memory catalog needs at least one timestamp")
}
