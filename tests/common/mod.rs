//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use serde_json::{Value, json};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use xviz_replay::{
    Dataset, FrameCatalog, FrameKind, FramePayload, FrameRecord, RangeEnd, RequestDefaults,
    SessionSettings, WrapPolicy, XvizCodec,
};

static NEXT_DIR: AtomicUsize = AtomicUsize::new(0);

pub fn metadata() -> Value {
    json!({
        "type": "xviz/metadata",
        "data": {
            "version": "2.0.0",
            "log_info": {"log_start_time": 1000.0, "log_end_time": 1030.0},
            "streams": {"/vehicle_pose": {}}
        }
    })
}

pub fn state_update(timestamp: f64) -> Value {
    json!({
        "type": "xviz/state_update",
        "data": {
            "update_type": "snapshot",
            "updates": [{
                "timestamp": timestamp,
                "poses": {"/vehicle_pose": {"timestamp": timestamp, "position": [0.0, 0.0, 0.0]}}
            }]
        }
    })
}

fn record(kind: FrameKind, message: &Value) -> FrameRecord {
    FrameRecord::in_memory(kind, FramePayload::Json(message.to_string().into()))
}

/// Data set held in memory, one state update per timestamp.
pub fn dataset(timestamps: &[f64]) -> Arc<Dataset> {
    let catalog = FrameCatalog::from_records(
        "<memory>",
        record(FrameKind::Metadata, &metadata()),
        timestamps.iter().map(|ts| record(FrameKind::Data, &state_update(*ts))).collect(),
        None,
    )
    .expect("catalog");
    Arc::new(Dataset::from_catalog(catalog, Arc::new(XvizCodec)).expect("dataset"))
}

pub fn settings(live: bool, end: RangeEnd, interval_ms: u64) -> SessionSettings {
    SessionSettings {
        live,
        skip_images: false,
        wrap_policy: WrapPolicy::AvoidRepeat,
        defaults: RequestDefaults { end, interval: Duration::from_millis(interval_ms) },
    }
}

/// Temporary data directory, removed on drop.
pub struct DataDir(PathBuf);

impl DataDir {
    pub fn new(label: &str) -> Self {
        let path = std::env::temp_dir().join(format!(
            "xviz-replay-it-{}-{}-{}",
            label,
            std::process::id(),
            NEXT_DIR.fetch_add(1, Ordering::Relaxed)
        ));
        let _ = std::fs::remove_dir_all(&path);
        std::fs::create_dir_all(&path).expect("create data dir");
        Self(path)
    }

    pub fn path(&self) -> &Path {
        &self.0
    }

    pub fn write_frame(&self, index: usize, message: &Value) {
        std::fs::write(self.0.join(format!("{}-frame.json", index)), message.to_string())
            .expect("write frame");
    }

    /// Metadata at index 1, data frames from index 2.
    pub fn write_data_set(&self, timestamps: &[f64]) {
        self.write_frame(1, &metadata());
        for (position, ts) in timestamps.iter().enumerate() {
            self.write_frame(position + 2, &state_update(*ts));
        }
    }

    pub fn write_timing_index(&self, pairs: &[(f64, f64)]) {
        let timing: Vec<[f64; 2]> = pairs.iter().map(|(min, max)| [*min, *max]).collect();
        self.write_frame(0, &json!({"startTime": 0.0, "endTime": 0.0, "timing": timing}));
    }
}

impl Drop for DataDir {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.0);
    }
}
