//! Per-frame representative timestamps

use serde::Deserialize;
use tracing::{debug, info, warn};

use super::extract::extract_timestamp;
use crate::catalog::FrameCatalog;
use crate::codec::FrameCodec;
use crate::{Result, ServeError};

/// Shape of the precomputed `0-frame.json` artifact.
#[derive(Debug, Deserialize)]
struct PrecomputedTiming {
    #[serde(rename = "startTime", default)]
    start_time: Option<f64>,
    #[serde(rename = "endTime", default)]
    end_time: Option<f64>,
    #[serde(default)]
    timing: Vec<(f64, f64)>,
}

/// Where the timestamps of an index came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimingSource {
    Precomputed,
    Derived,
}

/// Timestamps aligned by position with a catalog's data frames.
///
/// Built once per catalog and read-only afterwards. Values never decrease
/// with frame position: a frame without a usable timestamp, or one that
/// goes backwards, carries the previous value forward.
#[derive(Debug)]
pub struct TimingIndex {
    timestamps: Vec<f64>,
    source: TimingSource,
    degradations: Vec<ServeError>,
}

/// Apply the carry-forward law to raw per-frame values.
///
/// Returns the timestamps and the positions that had to be carried.
fn carry_forward(raw: impl IntoIterator<Item = Option<f64>>) -> (Vec<f64>, Vec<usize>) {
    let mut last = 0.0f64;
    let mut carried = Vec::new();
    let timestamps = raw
        .into_iter()
        .enumerate()
        .map(|(position, ts)| {
            match ts.filter(|ts| ts.is_finite()) {
                Some(ts) if ts >= last || position == 0 => last = ts,
                _ => carried.push(position),
            }
            last
        })
        .collect();
    (timestamps, carried)
}

impl TimingIndex {
    /// Build the index for `catalog`, preferring a precomputed artifact.
    pub fn build(catalog: &FrameCatalog, codec: &dyn FrameCodec) -> Self {
        let frame_count = catalog.frame_count();
        let mut degradations = Vec::new();

        match Self::load_precomputed(catalog, codec) {
            Ok(Some(precomputed)) if precomputed.timing.len() == frame_count => {
                info!(
                    frames = frame_count,
                    start = ?precomputed.start_time,
                    end = ?precomputed.end_time,
                    "Using precomputed timing index"
                );
                let (timestamps, carried) =
                    carry_forward(precomputed.timing.iter().map(|(_, max)| Some(*max)));
                if !carried.is_empty() {
                    degradations.push(ServeError::timing_degraded(format!(
                        "precomputed index carried {} timestamps forward",
                        carried.len()
                    )));
                }
                return Self::finish(timestamps, TimingSource::Precomputed, degradations);
            }
            Ok(Some(precomputed)) => {
                degradations.push(ServeError::timing_degraded(format!(
                    "precomputed index has {} entries for {} frames",
                    precomputed.timing.len(),
                    frame_count
                )));
            }
            Ok(None) => debug!("No precomputed timing index"),
            Err(err) => {
                degradations.push(ServeError::timing_degraded(format!(
                    "precomputed timing index unreadable: {}",
                    err
                )));
            }
        }

        debug!(frames = frame_count, "Deriving timing index from frames");
        let raw: Vec<Option<f64>> = catalog
            .frames()
            .iter()
            .enumerate()
            .map(|(index, record)| match codec.decode(&record.payload) {
                Ok(message) => extract_timestamp(&message),
                Err(err) => {
                    debug!(index, error = %err, "Frame could not be decoded for timing");
                    None
                }
            })
            .collect();

        let (timestamps, carried) = carry_forward(raw);
        if !carried.is_empty() {
            degradations.push(ServeError::timing_degraded(format!(
                "{} of {} frames had no usable timestamp (first at position {})",
                carried.len(),
                frame_count,
                carried[0]
            )));
        }

        Self::finish(timestamps, TimingSource::Derived, degradations)
    }

    fn finish(timestamps: Vec<f64>, source: TimingSource, degradations: Vec<ServeError>) -> Self {
        for degradation in &degradations {
            warn!("{}", degradation);
        }
        Self { timestamps, source, degradations }
    }

    /// Read and validate the precomputed artifact, if the catalog has one.
    fn load_precomputed(
        catalog: &FrameCatalog,
        codec: &dyn FrameCodec,
    ) -> Result<Option<PrecomputedTiming>> {
        let Some(record) = catalog.timing_record() else {
            return Ok(None);
        };

        let document = codec.decode(&record.payload)?;
        let precomputed: PrecomputedTiming = serde_json::from_value(document)?;
        if precomputed.timing.is_empty() {
            return Err(ServeError::decode("timing index", "missing or empty \"timing\" entry"));
        }
        Ok(Some(precomputed))
    }

    /// Build an index directly from timestamps (carry-forward applied).
    pub fn from_timestamps(timestamps: Vec<f64>) -> Self {
        let (timestamps, _) = carry_forward(timestamps.into_iter().map(Some));
        Self { timestamps, source: TimingSource::Derived, degradations: Vec::new() }
    }

    pub fn timestamp(&self, position: usize) -> Option<f64> {
        self.timestamps.get(position).copied()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.timestamps
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn source(&self) -> TimingSource {
        self.source
    }

    /// Non-fatal problems found while building (`TimingIndexDegraded`).
    pub fn degradations(&self) -> &[ServeError] {
        &self.degradations
    }

    pub fn is_degraded(&self) -> bool {
        !self.degradations.is_empty()
    }

    /// Position of the first frame whose timestamp is `>= ts`.
    pub fn first_at_or_after(&self, ts: f64) -> usize {
        self.timestamps.partition_point(|t| *t < ts)
    }

    /// Position of the first frame whose timestamp is `> ts`.
    pub fn first_after(&self, ts: f64) -> usize {
        self.timestamps.partition_point(|t| *t <= ts)
    }
}
