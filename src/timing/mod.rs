//! Frame timing: timestamp extraction, the per-catalog timing index, and the
//! timestamp rewriting used for live replay.

mod extract;
mod index;
mod shift;

pub use extract::{FrameShape, extract_timestamp};
pub use index::{TimingIndex, TimingSource};
pub use shift::{shift_timestamps, strip_images};
