//! Mapping from the ever-increasing logical playback counter to a frame slot.
//!
//! Straight playback maps logical indices to themselves. Once the counter runs
//! past the end of the catalog the resolver wraps. The default policy wraps
//! over `frame_count - 1` slots and maps a zero remainder to the last slot, so
//! the first frame of a new cycle never repeats the frame just sent.
//!
//! ```rust
//! use xviz_replay::resolver::resolve_frame_index;
//!
//! let physical: Vec<usize> = (0..8).map(|i| resolve_frame_index(i, 4)).collect();
//! assert_eq!(physical, vec![0, 1, 2, 3, 1, 2, 3, 1]);
//! ```

use serde::{Deserialize, Serialize};

/// How the resolver wraps once the logical counter passes the last frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WrapPolicy {
    /// Wrap over `frame_count - 1` slots; a zero remainder maps to the last slot.
    #[default]
    AvoidRepeat,
    /// Plain `logical % frame_count`.
    Cyclic,
}

impl WrapPolicy {
    /// Resolve `logical_index` to a slot in `[0, frame_count - 1]`.
    ///
    /// An empty catalog has no valid slot; `0` is returned and callers must not
    /// index with it. Catalogs are never served empty.
    pub fn resolve(self, logical_index: u64, frame_count: usize) -> usize {
        if frame_count <= 1 {
            return 0;
        }

        let count = frame_count as u64;
        if logical_index < count {
            return logical_index as usize;
        }

        match self {
            WrapPolicy::AvoidRepeat => {
                let cycle = count - 1;
                match logical_index % cycle {
                    0 => frame_count - 1,
                    slot => slot as usize,
                }
            }
            WrapPolicy::Cyclic => (logical_index % count) as usize,
        }
    }
}

/// Resolve with the default [`WrapPolicy::AvoidRepeat`] policy.
pub fn resolve_frame_index(logical_index: u64, frame_count: usize) -> usize {
    WrapPolicy::AvoidRepeat.resolve(logical_index, frame_count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn straight_playback_is_identity(frame_count in 2usize..10_000, seed in any::<u64>()) {
            let logical = seed % frame_count as u64;
            prop_assert_eq!(resolve_frame_index(logical, frame_count), logical as usize);
        }

        #[test]
        fn wrapped_indices_stay_in_bounds(frame_count in 2usize..10_000, offset in 0u64..1_000_000) {
            let logical = frame_count as u64 + offset;
            let physical = resolve_frame_index(logical, frame_count);

            prop_assert!(physical < frame_count);
            let lands_on_last = logical % (frame_count as u64 - 1) == 0;
            prop_assert_eq!(physical == frame_count - 1, lands_on_last);
        }

        #[test]
        fn single_frame_catalog_never_advances(logical in any::<u64>()) {
            prop_assert_eq!(resolve_frame_index(logical, 1), 0);
            prop_assert_eq!(WrapPolicy::Cyclic.resolve(logical, 1), 0);
        }

        #[test]
        fn wrapped_sequence_never_repeats_a_frame(frame_count in 3usize..500, start in 0u64..10_000) {
            let a = resolve_frame_index(start, frame_count);
            let b = resolve_frame_index(start + 1, frame_count);
            prop_assert_ne!(a, b);
        }

        #[test]
        fn cyclic_policy_is_plain_modulo(frame_count in 2usize..10_000, logical in any::<u64>()) {
            let physical = WrapPolicy::Cyclic.resolve(logical, frame_count);
            prop_assert_eq!(physical as u64, logical % frame_count as u64);
        }
    }

    #[test]
    fn four_frame_live_loop() {
        let physical: Vec<usize> = (0..10).map(|i| resolve_frame_index(i, 4)).collect();
        assert_eq!(physical, vec![0, 1, 2, 3, 1, 2, 3, 1, 2, 3]);
    }

    #[test]
    fn two_frame_catalog_sticks_to_last_frame_when_wrapped() {
        assert_eq!(resolve_frame_index(0, 2), 0);
        assert_eq!(resolve_frame_index(1, 2), 1);
        for logical in 2..20 {
            assert_eq!(resolve_frame_index(logical, 2), 1);
        }
    }

    #[test]
    fn empty_catalog_resolves_to_zero() {
        assert_eq!(resolve_frame_index(42, 0), 0);
    }

    #[test]
    fn policy_deserializes_from_snake_case() {
        let policy: WrapPolicy = serde_json::from_str(r#""cyclic""#).unwrap();
        assert_eq!(policy, WrapPolicy::Cyclic);
    }
}
