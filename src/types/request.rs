//! Play range directives

use std::time::Duration;

use crate::{Result, ServeError};

/// Exclusive upper bound on the logical playback counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeEnd {
    /// Stop once the counter reaches this value.
    Bounded(u64),
    /// Never stop (live mode).
    Unbounded,
}

impl RangeEnd {
    /// Check whether `logical_index` is at or past the end of the range.
    pub fn is_reached(self, logical_index: u64) -> bool {
        match self {
            RangeEnd::Bounded(end) => logical_index >= end,
            RangeEnd::Unbounded => false,
        }
    }
}

/// One "play range" directive, issued by a viewer or by default on connect.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayRequest {
    pub start: u64,
    pub end: RangeEnd,
    pub interval: Duration,
    /// Viewer supplied id echoed on cancellation and completion notices.
    pub transform_id: Option<String>,
}

impl PlayRequest {
    /// Create a request, rejecting inverted ranges and zero intervals.
    pub fn new(start: u64, end: RangeEnd, interval: Duration) -> Result<Self> {
        if let RangeEnd::Bounded(end) = end {
            if start > end {
                return Err(ServeError::malformed_control(format!(
                    "range start {} is past range end {}",
                    start, end
                )));
            }
        }

        if interval.is_zero() {
            return Err(ServeError::malformed_control("send interval must be greater than zero"));
        }

        Ok(Self { start, end, interval, transform_id: None })
    }

    pub fn with_transform_id(mut self, id: Option<String>) -> Self {
        self.transform_id = id;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inverted_range_is_rejected() {
        let err = PlayRequest::new(5, RangeEnd::Bounded(2), Duration::from_millis(100))
            .expect_err("start past end");
        assert!(matches!(err, ServeError::MalformedControlMessage { .. }));
    }

    #[test]
    fn unbounded_range_accepts_any_start() {
        let request = PlayRequest::new(1_000, RangeEnd::Unbounded, Duration::from_millis(10))
            .expect("unbounded request");
        assert!(!request.end.is_reached(u64::MAX));
    }

    #[test]
    fn empty_range_is_valid_and_immediately_reached() {
        let request =
            PlayRequest::new(3, RangeEnd::Bounded(3), Duration::from_millis(10)).expect("empty");
        assert!(request.end.is_reached(request.start));
    }

    #[test]
    fn zero_interval_is_rejected() {
        assert!(PlayRequest::new(0, RangeEnd::Bounded(1), Duration::ZERO).is_err());
    }
}
