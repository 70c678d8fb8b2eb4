//! Inbound control messages from viewers

use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

use super::request::{PlayRequest, RangeEnd};
use crate::timing::TimingIndex;
use crate::{Result, ServeError};

/// Parameters of a `play` message. Missing fields fall back to the session defaults.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct PlayParams {
    pub start: Option<u64>,
    pub end: Option<u64>,
    /// Send interval in milliseconds.
    pub interval: Option<u64>,
}

/// Parameters of an `xviz/transform_log` message.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct TransformLogParams {
    pub id: Option<String>,
    pub start_timestamp: Option<f64>,
    pub end_timestamp: Option<f64>,
}

/// A parsed control message.
#[derive(Debug, Clone, PartialEq)]
pub enum ControlMessage {
    /// Play a range of logical indices.
    Play(PlayParams),
    /// Play the frames covering a timestamp window.
    TransformLog(TransformLogParams),
    /// Stop the current plan.
    Cancel,
}

#[derive(Deserialize)]
struct RawControl {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: Value,
}

impl ControlMessage {
    /// Parse a JSON text message of the form `{"type": ..., "data": {...}}`.
    pub fn parse(text: &str) -> Result<Self> {
        let raw: RawControl = serde_json::from_str(text)
            .map_err(|e| ServeError::malformed_control(format!("invalid JSON: {}", e)))?;

        match raw.kind.as_str() {
            "play" => Ok(ControlMessage::Play(params(raw.data)?)),
            "xviz/transform_log" | "transform_log" => {
                Ok(ControlMessage::TransformLog(params(raw.data)?))
            }
            "cancel" | "xviz/cancel" => Ok(ControlMessage::Cancel),
            other => Err(ServeError::malformed_control(format!("unknown message type '{}'", other))),
        }
    }

    /// Turn the message into a session directive.
    ///
    /// Timestamp windows are mapped onto logical indices through the timing
    /// index: the range starts at the first frame at or after
    /// `start_timestamp` and ends before the first frame after `end_timestamp`.
    pub fn into_directive(
        self,
        defaults: &RequestDefaults,
        timing: &TimingIndex,
    ) -> Result<Directive> {
        match self {
            ControlMessage::Cancel => Ok(Directive::Stop),
            ControlMessage::Play(params) => {
                let start = params.start.unwrap_or(0);
                let end = params.end.map(RangeEnd::Bounded).unwrap_or(defaults.end);
                let interval =
                    params.interval.map(Duration::from_millis).unwrap_or(defaults.interval);
                PlayRequest::new(start, end, interval).map(Directive::Play)
            }
            ControlMessage::TransformLog(params) => {
                let start = params
                    .start_timestamp
                    .map(|ts| timing.first_at_or_after(ts) as u64)
                    .unwrap_or(0);
                let end = match params.end_timestamp {
                    Some(ts) => RangeEnd::Bounded(timing.first_after(ts) as u64),
                    None => defaults.end,
                };
                let request = PlayRequest::new(start, end, defaults.interval)?;
                Ok(Directive::Play(request.with_transform_id(params.id)))
            }
        }
    }
}

fn params<T>(data: Value) -> Result<T>
where
    T: Default + for<'de> Deserialize<'de>,
{
    if data.is_null() {
        return Ok(T::default());
    }
    serde_json::from_value(data)
        .map_err(|e| ServeError::malformed_control(format!("invalid message data: {}", e)))
}

/// Values used when a control message leaves a field out.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RequestDefaults {
    pub end: RangeEnd,
    pub interval: Duration,
}

impl RequestDefaults {
    /// The range played on connect.
    pub fn default_request(&self) -> PlayRequest {
        PlayRequest { start: 0, end: self.end, interval: self.interval, transform_id: None }
    }
}

/// What a session should do next.
#[derive(Debug, Clone, PartialEq)]
pub enum Directive {
    Play(PlayRequest),
    Stop,
}

impl Directive {
    pub fn transform_id(&self) -> Option<&str> {
        match self {
            Directive::Play(request) => request.transform_id.as_deref(),
            Directive::Stop => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defaults() -> RequestDefaults {
        RequestDefaults { end: RangeEnd::Bounded(10), interval: Duration::from_millis(50) }
    }

    #[test]
    fn play_message_fills_missing_fields() {
        let msg = ControlMessage::parse(r#"{"type":"play","data":{"start":3}}"#).expect("parse");
        let timing = TimingIndex::from_timestamps(vec![0.0; 10]);

        let directive = msg.into_directive(&defaults(), &timing).expect("directive");
        let Directive::Play(request) = directive else { panic!("expected play") };
        assert_eq!(request.start, 3);
        assert_eq!(request.end, RangeEnd::Bounded(10));
        assert_eq!(request.interval, Duration::from_millis(50));
    }

    #[test]
    fn play_without_data_is_default_range() {
        let msg = ControlMessage::parse(r#"{"type":"play"}"#).expect("parse");
        assert_eq!(msg, ControlMessage::Play(PlayParams::default()));
    }

    #[test]
    fn cancel_has_no_data() {
        assert_eq!(ControlMessage::parse(r#"{"type":"cancel"}"#).unwrap(), ControlMessage::Cancel);
    }

    #[test]
    fn transform_log_maps_timestamps_to_indices() {
        let timing = TimingIndex::from_timestamps(vec![100.0, 100.1, 100.2, 100.3, 100.4]);
        let msg = ControlMessage::parse(
            r#"{"type":"xviz/transform_log","data":{"id":"t-1","start_timestamp":100.15,"end_timestamp":100.3}}"#,
        )
        .expect("parse");

        let Directive::Play(request) = msg.into_directive(&defaults(), &timing).unwrap() else {
            panic!("expected play");
        };
        assert_eq!(request.start, 2);
        assert_eq!(request.end, RangeEnd::Bounded(4));
        assert_eq!(request.transform_id.as_deref(), Some("t-1"));
    }

    #[test]
    fn malformed_messages_are_rejected() {
        for text in [
            "not json",
            r#"{"data":{}}"#,
            r#"{"type":"rewind"}"#,
            r#"{"type":"play","data":{"start":"zero"}}"#,
        ] {
            let err = ControlMessage::parse(text).expect_err(text);
            assert!(matches!(err, ServeError::MalformedControlMessage { .. }), "{text}");
        }
    }

    #[test]
    fn inverted_play_range_is_malformed() {
        let timing = TimingIndex::from_timestamps(vec![0.0; 10]);
        let msg = ControlMessage::parse(r#"{"type":"play","data":{"start":8,"end":2}}"#).unwrap();
        assert!(msg.into_directive(&defaults(), &timing).is_err());
    }
}
