//! Outbound envelopes sent to viewers

use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

use crate::Result;

/// A delivered frame plus advisory playback metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameEnvelope {
    pub logical_index: u64,
    pub frame_index: usize,
    /// True for the first frame after the resolver wrapped around.
    pub loop_restart: bool,
    /// Representative timestamp as delivered (offset applied in live mode).
    pub timestamp: f64,
    pub message: Arc<Value>,
}

/// One outbound message.
#[derive(Debug, Clone, PartialEq)]
pub enum Envelope {
    Metadata(Arc<Value>),
    Frame(FrameEnvelope),
    Cancelled { id: Option<String> },
    TransformDone { id: Option<String> },
    Error { message: String },
}

#[derive(Serialize)]
struct Wire<'a, T: Serialize> {
    #[serde(rename = "type")]
    kind: &'a str,
    data: T,
}

#[derive(Serialize)]
struct FrameData<'a> {
    logical_index: u64,
    frame_index: usize,
    loop_restart: bool,
    timestamp: f64,
    message: &'a Value,
}

#[derive(Serialize)]
struct IdData<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<&'a str>,
}

#[derive(Serialize)]
struct ErrorData<'a> {
    message: &'a str,
}

impl Envelope {
    /// Wire `type` tag.
    pub fn kind(&self) -> &'static str {
        match self {
            Envelope::Metadata(_) => "xviz/metadata",
            Envelope::Frame(_) => "xviz/frame",
            Envelope::Cancelled { .. } => "xviz/cancelled",
            Envelope::TransformDone { .. } => "xviz/transform_log_done",
            Envelope::Error { .. } => "xviz/error",
        }
    }

    /// Serialize to the JSON text sent over the wire.
    pub fn to_text(&self) -> Result<String> {
        let kind = self.kind();
        let text = match self {
            Envelope::Metadata(message) => {
                serde_json::to_string(&Wire { kind, data: message.as_ref() })?
            }
            Envelope::Frame(frame) => serde_json::to_string(&Wire {
                kind,
                data: FrameData {
                    logical_index: frame.logical_index,
                    frame_index: frame.frame_index,
                    loop_restart: frame.loop_restart,
                    timestamp: frame.timestamp,
                    message: frame.message.as_ref(),
                },
            })?,
            Envelope::Cancelled { id } | Envelope::TransformDone { id } => {
                serde_json::to_string(&Wire { kind, data: IdData { id: id.as_deref() } })?
            }
            Envelope::Error { message } => {
                serde_json::to_string(&Wire { kind, data: ErrorData { message } })?
            }
        };
        Ok(text)
    }

    pub fn as_frame(&self) -> Option<&FrameEnvelope> {
        match self {
            Envelope::Frame(frame) => Some(frame),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn frame_envelope_wire_shape() {
        let envelope = Envelope::Frame(FrameEnvelope {
            logical_index: 7,
            frame_index: 1,
            loop_restart: true,
            timestamp: 12.5,
            message: Arc::new(json!({"updates": []})),
        });

        let wire: Value = serde_json::from_str(&envelope.to_text().unwrap()).unwrap();
        assert_eq!(
            wire,
            json!({
                "type": "xviz/frame",
                "data": {
                    "logical_index": 7,
                    "frame_index": 1,
                    "loop_restart": true,
                    "timestamp": 12.5,
                    "message": {"updates": []}
                }
            })
        );
    }

    #[test]
    fn cancelled_without_id_has_empty_data() {
        let text = Envelope::Cancelled { id: None }.to_text().unwrap();
        assert_eq!(text, r#"{"type":"xviz/cancelled","data":{}}"#);
    }

    #[test]
    fn done_carries_transform_id() {
        let text = Envelope::TransformDone { id: Some("abc".into()) }.to_text().unwrap();
        assert_eq!(text, r#"{"type":"xviz/transform_log_done","data":{"id":"abc"}}"#);
    }
}
