//! Timestamp extraction for legacy and current XVIZ message shapes

use serde_json::{Map, Value};

/// Protocol shape of a frame: the one whose fields yield its timestamp.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FrameShape<'a> {
    /// `start_time`, `vehicle_pose.time`, `state_updates[].timestamp`
    Legacy(&'a Map<String, Value>),
    /// `updates[].timestamp`
    Current(&'a Map<String, Value>),
}

const LEGACY_FIELDS: [&str; 3] = ["start_time", "vehicle_pose", "state_updates"];

/// Return the body of a message, unwrapping a `{type, data}` envelope.
pub(crate) fn message_body(message: &Value) -> &Value {
    match (message.get("type"), message.get("data")) {
        (Some(Value::String(_)), Some(data @ Value::Object(_))) => data,
        _ => message,
    }
}

pub(crate) fn message_body_mut(message: &mut Value) -> &mut Value {
    let wrapped = matches!(
        (message.get("type"), message.get("data")),
        (Some(Value::String(_)), Some(Value::Object(_)))
    );
    if wrapped { &mut message["data"] } else { message }
}

fn present(body: &Map<String, Value>, field: &str) -> bool {
    body.get(field).is_some_and(|value| !value.is_null())
}

impl<'a> FrameShape<'a> {
    /// Classify a message.
    ///
    /// Legacy fields are tried first; the current shape is used when they
    /// yield no usable timestamp. With no usable value in either shape the
    /// first shape with fields present is returned.
    pub fn classify(message: &'a Value) -> Option<Self> {
        let body = message_body(message).as_object()?;

        let legacy = LEGACY_FIELDS
            .iter()
            .any(|field| present(body, field))
            .then_some(FrameShape::Legacy(body));
        let current = present(body, "updates").then_some(FrameShape::Current(body));

        legacy
            .into_iter()
            .chain(current)
            .find(|shape| shape.usable_timestamp().is_some())
            .or(legacy)
            .or(current)
    }

    fn usable_timestamp(self) -> Option<f64> {
        self.timestamp().filter(|ts| ts.is_finite())
    }

    /// Representative timestamp for this shape.
    pub fn timestamp(self) -> Option<f64> {
        match self {
            FrameShape::Legacy(body) => {
                if let Some(start) = body.get("start_time").and_then(Value::as_f64) {
                    return Some(start);
                }
                let pose_time = body.get("vehicle_pose").and_then(|pose| pose.get("time"));
                if let Some(pose_time) = pose_time.and_then(Value::as_f64) {
                    return Some(pose_time);
                }
                body.get("state_updates").and_then(Value::as_array).map(|updates| {
                    updates
                        .iter()
                        .filter_map(|update| update.get("timestamp").and_then(Value::as_f64))
                        .fold(0.0, f64::max)
                })
            }
            FrameShape::Current(body) => body
                .get("updates")
                .and_then(Value::as_array)?
                .iter()
                .filter_map(|update| update.get("timestamp").and_then(Value::as_f64))
                .reduce(f64::max),
        }
    }
}

/// Extract the representative timestamp of a decoded frame.
///
/// `None` means the frame carries no timestamp in either shape. That is a
/// data quality signal for the caller's carry-forward policy, not an error.
pub fn extract_timestamp(message: &Value) -> Option<f64> {
    FrameShape::classify(message)?.usable_timestamp()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn legacy_prefers_start_time() {
        let frame = json!({
            "start_time": 10.0,
            "vehicle_pose": {"time": 11.0},
            "state_updates": [{"timestamp": 12.0}]
        });
        assert_eq!(extract_timestamp(&frame), Some(10.0));
    }

    #[test]
    fn legacy_falls_back_to_pose_time() {
        let frame = json!({"vehicle_pose": {"time": 11.0}, "state_updates": [{"timestamp": 12.0}]});
        assert_eq!(extract_timestamp(&frame), Some(11.0));
    }

    #[test]
    fn legacy_folds_state_updates_with_zero_seed() {
        let frame = json!({"state_updates": [{"timestamp": 4.0}, {"timestamp": 7.5}, {}]});
        assert_eq!(extract_timestamp(&frame), Some(7.5));

        let empty = json!({"state_updates": []});
        assert_eq!(extract_timestamp(&empty), Some(0.0));
    }

    #[test]
    fn current_shape_takes_max_update() {
        let frame = json!({
            "type": "xviz/state_update",
            "data": {"update_type": "snapshot", "updates": [{"timestamp": 3.0}, {"timestamp": 5.0}]}
        });
        assert!(matches!(FrameShape::classify(&frame), Some(FrameShape::Current(_))));
        assert_eq!(extract_timestamp(&frame), Some(5.0));
    }

    #[test]
    fn legacy_shape_wins_when_both_present() {
        let frame = json!({"start_time": 1.0, "updates": [{"timestamp": 99.0}]});
        assert!(matches!(FrameShape::classify(&frame), Some(FrameShape::Legacy(_))));
        assert_eq!(extract_timestamp(&frame), Some(1.0));
    }

    #[test]
    fn legacy_without_value_falls_back_to_current() {
        let frame = json!({"vehicle_pose": {"x": 1.0}, "updates": [{"timestamp": 5.0}]});
        assert!(matches!(FrameShape::classify(&frame), Some(FrameShape::Current(_))));
        assert_eq!(extract_timestamp(&frame), Some(5.0));

        let wrapped = json!({
            "type": "xviz/state_update",
            "data": {"start_time": "soon", "updates": [{"timestamp": 2.0}, {"timestamp": 3.0}]}
        });
        assert_eq!(extract_timestamp(&wrapped), Some(3.0));
    }

    #[test]
    fn legacy_without_value_and_no_updates_yields_none() {
        let frame = json!({"vehicle_pose": {"x": 1.0}});
        assert!(matches!(FrameShape::classify(&frame), Some(FrameShape::Legacy(_))));
        assert_eq!(extract_timestamp(&frame), None);
    }

    #[test]
    fn no_known_fields_yields_none() {
        assert_eq!(extract_timestamp(&json!({"primitives": {}})), None);
        assert_eq!(extract_timestamp(&json!({"updates": [{"poses": {}}]})), None);
        assert_eq!(extract_timestamp(&json!("not an object")), None);
        assert_eq!(extract_timestamp(&json!({"start_time": null})), None);
    }

    proptest! {
        #[test]
        fn current_shape_is_max_of_updates(timestamps in prop::collection::vec(-1e9f64..1e9, 1..20)) {
            let updates: Vec<Value> = timestamps.iter().map(|ts| json!({"timestamp": ts})).collect();
            let frame = json!({"updates": updates});
            let expected = timestamps.iter().cloned().fold(f64::MIN, f64::max);
            prop_assert_eq!(extract_timestamp(&frame), Some(expected));
        }

        #[test]
        fn start_time_always_wins(start in 0f64..1e9, pose in 0f64..1e9) {
            let frame = json!({"start_time": start, "vehicle_pose": {"time": pose}});
            prop_assert_eq!(extract_timestamp(&frame), Some(start));
        }
    }
}
