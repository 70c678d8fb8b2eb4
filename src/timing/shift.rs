//! Rewriting of decoded frames before delivery

use serde_json::Value;

use super::extract::message_body_mut;

fn shift_number(value: Option<&mut Value>, offset: f64) {
    if let Some(value) = value {
        if let Some(ts) = value.as_f64() {
            if let Some(shifted) = serde_json::Number::from_f64(ts + offset) {
                *value = Value::Number(shifted);
            }
        }
    }
}

fn shift_update(update: &mut Value, offset: f64) {
    shift_number(update.get_mut("timestamp"), offset);

    if let Some(poses) = update.get_mut("poses").and_then(Value::as_object_mut) {
        for pose in poses.values_mut() {
            shift_number(pose.get_mut("timestamp"), offset);
        }
    }

    if let Some(series) = update.get_mut("time_series").and_then(Value::as_array_mut) {
        for entry in series {
            shift_number(entry.get_mut("timestamp"), offset);
        }
    }
}

/// Add `offset` to every timestamp the viewer reads from a frame.
///
/// Covers both message shapes: `start_time`, `vehicle_pose.time` and
/// `state_updates[]` for legacy frames, `updates[]` (including pose and
/// time series timestamps) for current frames.
pub fn shift_timestamps(message: &mut Value, offset: f64) {
    if offset == 0.0 {
        return;
    }

    let body = message_body_mut(message);
    shift_number(body.get_mut("start_time"), offset);
    if let Some(pose) = body.get_mut("vehicle_pose") {
        shift_number(pose.get_mut("time"), offset);
    }

    for key in ["state_updates", "updates"] {
        if let Some(updates) = body.get_mut(key).and_then(Value::as_array_mut) {
            for update in updates {
                shift_update(update, offset);
            }
        }
    }
}

/// Remove image primitives from every update of a frame.
pub fn strip_images(message: &mut Value) {
    let body = message_body_mut(message);
    for key in ["state_updates", "updates"] {
        let Some(updates) = body.get_mut(key).and_then(Value::as_array_mut) else {
            continue;
        };
        for update in updates {
            let Some(streams) = update.get_mut("primitives").and_then(Value::as_object_mut) else {
                continue;
            };
            for stream in streams.values_mut() {
                if let Some(stream) = stream.as_object_mut() {
                    stream.remove("images");
                }
            }
            streams.retain(|_, stream| stream.as_object().is_none_or(|s| !s.is_empty()));
        }
    }
}
