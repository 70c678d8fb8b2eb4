//! Frame payload decoding
//!
//! Payload encoding is owned by the XVIZ codec; this module is the narrow
//! interface the scheduling core uses to get a structured message out of a
//! frame. The default [`XvizCodec`] understands JSON frames and GLB containers
//! whose JSON chunk carries the XVIZ message.

use serde_json::Value;

use crate::types::FramePayload;
use crate::{Result, ServeError};

const GLB_MAGIC: &[u8; 4] = b"glTF";
const GLB_HEADER_LEN: usize = 12;
const GLB_CHUNK_HEADER_LEN: usize = 8;
const GLB_CHUNK_JSON: u32 = 0x4E4F_534A;

/// Decodes frame payloads into structured XVIZ messages.
pub trait FrameCodec: Send + Sync {
    fn decode(&self, payload: &FramePayload) -> Result<Value>;
}

/// Default codec for `-frame.json` and `-frame.glb` files.
#[derive(Debug, Clone, Copy, Default)]
pub struct XvizCodec;

impl FrameCodec for XvizCodec {
    fn decode(&self, payload: &FramePayload) -> Result<Value> {
        match payload {
            FramePayload::Json(text) => Ok(serde_json::from_str(text)?),
            FramePayload::Binary(bytes) => {
                let chunk = glb_json_chunk(bytes)?;
                let document: Value = serde_json::from_slice(chunk)?;
                Ok(unwrap_glb_document(document))
            }
        }
    }
}

/// Pull the XVIZ message out of the glTF JSON document.
fn unwrap_glb_document(mut document: Value) -> Value {
    if let Some(message) = document.get_mut("xviz").map(Value::take) {
        return message;
    }
    if let Some(message) =
        document.pointer_mut("/extensions/AVS_xviz").map(Value::take)
    {
        return message;
    }
    document
}

fn read_u32(bytes: &[u8], offset: usize) -> Option<u32> {
    let raw = bytes.get(offset..offset + 4)?;
    Some(u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]))
}

/// Locate the JSON chunk of a GLB container.
fn glb_json_chunk(bytes: &[u8]) -> Result<&[u8]> {
    if bytes.len() < GLB_HEADER_LEN || &bytes[..4] != GLB_MAGIC {
        return Err(ServeError::decode("GLB header", "missing glTF magic"));
    }

    let declared = read_u32(bytes, 8).unwrap_or(0) as usize;
    let total = declared.min(bytes.len());

    let mut offset = GLB_HEADER_LEN;
    while offset + GLB_CHUNK_HEADER_LEN <= total {
        let length = read_u32(bytes, offset).unwrap_or(0) as usize;
        let kind = read_u32(bytes, offset + 4).unwrap_or(0);
        let start = offset + GLB_CHUNK_HEADER_LEN;
        let end = start
            .checked_add(length)
            .filter(|end| *end <= total)
            .ok_or_else(|| ServeError::decode("GLB chunk", "chunk runs past end of file"))?;

        if kind == GLB_CHUNK_JSON {
            return Ok(&bytes[start..end]);
        }
        offset = end;
    }

    Err(ServeError::decode("GLB chunk", "no JSON chunk found"))
}

/// Wrap a JSON document into a minimal GLB container.
///
/// Useful for producing binary fixtures; the chunk is space padded to a
/// four byte boundary as the container format requires.
pub fn encode_glb(document: &Value) -> Result<Vec<u8>> {
    let mut json = serde_json::to_vec(document)?;
    while json.len() % 4 != 0 {
        json.push(b' ');
    }

    let total = GLB_HEADER_LEN + GLB_CHUNK_HEADER_LEN + json.len();
    let mut out = Vec::with_capacity(total);
    out.extend_from_slice(GLB_MAGIC);
    out.extend_from_slice(&2u32.to_le_bytes());
    out.extend_from_slice(&(total as u32).to_le_bytes());
    out.extend_from_slice(&(json.len() as u32).to_le_bytes());
    out.extend_from_slice(&GLB_CHUNK_JSON.to_le_bytes());
    out.extend_from_slice(&json);
    Ok(out)
}
