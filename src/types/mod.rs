//! Core types flowing between the catalog, sessions and the delivery gateway.
//!
//! - [`FrameRecord`] is one immutable catalog entry (metadata or data frame)
//! - [`PlayRequest`] describes a range of logical indices to play at an interval
//! - [`ControlMessage`] is what a viewer sends, [`Directive`] is what a session acts on
//! - [`Envelope`] is what a viewer receives

mod control;
mod envelope;
mod frame;
mod request;

pub use control::{
    ControlMessage, Directive, PlayParams, RequestDefaults, TransformLogParams,
};
pub use envelope::{Envelope, FrameEnvelope};
pub use frame::{FrameKind, FramePayload, FrameRecord};
pub use request::{PlayRequest, RangeEnd};
