//! Per-connection playback sessions
//!
//! A session is split in two:
//!
//! - [`PlaybackMachine`] is a pure `(state, event) -> effects` transition
//!   function holding the playback counter, the pending replacement and the
//!   live timestamp offset
//! - [`SessionDriver`] owns the machine together with its [`TickTimer`], the
//!   inbound control channel and a [`DeliveryGateway`](crate::gateway::DeliveryGateway),
//!   and carries out the effects
//!
//! Ticks and control messages for one session are handled by a single task,
//! so they are totally ordered: a replacement is never observed mid-send.

mod driver;
mod machine;
mod timer;

pub use driver::{Inbound, SessionDriver, SessionHandle, SessionStats};
pub use machine::{Effect, FramePlan, PlaybackMachine, SessionEvent, SessionState};
pub use timer::TickTimer;

use crate::config::ServeConfig;
use crate::resolver::WrapPolicy;
use crate::types::RequestDefaults;

/// Playback behaviour shared by every session of one server.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionSettings {
    pub live: bool,
    pub skip_images: bool,
    pub wrap_policy: WrapPolicy,
    pub defaults: RequestDefaults,
}

impl SessionSettings {
    pub fn from_config(config: &ServeConfig, frame_count: usize) -> Self {
        Self {
            live: config.live,
            skip_images: config.skip_images,
            wrap_policy: config.wrap_policy,
            defaults: config.request_defaults(frame_count),
        }
    }
}
