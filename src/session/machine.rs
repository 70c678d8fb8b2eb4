//! Pure playback state machine
//!
//! [`PlaybackMachine::handle`] maps one [`SessionEvent`] to the list of
//! [`Effect`]s the driver must carry out. It never touches a clock, a socket or
//! the catalog payloads, so every transition can be tested synchronously.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace};

use super::SessionSettings;
use crate::resolver::WrapPolicy;
use crate::timing::TimingIndex;
use crate::types::{Directive, PlayRequest, RangeEnd};

/// Resting states of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Constructed, nothing scheduled.
    Idle,
    /// A tick is armed or about to be.
    Streaming,
    /// Range exhausted; waiting for a new request or close.
    Ended,
    /// Terminal.
    Closed,
}

/// Inputs to the machine.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Request(Directive),
    Tick,
    Close,
}

/// One frame to deliver, fully resolved.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FramePlan {
    pub logical_index: u64,
    pub frame_index: usize,
    pub loop_restart: bool,
    /// Timestamp as delivered, offset included.
    pub timestamp: f64,
    /// Amount added to every timestamp in the frame.
    pub timestamp_offset: f64,
}

/// Side effects requested by a transition.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Arm the tick timer, replacing any armed deadline.
    Arm(Duration),
    Disarm,
    SendMetadata,
    Deliver(FramePlan),
    Cancelled { id: Option<String> },
    Done { id: Option<String> },
}

/// Per-connection playback state.
#[derive(Debug)]
pub struct PlaybackMachine {
    timing: Arc<TimingIndex>,
    live: bool,
    wrap_policy: WrapPolicy,
    state: SessionState,

    current: u64,
    range_end: RangeEnd,
    interval: Duration,
    transform_id: Option<String>,
    pending: Option<Directive>,
    armed: bool,
    metadata_sent: bool,

    last_frame_index: Option<usize>,
    last_timestamp: f64,
    timestamp_offset: f64,
}

impl PlaybackMachine {
    pub fn new(timing: Arc<TimingIndex>, settings: &SessionSettings) -> Self {
        Self {
            timing,
            live: settings.live,
            wrap_policy: settings.wrap_policy,
            state: SessionState::Idle,
            current: 0,
            range_end: settings.defaults.end,
            interval: settings.defaults.interval,
            transform_id: None,
            pending: None,
            armed: false,
            metadata_sent: false,
            last_frame_index: None,
            last_timestamp: 0.0,
            timestamp_offset: 0.0,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn current_logical_index(&self) -> u64 {
        self.current
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn frame_count(&self) -> usize {
        self.timing.len()
    }

    /// Apply one event and return the effects to carry out, in order.
    pub fn handle(&mut self, event: SessionEvent) -> Vec<Effect> {
        trace!(state = ?self.state, ?event, "Session event");
        match (self.state, event) {
            (SessionState::Closed, _) => Vec::new(),
            (_, SessionEvent::Close) => self.close(),
            (SessionState::Idle | SessionState::Ended, SessionEvent::Request(directive)) => {
                let mut effects = Vec::new();
                self.adopt(directive, &mut effects);
                effects
            }
            (SessionState::Streaming, SessionEvent::Request(directive)) => self.queue(directive),
            (SessionState::Streaming, SessionEvent::Tick) if self.armed => self.tick(),
            // Stale tick: disarmed, or not streaming.
            (_, SessionEvent::Tick) => Vec::new(),
        }
    }

    fn close(&mut self) -> Vec<Effect> {
        debug!(state = ?self.state, "Session closed");
        self.state = SessionState::Closed;
        self.pending = None;
        self.armed = false;
        vec![Effect::Disarm]
    }

    /// Last write wins; an overwritten request is announced, never dropped silently.
    fn queue(&mut self, directive: Directive) -> Vec<Effect> {
        let mut effects = Vec::new();
        if let Some(superseded) = self.pending.replace(directive) {
            debug!("Pending request overwritten before it was consumed");
            effects.push(Effect::Cancelled { id: superseded.transform_id().map(str::to_owned) });
        }
        effects
    }

    fn adopt(&mut self, directive: Directive, effects: &mut Vec<Effect>) {
        match directive {
            Directive::Stop => {
                self.armed = false;
                self.state = match self.state {
                    SessionState::Idle => SessionState::Idle,
                    _ => SessionState::Ended,
                };
            }
            Directive::Play(request) => {
                if !self.metadata_sent {
                    self.metadata_sent = true;
                    effects.push(Effect::SendMetadata);
                }
                self.start(request);
                self.armed = true;
                effects.push(Effect::Arm(Duration::ZERO));
            }
        }
    }

    fn start(&mut self, request: PlayRequest) {
        debug!(
            start = request.start,
            end = ?request.end,
            interval_ms = request.interval.as_millis() as u64,
            "Adopting play request"
        );
        self.state = SessionState::Streaming;
        self.current = request.start;
        self.range_end = request.end;
        self.interval = request.interval;
        self.transform_id = request.transform_id;
        self.last_frame_index = None;
        self.last_timestamp = 0.0;
        self.timestamp_offset = 0.0;
    }

    fn tick(&mut self) -> Vec<Effect> {
        self.armed = false;
        let mut effects = Vec::new();

        if let Some(directive) = self.pending.take() {
            effects.push(Effect::Cancelled { id: self.transform_id.take() });
            self.state = SessionState::Ended;
            self.adopt(directive, &mut effects);
            return effects;
        }

        if !self.is_finished() {
            effects.push(Effect::Deliver(self.plan_next()));
            self.current += 1;
        }

        if self.is_finished() {
            debug!(logical_index = self.current, "Play range exhausted");
            self.state = SessionState::Ended;
            effects.push(Effect::Done { id: self.transform_id.take() });
        } else {
            self.armed = true;
            effects.push(Effect::Arm(self.interval));
        }
        effects
    }

    fn is_finished(&self) -> bool {
        !self.live && self.range_end.is_reached(self.current)
    }

    fn plan_next(&mut self) -> FramePlan {
        let frame_index = self.wrap_policy.resolve(self.current, self.timing.len());
        let loop_restart = self.last_frame_index.is_some_and(|last| frame_index < last);

        if loop_restart && self.live {
            self.timestamp_offset = self.last_timestamp;
            debug!(offset = self.timestamp_offset, "Loop restart, shifting timestamps");
        }

        let recorded = self.timing.timestamp(frame_index).unwrap_or_default();
        let timestamp = recorded + self.timestamp_offset;
        self.last_frame_index = Some(frame_index);
        self.last_timestamp = timestamp;

        FramePlan {
            logical_index: self.current,
            frame_index,
            loop_restart,
            timestamp,
            timestamp_offset: self.timestamp_offset,
        }
    }
}
