//! Session driver: runs one playback machine against a real clock and gateway

use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use super::machine::{Effect, FramePlan, PlaybackMachine, SessionEvent};
use super::timer::TickTimer;
use super::SessionSettings;
use crate::dataset::Dataset;
use crate::gateway::DeliveryGateway;
use crate::timing::{shift_timestamps, strip_images};
use crate::types::{ControlMessage, Directive, Envelope, FrameEnvelope};
use crate::{Result, ServeError};

/// A message read from the viewer, already parsed.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    Control(ControlMessage),
    Malformed(String),
}

impl Inbound {
    pub fn parse(text: &str) -> Self {
        match ControlMessage::parse(text) {
            Ok(message) => Inbound::Control(message),
            Err(ServeError::MalformedControlMessage { details }) => Inbound::Malformed(details),
            Err(e) => Inbound::Malformed(e.to_string()),
        }
    }
}

/// Counters reported when a session ends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub frames_sent: u64,
    pub cancellations: u64,
    pub malformed: u64,
    /// Sends dropped because the connection closed first.
    pub discarded: u64,
}

/// Handle to a running session.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    connection_id: u64,
    inbound: mpsc::UnboundedSender<Inbound>,
    cancel: CancellationToken,
}

impl SessionHandle {
    pub fn connection_id(&self) -> u64 {
        self.connection_id
    }

    /// Forward a control message. Returns `false` once the session is gone.
    pub fn push(&self, message: Inbound) -> bool {
        self.inbound.send(message).is_ok()
    }

    pub fn push_text(&self, text: &str) -> bool {
        self.push(Inbound::parse(text))
    }

    /// Close the session. No envelope is delivered after this returns.
    pub fn close(&self) {
        self.cancel.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// Drives one [`PlaybackMachine`] for one connection.
pub struct SessionDriver<G> {
    connection_id: u64,
    machine: PlaybackMachine,
    settings: SessionSettings,
    dataset: Arc<Dataset>,
    gateway: G,
    timer: TickTimer,
    inbound: mpsc::UnboundedReceiver<Inbound>,
    cancel: CancellationToken,
    stats: SessionStats,
}

impl<G> SessionDriver<G>
where
    G: DeliveryGateway + 'static,
{
    /// Create a driver and the handle used to feed and close it.
    ///
    /// Cancelling `cancel` closes the session, so a child of a server-wide
    /// token stops the session on shutdown.
    pub fn new(
        connection_id: u64,
        dataset: Arc<Dataset>,
        settings: SessionSettings,
        gateway: G,
        cancel: CancellationToken,
    ) -> (Self, SessionHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let machine = PlaybackMachine::new(Arc::clone(dataset.timing()), &settings);
        let handle = SessionHandle { connection_id, inbound: tx, cancel: cancel.clone() };
        let driver = Self {
            connection_id,
            machine,
            settings,
            dataset,
            gateway,
            timer: TickTimer::new(),
            inbound: rx,
            cancel,
            stats: SessionStats::default(),
        };
        (driver, handle)
    }

    /// Spawn the driver on the runtime.
    pub fn spawn(
        connection_id: u64,
        dataset: Arc<Dataset>,
        settings: SessionSettings,
        gateway: G,
        cancel: CancellationToken,
    ) -> (SessionHandle, JoinHandle<SessionStats>) {
        let (driver, handle) = Self::new(connection_id, dataset, settings, gateway, cancel);
        (handle, tokio::spawn(driver.run()))
    }

    /// Play the default range, then serve ticks and control messages until close.
    pub async fn run(mut self) -> SessionStats {
        info!(connection_id = self.connection_id, "Session started");

        let mut event =
            SessionEvent::Request(Directive::Play(self.settings.defaults.default_request()));
        loop {
            let closing = event == SessionEvent::Close;
            let effects = self.machine.handle(event);

            if let Err(e) = self.apply(effects).await {
                debug!(connection_id = self.connection_id, "Viewer unreachable: {}", e);
                self.machine.handle(SessionEvent::Close);
                self.timer.cancel();
                break;
            }
            if closing {
                break;
            }
            event = self.next_event().await;
        }

        if let Err(e) = self.gateway.close().await {
            trace!(connection_id = self.connection_id, "Gateway close failed: {}", e);
        }

        info!(
            connection_id = self.connection_id,
            frames = self.stats.frames_sent,
            cancellations = self.stats.cancellations,
            malformed = self.stats.malformed,
            "Session ended"
        );
        self.stats
    }

    async fn next_event(&mut self) -> SessionEvent {
        loop {
            let inbound = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return SessionEvent::Close,
                inbound = self.inbound.recv() => inbound,
                _ = self.timer.fired() => return SessionEvent::Tick,
            };

            let message = match inbound {
                Some(Inbound::Control(message)) => message,
                Some(Inbound::Malformed(details)) => {
                    self.reject(ServeError::malformed_control(details)).await;
                    continue;
                }
                None => return SessionEvent::Close,
            };

            match message.into_directive(&self.settings.defaults, self.dataset.timing()) {
                Ok(directive) => return SessionEvent::Request(directive),
                Err(e) => self.reject(e).await,
            }
        }
    }

    /// Drop a bad control message; the current plan keeps running.
    async fn reject(&mut self, error: ServeError) {
        debug!(connection_id = self.connection_id, "{}", error);
        self.stats.malformed += 1;
        let diagnostic = Envelope::Error { message: error.to_string() };
        if let Err(e) = self.deliver(diagnostic).await {
            debug!(connection_id = self.connection_id, "Could not send diagnostic: {}", e);
        }
    }

    async fn apply(&mut self, effects: Vec<Effect>) -> Result<()> {
        for effect in effects {
            match effect {
                Effect::Arm(delay) => self.timer.arm(delay),
                Effect::Disarm => self.timer.cancel(),
                Effect::SendMetadata => {
                    let metadata = Arc::clone(self.dataset.metadata().for_mode(self.settings.live));
                    self.deliver(Envelope::Metadata(metadata)).await?;
                }
                Effect::Deliver(plan) => match self.render(&plan) {
                    Ok(frame) => {
                        if self.deliver(Envelope::Frame(frame)).await? {
                            self.stats.frames_sent += 1;
                        }
                    }
                    Err(e) => {
                        warn!(frame_index = plan.frame_index, "Skipping undecodable frame: {}", e);
                    }
                },
                Effect::Cancelled { id } => {
                    self.stats.cancellations += 1;
                    self.deliver(Envelope::Cancelled { id }).await?;
                }
                Effect::Done { id } => {
                    self.deliver(Envelope::TransformDone { id }).await?;
                }
            }
        }
        Ok(())
    }

    fn render(&self, plan: &FramePlan) -> Result<FrameEnvelope> {
        let message = self.dataset.decoded_frame(plan.frame_index)?.ok_or_else(|| {
            ServeError::decode("frame", format!("no frame at index {}", plan.frame_index))
        })?;

        let shift = plan.timestamp_offset != 0.0;
        let message = if shift || self.settings.skip_images {
            let mut owned = (*message).clone();
            if shift {
                shift_timestamps(&mut owned, plan.timestamp_offset);
            }
            if self.settings.skip_images {
                strip_images(&mut owned);
            }
            Arc::new(owned)
        } else {
            message
        };

        Ok(FrameEnvelope {
            logical_index: plan.logical_index,
            frame_index: plan.frame_index,
            loop_restart: plan.loop_restart,
            timestamp: plan.timestamp,
            message,
        })
    }

    /// Hand one envelope to the gateway unless the session closed first.
    ///
    /// Returns whether the envelope went out.
    async fn deliver(&mut self, envelope: Envelope) -> Result<bool> {
        let outcome = if self.cancel.is_cancelled() {
            Err(ServeError::SessionClosed { connection_id: self.connection_id })
        } else {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    Err(ServeError::SessionClosed { connection_id: self.connection_id })
                }
                result = self.gateway.send(envelope) => result,
            }
        };

        match outcome {
            Ok(()) => Ok(true),
            Err(ServeError::SessionClosed { connection_id }) => {
                trace!(connection_id, "Discarding send after close");
                self.stats.discarded += 1;
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }
}
