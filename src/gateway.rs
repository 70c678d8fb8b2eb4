//! Delivery gateway: the narrow boundary between a session and its viewer
//!
//! A session hands fully built [`Envelope`]s to a [`DeliveryGateway`]; the
//! gateway serializes them onto whatever transport backs the connection.
//! [`WebSocketGateway`] writes JSON text frames to a WebSocket sink and
//! [`ChannelGateway`] forwards envelopes to an in-process stream, which is
//! what the playback tests observe.

use async_trait::async_trait;
use futures::{Sink, SinkExt};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tracing::trace;

use crate::types::Envelope;
use crate::{Result, ServeError};

/// Outbound side of one viewer connection.
#[async_trait]
pub trait DeliveryGateway: Send {
    /// Deliver one envelope. An error means the viewer is gone.
    async fn send(&mut self, envelope: Envelope) -> Result<()>;

    /// Flush and close the outbound side.
    async fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Writes envelopes as JSON text messages to a WebSocket sink.
pub struct WebSocketGateway<S> {
    sink: S,
}

impl<S> WebSocketGateway<S>
where
    S: Sink<Message, Error = tokio_tungstenite::tungstenite::Error> + Unpin + Send,
{
    pub fn new(sink: S) -> Self {
        Self { sink }
    }

    /// Send a close frame and shut the sink; used to refuse a connection.
    pub async fn refuse(mut self, frame: CloseFrame) -> Result<()> {
        self.sink.send(Message::Close(Some(frame))).await?;
        self.sink.close().await?;
        Ok(())
    }
}

#[async_trait]
impl<S> DeliveryGateway for WebSocketGateway<S>
where
    S: Sink<Message, Error = tokio_tungstenite::tungstenite::Error> + Unpin + Send,
{
    async fn send(&mut self, envelope: Envelope) -> Result<()> {
        let text = envelope.to_text()?;
        trace!(kind = envelope.kind(), bytes = text.len(), "Sending envelope");
        self.sink.send(Message::Text(text.into())).await?;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.sink.close().await?;
        Ok(())
    }
}

/// Forwards envelopes to an in-process stream.
#[derive(Debug, Clone)]
pub struct ChannelGateway {
    tx: mpsc::UnboundedSender<Envelope>,
}

impl ChannelGateway {
    pub fn new() -> (Self, UnboundedReceiverStream<Envelope>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, UnboundedReceiverStream::new(rx))
    }
}

#[async_trait]
impl DeliveryGateway for ChannelGateway {
    async fn send(&mut self, envelope: Envelope) -> Result<()> {
        self.tx.send(envelope).map_err(|_| ServeError::transport("envelope receiver dropped"))
    }
}
