//! One viewer connection: handshake, session spawn and the inbound reader

use futures::StreamExt;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tracing::{debug, error, info, warn};

use super::Shared;
use crate::gateway::WebSocketGateway;
use crate::session::{Inbound, SessionDriver, SessionSettings};

/// Serve one accepted TCP stream until the viewer leaves or the server stops.
pub(crate) async fn serve_connection(stream: TcpStream, peer: SocketAddr, shared: Arc<Shared>) {
    let ws = match accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            warn!(%peer, "WebSocket handshake failed: {}", e);
            return;
        }
    };

    let guard = shared.registry.register();
    let connection_id = guard.id();
    info!(connection_id, %peer, "Viewer connected");

    let (sink, mut source) = ws.split();
    let gateway = WebSocketGateway::new(sink);

    let dataset = match shared.dataset().await {
        Ok(dataset) => dataset,
        Err(e) => {
            error!(connection_id, "Refusing connection: {}", e);
            let frame = CloseFrame { code: CloseCode::Error, reason: "data set unavailable".into() };
            if let Err(e) = gateway.refuse(frame).await {
                debug!(connection_id, "Refusal not delivered: {}", e);
            }
            return;
        }
    };

    let settings = SessionSettings::from_config(&shared.config, dataset.frame_count());
    let cancel = guard.cancel_token().clone();
    let (handle, driver) =
        SessionDriver::spawn(connection_id, dataset, settings, gateway, cancel.clone());

    loop {
        let message = tokio::select! {
            _ = cancel.cancelled() => break,
            message = source.next() => message,
        };

        match message {
            Some(Ok(Message::Text(text))) => {
                if !handle.push_text(text.as_str()) {
                    break;
                }
            }
            Some(Ok(Message::Binary(_))) => {
                handle.push(Inbound::Malformed("binary control messages are not supported".into()));
            }
            Some(Ok(Message::Close(_))) | None => break,
            Some(Ok(_)) => {}
            Some(Err(e)) => {
                debug!(connection_id, "Read failed: {}", e);
                break;
            }
        }
    }

    handle.close();
    match driver.await {
        Ok(stats) => info!(connection_id, frames = stats.frames_sent, "Viewer disconnected"),
        Err(e) => warn!(connection_id, "Session task failed: {}", e),
    }
    drop(guard);
}
