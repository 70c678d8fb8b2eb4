//! Replay server over a real WebSocket connection.

mod common;

use futures::{SinkExt, StreamExt};
use serde_json::Value;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::Path;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tokio_util::sync::CancellationToken;
use xviz_replay::{ReplayServer, ServeConfig};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

const DEADLINE: Duration = Duration::from_secs(10);

async fn start(directory: &Path) -> (SocketAddr, CancellationToken, tokio::task::JoinHandle<()>) {
    let config = ServeConfig::new(directory)
        .with_bind_address(Ipv4Addr::LOCALHOST.into())
        .with_port(0)
        .with_send_interval(Duration::from_millis(5));
    let server = ReplayServer::bind(config).await.expect("bind");
    let address = server.local_addr().expect("address");
    let shutdown = server.shutdown_token();
    let task = tokio::spawn(async move { server.run().await.expect("server") });
    (address, shutdown, task)
}

async fn connect(address: SocketAddr) -> Client {
    let (client, _) = connect_async(format!("ws://{}", address)).await.expect("connect");
    client
}

/// Next JSON envelope, skipping control frames.
async fn next_envelope(client: &mut Client) -> Option<Value> {
    while let Some(message) = client.next().await {
        match message.ok()? {
            Message::Text(text) => return serde_json::from_str(text.as_str()).ok(),
            Message::Close(_) => return None,
            _ => continue,
        }
    }
    None
}

async fn read_until(client: &mut Client, kind: &str) -> Vec<Value> {
    let mut seen = Vec::new();
    while let Some(envelope) = next_envelope(client).await {
        let done = envelope["type"] == kind;
        seen.push(envelope);
        if done {
            break;
        }
    }
    seen
}

#[tokio::test]
async fn viewer_receives_metadata_then_every_frame() {
    let dir = common::DataDir::new("ws-play");
    dir.write_data_set(&[1.0, 1.1, 1.2]);
    let (address, shutdown, server) = start(dir.path()).await;

    let mut client = connect(address).await;
    let seen = tokio::time::timeout(DEADLINE, read_until(&mut client, "xviz/transform_log_done"))
        .await
        .expect("playback finishes");

    assert_eq!(seen[0]["type"], "xviz/metadata");
    assert_eq!(seen[0]["data"]["data"]["log_info"]["log_start_time"], 1000.0);

    let frames: Vec<&Value> = seen.iter().filter(|e| e["type"] == "xviz/frame").collect();
    let logical: Vec<u64> =
        frames.iter().map(|f| f["data"]["logical_index"].as_u64().unwrap()).collect();
    assert_eq!(logical, vec![0, 1, 2]);
    assert_eq!(frames[2]["data"]["message"]["data"]["updates"][0]["timestamp"], 1.2);

    shutdown.cancel();
    tokio::time::timeout(DEADLINE, server).await.expect("server stops").unwrap();
}

#[tokio::test]
async fn malformed_control_message_gets_a_diagnostic() {
    let dir = common::DataDir::new("ws-malformed");
    dir.write_data_set(&[1.0, 1.1]);
    let (address, shutdown, _server) = start(dir.path()).await;

    let mut client = connect(address).await;
    client.send(Message::Text("definitely not json".into())).await.unwrap();

    let seen = tokio::time::timeout(DEADLINE, read_until(&mut client, "xviz/error"))
        .await
        .expect("diagnostic arrives");
    let error = seen.last().unwrap();
    assert_eq!(error["type"], "xviz/error");
    assert!(error["data"]["message"].as_str().unwrap().contains("Malformed control message"));

    shutdown.cancel();
}

#[tokio::test]
async fn seek_replays_from_requested_index() {
    let dir = common::DataDir::new("ws-seek");
    dir.write_data_set(&[1.0, 1.1, 1.2, 1.3]);
    let (address, shutdown, _server) = start(dir.path()).await;

    let mut client = connect(address).await;
    tokio::time::timeout(DEADLINE, read_until(&mut client, "xviz/transform_log_done"))
        .await
        .expect("default range finishes");

    client
        .send(Message::Text(r#"{"type":"play","data":{"start":2,"end":4}}"#.into()))
        .await
        .unwrap();
    let seen = tokio::time::timeout(DEADLINE, read_until(&mut client, "xviz/transform_log_done"))
        .await
        .expect("seek finishes");

    let frames: Vec<usize> = seen
        .iter()
        .filter(|e| e["type"] == "xviz/frame")
        .map(|f| f["data"]["frame_index"].as_u64().unwrap() as usize)
        .collect();
    assert_eq!(frames, vec![2, 3]);
    assert!(seen.iter().all(|e| e["type"] != "xviz/metadata"));

    shutdown.cancel();
}

#[tokio::test]
async fn missing_catalog_refuses_the_connection() {
    let dir = common::DataDir::new("ws-empty");
    let (address, shutdown, _server) = start(dir.path()).await;

    let mut client = connect(address).await;
    let close = tokio::time::timeout(DEADLINE, async {
        while let Some(message) = client.next().await {
            if let Ok(Message::Close(frame)) = message {
                return frame;
            }
        }
        None
    })
    .await
    .expect("server closes");

    let frame = close.expect("close frame with reason");
    assert_eq!(frame.code, CloseCode::Error);
    shutdown.cancel();
}
