//! Example: Echo server and client over loopback
//!
//! Starts a server on a free port, connects a client, and sends a player
//! move twice: once as a hand-packed 9-byte binary payload and once through
//! the JSON fallback. The server echoes every frame back.
//!
//! Run with: `cargo run --example echo`

#![allow(clippy::uninlined_format_args)]

use oblit_protocol::config::NetworkConfig;
use oblit_protocol::core::payload::{from_payload, Structured};
use oblit_protocol::core::serialization::SerializationFormat;
use oblit_protocol::service::client::{Client, ClientEvent};
use oblit_protocol::service::server::{Server, ServerEvent};
use oblit_protocol::utils::logging::init_logging;
use serde::{Deserialize, Serialize};

const MOVE_BINARY: u8 = 1;
const MOVE_JSON: u8 = 2;

#[derive(Debug, Serialize, Deserialize)]
struct MoveUpdate {
    cmd: u8,
    x: f32,
    y: f32,
}

fn pack(update: &MoveUpdate) -> [u8; 9] {
    let mut raw = [0u8; 9];
    raw[0] = update.cmd;
    raw[1..5].copy_from_slice(&update.x.to_be_bytes());
    raw[5..9].copy_from_slice(&update.y.to_be_bytes());
    raw
}

fn unpack(raw: &[u8]) -> Option<MoveUpdate> {
    if raw.len() != 9 {
        return None;
    }
    Some(MoveUpdate {
        cmd: raw[0],
        x: f32::from_be_bytes([raw[1], raw[2], raw[3], raw[4]]),
        y: f32::from_be_bytes([raw[5], raw[6], raw[7], raw[8]]),
    })
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = NetworkConfig::default_with_overrides(|c| {
        c.logging.app_name = "oblit-echo".to_string();
    });
    init_logging(&config.logging)?;

    let (server, mut server_events) = Server::listen(0, config.clone()).await?;
    let port = server.local_addr().port();

    let echo = server.clone();
    tokio::spawn(async move {
        while let Some(event) = server_events.recv().await {
            match event {
                ServerEvent::Message {
                    connection,
                    kind,
                    payload,
                } => {
                    if let Err(e) = echo.send(connection, kind, payload).await {
                        eprintln!("echo failed: {}", e);
                    }
                }
                ServerEvent::Connected { connection, peer } => {
                    println!("server: {} joined from {}", connection, peer)
                }
                ServerEvent::Disconnected(connection) => println!("server: {} left", connection),
                _ => {}
            }
        }
    });

    let (client, mut events) = Client::connect_with_config("127.0.0.1", port, &config).await?;

    let update = MoveUpdate {
        cmd: 1,
        x: 250.5,
        y: 120.0,
    };
    client.send(MOVE_BINARY, &pack(&update)).await?;
    client.send(MOVE_JSON, Structured(&update)).await?;

    let mut echoed = 0;
    while let Some(event) = events.recv().await {
        match event {
            ClientEvent::Ready => println!("client: connected to port {}", port),
            ClientEvent::Message { kind, payload } => {
                let decoded = match kind {
                    MOVE_BINARY => unpack(&payload),
                    MOVE_JSON => from_payload(&payload, SerializationFormat::Json).ok(),
                    _ => None,
                };
                println!(
                    "client: type {} echoed, {} payload bytes ({} on the wire): {:?}",
                    kind,
                    payload.len(),
                    payload.len() + 3,
                    decoded
                );
                echoed += 1;
                if echoed == 2 {
                    client.close().await;
                }
            }
            ClientEvent::Error(e) => eprintln!("client error: {}", e),
            ClientEvent::Closed => break,
        }
    }

    server.metrics().log_metrics();
    server.shutdown();
    Ok(())
}
