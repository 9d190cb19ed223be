//! # Client Connection Manager
//!
//! Owns exactly one outbound TCP connection. Inbound bytes go through one
//! stream reassembler and come out as [`ClientEvent::Message`]; `send` encodes
//! and writes straight to the socket with no queue in between.
//!
//! ```rust,no_run
//! use oblit_protocol::service::client::{Client, ClientEvent};
//!
//! # async fn run() -> oblit_protocol::error::Result<()> {
//! let (client, mut events) = Client::connect("127.0.0.1", 9001).await?;
//! client.send(1, &[0u8; 9]).await?;
//!
//! while let Some(event) = events.recv().await {
//!     match event {
//!         ClientEvent::Message { kind, payload } => println!("{kind}: {} bytes", payload.len()),
//!         ClientEvent::Closed => break,
//!         _ => {}
//!     }
//! }
//! # Ok(())
//! # }
//! ```

use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::config::NetworkConfig;
use crate::core::payload::IntoPayload;
use crate::error::{constants, ProtocolError, Result};
use crate::transport::connection::{read_loop, Closure, Connection, ConnectionId};
use crate::utils::metrics::Metrics;
use crate::utils::timeout::with_timeout_error;

/// Notifications from a [`Client`]. `Closed` is always the last one.
#[derive(Debug)]
pub enum ClientEvent {
    /// Connected; sends are possible
    Ready,
    /// One complete frame arrived
    Message { kind: u8, payload: Bytes },
    /// Transport fault; `Closed` follows
    Error(ProtocolError),
    /// Connection is gone
    Closed,
}

#[derive(Debug)]
pub struct Client {
    conn: Arc<Connection>,
    local: SocketAddr,
    metrics: Arc<Metrics>,
}

impl Client {
    /// Connect to `host:port` with the default configuration.
    pub async fn connect(host: &str, port: u16) -> Result<(Self, mpsc::Receiver<ClientEvent>)> {
        Self::connect_with_config(host, port, &NetworkConfig::default()).await
    }

    /// Connect to the address configured in `config.client.address`.
    pub async fn connect_default(
        config: &NetworkConfig,
    ) -> Result<(Self, mpsc::Receiver<ClientEvent>)> {
        let (host, port) = split_host_port(&config.client.address)?;
        Self::connect_with_config(host, port, config).await
    }

    #[instrument(skip(config))]
    pub async fn connect_with_config(
        host: &str,
        port: u16,
        config: &NetworkConfig,
    ) -> Result<(Self, mpsc::Receiver<ClientEvent>)> {
        config.validate_strict()?;

        let stream = with_timeout_error(
            async { TcpStream::connect((host, port)).await.map_err(ProtocolError::from) },
            config.client.connection_timeout,
        )
        .await
        .inspect_err(|e| {
            if matches!(e, ProtocolError::Timeout) {
                warn!(host, port, "{}", constants::ERR_CONNECT_TIMEOUT);
            }
        })?;

        if config.transport.nodelay {
            stream.set_nodelay(true)?;
        }

        let peer = stream.peer_addr()?;
        let local = stream.local_addr()?;
        let (mut reader, writer) = stream.into_split();

        let metrics = Arc::new(Metrics::new());
        metrics.connection_established();

        let conn = Arc::new(Connection::new(
            ConnectionId(0),
            peer,
            writer,
            &config.transport,
            metrics.clone(),
            CancellationToken::new(),
        ));

        let (tx, rx) = mpsc::channel(config.client.event_buffer.max(1));
        // capacity >= 1 and nobody else holds the sender yet
        let _ = tx.try_send(ClientEvent::Ready);
        info!(%peer, %local, "connected");

        let chunk_size = config.transport.read_chunk_size;
        let task_conn = conn.clone();
        let task_metrics = metrics.clone();
        tokio::spawn(async move {
            let closure = read_loop(&mut reader, &task_conn, chunk_size, &tx, |frame| {
                ClientEvent::Message {
                    kind: frame.kind,
                    payload: frame.payload,
                }
            })
            .await;

            task_conn.mark_closed();
            task_conn.cancel_token().cancel();

            match closure {
                Closure::Fault(e) => {
                    warn!(error = %e, "connection error");
                    task_metrics.connection_error();
                    let _ = tx.send(ClientEvent::Error(e)).await;
                }
                Closure::Overflow(e) => {
                    warn!(error = %e, "{}", constants::ERR_BUFFER_OVERFLOW);
                    task_metrics.overflow_trip();
                }
                Closure::PeerClosed | Closure::Local | Closure::Abandoned => {}
            }

            task_metrics.connection_closed();
            debug!(%peer, "client connection closed");
            let _ = tx.send(ClientEvent::Closed).await;

            task_conn.close().await;
        });

        Ok((
            Self {
                conn,
                local,
                metrics,
            },
            rx,
        ))
    }

    /// Encode `(kind, payload)` and write it to the socket.
    pub async fn send(&self, kind: u8, payload: impl IntoPayload) -> Result<()> {
        self.conn.send(kind, payload).await
    }

    /// Close the connection. A `Closed` event follows.
    pub async fn close(&self) {
        self.conn.close().await;
    }

    pub fn is_closed(&self) -> bool {
        self.conn.is_closed()
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.conn.peer_addr()
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        self.conn.mark_closed();
        self.conn.cancel_token().cancel();
    }
}

fn split_host_port(address: &str) -> Result<(&str, u16)> {
    let (host, port) = address
        .rsplit_once(':')
        .ok_or_else(|| ProtocolError::ConfigError(format!("Missing port in address '{address}'")))?;
    let port = port
        .parse::<u16>()
        .map_err(|e| ProtocolError::ConfigError(format!("Invalid port in '{address}': {e}")))?;
    Ok((host.trim_start_matches('[').trim_end_matches(']'), port))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_host_port() {
        assert_eq!(split_host_port("127.0.0.1:9001").ok(), Some(("127.0.0.1", 9001)));
        assert_eq!(split_host_port("[::1]:80").ok(), Some(("::1", 80)));
        assert!(split_host_port("localhost").is_err());
        assert!(split_host_port("localhost:http").is_err());
    }
}
