//! # Server Connection Manager
//!
//! Owns the listening socket and the Connection Set. Every accepted
//! connection gets its own read task and stream reassembler; frames come out
//! as [`ServerEvent::Message`] tagged with the [`ConnectionId`].
//!
//! ## Connection Set
//! Members are added on accept and removed when their read task ends
//! (peer close, overflow, transport fault, local close). A member is marked
//! closed *before* it is removed, so a broadcast never writes to a connection
//! that is on its way out.
//!
//! ## Broadcast
//! The frame is encoded once. Membership is snapshotted under a short read
//! lock, the lock is released, and the same bytes are written to every
//! snapshot member still open. A member that closes between the snapshot and
//! its write is skipped without error.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use bytes::Bytes;
use futures::future::join_all;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::config::NetworkConfig;
use crate::core::payload::IntoPayload;
use crate::error::{constants, ProtocolError, Result};
use crate::transport::connection::{encode_frame, read_loop, Closure, Connection, ConnectionId};
use crate::utils::metrics::Metrics;

/// Notifications from a [`Server`].
#[derive(Debug)]
pub enum ServerEvent {
    /// Listening on this port
    Ready(u16),
    /// A connection joined the Connection Set
    Connected {
        connection: ConnectionId,
        peer: SocketAddr,
    },
    /// One complete frame arrived on `connection`
    Message {
        connection: ConnectionId,
        kind: u8,
        payload: Bytes,
    },
    /// Transport fault on one connection; `Disconnected` follows
    ConnectionError {
        connection: ConnectionId,
        error: ProtocolError,
    },
    /// A connection left the Connection Set
    Disconnected(ConnectionId),
    /// Listener-level failure (accept errors)
    Error(ProtocolError),
}

struct Shared {
    config: NetworkConfig,
    connections: RwLock<HashMap<ConnectionId, Arc<Connection>>>,
    next_id: AtomicU64,
    metrics: Arc<Metrics>,
    shutdown: CancellationToken,
    local_addr: SocketAddr,
}

impl Shared {
    fn members(&self) -> RwLockReadGuard<'_, HashMap<ConnectionId, Arc<Connection>>> {
        self.connections.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn members_mut(&self) -> RwLockWriteGuard<'_, HashMap<ConnectionId, Arc<Connection>>> {
        self.connections.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn get(&self, id: ConnectionId) -> Result<Arc<Connection>> {
        self.members()
            .get(&id)
            .cloned()
            .ok_or(ProtocolError::UnknownConnection(id.as_u64()))
    }
}

/// Handle to a running server. Cheap to clone; every clone drives the same
/// listener and Connection Set.
#[derive(Clone)]
pub struct Server {
    shared: Arc<Shared>,
}

impl Server {
    /// Listen on `0.0.0.0:port`. Port 0 picks a free port, reported in `Ready`.
    pub async fn listen(
        port: u16,
        config: NetworkConfig,
    ) -> Result<(Self, mpsc::Receiver<ServerEvent>)> {
        Self::bind(SocketAddr::from(([0, 0, 0, 0], port)), config).await
    }

    /// Listen on `config.server.address`.
    pub async fn from_config(config: NetworkConfig) -> Result<(Self, mpsc::Receiver<ServerEvent>)> {
        let addr = config.server.address.parse::<SocketAddr>().map_err(|e| {
            ProtocolError::ConfigError(format!(
                "Invalid server address '{}': {e}",
                config.server.address
            ))
        })?;
        Self::bind(addr, config).await
    }

    #[instrument(skip(config))]
    pub async fn bind(
        addr: SocketAddr,
        config: NetworkConfig,
    ) -> Result<(Self, mpsc::Receiver<ServerEvent>)> {
        config.validate_strict()?;

        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        let (tx, rx) = mpsc::channel(config.server.event_buffer.max(1));

        let server = Self {
            shared: Arc::new(Shared {
                config,
                connections: RwLock::new(HashMap::new()),
                next_id: AtomicU64::new(1),
                metrics: Arc::new(Metrics::new()),
                shutdown: CancellationToken::new(),
                local_addr,
            }),
        };

        let _ = tx.try_send(ServerEvent::Ready(local_addr.port()));
        info!(address = %local_addr, "Listening");

        tokio::spawn(accept_loop(server.shared.clone(), listener, tx));
        Ok((server, rx))
    }

    /// Encode and write one frame to `connection`.
    pub async fn send(
        &self,
        connection: ConnectionId,
        kind: u8,
        payload: impl IntoPayload,
    ) -> Result<()> {
        self.shared.get(connection)?.send(kind, payload).await
    }

    /// Write the same frame to every open member of the Connection Set.
    /// Returns how many members the bytes were handed to.
    pub async fn broadcast(&self, kind: u8, payload: impl IntoPayload) -> Result<usize> {
        let frame = encode_frame(&self.shared.config.transport, kind, payload)?;
        self.shared.metrics.broadcast();

        let targets: Vec<Arc<Connection>> = self
            .shared
            .members()
            .values()
            .filter(|conn| !conn.is_closed())
            .cloned()
            .collect();

        let results = join_all(targets.iter().map(|conn| conn.write_frame(&frame))).await;

        let mut delivered = 0;
        for (conn, result) in targets.iter().zip(results) {
            match result {
                Ok(()) => delivered += 1,
                Err(e) => debug!(connection = %conn.id(), error = %e, "broadcast skipped member"),
            }
        }
        Ok(delivered)
    }

    /// Close one connection. Its `Disconnected` event follows.
    pub async fn disconnect(&self, connection: ConnectionId) -> Result<()> {
        self.shared.get(connection)?.close().await;
        Ok(())
    }

    /// Stop accepting and close every connection.
    pub fn shutdown(&self) {
        info!(address = %self.shared.local_addr, "Shutting down server");
        self.shared.shutdown.cancel();
    }

    pub fn connection_count(&self) -> usize {
        self.shared.members().len()
    }

    pub fn connections(&self) -> Vec<ConnectionId> {
        let mut ids: Vec<ConnectionId> = self.shared.members().keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn peer_addr(&self, connection: ConnectionId) -> Result<SocketAddr> {
        Ok(self.shared.get(connection)?.peer_addr())
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.shared.local_addr
    }

    pub fn metrics(&self) -> &Metrics {
        &self.shared.metrics
    }
}

async fn accept_loop(
    shared: Arc<Shared>,
    listener: TcpListener,
    events: mpsc::Sender<ServerEvent>,
) {
    loop {
        tokio::select! {
            _ = shared.shutdown.cancelled() => {
                info!("Accept loop stopped");
                break;
            }
            _ = events.closed() => {
                debug!("Event receiver dropped, stopping server");
                shared.shutdown.cancel();
                break;
            }
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => admit(&shared, stream, peer, &events),
                Err(e) => {
                    error!(error = %e, "Error accepting connection");
                    if events.try_send(ServerEvent::Error(e.into())).is_err() {
                        debug!("Event channel full, accept error not delivered");
                    }
                }
            }
        }
    }
}

/// Register `stream` and spawn its task. Never waits on the event channel,
/// so a slow consumer cannot stall accepting or shutdown.
fn admit(
    shared: &Arc<Shared>,
    stream: TcpStream,
    peer: SocketAddr,
    events: &mpsc::Sender<ServerEvent>,
) {
    let max = shared.config.server.max_connections;
    if shared.members().len() >= max {
        warn!(%peer, max_connections = max, "Connection limit reached, dropping connection");
        return;
    }

    if shared.config.transport.nodelay {
        if let Err(e) = stream.set_nodelay(true) {
            debug!(%peer, error = %e, "set_nodelay failed");
        }
    }

    let (reader, writer) = stream.into_split();
    let id = ConnectionId(shared.next_id.fetch_add(1, Ordering::Relaxed));
    let conn = Arc::new(Connection::new(
        id,
        peer,
        writer,
        &shared.config.transport,
        shared.metrics.clone(),
        shared.shutdown.child_token(),
    ));

    shared.members_mut().insert(id, conn.clone());
    shared.metrics.connection_established();
    info!(connection = %id, %peer, "New connection established");

    tokio::spawn(serve_connection(shared.clone(), conn, reader, events.clone()));
}

#[instrument(skip_all, fields(connection = %conn.id(), peer = %conn.peer_addr()))]
async fn serve_connection(
    shared: Arc<Shared>,
    conn: Arc<Connection>,
    mut reader: tokio::net::tcp::OwnedReadHalf,
    events: mpsc::Sender<ServerEvent>,
) {
    let id = conn.id();
    // first event of this connection, ahead of any Message
    let _ = events
        .send(ServerEvent::Connected {
            connection: id,
            peer: conn.peer_addr(),
        })
        .await;

    let closure = read_loop(
        &mut reader,
        &conn,
        shared.config.transport.read_chunk_size,
        &events,
        |frame| ServerEvent::Message {
            connection: id,
            kind: frame.kind,
            payload: frame.payload,
        },
    )
    .await;

    conn.mark_closed();
    conn.cancel_token().cancel();

    match closure {
        Closure::Fault(error) => {
            warn!(error = %error, "Connection error");
            shared.metrics.connection_error();
            let _ = events
                .send(ServerEvent::ConnectionError {
                    connection: id,
                    error,
                })
                .await;
        }
        Closure::Overflow(e) => {
            warn!(error = %e, "{}", constants::ERR_BUFFER_OVERFLOW);
            shared.metrics.overflow_trip();
        }
        Closure::PeerClosed | Closure::Local | Closure::Abandoned => {}
    }

    shared.members_mut().remove(&id);
    shared.metrics.connection_closed();
    info!("Connection closed");
    let _ = events.send(ServerEvent::Disconnected(id)).await;

    conn.close().await;
}
