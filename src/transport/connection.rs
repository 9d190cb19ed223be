//! # Connection plumbing
//!
//! Shared by the client and server managers:
//! - [`Connection`]: the write side of one TCP stream plus its lifecycle flag
//! - [`read_loop`]: the read side, feeding socket chunks through a
//!   [`StreamReassembler`] and forwarding each frame as an event
//!
//! A connection is `Open` until [`Connection::close`] runs or its read loop
//! ends; after that it is `Closed` for good. Reads for one connection happen
//! on one task, strictly in arrival order.

use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::config::TransportConfig;
use crate::core::frame::Frame;
use crate::core::payload::IntoPayload;
use crate::core::reassembler::StreamReassembler;
use crate::error::{constants, ProtocolError, Result};
use crate::utils::metrics::Metrics;

/// Identifier of one accepted connection, unique per server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub(crate) u64);

impl ConnectionId {
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Why a read loop stopped.
#[derive(Debug)]
pub enum Closure {
    /// Peer sent EOF
    PeerClosed,
    /// Closed locally (explicit close, shutdown, or a failed write)
    Local,
    /// Overflow guard tripped
    Overflow(ProtocolError),
    /// Transport fault while reading
    Fault(ProtocolError),
    /// Nobody is listening for events any more
    Abandoned,
}

#[derive(Debug)]
pub struct Connection {
    id: ConnectionId,
    peer: SocketAddr,
    writer: Mutex<OwnedWriteHalf>,
    closed: AtomicBool,
    cancel: CancellationToken,
    transport: TransportConfig,
    metrics: Arc<Metrics>,
}

impl Connection {
    pub(crate) fn new(
        id: ConnectionId,
        peer: SocketAddr,
        writer: OwnedWriteHalf,
        transport: &TransportConfig,
        metrics: Arc<Metrics>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            id,
            peer,
            writer: Mutex::new(writer),
            closed: AtomicBool::new(false),
            cancel,
            transport: transport.clone(),
            metrics,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Flip to `Closed`. Returns `false` if it already was.
    pub(crate) fn mark_closed(&self) -> bool {
        !self.closed.swap(true, Ordering::AcqRel)
    }

    /// Encode `(kind, payload)` with this connection's wire version.
    pub fn encode(&self, kind: u8, payload: impl IntoPayload) -> Result<Bytes> {
        encode_frame(&self.transport, kind, payload)
    }

    /// Encode and write one frame. Returns once the bytes are handed to the socket.
    pub async fn send(&self, kind: u8, payload: impl IntoPayload) -> Result<()> {
        let frame = self.encode(kind, payload)?;
        self.write_frame(&frame).await
    }

    /// Write bytes that already form one or more complete frames.
    ///
    /// A write stalled behind a peer that stopped reading is abandoned as soon
    /// as the connection is cancelled, so the writer lock never outlives it.
    pub(crate) async fn write_frame(&self, frame: &[u8]) -> Result<()> {
        if self.is_closed() {
            return Err(ProtocolError::ConnectionClosed);
        }

        let written = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(ProtocolError::ConnectionClosed),
            written = async {
                let mut writer = self.writer.lock().await;
                // closed while waiting for the lock
                if self.is_closed() {
                    return Err(ProtocolError::ConnectionClosed);
                }
                writer.write_all(frame).await.map_err(ProtocolError::from)
            } => written,
        };

        if let Err(e) = written {
            if !matches!(e, ProtocolError::ConnectionClosed) {
                debug!(connection = %self.id, error = %e, "write failed, closing connection");
                self.mark_closed();
                self.cancel.cancel();
            }
            return Err(e);
        }
        self.metrics.frame_sent(frame.len());
        Ok(())
    }

    /// Close immediately. Buffered partial frames are discarded by the read
    /// loop; nothing is drained.
    ///
    /// Cancellation runs first, which aborts any write in flight and frees
    /// the writer for the shutdown below.
    pub async fn close(&self) {
        self.mark_closed();
        self.cancel.cancel();
        let mut writer = self.writer.lock().await;
        if let Err(e) = writer.shutdown().await {
            trace!(connection = %self.id, error = %e, "shutdown on closed socket");
        }
    }

    pub(crate) fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub(crate) fn reassembler(&self) -> StreamReassembler {
        StreamReassembler::from_config(&self.transport)
    }
}

/// Turn `payload` into bytes (fast or fallback path) and frame it as
/// `transport` prescribes.
pub(crate) fn encode_frame(
    transport: &TransportConfig,
    kind: u8,
    payload: impl IntoPayload,
) -> Result<Bytes> {
    let payload = payload.into_payload(transport.payload_format)?;
    let version = transport.wire_version;
    let mut dst = BytesMut::with_capacity(version.header_size() + payload.len());
    version
        .encode_into(kind, &payload, transport.max_payload_size, &mut dst)
        .inspect_err(|_| {
            debug!(
                len = payload.len(),
                max = transport.max_payload_size,
                "{}",
                constants::ERR_OVERSIZED_PAYLOAD
            )
        })?;
    Ok(dst.freeze())
}

/// Read `reader` until it closes, forwarding every reassembled frame to
/// `events` through `to_event`.
///
/// The reassembler lives only inside this call, so its partial state is
/// dropped with the connection.
pub(crate) async fn read_loop<R, E, M>(
    reader: &mut R,
    conn: &Connection,
    chunk_size: usize,
    events: &mpsc::Sender<E>,
    mut to_event: M,
) -> Closure
where
    R: AsyncRead + Unpin,
    M: FnMut(Frame) -> E,
{
    let mut reassembler = conn.reassembler();
    let mut chunk = vec![0u8; chunk_size.max(1)];

    loop {
        let n = tokio::select! {
            _ = conn.cancel_token().cancelled() => return Closure::Local,
            read = reader.read(&mut chunk) => match read {
                Ok(0) => {
                    debug!(connection = %conn.id(), "{}", constants::ERR_CONNECTION_CLOSED);
                    return Closure::PeerClosed;
                }
                Ok(n) => n,
                Err(e) => return Closure::Fault(e.into()),
            },
        };
        conn.metrics.bytes_read(n);

        let frames = match reassembler.feed(&chunk[..n]) {
            Ok(frames) => frames,
            Err(e) => return Closure::Overflow(e),
        };

        for frame in frames {
            conn.metrics.frame_received();
            if events.send(to_event(frame)).await.is_err() {
                return Closure::Abandoned;
            }
        }
    }
}
