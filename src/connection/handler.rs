//! Connection Handler
//!
//! Each client connection gets its own task that reads bytes, decodes
//! requests, and enqueues validated commands onto the shared work queue.
//! Nothing here executes a command: execution is the executor's job, and
//! the reply comes back through a per-connection writer task.
//!
//! ```text
//! socket ──► read loop ──► decoder ──► typed command ──► work queue
//!    ▲                                                       │
//!    │                                                   executor
//!    └────────── writer task ◄── reply channel ◄─────────────┘
//! ```
//!
//! ## Buffer Management
//!
//! TCP is a stream: one read may contain half a request or several whole
//! ones. Incoming data accumulates in a `BytesMut` buffer; the decoder is
//! called until it reports it needs more bytes.
//!
//! ## Error Boundaries
//!
//! A malformed request costs the client an error reply and its buffered
//! bytes, nothing more; the connection keeps decoding. Only stream-level
//! failures end the connection: a clean EOF, an EOF in the middle of a
//! request (reported as a truncated payload first), or a socket error.

use crate::command::{ClientCommand, CommandError};
use crate::protocol::{decode, Reply, Request};
use crate::queue::{ReplyHandle, WorkItem, WorkSender};
use bytes::BytesMut;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufWriter};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

/// Maximum size for the read buffer (64 KB).
///
/// This is also the effective ceiling on request size: an element whose
/// declared length cannot fit in the buffer never becomes decodable, so
/// the connection ends with [`ConnectionError::BufferFull`] long before
/// the decoder's own [`crate::protocol::decoder::MAX_BULK_SIZE`] applies.
const MAX_BUFFER_SIZE: usize = 64 * 1024;

/// Initial buffer capacity
const INITIAL_BUFFER_SIZE: usize = 4096;

/// Statistics for connection handling
#[derive(Debug, Default)]
pub struct ConnectionStats {
    /// Total number of connections accepted
    pub connections_accepted: AtomicU64,
    /// Currently active connections
    pub active_connections: AtomicU64,
    /// Total commands enqueued onto the work queue
    pub commands_enqueued: AtomicU64,
    /// Total malformed requests rejected
    pub requests_rejected: AtomicU64,
    /// Total bytes read
    pub bytes_read: AtomicU64,
    /// Total bytes written
    pub bytes_written: AtomicU64,
}

impl ConnectionStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connection_opened(&self) {
        self.connections_accepted.fetch_add(1, Ordering::Relaxed);
        self.active_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_closed(&self) {
        self.active_connections.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn command_enqueued(&self) {
        self.commands_enqueued.fetch_add(1, Ordering::Relaxed);
    }

    pub fn request_rejected(&self) {
        self.requests_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn bytes_read(&self, count: usize) {
        self.bytes_read.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn bytes_written(&self, count: usize) {
        self.bytes_written
            .fetch_add(count as u64, Ordering::Relaxed);
    }
}

/// Errors that end a connection.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// I/O error (network issue)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Client closed the connection between requests
    #[error("client disconnected")]
    ClientDisconnected,

    /// Stream ended in the middle of a request
    #[error("truncated request: stream ended mid-payload")]
    TruncatedRequest,

    /// Read buffer limit exceeded without a decodable request
    #[error("buffer size limit exceeded")]
    BufferFull,

    /// The work queue closed (server shutting down)
    #[error("work queue closed")]
    QueueClosed,
}

/// Reads requests from one client and feeds the work queue.
pub struct ConnectionHandler {
    /// Read half of the client socket; the write half lives in the writer task
    reader: OwnedReadHalf,

    /// Client's address (for logging)
    addr: SocketAddr,

    /// Buffer for incoming data
    buffer: BytesMut,

    /// Producer half of the shared work queue
    queue: WorkSender,

    /// Reply handle cloned into every enqueued work item
    reply: ReplyHandle,

    /// Connection statistics (shared)
    stats: Arc<ConnectionStats>,
}

impl ConnectionHandler {
    /// Creates a connection handler and spawns its writer task.
    pub fn new(
        stream: TcpStream,
        addr: SocketAddr,
        queue: WorkSender,
        stats: Arc<ConnectionStats>,
    ) -> Self {
        stats.connection_opened();

        let (reader, writer) = stream.into_split();
        let (reply, reply_rx) = ReplyHandle::channel();
        tokio::spawn(write_loop(writer, reply_rx, addr, Arc::clone(&stats)));

        Self {
            reader,
            addr,
            buffer: BytesMut::with_capacity(INITIAL_BUFFER_SIZE),
            queue,
            reply,
            stats,
        }
    }

    /// Runs the connection until the client disconnects or a stream-level
    /// error occurs.
    pub async fn run(mut self) -> Result<(), ConnectionError> {
        info!(client = %self.addr, "client connected");

        let result = self.main_loop().await;

        match &result {
            Ok(()) | Err(ConnectionError::ClientDisconnected) => {
                info!(client = %self.addr, "client disconnected")
            }
            Err(ConnectionError::Io(io_err))
                if io_err.kind() == std::io::ErrorKind::ConnectionReset =>
            {
                debug!(client = %self.addr, "connection reset by client")
            }
            Err(e) => warn!(client = %self.addr, error = %e, "connection ended"),
        }

        self.stats.connection_closed();
        result
    }

    /// The decode-and-enqueue loop.
    async fn main_loop(&mut self) -> Result<(), ConnectionError> {
        loop {
            while let Some(request) = self.try_decode_request()? {
                self.handle_request(request).await?;
            }

            self.read_more_data().await?;
        }
    }

    /// Attempts to decode one request from the buffer.
    ///
    /// A malformed request gets its error reply here and the buffer is
    /// discarded so decoding resumes cleanly with the client's next bytes.
    fn try_decode_request(&mut self) -> Result<Option<Request>, ConnectionError> {
        if self.buffer.is_empty() {
            return Ok(None);
        }

        match decode(&self.buffer) {
            Ok(Some((request, consumed))) => {
                let _ = self.buffer.split_to(consumed);
                trace!(
                    client = %self.addr,
                    command = %request.command,
                    consumed,
                    "decoded request"
                );
                Ok(Some(request))
            }
            Ok(None) => {
                trace!(
                    client = %self.addr,
                    buffered = self.buffer.len(),
                    "incomplete request, need more data"
                );
                Ok(None)
            }
            Err(e) => {
                warn!(client = %self.addr, error = %e, "malformed request");
                self.stats.request_rejected();
                self.buffer.clear();
                self.send_error(&e.to_string())?;
                Ok(None)
            }
        }
    }

    /// Validates a decoded request and enqueues the resulting command.
    async fn handle_request(&mut self, request: Request) -> Result<(), ConnectionError> {
        match ClientCommand::from_request(request) {
            Ok(command) => {
                let item = WorkItem::client(command, self.reply.clone());
                // Back-pressure: parks here while the queue is full.
                self.queue
                    .send(item)
                    .await
                    .map_err(|_| ConnectionError::QueueClosed)?;
                self.stats.command_enqueued();
                Ok(())
            }
            Err(e @ CommandError::Unknown(_)) => {
                warn!(client = %self.addr, error = %e, "unknown command");
                self.stats.request_rejected();
                self.send_error(&e.to_string())
            }
            Err(e) => {
                debug!(client = %self.addr, error = %e, "rejected command");
                self.stats.request_rejected();
                self.send_error(&e.to_string())
            }
        }
    }

    /// Reads more data from the socket into the buffer.
    async fn read_more_data(&mut self) -> Result<(), ConnectionError> {
        if self.buffer.len() >= MAX_BUFFER_SIZE {
            warn!(
                client = %self.addr,
                size = self.buffer.len(),
                "buffer size limit exceeded"
            );
            return Err(ConnectionError::BufferFull);
        }

        if self.buffer.capacity() - self.buffer.len() < 1024 {
            self.buffer.reserve(4096);
        }

        let n = self.reader.read_buf(&mut self.buffer).await?;

        if n == 0 {
            if self.buffer.is_empty() {
                return Err(ConnectionError::ClientDisconnected);
            }
            // The stream ended mid-request. Best effort: tell the peer
            // what happened before the writer task winds down.
            let _ = self
                .reply
                .send(Reply::error("unable to parse command: truncated payload").serialize());
            return Err(ConnectionError::TruncatedRequest);
        }

        self.stats.bytes_read(n);
        trace!(client = %self.addr, bytes = n, "read data");

        Ok(())
    }

    /// Queues an error reply for the writer task.
    fn send_error(&self, message: &str) -> Result<(), ConnectionError> {
        self.reply
            .send(Reply::error(message).serialize())
            .map_err(|_| ConnectionError::ClientDisconnected)
    }
}

/// The per-connection writer task: forwards reply bytes to the socket.
///
/// Runs until every reply handle for this connection is gone (connection
/// task ended and no command remains in flight) or the socket write fails.
async fn write_loop(
    writer: OwnedWriteHalf,
    mut replies: mpsc::UnboundedReceiver<Vec<u8>>,
    addr: SocketAddr,
    stats: Arc<ConnectionStats>,
) {
    let mut writer = BufWriter::new(writer);

    while let Some(bytes) = replies.recv().await {
        if let Err(e) = writer.write_all(&bytes).await {
            debug!(client = %addr, error = %e, "reply write failed");
            return;
        }
        if let Err(e) = writer.flush().await {
            debug!(client = %addr, error = %e, "reply flush failed");
            return;
        }
        stats.bytes_written(bytes.len());
        trace!(client = %addr, bytes = bytes.len(), "sent reply");
    }
}

/// Handles a client connection to completion.
///
/// Convenience wrapper for the accept loop.
pub async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    queue: WorkSender,
    stats: Arc<ConnectionStats>,
) {
    let handler = ConnectionHandler::new(stream, addr, queue, stats);
    if let Err(e) = handler.run().await {
        match e {
            ConnectionError::ClientDisconnected => {}
            ConnectionError::Io(ref io_err)
                if io_err.kind() == std::io::ErrorKind::ConnectionReset => {}
            _ => {
                debug!(client = %addr, error = %e, "connection ended with error");
            }
        }
    }
}
