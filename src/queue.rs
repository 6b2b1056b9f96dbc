//! Bounded Work Queue
//!
//! All state-mutating operations flow through one bounded FIFO channel with
//! a single consumer (the executor). Producers are the connection tasks
//! (one per client) and the background expirer. This is the mechanism that
//! makes concurrent mutation of shared state safe without per-key locking:
//! only the queue's consumer ever touches the value map.
//!
//! ## Back-Pressure
//!
//! The channel is bounded (default capacity 100). `send().await` suspends a
//! producer once the queue is full and resumes it when the executor frees a
//! slot; no item is ever dropped and there is no overflow reply.
//!
//! ## Ordering
//!
//! Items are delivered in enqueue order. Each connection decodes and
//! enqueues independently, so cross-connection ordering reflects
//! parse-completion order, not network-arrival order. That relaxation is
//! deliberate; ordering within a single connection is strict FIFO.

use crate::command::ClientCommand;
use thiserror::Error;
use tokio::sync::mpsc;

/// Default capacity of the work queue.
pub const DEFAULT_QUEUE_CAPACITY: usize = 100;

/// Producer half of the work queue.
pub type WorkSender = mpsc::Sender<WorkItem>;

/// Consumer half of the work queue (there is exactly one consumer).
pub type WorkReceiver = mpsc::Receiver<WorkItem>;

/// Creates a bounded work queue.
///
/// The receiver keeps yielding already-enqueued items after every sender
/// has been dropped, so closing the queue is never observable as data
/// loss; it only prevents new enqueues.
pub fn bounded(capacity: usize) -> (WorkSender, WorkReceiver) {
    mpsc::channel(capacity)
}

/// One unit of work for the executor.
#[derive(Debug)]
pub struct WorkItem {
    /// Where to write the reply. `None` marks internally generated work,
    /// which must never attempt to write a reply.
    pub reply: Option<ReplyHandle>,
    /// The operation to perform.
    pub op: Op,
}

impl WorkItem {
    /// Wraps a client command with its originating connection's reply handle.
    pub fn client(command: ClientCommand, reply: ReplyHandle) -> Self {
        Self {
            reply: Some(reply),
            op: Op::Client(command),
        }
    }

    /// Builds a synthetic expiry check. Only the expirer creates these.
    pub fn check_expired(key: String) -> Self {
        Self {
            reply: None,
            op: Op::CheckExpired { key },
        }
    }
}

/// The operation carried by a work item.
///
/// Client commands and internal expiry checks are separate variants, so a
/// client-supplied command name can never select the internal path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    /// A command received from a client connection
    Client(ClientCommand),
    /// A synthetic "evict if expired" check scheduled by the expirer
    CheckExpired { key: String },
}

/// Error returned when a reply cannot be delivered because the client's
/// connection has gone away.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("connection closed before reply could be delivered")]
pub struct ReplyDropped;

/// Handle for writing reply bytes back to one connection.
///
/// Replies are forwarded to the connection's writer task over an unbounded
/// channel; the executor never blocks on a slow client socket.
#[derive(Debug, Clone)]
pub struct ReplyHandle {
    tx: mpsc::UnboundedSender<Vec<u8>>,
}

impl ReplyHandle {
    /// Creates a reply handle and the receiver its connection's writer
    /// task consumes.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Vec<u8>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Queues reply bytes for the connection's writer task.
    pub fn send(&self, bytes: Vec<u8>) -> Result<(), ReplyDropped> {
        self.tx.send(bytes).map_err(|_| ReplyDropped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn get_item(key: &str) -> WorkItem {
        let (reply, _rx) = ReplyHandle::channel();
        WorkItem::client(ClientCommand::Get { key: key.into() }, reply)
    }

    #[tokio::test]
    async fn test_single_producer_fifo() {
        let (tx, mut rx) = bounded(16);

        for i in 0..10 {
            tx.send(get_item(&format!("key{i}"))).await.unwrap();
        }

        for i in 0..10 {
            let item = rx.recv().await.unwrap();
            match item.op {
                Op::Client(ClientCommand::Get { key }) => {
                    assert_eq!(key, format!("key{i}"));
                }
                other => panic!("unexpected op: {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn test_full_queue_blocks_producer() {
        let (tx, mut rx) = bounded(1);

        tx.send(get_item("first")).await.unwrap();

        // The queue is full; the next send must park until a slot frees up.
        let blocked = tx.send(get_item("second"));
        tokio::pin!(blocked);
        assert!(
            tokio::time::timeout(Duration::from_millis(50), blocked.as_mut())
                .await
                .is_err(),
            "send into a full queue should not complete"
        );

        // Freeing a slot lets the parked send through; nothing was dropped.
        let first = rx.recv().await.unwrap();
        assert!(matches!(
            first.op,
            Op::Client(ClientCommand::Get { ref key }) if key == "first"
        ));
        blocked.await.unwrap();
        let second = rx.recv().await.unwrap();
        assert!(matches!(
            second.op,
            Op::Client(ClientCommand::Get { ref key }) if key == "second"
        ));
    }

    #[tokio::test]
    async fn test_close_drains_pending_items() {
        let (tx, mut rx) = bounded(8);

        tx.send(get_item("a")).await.unwrap();
        tx.send(WorkItem::check_expired("b".into())).await.unwrap();
        drop(tx);

        // Already-enqueued items survive the close...
        assert!(rx.recv().await.is_some());
        assert!(rx.recv().await.is_some());
        // ...and only then does the consumer observe the end of the queue.
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_internal_work_carries_no_reply_target() {
        let item = WorkItem::check_expired("stale".into());
        assert!(item.reply.is_none());
        assert_eq!(item.op, Op::CheckExpired { key: "stale".into() });
    }

    #[test]
    fn test_reply_handle_reports_closed_connection() {
        let (reply, rx) = ReplyHandle::channel();
        drop(rx);
        assert_eq!(reply.send(b"+OK\r\n".to_vec()), Err(ReplyDropped));
    }
}
