//! Executor
//!
//! The sole consumer of the work queue. It owns the [`Store`] outright:
//! every mutation of the value map happens inside this one task, which is
//! the design choice that removes the need for fine-grained locking at the
//! cost of a single global serialization point for writes.
//!
//! ```text
//! connections ──┐
//!               ├──► work queue ──► executor ──► store
//! expirer ──────┘                      │
//!                                      └──► reply bytes back to the
//!                                           originating connection
//! ```
//!
//! The loop is resilient by construction: operations are a closed enum, so
//! there is no failing string-keyed lookup, and an undeliverable reply
//! (client already gone) is logged and skipped. Nothing stops the loop
//! except the queue closing, at which point it finishes draining the items
//! already enqueued and returns.

use crate::command::ClientCommand;
use crate::protocol::Reply;
use crate::queue::{Op, WorkItem, WorkReceiver};
use crate::storage::Store;
use std::time::Duration;
use tracing::{debug, info, trace};

/// Runs the executor loop until the work queue closes and drains.
pub async fn run(mut store: Store, mut queue: WorkReceiver) {
    info!("executor started");

    while let Some(item) = queue.recv().await {
        let WorkItem { reply, op } = item;

        let response = dispatch(&mut store, op);

        if let (Some(handle), Some(response)) = (reply, response) {
            if handle.send(response.serialize()).is_err() {
                // The client went away while its command sat in the queue.
                debug!("dropping reply for a closed connection");
            }
        }
    }

    info!(keys = store.len(), "work queue closed, executor drained");
}

/// Dispatches one work item. Internal checks produce no reply.
fn dispatch(store: &mut Store, op: Op) -> Option<Reply> {
    match op {
        Op::Client(command) => Some(execute(store, command)),
        Op::CheckExpired { key } => {
            let outcome = store.check_expired(&key);
            trace!(key, ?outcome, "scheduled expiry check");
            None
        }
    }
}

/// Executes one client command against the store.
fn execute(store: &mut Store, command: ClientCommand) -> Reply {
    match command {
        ClientCommand::Get { key } => match store.get(&key) {
            Some(value) => Reply::bulk_string(value.to_owned()),
            None => Reply::Null,
        },
        ClientCommand::Set {
            key,
            value,
            ttl_seconds,
        } => {
            store.set(key, value, ttl_seconds.map(Duration::from_secs));
            Reply::ok()
        }
        ClientCommand::Ping => Reply::pong(),
        ClientCommand::Echo { message } => Reply::simple_string(message),
        ClientCommand::Command => Reply::Array(vec![]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::{self, ReplyHandle};

    #[test]
    fn test_execute_set_then_get() {
        let mut store = Store::new();

        let reply = execute(
            &mut store,
            ClientCommand::Set {
                key: "k".into(),
                value: "v".into(),
                ttl_seconds: None,
            },
        );
        assert_eq!(reply, Reply::ok());

        let reply = execute(&mut store, ClientCommand::Get { key: "k".into() });
        assert_eq!(reply.serialize(), b"$1\r\nv\r\n");
    }

    #[test]
    fn test_execute_get_missing_is_null() {
        let mut store = Store::new();
        let reply = execute(&mut store, ClientCommand::Get { key: "nope".into() });
        assert_eq!(reply, Reply::Null);
    }

    #[test]
    fn test_execute_set_with_ttl_readable_immediately() {
        let mut store = Store::new();
        execute(
            &mut store,
            ClientCommand::Set {
                key: "k".into(),
                value: "v".into(),
                ttl_seconds: Some(100),
            },
        );
        let reply = execute(&mut store, ClientCommand::Get { key: "k".into() });
        assert_eq!(reply.serialize(), b"$1\r\nv\r\n");
    }

    #[test]
    fn test_execute_stateless_commands() {
        let mut store = Store::new();
        assert_eq!(
            execute(&mut store, ClientCommand::Ping).serialize(),
            b"+PONG\r\n"
        );
        assert_eq!(
            execute(
                &mut store,
                ClientCommand::Echo {
                    message: "hi".into()
                }
            )
            .serialize(),
            b"+hi\r\n"
        );
        assert_eq!(
            execute(&mut store, ClientCommand::Command).serialize(),
            b"*0\r\n"
        );
    }

    #[test]
    fn test_dispatch_internal_check_produces_no_reply() {
        let mut store = Store::new();
        store.set("k".into(), "v".into(), Some(Duration::from_secs(100)));
        assert_eq!(dispatch(&mut store, Op::CheckExpired { key: "k".into() }), None);
    }

    #[tokio::test]
    async fn test_run_processes_and_replies_in_order() {
        let (tx, rx) = queue::bounded(16);
        let (reply, mut replies) = ReplyHandle::channel();

        let executor = tokio::spawn(run(Store::new(), rx));

        tx.send(WorkItem::client(
            ClientCommand::Set {
                key: "k".into(),
                value: "v".into(),
                ttl_seconds: None,
            },
            reply.clone(),
        ))
        .await
        .unwrap();
        tx.send(WorkItem::client(
            ClientCommand::Get { key: "k".into() },
            reply,
        ))
        .await
        .unwrap();
        drop(tx);

        assert_eq!(replies.recv().await.unwrap(), b"+OK\r\n");
        assert_eq!(replies.recv().await.unwrap(), b"$1\r\nv\r\n");
        executor.await.unwrap();
    }

    #[tokio::test]
    async fn test_run_survives_disconnected_reply_target() {
        let (tx, rx) = queue::bounded(16);
        let executor = tokio::spawn(run(Store::new(), rx));

        // First item's connection is already gone.
        let (dead, dead_rx) = ReplyHandle::channel();
        drop(dead_rx);
        tx.send(WorkItem::client(ClientCommand::Ping, dead))
            .await
            .unwrap();

        // The loop must keep processing subsequent items.
        let (reply, mut replies) = ReplyHandle::channel();
        tx.send(WorkItem::client(ClientCommand::Ping, reply))
            .await
            .unwrap();
        drop(tx);

        assert_eq!(replies.recv().await.unwrap(), b"+PONG\r\n");
        executor.await.unwrap();
    }

    #[tokio::test]
    async fn test_run_drains_queue_after_close() {
        let (tx, rx) = queue::bounded(16);
        let (reply, mut replies) = ReplyHandle::channel();

        for _ in 0..5 {
            tx.send(WorkItem::client(ClientCommand::Ping, reply.clone()))
                .await
                .unwrap();
        }
        drop(tx);
        drop(reply);

        // Executor started only after the queue closed: every item already
        // enqueued must still be applied.
        run(Store::new(), rx).await;

        let mut delivered = 0;
        while replies.recv().await.is_some() {
            delivered += 1;
        }
        assert_eq!(delivered, 5);
    }
}
