//! Connection Module
//!
//! Manages individual client connections. Each accepted socket is handled
//! by its own async task that decodes requests and enqueues commands; a
//! paired writer task carries replies back to the socket. Connections
//! never execute commands themselves - that is the executor's job.
//!
//! ## Example
//!
//! ```ignore
//! use relaykv::connection::{handle_connection, ConnectionStats};
//! use relaykv::queue;
//! use std::sync::Arc;
//!
//! let (tx, rx) = queue::bounded(queue::DEFAULT_QUEUE_CAPACITY);
//! let stats = Arc::new(ConnectionStats::new());
//!
//! // For each accepted connection...
//! let (stream, addr) = listener.accept().await?;
//! tokio::spawn(handle_connection(stream, addr, tx.clone(), Arc::clone(&stats)));
//! ```

pub mod handler;

// Re-export commonly used types
pub use handler::{handle_connection, ConnectionError, ConnectionHandler, ConnectionStats};
