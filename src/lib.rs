//! # RelayKV - A Single-Writer In-Memory Key-Value Cache Server
//!
//! RelayKV is an in-memory key-value cache server speaking a compact,
//! length-prefixed, text-based wire protocol (the request subset of RESP).
//! Values may carry an optional time-to-live.
//!
//! ## Features
//!
//! - **Single-Writer Discipline**: all mutations are serialized through one
//!   bounded work queue onto one executor task - no per-key locking
//! - **TTL Support**: lazy on-read expiry plus an active background sampler
//!   that adaptively tunes its own polling interval
//! - **Back-Pressure**: a full work queue parks producers instead of
//!   dropping commands
//! - **Async I/O**: built on Tokio, one lightweight task per connection
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                            RelayKV                               │
//! │                                                                  │
//! │  ┌────────────┐   ┌────────────┐   ┌──────────────────────────┐  │
//! │  │ TCP Server │──>│ Connection │──>│     Work Queue           │  │
//! │  │ (Listener) │   │ (Decoder)  │   │  (bounded mpsc, FIFO)    │  │
//! │  └────────────┘   └────────────┘   └────────────┬─────────────┘  │
//! │                         ▲                       │                │
//! │                         │ enqueues              ▼                │
//! │                   ┌─────┴──────┐   ┌──────────────────────────┐  │
//! │                   │  Expirer   │   │        Executor          │  │
//! │                   │ (sampler)  │   │  (sole queue consumer)   │  │
//! │                   └─────┬──────┘   └────────────┬─────────────┘  │
//! │                         │ reads                 │ owns           │
//! │                         ▼                       ▼                │
//! │                   ┌──────────────────────────────────────────┐   │
//! │                   │                 Store                    │   │
//! │                   │  value map (no lock) + expiry (RwLock)   │   │
//! │                   └──────────────────────────────────────────┘   │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Data flow: connection bytes → decoder → work queue → executor → store,
//! with reply bytes flowing back to the originating connection. The
//! expirer runs concurrently and only ever writes into the work queue,
//! never into the store.
//!
//! ## Quick Start
//!
//! ```ignore
//! use relaykv::connection::{handle_connection, ConnectionStats};
//! use relaykv::storage::{Expirer, ExpirerConfig, Store};
//! use relaykv::{executor, queue};
//! use std::sync::Arc;
//! use tokio::net::TcpListener;
//!
//! #[tokio::main]
//! async fn main() {
//!     let store = Store::new();
//!     let (tx, rx) = queue::bounded(queue::DEFAULT_QUEUE_CAPACITY);
//!
//!     // The expirer samples the expiration map and schedules checks.
//!     let _expirer = Expirer::start(store.expiry_index(), tx.clone(), ExpirerConfig::default());
//!
//!     // The executor takes ownership of the store.
//!     tokio::spawn(executor::run(store, rx));
//!
//!     let stats = Arc::new(ConnectionStats::new());
//!     let listener = TcpListener::bind("127.0.0.1:6379").await.unwrap();
//!
//!     loop {
//!         let (stream, addr) = listener.accept().await.unwrap();
//!         tokio::spawn(handle_connection(stream, addr, tx.clone(), Arc::clone(&stats)));
//!     }
//! }
//! ```
//!
//! ## Supported Commands
//!
//! - `GET key`
//! - `SET key value [EX seconds]`
//! - `PING`
//! - `ECHO message`
//! - `COMMAND`
//!
//! Command names and argument values are lowercased on ingestion.
//!
//! ## Module Overview
//!
//! - [`protocol`]: wire framing - reply serialization and request decoding
//! - [`command`]: typed command validation
//! - [`queue`]: the bounded work queue and its item types
//! - [`executor`]: the single consumer that applies work to the store
//! - [`storage`]: the store and the active expirer
//! - [`connection`]: client connection management
//!
//! ## Design Highlights
//!
//! ### Single Writer Instead of Fine-Grained Locks
//!
//! Commands are parsed concurrently across connections but executed one at
//! a time by the executor, which exclusively owns the value map. The only
//! locked structure is the expiration map, read on an independent cadence
//! by the expirer.
//!
//! ### Lazy + Active Expiry
//!
//! Expired keys are removed when next read, and a background sampler
//! schedules eviction checks for keys that are never read again. The
//! expirer enqueues those checks through the same work queue as client
//! commands, so eviction cannot race a concurrent `set`.

pub mod command;
pub mod connection;
pub mod executor;
pub mod protocol;
pub mod queue;
pub mod storage;

// Re-export commonly used types for convenience
pub use command::{ClientCommand, CommandError};
pub use connection::{handle_connection, ConnectionError, ConnectionStats};
pub use protocol::{decode, DecodeError, Reply, Request};
pub use queue::{Op, ReplyHandle, WorkItem, DEFAULT_QUEUE_CAPACITY};
pub use storage::{Expirer, ExpirerConfig, ExpiryCheck, Store};

/// The default port RelayKV listens on (same as Redis)
pub const DEFAULT_PORT: u16 = 6379;

/// The default host RelayKV binds to
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Version of RelayKV
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
