//! Storage Module
//!
//! The store plus its time-to-live machinery.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │                        Store                              │
//! │   value map (no lock,          expiration map             │
//! │   executor-owned)              (Arc<RwLock>)              │
//! └──────────────▲──────────────────────▲─────────────────────┘
//!                │ mutations            │ read-only sampling
//!        ┌───────┴───────┐      ┌───────┴───────┐
//!        │   Executor    │◄─────│    Expirer    │
//!        │ (queue        │ work │ (background   │
//!        │  consumer)    │ items│  tokio task)  │
//!        └───────────────┘      └───────────────┘
//! ```
//!
//! The value map needs no lock because the executor is the only writer and
//! the only reader. The expiration map is also read by the expirer, whose
//! sampling cadence is independent of client traffic, so it sits behind a
//! reader/writer lock. The expirer never mutates either map: everything it
//! wants evicted goes through the work queue as a [`crate::queue::Op::CheckExpired`]
//! item, preserving the single-writer discipline.

pub mod expirer;
pub mod store;

// Re-export commonly used types
pub use expirer::{Expirer, ExpirerConfig};
pub use store::{ExpiryCheck, ExpiryIndex, Store};
