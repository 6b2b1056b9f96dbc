//! Single-Writer Store with TTL Support
//!
//! The store holds two mappings: key → value and key → expiration deadline.
//!
//! ## Locking Discipline
//!
//! The value map has no lock at all. The store is owned by the executor
//! task, which is the sole consumer of the work queue, so every mutation of
//! the value map is already serialized. The expiration map is the one
//! structure with a second, independent-cadence reader - the background
//! expirer samples it - so it sits behind a reader/writer lock, shared via
//! [`Store::expiry_index`]. Guards on it are held only for the duration of
//! a map operation and never across an await point.
//!
//! ## Expiry Semantics
//!
//! A key written with a TTL gets an absolute deadline in the expiration
//! map. An expired key may transiently still look present until the next
//! read (lazy expiry) or until the expirer schedules a check through the
//! work queue (active expiry); removal is eventual, not immediate. Both
//! paths funnel through [`Store::check_expired`].

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tracing::{trace, warn};

/// The expiration mapping: key → absolute deadline.
///
/// Shared between the store (writer, inside the executor) and the expirer
/// (reader, on its own cadence).
pub type ExpiryIndex = Arc<RwLock<HashMap<String, Instant>>>;

/// Outcome of an expiry check on one key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpiryCheck {
    /// The key had a past-deadline record and has been removed now
    Expired,
    /// The key exists and is not past its deadline (or has no deadline)
    Live,
    /// The key does not exist
    NotFound,
}

/// The in-memory key-value store.
///
/// Owned by the executor; all mutation happens on the executor's single
/// logical thread of control.
#[derive(Debug, Default)]
pub struct Store {
    /// Value map. Unlocked: the executor is the only code that touches it.
    data: HashMap<String, String>,
    /// Expiration map, read concurrently by the expirer.
    expiry: ExpiryIndex,
}

impl Store {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a handle to the expiration map for the background expirer.
    pub fn expiry_index(&self) -> ExpiryIndex {
        Arc::clone(&self.expiry)
    }

    /// Looks up a key, applying lazy expiry.
    ///
    /// A key whose deadline has passed is removed (entry and expiration
    /// record) and reported as absent.
    pub fn get(&mut self, key: &str) -> Option<&str> {
        if self.check_expired(key) == ExpiryCheck::Expired {
            return None;
        }
        self.data.get(key).map(String::as_str)
    }

    /// Unconditionally upserts a key (last write wins).
    ///
    /// With a TTL the deadline is recorded as `now + ttl`. Without one, any
    /// prior expiration record for the key is cleared: a plain `set` makes
    /// the key permanent rather than leaving it to die on a stale deadline.
    pub fn set(&mut self, key: String, value: String, ttl: Option<Duration>) {
        match ttl.and_then(|ttl| Instant::now().checked_add(ttl)) {
            Some(deadline) => {
                self.expiry.write().unwrap().insert(key.clone(), deadline);
            }
            None => {
                // Either no TTL, or a TTL so large the deadline is not
                // representable. Such a key can never be observed expiring,
                // so it is stored without an expiration record. Command
                // validation rejects out-of-range TTLs before they get
                // here; this keeps the executor panic-free regardless.
                if let Some(ttl) = ttl {
                    warn!(key = %key, ttl_secs = ttl.as_secs(), "ttl beyond representable deadline, stored without expiry");
                }
                self.expiry.write().unwrap().remove(&key);
            }
        }
        self.data.insert(key, value);
    }

    /// Checks one key against its deadline, removing it if expired.
    ///
    /// This is the operation the expirer schedules through the work queue;
    /// it is also the lazy-expiry path taken by [`Store::get`]. Idempotent:
    /// once a key has been removed, further checks report [`ExpiryCheck::NotFound`].
    pub fn check_expired(&mut self, key: &str) -> ExpiryCheck {
        let deadline = self.expiry.read().unwrap().get(key).copied();

        match deadline {
            Some(deadline) if Instant::now() >= deadline => {
                // Value map needs no lock: this runs on the executor.
                self.data.remove(key);
                self.expiry.write().unwrap().remove(key);
                trace!(key, "evicted expired key");
                ExpiryCheck::Expired
            }
            _ if self.data.contains_key(key) => ExpiryCheck::Live,
            _ => ExpiryCheck::NotFound,
        }
    }

    /// Number of entries currently in the value map, counting entries whose
    /// deadline has passed but which have not been evicted yet.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns true if the value map is empty.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
