//! Active Expirer
//!
//! A background task that periodically samples the expiration map and, for
//! every sampled key past its deadline, enqueues a synthetic check through
//! the work queue. The expirer never removes a key itself: eviction runs on
//! the executor like any other mutation, so there is no race against
//! client-issued writes. A sampled key may well have been rescued by a
//! fresh `set ... ex` by the time its check executes; the check simply
//! reports it live.
//!
//! ## Adaptive Backoff
//!
//! The polling delay self-tunes between `min_delay` and `max_delay`:
//!
//! 1. Sleep for the current delay (starts at `min_delay`).
//! 2. Under a read lock, scan up to `sample_size` records and collect the
//!    keys whose deadline has passed; release the lock, then enqueue one
//!    check per collected key.
//! 3. If the expired fraction exceeds `expired_threshold` *and* the sample
//!    was full - meaning more expired keys probably lie beyond it - halve
//!    the delay, clamped at `min_delay`. Otherwise double it, clamped at
//!    `max_delay`. An empty map leaves the delay unchanged.
//!
//! Sampling keeps each cycle cheap on large maps; requiring a full sample
//! before speeding up keeps a tiny map from dragging the delay to the
//! floor; the clamped exponential range bounds both idle polling and the
//! pile-up of unexpired garbage.

use crate::queue::{WorkItem, WorkSender};
use crate::storage::store::ExpiryIndex;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{debug, info, trace};

/// Tunables for the active expirer.
#[derive(Debug, Clone)]
pub struct ExpirerConfig {
    /// Delay floor; also the starting delay (default: 1s)
    pub min_delay: Duration,

    /// Delay ceiling (default: 512s)
    pub max_delay: Duration,

    /// Maximum number of expiration records scanned per cycle (default: 1000)
    pub sample_size: usize,

    /// Expired fraction above which a fully sampled cycle halves the delay
    /// (default: 0.1)
    pub expired_threshold: f64,
}

impl Default for ExpirerConfig {
    fn default() -> Self {
        Self {
            min_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(512),
            sample_size: 1000,
            expired_threshold: 0.1,
        }
    }
}

/// Handle to the running expirer task.
///
/// Dropping the handle stops the task.
#[derive(Debug)]
pub struct Expirer {
    shutdown_tx: watch::Sender<bool>,
}

impl Expirer {
    /// Starts the expirer as a background task.
    ///
    /// # Arguments
    ///
    /// * `index` - handle to the store's expiration map
    /// * `queue` - producer half of the work queue, for scheduling checks
    /// * `config` - tunables
    pub fn start(index: ExpiryIndex, queue: WorkSender, config: ExpirerConfig) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        tokio::spawn(expirer_loop(index, queue, config, shutdown_rx));

        info!("active expirer started");

        Self { shutdown_tx }
    }

    /// Stops the expirer. Called automatically on drop.
    pub fn stop(&self) {
        let _ = self.shutdown_tx.send(true);
    }
}

impl Drop for Expirer {
    fn drop(&mut self) {
        self.stop();
    }
}

/// The sampling loop. Runs until shutdown or until the work queue closes.
async fn expirer_loop(
    index: ExpiryIndex,
    queue: WorkSender,
    config: ExpirerConfig,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut delay = config.min_delay;

    loop {
        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            result = shutdown_rx.changed() => {
                if result.is_err() || *shutdown_rx.borrow() {
                    debug!("expirer received shutdown signal");
                    return;
                }
                continue;
            }
        }

        let (sampled, expired_keys) = sample_expired(&index, config.sample_size);
        let expired = expired_keys.len();

        // The lock is released; enqueueing may now block on a full queue.
        for key in expired_keys {
            if queue.send(WorkItem::check_expired(key)).await.is_err() {
                debug!("work queue closed, expirer exiting");
                return;
            }
        }

        delay = next_delay(delay, expired, sampled, &config);

        if expired > 0 {
            debug!(
                sampled,
                expired,
                next_delay_secs = delay.as_secs(),
                "scheduled expiry checks"
            );
        } else {
            trace!(sampled, next_delay_secs = delay.as_secs(), "expiry sample clean");
        }
    }
}

/// Scans up to `sample_size` expiration records under a read lock and
/// returns how many were sampled plus the keys found past their deadline.
///
/// Iteration order over the map is arbitrary; the sample is whatever the
/// traversal yields first.
fn sample_expired(index: &ExpiryIndex, sample_size: usize) -> (usize, Vec<String>) {
    let now = Instant::now();
    let guard = index.read().unwrap();

    let mut sampled = 0;
    let mut expired = Vec::new();
    for (key, deadline) in guard.iter() {
        if sampled >= sample_size {
            break;
        }
        sampled += 1;
        if now >= *deadline {
            expired.push(key.clone());
        }
    }

    (sampled, expired)
}

/// One adaptive-backoff step.
///
/// Kept pure so the clamped halving/doubling behavior is unit-testable
/// without running the loop.
fn next_delay(current: Duration, expired: usize, sampled: usize, config: &ExpirerConfig) -> Duration {
    if sampled == 0 {
        // Empty map: nothing to learn from this cycle.
        return current;
    }

    let fraction = expired as f64 / sampled as f64;
    if fraction > config.expired_threshold && sampled == config.sample_size {
        (current / 2).max(config.min_delay)
    } else {
        (current * 2).min(config.max_delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::{self, Op};
    use crate::storage::store::Store;

    fn test_config() -> ExpirerConfig {
        ExpirerConfig {
            min_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(512),
            sample_size: 4,
            expired_threshold: 0.1,
        }
    }

    #[test]
    fn test_backoff_halves_down_to_min() {
        let config = test_config();
        let mut delay = Duration::from_secs(64);

        // Full samples, everything expired: halve every cycle.
        for _ in 0..20 {
            let next = next_delay(delay, 4, 4, &config);
            assert!(next <= delay);
            assert!(next >= config.min_delay);
            delay = next;
        }
        assert_eq!(delay, config.min_delay);
    }

    #[test]
    fn test_backoff_doubles_up_to_max() {
        let config = test_config();
        let mut delay = config.min_delay;

        // Nothing expired: double every cycle, never past the ceiling.
        for _ in 0..20 {
            let next = next_delay(delay, 0, 4, &config);
            assert!(next >= delay);
            assert!(next <= config.max_delay);
            delay = next;
        }
        assert_eq!(delay, config.max_delay);
    }

    #[test]
    fn test_backoff_partial_sample_never_speeds_up() {
        let config = test_config();
        // 3 of 3 expired, but the sample was not full: the map is small, so
        // do not over-react.
        let next = next_delay(Duration::from_secs(8), 3, 3, &config);
        assert_eq!(next, Duration::from_secs(16));
    }

    #[test]
    fn test_backoff_empty_map_leaves_delay_unchanged() {
        let config = test_config();
        let next = next_delay(Duration::from_secs(8), 0, 0, &config);
        assert_eq!(next, Duration::from_secs(8));
    }

    #[test]
    fn test_sample_collects_only_past_deadline_keys() {
        let store = Store::new();
        let index = store.expiry_index();
        let past = Instant::now() - Duration::from_secs(5);
        let future = Instant::now() + Duration::from_secs(500);
        {
            let mut guard = index.write().unwrap();
            guard.insert("dead".into(), past);
            guard.insert("alive".into(), future);
        }

        let (sampled, expired) = sample_expired(&index, 10);
        assert_eq!(sampled, 2);
        assert_eq!(expired, vec!["dead".to_string()]);
    }

    #[test]
    fn test_sample_respects_sample_size() {
        let store = Store::new();
        let index = store.expiry_index();
        let past = Instant::now() - Duration::from_secs(5);
        {
            let mut guard = index.write().unwrap();
            for i in 0..100 {
                guard.insert(format!("key{i}"), past);
            }
        }

        let (sampled, expired) = sample_expired(&index, 10);
        assert_eq!(sampled, 10);
        assert_eq!(expired.len(), 10);
    }

    #[tokio::test]
    async fn test_expirer_enqueues_checks_for_expired_keys() {
        let store = Store::new();
        let index = store.expiry_index();
        index
            .write()
            .unwrap()
            .insert("stale".into(), Instant::now() - Duration::from_secs(5));

        let (tx, mut rx) = queue::bounded(16);
        let config = ExpirerConfig {
            min_delay: Duration::from_millis(10),
            ..ExpirerConfig::default()
        };
        let _expirer = Expirer::start(index, tx, config);

        let item = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("expirer should schedule a check")
            .unwrap();
        assert!(item.reply.is_none());
        assert_eq!(item.op, Op::CheckExpired { key: "stale".into() });
    }

    #[tokio::test]
    async fn test_expirer_stops_on_drop() {
        let store = Store::new();
        let index = store.expiry_index();
        index
            .write()
            .unwrap()
            .insert("stale".into(), Instant::now() - Duration::from_secs(5));

        let (tx, mut rx) = queue::bounded(16);
        let config = ExpirerConfig {
            min_delay: Duration::from_millis(10),
            ..ExpirerConfig::default()
        };
        let expirer = Expirer::start(store.expiry_index(), tx, config);
        drop(expirer);

        // Drain whatever a cycle in flight may have enqueued, then the
        // stream of checks must dry up.
        tokio::time::sleep(Duration::from_millis(50)).await;
        while rx.try_recv().is_ok() {}
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(rx.try_recv().is_err());
    }
}
