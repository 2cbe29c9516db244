//! Expiring cache with single-flight loading
//!
//! Keys are opaque strings built by the caller (`"BTC:USD"` for rates, the
//! currency code for balances). A read past the TTL is a miss. While a key is
//! being loaded, further callers for that key wait on the same load instead of
//! starting their own; a failed load is handed to every waiter and nothing is
//! stored, so the next call loads afresh.

use cashgate_core::Timestamp;
use cashgate_ports::Clock;
use chrono::Duration;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use log::debug;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::watch;

type LoadOutcome<V, E> = Option<Result<V, E>>;

enum Slot<V, E> {
    Ready { value: V, expires_at: Timestamp },
    Loading(watch::Receiver<LoadOutcome<V, E>>),
}

/// What the caller does after inspecting the slot for its key
enum Claim<V, E> {
    Hit(V),
    Wait(watch::Receiver<LoadOutcome<V, E>>),
    Lead(watch::Sender<LoadOutcome<V, E>>),
}

/// Key -> value cache with a fixed time-to-live
pub struct ExpiringCache<V, E> {
    name: &'static str,
    ttl: Duration,
    clock: Arc<dyn Clock>,
    slots: DashMap<String, Slot<V, E>>,
}

impl<V, E> ExpiringCache<V, E>
where
    V: Clone + Send + Sync,
    E: Clone + Send + Sync,
{
    pub fn new(name: &'static str, ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            name,
            ttl,
            clock,
            slots: DashMap::new(),
        }
    }

    /// Return the live value for `key`, loading it with `loader` on a miss
    ///
    /// `loader` runs at most once per call and only if this caller is the one
    /// that claims the load.
    pub async fn get_or_load<F, Fut>(&self, key: &str, loader: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        let mut loader = Some(loader);
        loop {
            match self.claim(key) {
                Claim::Hit(value) => {
                    debug!("{} cache hit: {}", self.name, key);
                    return Ok(value);
                }
                Claim::Wait(mut rx) => {
                    debug!("{} cache waiting on in-flight load: {}", self.name, key);
                    // Err means the leader was dropped mid-load; claim again.
                    let shared = match rx.wait_for(|outcome| outcome.is_some()).await {
                        Ok(outcome) => outcome.clone(),
                        Err(_) => None,
                    };
                    if let Some(result) = shared {
                        return result;
                    }
                }
                Claim::Lead(tx) => {
                    let Some(load) = loader.take() else {
                        // Unreachable: a caller leads at most once, and returns after.
                        continue;
                    };
                    debug!("{} cache miss, loading: {}", self.name, key);
                    let result = load().await;
                    self.settle(key, &result);
                    let _ = tx.send(Some(result.clone()));
                    return result;
                }
            }
        }
    }

    /// Inspect the slot for `key` under its shard lock and decide the caller's role
    fn claim(&self, key: &str) -> Claim<V, E> {
        let now = self.clock.now();
        match self.slots.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                match occupied.get() {
                    Slot::Ready { value, expires_at } if *expires_at > now => {
                        return Claim::Hit(value.clone());
                    }
                    // A closed channel means the leader went away without settling.
                    Slot::Loading(rx) if rx.has_changed().is_ok() => {
                        return Claim::Wait(rx.clone());
                    }
                    _ => {}
                }
                let (tx, rx) = watch::channel(None);
                occupied.insert(Slot::Loading(rx));
                Claim::Lead(tx)
            }
            Entry::Vacant(vacant) => {
                let (tx, rx) = watch::channel(None);
                vacant.insert(Slot::Loading(rx));
                Claim::Lead(tx)
            }
        }
    }

    /// Store a successful load, or clear the loading marker after a failure
    fn settle(&self, key: &str, result: &Result<V, E>) {
        match result {
            Ok(value) => {
                let expires_at = self.clock.now() + self.ttl;
                self.slots.insert(
                    key.to_string(),
                    Slot::Ready {
                        value: value.clone(),
                        expires_at,
                    },
                );
            }
            Err(_) => {
                self.slots
                    .remove_if(key, |_, slot| matches!(slot, Slot::Loading(_)));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cashgate_clock::ManualClock;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn cache(clock: Arc<ManualClock>) -> ExpiringCache<u32, String> {
        ExpiringCache::new("test", Duration::seconds(30), clock)
    }

    #[tokio::test]
    async fn test_hit_within_ttl() {
        let clock = ManualClock::new(None);
        let cache = cache(clock.clone());
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            let value = cache
                .get_or_load("BTC:USD", || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(7)
                })
                .await;
            assert_eq!(value, Ok(7));
            clock.advance(Duration::seconds(9));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_expired_entry_reloads() {
        let clock = ManualClock::new(None);
        let cache = cache(clock.clone());

        cache.get_or_load("k", || async { Ok(1) }).await.unwrap();
        clock.advance(Duration::seconds(29));
        assert_eq!(cache.get_or_load("k", || async { Ok(2) }).await, Ok(1));

        // Exactly at the TTL the entry is already stale.
        clock.advance(Duration::seconds(1));
        assert_eq!(cache.get_or_load("k", || async { Ok(3) }).await, Ok(3));
    }

    #[tokio::test]
    async fn test_failure_is_not_cached() {
        let clock = ManualClock::new(None);
        let cache = cache(clock);

        let failed = cache
            .get_or_load("k", || async { Err("down".to_string()) })
            .await;
        assert_eq!(failed, Err("down".to_string()));

        let value = cache.get_or_load("k", || async { Ok(5) }).await;
        assert_eq!(value, Ok(5));
        let value = cache.get_or_load("k", || async { Ok(6) }).await;
        assert_eq!(value, Ok(5));
    }

    #[tokio::test]
    async fn test_concurrent_misses_share_one_load() {
        let clock = ManualClock::new(None);
        let cache = Arc::new(cache(clock));
        let calls = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = cache.clone();
                let calls = calls.clone();
                tokio::spawn(async move {
                    cache
                        .get_or_load("ETH:EUR", || async move {
                            calls.fetch_add(1, Ordering::SeqCst);
                            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
                            Ok(42)
                        })
                        .await
                })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.await.unwrap(), Ok(42));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_concurrent_failure_reaches_every_waiter() {
        let clock = ManualClock::new(None);
        let cache = Arc::new(cache(clock));
        let calls = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let cache = cache.clone();
                let calls = calls.clone();
                tokio::spawn(async move {
                    cache
                        .get_or_load("k", || async move {
                            calls.fetch_add(1, Ordering::SeqCst);
                            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
                            Err::<u32, _>("timeout".to_string())
                        })
                        .await
                })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.await.unwrap(), Err("timeout".to_string()));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.get_or_load("k", || async { Ok(3) }).await, Ok(3));
    }

    #[tokio::test]
    async fn test_abandoned_load_is_reclaimed() {
        let clock = ManualClock::new(None);
        let cache = Arc::new(cache(clock));

        let leader = {
            let cache = cache.clone();
            tokio::spawn(async move {
                cache
                    .get_or_load("k", || async {
                        tokio::time::sleep(std::time::Duration::from_secs(3600)).await;
                        Ok(1)
                    })
                    .await
            })
        };
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        leader.abort();
        let _ = leader.await;

        let value = cache.get_or_load("k", || async { Ok(9) }).await;
        assert_eq!(value, Ok(9));
    }
}
