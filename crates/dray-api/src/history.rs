//! Per-user order-history cache.
//!
//! History pages change rarely within a request burst, so results are
//! memoized for a short TTL (default one second) under a digest of the user
//! id and the full query shape. Reads hand out clones so callers cannot
//! mutate cached pages. The cache is an explicit dependency of the server
//! state, never a process-global.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};

use dray_core::{Error, Order, Result};

#[derive(Debug, Clone)]
struct HistoryEntry {
    orders: Vec<Order>,
    total: u64,
    expires_at: DateTime<Utc>,
}

/// Bounded TTL cache for order-history pages, keyed by query digest.
#[derive(Debug)]
pub struct HistoryCache {
    state: RwLock<HashMap<String, HistoryEntry>>,
    ttl: chrono::Duration,
    max_entries: usize,
}

fn poison_err<T>(_: PoisonError<T>) -> Error {
    Error::internal("history cache lock poisoned")
}

impl HistoryCache {
    /// Creates a cache with the given entry TTL and size cap.
    #[must_use]
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            state: RwLock::new(HashMap::new()),
            ttl: chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::seconds(1)),
            max_entries: max_entries.max(1),
        }
    }

    /// Returns a copy of the cached page for `key` iff it has not expired.
    ///
    /// # Errors
    ///
    /// Returns an internal error if the lock is poisoned.
    pub fn get(&self, key: &str) -> Result<Option<(Vec<Order>, u64)>> {
        let state = self.state.read().map_err(poison_err)?;
        let now = Utc::now();
        let hit = state.get(key).and_then(|entry| {
            if entry.expires_at > now {
                Some((entry.orders.clone(), entry.total))
            } else {
                None
            }
        });
        drop(state);
        Ok(hit)
    }

    /// Inserts or replaces the page for `key`.
    ///
    /// Oversize caches first drop expired entries; if the cap is still
    /// exceeded, arbitrary entries go next. With a one-second TTL the
    /// expired sweep is almost always sufficient.
    ///
    /// # Errors
    ///
    /// Returns an internal error if the lock is poisoned.
    pub fn put(&self, key: String, orders: Vec<Order>, total: u64) -> Result<()> {
        let mut state = self.state.write().map_err(poison_err)?;
        let now = Utc::now();

        state.insert(
            key,
            HistoryEntry {
                orders,
                total,
                expires_at: now + self.ttl,
            },
        );

        if state.len() > self.max_entries {
            state.retain(|_, entry| entry.expires_at > now);
        }
        while state.len() > self.max_entries {
            let Some(victim) = state.keys().next().cloned() else {
                break;
            };
            state.remove(&victim);
        }
        drop(state);
        Ok(())
    }

    /// Returns the number of stored entries (expired entries included until
    /// reclaimed).
    ///
    /// # Errors
    ///
    /// Returns an internal error if the lock is poisoned.
    pub fn len(&self) -> Result<usize> {
        Ok(self.state.read().map_err(poison_err)?.len())
    }

    /// Returns true when the cache holds no entries.
    ///
    /// # Errors
    ///
    /// Returns an internal error if the lock is poisoned.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dray_core::ShippedStatus;

    fn order(order_id: i64) -> Order {
        Order {
            order_id,
            user_id: 7,
            product_id: 1,
            shipped_status: ShippedStatus::Shipping,
            created_at: Utc::now(),
            arrived_at: None,
            product_name: Some("anvil".to_string()),
        }
    }

    #[test]
    fn hits_are_defensive_copies() -> Result<()> {
        let cache = HistoryCache::new(Duration::from_secs(60), 16);
        cache.put("k".to_string(), vec![order(1), order(2)], 2)?;

        let (mut first, _) = cache.get("k")?.expect("entry should be live");
        first.clear();

        let (second, total) = cache.get("k")?.expect("entry should be live");
        assert_eq!(second.len(), 2);
        assert_eq!(total, 2);
        Ok(())
    }

    #[test]
    fn expired_entries_read_as_misses() -> Result<()> {
        let cache = HistoryCache::new(Duration::from_millis(1), 16);
        cache.put("k".to_string(), vec![order(1)], 1)?;
        std::thread::sleep(Duration::from_millis(10));
        assert!(cache.get("k")?.is_none());
        Ok(())
    }

    #[test]
    fn cap_is_enforced() -> Result<()> {
        let cache = HistoryCache::new(Duration::from_secs(60), 2);
        cache.put("a".to_string(), vec![order(1)], 1)?;
        cache.put("b".to_string(), vec![order(2)], 1)?;
        cache.put("c".to_string(), vec![order(3)], 1)?;
        assert!(cache.len()? <= 2);
        Ok(())
    }
}
