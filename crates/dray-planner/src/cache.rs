//! Short-TTL, bounded plan cache keyed by `(robot_id, capacity)`.
//!
//! Reads share an `RwLock` read guard and never block each other; writers
//! take the lock exclusively for insertion/replacement only. Cached values
//! are immutable once inserted: a re-plan replaces the slot, and reads hand
//! out clones so downstream mutation cannot corrupt the cache.
//!
//! A raw hit is **not** sufficient to serve a plan; the coordinator
//! re-validates every hit against live order state (see
//! [`coordinator`](crate::coordinator)).

use std::collections::{HashMap, VecDeque};
use std::sync::{PoisonError, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};

use dray_core::{DeliveryPlan, Error, Result};

/// Cache key: one slot per robot/capacity combination.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PlanKey {
    /// The requesting robot.
    pub robot_id: String,
    /// The robot's weight budget for this plan.
    pub capacity: u32,
}

/// A cache hit: the memoized plan plus the order ids it reserved.
#[derive(Debug, Clone)]
pub struct CachedPlan {
    /// The memoized plan.
    pub plan: DeliveryPlan,
    /// Ids of the orders the plan reserved (all `delivering` at insertion).
    pub order_ids: Vec<i64>,
}

#[derive(Debug)]
struct Slot {
    plan: DeliveryPlan,
    order_ids: Vec<i64>,
    expires_at: DateTime<Utc>,
    seq: u64,
}

#[derive(Debug, Default)]
struct CacheState {
    slots: HashMap<PlanKey, Slot>,
    // Insertion order for eviction; stale (seq, key) pairs are skipped.
    insertions: VecDeque<(u64, PlanKey)>,
    next_seq: u64,
}

/// Bounded plan cache with TTL-lazy expiry.
#[derive(Debug)]
pub struct PlanCache {
    state: RwLock<CacheState>,
    ttl: chrono::Duration,
    max_entries: usize,
}

/// Converts a lock poison error to an internal error.
fn poison_err<T>(_: PoisonError<T>) -> Error {
    Error::internal("plan cache lock poisoned")
}

impl PlanCache {
    /// Creates a cache with the given entry TTL and size cap.
    #[must_use]
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            state: RwLock::new(CacheState::default()),
            ttl: chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::milliseconds(500)),
            max_entries: max_entries.max(1),
        }
    }

    /// Returns a copy of the entry for `key` iff it has not expired.
    ///
    /// Expired entries read as misses and are reclaimed by a later `put`.
    ///
    /// # Errors
    ///
    /// Returns an internal error if the lock is poisoned.
    pub fn get(&self, key: &PlanKey) -> Result<Option<CachedPlan>> {
        let state = self.state.read().map_err(poison_err)?;
        let now = Utc::now();
        let hit = state.slots.get(key).and_then(|slot| {
            if slot.expires_at > now {
                Some(CachedPlan {
                    plan: slot.plan.clone(),
                    order_ids: slot.order_ids.clone(),
                })
            } else {
                None
            }
        });
        drop(state);
        Ok(hit)
    }

    /// Inserts or replaces the entry for `key` with `expires_at = now + ttl`.
    ///
    /// Oversize caches evict their oldest insertions; expired slots at the
    /// front of the insertion queue are reclaimed on the way.
    ///
    /// # Errors
    ///
    /// Returns an internal error if the lock is poisoned.
    pub fn put(&self, key: PlanKey, plan: DeliveryPlan, order_ids: Vec<i64>) -> Result<()> {
        let mut state = self.state.write().map_err(poison_err)?;
        let now = Utc::now();
        let seq = state.next_seq;
        state.next_seq += 1;

        state.slots.insert(
            key.clone(),
            Slot {
                plan,
                order_ids,
                expires_at: now + self.ttl,
                seq,
            },
        );
        state.insertions.push_back((seq, key));

        let CacheState {
            slots, insertions, ..
        } = &mut *state;

        // Reclaim expired or superseded slots at the queue front.
        loop {
            let Some((front_seq, front_key)) = insertions.front() else {
                break;
            };
            let expired = match slots.get(front_key) {
                Some(slot) if slot.seq == *front_seq && slot.expires_at > now => break,
                Some(slot) if slot.seq == *front_seq => true,
                _ => false,
            };
            if let Some((_, popped_key)) = insertions.pop_front() {
                if expired {
                    slots.remove(&popped_key);
                }
            }
        }

        // Enforce the size cap by evicting the oldest live insertions.
        while slots.len() > self.max_entries {
            let Some((front_seq, front_key)) = insertions.pop_front() else {
                break;
            };
            if slots.get(&front_key).is_some_and(|slot| slot.seq == front_seq) {
                slots.remove(&front_key);
            }
        }
        drop(state);
        Ok(())
    }

    /// Evicts the entry for `key`, if present.
    ///
    /// # Errors
    ///
    /// Returns an internal error if the lock is poisoned.
    pub fn remove(&self, key: &PlanKey) -> Result<()> {
        let mut state = self.state.write().map_err(poison_err)?;
        state.slots.remove(key);
        drop(state);
        Ok(())
    }

    /// Returns the number of stored slots (expired slots included until
    /// reclaimed).
    ///
    /// # Errors
    ///
    /// Returns an internal error if the lock is poisoned.
    pub fn len(&self) -> Result<usize> {
        Ok(self.state.read().map_err(poison_err)?.slots.len())
    }

    /// Returns true when the cache holds no slots.
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
    use dray_core::ShippableOrder;

    fn key(robot_id: &str, capacity: u32) -> PlanKey {
        PlanKey {
            robot_id: robot_id.to_string(),
            capacity,
        }
    }

    fn plan(robot_id: &str, order_ids: &[i64]) -> DeliveryPlan {
        DeliveryPlan {
            robot_id: robot_id.to_string(),
            total_weight: order_ids.len() as u64,
            total_value: order_ids.len() as u64 * 10,
            orders: order_ids
                .iter()
                .map(|&order_id| ShippableOrder {
                    order_id,
                    weight: 1,
                    value: 10,
                })
                .collect(),
        }
    }

    #[test]
    fn get_returns_copies_within_ttl() -> Result<()> {
        let cache = PlanCache::new(Duration::from_secs(60), 16);
        cache.put(key("R1", 50), plan("R1", &[1, 2]), vec![1, 2])?;

        let mut first = cache.get(&key("R1", 50))?.expect("entry should be live");
        first.plan.orders.clear();

        let second = cache.get(&key("R1", 50))?.expect("entry should be live");
        assert_eq!(second.plan.orders.len(), 2);
        assert_eq!(second.order_ids, vec![1, 2]);
        Ok(())
    }

    #[test]
    fn expired_entries_read_as_misses() -> Result<()> {
        let cache = PlanCache::new(Duration::from_millis(1), 16);
        cache.put(key("R1", 50), plan("R1", &[1]), vec![1])?;
        std::thread::sleep(Duration::from_millis(10));
        assert!(cache.get(&key("R1", 50))?.is_none());
        Ok(())
    }

    #[test]
    fn put_replaces_existing_entry() -> Result<()> {
        let cache = PlanCache::new(Duration::from_secs(60), 16);
        cache.put(key("R1", 50), plan("R1", &[1]), vec![1])?;
        cache.put(key("R1", 50), plan("R1", &[2, 3]), vec![2, 3])?;

        let hit = cache.get(&key("R1", 50))?.expect("entry should be live");
        assert_eq!(hit.order_ids, vec![2, 3]);
        assert_eq!(cache.len()?, 1);
        Ok(())
    }

    #[test]
    fn distinct_keys_do_not_collide() -> Result<()> {
        let cache = PlanCache::new(Duration::from_secs(60), 16);
        cache.put(key("R1", 50), plan("R1", &[1]), vec![1])?;
        cache.put(key("R1", 60), plan("R1", &[2]), vec![2])?;

        assert_eq!(
            cache.get(&key("R1", 50))?.expect("live").order_ids,
            vec![1]
        );
        assert_eq!(
            cache.get(&key("R1", 60))?.expect("live").order_ids,
            vec![2]
        );
        Ok(())
    }

    #[test]
    fn size_cap_evicts_oldest_insertion() -> Result<()> {
        let cache = PlanCache::new(Duration::from_secs(60), 2);
        cache.put(key("R1", 1), plan("R1", &[1]), vec![1])?;
        cache.put(key("R2", 1), plan("R2", &[2]), vec![2])?;
        cache.put(key("R3", 1), plan("R3", &[3]), vec![3])?;

        assert_eq!(cache.len()?, 2);
        assert!(cache.get(&key("R1", 1))?.is_none());
        assert!(cache.get(&key("R2", 1))?.is_some());
        assert!(cache.get(&key("R3", 1))?.is_some());
        Ok(())
    }

    #[test]
    fn replacement_does_not_count_against_cap_twice() -> Result<()> {
        let cache = PlanCache::new(Duration::from_secs(60), 2);
        cache.put(key("R1", 1), plan("R1", &[1]), vec![1])?;
        cache.put(key("R1", 1), plan("R1", &[9]), vec![9])?;
        cache.put(key("R2", 1), plan("R2", &[2]), vec![2])?;

        // R1 was replaced, not duplicated; both keys still fit.
        assert_eq!(cache.len()?, 2);
        assert_eq!(
            cache.get(&key("R1", 1))?.expect("live").order_ids,
            vec![9]
        );
        Ok(())
    }

    #[test]
    fn remove_evicts_entry() -> Result<()> {
        let cache = PlanCache::new(Duration::from_secs(60), 16);
        cache.put(key("R1", 50), plan("R1", &[1]), vec![1])?;
        cache.remove(&key("R1", 50))?;
        assert!(cache.get(&key("R1", 50))?.is_none());
        assert!(cache.is_empty()?);
        Ok(())
    }
}
