//! Keyed async locks.

use std::hash::Hash;
use std::sync::Arc;

use dashmap::DashMap;

use tokio::sync::{Mutex, OwnedMutexGuard};

/// A set of async mutexes, one per key.
///
/// Used to serialize read-modify-write cycles on a single user's record while
/// leaving every other user unblocked.
#[derive(Debug)]
pub struct KeyedLocks<K>
where
    K: Eq + Hash,
{
    locks: DashMap<K, Arc<Mutex<()>>>,
}

impl<K> KeyedLocks<K>
where
    K: Eq + Hash + Clone,
{
    /// Creates an empty lock set.
    pub fn new() -> KeyedLocks<K> {
        KeyedLocks {
            locks: DashMap::new(),
        }
    }

    /// Waits for exclusive access to `key`.
    pub async fn lock(&self, key: K) -> KeyedGuard<'_, K> {
        // the map shard guard must not live across the await
        let mutex = self.locks.entry(key.clone()).or_default().clone();
        let guard = mutex.lock_owned().await;

        KeyedGuard {
            locks: self,
            key,
            guard: Some(guard),
        }
    }

    /// The number of keys with a lock entry.
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    /// Checks if no key has a lock entry.
    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }

    /// Waits for exclusive access to two keys.
    ///
    /// Keys are always acquired in a stable order, so two tasks locking the
    /// same pair never deadlock. Locking a key with itself returns one guard.
    pub async fn lock_pair(&self, a: K, b: K) -> (KeyedGuard<'_, K>, Option<KeyedGuard<'_, K>>)
    where
        K: Ord,
    {
        if a == b {
            return (self.lock(a).await, None);
        }

        let (first, second) = if a < b { (a, b) } else { (b, a) };
        let first = self.lock(first).await;
        let second = self.lock(second).await;

        (first, Some(second))
    }
}

/// Exclusive access to one key of a [`KeyedLocks`].
///
/// Dropping the guard unlocks the key, and forgets its entry if nobody else
/// holds or waits on it.
#[derive(Debug)]
pub struct KeyedGuard<'a, K>
where
    K: Eq + Hash + Clone,
{
    locks: &'a KeyedLocks<K>,
    key: K,
    guard: Option<OwnedMutexGuard<()>>,
}

impl<K> Drop for KeyedGuard<'_, K>
where
    K: Eq + Hash + Clone,
{
    fn drop(&mut self) {
        // the owned guard keeps a reference to the mutex until it is gone
        drop(self.guard.take());

        // waiters clone the mutex under the same shard lock, so a count of
        // one means only the map is left
        self.locks
            .locks
            .remove_if(&self.key, |_, mutex| Arc::strong_count(mutex) == 1);
    }
}

impl<K> Default for KeyedLocks<K>
where
    K: Eq + Hash + Clone,
{
    fn default() -> Self {
        KeyedLocks::new()
    }
}
