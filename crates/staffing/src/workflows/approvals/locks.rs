use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// One mutex per key, created on demand and dropped once idle.
///
/// Serialises read-decide-write sequences on a single request id (or subject)
/// while unrelated keys proceed in parallel.
#[derive(Debug)]
pub struct KeyedLocks<K> {
    slots: Mutex<HashMap<K, Arc<Mutex<()>>>>,
}

impl<K> Default for KeyedLocks<K> {
    fn default() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
        }
    }
}

fn relock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<K> KeyedLocks<K>
where
    K: Eq + Hash + Clone,
{
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_lock<T>(&self, key: &K, work: impl FnOnce() -> T) -> T {
        let release = SlotRelease {
            locks: self,
            key,
            slot: relock(&self.slots).entry(key.clone()).or_default().clone(),
        };
        let _held = relock(&*release.slot);
        work()
    }

    pub fn active(&self) -> usize {
        relock(&self.slots).len()
    }
}

/// Drops the key's slot once idle, including when the work panicked.
struct SlotRelease<'a, K: Eq + Hash> {
    locks: &'a KeyedLocks<K>,
    key: &'a K,
    slot: Arc<Mutex<()>>,
}

impl<K: Eq + Hash> Drop for SlotRelease<'_, K> {
    fn drop(&mut self) {
        let mut slots = relock(&self.locks.slots);
        // The map and this call hold the only references: nobody else is waiting.
        if Arc::strong_count(&self.slot) == 2 {
            slots.remove(self.key);
        }
    }
}
