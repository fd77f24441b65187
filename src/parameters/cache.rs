use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::hash::Hash;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::time::Instant;

type Slot<V> = Arc<tokio::sync::Mutex<Option<Entry<V>>>>;

#[derive(Debug)]
struct Entry<V> {
    value: V,
    fetched_at: Instant,
}

impl<V> Entry<V> {
    fn new(value: V) -> Self {
        Entry {
            value,
            fetched_at: Instant::now(),
        }
    }

    fn is_fresh(&self, max_age: Duration) -> bool {
        self.fetched_at.elapsed() < max_age
    }
}

/// Time-bounded values.
///
/// Each key has its own lock, held across the fetch, so concurrent lookups
/// of one key reach the store once. Failed fetches are not cached and leave
/// any previous value in place.
#[derive(Debug)]
pub(crate) struct Cache<K, V> {
    slots: Mutex<HashMap<K, Slot<V>>>,
}

impl<K, V> Default for Cache<K, V> {
    fn default() -> Self {
        Cache {
            slots: Mutex::new(HashMap::new()),
        }
    }
}

impl<K, V> Cache<K, V>
where
    K: Clone + Eq + Hash + Ord + fmt::Debug,
    V: Clone,
{
    fn slot(&self, key: &K) -> Slot<V> {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots.entry(key.clone()).or_default().clone()
    }

    pub async fn get_or_fetch<F, Fut, E>(&self, key: &K, max_age: Duration, force: bool, fetch: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        let slot = self.slot(key);
        let mut entry = slot.lock().await;

        if !force {
            if let Some(entry) = Option::as_ref(&*entry).filter(|entry| entry.is_fresh(max_age)) {
                debug!("cache hit for {:?}", key);
                return Ok(entry.value.clone());
            }
        }

        debug!("fetching {:?}", key);
        let value = fetch().await?;
        *entry = Some(Entry::new(value.clone()));
        Ok(value)
    }

    /// Like [`get_or_fetch`](Self::get_or_fetch) for several keys, with one
    /// `fetch` for all the misses. Keys `fetch` leaves out are left out of
    /// the result.
    pub async fn get_or_fetch_many<F, Fut, E>(
        &self,
        keys: &[K],
        max_age: Duration,
        force: bool,
        fetch: F,
    ) -> Result<HashMap<K, V>, E>
    where
        F: FnOnce(Vec<K>) -> Fut,
        Fut: Future<Output = Result<HashMap<K, V>, E>>,
    {
        let mut keys = keys.to_vec();
        // a fixed lock order keeps overlapping batches from deadlocking
        keys.sort();
        keys.dedup();

        let slots: Vec<Slot<V>> = keys.iter().map(|key| self.slot(key)).collect();
        let mut entries = Vec::with_capacity(slots.len());
        for slot in &slots {
            entries.push(slot.lock().await);
        }

        let mut values = HashMap::with_capacity(keys.len());
        let mut missing = Vec::new();
        for (key, entry) in keys.iter().zip(&entries) {
            match Option::as_ref(&**entry).filter(|entry| !force && entry.is_fresh(max_age)) {
                Some(entry) => {
                    values.insert(key.clone(), entry.value.clone());
                }
                None => missing.push(key.clone()),
            }
        }

        if !missing.is_empty() {
            debug!("fetching {} of {} keys", missing.len(), keys.len());
            let fetched = fetch(missing).await?;
            for (key, entry) in keys.iter().zip(entries.iter_mut()) {
                if let Some(value) = fetched.get(key) {
                    **entry = Some(Entry::new(value.clone()));
                    values.insert(key.clone(), value.clone());
                }
            }
        }
        Ok(values)
    }

    pub fn clear(&self) {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }
}
