use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;

use crate::store::{KvStore, StoreError};

#[derive(Debug)]
enum Entry {
    Value(String),
    List(Vec<String>),
}

#[derive(Debug)]
struct Slot {
    entry: Entry,
    expires_at: Option<Instant>,
}

impl Slot {
    fn expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|deadline| deadline <= now)
    }
}

/// In-process [`KvStore`] backed by a mutexed map. Expiry is lazy: a key
/// past its deadline is purged on the next touch rather than by a sweeper.
///
/// The production deployment points the same trait at a shared external
/// store; this implementation serves single-process deployments and every
/// test in the workspace.
#[derive(Debug, Default)]
pub struct MemoryStore {
    slots: Mutex<HashMap<String, Slot>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_live_slot<T>(&self, key: &str, read: impl FnOnce(&Slot) -> T) -> Option<T> {
        let mut slots = self.slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let now = Instant::now();
        if slots.get(key).is_some_and(|slot| slot.expired(now)) {
            slots.remove(key);
        }
        slots.get(key).map(read)
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let value = self.with_live_slot(key, |slot| match &slot.entry {
            Entry::Value(value) => Some(value.clone()),
            Entry::List(_) => None,
        });
        Ok(value.flatten())
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        let mut slots = self.slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        slots.insert(
            key.to_string(),
            Slot { entry: Entry::Value(value.to_string()), expires_at: Some(Instant::now() + ttl) },
        );
        Ok(())
    }

    async fn list_prepend(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut slots = self.slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let now = Instant::now();
        if slots.get(key).is_some_and(|slot| slot.expired(now)) {
            slots.remove(key);
        }

        match slots.get_mut(key) {
            Some(Slot { entry: Entry::List(items), .. }) => items.insert(0, value.to_string()),
            _ => {
                slots.insert(
                    key.to_string(),
                    Slot { entry: Entry::List(vec![value.to_string()]), expires_at: None },
                );
            }
        }
        Ok(())
    }

    async fn list_range(
        &self,
        key: &str,
        start: usize,
        stop: usize,
    ) -> Result<Vec<String>, StoreError> {
        let items = self.with_live_slot(key, |slot| match &slot.entry {
            Entry::List(items) => {
                let start = start.min(items.len());
                let end = stop.saturating_add(1).min(items.len());
                items[start..end.max(start)].to_vec()
            }
            Entry::Value(_) => Vec::new(),
        });
        Ok(items.unwrap_or_default())
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<(), StoreError> {
        let mut slots = self.slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let now = Instant::now();
        if slots.get(key).is_some_and(|slot| slot.expired(now)) {
            slots.remove(key);
            return Ok(());
        }
        if let Some(slot) = slots.get_mut(key) {
            slot.expires_at = Some(now + ttl);
        }
        Ok(())
    }
}

/// Store double that fails every operation. Exercises the fail-open and
/// log-and-continue paths in components that treat the store as optional.
#[derive(Debug, Default)]
pub struct UnavailableStore;

impl UnavailableStore {
    fn refuse<T>(&self) -> Result<T, StoreError> {
        Err(StoreError::Unavailable("store offline".to_string()))
    }
}

#[async_trait]
impl KvStore for UnavailableStore {
    async fn get(&self, _key: &str) -> Result<Option<String>, StoreError> {
        self.refuse()
    }

    async fn set(&self, _key: &str, _value: &str, _ttl: Duration) -> Result<(), StoreError> {
        self.refuse()
    }

    async fn list_prepend(&self, _key: &str, _value: &str) -> Result<(), StoreError> {
        self.refuse()
    }

    async fn list_range(
        &self,
        _key: &str,
        _start: usize,
        _stop: usize,
    ) -> Result<Vec<String>, StoreError> {
        self.refuse()
    }

    async fn expire(&self, _key: &str, _ttl: Duration) -> Result<(), StoreError> {
        self.refuse()
    }
}
