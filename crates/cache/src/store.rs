use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("state store unavailable: {0}")]
    Unavailable(String),
    #[error("could not serialize value for key `{key}`: {source}")]
    Serialize { key: String, source: serde_json::Error },
}

/// Key/value state store with sliding expiry and prepend-ordered lists.
///
/// Every consumer takes this trait rather than a concrete client, so the
/// production backend and the test doubles are interchangeable at
/// construction time.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Fetch a raw value. Expired keys read as absent.
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Write a value, replacing any previous one, and reset its lifetime.
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError>;

    /// Push an entry to the front of a list, creating the list if absent.
    async fn list_prepend(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Read list entries `start..=stop` (newest first). Out-of-range bounds
    /// clamp; an absent key reads as an empty list.
    async fn list_range(&self, key: &str, start: usize, stop: usize)
        -> Result<Vec<String>, StoreError>;

    /// Reset the lifetime of an existing key. A miss is not an error.
    async fn expire(&self, key: &str, ttl: Duration) -> Result<(), StoreError>;
}

/// Fetch and deserialize a JSON value. Undecodable payloads read as absent
/// rather than failing the caller; the store only owes us best-effort cache
/// semantics.
pub async fn get_json<T: DeserializeOwned>(
    store: &dyn KvStore,
    key: &str,
) -> Result<Option<T>, StoreError> {
    let Some(raw) = store.get(key).await? else {
        return Ok(None);
    };
    match serde_json::from_str(&raw) {
        Ok(value) => Ok(Some(value)),
        Err(error) => {
            tracing::warn!(
                event_name = "cache.decode_failed",
                key = %key,
                error = %error,
                "discarding undecodable cached value"
            );
            Ok(None)
        }
    }
}

/// Serialize and write a JSON value with the given lifetime.
pub async fn set_json<T: Serialize>(
    store: &dyn KvStore,
    key: &str,
    value: &T,
    ttl: Duration,
) -> Result<(), StoreError> {
    let raw = serde_json::to_string(value)
        .map_err(|source| StoreError::Serialize { key: key.to_string(), source })?;
    store.set(key, &raw, ttl).await
}
