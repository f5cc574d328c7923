//! The store operations a migration needs.

use async_trait::async_trait;

use crate::error::StoreError;
use crate::types::{Key, Ttl};

/// Narrow view of a key-value store: enumerate, read lifetimes, dump and restore
/// opaque values.
///
/// `dump` and `restore` are only guaranteed to be inverses on the same store
/// implementation; callers never look inside the payload.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Liveness check.
    async fn ping(&self) -> Result<(), StoreError>;

    /// Every key currently in the store.
    async fn list_keys(&self) -> Result<Vec<Key>, StoreError>;

    /// Remaining lifetime of `key`, or `None` if the key does not exist.
    async fn remaining_ttl(&self, key: &Key) -> Result<Option<Ttl>, StoreError>;

    /// Serialized value of `key`, or `None` if the key does not exist.
    async fn dump(&self, key: &Key) -> Result<Option<Vec<u8>>, StoreError>;

    /// Recreates `key` from a payload produced by [`dump`](Self::dump).
    ///
    /// Returns [`StoreError::KeyExists`] when the key is already present; the
    /// existing value is left in place.
    async fn restore(&self, key: &Key, ttl: Ttl, payload: &[u8]) -> Result<(), StoreError>;
}
