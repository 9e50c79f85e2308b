//! Attribute store gateway.
//!
//! The dispatcher fetches persisted attributes at most once per dispatch, on
//! the first request of a session, and the built-in `:saveState` handler
//! writes them back. Retry and caching are left to implementations.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::trace;

use crate::attributes::Attributes;
use crate::error::StoreResult;

/// Async key-value contract keyed by table name and user id.
#[async_trait]
pub trait AttributeStore: Send + Sync + 'static {
    /// Fetches the attributes stored for `user_id`.
    ///
    /// A user with no record yields an empty mapping.
    async fn get(&self, table: &str, user_id: &str) -> StoreResult<Attributes>;

    /// Replaces the attributes stored for `user_id`.
    async fn put(&self, table: &str, user_id: &str, attributes: &Attributes) -> StoreResult<()>;
}

/// A shared, type-erased attribute store.
pub type BoxedAttributeStore = Arc<dyn AttributeStore>;

/// An attribute store that keeps everything in process memory.
///
/// Useful for tests and for single-process deployments that accept losing
/// state on restart.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: RwLock<HashMap<(String, String), Attributes>>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a record, replacing any previous one.
    pub fn insert(&self, table: &str, user_id: &str, attributes: Attributes) {
        self.records
            .write()
            .insert((table.to_string(), user_id.to_string()), attributes);
    }

    /// Returns a copy of a stored record.
    pub fn snapshot(&self, table: &str, user_id: &str) -> Option<Attributes> {
        self.records
            .read()
            .get(&(table.to_string(), user_id.to_string()))
            .cloned()
    }

    /// Returns the number of stored records.
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    /// Returns `true` if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

#[async_trait]
impl AttributeStore for MemoryStore {
    async fn get(&self, table: &str, user_id: &str) -> StoreResult<Attributes> {
        trace!(table, user_id, "Reading attributes from memory");
        Ok(self.snapshot(table, user_id).unwrap_or_default())
    }

    async fn put(&self, table: &str, user_id: &str, attributes: &Attributes) -> StoreResult<()> {
        trace!(table, user_id, "Writing attributes to memory");
        self.insert(table, user_id, attributes.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    #[tokio::test]
    async fn test_missing_record_reads_empty() {
        let store = MemoryStore::new();
        let attrs = store.get("games", "nobody").await.unwrap();
        assert!(attrs.is_empty());
    }

    #[tokio::test]
    async fn test_put_then_get() {
        let store = MemoryStore::new();
        let Value::Object(attrs) = json!({ "score": 5 }) else {
            unreachable!()
        };
        store.put("games", "u-1", &attrs).await.unwrap();

        assert_eq!(store.len(), 1);
        assert_eq!(store.get("games", "u-1").await.unwrap(), attrs);
        assert!(store.get("other", "u-1").await.unwrap().is_empty());
    }
}
