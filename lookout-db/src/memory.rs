//! In-memory key-value store.
//!
//! Backed by a lock-free `scc::HashMap`. Nothing survives a restart, which makes
//! it the store of choice for tests and for running without a database file.

use crate::{KeyValueStore, Result};

/// Thread-safe in-memory implementation of [`KeyValueStore`].
#[derive(Default)]
pub struct MemoryStore {
    values: scc::HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            values: scc::HashMap::new(),
        }
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.values.read_async(key, |_, v| v.clone()).await)
    }

    async fn set(&self, key: &str, value: String) -> Result<()> {
        if self
            .values
            .update_async(key, |_, v| *v = value.clone())
            .await
            .is_none()
        {
            let _ = self.values.insert_async(key.to_string(), value).await;
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let _ = self.values.remove_async(key).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_get_delete() {
        let store = MemoryStore::new();
        assert!(store.get("message:status").await.unwrap().is_none());

        store
            .set("message:status", "1234".to_string())
            .await
            .unwrap();
        assert_eq!(
            store.get("message:status").await.unwrap().as_deref(),
            Some("1234")
        );

        // Overwrite keeps a single entry
        store
            .set("message:status", "5678".to_string())
            .await
            .unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(
            store.get("message:status").await.unwrap().as_deref(),
            Some("5678")
        );

        store.delete("message:status").await.unwrap();
        assert!(store.is_empty());
    }
}
