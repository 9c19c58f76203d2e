use std::{collections::HashMap, sync::Arc};

use anyhow::{Context, Result};
use async_trait::async_trait;
use storage::Storage;
use tokio::sync::Mutex;

use crate::NameCache;

/// Slot the commenter's display name is remembered under. Independent of
/// any post so the name follows the user from thread to thread.
pub const COMMENTER_NAME_KEY: &str = "comments.commenter_name";

#[derive(Default)]
pub struct MemoryNameCache {
    values: Mutex<HashMap<String, String>>,
}

#[async_trait]
impl NameCache for MemoryNameCache {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.values.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.values
            .lock()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Name cache kept in the local SQLite settings table.
pub struct DurableNameCache {
    store: Storage,
}

impl DurableNameCache {
    pub async fn initialize(database_url: &str) -> Result<Arc<Self>> {
        let store = Storage::new(database_url)
            .await
            .with_context(|| format!("failed to initialize name cache at '{database_url}'"))?;
        Ok(Arc::new(Self::from_storage(store)))
    }

    pub fn from_storage(store: Storage) -> Self {
        Self { store }
    }
}

#[async_trait]
impl NameCache for DurableNameCache {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.store
            .load_setting(key)
            .await
            .with_context(|| format!("failed to read cached value '{key}'"))
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.store
            .save_setting(key, value)
            .await
            .with_context(|| format!("failed to cache value '{key}'"))
    }
}

#[cfg(test)]
#[path = "tests/name_cache_tests.rs"]
mod tests;
