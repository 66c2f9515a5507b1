use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use super::{ContentStore, StoreError};

/// An object held by [`MemoryContentStore`], with the headers it was written with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub body: Vec<u8>,
    pub content_type: String,
    pub cache_control: String,
}

/// Process-local store. Signed URLs use the `memory://` scheme and are only
/// meaningful to tests.
#[derive(Debug, Default)]
pub struct MemoryContentStore {
    objects: RwLock<HashMap<String, StoredObject>>,
    fail_writes: AtomicBool,
}

impl MemoryContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `put` fail, to exercise write-failure paths.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Seed an object directly.
    pub fn insert(&self, key: &str, body: Vec<u8>, content_type: &str) {
        self.objects
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(
                key.to_string(),
                StoredObject {
                    body,
                    content_type: content_type.to_string(),
                    cache_control: String::new(),
                },
            );
    }

    pub fn object(&self, key: &str) -> Option<StoredObject> {
        self.objects
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    /// All keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .objects
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.objects
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ContentStore for MemoryContentStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self
            .objects
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(key))
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        self.object(key)
            .map(|o| o.body)
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }

    async fn put(
        &self,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
        cache_control: &str,
    ) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Request {
                key: key.to_string(),
                message: "writes disabled".to_string(),
            });
        }
        self.objects
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(
                key.to_string(),
                StoredObject {
                    body,
                    content_type: content_type.to_string(),
                    cache_control: cache_control.to_string(),
                },
            );
        Ok(())
    }

    async fn signed_read_url(&self, key: &str, ttl: Duration) -> Result<String, StoreError> {
        let expires = Utc::now().timestamp() + ttl.as_secs() as i64;
        Ok(format!("memory://{key}?expires={expires}"))
    }
}
