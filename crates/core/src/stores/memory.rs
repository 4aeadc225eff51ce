use crate::models::{ListPage, ListedObject};
use crate::stores::{expiry_timestamp, paginate};
use crate::traits::ObjectStore;
use crate::StoreError;
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::ops::Bound;
use std::path::Path;

/// Ordered in-memory key set. Backs tests and manifest-driven CLI runs.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    objects: BTreeMap<String, u64>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ManifestEntry {
    Key(String),
    Object(ListedObject),
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_keys<K: Into<String>>(keys: impl IntoIterator<Item = K>) -> Self {
        Self {
            objects: keys.into_iter().map(|key| (key.into(), 0)).collect(),
        }
    }

    /// Loads a JSON array of keys, or of `{"key", "size"}` objects.
    pub fn from_manifest(path: &Path) -> Result<Self, StoreError> {
        let raw = std::fs::read_to_string(path)?;
        let entries: Vec<ManifestEntry> = serde_json::from_str(&raw)?;
        let objects = entries
            .into_iter()
            .map(|entry| match entry {
                ManifestEntry::Key(key) => (key, 0),
                ManifestEntry::Object(object) => (object.key, object.size),
            })
            .collect();
        Ok(Self { objects })
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.objects.contains_key(key))
    }

    async fn list_by_prefix(
        &self,
        prefix: &str,
        page_size: usize,
        continuation_token: Option<&str>,
    ) -> Result<ListPage, StoreError> {
        let start = continuation_token.unwrap_or(prefix);
        let objects = self
            .objects
            .range::<str, _>((Bound::Included(start), Bound::Unbounded))
            .map(|(key, size)| (key.as_str(), *size))
            .take_while(|(key, _)| key.starts_with(prefix));
        Ok(paginate(objects, prefix, page_size, continuation_token))
    }

    async fn read_reference(&self, key: &str, ttl_secs: u64) -> Result<String, StoreError> {
        if !self.objects.contains_key(key) {
            return Err(StoreError::Request(format!("no such object: {key}")));
        }
        Ok(format!("memory://{key}?expires={}", expiry_timestamp(ttl_secs)))
    }
}
