use crate::models::ListPage;
use crate::StoreError;
use async_trait::async_trait;

/// Read-only view of a flat, prefix-addressable object store.
///
/// Implementations own their retry policy; every call must be safe to repeat.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn exists(&self, key: &str) -> Result<bool, StoreError>;

    async fn list_by_prefix(
        &self,
        prefix: &str,
        page_size: usize,
        continuation_token: Option<&str>,
    ) -> Result<ListPage, StoreError>;

    /// Time-limited URL or token granting read access to `key`.
    async fn read_reference(&self, key: &str, ttl_secs: u64) -> Result<String, StoreError>;
}

#[async_trait]
impl<S> ObjectStore for std::sync::Arc<S>
where
    S: ObjectStore + ?Sized,
{
    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        (**self).exists(key).await
    }

    async fn list_by_prefix(
        &self,
        prefix: &str,
        page_size: usize,
        continuation_token: Option<&str>,
    ) -> Result<ListPage, StoreError> {
        (**self)
            .list_by_prefix(prefix, page_size, continuation_token)
            .await
    }

    async fn read_reference(&self, key: &str, ttl_secs: u64) -> Result<String, StoreError> {
        (**self).read_reference(key, ttl_secs).await
    }
}
