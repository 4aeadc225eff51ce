use crate::models::ListPage;
use crate::stores::{expiry_timestamp, is_safe_key, paginate};
use crate::traits::ObjectStore;
use crate::StoreError;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use url::Url;
use walkdir::WalkDir;

/// A directory treated as a bucket: object keys are `/`-joined paths relative
/// to `root`.
#[derive(Debug, Clone)]
pub struct LocalDirStore {
    root: PathBuf,
}

impl LocalDirStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StoreError> {
        if !is_safe_key(key) {
            return Err(StoreError::Request(format!("unsupported object key: {key}")));
        }
        Ok(key.split('/').fold(self.root.clone(), |path, segment| path.join(segment)))
    }
}

/// Sorted `(key, size)` pairs of every file under `root` whose key starts
/// with `prefix`. Walking starts at the deepest directory the prefix names.
fn collect_keys(root: &Path, prefix: &str) -> Result<Vec<(String, u64)>, StoreError> {
    if !root.is_dir() {
        return Err(StoreError::Unreachable(format!(
            "store root {} is not a directory",
            root.display()
        )));
    }

    let walk_from = match prefix.rfind('/') {
        Some(index) if is_safe_key(&prefix[..index]) => prefix[..index]
            .split('/')
            .fold(root.to_path_buf(), |path, segment| path.join(segment)),
        _ => root.to_path_buf(),
    };
    if !walk_from.is_dir() {
        return Ok(Vec::new());
    }

    let mut keys = Vec::new();
    for entry in WalkDir::new(&walk_from)
        .into_iter()
        .filter_map(|item| item.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }
        let Ok(relative) = entry.path().strip_prefix(root) else {
            continue;
        };
        let key = relative
            .components()
            .map(|component| component.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        if !key.starts_with(prefix) {
            continue;
        }
        let size = entry.metadata().map(|meta| meta.len()).unwrap_or(0);
        keys.push((key, size));
    }

    keys.sort_unstable();
    Ok(keys)
}

#[async_trait]
impl ObjectStore for LocalDirStore {
    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        if !self.root.is_dir() {
            return Err(StoreError::Unreachable(format!(
                "store root {} is not a directory",
                self.root.display()
            )));
        }
        let path = match self.path_for(key) {
            Ok(path) => path,
            Err(_) => return Ok(false),
        };
        match tokio::fs::metadata(&path).await {
            Ok(metadata) => Ok(metadata.is_file()),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(error) => Err(error.into()),
        }
    }

    async fn list_by_prefix(
        &self,
        prefix: &str,
        page_size: usize,
        continuation_token: Option<&str>,
    ) -> Result<ListPage, StoreError> {
        let root = self.root.clone();
        let owned_prefix = prefix.to_string();
        let keys = tokio::task::spawn_blocking(move || collect_keys(&root, &owned_prefix))
            .await
            .map_err(|error| StoreError::Request(format!("listing task failed: {error}")))??;

        Ok(paginate(
            keys.iter().map(|(key, size)| (key.as_str(), *size)),
            prefix,
            page_size,
            continuation_token,
        ))
    }

    async fn read_reference(&self, key: &str, ttl_secs: u64) -> Result<String, StoreError> {
        let path = self.path_for(key)?;
        if !tokio::fs::metadata(&path).await?.is_file() {
            return Err(StoreError::Request(format!("no such object: {key}")));
        }
        let absolute = tokio::fs::canonicalize(&path).await?;
        let mut url = Url::from_file_path(&absolute).map_err(|_| {
            StoreError::Request(format!("cannot build file url for {}", absolute.display()))
        })?;
        url.query_pairs_mut()
            .append_pair("expires", &expiry_timestamp(ttl_secs).to_string());
        Ok(url.to_string())
    }
}
