pub mod gateway;
pub mod local;
pub mod memory;

pub use gateway::GatewayStore;
pub use local::LocalDirStore;
pub use memory::MemoryStore;

use crate::models::{ListPage, ListedObject};


/// One page of `objects` (sorted by key) under `prefix`, resuming after the
/// key named by `continuation_token`.
pub(crate) fn paginate<'a>(
    objects: impl IntoIterator<Item = (&'a str, u64)>,
    prefix: &str,
    page_size: usize,
    continuation_token: Option<&str>,
) -> ListPage {
    let page_size = page_size.max(1);
    let mut items: Vec<ListedObject> = objects
        .into_iter()
        .filter(|(key, _)| key.starts_with(prefix))
        .filter(|(key, _)| continuation_token.map_or(true, |token| *key > token))
        .take(page_size + 1)
        .map(|(key, size)| ListedObject {
            key: key.to_string(),
            size,
        })
        .collect();

    let next_token = if items.len() > page_size {
        items.truncate(page_size);
        items.last().map(|item| item.key.clone())
    } else {
        None
    };

    ListPage { items, next_token }
}

/// Unix timestamp `ttl_secs` from now, saturating.
pub(crate) fn expiry_timestamp(ttl_secs: u64) -> i64 {
    let ttl = i64::try_from(ttl_secs).unwrap_or(i64::MAX);
    chrono::Utc::now().timestamp().saturating_add(ttl)
}

/// Rejects keys that could address something outside the bucket.
pub(crate) fn is_safe_key(key: &str) -> bool {
    !key.is_empty()
        && !key.starts_with('/')
        && key
            .split('/')
            .all(|segment| segment != ".." && segment != ".")
}

#[cfg(test)]
mod tests {
    use super::{is_safe_key, paginate};

    #[test]
    fn pagination_resumes_after_the_token() {
        let objects = [("a/1", 1), ("a/2", 2), ("a/3", 3), ("b/1", 4)];

        let first = paginate(objects, "a/", 2, None);
        assert_eq!(first.items.len(), 2);
        assert_eq!(first.next_token.as_deref(), Some("a/2"));

        let second = paginate(objects, "a/", 2, first.next_token.as_deref());
        assert_eq!(second.items.len(), 1);
        assert_eq!(second.items[0].key, "a/3");
        assert_eq!(second.next_token, None);
    }

    #[test]
    fn unsafe_keys_are_rejected() {
        assert!(is_safe_key("a/b.pdf"));
        assert!(!is_safe_key("../etc/passwd"));
        assert!(!is_safe_key("/abs"));
        assert!(!is_safe_key(""));
    }
}
