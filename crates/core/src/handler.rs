use crate::config::ResolverConfig;
use crate::locator::CandidateLocator;
use crate::models::{PreviewRequest, PreviewResponse, PreviewType};
use crate::traits::ObjectStore;
use crate::ResolveError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Entry point for preview requests coming from the API layer.
pub struct PreviewRequestHandler<S>
where
    S: ObjectStore,
{
    locator: CandidateLocator<S>,
}

impl<S> PreviewRequestHandler<S>
where
    S: ObjectStore,
{
    pub fn new(store: S, config: ResolverConfig) -> Self {
        Self {
            locator: CandidateLocator::new(store, config),
        }
    }

    pub fn locator(&self) -> &CandidateLocator<S> {
        &self.locator
    }

    pub async fn resolve_preview(
        &self,
        request: &PreviewRequest,
    ) -> Result<PreviewResponse, ResolveError> {
        self.resolve_preview_with_cancel(request, &CancellationToken::new())
            .await
    }

    pub async fn resolve_preview_with_cancel(
        &self,
        request: &PreviewRequest,
        cancel: &CancellationToken,
    ) -> Result<PreviewResponse, ResolveError> {
        let file_name = request.file_name.trim();
        if file_name.is_empty() {
            return Err(ResolveError::MalformedInput(
                "fileName is required".to_string(),
            ));
        }
        if request.page_number == Some(0) {
            return Err(ResolveError::MalformedInput(
                "pageNumber starts at 1".to_string(),
            ));
        }

        if self.is_convertible(request) {
            self.resolve_converted(request, cancel).await
        } else {
            self.resolve_page_images(request, cancel).await
        }
    }

    fn is_convertible(&self, request: &PreviewRequest) -> bool {
        let normalizer = self.locator.normalizer();
        let hinted = request.file_type.as_deref().is_some_and(|hint| {
            let hint = hint.trim();
            normalizer.is_convertible_extension(hint)
                || hint.to_ascii_lowercase().contains("docuworks")
        });

        hinted
            || normalizer.is_convertible_file(request.file_name.trim())
            || request
                .original_key_hint
                .as_deref()
                .is_some_and(|key| normalizer.is_convertible_file(key))
    }

    async fn resolve_converted(
        &self,
        request: &PreviewRequest,
        cancel: &CancellationToken,
    ) -> Result<PreviewResponse, ResolveError> {
        let original_key = request
            .original_key_hint
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .unwrap_or_else(|| request.file_name.trim());

        let resolution = self
            .locator
            .resolve_with_cancel(original_key, cancel)
            .await?;

        let Some(object_key) = resolution.object_key.filter(|_| resolution.found) else {
            return Ok(PreviewResponse::not_found(PreviewType::Pdf));
        };

        let ttl = self.locator.config().reference_ttl_secs;
        let preview_ref = self.locator.store().read_reference(&object_key, ttl).await?;

        Ok(PreviewResponse {
            found: true,
            preview_type: PreviewType::Pdf,
            preview_ref: Some(preview_ref),
            total_pages: None,
        })
    }

    /// Directly previewable documents have one image per page stored as
    /// `{image_preview_root}/{file id}/page_{n}.{ext}`.
    async fn resolve_page_images(
        &self,
        request: &PreviewRequest,
        cancel: &CancellationToken,
    ) -> Result<PreviewResponse, ResolveError> {
        let config = self.locator.config();
        let folder_id = request
            .file_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| file_stem(request.file_name.trim()).to_string());
        let prefix = format!(
            "{}/{folder_id}/",
            config.image_preview_root.trim_end_matches('/')
        );

        let pages = self.collect_pages(&prefix, cancel).await?;
        if cancel.is_cancelled() {
            debug!(prefix = %prefix, "page image lookup cancelled");
            return Ok(PreviewResponse::not_found(PreviewType::Images));
        }
        let Some(total_pages) = pages.iter().map(|(page, _)| *page).max() else {
            debug!(prefix = %prefix, "no page images");
            return Ok(PreviewResponse::not_found(PreviewType::Images));
        };

        let wanted = request.page_number.unwrap_or(1);
        let Some((_, key)) = pages.iter().find(|(page, _)| *page == wanted) else {
            debug!(prefix = %prefix, page = wanted, total_pages, "page image missing");
            return Ok(PreviewResponse::not_found(PreviewType::Images));
        };

        let preview_ref = self
            .locator
            .store()
            .read_reference(key, config.reference_ttl_secs)
            .await?;

        Ok(PreviewResponse {
            found: true,
            preview_type: PreviewType::Images,
            preview_ref: Some(preview_ref),
            total_pages: Some(total_pages),
        })
    }

    async fn collect_pages(
        &self,
        prefix: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<(u32, String)>, ResolveError> {
        let config = self.locator.config();
        let store = self.locator.store();
        let mut pages = Vec::new();
        let mut scanned = 0;
        let mut token: Option<String> = None;

        while scanned < config.max_objects_per_prefix {
            if cancel.is_cancelled() {
                break;
            }
            let page_size = config
                .scoped_page_size
                .min(config.max_objects_per_prefix - scanned);
            let listing = store
                .list_by_prefix(prefix, page_size, token.as_deref())
                .await
                .map_err(|error| {
                    warn!(prefix = %prefix, error = %error, "page image listing failed");
                    ResolveError::from(error)
                })?;

            if listing.items.is_empty() {
                break;
            }
            scanned += listing.items.len();
            pages.extend(listing.items.into_iter().filter_map(|item| {
                let file_name = item.key.rsplit('/').next()?;
                let number = page_number(file_name, config)?;
                Some((number, item.key))
            }));

            token = match listing.next_token {
                Some(next) if !next.is_empty() => Some(next),
                _ => break,
            };
        }
        Ok(pages)
    }
}

/// `page_{n}.{image ext}` -> `n`.
fn page_number(file_name: &str, config: &ResolverConfig) -> Option<u32> {
    let (stem, ext) = file_name.rsplit_once('.')?;
    if !config.is_image_extension(ext) {
        return None;
    }
    stem.strip_prefix("page_")?.parse().ok().filter(|n| *n > 0)
}

fn file_stem(file_name: &str) -> &str {
    let name = file_name.rsplit('/').next().unwrap_or(file_name);
    match name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => name,
    }
}
