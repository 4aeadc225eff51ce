use crate::models::ListPage;
use crate::traits::ObjectStore;
use crate::StoreError;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use url::Url;

const BACKEND: &str = "object-gateway";

/// Client for an HTTP object gateway that fronts the bucket with a small JSON
/// API:
///
/// - `HEAD {base}/{bucket}/objects/{key}` answers 200 or 404
/// - `GET {base}/{bucket}/objects?prefix=&max-keys=&continuation-token=`
/// - `POST {base}/{bucket}/presign` with `{"key", "ttl_secs"}`
pub struct GatewayStore {
    client: Arc<Client>,
    base_url: Url,
    bucket: String,
}

#[derive(Deserialize)]
struct PresignResponse {
    url: String,
}

impl GatewayStore {
    pub fn new(base_url: &str, bucket: impl Into<String>) -> Result<Self, StoreError> {
        Ok(Self {
            client: Arc::new(Client::new()),
            base_url: Url::parse(base_url)?,
            bucket: bucket.into(),
        })
    }

    fn endpoint<'a>(&self, segments: impl IntoIterator<Item = &'a str>) -> Result<Url, StoreError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| StoreError::Request(format!("gateway url cannot be a base: {}", self.base_url)))?
            .pop_if_empty()
            .push(&self.bucket)
            .extend(segments);
        Ok(url)
    }
}

fn classify(status: StatusCode) -> StoreError {
    if matches!(
        status,
        StatusCode::BAD_GATEWAY | StatusCode::SERVICE_UNAVAILABLE | StatusCode::GATEWAY_TIMEOUT
    ) {
        StoreError::Unreachable(format!("{BACKEND} answered {status}"))
    } else {
        StoreError::BackendResponse {
            backend: BACKEND.to_string(),
            details: status.to_string(),
        }
    }
}

#[async_trait]
impl ObjectStore for GatewayStore {
    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        let url = self.endpoint(std::iter::once("objects").chain(key.split('/')))?;
        let response = self.client.head(url).send().await?;

        match response.status() {
            status if status.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            status => Err(classify(status)),
        }
    }

    async fn list_by_prefix(
        &self,
        prefix: &str,
        page_size: usize,
        continuation_token: Option<&str>,
    ) -> Result<ListPage, StoreError> {
        let mut url = self.endpoint(["objects"])?;
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("prefix", prefix)
                .append_pair("max-keys", &page_size.to_string());
            if let Some(token) = continuation_token {
                query.append_pair("continuation-token", token);
            }
        }

        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(classify(response.status()));
        }
        Ok(response.json::<ListPage>().await?)
    }

    async fn read_reference(&self, key: &str, ttl_secs: u64) -> Result<String, StoreError> {
        let url = self.endpoint(["presign"])?;
        let response = self
            .client
            .post(url)
            .json(&json!({ "key": key, "ttl_secs": ttl_secs }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(classify(response.status()));
        }
        let presigned: PresignResponse = response.json().await?;
        Ok(presigned.url)
    }
}
