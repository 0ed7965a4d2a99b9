//! Thin client for the S3-compatible remote object store. Grounded on
//! `original_source/handlers_base.py`'s `EventHandler` methods: same header
//! names, same `REQUEST_TIMEOUT = (10, 30)` connect/read split, same
//! "deletes of an absent object still succeed" contract.

use reqwest::{Client, StatusCode};
use std::time::Duration;

use crate::config::S3Config;
use crate::error::{IndexerError, IndexerResult};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const READ_TIMEOUT: Duration = Duration::from_secs(30);

pub struct ArchiveClient {
    http: Client,
    base_url: String,
    access: String,
    secret: String,
}

impl ArchiveClient {
    pub fn new(config: &S3Config) -> IndexerResult<Self> {
        let http = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(READ_TIMEOUT)
            .build()
            .map_err(|e| IndexerError::Configuration(format!("failed to build http client: {e}")))?;

        Ok(Self {
            http,
            base_url: config.url.trim_end_matches('/').to_string(),
            access: config.access.clone(),
            secret: config.secret.clone(),
        })
    }

    fn authorization(&self) -> String {
        format!("LOW {}:{}", self.access, self.secret)
    }

    fn object_url(&self, bucket: &str, key: &str) -> String {
        format!("{}/{}/{}", self.base_url, bucket, key)
    }

    /// Uploads `body` as `key` under `bucket`, creating the bucket if
    /// absent and tagging it with the project's collection.
    pub async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
        collection: &str,
        extra_headers: &[(&str, &str)],
    ) -> IndexerResult<()> {
        let url = self.object_url(bucket, key);
        let mut req = self
            .http
            .put(&url)
            .header("authorization", self.authorization())
            .header("x-archive-auto-make-bucket", "1")
            .header("x-archive-keep-old-version", "1")
            .header("x-archive-meta-collection", collection)
            .header("content-type", content_type)
            .body(body);
        for (name, value) in extra_headers {
            req = req.header(*name, *value);
        }

        let response = req
            .send()
            .await
            .map_err(|e| IndexerError::Http { url: url.clone(), source: e })?;
        ensure_success(response, &url).await
    }

    /// Server-side copies `old_bucket/old_key` to `new_bucket/new_key`.
    pub async fn copy_object(
        &self,
        old_bucket: &str,
        old_key: &str,
        new_bucket: &str,
        new_key: &str,
        collection: &str,
    ) -> IndexerResult<()> {
        let url = self.object_url(new_bucket, new_key);
        let copy_source = format!("/{old_bucket}/{old_key}");
        let response = self
            .http
            .put(&url)
            .header("authorization", self.authorization())
            .header("x-archive-auto-make-bucket", "1")
            .header("x-archive-keep-old-version", "1")
            .header("x-archive-meta-collection", collection)
            .header("x-amz-copy-source", copy_source)
            .send()
            .await
            .map_err(|e| IndexerError::Http { url: url.clone(), source: e })?;
        ensure_success(response, &url).await
    }

    /// Deletes an object. A missing object is treated as success, matching
    /// the idempotent-delete contract every handler relies on.
    pub async fn delete_object(&self, bucket: &str, key: &str) -> IndexerResult<()> {
        let url = self.object_url(bucket, key);
        let response = self
            .http
            .delete(&url)
            .header("authorization", self.authorization())
            .header("x-archive-cascade-delete", "1")
            .send()
            .await
            .map_err(|e| IndexerError::Http { url: url.clone(), source: e })?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }
        ensure_success(response, &url).await
    }
}

async fn ensure_success(response: reqwest::Response, url: &str) -> IndexerResult<()> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }
    let body = response.text().await.unwrap_or_default();
    Err(IndexerError::ArchiveResponse {
        status: status.as_u16(),
        url: url.to_string(),
        body,
    })
}
