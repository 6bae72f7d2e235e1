//! Object storage client
//!
//! Bucket-scoped REST storage (Supabase-style endpoints): upload/download
//! by path, time-boxed signed URLs, list/delete by prefix. Intermediate
//! artifacts live in a temp bucket namespaced per job; final audio goes to
//! the output bucket under the owning user's folder.

use async_trait::async_trait;
use calma_common::{Error, Result};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Seam for object storage operations
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: &[u8],
        content_type: &str,
    ) -> Result<()>;

    async fn download(&self, bucket: &str, path: &str) -> Result<Vec<u8>>;

    /// Create a time-boxed read URL for a path
    async fn signed_url(&self, bucket: &str, path: &str, expires_secs: u32) -> Result<String>;

    /// HEAD a URL, returning the HTTP status code
    async fn head_status(&self, url: &str) -> Result<u16>;

    /// List object names (relative to the prefix) under a prefix
    async fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<String>>;

    /// Delete objects by exact path
    async fn delete(&self, bucket: &str, paths: &[String]) -> Result<()>;
}

/// REST storage client
#[derive(Debug)]
pub struct StorageClient {
    http_client: reqwest::Client,
    base_url: String,
    service_key: String,
}

#[derive(Debug, Deserialize)]
struct SignResponse {
    #[serde(rename = "signedURL")]
    signed_url: String,
}

#[derive(Debug, Deserialize)]
struct ListEntry {
    name: String,
}

impl StorageClient {
    pub fn new(base_url: &str, service_key: &str) -> Result<Self> {
        if service_key.trim().is_empty() {
            return Err(Error::Config("Storage service key is empty".to_string()));
        }

        let http_client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| Error::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            service_key: service_key.to_string(),
        })
    }

    fn object_url(&self, bucket: &str, path: &str) -> String {
        format!("{}/object/{}/{}", self.base_url, bucket, path)
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(Error::Http {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl ObjectStore for StorageClient {
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: &[u8],
        content_type: &str,
    ) -> Result<()> {
        let response = self
            .http_client
            .post(self.object_url(bucket, path))
            .bearer_auth(&self.service_key)
            .header("Content-Type", content_type)
            .header("x-upsert", "true")
            .body(bytes.to_vec())
            .send()
            .await?;

        Self::check(response).await?;
        Ok(())
    }

    async fn download(&self, bucket: &str, path: &str) -> Result<Vec<u8>> {
        let response = self
            .http_client
            .get(self.object_url(bucket, path))
            .bearer_auth(&self.service_key)
            .send()
            .await?;

        let response = Self::check(response).await?;
        Ok(response.bytes().await?.to_vec())
    }

    async fn signed_url(&self, bucket: &str, path: &str, expires_secs: u32) -> Result<String> {
        let response = self
            .http_client
            .post(format!("{}/object/sign/{}/{}", self.base_url, bucket, path))
            .bearer_auth(&self.service_key)
            .json(&json!({ "expiresIn": expires_secs }))
            .send()
            .await?;

        let response = Self::check(response).await?;
        let signed: SignResponse = response.json().await?;
        // The API returns a path relative to the storage root
        Ok(format!(
            "{}{}",
            self.base_url,
            signed.signed_url.trim_start_matches("/storage/v1")
        ))
    }

    async fn head_status(&self, url: &str) -> Result<u16> {
        let response = self.http_client.head(url).send().await?;
        Ok(response.status().as_u16())
    }

    async fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<String>> {
        let response = self
            .http_client
            .post(format!("{}/object/list/{}", self.base_url, bucket))
            .bearer_auth(&self.service_key)
            .json(&json!({ "prefix": prefix, "limit": 1000 }))
            .send()
            .await?;

        let response = Self::check(response).await?;
        let entries: Vec<ListEntry> = response.json().await?;
        Ok(entries.into_iter().map(|e| e.name).collect())
    }

    async fn delete(&self, bucket: &str, paths: &[String]) -> Result<()> {
        if paths.is_empty() {
            return Ok(());
        }

        let response = self
            .http_client
            .delete(format!("{}/object/{}", self.base_url, bucket))
            .bearer_auth(&self.service_key)
            .json(&json!({ "prefixes": paths }))
            .send()
            .await?;

        Self::check(response).await?;
        Ok(())
    }
}
