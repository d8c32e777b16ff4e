//! Object storage client for Supabase Storage.

use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

use crate::config::UploadConfig;
use crate::{Error, Result};

/// Durable destination for uploaded objects.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Write `bytes` under `bucket/key`. Existing objects are never overwritten.
    async fn put(&self, bucket: &str, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<()>;

    /// Public URL of an object, without checking that it exists.
    fn public_url(&self, bucket: &str, key: &str) -> String;
}

/// Supabase Storage REST client authenticated with the service role key.
pub struct SupabaseStorage {
    http: reqwest::Client,
    base_url: String,
    service_role_key: String,
}

impl SupabaseStorage {
    pub fn new(config: &UploadConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| Error::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: config.supabase_url.trim_end_matches('/').to_string(),
            service_role_key: config.service_role_key.clone(),
        })
    }
}

#[async_trait]
impl ObjectStore for SupabaseStorage {
    async fn put(&self, bucket: &str, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<()> {
        let url = format!("{}/storage/v1/object/{}/{}", self.base_url, bucket, key);
        debug!("Uploading {} bytes to {}/{}", bytes.len(), bucket, key);

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.service_role_key)
            .header("apikey", &self.service_role_key)
            .header("content-type", content_type)
            .header("x-upsert", "false")
            .body(bytes)
            .send()
            .await
            .map_err(|e| Error::Upstream(format!("Storage upload failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Upstream(format!(
                "Storage upload failed ({}): {}",
                status, body
            )));
        }

        Ok(())
    }

    fn public_url(&self, bucket: &str, key: &str) -> String {
        format!("{}/storage/v1/object/public/{}/{}", self.base_url, bucket, key)
    }
}

/// Swap the origin of `public_url` for `cdn_url`, keeping the path.
pub fn rewrite_to_cdn(public_url: &str, cdn_url: &str) -> Result<String> {
    let parsed = url::Url::parse(public_url)
        .map_err(|e| Error::Internal(format!("Invalid storage URL {}: {}", public_url, e)))?;

    Ok(format!("{}{}", cdn_url.trim_end_matches('/'), parsed.path()))
}
