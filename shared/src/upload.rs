//! Asset upload with best-effort WebP re-encoding.
//!
//! The decoded payload is size-checked before anything else happens. Images
//! are re-encoded to WebP when asked; if that fails the original bytes are
//! stored instead. The object key is always generated here, never taken from
//! the client.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::storage::{rewrite_to_cdn, ObjectStore};
use crate::validation::UploadRequest;
use crate::{Error, Result};

/// Compressed format every optimizable image is converted to.
pub const WEBP_MIME: &str = "image/webp";

/// Lossy quality used for re-encoding.
pub const WEBP_QUALITY: f32 = 85.0;

/// Successful upload.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UploadResult {
    pub success: bool,
    pub url: String,
    #[serde(rename = "fileName")]
    pub file_name: String,
}

/// Re-encodes raster images.
pub trait ImageTranscoder: Send + Sync {
    fn to_webp(&self, bytes: &[u8]) -> Result<Vec<u8>>;
}

/// libwebp-backed transcoder.
pub struct WebpTranscoder {
    quality: f32,
}

impl WebpTranscoder {
    pub fn new(quality: f32) -> Self {
        Self { quality }
    }
}

impl Default for WebpTranscoder {
    fn default() -> Self {
        Self::new(WEBP_QUALITY)
    }
}

impl ImageTranscoder for WebpTranscoder {
    fn to_webp(&self, bytes: &[u8]) -> Result<Vec<u8>> {
        let decoded = image::load_from_memory(bytes)
            .map_err(|e| Error::Upstream(format!("Failed to decode image: {}", e)))?;
        let rgba = decoded.to_rgba8();

        let encoded = webp::Encoder::from_rgba(rgba.as_raw(), rgba.width(), rgba.height())
            .encode_simple(false, self.quality)
            .map_err(|e| Error::Upstream(format!("Failed to encode WebP: {:?}", e)))?;

        if encoded.is_empty() {
            return Err(Error::Upstream("WebP encoder produced no output".to_string()));
        }

        Ok(encoded.to_vec())
    }
}

/// File extension for a stored content type.
pub fn extension_for(content_type: &str) -> &'static str {
    match content_type {
        "image/jpeg" => "jpg",
        "image/png" => "png",
        "image/webp" => "webp",
        "image/gif" => "gif",
        "image/svg+xml" => "svg",
        _ => "bin",
    }
}

/// Collision-resistant object key: `{bucket}-{millis}-{token}.{ext}`.
pub fn object_key(bucket: &str, content_type: &str) -> String {
    let token = Uuid::new_v4().simple().to_string();
    format!(
        "{}-{}-{}.{}",
        bucket,
        Utc::now().timestamp_millis(),
        &token[..10],
        extension_for(content_type)
    )
}

/// Decode a base64 payload, accepting an optional `data:<mime>;base64,` prefix.
pub fn decode_payload(file: &str) -> Result<Vec<u8>> {
    let encoded = match file.strip_prefix("data:") {
        Some(rest) => rest
            .split_once(',')
            .map(|(_, data)| data)
            .ok_or_else(|| Error::InvalidEncoding("data URL has no payload".to_string()))?,
        None => file,
    };

    STANDARD
        .decode(encoded.trim())
        .map_err(|e| Error::InvalidEncoding(format!("file is not valid base64: {}", e)))
}

/// Stores client assets, optimizing images on the way.
pub struct UploadOptimizer {
    store: Arc<dyn ObjectStore>,
    transcoder: Arc<dyn ImageTranscoder>,
    cdn_url: Option<String>,
    max_bytes: usize,
}

impl UploadOptimizer {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        transcoder: Arc<dyn ImageTranscoder>,
        cdn_url: Option<String>,
        max_bytes: usize,
    ) -> Self {
        Self {
            store,
            transcoder,
            cdn_url,
            max_bytes,
        }
    }

    fn should_transcode(content_type: &str) -> bool {
        content_type.starts_with("image/") && content_type != WEBP_MIME
    }

    /// Pick the bytes and content type to store. Never fails.
    fn optimize(&self, bytes: Vec<u8>, content_type: &str) -> (Vec<u8>, String) {
        if !Self::should_transcode(content_type) {
            return (bytes, content_type.to_string());
        }

        match self.transcoder.to_webp(&bytes) {
            Ok(webp) => {
                info!(
                    "Converted {} ({} bytes) to WebP ({} bytes)",
                    content_type,
                    bytes.len(),
                    webp.len()
                );
                (webp, WEBP_MIME.to_string())
            }
            Err(e) => {
                warn!("Could not convert {} to WebP, keeping original: {}", content_type, e);
                (bytes, content_type.to_string())
            }
        }
    }

    /// Decode, optionally re-encode, store and return the public URL.
    pub async fn upload(&self, request: &UploadRequest) -> Result<UploadResult> {
        let bytes = decode_payload(&request.file)?;

        if bytes.len() > self.max_bytes {
            return Err(Error::PayloadTooLarge(format!(
                "file is {} bytes, the maximum is {} bytes",
                bytes.len(),
                self.max_bytes
            )));
        }

        let (bytes, content_type) = if request.optimize {
            self.optimize(bytes, &request.file_type)
        } else {
            (bytes, request.file_type.clone())
        };

        let key = object_key(&request.bucket, &content_type);
        self.store
            .put(&request.bucket, &key, bytes, &content_type)
            .await?;

        let public_url = self.store.public_url(&request.bucket, &key);
        let url = match &self.cdn_url {
            Some(cdn) => rewrite_to_cdn(&public_url, cdn)?,
            None => public_url,
        };

        info!("Stored {} as {} in {}", request.file_name, key, request.bucket);

        Ok(UploadResult {
            success: true,
            url,
            file_name: key,
        })
    }
}
