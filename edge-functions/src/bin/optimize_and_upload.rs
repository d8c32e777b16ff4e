//! Optimize and Upload Lambda - Stores studio assets in object storage.
//!
//! Endpoints:
//! - POST /optimize-and-upload - Upload a base64 file, converting images to WebP
//!
//! Each client address may call this 10 times per minute.

use lambda_http::http::Method;
use lambda_http::{run, service_fn, Body, Error, Request, Response};
use shared::http::{
    client_identifier, error_to_response, json_response, preflight_response, rate_limited_response,
};
use shared::{
    validate_request, RateLimitConfig, RateLimiter, SupabaseStorage, UploadConfig, UploadOptimizer,
    UploadRequest, UploadResult, WebpTranscoder,
};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

const RATE_LIMIT: RateLimitConfig = RateLimitConfig::per_minute(10);

type Loader = fn() -> shared::Result<UploadOptimizer>;

struct AppState {
    limiter: RateLimiter,
    optimizer: OnceCell<UploadOptimizer>,
    load: Loader,
}

impl AppState {
    fn new(load: Loader) -> Self {
        Self {
            limiter: RateLimiter::new(),
            optimizer: OnceCell::new(),
            load,
        }
    }

    async fn optimizer(&self) -> shared::Result<&UploadOptimizer> {
        self.optimizer
            .get_or_try_init(|| async { (self.load)() })
            .await
    }
}

fn load_optimizer() -> shared::Result<UploadOptimizer> {
    let config = UploadConfig::from_env()?;
    let storage = SupabaseStorage::new(&config)?;

    Ok(UploadOptimizer::new(
        Arc::new(storage),
        Arc::new(WebpTranscoder::default()),
        config.cdn_url.clone(),
        config.max_upload_bytes,
    ))
}

async fn store(state: &AppState, body: &[u8]) -> shared::Result<UploadResult> {
    let optimizer = state.optimizer().await?;
    let request: UploadRequest = validate_request(body)?;
    optimizer.upload(&request).await
}

async fn handler(state: Arc<AppState>, event: Request) -> Result<Response<Body>, Error> {
    if event.method() == Method::OPTIONS {
        return preflight_response();
    }

    state.limiter.sweep_expired();
    let client = client_identifier(event.headers());
    let decision = state.limiter.check(&client, &RATE_LIMIT);

    if !decision.allowed {
        warn!("Upload rate limit exceeded for {}", client);
        return rate_limited_response(&decision);
    }

    match store(&state, event.body()).await {
        Ok(result) => {
            info!("Upload from {} stored as {}", client, result.file_name);
            json_response(200, &result, Some(&decision))
        }
        Err(e) if e.is_client_error() => {
            warn!("Rejected upload from {}: {}", client, e);
            error_to_response(&e, Some(&decision))
        }
        Err(e) => {
            error!("Upload failed: {}", e);
            error_to_response(&e, Some(&decision))
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .init();

    let state = Arc::new(AppState::new(load_optimizer));

    run(service_fn(move |event| {
        let state = Arc::clone(&state);
        async move { handler(state, event).await }
    }))
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use lambda_http::http::HeaderValue;
    use shared::{Error as AppError, ObjectStore};
    use std::sync::Mutex;

    const PIXEL_PNG: &str =
        "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNk+M9QDwADhgGAWjR9awAAAABJRU5ErkJggg==";

    static STORED: Mutex<Vec<String>> = Mutex::new(Vec::new());

    struct MemoryStore;

    #[async_trait]
    impl ObjectStore for MemoryStore {
        async fn put(&self, _bucket: &str, key: &str, _bytes: Vec<u8>, _content_type: &str) -> shared::Result<()> {
            STORED.lock().unwrap().push(key.to_string());
            Ok(())
        }

        fn public_url(&self, bucket: &str, key: &str) -> String {
            format!("https://abc.supabase.co/storage/v1/object/public/{}/{}", bucket, key)
        }
    }

    fn memory_optimizer() -> shared::Result<UploadOptimizer> {
        Ok(UploadOptimizer::new(
            Arc::new(MemoryStore),
            Arc::new(WebpTranscoder::default()),
            None,
            1024 * 1024,
        ))
    }

    fn missing_storage() -> shared::Result<UploadOptimizer> {
        Err(AppError::Config("SUPABASE_SERVICE_ROLE_KEY not set".to_string()))
    }

    fn post(body: &str, client: &str) -> Request {
        let mut request = Request::new(Body::from(body.to_string()));
        *request.method_mut() = Method::POST;
        request
            .headers_mut()
            .insert("x-forwarded-for", HeaderValue::from_str(client).unwrap());
        request
    }

    fn upload_body(bucket: &str, file_type: &str) -> String {
        serde_json::json!({
            "file": PIXEL_PNG,
            "fileName": "pixel.png",
            "fileType": file_type,
            "bucket": bucket,
        })
        .to_string()
    }

    fn json(response: &Response<Body>) -> serde_json::Value {
        serde_json::from_slice(response.body().as_ref()).unwrap()
    }

    #[tokio::test]
    async fn test_upload_returns_public_url() {
        let state = Arc::new(AppState::new(memory_optimizer));

        let response = handler(state, post(&upload_body("product-images", "image/png"), "203.0.113.9"))
            .await
            .unwrap();

        assert_eq!(response.status(), 200);
        assert_eq!(response.headers()["X-RateLimit-Limit"], "10");
        let body = json(&response);
        assert_eq!(body["success"], true);
        let file_name = body["fileName"].as_str().unwrap();
        assert!(file_name.ends_with(".webp"));
        assert!(body["url"].as_str().unwrap().ends_with(file_name));
        assert!(STORED.lock().unwrap().iter().any(|key| key == file_name));
    }

    #[tokio::test]
    async fn test_unknown_bucket_rejected() {
        let state = Arc::new(AppState::new(memory_optimizer));

        let response = handler(state, post(&upload_body("secrets", "image/png"), "203.0.113.9"))
            .await
            .unwrap();

        assert_eq!(response.status(), 400);
        assert!(json(&response)["error"].as_str().unwrap().contains("bucket"));
    }

    #[tokio::test]
    async fn test_disallowed_file_type_rejected() {
        let state = Arc::new(AppState::new(memory_optimizer));

        let response = handler(
            state,
            post(&upload_body("general-assets", "application/x-msdownload"), "203.0.113.9"),
        )
        .await
        .unwrap();

        assert_eq!(response.status(), 400);
        assert!(json(&response)["error"].as_str().unwrap().contains("file type is not allowed"));
    }

    #[tokio::test]
    async fn test_missing_storage_config_is_500() {
        let state = Arc::new(AppState::new(missing_storage));

        let response = handler(state, post(&upload_body("product-images", "image/png"), "203.0.113.9"))
            .await
            .unwrap();

        assert_eq!(response.status(), 500);
    }

    #[tokio::test]
    async fn test_eleventh_upload_is_throttled() {
        let state = Arc::new(AppState::new(missing_storage));
        let body = upload_body("product-images", "image/png");

        for _ in 0..10 {
            let response = handler(Arc::clone(&state), post(&body, "198.51.100.20")).await.unwrap();
            assert_ne!(response.status(), 429);
        }

        let throttled = handler(state, post(&body, "198.51.100.20")).await.unwrap();
        assert_eq!(throttled.status(), 429);
        assert_eq!(throttled.headers()["X-RateLimit-Remaining"], "0");
    }
}
