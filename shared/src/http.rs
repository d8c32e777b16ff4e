//! HTTP helpers for edge functions.
//!
//! Every response carries CORS headers and, once a caller has been checked
//! against the rate limiter, the `X-RateLimit-*` headers for that decision.

use chrono::{SecondsFormat, Utc};
use lambda_http::http::HeaderMap;
use lambda_http::{Body, Response};
use serde::Serialize;

use crate::rate_limit::RateLimitDecision;
use crate::Error;

pub const CORS_ALLOW_ORIGIN: &str = "*";
pub const CORS_ALLOW_HEADERS: &str = "authorization, x-client-info, apikey, content-type";

/// Identifier used when no client address header is present.
pub const UNKNOWN_CLIENT: &str = "unknown";

/// Standard error body.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(rename = "retryAfter", skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
}

impl ApiResponse<()> {
    pub fn error(message: impl Into<String>) -> Self {
        ApiResponse {
            success: false,
            data: None,
            error: Some(message.into()),
            retry_after: None,
        }
    }
}

/// Rate-limit key for a request: first `x-forwarded-for` hop, then
/// `x-real-ip`, then [`UNKNOWN_CLIENT`].
pub fn client_identifier(headers: &HeaderMap) -> String {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };

    if let Some(forwarded) = header("x-forwarded-for") {
        if let Some(first) = forwarded.split(',').map(str::trim).find(|s| !s.is_empty()) {
            return first.to_string();
        }
    }

    header("x-real-ip")
        .map(String::from)
        .unwrap_or_else(|| UNKNOWN_CLIENT.to_string())
}

fn base_builder(status: u16, rate_limit: Option<&RateLimitDecision>) -> lambda_http::http::response::Builder {
    let mut builder = Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .header("Access-Control-Allow-Origin", CORS_ALLOW_ORIGIN)
        .header("Access-Control-Allow-Headers", CORS_ALLOW_HEADERS);

    if let Some(decision) = rate_limit {
        builder = builder
            .header("X-RateLimit-Limit", decision.limit.to_string())
            .header("X-RateLimit-Remaining", decision.remaining.to_string())
            .header(
                "X-RateLimit-Reset",
                decision.reset_at.to_rfc3339_opts(SecondsFormat::Millis, true),
            );
    }

    builder
}

/// Create a JSON response with the given status code and data.
pub fn json_response<T: Serialize>(
    status: u16,
    data: &T,
    rate_limit: Option<&RateLimitDecision>,
) -> Result<Response<Body>, lambda_http::Error> {
    let json = serde_json::to_string(data)?;
    Ok(base_builder(status, rate_limit).body(Body::from(json))?)
}

/// Create an error response with the given status code and message.
pub fn error_response(
    status: u16,
    message: impl Into<String>,
    rate_limit: Option<&RateLimitDecision>,
) -> Result<Response<Body>, lambda_http::Error> {
    json_response(status, &ApiResponse::error(message), rate_limit)
}

/// Map a domain error onto its status code and message.
pub fn error_to_response(
    error: &Error,
    rate_limit: Option<&RateLimitDecision>,
) -> Result<Response<Body>, lambda_http::Error> {
    error_response(error.status_code(), error.to_string(), rate_limit)
}

/// 429 with `Retry-After` for a denied decision.
pub fn rate_limited_response(decision: &RateLimitDecision) -> Result<Response<Body>, lambda_http::Error> {
    let retry_after = decision.retry_after_secs(Utc::now());
    let error = Error::RateLimited {
        retry_after_secs: retry_after,
    };
    let body = ApiResponse {
        retry_after: Some(retry_after),
        ..ApiResponse::error(error.to_string())
    };

    let json = serde_json::to_string(&body)?;
    Ok(base_builder(error.status_code(), Some(decision))
        .header("Retry-After", retry_after.to_string())
        .body(Body::from(json))?)
}

/// Answer a CORS preflight.
pub fn preflight_response() -> Result<Response<Body>, lambda_http::Error> {
    Ok(Response::builder()
        .status(200)
        .header("Access-Control-Allow-Origin", CORS_ALLOW_ORIGIN)
        .header("Access-Control-Allow-Headers", CORS_ALLOW_HEADERS)
        .body(Body::from("ok"))?)
}
