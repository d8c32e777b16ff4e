//! Shared library for the studio edge functions.
//!
//! This crate provides the request pipeline pieces used by every function
//! (rate limiting, validation, responses) and the business services behind
//! them (pricing, uploads).

pub mod config;
pub mod db;
pub mod error;
pub mod exchange;
pub mod http;
pub mod pricing;
pub mod rate_limit;
pub mod storage;
pub mod upload;
pub mod validation;

pub use config::{ExchangeConfig, PricingConfig, UploadConfig};
pub use db::{create_pool, PgProductStore, Product, ProductStore};
pub use error::{Error, Result};
pub use exchange::{ExchangeRateClient, ExchangeRates, RateProvider};
pub use pricing::{PricingCalculator, PricingQuote};
pub use rate_limit::{RateLimitConfig, RateLimitDecision, RateLimiter};
pub use storage::{ObjectStore, SupabaseStorage};
pub use upload::{UploadOptimizer, UploadResult, WebpTranscoder};
pub use validation::{validate_request, PricingRequest, UploadRequest};
