//! Configuration management for edge functions.
//!
//! Every function resolves its settings from the process environment when a
//! request needs them. Missing secrets surface as [`Error::Config`] so the
//! handler can answer with a 500 instead of guessing a value.

use std::env;

use crate::{Error, Result};

/// Default exchange-rate API root (key and base currency are appended).
pub const DEFAULT_EXCHANGE_API_URL: &str = "https://v6.exchangerate-api.com/v6";

/// Default upload ceiling for image assets.
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

fn process_env(name: &str) -> Option<String> {
    env::var(name).ok()
}

fn required(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Result<String> {
    lookup(name)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| Error::Config(format!("{} not set", name)))
}

fn optional(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Option<String> {
    lookup(name)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Exchange-rate provider settings.
#[derive(Debug, Clone)]
pub struct ExchangeConfig {
    /// exchangerate-api.com key
    pub api_key: String,
    /// API root, overridable for staging
    pub api_url: String,
}

impl ExchangeConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(process_env)
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        Ok(Self {
            api_key: required(&lookup, "EXCHANGERATE_API_KEY")?,
            api_url: optional(&lookup, "EXCHANGERATE_API_URL")
                .unwrap_or_else(|| DEFAULT_EXCHANGE_API_URL.to_string()),
        })
    }
}

/// Settings for the calculate-pricing function.
#[derive(Debug, Clone)]
pub struct PricingConfig {
    /// Postgres connection string for the product catalogue
    pub database_url: String,
    /// Exchange-rate provider
    pub exchange: ExchangeConfig,
}

impl PricingConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(process_env)
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        Ok(Self {
            database_url: required(&lookup, "DATABASE_URL")?,
            exchange: ExchangeConfig::from_lookup(&lookup)?,
        })
    }
}

/// Settings for the optimize-and-upload function.
#[derive(Debug, Clone)]
pub struct UploadConfig {
    /// Supabase project URL
    pub supabase_url: String,
    /// Service role key used for storage writes
    pub service_role_key: String,
    /// Optional CDN origin that replaces the storage host in public URLs
    pub cdn_url: Option<String>,
    /// Ceiling for the decoded payload
    pub max_upload_bytes: usize,
}

impl UploadConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(process_env)
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let max_upload_bytes = match optional(&lookup, "MAX_UPLOAD_BYTES") {
            Some(raw) => raw
                .parse()
                .map_err(|_| Error::Config(format!("MAX_UPLOAD_BYTES is not a number: {}", raw)))?,
            None => DEFAULT_MAX_UPLOAD_BYTES,
        };

        Ok(Self {
            supabase_url: required(&lookup, "SUPABASE_URL")?,
            service_role_key: required(&lookup, "SUPABASE_SERVICE_ROLE_KEY")?,
            cdn_url: optional(&lookup, "CDN_URL"),
            max_upload_bytes,
        })
    }
}
