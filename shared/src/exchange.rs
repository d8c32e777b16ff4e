//! Live exchange rates from exchangerate-api.com.
//!
//! Rates are fetched on every call. There is no cache: a quote is always
//! priced against the provider's latest table.

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

use crate::config::ExchangeConfig;
use crate::{Error, Result};

/// Latest rate table for one base currency.
#[derive(Debug, Clone, Deserialize)]
pub struct ExchangeRates {
    #[serde(alias = "conversion_rates")]
    pub rates: HashMap<String, f64>,
    #[serde(alias = "base_code", default)]
    pub base: String,
    #[serde(alias = "time_last_update_utc", default)]
    pub date: String,
}

impl ExchangeRates {
    /// Rate for `target`, or [`Error::UnsupportedCurrency`] when the table lacks it.
    pub fn rate_for(&self, target: &str) -> Result<f64> {
        match self.rates.get(target) {
            Some(rate) if *rate > 0.0 => Ok(*rate),
            _ => Err(Error::UnsupportedCurrency(target.to_string())),
        }
    }
}

/// Source of exchange-rate tables.
#[async_trait]
pub trait RateProvider: Send + Sync {
    /// Fetch the latest rates quoted against `base`.
    async fn latest(&self, base: &str) -> Result<ExchangeRates>;
}

/// HTTP client for the v6 exchangerate-api.
pub struct ExchangeRateClient {
    http: reqwest::Client,
    api_url: String,
    api_key: String,
}

impl ExchangeRateClient {
    pub fn new(config: &ExchangeConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| Error::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }
}

#[async_trait]
impl RateProvider for ExchangeRateClient {
    async fn latest(&self, base: &str) -> Result<ExchangeRates> {
        let url = format!("{}/{}/latest/{}", self.api_url, self.api_key, base);
        debug!("Fetching exchange rates for {}", base);

        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::Upstream(format!("Failed to fetch exchange rate: {}", e)))?;

        if !response.status().is_success() {
            return Err(Error::Upstream(format!(
                "Failed to fetch exchange rate: {}",
                response.status()
            )));
        }

        response
            .json::<ExchangeRates>()
            .await
            .map_err(|e| Error::Upstream(format!("Invalid exchange rate response: {}", e)))
    }
}
