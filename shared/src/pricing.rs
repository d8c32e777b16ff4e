//! Product pricing in the caller's currency.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::db::ProductStore;
use crate::exchange::RateProvider;
use crate::validation::PricingRequest;
use crate::{Error, Result};

/// Region keywords and the multiplier applied to the USD base price.
/// The first matching entry wins; unknown regions pay the base price.
const REGION_MULTIPLIERS: &[(&[&str], f64)] = &[
    (&["colombia", "co"], 1.0),
    (&["united states", "usa", "us"], 1.5),
];

/// A computed price quote. Never persisted.
#[derive(Debug, Clone, Serialize)]
pub struct PricingQuote {
    pub product_id: Uuid,
    pub product_title: String,
    pub base_price_usd: f64,
    pub adjusted_base_price: f64,
    pub exchange_rate: f64,
    pub target_currency: String,
    pub quantity: i64,
    pub final_price: f64,
    pub region: String,
    pub calculated_at: DateTime<Utc>,
}

/// Round half-up to two decimals.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Multiplier for a free-form region name.
///
/// Multi-word keywords match as substrings, short codes only as whole words
/// so that e.g. "Mexico" does not match "co".
pub fn region_multiplier(region: Option<&str>) -> f64 {
    let Some(region) = region else {
        return 1.0;
    };
    let region = region.to_lowercase();
    let words: Vec<&str> = region
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();

    REGION_MULTIPLIERS
        .iter()
        .find(|(keywords, _)| {
            keywords.iter().any(|keyword| {
                if keyword.len() <= 3 {
                    words.contains(keyword)
                } else {
                    region.contains(keyword)
                }
            })
        })
        .map(|(_, multiplier)| *multiplier)
        .unwrap_or(1.0)
}

/// Prices products against live exchange rates.
pub struct PricingCalculator {
    products: Arc<dyn ProductStore>,
    rates: Arc<dyn RateProvider>,
}

impl PricingCalculator {
    pub fn new(products: Arc<dyn ProductStore>, rates: Arc<dyn RateProvider>) -> Self {
        Self { products, rates }
    }

    /// Quote `request.quantity` units of a product in the target currency.
    pub async fn price(&self, request: &PricingRequest) -> Result<PricingQuote> {
        let product_id = request.product_uuid()?;
        let base_currency = request.base_currency.to_ascii_uppercase();
        let target_currency = request.target_currency.to_ascii_uppercase();

        let product = self
            .products
            .find_product(product_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Product {} not found", product_id)))?;

        let rates = self.rates.latest(&base_currency).await?;
        let exchange_rate = rates.rate_for(&target_currency)?;

        let adjusted_base_price = product.base_price_usd * region_multiplier(request.region.as_deref());
        let final_price = round2(adjusted_base_price * exchange_rate * request.quantity as f64);

        info!(
            "Priced {} x{} at {} {}",
            product_id, request.quantity, final_price, target_currency
        );

        Ok(PricingQuote {
            product_id,
            product_title: product.title,
            base_price_usd: product.base_price_usd,
            adjusted_base_price,
            exchange_rate,
            target_currency,
            quantity: request.quantity,
            final_price,
            region: request
                .region
                .clone()
                .unwrap_or_else(|| "default".to_string()),
            calculated_at: Utc::now(),
        })
    }
}
