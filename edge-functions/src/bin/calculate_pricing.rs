//! Calculate Pricing Lambda - Quotes a product in the caller's currency.
//!
//! Endpoints:
//! - POST /calculate-pricing - Price `quantity` units of a product
//!
//! Each client address may call this 20 times per minute.

use lambda_http::http::Method;
use lambda_http::{run, service_fn, Body, Error, Request, Response};
use shared::http::{
    client_identifier, error_to_response, json_response, preflight_response, rate_limited_response,
};
use shared::{
    create_pool, validate_request, ExchangeRateClient, PgProductStore, PricingCalculator,
    PricingConfig, PricingQuote, PricingRequest, RateLimitConfig, RateLimiter,
};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

const RATE_LIMIT: RateLimitConfig = RateLimitConfig::per_minute(20);

type Loader = fn() -> shared::Result<PricingCalculator>;

/// Application state shared across invocations of a warm instance.
struct AppState {
    limiter: RateLimiter,
    calculator: OnceCell<PricingCalculator>,
    load: Loader,
}

impl AppState {
    fn new(load: Loader) -> Self {
        Self {
            limiter: RateLimiter::new(),
            calculator: OnceCell::new(),
            load,
        }
    }

    /// Build the calculator on first use; a missing secret fails this request only.
    async fn calculator(&self) -> shared::Result<&PricingCalculator> {
        self.calculator
            .get_or_try_init(|| async { (self.load)() })
            .await
    }
}

fn load_calculator() -> shared::Result<PricingCalculator> {
    let config = PricingConfig::from_env()?;
    let pool = create_pool(&config.database_url)?;
    let rates = ExchangeRateClient::new(&config.exchange)?;

    Ok(PricingCalculator::new(
        Arc::new(PgProductStore::new(pool)),
        Arc::new(rates),
    ))
}

async fn quote(state: &AppState, body: &[u8]) -> shared::Result<PricingQuote> {
    let calculator = state.calculator().await?;
    let request: PricingRequest = validate_request(body)?;
    calculator.price(&request).await
}

async fn handler(state: Arc<AppState>, event: Request) -> Result<Response<Body>, Error> {
    if event.method() == Method::OPTIONS {
        return preflight_response();
    }

    state.limiter.sweep_expired();
    let client = client_identifier(event.headers());
    let decision = state.limiter.check(&client, &RATE_LIMIT);

    if !decision.allowed {
        warn!("Rate limit exceeded for {}", client);
        return rate_limited_response(&decision);
    }

    match quote(&state, event.body()).await {
        Ok(quote) => {
            info!("Quoted {} for {}", quote.product_id, client);
            json_response(200, &quote, Some(&decision))
        }
        Err(e) if e.is_client_error() => {
            warn!("Rejected pricing request from {}: {}", client, e);
            error_to_response(&e, Some(&decision))
        }
        Err(e) => {
            error!("Pricing failed: {}", e);
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

    let state = Arc::new(AppState::new(load_calculator));

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
    use shared::{Error as AppError, ExchangeRates, Product, ProductStore, RateProvider};
    use std::collections::HashMap;
    use uuid::Uuid;

    const PRODUCT_ID: &str = "6f1c1f1e-8d7a-4a53-9a51-3f0b0e8f9c11";

    struct Catalogue;

    #[async_trait]
    impl ProductStore for Catalogue {
        async fn find_product(&self, id: Uuid) -> shared::Result<Option<Product>> {
            Ok((id.to_string() == PRODUCT_ID).then(|| Product {
                id,
                title: "Brand kit".to_string(),
                base_price_usd: 100.0,
            }))
        }
    }

    struct FixedRates;

    #[async_trait]
    impl RateProvider for FixedRates {
        async fn latest(&self, base: &str) -> shared::Result<ExchangeRates> {
            Ok(ExchangeRates {
                rates: HashMap::from([("COP".to_string(), 4000.0)]),
                base: base.to_string(),
                date: "2026-03-27".to_string(),
            })
        }
    }

    fn working_calculator() -> shared::Result<PricingCalculator> {
        Ok(PricingCalculator::new(Arc::new(Catalogue), Arc::new(FixedRates)))
    }

    fn missing_secret() -> shared::Result<PricingCalculator> {
        Err(AppError::Config("EXCHANGERATE_API_KEY not set".to_string()))
    }

    fn post(body: &str, client: &str) -> Request {
        let mut request = Request::new(Body::from(body.to_string()));
        *request.method_mut() = Method::POST;
        request
            .headers_mut()
            .insert("x-forwarded-for", HeaderValue::from_str(client).unwrap());
        request
    }

    fn json(response: &Response<Body>) -> serde_json::Value {
        serde_json::from_slice(response.body().as_ref()).unwrap()
    }

    #[tokio::test]
    async fn test_quote_with_rate_limit_headers() {
        let state = Arc::new(AppState::new(working_calculator));
        let body = format!(
            r#"{{"product_id":"{}","target_currency":"COP","region":"Colombia","quantity":2}}"#,
            PRODUCT_ID
        );

        let response = handler(state, post(&body, "203.0.113.7")).await.unwrap();

        assert_eq!(response.status(), 200);
        assert_eq!(response.headers()["X-RateLimit-Limit"], "20");
        assert_eq!(response.headers()["X-RateLimit-Remaining"], "19");
        assert!(response.headers().contains_key("X-RateLimit-Reset"));
        let quote = json(&response);
        assert_eq!(quote["final_price"], 800000.0);
        assert_eq!(quote["region"], "Colombia");
    }

    #[tokio::test]
    async fn test_unsupported_currency_is_400() {
        let state = Arc::new(AppState::new(working_calculator));
        let body = format!(r#"{{"product_id":"{}","target_currency":"JPY"}}"#, PRODUCT_ID);

        let response = handler(state, post(&body, "203.0.113.7")).await.unwrap();

        assert_eq!(response.status(), 400);
        assert!(json(&response)["error"].as_str().unwrap().contains("JPY"));
    }

    #[tokio::test]
    async fn test_validation_errors_name_every_field() {
        let state = Arc::new(AppState::new(working_calculator));

        let response = handler(
            state,
            post(r#"{"product_id":"nope","target_currency":"COPX"}"#, "203.0.113.7"),
        )
        .await
        .unwrap();

        assert_eq!(response.status(), 400);
        let message = json(&response)["error"].as_str().unwrap().to_string();
        assert!(message.contains("product_id"), "{}", message);
        assert!(message.contains("target_currency"), "{}", message);
        assert_eq!(response.headers()["X-RateLimit-Remaining"], "19");
    }

    #[tokio::test]
    async fn test_missing_field_reported_with_bad_product_id() {
        let state = Arc::new(AppState::new(working_calculator));

        let response = handler(
            state,
            post(r#"{"product_id":"nope","quantity":"two"}"#, "203.0.113.7"),
        )
        .await
        .unwrap();

        assert_eq!(response.status(), 400);
        let message = json(&response)["error"].as_str().unwrap().to_string();
        assert!(message.contains("product_id: must be a valid UUID"), "{}", message);
        assert!(message.contains("target_currency: is required"), "{}", message);
        assert!(message.contains("quantity: must be a whole number"), "{}", message);
    }

    #[tokio::test]
    async fn test_unknown_product_is_404() {
        let state = Arc::new(AppState::new(working_calculator));
        let body = r#"{"product_id":"00000000-0000-4000-8000-000000000000","target_currency":"COP"}"#;

        let response = handler(state, post(body, "203.0.113.7")).await.unwrap();
        assert_eq!(response.status(), 404);
    }

    #[tokio::test]
    async fn test_missing_configuration_is_500() {
        let state = Arc::new(AppState::new(missing_secret));
        let body = format!(r#"{{"product_id":"{}","target_currency":"COP"}}"#, PRODUCT_ID);

        let response = handler(state, post(&body, "203.0.113.7")).await.unwrap();

        assert_eq!(response.status(), 500);
        assert!(json(&response)["error"]
            .as_str()
            .unwrap()
            .contains("EXCHANGERATE_API_KEY"));
    }

    #[tokio::test]
    async fn test_twenty_first_request_is_throttled() {
        let state = Arc::new(AppState::new(working_calculator));
        let body = format!(r#"{{"product_id":"{}","target_currency":"COP"}}"#, PRODUCT_ID);

        for _ in 0..20 {
            let response = handler(Arc::clone(&state), post(&body, "198.51.100.1")).await.unwrap();
            assert_eq!(response.status(), 200);
        }

        let throttled = handler(Arc::clone(&state), post(&body, "198.51.100.1")).await.unwrap();
        assert_eq!(throttled.status(), 429);
        assert!(throttled.headers().contains_key("Retry-After"));

        let other = handler(state, post(&body, "198.51.100.2")).await.unwrap();
        assert_eq!(other.status(), 200);
    }

    #[tokio::test]
    async fn test_preflight_skips_rate_limit() {
        let state = Arc::new(AppState::new(missing_secret));
        let mut request = post("", "203.0.113.7");
        *request.method_mut() = Method::OPTIONS;

        let response = handler(Arc::clone(&state), request).await.unwrap();

        assert_eq!(response.status(), 200);
        assert!(state.limiter.is_empty());
    }
}
