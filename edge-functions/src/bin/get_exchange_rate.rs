//! Get Exchange Rate Lambda - Live conversion rate between two currencies.
//!
//! Endpoints:
//! - GET /get-exchange-rate?base=USD&target=COP
//! - POST /get-exchange-rate - `{"base": "USD", "target": "COP"}`
//!
//! Query parameters win over the body. Defaults to USD -> COP.
//! Each client address may call this 60 times per minute.

use chrono::{DateTime, Utc};
use lambda_http::http::Method;
use lambda_http::{run, service_fn, Body, Error, Request, RequestExt, Response};
use serde::{Deserialize, Serialize};
use shared::http::{
    client_identifier, error_to_response, json_response, preflight_response, rate_limited_response,
};
use shared::validation::describe_errors;
use shared::{
    ExchangeConfig, ExchangeRateClient, RateLimitConfig, RateLimiter, RateProvider,
};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;
use validator::Validate;

const RATE_LIMIT: RateLimitConfig = RateLimitConfig::per_minute(60);

const DEFAULT_BASE: &str = "USD";
const DEFAULT_TARGET: &str = "COP";

type Loader = fn() -> shared::Result<Arc<dyn RateProvider>>;

/// Currency pair as sent by the caller.
#[derive(Debug, Default, Deserialize, Validate)]
struct CurrencyPair {
    #[validate(length(equal = 3, message = "must be a 3-letter currency code"))]
    base: Option<String>,
    #[validate(length(equal = 3, message = "must be a 3-letter currency code"))]
    target: Option<String>,
}

impl CurrencyPair {
    /// Overlay `other` on top of `self`, keeping values `other` lacks.
    fn merge(self, other: CurrencyPair) -> Self {
        Self {
            base: other.base.or(self.base),
            target: other.target.or(self.target),
        }
    }
}

#[derive(Debug, Serialize)]
struct ExchangeRateQuote {
    base_currency: String,
    target_currency: String,
    exchange_rate: f64,
    date: String,
    calculated_at: DateTime<Utc>,
}

struct AppState {
    limiter: RateLimiter,
    rates: OnceCell<Arc<dyn RateProvider>>,
    load: Loader,
}

impl AppState {
    fn new(load: Loader) -> Self {
        Self {
            limiter: RateLimiter::new(),
            rates: OnceCell::new(),
            load,
        }
    }

    async fn rates(&self) -> shared::Result<&Arc<dyn RateProvider>> {
        self.rates.get_or_try_init(|| async { (self.load)() }).await
    }
}

fn load_rates() -> shared::Result<Arc<dyn RateProvider>> {
    let config = ExchangeConfig::from_env()?;
    Ok(Arc::new(ExchangeRateClient::new(&config)?))
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Read the pair from the body and query string. An unreadable body is ignored.
fn requested_pair(event: &Request) -> shared::Result<CurrencyPair> {
    let from_body = if event.body().is_empty() {
        CurrencyPair::default()
    } else {
        match serde_json::from_slice::<CurrencyPair>(event.body()) {
            Ok(pair) => pair,
            Err(e) => {
                debug!("Ignoring unreadable body: {}", e);
                CurrencyPair::default()
            }
        }
    };

    let params = event.query_string_parameters();
    let from_query = CurrencyPair {
        base: non_blank(params.first("base")),
        target: non_blank(params.first("target")),
    };

    let pair = from_body.merge(from_query);
    pair.validate()
        .map_err(|errors| shared::Error::Validation(describe_errors(&errors)))?;

    Ok(pair)
}

async fn lookup(state: &AppState, event: &Request) -> shared::Result<ExchangeRateQuote> {
    let rates = state.rates().await?;
    let pair = requested_pair(event)?;

    let base = pair.base.as_deref().unwrap_or(DEFAULT_BASE).to_uppercase();
    let target = pair.target.as_deref().unwrap_or(DEFAULT_TARGET).to_uppercase();

    let table = rates.latest(&base).await?;
    let exchange_rate = table.rate_for(&target)?;

    Ok(ExchangeRateQuote {
        base_currency: base,
        target_currency: target,
        exchange_rate,
        date: table.date,
        calculated_at: Utc::now(),
    })
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

    match lookup(&state, &event).await {
        Ok(quote) => {
            info!(
                "{} -> {} = {}",
                quote.base_currency, quote.target_currency, quote.exchange_rate
            );
            json_response(200, &quote, Some(&decision))
        }
        Err(e) if e.is_client_error() => {
            warn!("Rejected exchange rate request from {}: {}", client, e);
            error_to_response(&e, Some(&decision))
        }
        Err(e) => {
            error!("Exchange rate lookup failed: {}", e);
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

    let state = Arc::new(AppState::new(load_rates));

    run(service_fn(move |event| {
        let state = Arc::clone(&state);
        async move { handler(state, event).await }
    }))
    .await
}
