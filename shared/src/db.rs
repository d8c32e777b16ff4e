//! Product catalogue access.

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use uuid::Uuid;

use crate::{Error, Result};

/// Catalogue fields needed to price a product.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct Product {
    pub id: Uuid,
    pub title: String,
    pub base_price_usd: f64,
}

/// Lookup of products by id.
#[async_trait]
pub trait ProductStore: Send + Sync {
    async fn find_product(&self, id: Uuid) -> Result<Option<Product>>;
}

/// Create a database connection pool.
///
/// The pool connects lazily, so a cold start performs no I/O until the first
/// product lookup.
pub fn create_pool(database_url: &str) -> Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(5)
        .acquire_timeout(Duration::from_secs(3))
        .connect_lazy(database_url)
        .map_err(|e| Error::Config(format!("Invalid DATABASE_URL: {}", e)))
}

/// Postgres-backed product store.
pub struct PgProductStore {
    pool: PgPool,
}

impl PgProductStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProductStore for PgProductStore {
    async fn find_product(&self, id: Uuid) -> Result<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(
            "SELECT id, title, base_price_usd::float8 AS base_price_usd FROM products WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(product)
    }
}
