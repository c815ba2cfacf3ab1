//! Database connection pool management

use redis::aio::ConnectionManager;
use sqlx::postgres::{PgPool, PgPoolOptions};

use crate::{DbConfig, DbError, Result};

/// Combined pool: PostgreSQL for persistence, Redis for caching.
#[derive(Clone)]
pub struct DatabasePool {
    pub pg: PgPool,
    pub redis: ConnectionManager,
}

impl DatabasePool {
    pub fn postgres(&self) -> &PgPool {
        &self.pg
    }

    pub fn redis(&self) -> &ConnectionManager {
        &self.redis
    }
}

/// Create a new database pool.
pub async fn create_pool(config: &DbConfig) -> Result<DatabasePool> {
    let pg = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(config.connect_timeout)
        .idle_timeout(Some(config.idle_timeout))
        .max_lifetime(Some(config.max_lifetime))
        .connect(&config.url)
        .await
        .map_err(|e| DbError::Connection(e.to_string()))?;

    let redis_client = redis::Client::open(config.redis_url.as_str())
        .map_err(|e| DbError::Connection(e.to_string()))?;
    let redis = ConnectionManager::new(redis_client)
        .await
        .map_err(|e| DbError::Connection(e.to_string()))?;

    Ok(DatabasePool { pg, redis })
}
