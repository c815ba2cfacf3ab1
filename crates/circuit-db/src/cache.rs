//! Redis cache adapter
//!
//! Implements the leaderboard cache port. Prefix invalidation walks the
//! keyspace with SCAN so a large leaderboard flush never blocks Redis.

use async_trait::async_trait;
use redis::AsyncCommands;
use std::time::Duration;

use circuit_core::{CacheStore, EngineResult};

use crate::DbError;

pub struct RedisCache {
    redis: redis::aio::ConnectionManager,
}

impl RedisCache {
    pub fn new(redis: redis::aio::ConnectionManager) -> Self {
        Self { redis }
    }
}

#[async_trait]
impl CacheStore for RedisCache {
    async fn get(&self, key: &str) -> EngineResult<Option<serde_json::Value>> {
        let mut conn = self.redis.clone();
        let value: Option<String> = conn.get(key).await.map_err(DbError::from)?;
        match value {
            Some(json) => {
                let parsed = serde_json::from_str(&json)
                    .map_err(|e| DbError::Serialization(e.to_string()))?;
                Ok(Some(parsed))
            }
            None => Ok(None),
        }
    }

    async fn set(
        &self,
        key: &str,
        value: &serde_json::Value,
        ttl: Duration,
    ) -> EngineResult<()> {
        let mut conn = self.redis.clone();
        let json =
            serde_json::to_string(value).map_err(|e| DbError::Serialization(e.to_string()))?;
        conn.set_ex::<_, _, ()>(key, json, ttl.as_secs().max(1))
            .await
            .map_err(DbError::from)?;
        Ok(())
    }

    async fn delete_prefix(&self, prefix: &str) -> EngineResult<u64> {
        let mut conn = self.redis.clone();
        let pattern = format!("{}*", prefix);
        let mut cursor: u64 = 0;
        let mut removed: u64 = 0;

        loop {
            let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(100)
                .query_async(&mut conn)
                .await
                .map_err(DbError::from)?;

            if !keys.is_empty() {
                let deleted: u64 = conn.del(keys).await.map_err(DbError::from)?;
                removed += deleted;
            }
            cursor = next;
            if cursor == 0 {
                break;
            }
        }
        Ok(removed)
    }
}
