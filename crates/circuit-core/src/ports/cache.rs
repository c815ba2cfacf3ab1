//! Cache port
//!
//! Best-effort read-through cache for leaderboard queries. The store stays
//! authoritative; the cache may be invalidated or bypassed freely.

use async_trait::async_trait;
use std::time::Duration;

use crate::error::EngineResult;

#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> EngineResult<Option<serde_json::Value>>;
    async fn set(&self, key: &str, value: &serde_json::Value, ttl: Duration) -> EngineResult<()>;
    /// Drop every key starting with `prefix`; returns how many were removed.
    async fn delete_prefix(&self, prefix: &str) -> EngineResult<u64>;
}
