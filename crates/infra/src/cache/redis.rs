//! Redis-backed cache store (optional).
//!
//! Entries are JSON strings with a per-tier expiry (`SET ... EX`). Prefix
//! invalidation walks the keyspace with `SCAN` so it never blocks the server
//! the way `KEYS` would.

use async_trait::async_trait;
use redis::AsyncCommands;
use serde_json::Value as JsonValue;

use stockroom_core::TenantId;

use super::{CacheError, CacheKey, CacheStore, CacheTier};

/// Redis cache store for JSON projections.
#[derive(Debug, Clone)]
pub struct RedisCacheStore {
    client: redis::Client,
}

impl RedisCacheStore {
    pub fn new(redis_url: impl AsRef<str>) -> Result<Self, CacheError> {
        let client = redis::Client::open(redis_url.as_ref())
            .map_err(|e| CacheError::Backend(e.to_string()))?;
        Ok(Self { client })
    }

    async fn connection(&self) -> Result<redis::aio::MultiplexedConnection, CacheError> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| CacheError::Backend(e.to_string()))
    }

    async fn delete_matching(&self, pattern: &str) -> Result<(), CacheError> {
        let mut conn = self.connection().await?;
        let mut cursor: u64 = 0;

        loop {
            let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(100)
                .query_async(&mut conn)
                .await
                .map_err(|e| CacheError::Backend(e.to_string()))?;

            if !keys.is_empty() {
                let _: i64 = conn
                    .del(keys)
                    .await
                    .map_err(|e| CacheError::Backend(e.to_string()))?;
            }

            if next == 0 {
                break;
            }
            cursor = next;
        }

        Ok(())
    }
}

#[async_trait]
impl CacheStore for RedisCacheStore {
    async fn get(&self, key: &CacheKey) -> Result<Option<JsonValue>, CacheError> {
        let mut conn = self.connection().await?;
        let payload: Option<String> = conn
            .get(key.as_str())
            .await
            .map_err(|e| CacheError::Backend(e.to_string()))?;

        match payload {
            Some(payload) => serde_json::from_str(&payload)
                .map(Some)
                .map_err(|e| CacheError::Serialize(e.to_string())),
            None => Ok(None),
        }
    }

    async fn set(
        &self,
        key: &CacheKey,
        value: JsonValue,
        tier: CacheTier,
    ) -> Result<(), CacheError> {
        let payload =
            serde_json::to_string(&value).map_err(|e| CacheError::Serialize(e.to_string()))?;

        let mut conn = self.connection().await?;
        let _: () = conn
            .set_ex(key.as_str(), payload, tier.ttl().as_secs())
            .await
            .map_err(|e| CacheError::Backend(e.to_string()))?;
        Ok(())
    }

    async fn invalidate(&self, key: &CacheKey) -> Result<(), CacheError> {
        let mut conn = self.connection().await?;
        let _: i64 = conn
            .del(key.as_str())
            .await
            .map_err(|e| CacheError::Backend(e.to_string()))?;
        Ok(())
    }

    async fn invalidate_kind(&self, tenant_id: TenantId, kind: &str) -> Result<(), CacheError> {
        let pattern = format!("{}*", CacheKey::kind_prefix(tenant_id, kind));
        self.delete_matching(&pattern).await
    }

    async fn clear_tenant(&self, tenant_id: TenantId) -> Result<(), CacheError> {
        let pattern = format!("{}*", CacheKey::tenant_prefix(tenant_id));
        self.delete_matching(&pattern).await
    }
}
