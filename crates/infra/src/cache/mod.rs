//! Tenant-namespaced tiered cache.
//!
//! The cache is an optimization, never a dependency for correctness: callers
//! fall through to the authoritative repository on any miss or backend
//! failure. Every key embeds the tenant identifier; the store never exposes
//! an un-namespaced key space.

mod in_memory;
#[cfg(feature = "redis")]
mod redis;

pub use in_memory::InMemoryCacheStore;
#[cfg(feature = "redis")]
pub use redis::RedisCacheStore;

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;

use stockroom_core::{ItemId, TenantId};

const KEY_PREFIX: &str = "stockroom";

/// TTL band for a cache entry. Tier selection is a caller decision based on
/// the read's freshness requirement, not inferred by the store.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheTier {
    /// Frequently-changing reads (current stock levels).
    Volatile,
    Standard,
    Extended,
    /// Near-static reference data (categories and the like).
    Persistent,
}

impl CacheTier {
    pub fn ttl(self) -> Duration {
        match self {
            CacheTier::Volatile => Duration::from_secs(5 * 60),
            CacheTier::Standard => Duration::from_secs(30 * 60),
            CacheTier::Extended => Duration::from_secs(2 * 60 * 60),
            CacheTier::Persistent => Duration::from_secs(24 * 60 * 60),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CacheTier::Volatile => "volatile",
            CacheTier::Standard => "standard",
            CacheTier::Extended => "extended",
            CacheTier::Persistent => "persistent",
        }
    }
}

/// A fully-qualified cache key: `stockroom:{tenant}:{kind}:{rest}`.
///
/// Constructors take the tenant explicitly, so a key without a tenant cannot
/// be built.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Key for a single item projection.
    pub fn item(tenant_id: TenantId, item_id: ItemId) -> Self {
        Self(format!("{KEY_PREFIX}:{tenant_id}:item:{item_id}"))
    }

    /// Key for a collection read; `params` must be deterministic for the
    /// operation's arguments (callers sort multi-valued filters).
    pub fn collection(tenant_id: TenantId, kind: &str, params: &str) -> Self {
        Self(format!("{KEY_PREFIX}:{tenant_id}:{kind}:{params}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Prefix shared by every collection key of `kind` for the tenant.
    pub(crate) fn kind_prefix(tenant_id: TenantId, kind: &str) -> String {
        format!("{KEY_PREFIX}:{tenant_id}:{kind}:")
    }

    /// Prefix shared by every key of the tenant.
    pub(crate) fn tenant_prefix(tenant_id: TenantId) -> String {
        format!("{KEY_PREFIX}:{tenant_id}:")
    }
}

impl core::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Cache operation error. Callers log these and fall through; they never fail
/// the surrounding request.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache backend error: {0}")]
    Backend(String),

    #[error("cache serialization error: {0}")]
    Serialize(String),
}

/// Tenant-namespaced key/value cache with per-entry TTL tiers.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &CacheKey) -> Result<Option<JsonValue>, CacheError>;

    async fn set(&self, key: &CacheKey, value: JsonValue, tier: CacheTier)
        -> Result<(), CacheError>;

    async fn invalidate(&self, key: &CacheKey) -> Result<(), CacheError>;

    /// Drop every collection entry of `kind` for the tenant (write-path
    /// invalidation for parameterized list keys).
    async fn invalidate_kind(&self, tenant_id: TenantId, kind: &str) -> Result<(), CacheError>;

    /// Drop every entry for the tenant.
    async fn clear_tenant(&self, tenant_id: TenantId) -> Result<(), CacheError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier_ttls_are_strictly_increasing() {
        assert!(CacheTier::Volatile.ttl() < CacheTier::Standard.ttl());
        assert!(CacheTier::Standard.ttl() < CacheTier::Extended.ttl());
        assert!(CacheTier::Extended.ttl() < CacheTier::Persistent.ttl());
    }

    #[test]
    fn item_keys_embed_the_tenant() {
        let item_id = ItemId::new();
        let key_a = CacheKey::item(TenantId::new(), item_id);
        let key_b = CacheKey::item(TenantId::new(), item_id);
        // Same item id, different tenants: keys can never collide.
        assert_ne!(key_a, key_b);
    }

    #[test]
    fn kind_prefix_covers_collection_keys() {
        let tenant_id = TenantId::new();
        let key = CacheKey::collection(tenant_id, "items", "limit=50:offset=0");
        assert!(key.as_str().starts_with(&CacheKey::kind_prefix(tenant_id, "items")));
        assert!(key.as_str().starts_with(&CacheKey::tenant_prefix(tenant_id)));
    }
}
