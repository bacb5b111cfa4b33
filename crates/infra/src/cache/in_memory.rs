use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::Value as JsonValue;

use stockroom_core::TenantId;

use super::{CacheError, CacheKey, CacheStore, CacheTier};

/// In-memory cache store for tests/dev.
///
/// Entries expire lazily: an expired entry is dropped on the next read.
#[derive(Debug, Default)]
pub struct InMemoryCacheStore {
    inner: Mutex<HashMap<String, Entry>>,
}

#[derive(Debug)]
struct Entry {
    value: JsonValue,
    expires_at: Instant,
}

impl InMemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, Entry>>, CacheError> {
        self.inner
            .lock()
            .map_err(|_| CacheError::Backend("cache mutex poisoned".to_string()))
    }

    fn set_with_ttl(
        &self,
        key: &CacheKey,
        value: JsonValue,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        let mut map = self.lock()?;
        map.insert(
            key.as_str().to_string(),
            Entry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }
}

#[async_trait]
impl CacheStore for InMemoryCacheStore {
    async fn get(&self, key: &CacheKey) -> Result<Option<JsonValue>, CacheError> {
        let mut map = self.lock()?;
        match map.get(key.as_str()) {
            Some(entry) if entry.expires_at > Instant::now() => Ok(Some(entry.value.clone())),
            Some(_) => {
                map.remove(key.as_str());
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set(
        &self,
        key: &CacheKey,
        value: JsonValue,
        tier: CacheTier,
    ) -> Result<(), CacheError> {
        self.set_with_ttl(key, value, tier.ttl())
    }

    async fn invalidate(&self, key: &CacheKey) -> Result<(), CacheError> {
        let mut map = self.lock()?;
        map.remove(key.as_str());
        Ok(())
    }

    async fn invalidate_kind(&self, tenant_id: TenantId, kind: &str) -> Result<(), CacheError> {
        let prefix = CacheKey::kind_prefix(tenant_id, kind);
        let mut map = self.lock()?;
        map.retain(|key, _| !key.starts_with(&prefix));
        Ok(())
    }

    async fn clear_tenant(&self, tenant_id: TenantId) -> Result<(), CacheError> {
        let prefix = CacheKey::tenant_prefix(tenant_id);
        let mut map = self.lock()?;
        map.retain(|key, _| !key.starts_with(&prefix));
        Ok(())
    }
}
