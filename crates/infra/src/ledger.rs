//! Stock ledger orchestration (application-level).
//!
//! This module translates movement intents into validated quantity
//! transitions plus audit records, composing the repository and the cache.
//!
//! ## Movement Execution Flow
//!
//! ```text
//! Movement request (type, quantity, reason) + tenant context
//!   ↓
//! 1. Validate the request (deterministic, user-facing errors)
//!   ↓
//! 2. Load the current item (cache-first, repository on miss)
//!   ↓
//! 3. Validate the transition (insufficiency rejected before any write)
//!   ↓
//! 4. Guarded atomic write: quantity change + movement record, one transaction
//!   ↓
//! 5. Invalidate cache entries (after commit, never before)
//! ```
//!
//! The pre-write validation in steps 2–3 exists for early, precise errors;
//! correctness under concurrent requests comes from step 4: the store
//! refuses any debit that would take the quantity negative, so two racing
//! debits can never both succeed against the same stock.
//!
//! ## Cache Policy
//!
//! The cache is optional and best-effort. Read paths populate it with the
//! caller's chosen tier; write paths invalidate the item key and the tenant's
//! collection keys only after the transaction committed, so a reader can
//! never repopulate a pre-write value after the invalidation. Cache failures
//! are logged and swallowed; repository failures always propagate.

use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

use stockroom_core::{DomainError, ItemId, TenantContext, TenantId};
use stockroom_ledger::{
    InventoryItem, ItemDraft, ItemPatch, MovementRequest, StockMovement, TransferRequest,
    transition,
};

use crate::cache::{CacheKey, CacheStore, CacheTier};
use crate::repository::{
    InventoryRepository, ItemFilter, ItemPage, MovementPage, NewMovement, RepositoryError,
    TransferRecord,
};

const ITEMS_KIND: &str = "items";

#[derive(Debug, Error)]
pub enum LedgerError {
    /// Malformed input (deterministic, safe to surface verbatim).
    #[error("validation failed: {0}")]
    Validation(String),

    /// A debit exceeded the available quantity (business rule, user-safe).
    #[error("insufficient stock: requested {requested}, available {available}")]
    InsufficientStock { available: i64, requested: i64 },

    /// The item does not exist for this tenant.
    #[error("not found")]
    NotFound,

    /// Duplicate SKU/barcode or a concurrency-control failure.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Infrastructure failure; surface as a generic error, not raw internals.
    #[error("storage error: {0}")]
    Storage(String),
}

impl From<DomainError> for LedgerError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(msg) => LedgerError::Validation(msg),
            DomainError::InvalidId(msg) => LedgerError::Validation(msg),
            DomainError::InsufficientStock {
                available,
                requested,
            } => LedgerError::InsufficientStock {
                available,
                requested,
            },
            DomainError::NotFound => LedgerError::NotFound,
            DomainError::Conflict(msg) => LedgerError::Conflict(msg),
        }
    }
}

impl From<RepositoryError> for LedgerError {
    fn from(value: RepositoryError) -> Self {
        match value {
            RepositoryError::Conflict(msg) => LedgerError::Conflict(msg),
            RepositoryError::NotFound => LedgerError::NotFound,
            RepositoryError::InsufficientStock {
                available,
                requested,
            } => LedgerError::InsufficientStock {
                available,
                requested,
            },
            RepositoryError::Storage { operation, message } => {
                LedgerError::Storage(format!("{operation}: {message}"))
            }
        }
    }
}

/// The business-logic layer for stock quantities.
///
/// Composes an [`InventoryRepository`] (authoritative) and, where configured,
/// a [`CacheStore`] (best-effort). Trait objects keep it testable with the
/// in-memory implementations and swappable with Postgres/Redis backends.
pub struct StockLedgerService {
    repository: Arc<dyn InventoryRepository>,
    cache: Option<Arc<dyn CacheStore>>,
}

impl StockLedgerService {
    pub fn new(repository: Arc<dyn InventoryRepository>) -> Self {
        Self {
            repository,
            cache: None,
        }
    }

    pub fn with_cache(
        repository: Arc<dyn InventoryRepository>,
        cache: Arc<dyn CacheStore>,
    ) -> Self {
        Self {
            repository,
            cache: Some(cache),
        }
    }

    /// Create a new item for the tenant.
    pub async fn create_item(
        &self,
        ctx: &TenantContext,
        draft: ItemDraft,
    ) -> Result<InventoryItem, LedgerError> {
        draft.validate()?;
        let item = self.repository.create_item(ctx.tenant_id(), draft).await?;
        self.invalidate_collections(ctx.tenant_id()).await;
        Ok(item)
    }

    /// Update non-quantity catalog fields of an item.
    pub async fn update_item(
        &self,
        ctx: &TenantContext,
        item_id: ItemId,
        patch: ItemPatch,
    ) -> Result<InventoryItem, LedgerError> {
        patch.validate()?;
        let item = self
            .repository
            .update_item(ctx.tenant_id(), item_id, patch)
            .await?;
        self.invalidate_item(ctx.tenant_id(), item_id).await;
        Ok(item)
    }

    /// Cache-augmented single-item read.
    pub async fn get_item(
        &self,
        ctx: &TenantContext,
        item_id: ItemId,
        freshness: CacheTier,
    ) -> Result<Option<InventoryItem>, LedgerError> {
        let key = CacheKey::item(ctx.tenant_id(), item_id);
        if let Some(item) = self.cache_get::<InventoryItem>(&key).await {
            return Ok(Some(item));
        }

        let item = self.repository.get_item(ctx.tenant_id(), item_id).await?;
        if let Some(item) = &item {
            self.cache_put(&key, item, freshness).await;
        }
        Ok(item)
    }

    /// Cache-augmented listing; the key is deterministic in the filter.
    pub async fn list_items(
        &self,
        ctx: &TenantContext,
        filter: &ItemFilter,
        freshness: CacheTier,
    ) -> Result<ItemPage, LedgerError> {
        let key = CacheKey::collection(ctx.tenant_id(), ITEMS_KIND, &list_cache_params(filter));
        if let Some(page) = self.cache_get::<ItemPage>(&key).await {
            return Ok(page);
        }

        let page = self.repository.list_items(ctx.tenant_id(), filter).await?;
        self.cache_put(&key, &page, freshness).await;
        Ok(page)
    }

    /// Execute one movement against one item.
    ///
    /// Returns the updated item and the created movement. On rejection
    /// (validation, insufficiency, unknown item) nothing is written and no
    /// movement is recorded.
    pub async fn record_movement(
        &self,
        ctx: &TenantContext,
        item_id: ItemId,
        request: MovementRequest,
    ) -> Result<(InventoryItem, StockMovement), LedgerError> {
        request.validate()?;

        let current = self
            .get_item(ctx, item_id, CacheTier::Volatile)
            .await?
            .ok_or(LedgerError::NotFound)?;
        transition(current.quantity, &request)?;

        let movement = NewMovement::from_request(&request, ctx.actor());
        let (item, movement) = self
            .repository
            .record_movement(ctx.tenant_id(), item_id, request.quantity_change(), movement)
            .await?;

        self.invalidate_item(ctx.tenant_id(), item_id).await;
        Ok((item, movement))
    }

    /// Move stock between two items of the tenant as one unit of work.
    ///
    /// The debit leg is recorded as a TRANSFER movement on the source and the
    /// credit leg as an IN movement on the destination; both quantity updates
    /// and both movement rows commit together or not at all.
    pub async fn transfer(
        &self,
        ctx: &TenantContext,
        source: ItemId,
        destination: ItemId,
        request: TransferRequest,
    ) -> Result<TransferRecord, LedgerError> {
        request.validate()?;
        if source == destination {
            return Err(LedgerError::Validation(
                "source and destination items must differ".to_string(),
            ));
        }

        let record = self
            .repository
            .record_transfer(ctx.tenant_id(), source, destination, &request, ctx.actor())
            .await?;

        self.invalidate_item(ctx.tenant_id(), source).await;
        self.invalidate_item(ctx.tenant_id(), destination).await;
        Ok(record)
    }

    /// Movement history for one item, oldest first.
    pub async fn movement_history(
        &self,
        ctx: &TenantContext,
        item_id: ItemId,
        limit: i64,
        offset: i64,
        freshness: CacheTier,
    ) -> Result<MovementPage, LedgerError> {
        let kind = movements_kind(item_id);
        let key = CacheKey::collection(
            ctx.tenant_id(),
            &kind,
            &format!("limit={limit}:offset={offset}"),
        );
        if let Some(page) = self.cache_get::<MovementPage>(&key).await {
            return Ok(page);
        }

        let page = self
            .repository
            .list_movements(ctx.tenant_id(), item_id, limit, offset)
            .await?;
        self.cache_put(&key, &page, freshness).await;
        Ok(page)
    }

    // Cache plumbing. Failures are logged and swallowed: the cache must never
    // fail a request the repository could serve.

    async fn cache_get<T: DeserializeOwned>(&self, key: &CacheKey) -> Option<T> {
        let cache = self.cache.as_ref()?;
        match cache.get(key).await {
            Ok(Some(value)) => match serde_json::from_value(value) {
                Ok(decoded) => Some(decoded),
                Err(err) => {
                    tracing::warn!(key = %key, error = %err, "discarding undecodable cache entry");
                    None
                }
            },
            Ok(None) => None,
            Err(err) => {
                tracing::warn!(key = %key, error = %err, "cache read failed, falling back to repository");
                None
            }
        }
    }

    async fn cache_put<T: Serialize>(&self, key: &CacheKey, value: &T, tier: CacheTier) {
        let Some(cache) = self.cache.as_ref() else {
            return;
        };
        match serde_json::to_value(value) {
            Ok(json) => {
                if let Err(err) = cache.set(key, json, tier).await {
                    tracing::warn!(key = %key, error = %err, "cache write failed");
                }
            }
            Err(err) => {
                tracing::warn!(key = %key, error = %err, "failed to serialize value for cache");
            }
        }
    }

    async fn invalidate_item(&self, tenant_id: TenantId, item_id: ItemId) {
        let Some(cache) = self.cache.as_ref() else {
            return;
        };
        if let Err(err) = cache.invalidate(&CacheKey::item(tenant_id, item_id)).await {
            tracing::warn!(item_id = %item_id, error = %err, "cache invalidation failed");
        }
        if let Err(err) = cache.invalidate_kind(tenant_id, &movements_kind(item_id)).await {
            tracing::warn!(item_id = %item_id, error = %err, "movement cache invalidation failed");
        }
        self.invalidate_collections(tenant_id).await;
    }

    async fn invalidate_collections(&self, tenant_id: TenantId) {
        let Some(cache) = self.cache.as_ref() else {
            return;
        };
        if let Err(err) = cache.invalidate_kind(tenant_id, ITEMS_KIND).await {
            tracing::warn!(error = %err, "collection cache invalidation failed");
        }
    }
}

fn movements_kind(item_id: ItemId) -> String {
    format!("movements:{item_id}")
}

/// Deterministic collection-key parameters: multi-valued filters are sorted
/// so logically-equal filters share one cache entry.
fn list_cache_params(filter: &ItemFilter) -> String {
    let mut tags: Vec<&str> = filter.tags.iter().map(String::as_str).collect();
    tags.sort_unstable();

    format!(
        "cat={}:q={}:tags={}:limit={}:offset={}",
        filter
            .category_id
            .map(|category| category.to_string())
            .unwrap_or_default(),
        filter.search.as_deref().unwrap_or("").trim().to_lowercase(),
        tags.join(","),
        filter.limit,
        filter.offset,
    )
}
