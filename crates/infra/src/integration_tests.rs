//! Integration tests for the full ledger pipeline.
//!
//! Tests: Service → Repository → Cache against the in-memory backends.
//!
//! Verifies:
//! - movements update quantities and leave audit records atomically
//! - rejected movements mutate nothing and record nothing
//! - tenant isolation holds across repository and cache
//! - concurrent debits never oversell or lose updates
//! - the cache is best-effort: failures fall through, staleness never
//!   survives a committed write

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use stockroom_core::{ItemId, TenantContext, TenantId, UserId};
use stockroom_ledger::{
    InventoryItem, ItemDraft, ItemPatch, MovementRequest, MovementType, QuantityChange,
    StockMovement, TransferRequest, replay,
};

use crate::cache::{CacheError, CacheKey, CacheStore, CacheTier, InMemoryCacheStore};
use crate::ledger::{LedgerError, StockLedgerService};
use crate::repository::{
    InMemoryInventoryRepository, InventoryRepository, ItemFilter, ItemPage, MovementPage,
    NewMovement, RepositoryError, TransferRecord,
};

fn cached_service() -> StockLedgerService {
    StockLedgerService::with_cache(
        Arc::new(InMemoryInventoryRepository::new()),
        Arc::new(InMemoryCacheStore::new()),
    )
}

fn test_ctx() -> TenantContext {
    TenantContext::new(TenantId::new())
}

fn draft_with_quantity(sku: &str, quantity: i64) -> ItemDraft {
    let mut draft = ItemDraft::new(sku, format!("{sku} item"));
    draft.initial_quantity = quantity;
    draft
}

/// Repository wrapper that counts authoritative single-item reads, to prove
/// cache hits short-circuit.
struct CountingRepository {
    inner: InMemoryInventoryRepository,
    gets: AtomicUsize,
}

impl CountingRepository {
    fn new() -> Self {
        Self {
            inner: InMemoryInventoryRepository::new(),
            gets: AtomicUsize::new(0),
        }
    }
}

#[async_trait::async_trait]
impl InventoryRepository for CountingRepository {
    async fn create_item(
        &self,
        tenant_id: TenantId,
        draft: ItemDraft,
    ) -> Result<InventoryItem, RepositoryError> {
        self.inner.create_item(tenant_id, draft).await
    }

    async fn update_item(
        &self,
        tenant_id: TenantId,
        item_id: ItemId,
        patch: ItemPatch,
    ) -> Result<InventoryItem, RepositoryError> {
        self.inner.update_item(tenant_id, item_id, patch).await
    }

    async fn get_item(
        &self,
        tenant_id: TenantId,
        item_id: ItemId,
    ) -> Result<Option<InventoryItem>, RepositoryError> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        self.inner.get_item(tenant_id, item_id).await
    }

    async fn list_items(
        &self,
        tenant_id: TenantId,
        filter: &ItemFilter,
    ) -> Result<ItemPage, RepositoryError> {
        self.inner.list_items(tenant_id, filter).await
    }

    async fn record_movement(
        &self,
        tenant_id: TenantId,
        item_id: ItemId,
        change: QuantityChange,
        movement: NewMovement,
    ) -> Result<(InventoryItem, StockMovement), RepositoryError> {
        self.inner
            .record_movement(tenant_id, item_id, change, movement)
            .await
    }

    async fn record_transfer(
        &self,
        tenant_id: TenantId,
        source: ItemId,
        destination: ItemId,
        transfer: &TransferRequest,
        performed_by: Option<UserId>,
    ) -> Result<TransferRecord, RepositoryError> {
        self.inner
            .record_transfer(tenant_id, source, destination, transfer, performed_by)
            .await
    }

    async fn list_movements(
        &self,
        tenant_id: TenantId,
        item_id: ItemId,
        limit: i64,
        offset: i64,
    ) -> Result<MovementPage, RepositoryError> {
        self.inner
            .list_movements(tenant_id, item_id, limit, offset)
            .await
    }
}

/// Cache stub whose every operation fails (backend outage).
struct FailingCacheStore;

#[async_trait::async_trait]
impl CacheStore for FailingCacheStore {
    async fn get(&self, _key: &CacheKey) -> Result<Option<serde_json::Value>, CacheError> {
        Err(CacheError::Backend("cache unavailable".to_string()))
    }

    async fn set(
        &self,
        _key: &CacheKey,
        _value: serde_json::Value,
        _tier: CacheTier,
    ) -> Result<(), CacheError> {
        Err(CacheError::Backend("cache unavailable".to_string()))
    }

    async fn invalidate(&self, _key: &CacheKey) -> Result<(), CacheError> {
        Err(CacheError::Backend("cache unavailable".to_string()))
    }

    async fn invalidate_kind(
        &self,
        _tenant_id: TenantId,
        _kind: &str,
    ) -> Result<(), CacheError> {
        Err(CacheError::Backend("cache unavailable".to_string()))
    }

    async fn clear_tenant(&self, _tenant_id: TenantId) -> Result<(), CacheError> {
        Err(CacheError::Backend("cache unavailable".to_string()))
    }
}

#[tokio::test]
async fn create_then_inbound_movement_updates_quantity_and_history() {
    let service = cached_service();
    let actor = UserId::new();
    let ctx = TenantContext::with_actor(TenantId::new(), actor);

    let item = service
        .create_item(&ctx, ItemDraft::new("SKU-1", "Widget"))
        .await
        .unwrap();
    assert_eq!(item.quantity, 0);

    let (item, movement) = service
        .record_movement(&ctx, item.id, MovementRequest::new(MovementType::In, 50))
        .await
        .unwrap();
    assert_eq!(item.quantity, 50);
    assert_eq!(movement.movement_type, MovementType::In);
    assert_eq!(movement.quantity, 50);
    assert_eq!(movement.performed_by, Some(actor));

    let fetched = service
        .get_item(&ctx, item.id, CacheTier::Volatile)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(fetched.quantity, 50);

    let history = service
        .movement_history(&ctx, item.id, 50, 0, CacheTier::Volatile)
        .await
        .unwrap();
    assert_eq!(history.total, 1);
    assert_eq!(history.movements[0].movement_type, MovementType::In);
}

#[tokio::test]
async fn overdraw_is_rejected_without_side_effects() {
    let service = cached_service();
    let ctx = test_ctx();

    let item = service
        .create_item(&ctx, draft_with_quantity("SKU-1", 10))
        .await
        .unwrap();

    let err = service
        .record_movement(&ctx, item.id, MovementRequest::new(MovementType::Out, 15))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        LedgerError::InsufficientStock {
            available: 10,
            requested: 15,
        }
    ));

    // Quantity unchanged, no movement recorded.
    let fetched = service
        .get_item(&ctx, item.id, CacheTier::Volatile)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(fetched.quantity, 10);

    let history = service
        .movement_history(&ctx, item.id, 50, 0, CacheTier::Volatile)
        .await
        .unwrap();
    assert_eq!(history.total, 0);
}

#[tokio::test]
async fn adjust_sets_absolute_quantity() {
    let service = cached_service();
    let ctx = test_ctx();

    let item = service
        .create_item(&ctx, draft_with_quantity("SKU-1", 10))
        .await
        .unwrap();

    let (item, movement) = service
        .record_movement(&ctx, item.id, MovementRequest::new(MovementType::Adjust, 7))
        .await
        .unwrap();
    assert_eq!(item.quantity, 7);
    assert_eq!(movement.movement_type, MovementType::Adjust);
    assert_eq!(movement.quantity, 7);
}

#[tokio::test]
async fn sku_is_unique_per_tenant_not_globally() {
    let repository = Arc::new(InMemoryInventoryRepository::new());
    let service = StockLedgerService::with_cache(repository, Arc::new(InMemoryCacheStore::new()));
    let ctx_a = test_ctx();
    let ctx_b = test_ctx();

    let item_a = service
        .create_item(&ctx_a, ItemDraft::new("ABC", "A's item"))
        .await
        .unwrap();
    let item_b = service
        .create_item(&ctx_b, ItemDraft::new("ABC", "B's item"))
        .await
        .unwrap();
    assert_ne!(item_a.tenant_id, item_b.tenant_id);

    // Duplicate within one tenant is a conflict.
    let err = service
        .create_item(&ctx_a, ItemDraft::new("ABC", "again"))
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::Conflict(_)));

    // Listing for tenant A never returns tenant B's rows.
    let page = service
        .list_items(&ctx_a, &ItemFilter::default(), CacheTier::Volatile)
        .await
        .unwrap();
    assert_eq!(page.total, 1);
    assert!(page.items.iter().all(|i| i.tenant_id == ctx_a.tenant_id()));
}

#[tokio::test]
async fn committed_movement_is_not_shadowed_by_cache() {
    let service = cached_service();
    let ctx = test_ctx();

    let item = service
        .create_item(&ctx, draft_with_quantity("SKU-1", 10))
        .await
        .unwrap();

    // Populate the cache under the standard tier.
    let cached = service
        .get_item(&ctx, item.id, CacheTier::Standard)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(cached.quantity, 10);

    service
        .record_movement(&ctx, item.id, MovementRequest::new(MovementType::Out, 4))
        .await
        .unwrap();

    // The next read must observe the committed quantity, not the pre-movement
    // cache entry.
    let fetched = service
        .get_item(&ctx, item.id, CacheTier::Standard)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(fetched.quantity, 6);
}

#[tokio::test]
async fn cache_hit_short_circuits_the_repository() {
    let repository = Arc::new(CountingRepository::new());
    let service =
        StockLedgerService::with_cache(repository.clone(), Arc::new(InMemoryCacheStore::new()));
    let ctx = test_ctx();

    let item = service
        .create_item(&ctx, draft_with_quantity("SKU-1", 3))
        .await
        .unwrap();

    let first = service
        .get_item(&ctx, item.id, CacheTier::Standard)
        .await
        .unwrap();
    let second = service
        .get_item(&ctx, item.id, CacheTier::Standard)
        .await
        .unwrap();

    // Identical result, exactly one authoritative read.
    assert_eq!(first, second);
    assert_eq!(repository.gets.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn tenant_isolation_on_reads_and_writes() {
    let service = cached_service();
    let ctx_a = test_ctx();
    let ctx_b = test_ctx();

    let item = service
        .create_item(&ctx_a, draft_with_quantity("SKU-1", 5))
        .await
        .unwrap();

    // Warm tenant A's cache for the item, then probe as tenant B: the item
    // must be invisible even with a populated cache.
    service
        .get_item(&ctx_a, item.id, CacheTier::Standard)
        .await
        .unwrap();
    assert_eq!(
        service
            .get_item(&ctx_b, item.id, CacheTier::Standard)
            .await
            .unwrap(),
        None
    );

    let err = service
        .update_item(
            &ctx_b,
            item.id,
            ItemPatch {
                name: Some("hijack".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::NotFound));

    let err = service
        .record_movement(&ctx_b, item.id, MovementRequest::new(MovementType::Out, 1))
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::NotFound));

    // Tenant A is untouched by tenant B's attempts.
    let fetched = service
        .get_item(&ctx_a, item.id, CacheTier::Volatile)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(fetched.quantity, 5);
    assert_eq!(fetched.name, "SKU-1 item");
}

#[tokio::test]
async fn cache_failure_never_fails_the_request() {
    let service = StockLedgerService::with_cache(
        Arc::new(InMemoryInventoryRepository::new()),
        Arc::new(FailingCacheStore),
    );
    let ctx = test_ctx();

    let item = service
        .create_item(&ctx, draft_with_quantity("SKU-1", 10))
        .await
        .unwrap();

    let (item, _) = service
        .record_movement(&ctx, item.id, MovementRequest::new(MovementType::Sale, 3))
        .await
        .unwrap();
    assert_eq!(item.quantity, 7);

    let fetched = service
        .get_item(&ctx, item.id, CacheTier::Volatile)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(fetched.quantity, 7);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_debits_never_oversell() {
    let service = Arc::new(cached_service());
    let ctx = test_ctx();

    let item = service
        .create_item(&ctx, draft_with_quantity("SKU-1", 5))
        .await
        .unwrap();

    let mut handles = Vec::new();
    for _ in 0..8 {
        let service = service.clone();
        let item_id = item.id;
        handles.push(tokio::spawn(async move {
            service
                .record_movement(&ctx, item_id, MovementRequest::new(MovementType::Out, 1))
                .await
        }));
    }

    let mut successes = 0;
    let mut insufficient = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => successes += 1,
            Err(LedgerError::InsufficientStock { .. }) => insufficient += 1,
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    // Exactly the available stock is sold; the rest are clean rejections.
    assert_eq!(successes, 5);
    assert_eq!(insufficient, 3);

    let fetched = service
        .get_item(&ctx, item.id, CacheTier::Volatile)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(fetched.quantity, 0);

    let history = service
        .movement_history(&ctx, item.id, 50, 0, CacheTier::Volatile)
        .await
        .unwrap();
    assert_eq!(history.total, 5);
}

#[tokio::test]
async fn replaying_history_reconstructs_quantity() {
    let service = cached_service();
    let ctx = test_ctx();

    let item = service
        .create_item(&ctx, ItemDraft::new("SKU-1", "Widget"))
        .await
        .unwrap();

    for request in [
        MovementRequest::new(MovementType::In, 50),
        MovementRequest::new(MovementType::Out, 8),
        MovementRequest::new(MovementType::Adjust, 30),
        MovementRequest::new(MovementType::Sale, 5),
    ] {
        service.record_movement(&ctx, item.id, request).await.unwrap();
    }

    let fetched = service
        .get_item(&ctx, item.id, CacheTier::Volatile)
        .await
        .unwrap()
        .unwrap();
    let history = service
        .movement_history(&ctx, item.id, 50, 0, CacheTier::Volatile)
        .await
        .unwrap();

    assert_eq!(history.total, 4);
    assert_eq!(replay(0, &history.movements), fetched.quantity);
    assert_eq!(fetched.quantity, 25);
}

#[tokio::test]
async fn transfer_moves_stock_between_items_atomically() {
    let service = cached_service();
    let ctx = test_ctx();

    let source = service
        .create_item(&ctx, draft_with_quantity("SKU-SRC", 10))
        .await
        .unwrap();
    let destination = service
        .create_item(&ctx, draft_with_quantity("SKU-DST", 1))
        .await
        .unwrap();

    let record = service
        .transfer(
            &ctx,
            source.id,
            destination.id,
            TransferRequest {
                quantity: 4,
                reason: Some("rebalance".to_string()),
                source_location: Some("warehouse-a".to_string()),
                destination_location: Some("warehouse-b".to_string()),
            },
        )
        .await
        .unwrap();

    assert_eq!(record.source.quantity, 6);
    assert_eq!(record.destination.quantity, 5);
    assert_eq!(record.debit.movement_type, MovementType::Transfer);
    assert_eq!(record.debit.item_id, source.id);
    assert_eq!(record.credit.movement_type, MovementType::In);
    assert_eq!(record.credit.item_id, destination.id);

    // Both legs are visible in the respective histories.
    let source_history = service
        .movement_history(&ctx, source.id, 50, 0, CacheTier::Volatile)
        .await
        .unwrap();
    let destination_history = service
        .movement_history(&ctx, destination.id, 50, 0, CacheTier::Volatile)
        .await
        .unwrap();
    assert_eq!(source_history.total, 1);
    assert_eq!(destination_history.total, 1);
}

#[tokio::test]
async fn insufficient_transfer_leaves_both_items_untouched() {
    let service = cached_service();
    let ctx = test_ctx();

    let source = service
        .create_item(&ctx, draft_with_quantity("SKU-SRC", 3))
        .await
        .unwrap();
    let destination = service
        .create_item(&ctx, draft_with_quantity("SKU-DST", 0))
        .await
        .unwrap();

    let err = service
        .transfer(
            &ctx,
            source.id,
            destination.id,
            TransferRequest {
                quantity: 100,
                reason: None,
                source_location: None,
                destination_location: None,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::InsufficientStock { .. }));

    let source = service
        .get_item(&ctx, source.id, CacheTier::Volatile)
        .await
        .unwrap()
        .unwrap();
    let destination = service
        .get_item(&ctx, destination.id, CacheTier::Volatile)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(source.quantity, 3);
    assert_eq!(destination.quantity, 0);
}

#[tokio::test]
async fn transfer_to_the_same_item_is_rejected() {
    let service = cached_service();
    let ctx = test_ctx();

    let item = service
        .create_item(&ctx, draft_with_quantity("SKU-1", 10))
        .await
        .unwrap();

    let err = service
        .transfer(
            &ctx,
            item.id,
            item.id,
            TransferRequest {
                quantity: 1,
                reason: None,
                source_location: None,
                destination_location: None,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::Validation(_)));
}

#[tokio::test]
async fn list_items_counts_match_the_filtered_predicate() {
    let service = cached_service();
    let ctx = test_ctx();

    let mut bulk = ItemDraft::new("SKU-A", "Blue Widget");
    bulk.tags.insert("bulk".to_string());
    service.create_item(&ctx, bulk).await.unwrap();
    service
        .create_item(&ctx, ItemDraft::new("SKU-B", "Red Widget"))
        .await
        .unwrap();
    service
        .create_item(&ctx, ItemDraft::new("SKU-C", "Gadget"))
        .await
        .unwrap();

    // Case-insensitive search over name/SKU.
    let page = service
        .list_items(
            &ctx,
            &ItemFilter {
                search: Some("WIDGET".to_string()),
                ..Default::default()
            },
            CacheTier::Volatile,
        )
        .await
        .unwrap();
    assert_eq!(page.total, 2);
    assert_eq!(page.items.len(), 2);

    // Total reflects the filtered predicate even when the page is smaller.
    let page = service
        .list_items(
            &ctx,
            &ItemFilter {
                search: Some("widget".to_string()),
                limit: 1,
                ..Default::default()
            },
            CacheTier::Volatile,
        )
        .await
        .unwrap();
    assert_eq!(page.total, 2);
    assert_eq!(page.items.len(), 1);

    let page = service
        .list_items(
            &ctx,
            &ItemFilter {
                tags: vec!["bulk".to_string()],
                ..Default::default()
            },
            CacheTier::Volatile,
        )
        .await
        .unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.items[0].sku, "SKU-A");
}

#[tokio::test]
async fn stale_list_cache_is_invalidated_by_writes() {
    let service = cached_service();
    let ctx = test_ctx();

    service
        .create_item(&ctx, ItemDraft::new("SKU-A", "Widget"))
        .await
        .unwrap();

    // Populate the collection cache.
    let page = service
        .list_items(&ctx, &ItemFilter::default(), CacheTier::Standard)
        .await
        .unwrap();
    assert_eq!(page.total, 1);

    service
        .create_item(&ctx, ItemDraft::new("SKU-B", "Gadget"))
        .await
        .unwrap();

    let page = service
        .list_items(&ctx, &ItemFilter::default(), CacheTier::Standard)
        .await
        .unwrap();
    assert_eq!(page.total, 2);
}

#[tokio::test]
async fn movement_request_validation_is_rejected_before_any_write() {
    let service = cached_service();
    let ctx = test_ctx();

    let item = service
        .create_item(&ctx, draft_with_quantity("SKU-1", 10))
        .await
        .unwrap();

    // Non-positive quantity.
    let err = service
        .record_movement(&ctx, item.id, MovementRequest::new(MovementType::Out, 0))
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::Validation(_)));

    // Transfer movement without a destination location.
    let err = service
        .record_movement(
            &ctx,
            item.id,
            MovementRequest::new(MovementType::Transfer, 2),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::Validation(_)));

    let history = service
        .movement_history(&ctx, item.id, 50, 0, CacheTier::Volatile)
        .await
        .unwrap();
    assert_eq!(history.total, 0);
}

#[tokio::test]
async fn update_item_cannot_touch_quantity_and_respects_patch_fields() {
    let service = cached_service();
    let ctx = test_ctx();

    let item = service
        .create_item(&ctx, draft_with_quantity("SKU-1", 9))
        .await
        .unwrap();

    let updated = service
        .update_item(
            &ctx,
            item.id,
            ItemPatch {
                name: Some("Renamed".to_string()),
                min_quantity: Some(2),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(updated.name, "Renamed");
    assert_eq!(updated.min_quantity, 2);
    assert_eq!(updated.sku, "SKU-1");
    assert_eq!(updated.quantity, 9);

    // Blank patched name is rejected.
    let err = service
        .update_item(
            &ctx,
            item.id,
            ItemPatch {
                name: Some("  ".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::Validation(_)));
}
