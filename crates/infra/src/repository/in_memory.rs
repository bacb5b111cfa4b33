use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use chrono::Utc;

use stockroom_core::{ItemId, MovementId, TenantId, UserId};
use stockroom_ledger::{
    InventoryItem, ItemDraft, ItemPatch, MovementType, QuantityChange, StockMovement,
    TransferRequest,
};

use super::{
    InventoryRepository, ItemFilter, ItemPage, MovementPage, NewMovement, RepositoryError,
    TransferRecord,
};

/// In-memory inventory repository.
///
/// Intended for tests/dev. A single mutex covers items and movements, so the
/// check-and-update in `record_movement` is atomic under the lock and provides
/// the same per-item serialization guarantee as the guarded Postgres
/// statement.
#[derive(Debug, Default)]
pub struct InMemoryInventoryRepository {
    inner: Mutex<State>,
}

#[derive(Debug, Default)]
struct State {
    items: HashMap<(TenantId, ItemId), InventoryItem>,
    movements: Vec<StockMovement>,
}

impl InMemoryInventoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>, RepositoryError> {
        self.inner
            .lock()
            .map_err(|_| RepositoryError::storage("lock", "repository mutex poisoned"))
    }
}

impl State {
    fn sku_taken(&self, tenant_id: TenantId, sku: &str, except: Option<ItemId>) -> bool {
        self.items.values().any(|item| {
            item.tenant_id == tenant_id && item.sku == sku && Some(item.id) != except
        })
    }

    fn barcode_taken(&self, tenant_id: TenantId, barcode: &str, except: Option<ItemId>) -> bool {
        self.items.values().any(|item| {
            item.tenant_id == tenant_id
                && item.barcode.as_deref() == Some(barcode)
                && Some(item.id) != except
        })
    }

    fn apply_change(
        &mut self,
        tenant_id: TenantId,
        item_id: ItemId,
        change: QuantityChange,
    ) -> Result<InventoryItem, RepositoryError> {
        let item = self
            .items
            .get_mut(&(tenant_id, item_id))
            .ok_or(RepositoryError::NotFound)?;

        let next = match change {
            QuantityChange::Delta(delta) => {
                let next = item.quantity + delta;
                if next < 0 {
                    return Err(RepositoryError::InsufficientStock {
                        available: item.quantity,
                        requested: -delta,
                    });
                }
                next
            }
            QuantityChange::Set(target) => target,
        };

        item.quantity = next;
        item.updated_at = Utc::now();
        Ok(item.clone())
    }

    fn push_movement(
        &mut self,
        tenant_id: TenantId,
        item_id: ItemId,
        new: NewMovement,
    ) -> StockMovement {
        let movement = StockMovement {
            id: MovementId::new(),
            tenant_id,
            item_id,
            movement_type: new.movement_type,
            quantity: new.quantity,
            reason: new.reason,
            source_location: new.source_location,
            destination_location: new.destination_location,
            performed_by: new.performed_by,
            created_at: Utc::now(),
        };
        self.movements.push(movement.clone());
        movement
    }
}

#[async_trait::async_trait]
impl InventoryRepository for InMemoryInventoryRepository {
    async fn create_item(
        &self,
        tenant_id: TenantId,
        draft: ItemDraft,
    ) -> Result<InventoryItem, RepositoryError> {
        let mut state = self.lock()?;

        if state.sku_taken(tenant_id, &draft.sku, None) {
            return Err(RepositoryError::Conflict(
                "sku or barcode already exists for this tenant".to_string(),
            ));
        }
        if let Some(barcode) = &draft.barcode {
            if state.barcode_taken(tenant_id, barcode, None) {
                return Err(RepositoryError::Conflict(
                    "sku or barcode already exists for this tenant".to_string(),
                ));
            }
        }

        let now = Utc::now();
        let item = InventoryItem {
            id: ItemId::new(),
            tenant_id,
            sku: draft.sku,
            name: draft.name,
            description: draft.description,
            category_id: draft.category_id,
            quantity: draft.initial_quantity,
            min_quantity: draft.min_quantity,
            max_quantity: draft.max_quantity,
            unit_price: draft.unit_price,
            location: draft.location,
            barcode: draft.barcode,
            tags: draft.tags,
            metadata: draft.metadata,
            created_at: now,
            updated_at: now,
        };

        state.items.insert((tenant_id, item.id), item.clone());
        Ok(item)
    }

    async fn update_item(
        &self,
        tenant_id: TenantId,
        item_id: ItemId,
        patch: ItemPatch,
    ) -> Result<InventoryItem, RepositoryError> {
        let mut state = self.lock()?;

        if let Some(sku) = &patch.sku {
            if state.sku_taken(tenant_id, sku, Some(item_id)) {
                return Err(RepositoryError::Conflict(
                    "sku or barcode already exists for this tenant".to_string(),
                ));
            }
        }
        if let Some(barcode) = &patch.barcode {
            if state.barcode_taken(tenant_id, barcode, Some(item_id)) {
                return Err(RepositoryError::Conflict(
                    "sku or barcode already exists for this tenant".to_string(),
                ));
            }
        }

        let item = state
            .items
            .get_mut(&(tenant_id, item_id))
            .ok_or(RepositoryError::NotFound)?;
        patch.apply(item, Utc::now());
        Ok(item.clone())
    }

    async fn get_item(
        &self,
        tenant_id: TenantId,
        item_id: ItemId,
    ) -> Result<Option<InventoryItem>, RepositoryError> {
        let state = self.lock()?;
        Ok(state.items.get(&(tenant_id, item_id)).cloned())
    }

    async fn list_items(
        &self,
        tenant_id: TenantId,
        filter: &ItemFilter,
    ) -> Result<ItemPage, RepositoryError> {
        let state = self.lock()?;

        let search = filter
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase);

        let mut matched: Vec<InventoryItem> = state
            .items
            .values()
            .filter(|item| item.tenant_id == tenant_id)
            .filter(|item| {
                filter
                    .category_id
                    .is_none_or(|category| item.category_id == Some(category))
            })
            .filter(|item| {
                search.as_deref().is_none_or(|needle| {
                    item.name.to_lowercase().contains(needle)
                        || item.sku.to_lowercase().contains(needle)
                })
            })
            .filter(|item| filter.tags.iter().all(|tag| item.tags.contains(tag)))
            .cloned()
            .collect();

        matched.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then(a.id.cmp(&b.id)));

        let total = matched.len() as u64;
        let items = matched
            .into_iter()
            .skip(filter.offset.max(0) as usize)
            .take(filter.limit.max(0) as usize)
            .collect();

        Ok(ItemPage { items, total })
    }

    async fn record_movement(
        &self,
        tenant_id: TenantId,
        item_id: ItemId,
        change: QuantityChange,
        movement: NewMovement,
    ) -> Result<(InventoryItem, StockMovement), RepositoryError> {
        let mut state = self.lock()?;

        let item = state.apply_change(tenant_id, item_id, change)?;
        let movement = state.push_movement(tenant_id, item_id, movement);
        Ok((item, movement))
    }

    async fn record_transfer(
        &self,
        tenant_id: TenantId,
        source: ItemId,
        destination: ItemId,
        transfer: &TransferRequest,
        performed_by: Option<UserId>,
    ) -> Result<TransferRecord, RepositoryError> {
        let mut state = self.lock()?;

        // Validate both legs before mutating anything: a failed credit must
        // not leave a committed debit behind.
        if !state.items.contains_key(&(tenant_id, destination)) {
            return Err(RepositoryError::NotFound);
        }
        let source_item = state
            .items
            .get(&(tenant_id, source))
            .ok_or(RepositoryError::NotFound)?;
        if source_item.quantity < transfer.quantity {
            return Err(RepositoryError::InsufficientStock {
                available: source_item.quantity,
                requested: transfer.quantity,
            });
        }

        let source_item =
            state.apply_change(tenant_id, source, QuantityChange::Delta(-transfer.quantity))?;
        let destination_item =
            state.apply_change(tenant_id, destination, QuantityChange::Delta(transfer.quantity))?;

        let debit = state.push_movement(
            tenant_id,
            source,
            NewMovement {
                movement_type: MovementType::Transfer,
                quantity: transfer.quantity,
                reason: transfer.reason.clone(),
                source_location: transfer.source_location.clone(),
                destination_location: transfer.destination_location.clone(),
                performed_by,
            },
        );
        let credit = state.push_movement(
            tenant_id,
            destination,
            NewMovement {
                movement_type: MovementType::In,
                quantity: transfer.quantity,
                reason: transfer.reason.clone(),
                source_location: transfer.source_location.clone(),
                destination_location: transfer.destination_location.clone(),
                performed_by,
            },
        );

        Ok(TransferRecord {
            source: source_item,
            destination: destination_item,
            debit,
            credit,
        })
    }

    async fn list_movements(
        &self,
        tenant_id: TenantId,
        item_id: ItemId,
        limit: i64,
        offset: i64,
    ) -> Result<MovementPage, RepositoryError> {
        let state = self.lock()?;

        let matched: Vec<StockMovement> = state
            .movements
            .iter()
            .filter(|movement| movement.tenant_id == tenant_id && movement.item_id == item_id)
            .cloned()
            .collect();

        let total = matched.len() as u64;
        let movements = matched
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect();

        Ok(MovementPage { movements, total })
    }
}
