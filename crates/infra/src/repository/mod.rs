//! Persistence layer for inventory items and stock movements.
//!
//! Every operation takes the tenant identifier explicitly; the tenant
//! predicate is mandatory on every statement, never optional, so cross-tenant
//! reads and writes are architecturally impossible.

mod in_memory;
mod postgres;

pub use in_memory::InMemoryInventoryRepository;
pub use postgres::PostgresInventoryRepository;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use stockroom_core::{CategoryId, ItemId, TenantId, UserId};
use stockroom_ledger::{
    InventoryItem, ItemDraft, ItemPatch, MovementRequest, MovementType, QuantityChange,
    StockMovement, TransferRequest,
};

/// Repository operation error.
///
/// These are persistence-layer failures; deterministic domain failures
/// (validation) are rejected before the repository is reached. No retries
/// happen at this layer: movement inserts are not idempotent, so blind
/// retries could double-apply.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Unique constraint violation (duplicate SKU/barcode for the tenant).
    #[error("conflict: {0}")]
    Conflict(String),

    /// No row matches `(tenant_id, id)`.
    #[error("not found")]
    NotFound,

    /// The guarded quantity update refused a debit below zero.
    #[error("insufficient stock: requested {requested}, available {available}")]
    InsufficientStock { available: i64, requested: i64 },

    /// Underlying storage failure, wrapped with operation context.
    #[error("storage error in {operation}: {message}")]
    Storage { operation: String, message: String },
}

impl RepositoryError {
    pub fn storage(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Storage {
            operation: operation.into(),
            message: message.into(),
        }
    }
}

/// Filter for item listings. `search` matches name or SKU case-insensitively;
/// `tags` requires every listed tag to be present on the item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemFilter {
    pub category_id: Option<CategoryId>,
    pub search: Option<String>,
    pub tags: Vec<String>,
    pub limit: i64,
    pub offset: i64,
}

impl Default for ItemFilter {
    fn default() -> Self {
        Self {
            category_id: None,
            search: None,
            tags: Vec::new(),
            limit: 50,
            offset: 0,
        }
    }
}

/// One page of items plus the total count under the same filter predicate
/// (so pagination metadata always agrees with the returned page).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemPage {
    pub items: Vec<InventoryItem>,
    pub total: u64,
}

/// One page of an item's movement history, oldest first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovementPage {
    pub movements: Vec<StockMovement>,
    pub total: u64,
}

/// A movement to persist; id and timestamp are assigned by the repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMovement {
    pub movement_type: MovementType,
    pub quantity: i64,
    pub reason: Option<String>,
    pub source_location: Option<String>,
    pub destination_location: Option<String>,
    pub performed_by: Option<UserId>,
}

impl NewMovement {
    pub fn from_request(request: &MovementRequest, performed_by: Option<UserId>) -> Self {
        Self {
            movement_type: request.movement_type,
            quantity: request.quantity,
            reason: request.reason.clone(),
            source_location: request.source_location.clone(),
            destination_location: request.destination_location.clone(),
            performed_by,
        }
    }
}

/// Result of a committed two-leg transfer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferRecord {
    pub source: InventoryItem,
    pub destination: InventoryItem,
    pub debit: StockMovement,
    pub credit: StockMovement,
}

/// Tenant-scoped persistence for items and their movement history.
///
/// Implementations must:
/// - include the tenant identifier in every lookup and mutation
/// - serialize quantity read-modify-write per item (`record_movement` and
///   `record_transfer` are single atomic units: quantity change and movement
///   rows commit together or not at all)
/// - treat "exists under another tenant" exactly like "does not exist"
#[async_trait]
pub trait InventoryRepository: Send + Sync {
    /// Insert a new item. Fails with [`RepositoryError::Conflict`] when the
    /// SKU or barcode is already taken within the tenant.
    async fn create_item(
        &self,
        tenant_id: TenantId,
        draft: ItemDraft,
    ) -> Result<InventoryItem, RepositoryError>;

    /// Update only the supplied catalog fields of `(tenant_id, item_id)`.
    async fn update_item(
        &self,
        tenant_id: TenantId,
        item_id: ItemId,
        patch: ItemPatch,
    ) -> Result<InventoryItem, RepositoryError>;

    async fn get_item(
        &self,
        tenant_id: TenantId,
        item_id: ItemId,
    ) -> Result<Option<InventoryItem>, RepositoryError>;

    async fn list_items(
        &self,
        tenant_id: TenantId,
        filter: &ItemFilter,
    ) -> Result<ItemPage, RepositoryError>;

    /// Apply a quantity change and record the movement as one atomic unit.
    ///
    /// Delta changes are guarded in the store (`quantity + delta >= 0`), so a
    /// concurrent debit can never take the quantity negative; the losing
    /// request gets [`RepositoryError::InsufficientStock`].
    async fn record_movement(
        &self,
        tenant_id: TenantId,
        item_id: ItemId,
        change: QuantityChange,
        movement: NewMovement,
    ) -> Result<(InventoryItem, StockMovement), RepositoryError>;

    /// Debit `source`, credit `destination`, and record both movement legs in
    /// one atomic unit of work.
    async fn record_transfer(
        &self,
        tenant_id: TenantId,
        source: ItemId,
        destination: ItemId,
        transfer: &TransferRequest,
        performed_by: Option<UserId>,
    ) -> Result<TransferRecord, RepositoryError>;

    /// Movement history for one item, oldest first.
    async fn list_movements(
        &self,
        tenant_id: TenantId,
        item_id: ItemId,
        limit: i64,
        offset: i64,
    ) -> Result<MovementPage, RepositoryError>;
}
