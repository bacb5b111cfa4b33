//! Postgres-backed inventory repository.
//!
//! Persists items and their movement history in PostgreSQL. Tenant isolation
//! and the non-negative quantity invariant are enforced at the database
//! level.
//!
//! ## Schema
//!
//! ```sql
//! CREATE TABLE inventory_items (
//!     tenant_id     UUID        NOT NULL,
//!     id            UUID        NOT NULL,
//!     sku           TEXT        NOT NULL,
//!     name          TEXT        NOT NULL,
//!     description   TEXT,
//!     category_id   UUID,
//!     quantity      BIGINT      NOT NULL CHECK (quantity >= 0),
//!     min_quantity  BIGINT      NOT NULL DEFAULT 0,
//!     max_quantity  BIGINT,
//!     unit_price    BIGINT,
//!     location      TEXT,
//!     barcode       TEXT,
//!     tags          TEXT[]      NOT NULL DEFAULT '{}',
//!     metadata      JSONB       NOT NULL DEFAULT '{}',
//!     created_at    TIMESTAMPTZ NOT NULL DEFAULT NOW(),
//!     updated_at    TIMESTAMPTZ NOT NULL DEFAULT NOW(),
//!     PRIMARY KEY (tenant_id, id),
//!     UNIQUE (tenant_id, sku),
//!     UNIQUE (tenant_id, barcode)
//! );
//!
//! CREATE TABLE stock_movements (
//!     tenant_id            UUID        NOT NULL,
//!     id                   UUID        NOT NULL,
//!     item_id              UUID        NOT NULL,
//!     movement_type        TEXT        NOT NULL,
//!     quantity             BIGINT      NOT NULL,
//!     reason               TEXT,
//!     source_location      TEXT,
//!     destination_location TEXT,
//!     performed_by         UUID,
//!     created_at           TIMESTAMPTZ NOT NULL DEFAULT NOW(),
//!     PRIMARY KEY (tenant_id, id)
//! );
//! CREATE INDEX stock_movements_item ON stock_movements (tenant_id, item_id, created_at);
//! ```
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | RepositoryError | Scenario |
//! |------------|----------------------|-----------------|----------|
//! | Database (unique violation) | `23505` | `Conflict` | Duplicate SKU/barcode within a tenant |
//! | Database (check constraint violation) | `23514` | `Storage` (the guarded UPDATE refuses the debit first) | Defense in depth |
//! | Database (other) | Any other | `Storage` | Other database errors |
//! | PoolClosed / network | N/A | `Storage` | Connection failures |
//!
//! ## Concurrency
//!
//! Quantity changes use one guarded statement
//! (`SET quantity = quantity + $d ... WHERE ... AND quantity + $d >= 0`)
//! inside the same transaction as the movement INSERT, so read-modify-write
//! is serialized per item by the store and a crash between the two writes
//! cannot leave history inconsistent with state.

use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, Postgres, Row, Transaction};
use tracing::instrument;

use stockroom_core::{CategoryId, ItemId, MovementId, TenantId, UserId};
use stockroom_ledger::{
    InventoryItem, ItemDraft, ItemPatch, MovementType, QuantityChange, StockMovement,
    TransferRequest,
};

use super::{
    InventoryRepository, ItemFilter, ItemPage, MovementPage, NewMovement, RepositoryError,
    TransferRecord,
};

/// Postgres-backed inventory repository.
///
/// Uses the SQLx connection pool, which is thread-safe (`Arc + Send + Sync`).
/// Every query includes `tenant_id` in the WHERE clause or as part of the
/// primary key.
#[derive(Debug, Clone)]
pub struct PostgresInventoryRepository {
    pool: Arc<PgPool>,
}

impl PostgresInventoryRepository {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    #[instrument(skip(self, draft), fields(tenant_id = %tenant_id, sku = %draft.sku), err)]
    async fn insert_item(
        &self,
        tenant_id: TenantId,
        draft: ItemDraft,
    ) -> Result<InventoryItem, RepositoryError> {
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

        let tags: Vec<String> = item.tags.iter().cloned().collect();

        sqlx::query(
            r#"
            INSERT INTO inventory_items (
                tenant_id,
                id,
                sku,
                name,
                description,
                category_id,
                quantity,
                min_quantity,
                max_quantity,
                unit_price,
                location,
                barcode,
                tags,
                metadata,
                created_at,
                updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(item.id.as_uuid())
        .bind(&item.sku)
        .bind(&item.name)
        .bind(&item.description)
        .bind(item.category_id.map(|c| *c.as_uuid()))
        .bind(item.quantity)
        .bind(item.min_quantity)
        .bind(item.max_quantity)
        .bind(item.unit_price.map(|p| p as i64))
        .bind(&item.location)
        .bind(&item.barcode)
        .bind(&tags)
        .bind(&item.metadata)
        .bind(item.created_at)
        .bind(item.updated_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                RepositoryError::Conflict(
                    "sku or barcode already exists for this tenant".to_string(),
                )
            } else {
                map_sqlx_error("create_item", e)
            }
        })?;

        Ok(item)
    }

    #[instrument(skip(self, patch), fields(tenant_id = %tenant_id, item_id = %item_id), err)]
    async fn patch_item(
        &self,
        tenant_id: TenantId,
        item_id: ItemId,
        patch: ItemPatch,
    ) -> Result<InventoryItem, RepositoryError> {
        let tags: Option<Vec<String>> = patch.tags.map(|t| t.into_iter().collect());

        let row = sqlx::query(
            r#"
            UPDATE inventory_items SET
                sku = COALESCE($3, sku),
                name = COALESCE($4, name),
                description = COALESCE($5, description),
                category_id = COALESCE($6, category_id),
                min_quantity = COALESCE($7, min_quantity),
                max_quantity = COALESCE($8, max_quantity),
                unit_price = COALESCE($9, unit_price),
                location = COALESCE($10, location),
                barcode = COALESCE($11, barcode),
                tags = COALESCE($12::text[], tags),
                metadata = COALESCE($13::jsonb, metadata),
                updated_at = NOW()
            WHERE tenant_id = $1 AND id = $2
            RETURNING
                tenant_id, id, sku, name, description, category_id,
                quantity, min_quantity, max_quantity, unit_price,
                location, barcode, tags, metadata, created_at, updated_at
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(item_id.as_uuid())
        .bind(patch.sku)
        .bind(patch.name)
        .bind(patch.description)
        .bind(patch.category_id.map(|c| *c.as_uuid()))
        .bind(patch.min_quantity)
        .bind(patch.max_quantity)
        .bind(patch.unit_price.map(|p| p as i64))
        .bind(patch.location)
        .bind(patch.barcode)
        .bind(tags)
        .bind(patch.metadata)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                RepositoryError::Conflict(
                    "sku or barcode already exists for this tenant".to_string(),
                )
            } else {
                map_sqlx_error("update_item", e)
            }
        })?;

        match row {
            Some(row) => Ok(decode_item("update_item", &row)?),
            None => Err(RepositoryError::NotFound),
        }
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id, item_id = %item_id), err)]
    async fn fetch_item(
        &self,
        tenant_id: TenantId,
        item_id: ItemId,
    ) -> Result<Option<InventoryItem>, RepositoryError> {
        let row = sqlx::query(
            r#"
            SELECT
                tenant_id, id, sku, name, description, category_id,
                quantity, min_quantity, max_quantity, unit_price,
                location, barcode, tags, metadata, created_at, updated_at
            FROM inventory_items
            WHERE tenant_id = $1 AND id = $2
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(item_id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_item", e))?;

        row.map(|row| decode_item("get_item", &row)).transpose()
    }

    #[instrument(skip(self, filter), fields(tenant_id = %tenant_id), err)]
    async fn query_items(
        &self,
        tenant_id: TenantId,
        filter: &ItemFilter,
    ) -> Result<ItemPage, RepositoryError> {
        let category = filter.category_id.map(|c| *c.as_uuid());
        let search = filter
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty());
        let tags = &filter.tags;

        // The count uses the same predicate as the page so pagination
        // metadata always agrees with the returned rows.
        let count_row = sqlx::query(
            r#"
            SELECT COUNT(*) AS total
            FROM inventory_items
            WHERE tenant_id = $1
                AND ($2::uuid IS NULL OR category_id = $2)
                AND ($3::text IS NULL OR name ILIKE '%' || $3 || '%' OR sku ILIKE '%' || $3 || '%')
                AND (cardinality($4::text[]) = 0 OR tags @> $4)
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(category)
        .bind(search)
        .bind(tags)
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("count_items", e))?;

        let total: i64 = count_row
            .try_get("total")
            .map_err(|e| RepositoryError::storage("count_items", e.to_string()))?;

        let rows = sqlx::query(
            r#"
            SELECT
                tenant_id, id, sku, name, description, category_id,
                quantity, min_quantity, max_quantity, unit_price,
                location, barcode, tags, metadata, created_at, updated_at
            FROM inventory_items
            WHERE tenant_id = $1
                AND ($2::uuid IS NULL OR category_id = $2)
                AND ($3::text IS NULL OR name ILIKE '%' || $3 || '%' OR sku ILIKE '%' || $3 || '%')
                AND (cardinality($4::text[]) = 0 OR tags @> $4)
            ORDER BY updated_at DESC, id ASC
            LIMIT $5 OFFSET $6
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(category)
        .bind(search)
        .bind(tags)
        .bind(filter.limit)
        .bind(filter.offset)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_items", e))?;

        let mut items = Vec::with_capacity(rows.len());
        for row in rows {
            items.push(decode_item("list_items", &row)?);
        }

        Ok(ItemPage {
            items,
            total: total as u64,
        })
    }

    #[instrument(
        skip(self, movement),
        fields(tenant_id = %tenant_id, item_id = %item_id, movement_type = %movement.movement_type),
        err
    )]
    async fn apply_movement(
        &self,
        tenant_id: TenantId,
        item_id: ItemId,
        change: QuantityChange,
        movement: NewMovement,
    ) -> Result<(InventoryItem, StockMovement), RepositoryError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        let item = match change {
            QuantityChange::Delta(delta) => {
                apply_delta(&mut tx, tenant_id, item_id, delta).await?
            }
            QuantityChange::Set(target) => set_quantity(&mut tx, tenant_id, item_id, target).await?,
        };

        let movement = insert_movement(&mut tx, tenant_id, item_id, movement).await?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;

        Ok((item, movement))
    }

    #[instrument(
        skip(self, transfer),
        fields(
            tenant_id = %tenant_id,
            source = %source,
            destination = %destination,
            quantity = transfer.quantity
        ),
        err
    )]
    async fn apply_transfer(
        &self,
        tenant_id: TenantId,
        source: ItemId,
        destination: ItemId,
        transfer: &TransferRequest,
        performed_by: Option<UserId>,
    ) -> Result<TransferRecord, RepositoryError> {
        let quantity = transfer.quantity;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        // Update in item-id order so two opposite-direction transfers cannot
        // deadlock on each other's row locks.
        let (source_item, destination_item) = if source <= destination {
            let source_item = apply_delta(&mut tx, tenant_id, source, -quantity).await?;
            let destination_item = apply_delta(&mut tx, tenant_id, destination, quantity).await?;
            (source_item, destination_item)
        } else {
            let destination_item = apply_delta(&mut tx, tenant_id, destination, quantity).await?;
            let source_item = apply_delta(&mut tx, tenant_id, source, -quantity).await?;
            (source_item, destination_item)
        };

        let debit = insert_movement(
            &mut tx,
            tenant_id,
            source,
            NewMovement {
                movement_type: MovementType::Transfer,
                quantity,
                reason: transfer.reason.clone(),
                source_location: transfer.source_location.clone(),
                destination_location: transfer.destination_location.clone(),
                performed_by,
            },
        )
        .await?;

        let credit = insert_movement(
            &mut tx,
            tenant_id,
            destination,
            NewMovement {
                movement_type: MovementType::In,
                quantity,
                reason: transfer.reason.clone(),
                source_location: transfer.source_location.clone(),
                destination_location: transfer.destination_location.clone(),
                performed_by,
            },
        )
        .await?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;

        Ok(TransferRecord {
            source: source_item,
            destination: destination_item,
            debit,
            credit,
        })
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id, item_id = %item_id), err)]
    async fn query_movements(
        &self,
        tenant_id: TenantId,
        item_id: ItemId,
        limit: i64,
        offset: i64,
    ) -> Result<MovementPage, RepositoryError> {
        let count_row = sqlx::query(
            "SELECT COUNT(*) AS total FROM stock_movements WHERE tenant_id = $1 AND item_id = $2",
        )
        .bind(tenant_id.as_uuid())
        .bind(item_id.as_uuid())
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("count_movements", e))?;

        let total: i64 = count_row
            .try_get("total")
            .map_err(|e| RepositoryError::storage("count_movements", e.to_string()))?;

        // Oldest first: chronological order supports replaying the history.
        let rows = sqlx::query(
            r#"
            SELECT
                tenant_id, id, item_id, movement_type, quantity, reason,
                source_location, destination_location, performed_by, created_at
            FROM stock_movements
            WHERE tenant_id = $1 AND item_id = $2
            ORDER BY created_at ASC, id ASC
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(item_id.as_uuid())
        .bind(limit)
        .bind(offset)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_movements", e))?;

        let mut movements = Vec::with_capacity(rows.len());
        for row in rows {
            let decoded = MovementRow::from_row(&row)
                .map_err(|e| RepositoryError::storage("list_movements", e.to_string()))?;
            movements.push(decoded.into());
        }

        Ok(MovementPage {
            movements,
            total: total as u64,
        })
    }
}

#[async_trait::async_trait]
impl InventoryRepository for PostgresInventoryRepository {
    async fn create_item(
        &self,
        tenant_id: TenantId,
        draft: ItemDraft,
    ) -> Result<InventoryItem, RepositoryError> {
        self.insert_item(tenant_id, draft).await
    }

    async fn update_item(
        &self,
        tenant_id: TenantId,
        item_id: ItemId,
        patch: ItemPatch,
    ) -> Result<InventoryItem, RepositoryError> {
        self.patch_item(tenant_id, item_id, patch).await
    }

    async fn get_item(
        &self,
        tenant_id: TenantId,
        item_id: ItemId,
    ) -> Result<Option<InventoryItem>, RepositoryError> {
        self.fetch_item(tenant_id, item_id).await
    }

    async fn list_items(
        &self,
        tenant_id: TenantId,
        filter: &ItemFilter,
    ) -> Result<ItemPage, RepositoryError> {
        self.query_items(tenant_id, filter).await
    }

    async fn record_movement(
        &self,
        tenant_id: TenantId,
        item_id: ItemId,
        change: QuantityChange,
        movement: NewMovement,
    ) -> Result<(InventoryItem, StockMovement), RepositoryError> {
        self.apply_movement(tenant_id, item_id, change, movement).await
    }

    async fn record_transfer(
        &self,
        tenant_id: TenantId,
        source: ItemId,
        destination: ItemId,
        transfer: &TransferRequest,
        performed_by: Option<UserId>,
    ) -> Result<TransferRecord, RepositoryError> {
        self.apply_transfer(tenant_id, source, destination, transfer, performed_by)
            .await
    }

    async fn list_movements(
        &self,
        tenant_id: TenantId,
        item_id: ItemId,
        limit: i64,
        offset: i64,
    ) -> Result<MovementPage, RepositoryError> {
        self.query_movements(tenant_id, item_id, limit, offset).await
    }
}

/// Guarded increment/decrement: refuses results below zero without touching
/// the row. Zero matched rows is disambiguated into NotFound vs
/// InsufficientStock by a follow-up SELECT inside the same transaction.
async fn apply_delta(
    tx: &mut Transaction<'_, Postgres>,
    tenant_id: TenantId,
    item_id: ItemId,
    delta: i64,
) -> Result<InventoryItem, RepositoryError> {
    let row = sqlx::query(
        r#"
        UPDATE inventory_items
        SET quantity = quantity + $3, updated_at = NOW()
        WHERE tenant_id = $1 AND id = $2 AND quantity + $3 >= 0
        RETURNING
            tenant_id, id, sku, name, description, category_id,
            quantity, min_quantity, max_quantity, unit_price,
            location, barcode, tags, metadata, created_at, updated_at
        "#,
    )
    .bind(tenant_id.as_uuid())
    .bind(item_id.as_uuid())
    .bind(delta)
    .fetch_optional(&mut **tx)
    .await
    .map_err(|e| map_sqlx_error("apply_delta", e))?;

    if let Some(row) = row {
        return decode_item("apply_delta", &row);
    }

    let existing = sqlx::query("SELECT quantity FROM inventory_items WHERE tenant_id = $1 AND id = $2")
        .bind(tenant_id.as_uuid())
        .bind(item_id.as_uuid())
        .fetch_optional(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("apply_delta", e))?;

    match existing {
        Some(row) => {
            let available: i64 = row
                .try_get("quantity")
                .map_err(|e| RepositoryError::storage("apply_delta", e.to_string()))?;
            Err(RepositoryError::InsufficientStock {
                available,
                requested: -delta,
            })
        }
        None => Err(RepositoryError::NotFound),
    }
}

/// Absolute quantity set (stock count correction).
async fn set_quantity(
    tx: &mut Transaction<'_, Postgres>,
    tenant_id: TenantId,
    item_id: ItemId,
    target: i64,
) -> Result<InventoryItem, RepositoryError> {
    let row = sqlx::query(
        r#"
        UPDATE inventory_items
        SET quantity = $3, updated_at = NOW()
        WHERE tenant_id = $1 AND id = $2
        RETURNING
            tenant_id, id, sku, name, description, category_id,
            quantity, min_quantity, max_quantity, unit_price,
            location, barcode, tags, metadata, created_at, updated_at
        "#,
    )
    .bind(tenant_id.as_uuid())
    .bind(item_id.as_uuid())
    .bind(target)
    .fetch_optional(&mut **tx)
    .await
    .map_err(|e| map_sqlx_error("set_quantity", e))?;

    match row {
        Some(row) => decode_item("set_quantity", &row),
        None => Err(RepositoryError::NotFound),
    }
}

async fn insert_movement(
    tx: &mut Transaction<'_, Postgres>,
    tenant_id: TenantId,
    item_id: ItemId,
    new: NewMovement,
) -> Result<StockMovement, RepositoryError> {
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

    sqlx::query(
        r#"
        INSERT INTO stock_movements (
            tenant_id,
            id,
            item_id,
            movement_type,
            quantity,
            reason,
            source_location,
            destination_location,
            performed_by,
            created_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        "#,
    )
    .bind(tenant_id.as_uuid())
    .bind(movement.id.as_uuid())
    .bind(item_id.as_uuid())
    .bind(movement.movement_type.as_str())
    .bind(movement.quantity)
    .bind(&movement.reason)
    .bind(&movement.source_location)
    .bind(&movement.destination_location)
    .bind(movement.performed_by.map(|u| *u.as_uuid()))
    .bind(movement.created_at)
    .execute(&mut **tx)
    .await
    .map_err(|e| map_sqlx_error("insert_movement", e))?;

    Ok(movement)
}

/// Map SQLx errors to RepositoryError with operation context.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> RepositoryError {
    match err {
        sqlx::Error::Database(db_err) => {
            let message = format!("database error: {}", db_err.message());
            if db_err.code().as_deref() == Some("23505") {
                RepositoryError::Conflict(message)
            } else {
                RepositoryError::storage(operation, message)
            }
        }
        sqlx::Error::PoolClosed => RepositoryError::storage(operation, "connection pool closed"),
        other => RepositoryError::storage(operation, other.to_string()),
    }
}

/// Check if an error is a unique constraint violation.
fn is_unique_violation(err: &sqlx::Error) -> bool {
    if let sqlx::Error::Database(db_err) = err {
        if let Some(code) = db_err.code() {
            return code.as_ref() == "23505";
        }
    }
    false
}

fn decode_item(operation: &str, row: &sqlx::postgres::PgRow) -> Result<InventoryItem, RepositoryError> {
    ItemRow::from_row(row)
        .map(Into::into)
        .map_err(|e| RepositoryError::storage(operation, format!("failed to decode item row: {e}")))
}

// SQLx row types

#[derive(Debug)]
struct ItemRow {
    tenant_id: uuid::Uuid,
    id: uuid::Uuid,
    sku: String,
    name: String,
    description: Option<String>,
    category_id: Option<uuid::Uuid>,
    quantity: i64,
    min_quantity: i64,
    max_quantity: Option<i64>,
    unit_price: Option<i64>,
    location: Option<String>,
    barcode: Option<String>,
    tags: Vec<String>,
    metadata: serde_json::Value,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for ItemRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(ItemRow {
            tenant_id: row.try_get("tenant_id")?,
            id: row.try_get("id")?,
            sku: row.try_get("sku")?,
            name: row.try_get("name")?,
            description: row.try_get("description")?,
            category_id: row.try_get("category_id")?,
            quantity: row.try_get("quantity")?,
            min_quantity: row.try_get("min_quantity")?,
            max_quantity: row.try_get("max_quantity")?,
            unit_price: row.try_get("unit_price")?,
            location: row.try_get("location")?,
            barcode: row.try_get("barcode")?,
            tags: row.try_get("tags")?,
            metadata: row.try_get("metadata")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl From<ItemRow> for InventoryItem {
    fn from(row: ItemRow) -> Self {
        InventoryItem {
            id: ItemId::from_uuid(row.id),
            tenant_id: TenantId::from_uuid(row.tenant_id),
            sku: row.sku,
            name: row.name,
            description: row.description,
            category_id: row.category_id.map(CategoryId::from_uuid),
            quantity: row.quantity,
            min_quantity: row.min_quantity,
            max_quantity: row.max_quantity,
            unit_price: row.unit_price.map(|p| p as u64),
            location: row.location,
            barcode: row.barcode,
            tags: row.tags.into_iter().collect(),
            metadata: row.metadata,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug)]
struct MovementRow {
    tenant_id: uuid::Uuid,
    id: uuid::Uuid,
    item_id: uuid::Uuid,
    movement_type: MovementType,
    quantity: i64,
    reason: Option<String>,
    source_location: Option<String>,
    destination_location: Option<String>,
    performed_by: Option<uuid::Uuid>,
    created_at: DateTime<Utc>,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for MovementRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        let raw_type: String = row.try_get("movement_type")?;
        let movement_type = MovementType::from_str(&raw_type).map_err(|e| {
            sqlx::Error::ColumnDecode {
                index: "movement_type".to_string(),
                source: Box::new(e),
            }
        })?;

        Ok(MovementRow {
            tenant_id: row.try_get("tenant_id")?,
            id: row.try_get("id")?,
            item_id: row.try_get("item_id")?,
            movement_type,
            quantity: row.try_get("quantity")?,
            reason: row.try_get("reason")?,
            source_location: row.try_get("source_location")?,
            destination_location: row.try_get("destination_location")?,
            performed_by: row.try_get("performed_by")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

impl From<MovementRow> for StockMovement {
    fn from(row: MovementRow) -> Self {
        StockMovement {
            id: MovementId::from_uuid(row.id),
            tenant_id: TenantId::from_uuid(row.tenant_id),
            item_id: ItemId::from_uuid(row.item_id),
            movement_type: row.movement_type,
            quantity: row.quantity,
            reason: row.reason,
            source_location: row.source_location,
            destination_location: row.destination_location,
            performed_by: row.performed_by.map(UserId::from_uuid),
            created_at: row.created_at,
        }
    }
}
