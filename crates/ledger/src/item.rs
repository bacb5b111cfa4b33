use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockroom_core::{CategoryId, DomainError, ItemId, TenantId};

/// One stock-keeping unit within a tenant.
///
/// `quantity` is the authoritative current-state projection of the item's
/// movement history; it is mutated only through the stock ledger, never by a
/// direct field edit. All other fields are plain catalog data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryItem {
    pub id: ItemId,
    pub tenant_id: TenantId,
    /// Stock-keeping unit code, unique within the tenant.
    pub sku: String,
    pub name: String,
    pub description: Option<String>,
    pub category_id: Option<CategoryId>,
    /// Current on-hand quantity. Never negative after a committed movement.
    pub quantity: i64,
    /// Reorder threshold.
    pub min_quantity: i64,
    /// Optional capacity cap (informational, not enforced by transitions).
    pub max_quantity: Option<i64>,
    /// Unit price in the smallest currency unit (e.g. cents).
    pub unit_price: Option<u64>,
    pub location: Option<String>,
    /// Unique within the tenant when present.
    pub barcode: Option<String>,
    pub tags: BTreeSet<String>,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl InventoryItem {
    /// Whether the item has fallen to or below its reorder threshold.
    pub fn is_below_minimum(&self) -> bool {
        self.quantity < self.min_quantity
    }

    pub fn is_above_maximum(&self) -> bool {
        self.max_quantity.is_some_and(|max| self.quantity > max)
    }
}

/// Fields for creating a new item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemDraft {
    pub sku: String,
    pub name: String,
    pub description: Option<String>,
    pub category_id: Option<CategoryId>,
    /// Opening quantity. Defaults to 0.
    pub initial_quantity: i64,
    pub min_quantity: i64,
    pub max_quantity: Option<i64>,
    pub unit_price: Option<u64>,
    pub location: Option<String>,
    pub barcode: Option<String>,
    pub tags: BTreeSet<String>,
    pub metadata: serde_json::Value,
}

impl ItemDraft {
    pub fn new(sku: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            sku: sku.into(),
            name: name.into(),
            description: None,
            category_id: None,
            initial_quantity: 0,
            min_quantity: 0,
            max_quantity: None,
            unit_price: None,
            location: None,
            barcode: None,
            tags: BTreeSet::new(),
            metadata: serde_json::Value::Object(Default::default()),
        }
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        if self.sku.trim().is_empty() {
            return Err(DomainError::validation("sku cannot be empty"));
        }
        if self.name.trim().is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }
        if self.initial_quantity < 0 {
            return Err(DomainError::validation("initial quantity cannot be negative"));
        }
        if self.min_quantity < 0 {
            return Err(DomainError::validation("minimum quantity cannot be negative"));
        }
        if let Some(max) = self.max_quantity {
            if max < self.min_quantity {
                return Err(DomainError::validation(
                    "maximum quantity cannot be below minimum quantity",
                ));
            }
        }
        if let Some(barcode) = &self.barcode {
            if barcode.trim().is_empty() {
                return Err(DomainError::validation("barcode cannot be blank"));
            }
        }
        Ok(())
    }
}

/// Partial update of an item's catalog fields.
///
/// Only supplied (`Some`) fields are written. There is deliberately no
/// `quantity` field: quantity changes go through the stock ledger so every
/// change leaves a movement record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemPatch {
    pub sku: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub category_id: Option<CategoryId>,
    pub min_quantity: Option<i64>,
    pub max_quantity: Option<i64>,
    pub unit_price: Option<u64>,
    pub location: Option<String>,
    pub barcode: Option<String>,
    pub tags: Option<BTreeSet<String>>,
    pub metadata: Option<serde_json::Value>,
}

impl ItemPatch {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        if let Some(sku) = &self.sku {
            if sku.trim().is_empty() {
                return Err(DomainError::validation("sku cannot be empty"));
            }
        }
        if let Some(name) = &self.name {
            if name.trim().is_empty() {
                return Err(DomainError::validation("name cannot be empty"));
            }
        }
        if let Some(min) = self.min_quantity {
            if min < 0 {
                return Err(DomainError::validation("minimum quantity cannot be negative"));
            }
        }
        Ok(())
    }

    /// Apply the supplied fields to `item` (in-memory repositories; the
    /// Postgres implementation expresses the same semantics with COALESCE).
    pub fn apply(&self, item: &mut InventoryItem, now: DateTime<Utc>) {
        if let Some(sku) = &self.sku {
            item.sku = sku.clone();
        }
        if let Some(name) = &self.name {
            item.name = name.clone();
        }
        if let Some(description) = &self.description {
            item.description = Some(description.clone());
        }
        if let Some(category_id) = self.category_id {
            item.category_id = Some(category_id);
        }
        if let Some(min) = self.min_quantity {
            item.min_quantity = min;
        }
        if let Some(max) = self.max_quantity {
            item.max_quantity = Some(max);
        }
        if let Some(price) = self.unit_price {
            item.unit_price = Some(price);
        }
        if let Some(location) = &self.location {
            item.location = Some(location.clone());
        }
        if let Some(barcode) = &self.barcode {
            item.barcode = Some(barcode.clone());
        }
        if let Some(tags) = &self.tags {
            item.tags = tags.clone();
        }
        if let Some(metadata) = &self.metadata {
            item.metadata = metadata.clone();
        }
        item.updated_at = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn draft_defaults_to_zero_quantity() {
        let draft = ItemDraft::new("SKU-001", "Widget");
        assert_eq!(draft.initial_quantity, 0);
        assert!(draft.validate().is_ok());
    }

    #[test]
    fn draft_rejects_blank_sku() {
        let draft = ItemDraft::new("   ", "Widget");
        assert!(matches!(
            draft.validate(),
            Err(DomainError::Validation(_))
        ));
    }

    #[test]
    fn draft_rejects_negative_opening_quantity() {
        let mut draft = ItemDraft::new("SKU-001", "Widget");
        draft.initial_quantity = -1;
        assert!(matches!(
            draft.validate(),
            Err(DomainError::Validation(_))
        ));
    }

    #[test]
    fn draft_rejects_max_below_min() {
        let mut draft = ItemDraft::new("SKU-001", "Widget");
        draft.min_quantity = 10;
        draft.max_quantity = Some(5);
        assert!(draft.validate().is_err());
    }

    #[test]
    fn patch_applies_only_supplied_fields() {
        let now = Utc::now();
        let mut item = InventoryItem {
            id: ItemId::new(),
            tenant_id: TenantId::new(),
            sku: "SKU-001".to_string(),
            name: "Widget".to_string(),
            description: Some("blue".to_string()),
            category_id: None,
            quantity: 3,
            min_quantity: 1,
            max_quantity: None,
            unit_price: Some(250),
            location: None,
            barcode: None,
            tags: BTreeSet::new(),
            metadata: serde_json::Value::Object(Default::default()),
            created_at: now,
            updated_at: now,
        };

        let patch = ItemPatch {
            name: Some("Widget Mk2".to_string()),
            min_quantity: Some(4),
            ..Default::default()
        };
        patch.apply(&mut item, now);

        assert_eq!(item.name, "Widget Mk2");
        assert_eq!(item.min_quantity, 4);
        // Untouched fields keep their values; quantity is not reachable at all.
        assert_eq!(item.sku, "SKU-001");
        assert_eq!(item.description.as_deref(), Some("blue"));
        assert_eq!(item.quantity, 3);
    }

    #[test]
    fn below_minimum_flags_reorder() {
        let now = Utc::now();
        let item = InventoryItem {
            id: ItemId::new(),
            tenant_id: TenantId::new(),
            sku: "SKU-001".to_string(),
            name: "Widget".to_string(),
            description: None,
            category_id: None,
            quantity: 2,
            min_quantity: 5,
            max_quantity: Some(10),
            unit_price: None,
            location: None,
            barcode: None,
            tags: BTreeSet::new(),
            metadata: serde_json::Value::Object(Default::default()),
            created_at: now,
            updated_at: now,
        };
        assert!(item.is_below_minimum());
        assert!(!item.is_above_maximum());
    }
}
