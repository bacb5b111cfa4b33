//! Inventory ledger domain module.
//!
//! This crate contains the business rules for stock items and their movement
//! history, implemented purely as deterministic domain logic (no IO, no HTTP,
//! no storage).

pub mod item;
pub mod movement;

pub use item::{InventoryItem, ItemDraft, ItemPatch};
pub use movement::{
    MovementRequest, MovementType, QuantityChange, StockMovement, TransferRequest, replay,
    transition,
};
