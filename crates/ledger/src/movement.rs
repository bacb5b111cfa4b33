use core::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockroom_core::{DomainError, ItemId, MovementId, TenantId, UserId};

/// Kind of quantity change a movement represents.
///
/// `quantity` on a movement is always a positive magnitude; the sign (or, for
/// `Adjust`, absolute-set semantics) is derived from the type.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MovementType {
    /// Goods received: quantity is credited.
    In,
    /// Goods consumed: quantity is debited.
    Out,
    /// Stock count correction: quantity is set to the recorded value.
    Adjust,
    /// Goods leave this item for another item/location: quantity is debited.
    Transfer,
    /// Goods sold: quantity is debited.
    Sale,
}

impl MovementType {
    pub fn as_str(self) -> &'static str {
        match self {
            MovementType::In => "in",
            MovementType::Out => "out",
            MovementType::Adjust => "adjust",
            MovementType::Transfer => "transfer",
            MovementType::Sale => "sale",
        }
    }

    /// Whether the type debits stock (and can therefore be rejected for
    /// insufficiency).
    pub fn is_debit(self) -> bool {
        matches!(
            self,
            MovementType::Out | MovementType::Transfer | MovementType::Sale
        )
    }
}

impl FromStr for MovementType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "in" => Ok(MovementType::In),
            "out" => Ok(MovementType::Out),
            "adjust" => Ok(MovementType::Adjust),
            "transfer" => Ok(MovementType::Transfer),
            "sale" => Ok(MovementType::Sale),
            other => Err(DomainError::validation(format!(
                "unknown movement type: {other}"
            ))),
        }
    }
}

impl core::fmt::Display for MovementType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A movement intent against a single item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementRequest {
    pub movement_type: MovementType,
    /// Positive magnitude; for `Adjust`, the absolute target quantity (>= 0).
    pub quantity: i64,
    pub reason: Option<String>,
    pub source_location: Option<String>,
    pub destination_location: Option<String>,
}

impl MovementRequest {
    pub fn new(movement_type: MovementType, quantity: i64) -> Self {
        Self {
            movement_type,
            quantity,
            reason: None,
            source_location: None,
            destination_location: None,
        }
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        match self.movement_type {
            MovementType::Adjust => {
                if self.quantity < 0 {
                    return Err(DomainError::validation(
                        "adjusted quantity cannot be negative",
                    ));
                }
            }
            _ => {
                if self.quantity <= 0 {
                    return Err(DomainError::validation("quantity must be positive"));
                }
            }
        }
        if self.movement_type == MovementType::Transfer
            && self
                .destination_location
                .as_deref()
                .is_none_or(|loc| loc.trim().is_empty())
        {
            return Err(DomainError::validation(
                "transfer requires a destination location",
            ));
        }
        Ok(())
    }

    /// The storage-level change this request maps to.
    pub fn quantity_change(&self) -> QuantityChange {
        match self.movement_type {
            MovementType::In => QuantityChange::Delta(self.quantity),
            MovementType::Adjust => QuantityChange::Set(self.quantity),
            MovementType::Out | MovementType::Transfer | MovementType::Sale => {
                QuantityChange::Delta(-self.quantity)
            }
        }
    }
}

/// A transfer intent between two items of the same tenant.
///
/// The debit leg is recorded as a `Transfer` movement on the source item and
/// the credit leg as an `In` movement on the destination item, both inside one
/// unit of work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRequest {
    pub quantity: i64,
    pub reason: Option<String>,
    pub source_location: Option<String>,
    pub destination_location: Option<String>,
}

impl TransferRequest {
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.quantity <= 0 {
            return Err(DomainError::validation("quantity must be positive"));
        }
        Ok(())
    }
}

/// Immutable audit record of one quantity change.
///
/// Once persisted a movement is never updated or deleted; the movement history
/// is the system's source of truth for reconstructing an item's quantity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockMovement {
    pub id: MovementId,
    pub tenant_id: TenantId,
    pub item_id: ItemId,
    pub movement_type: MovementType,
    /// Positive magnitude; for `Adjust`, the absolute quantity that was set.
    pub quantity: i64,
    pub reason: Option<String>,
    pub source_location: Option<String>,
    pub destination_location: Option<String>,
    pub performed_by: Option<UserId>,
    pub created_at: DateTime<Utc>,
}

/// Storage-level quantity change derived from a movement request.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum QuantityChange {
    /// Increment/decrement by a signed amount; the store rejects results < 0.
    Delta(i64),
    /// Set to an absolute value (stock count correction).
    Set(i64),
}

/// Compute the quantity an item would hold after `request`.
///
/// Pure decision logic; the guarded storage statement re-checks the
/// non-negativity invariant under concurrency, so this is the early,
/// user-facing validation step.
pub fn transition(current: i64, request: &MovementRequest) -> Result<i64, DomainError> {
    request.validate()?;
    match request.movement_type {
        MovementType::In => Ok(current + request.quantity),
        MovementType::Adjust => Ok(request.quantity),
        MovementType::Out | MovementType::Transfer | MovementType::Sale => {
            if current < request.quantity {
                return Err(DomainError::insufficient_stock(current, request.quantity));
            }
            Ok(current - request.quantity)
        }
    }
}

/// Replay a movement history from `initial`, in creation order.
///
/// For any committed item this reproduces the stored quantity exactly.
pub fn replay(initial: i64, movements: &[StockMovement]) -> i64 {
    movements.iter().fold(initial, |quantity, movement| {
        match movement.movement_type {
            MovementType::In => quantity + movement.quantity,
            MovementType::Adjust => movement.quantity,
            MovementType::Out | MovementType::Transfer | MovementType::Sale => {
                quantity - movement.quantity
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn movement(movement_type: MovementType, quantity: i64) -> StockMovement {
        StockMovement {
            id: MovementId::new(),
            tenant_id: TenantId::new(),
            item_id: ItemId::new(),
            movement_type,
            quantity,
            reason: None,
            source_location: None,
            destination_location: Some("main".to_string()),
            performed_by: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn inbound_credits_stock() {
        let request = MovementRequest::new(MovementType::In, 50);
        assert_eq!(transition(0, &request).unwrap(), 50);
    }

    #[test]
    fn outbound_debits_stock() {
        let request = MovementRequest::new(MovementType::Out, 3);
        assert_eq!(transition(10, &request).unwrap(), 7);
    }

    #[test]
    fn outbound_exceeding_stock_is_rejected() {
        let request = MovementRequest::new(MovementType::Out, 15);
        assert_eq!(
            transition(10, &request).unwrap_err(),
            DomainError::InsufficientStock {
                available: 10,
                requested: 15,
            }
        );
    }

    #[test]
    fn sale_exceeding_stock_is_rejected() {
        let request = MovementRequest::new(MovementType::Sale, 1);
        assert!(matches!(
            transition(0, &request),
            Err(DomainError::InsufficientStock { .. })
        ));
    }

    #[test]
    fn adjust_sets_absolute_quantity() {
        let request = MovementRequest::new(MovementType::Adjust, 7);
        assert_eq!(transition(10, &request).unwrap(), 7);
    }

    #[test]
    fn adjust_to_zero_is_allowed() {
        let request = MovementRequest::new(MovementType::Adjust, 0);
        assert_eq!(transition(10, &request).unwrap(), 0);
    }

    #[test]
    fn zero_quantity_is_rejected_for_non_adjust() {
        for movement_type in [
            MovementType::In,
            MovementType::Out,
            MovementType::Transfer,
            MovementType::Sale,
        ] {
            let request = MovementRequest::new(movement_type, 0);
            assert!(
                matches!(transition(10, &request), Err(DomainError::Validation(_))),
                "{movement_type} accepted zero quantity"
            );
        }
    }

    #[test]
    fn transfer_requires_destination_location() {
        let request = MovementRequest::new(MovementType::Transfer, 5);
        assert!(matches!(
            transition(10, &request),
            Err(DomainError::Validation(_))
        ));

        let mut request = MovementRequest::new(MovementType::Transfer, 5);
        request.destination_location = Some("warehouse-b".to_string());
        assert_eq!(transition(10, &request).unwrap(), 5);
    }

    #[test]
    fn movement_type_round_trips_through_str() {
        for movement_type in [
            MovementType::In,
            MovementType::Out,
            MovementType::Adjust,
            MovementType::Transfer,
            MovementType::Sale,
        ] {
            assert_eq!(
                movement_type.as_str().parse::<MovementType>().unwrap(),
                movement_type
            );
        }
    }

    #[test]
    fn replay_reconstructs_quantity() {
        let history = vec![
            movement(MovementType::In, 50),
            movement(MovementType::Out, 8),
            movement(MovementType::Adjust, 30),
            movement(MovementType::Sale, 5),
            movement(MovementType::Transfer, 10),
        ];
        assert_eq!(replay(0, &history), 15);
    }

    proptest! {
        /// A committed transition never produces a negative quantity.
        #[test]
        fn transition_preserves_non_negativity(
            current in 0i64..1_000_000,
            quantity in 0i64..1_000_000,
            type_idx in 0usize..5,
        ) {
            let movement_type = [
                MovementType::In,
                MovementType::Out,
                MovementType::Adjust,
                MovementType::Transfer,
                MovementType::Sale,
            ][type_idx];
            let mut request = MovementRequest::new(movement_type, quantity);
            request.destination_location = Some("main".to_string());

            if let Ok(next) = transition(current, &request) {
                prop_assert!(next >= 0);
            }
        }

        /// Debits succeed exactly when stock is sufficient.
        #[test]
        fn debit_succeeds_iff_sufficient(
            current in 0i64..1_000_000,
            quantity in 1i64..1_000_000,
        ) {
            let request = MovementRequest::new(MovementType::Out, quantity);
            match transition(current, &request) {
                Ok(next) => {
                    prop_assert!(current >= quantity);
                    prop_assert_eq!(next, current - quantity);
                }
                Err(DomainError::InsufficientStock { available, requested }) => {
                    prop_assert!(current < quantity);
                    prop_assert_eq!(available, current);
                    prop_assert_eq!(requested, quantity);
                }
                Err(other) => prop_assert!(false, "unexpected error: {}", other),
            }
        }

        /// Replaying the movements produced by a run of transitions lands on
        /// the same quantity the transitions computed.
        #[test]
        fn replay_matches_applied_transitions(
            initial in 0i64..10_000,
            steps in proptest::collection::vec((0usize..5, 0i64..100), 0..40),
        ) {
            let mut quantity = initial;
            let mut history = Vec::new();

            for (type_idx, raw_quantity) in steps {
                let movement_type = [
                    MovementType::In,
                    MovementType::Out,
                    MovementType::Adjust,
                    MovementType::Transfer,
                    MovementType::Sale,
                ][type_idx];
                let mut request = MovementRequest::new(movement_type, raw_quantity);
                request.destination_location = Some("main".to_string());

                if let Ok(next) = transition(quantity, &request) {
                    quantity = next;
                    history.push(movement(movement_type, raw_quantity));
                }
            }

            prop_assert_eq!(replay(initial, &history), quantity);
        }
    }
}
