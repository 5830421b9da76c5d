//! Stock arithmetic behind every ledger operation.
//!
//! The backend loads the relevant rows under lock, asks these functions
//! whether the movement is allowed and what it amounts to, and applies the
//! answer inside the same transaction. Nothing in here touches storage.

use std::collections::BTreeMap;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::StockError;
use crate::models::{
    InvoiceStatus, ProductStructure, ProductTransferStatus, RawMaterialTransferStatus,
};
use crate::validation::QUANTITY_SCALE;

/// Raw material needed to produce a given quantity of a product
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaterialRequirement {
    pub raw_material_id: Uuid,
    pub name: String,
    pub unit: String,
    pub quantity: Decimal,
}

/// Requested withdrawal against a balance row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Demand {
    pub id: Uuid,
    pub quantity: Decimal,
}

/// Balance of one stock row as read inside the transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct StockLevel {
    pub id: Uuid,
    pub name: String,
    pub available: Decimal,
}

/// Issuance batch offered to a manufacturing completion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct IssuedBatch {
    pub id: Uuid,
    pub user_id: Uuid,
    pub raw_material_id: Uuid,
    pub quantity_issued: Decimal,
    pub status: RawMaterialTransferStatus,
}

/// Effect of an invoice change on finished-goods stock
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReservationChange {
    /// Take the invoiced quantities out of stock
    Reserve,
    /// Put the invoiced quantities back
    Release,
    Unchanged,
}

pub fn ensure_positive(field: &str, quantity: Decimal) -> Result<(), StockError> {
    if quantity <= Decimal::ZERO {
        return Err(StockError::invalid(field, "Quantity must be positive"));
    }
    Ok(())
}

/// Scale a product's bill of materials by `quantity`.
///
/// Lines belonging to other products are ignored. The result is ordered by
/// raw material id so callers lock rows in a stable order. Each quantity is
/// rounded once to the stored scale, so the debit, the consumption row and a
/// later restore all carry the same value.
pub fn resolve_requirements(
    product_id: Uuid,
    structure: &[ProductStructure],
    quantity: Decimal,
) -> Result<Vec<MaterialRequirement>, StockError> {
    ensure_positive("quantity", quantity)?;

    let mut merged: BTreeMap<Uuid, MaterialRequirement> = BTreeMap::new();
    for line in structure.iter().filter(|l| l.product_id == product_id) {
        let entry = merged
            .entry(line.raw_material_id)
            .or_insert_with(|| MaterialRequirement {
                raw_material_id: line.raw_material_id,
                name: line.raw_material_name.clone(),
                unit: line.unit.clone(),
                quantity: Decimal::ZERO,
            });
        entry.quantity += line.quantity_required * quantity;
    }

    if merged.is_empty() {
        return Err(StockError::NoStructureDefined { product_id });
    }

    merged
        .into_values()
        .map(|mut requirement| {
            requirement.quantity = requirement
                .quantity
                .round_dp_with_strategy(QUANTITY_SCALE, RoundingStrategy::MidpointAwayFromZero);
            if requirement.quantity.is_zero() {
                return Err(StockError::invalid(
                    "quantity",
                    "Quantity is too small to draw any of the bill of materials",
                ));
            }
            Ok(requirement)
        })
        .collect()
}

/// Validate and sum demands per row, ordered by id
pub fn aggregate_demands(demands: &[Demand]) -> Result<Vec<Demand>, StockError> {
    if demands.is_empty() {
        return Err(StockError::invalid("items", "At least one item is required"));
    }

    let mut totals: BTreeMap<Uuid, Decimal> = BTreeMap::new();
    for demand in demands {
        ensure_positive("quantity", demand.quantity)?;
        *totals.entry(demand.id).or_insert(Decimal::ZERO) += demand.quantity;
    }

    Ok(totals
        .into_iter()
        .map(|(id, quantity)| Demand { id, quantity })
        .collect())
}

/// Check that every demand can be withdrawn from `levels`.
///
/// Returns the aggregated demands to apply. A missing row is `NotFound`,
/// a short row is `InsufficientStock`.
pub fn plan_withdrawals(
    demands: &[Demand],
    levels: &[StockLevel],
    entity: &str,
) -> Result<Vec<Demand>, StockError> {
    let aggregated = aggregate_demands(demands)?;

    for demand in &aggregated {
        let level = levels
            .iter()
            .find(|l| l.id == demand.id)
            .ok_or_else(|| StockError::NotFound {
                entity: entity.to_string(),
                id: demand.id,
            })?;

        if level.available < demand.quantity {
            return Err(StockError::InsufficientStock {
                entity: level.name.clone(),
                available: level.available,
                requested: demand.quantity,
            });
        }
    }

    Ok(aggregated)
}

/// Check a user's inventory covers every requirement. Absent rows count as zero.
pub fn plan_consumption(
    requirements: &[MaterialRequirement],
    inventory: &[StockLevel],
) -> Result<(), StockError> {
    for requirement in requirements {
        let available = inventory
            .iter()
            .find(|l| l.id == requirement.raw_material_id)
            .map(|l| l.available)
            .unwrap_or(Decimal::ZERO);

        if available < requirement.quantity {
            return Err(StockError::InsufficientMaterial {
                material: requirement.name.clone(),
                required: requirement.quantity,
                available,
            });
        }
    }
    Ok(())
}

/// Check that a transfer may leave SENT for `target`
pub fn check_resolution(
    transfer_id: Uuid,
    current: ProductTransferStatus,
    target: ProductTransferStatus,
) -> Result<(), StockError> {
    if !target.is_terminal() {
        return Err(StockError::invalid(
            "status",
            "Status must be RECEIVED, REJECTED or CANCELLED",
        ));
    }
    if current.is_terminal() {
        return Err(StockError::AlreadyResolved {
            transfer_id,
            status: current,
        });
    }
    Ok(())
}

/// Check a completion claim against the issuance batches it names.
///
/// Every batch must belong to `user_id`, still be SENT and carry a material
/// from the bill of materials; together they must cover each requirement.
pub fn validate_completion(
    user_id: Uuid,
    requirements: &[MaterialRequirement],
    batches: &[IssuedBatch],
) -> Result<(), StockError> {
    if batches.is_empty() {
        return Err(StockError::invalid(
            "transfer_ids",
            "At least one raw material transfer is required",
        ));
    }

    let mut covered: BTreeMap<Uuid, Decimal> = BTreeMap::new();
    for batch in batches {
        if batch.user_id != user_id {
            return Err(StockError::NotFound {
                entity: "Raw material transfer".to_string(),
                id: batch.id,
            });
        }
        if !batch
            .status
            .can_transition_to(RawMaterialTransferStatus::Used)
        {
            return Err(StockError::InvalidStateTransition {
                entity: format!("raw material transfer {}", batch.id),
                from: batch.status.to_string(),
                to: RawMaterialTransferStatus::Used.to_string(),
            });
        }
        if !requirements
            .iter()
            .any(|r| r.raw_material_id == batch.raw_material_id)
        {
            return Err(StockError::invalid(
                "transfer_ids",
                "Transfer carries a material outside the product's bill of materials",
            ));
        }
        *covered.entry(batch.raw_material_id).or_insert(Decimal::ZERO) += batch.quantity_issued;
    }

    for requirement in requirements {
        let available = covered
            .get(&requirement.raw_material_id)
            .copied()
            .unwrap_or(Decimal::ZERO);
        if available < requirement.quantity {
            return Err(StockError::InsufficientMaterial {
                material: requirement.name.clone(),
                required: requirement.quantity,
                available,
            });
        }
    }

    Ok(())
}

/// Stock effect of moving an invoice between states.
///
/// `None` stands for "does not exist": `(None, Some(s))` is creation and
/// `(Some(s), None)` is deletion.
pub fn reservation_change(
    before: Option<InvoiceStatus>,
    after: Option<InvoiceStatus>,
) -> ReservationChange {
    let held_before = before.map_or(false, |s| s.holds_reservation());
    let held_after = after.map_or(false, |s| s.holds_reservation());

    match (held_before, held_after) {
        (false, true) => ReservationChange::Reserve,
        (true, false) => ReservationChange::Release,
        _ => ReservationChange::Unchanged,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(product_id: Uuid, material: Uuid, name: &str, per_unit: i64) -> ProductStructure {
        ProductStructure {
            id: Uuid::new_v4(),
            product_id,
            raw_material_id: material,
            raw_material_name: name.to_string(),
            unit: "kg".to_string(),
            quantity_required: Decimal::from(per_unit),
        }
    }

    #[test]
    fn test_resolve_scales_each_line() {
        let product = Uuid::new_v4();
        let steel = Uuid::new_v4();
        let copper = Uuid::new_v4();
        let structure = vec![
            line(product, steel, "Steel", 2),
            line(product, copper, "Copper", 1),
        ];

        let reqs = resolve_requirements(product, &structure, Decimal::from(5)).unwrap();

        assert_eq!(reqs.len(), 2);
        let steel_req = reqs.iter().find(|r| r.raw_material_id == steel).unwrap();
        let copper_req = reqs.iter().find(|r| r.raw_material_id == copper).unwrap();
        assert_eq!(steel_req.quantity, Decimal::from(10));
        assert_eq!(copper_req.quantity, Decimal::from(5));
    }

    #[test]
    fn test_resolve_rounds_to_stored_scale() {
        let product = Uuid::new_v4();
        let steel = Uuid::new_v4();
        let mut steel_line = line(product, steel, "Steel", 0);
        steel_line.quantity_required = Decimal::new(333, 3);

        let reqs = resolve_requirements(product, &[steel_line.clone()], Decimal::new(5, 1)).unwrap();
        assert_eq!(reqs[0].quantity, Decimal::new(167, 3));
        assert!(reqs[0].quantity.scale() <= QUANTITY_SCALE);

        steel_line.quantity_required = Decimal::new(1, 3);
        assert!(matches!(
            resolve_requirements(product, &[steel_line], Decimal::new(1, 1)),
            Err(StockError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn test_resolve_without_structure_fails() {
        let product = Uuid::new_v4();
        let other = Uuid::new_v4();
        let structure = vec![line(other, Uuid::new_v4(), "Steel", 2)];

        let err = resolve_requirements(product, &structure, Decimal::ONE).unwrap_err();
        assert_eq!(err, StockError::NoStructureDefined { product_id: product });
    }

    #[test]
    fn test_resolve_rejects_non_positive_quantity() {
        let product = Uuid::new_v4();
        let structure = vec![line(product, Uuid::new_v4(), "Steel", 2)];

        assert!(matches!(
            resolve_requirements(product, &structure, Decimal::ZERO),
            Err(StockError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn test_aggregate_sums_repeated_rows() {
        let a = Uuid::new_v4();
        let demands = vec![
            Demand { id: a, quantity: Decimal::from(3) },
            Demand { id: a, quantity: Decimal::from(4) },
        ];
        let aggregated = aggregate_demands(&demands).unwrap();
        assert_eq!(aggregated, vec![Demand { id: a, quantity: Decimal::from(7) }]);
    }

    #[test]
    fn test_withdrawal_shortfall_reports_available_and_requested() {
        let steel = Uuid::new_v4();
        let levels = vec![StockLevel {
            id: steel,
            name: "Steel".to_string(),
            available: Decimal::from(20),
        }];
        let demands = vec![Demand { id: steel, quantity: Decimal::from(30) }];

        let err = plan_withdrawals(&demands, &levels, "Raw material").unwrap_err();
        assert_eq!(
            err,
            StockError::InsufficientStock {
                entity: "Steel".to_string(),
                available: Decimal::from(20),
                requested: Decimal::from(30),
            }
        );
    }

    #[test]
    fn test_withdrawal_of_unknown_row_is_not_found() {
        let demands = vec![Demand { id: Uuid::new_v4(), quantity: Decimal::ONE }];
        assert!(matches!(
            plan_withdrawals(&demands, &[], "Product"),
            Err(StockError::NotFound { .. })
        ));
    }

    #[test]
    fn test_consumption_treats_missing_inventory_as_zero() {
        let copper = Uuid::new_v4();
        let reqs = vec![MaterialRequirement {
            raw_material_id: copper,
            name: "Copper".to_string(),
            unit: "kg".to_string(),
            quantity: Decimal::from(5),
        }];

        let err = plan_consumption(&reqs, &[]).unwrap_err();
        assert_eq!(
            err,
            StockError::InsufficientMaterial {
                material: "Copper".to_string(),
                required: Decimal::from(5),
                available: Decimal::ZERO,
            }
        );
    }

    #[test]
    fn test_resolution_only_leaves_sent_once() {
        let id = Uuid::new_v4();
        assert!(check_resolution(id, ProductTransferStatus::Sent, ProductTransferStatus::Rejected).is_ok());
        assert_eq!(
            check_resolution(id, ProductTransferStatus::Rejected, ProductTransferStatus::Received),
            Err(StockError::AlreadyResolved {
                transfer_id: id,
                status: ProductTransferStatus::Rejected,
            })
        );
        assert!(matches!(
            check_resolution(id, ProductTransferStatus::Sent, ProductTransferStatus::Sent),
            Err(StockError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn test_completion_requires_enough_issued_material() {
        let user = Uuid::new_v4();
        let steel = Uuid::new_v4();
        let reqs = vec![MaterialRequirement {
            raw_material_id: steel,
            name: "Steel".to_string(),
            unit: "kg".to_string(),
            quantity: Decimal::from(10),
        }];
        let batch = IssuedBatch {
            id: Uuid::new_v4(),
            user_id: user,
            raw_material_id: steel,
            quantity_issued: Decimal::from(6),
            status: RawMaterialTransferStatus::Sent,
        };

        assert!(matches!(
            validate_completion(user, &reqs, &[batch]),
            Err(StockError::InsufficientMaterial { .. })
        ));

        let second = IssuedBatch { id: Uuid::new_v4(), ..batch };
        assert!(validate_completion(user, &reqs, &[batch, second]).is_ok());
    }

    #[test]
    fn test_completion_rejects_foreign_or_used_batches() {
        let user = Uuid::new_v4();
        let steel = Uuid::new_v4();
        let reqs = vec![MaterialRequirement {
            raw_material_id: steel,
            name: "Steel".to_string(),
            unit: "kg".to_string(),
            quantity: Decimal::ONE,
        }];
        let batch = IssuedBatch {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            raw_material_id: steel,
            quantity_issued: Decimal::from(6),
            status: RawMaterialTransferStatus::Sent,
        };
        assert!(matches!(
            validate_completion(user, &reqs, &[batch]),
            Err(StockError::NotFound { .. })
        ));

        let used = IssuedBatch {
            user_id: user,
            status: RawMaterialTransferStatus::Used,
            ..batch
        };
        assert!(matches!(
            validate_completion(user, &reqs, &[used]),
            Err(StockError::InvalidStateTransition { .. })
        ));
    }

    #[test]
    fn test_reservation_change_table() {
        use InvoiceStatus::*;
        assert_eq!(reservation_change(None, Some(Draft)), ReservationChange::Reserve);
        assert_eq!(reservation_change(None, Some(Cancelled)), ReservationChange::Unchanged);
        assert_eq!(reservation_change(Some(Draft), Some(Final)), ReservationChange::Unchanged);
        assert_eq!(reservation_change(Some(Final), Some(Draft)), ReservationChange::Unchanged);
        assert_eq!(reservation_change(Some(Paid), Some(Cancelled)), ReservationChange::Release);
        assert_eq!(reservation_change(Some(Cancelled), Some(Unpaid)), ReservationChange::Reserve);
        assert_eq!(reservation_change(Some(Draft), None), ReservationChange::Release);
        assert_eq!(reservation_change(Some(Cancelled), None), ReservationChange::Unchanged);
    }
}
