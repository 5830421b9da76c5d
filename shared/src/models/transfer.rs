//! Issuance batches, finished-goods transfers and the consumption audit log

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Status of an admin-to-user raw material issuance batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(type_name = "VARCHAR", rename_all = "UPPERCASE"))]
#[serde(rename_all = "UPPERCASE")]
pub enum RawMaterialTransferStatus {
    Sent,
    Used,
    Returned,
    Repairing,
    Finished,
}

impl RawMaterialTransferStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RawMaterialTransferStatus::Sent => "SENT",
            RawMaterialTransferStatus::Used => "USED",
            RawMaterialTransferStatus::Returned => "RETURNED",
            RawMaterialTransferStatus::Repairing => "REPAIRING",
            RawMaterialTransferStatus::Finished => "FINISHED",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "SENT" => Some(RawMaterialTransferStatus::Sent),
            "USED" => Some(RawMaterialTransferStatus::Used),
            "RETURNED" => Some(RawMaterialTransferStatus::Returned),
            "REPAIRING" => Some(RawMaterialTransferStatus::Repairing),
            "FINISHED" => Some(RawMaterialTransferStatus::Finished),
            _ => None,
        }
    }

    /// Whether a batch may move from `self` to `next`.
    ///
    /// SENT -> USED happens only through manufacturing completion; the
    /// RETURNED/REPAIRING/FINISHED chain belongs to the repair workflow.
    pub fn can_transition_to(&self, next: RawMaterialTransferStatus) -> bool {
        use RawMaterialTransferStatus::*;
        matches!(
            (self, next),
            (Sent, Used) | (Sent, Returned) | (Used, Returned) | (Returned, Repairing) | (Repairing, Finished)
        )
    }
}

impl std::fmt::Display for RawMaterialTransferStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status of a user-to-admin finished goods transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(type_name = "VARCHAR", rename_all = "UPPERCASE"))]
#[serde(rename_all = "UPPERCASE")]
pub enum ProductTransferStatus {
    Sent,
    Received,
    Rejected,
    Cancelled,
}

impl ProductTransferStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProductTransferStatus::Sent => "SENT",
            ProductTransferStatus::Received => "RECEIVED",
            ProductTransferStatus::Rejected => "REJECTED",
            ProductTransferStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "SENT" => Some(ProductTransferStatus::Sent),
            "RECEIVED" => Some(ProductTransferStatus::Received),
            "REJECTED" => Some(ProductTransferStatus::Rejected),
            "CANCELLED" => Some(ProductTransferStatus::Cancelled),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, ProductTransferStatus::Sent)
    }

    /// Refused goods hand the consumed materials back to the user
    pub fn restores_materials(&self) -> bool {
        matches!(
            self,
            ProductTransferStatus::Rejected | ProductTransferStatus::Cancelled
        )
    }
}

impl std::fmt::Display for ProductTransferStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw material issued from central stock to a user
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct RawMaterialTransfer {
    pub id: Uuid,
    pub user_id: Uuid,
    pub user_name: Option<String>,
    pub raw_material_id: Uuid,
    pub raw_material_name: String,
    pub unit: String,
    pub quantity_issued: Decimal,
    pub status: RawMaterialTransferStatus,
    pub notes: Option<String>,
    /// Manufacturing run that consumed this batch, set together with USED
    pub manufacturing_run_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Finished goods submitted by a user for admin acceptance
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct ProductTransfer {
    pub id: Uuid,
    pub user_id: Uuid,
    pub product_id: Uuid,
    pub product_name: String,
    pub quantity_sent: Decimal,
    pub status: ProductTransferStatus,
    pub notes: Option<String>,
    pub received_by: Option<Uuid>,
    pub received_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Append-only record of raw material drawn down by a transfer.
///
/// The per-material `quantity_used` is the snapshot used to restore the
/// user's inventory if the transfer is rejected or cancelled.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct RawMaterialConsumption {
    pub id: Uuid,
    pub user_id: Uuid,
    pub product_id: Uuid,
    pub raw_material_id: Uuid,
    pub product_transfer_id: Uuid,
    pub quantity_used: Decimal,
    pub product_transfer_quantity: Decimal,
    pub unit: String,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Completion of a manufacturing run against specific issuance batches
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct ManufacturingRun {
    pub id: Uuid,
    pub user_id: Uuid,
    pub product_id: Uuid,
    pub quantity_produced: Decimal,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repair_chain_transitions() {
        use RawMaterialTransferStatus::*;
        assert!(Sent.can_transition_to(Returned));
        assert!(Used.can_transition_to(Returned));
        assert!(Returned.can_transition_to(Repairing));
        assert!(Repairing.can_transition_to(Finished));

        assert!(!Sent.can_transition_to(Repairing));
        assert!(!Returned.can_transition_to(Finished));
        assert!(!Finished.can_transition_to(Sent));
        assert!(!Used.can_transition_to(Used));
    }

    #[test]
    fn test_only_refusals_restore_materials() {
        assert!(!ProductTransferStatus::Received.restores_materials());
        assert!(ProductTransferStatus::Rejected.restores_materials());
        assert!(ProductTransferStatus::Cancelled.restores_materials());
        assert!(!ProductTransferStatus::Sent.is_terminal());
    }
}
