//! Invoice view used by stock reservation, plus the documents that draw
//! numbers from the sequence generator

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Invoice lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(type_name = "VARCHAR", rename_all = "UPPERCASE"))]
#[serde(rename_all = "UPPERCASE")]
pub enum InvoiceStatus {
    Draft,
    Final,
    Paid,
    Unpaid,
    Advance,
    Cancelled,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Draft => "DRAFT",
            InvoiceStatus::Final => "FINAL",
            InvoiceStatus::Paid => "PAID",
            InvoiceStatus::Unpaid => "UNPAID",
            InvoiceStatus::Advance => "ADVANCE",
            InvoiceStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "DRAFT" => Some(InvoiceStatus::Draft),
            "FINAL" => Some(InvoiceStatus::Final),
            "PAID" => Some(InvoiceStatus::Paid),
            "UNPAID" => Some(InvoiceStatus::Unpaid),
            "ADVANCE" => Some(InvoiceStatus::Advance),
            "CANCELLED" => Some(InvoiceStatus::Cancelled),
            _ => None,
        }
    }

    /// Every status except CANCELLED keeps the invoiced goods out of stock,
    /// DRAFT included.
    pub fn holds_reservation(&self) -> bool {
        !matches!(self, InvoiceStatus::Cancelled)
    }
}

impl std::fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Invoice header
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Invoice {
    pub id: Uuid,
    pub invoice_number: String,
    pub customer_name: String,
    pub status: InvoiceStatus,
    pub total: Decimal,
    pub balance_due: Decimal,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Invoice line
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct InvoiceItem {
    pub id: Uuid,
    pub invoice_id: Uuid,
    pub product_id: Uuid,
    pub quantity: Decimal,
    pub unit_price: Decimal,
}

/// Invoice with its lines
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceWithItems {
    #[serde(flatten)]
    pub invoice: Invoice,
    pub items: Vec<InvoiceItem>,
}

/// Payment received against an invoice
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Receipt {
    pub id: Uuid,
    pub receipt_number: String,
    pub invoice_id: Uuid,
    pub amount: Decimal,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Payment made to a vendor
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct VendorPayment {
    pub id: Uuid,
    pub payment_number: String,
    pub vendor_name: String,
    pub amount: Decimal,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Credit note issued by a vendor
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct VendorCreditNote {
    pub id: Uuid,
    pub credit_note_number: String,
    pub vendor_name: String,
    pub amount: Decimal,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
}
