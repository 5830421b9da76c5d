//! Receipts, vendor payments and vendor credit notes. Each one takes its
//! number from the sequence generator inside its own insert transaction.

use rust_decimal::Decimal;
use serde::Deserialize;
use shared::{
    validate_amount, DocumentKind, InvoiceStatus, Pagination, Receipt, VendorCreditNote,
    VendorPayment,
};
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

use super::{check_field, invoice, sequence};
use crate::error::{AppError, AppResult};

#[derive(Clone)]
pub struct DocumentService {
    db: PgPool,
}

/// Input for recording a customer payment
#[derive(Debug, Deserialize)]
pub struct RecordReceiptInput {
    pub invoice_id: Uuid,
    pub amount: Decimal,
    pub notes: Option<String>,
}

/// Input for recording a payment to a vendor
#[derive(Debug, Deserialize, Validate)]
pub struct RecordVendorPaymentInput {
    #[validate(length(min = 1, max = 200, message = "Vendor name must be 1-200 characters"))]
    pub vendor_name: String,
    pub amount: Decimal,
    pub notes: Option<String>,
}

/// Input for recording a vendor credit note
#[derive(Debug, Deserialize, Validate)]
pub struct RecordVendorCreditNoteInput {
    #[validate(length(min = 1, max = 200, message = "Vendor name must be 1-200 characters"))]
    pub vendor_name: String,
    pub amount: Decimal,
    pub reason: Option<String>,
}

impl DocumentService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Record a payment against an invoice. The invoice becomes PAID once
    /// nothing is left to pay.
    pub async fn record_receipt(&self, input: RecordReceiptInput) -> AppResult<Receipt> {
        check_field("amount", validate_amount(input.amount))?;

        let mut tx = self.db.begin().await?;

        let target = invoice::lock_invoice(&mut *tx, input.invoice_id).await?;
        if target.status == InvoiceStatus::Cancelled {
            return Err(AppError::InvalidStateTransition(format!(
                "Invoice {} is cancelled",
                target.invoice_number
            )));
        }
        if input.amount > target.balance_due {
            return Err(AppError::Validation {
                field: "amount".to_string(),
                message: format!(
                    "Amount {} exceeds the balance due of {}",
                    input.amount, target.balance_due
                ),
            });
        }

        let receipt_number = sequence::next_document_number(&mut *tx, DocumentKind::Receipt).await?;

        let receipt = sqlx::query_as::<_, Receipt>(
            r#"
            INSERT INTO receipts (receipt_number, invoice_id, amount, notes)
            VALUES ($1, $2, $3, $4)
            RETURNING id, receipt_number, invoice_id, amount, notes, created_at
            "#,
        )
        .bind(&receipt_number)
        .bind(input.invoice_id)
        .bind(input.amount)
        .bind(&input.notes)
        .fetch_one(&mut *tx)
        .await?;

        let balance_due = target.balance_due - input.amount;
        let status = if balance_due.is_zero() {
            InvoiceStatus::Paid
        } else {
            target.status
        };

        // PAID still holds the reservation, so stock is untouched
        sqlx::query(
            "UPDATE invoices SET balance_due = $1, status = $2, updated_at = NOW() WHERE id = $3",
        )
        .bind(balance_due)
        .bind(status)
        .bind(input.invoice_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(
            receipt_number = %receipt.receipt_number,
            invoice_number = %target.invoice_number,
            amount = %receipt.amount,
            balance_due = %balance_due,
            "Receipt recorded"
        );
        Ok(receipt)
    }

    pub async fn record_vendor_payment(&self, input: RecordVendorPaymentInput) -> AppResult<VendorPayment> {
        input.validate()?;
        check_field("amount", validate_amount(input.amount))?;

        let mut tx = self.db.begin().await?;
        let payment_number = sequence::next_document_number(&mut *tx, DocumentKind::VendorPayment).await?;

        let payment = sqlx::query_as::<_, VendorPayment>(
            r#"
            INSERT INTO vendor_payments (payment_number, vendor_name, amount, notes)
            VALUES ($1, $2, $3, $4)
            RETURNING id, payment_number, vendor_name, amount, notes, created_at
            "#,
        )
        .bind(&payment_number)
        .bind(input.vendor_name.trim())
        .bind(input.amount)
        .bind(&input.notes)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(payment_number = %payment.payment_number, amount = %payment.amount, "Vendor payment recorded");
        Ok(payment)
    }

    pub async fn record_vendor_credit_note(
        &self,
        input: RecordVendorCreditNoteInput,
    ) -> AppResult<VendorCreditNote> {
        input.validate()?;
        check_field("amount", validate_amount(input.amount))?;

        let mut tx = self.db.begin().await?;
        let credit_note_number =
            sequence::next_document_number(&mut *tx, DocumentKind::VendorCreditNote).await?;

        let note = sqlx::query_as::<_, VendorCreditNote>(
            r#"
            INSERT INTO vendor_credit_notes (credit_note_number, vendor_name, amount, reason)
            VALUES ($1, $2, $3, $4)
            RETURNING id, credit_note_number, vendor_name, amount, reason, created_at
            "#,
        )
        .bind(&credit_note_number)
        .bind(input.vendor_name.trim())
        .bind(input.amount)
        .bind(&input.reason)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(
            credit_note_number = %note.credit_note_number,
            amount = %note.amount,
            "Vendor credit note recorded"
        );
        Ok(note)
    }

    pub async fn list_receipts(
        &self,
        invoice_id: Option<Uuid>,
        pagination: &Pagination,
    ) -> AppResult<Vec<Receipt>> {
        let receipts = sqlx::query_as::<_, Receipt>(
            r#"
            SELECT id, receipt_number, invoice_id, amount, notes, created_at
            FROM receipts
            WHERE ($1::uuid IS NULL OR invoice_id = $1)
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(invoice_id)
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(&self.db)
        .await?;

        Ok(receipts)
    }

    pub async fn list_vendor_payments(&self, pagination: &Pagination) -> AppResult<Vec<VendorPayment>> {
        let payments = sqlx::query_as::<_, VendorPayment>(
            r#"
            SELECT id, payment_number, vendor_name, amount, notes, created_at
            FROM vendor_payments
            ORDER BY created_at DESC
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(&self.db)
        .await?;

        Ok(payments)
    }

    pub async fn list_vendor_credit_notes(
        &self,
        pagination: &Pagination,
    ) -> AppResult<Vec<VendorCreditNote>> {
        let notes = sqlx::query_as::<_, VendorCreditNote>(
            r#"
            SELECT id, credit_note_number, vendor_name, amount, reason, created_at
            FROM vendor_credit_notes
            ORDER BY created_at DESC
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(&self.db)
        .await?;

        Ok(notes)
    }
}
