//! Per financial year document counters
//!
//! A counter is one `sequence_counters` row per (domain, financial year).
//! Issuing a number is a single upsert-increment statement, so concurrent
//! callers always receive distinct, contiguous values.

use serde::Serialize;
use shared::{
    format_document_number, highest_suffix, number_prefix, reconciled_last_number, DocumentKind,
    FinancialYear,
};
use sqlx::{PgConnection, PgPool};

use crate::error::AppResult;

/// Sequence service for minting and reconciling document numbers
#[derive(Clone)]
pub struct SequenceService {
    db: PgPool,
}

/// Counter state for one domain and year
#[derive(Debug, Clone, Serialize)]
pub struct SequenceStatus {
    pub domain: DocumentKind,
    pub financial_year: FinancialYear,
    pub last_number: i64,
    pub next_number: i64,
    pub next_document_number: String,
}

/// Result of reconciling a counter with the stored documents
#[derive(Debug, Clone, Serialize)]
pub struct SyncOutcome {
    pub domain: DocumentKind,
    pub financial_year: FinancialYear,
    pub previous: i64,
    pub observed_max: Option<i64>,
    pub last_number: i64,
}

/// Freshly issued number
#[derive(Debug, Clone, Serialize)]
pub struct IssuedNumber {
    pub domain: DocumentKind,
    pub financial_year: FinancialYear,
    pub number: i64,
    pub document_number: String,
}

/// Table and column holding the issued numbers of a kind
fn document_source(kind: DocumentKind) -> (&'static str, &'static str) {
    match kind {
        DocumentKind::Bill => ("invoices", "invoice_number"),
        DocumentKind::Receipt => ("receipts", "receipt_number"),
        DocumentKind::VendorCreditNote => ("vendor_credit_notes", "credit_note_number"),
        DocumentKind::VendorPayment => ("vendor_payments", "payment_number"),
    }
}

/// Atomically take the next counter value on the caller's connection.
///
/// Runs inside the caller's transaction so a failed document insert also
/// gives the number back.
pub async fn next_number_in(
    conn: &mut PgConnection,
    kind: DocumentKind,
    year: FinancialYear,
) -> AppResult<i64> {
    let number = sqlx::query_scalar::<_, i64>(
        r#"
        INSERT INTO sequence_counters (domain, financial_year, last_number)
        VALUES ($1, $2, 1)
        ON CONFLICT (domain, financial_year) DO UPDATE
        SET last_number = sequence_counters.last_number + 1, updated_at = NOW()
        RETURNING last_number
        "#,
    )
    .bind(kind.as_str())
    .bind(year.to_string())
    .fetch_one(conn)
    .await?;

    Ok(number)
}

/// Issue a formatted number for the current financial year
pub async fn next_document_number(conn: &mut PgConnection, kind: DocumentKind) -> AppResult<String> {
    let year = FinancialYear::current();
    let number = next_number_in(conn, kind, year).await?;
    Ok(format_document_number(kind, year, number))
}

impl SequenceService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Issue the next number of a domain
    pub async fn next_number(&self, kind: DocumentKind, year: FinancialYear) -> AppResult<IssuedNumber> {
        let mut conn = self.db.acquire().await?;
        let number = next_number_in(&mut *conn, kind, year).await?;

        tracing::debug!(domain = %kind, financial_year = %year, number, "Sequence number issued");
        Ok(IssuedNumber {
            domain: kind,
            financial_year: year,
            number,
            document_number: format_document_number(kind, year, number),
        })
    }

    /// Number the next issue would receive. Does not mutate the counter.
    pub async fn current_number(&self, kind: DocumentKind, year: FinancialYear) -> AppResult<i64> {
        let last = self.last_number(kind, year).await?;
        Ok(last + 1)
    }

    pub async fn status(&self, kind: DocumentKind, year: FinancialYear) -> AppResult<SequenceStatus> {
        let next_number = self.current_number(kind, year).await?;
        let last_number = next_number - 1;

        Ok(SequenceStatus {
            domain: kind,
            financial_year: year,
            last_number,
            next_number,
            next_document_number: format_document_number(kind, year, next_number),
        })
    }

    /// Raise the counter to the highest number already stored for the
    /// domain and year. The counter never goes down.
    pub async fn sync(&self, kind: DocumentKind, year: FinancialYear) -> AppResult<SyncOutcome> {
        let (table, column) = document_source(kind);
        let prefix = number_prefix(kind, year);

        let mut tx = self.db.begin().await?;

        let previous = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT last_number FROM sequence_counters
            WHERE domain = $1 AND financial_year = $2
            FOR UPDATE
            "#,
        )
        .bind(kind.as_str())
        .bind(year.to_string())
        .fetch_optional(&mut *tx)
        .await?
        .unwrap_or(0);

        let query = format!("SELECT {column} FROM {table} WHERE {column} LIKE $1");
        let numbers = sqlx::query_scalar::<_, String>(&query)
            .bind(format!("{}%", prefix))
            .fetch_all(&mut *tx)
            .await?;

        let observed_max = highest_suffix(numbers.iter().map(String::as_str));
        let target = reconciled_last_number(previous, observed_max);

        let last_number = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO sequence_counters (domain, financial_year, last_number)
            VALUES ($1, $2, $3)
            ON CONFLICT (domain, financial_year) DO UPDATE
            SET last_number = GREATEST(sequence_counters.last_number, EXCLUDED.last_number),
                updated_at = NOW()
            RETURNING last_number
            "#,
        )
        .bind(kind.as_str())
        .bind(year.to_string())
        .bind(target)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        if last_number != previous {
            tracing::warn!(
                domain = %kind,
                financial_year = %year,
                previous,
                last_number,
                "Sequence counter had drifted behind stored documents"
            );
        } else {
            tracing::info!(domain = %kind, financial_year = %year, last_number, "Sequence counter in sync");
        }

        Ok(SyncOutcome {
            domain: kind,
            financial_year: year,
            previous,
            observed_max,
            last_number,
        })
    }

    async fn last_number(&self, kind: DocumentKind, year: FinancialYear) -> AppResult<i64> {
        let last = sqlx::query_scalar::<_, i64>(
            "SELECT last_number FROM sequence_counters WHERE domain = $1 AND financial_year = $2",
        )
        .bind(kind.as_str())
        .bind(year.to_string())
        .fetch_optional(&self.db)
        .await?
        .unwrap_or(0);

        Ok(last)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_kind_has_a_document_source() {
        for kind in DocumentKind::ALL {
            let (table, column) = document_source(kind);
            assert!(!table.is_empty());
            assert!(column.ends_with("_number"));
        }
    }
}
