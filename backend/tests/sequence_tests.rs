//! Document sequence tests
//!
//! - Number format and financial year boundaries
//! - Contiguous allocation from a counter
//! - Sync recovering from out-of-band inserts
//! - Concurrent NextNumber against Postgres (ignored; needs DATABASE_URL)

use chrono::NaiveDate;
use proptest::prelude::*;
use shared::{
    format_document_number, highest_suffix, number_prefix, parse_sequence_suffix,
    reconciled_last_number, DocumentKind, FinancialYear,
};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod unit_tests {
    use super::*;

    #[test]
    fn test_prefixes_per_domain() {
        let fy = FinancialYear::starting(2024);
        assert_eq!(format_document_number(DocumentKind::Bill, fy, 7), "BILL-2024-2025-0007");
        assert_eq!(format_document_number(DocumentKind::Receipt, fy, 1), "RCP-2024-2025-0001");
        assert_eq!(
            format_document_number(DocumentKind::VendorCreditNote, fy, 42),
            "VCN-2024-2025-0042"
        );
        assert_eq!(
            format_document_number(DocumentKind::VendorPayment, fy, 9999),
            "VPMT-2024-2025-9999"
        );
    }

    #[test]
    fn test_numbers_past_width_keep_growing() {
        let fy = FinancialYear::starting(2024);
        let number = format_document_number(DocumentKind::Bill, fy, 10000);
        assert_eq!(number, "BILL-2024-2025-10000");
        assert_eq!(parse_sequence_suffix(&number), Some(10000));
    }

    #[test]
    fn test_april_first_starts_a_new_year() {
        assert_eq!(FinancialYear::for_date(date(2025, 3, 31)), FinancialYear::starting(2024));
        assert_eq!(FinancialYear::for_date(date(2025, 4, 1)), FinancialYear::starting(2025));
    }

    #[test]
    fn test_sync_after_out_of_band_insert() {
        // Counter says 6, someone stored BILL-...-0012 directly
        let fy = FinancialYear::starting(2024);
        let stored = vec![
            format_document_number(DocumentKind::Bill, fy, 5),
            format_document_number(DocumentKind::Bill, fy, 6),
            format_document_number(DocumentKind::Bill, fy, 12),
            "BILL-2024-2025-draft".to_string(),
        ];

        let observed = highest_suffix(stored.iter().map(String::as_str));
        assert_eq!(observed, Some(12));

        let last = reconciled_last_number(6, observed);
        assert_eq!(last, 12);
        assert_eq!(
            format_document_number(DocumentKind::Bill, fy, last + 1),
            "BILL-2024-2025-0013"
        );
    }

    #[test]
    fn test_sync_never_lowers_counter() {
        assert_eq!(reconciled_last_number(20, Some(12)), 20);
        assert_eq!(reconciled_last_number(20, None), 20);
        assert_eq!(reconciled_last_number(0, None), 0);
    }

    #[test]
    fn test_prefix_scopes_year() {
        let prefix = number_prefix(DocumentKind::Receipt, FinancialYear::starting(2023));
        assert_eq!(prefix, "RCP-2023-2024-");
        assert!(!format_document_number(DocumentKind::Receipt, FinancialYear::starting(2024), 1)
            .starts_with(&prefix));
    }
}

// ============================================================================
// Property-Based Tests
// ============================================================================

#[cfg(test)]
mod property_tests {
    use super::*;

    fn kind_strategy() -> impl Strategy<Value = DocumentKind> {
        prop::sample::select(DocumentKind::ALL.to_vec())
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Every formatted number parses back to its counter value
        #[test]
        fn prop_suffix_recovers_number(
            kind in kind_strategy(),
            start_year in 2000..2100i32,
            number in 1..1_000_000i64
        ) {
            let fy = FinancialYear::starting(start_year);
            let formatted = format_document_number(kind, fy, number);
            prop_assert!(formatted.starts_with(&number_prefix(kind, fy)));
            prop_assert_eq!(parse_sequence_suffix(&formatted), Some(number));
        }

        /// Issuing n numbers from last = k yields exactly k+1..=k+n
        #[test]
        fn prop_issue_is_contiguous(start in 0..500i64, n in 1..50usize) {
            let fy = FinancialYear::starting(2024);
            let mut last = start;
            let mut issued = Vec::new();
            for _ in 0..n {
                last += 1;
                issued.push(format_document_number(DocumentKind::Bill, fy, last));
            }

            let numbers: Vec<i64> = issued
                .iter()
                .filter_map(|s| parse_sequence_suffix(s))
                .collect();
            let expected: Vec<i64> = (start + 1..=start + n as i64).collect();
            prop_assert_eq!(numbers, expected);
        }

        /// After sync the next number is one past the highest stored one
        #[test]
        fn prop_sync_then_next_is_one_past_max(
            counter in 0..100i64,
            stored in prop::collection::vec(1..200i64, 0..20)
        ) {
            let fy = FinancialYear::starting(2024);
            let numbers: Vec<String> = stored
                .iter()
                .map(|n| format_document_number(DocumentKind::VendorPayment, fy, *n))
                .collect();

            let last = reconciled_last_number(counter, highest_suffix(numbers.iter().map(String::as_str)));
            prop_assert!(last >= counter);
            prop_assert!(stored.iter().all(|n| *n <= last));
            prop_assert!(!numbers.contains(&format_document_number(DocumentKind::VendorPayment, fy, last + 1)));
        }
    }
}

// ============================================================================
// Database Tests
// ============================================================================

#[cfg(test)]
mod database_tests {
    use super::*;
    use sqlx::postgres::PgPoolOptions;
    use stock_ledger::services::SequenceService;

    async fn pool() -> sqlx::PgPool {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
        let pool = PgPoolOptions::new()
            .max_connections(20)
            .connect(&url)
            .await
            .expect("connect to test database");
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .expect("run migrations");
        pool
    }

    async fn set_counter(pool: &sqlx::PgPool, kind: DocumentKind, fy: FinancialYear, last: i64) {
        sqlx::query(
            r#"
            INSERT INTO sequence_counters (domain, financial_year, last_number)
            VALUES ($1, $2, $3)
            ON CONFLICT (domain, financial_year) DO UPDATE SET last_number = EXCLUDED.last_number
            "#,
        )
        .bind(kind.as_str())
        .bind(fy.to_string())
        .bind(last)
        .execute(pool)
        .await
        .expect("seed counter");
    }

    #[tokio::test]
    #[ignore = "requires DATABASE_URL"]
    async fn test_two_concurrent_next_numbers_are_distinct() {
        let pool = pool().await;
        let fy = FinancialYear::starting(1999);
        set_counter(&pool, DocumentKind::Bill, fy, 6).await;

        let a = SequenceService::new(pool.clone());
        let b = SequenceService::new(pool.clone());
        let (first, second) = tokio::join!(
            a.next_number(DocumentKind::Bill, fy),
            b.next_number(DocumentKind::Bill, fy)
        );

        let mut got = vec![first.unwrap().number, second.unwrap().number];
        got.sort();
        assert_eq!(got, vec![7, 8]);
    }

    #[tokio::test]
    #[ignore = "requires DATABASE_URL"]
    async fn test_many_concurrent_next_numbers_are_contiguous() {
        let pool = pool().await;
        let fy = FinancialYear::starting(1998);
        set_counter(&pool, DocumentKind::Receipt, fy, 0).await;

        let mut handles = Vec::new();
        for _ in 0..25 {
            let service = SequenceService::new(pool.clone());
            handles.push(tokio::spawn(async move {
                service.next_number(DocumentKind::Receipt, fy).await
            }));
        }

        let mut got = Vec::new();
        for handle in handles {
            got.push(handle.await.unwrap().unwrap().number);
        }
        got.sort();
        assert_eq!(got, (1..=25).collect::<Vec<i64>>());
    }

    #[tokio::test]
    #[ignore = "requires DATABASE_URL"]
    async fn test_current_number_does_not_advance() {
        let pool = pool().await;
        let fy = FinancialYear::starting(1997);
        set_counter(&pool, DocumentKind::VendorCreditNote, fy, 3).await;

        let service = SequenceService::new(pool);
        assert_eq!(service.current_number(DocumentKind::VendorCreditNote, fy).await.unwrap(), 4);
        assert_eq!(service.current_number(DocumentKind::VendorCreditNote, fy).await.unwrap(), 4);

        let status = service.status(DocumentKind::VendorCreditNote, fy).await.unwrap();
        assert_eq!(status.last_number, 3);
        assert_eq!(status.next_number, 4);
        assert_eq!(status.next_document_number, "VCN-1997-1998-0004");
        assert_eq!(service.next_number(DocumentKind::VendorCreditNote, fy).await.unwrap().number, 4);
    }
}
