//! Document numbering: financial years, prefixes and the
//! `{PREFIX}-{YYYY}-{YYYY}-{NNNN}` wire format

use chrono::{Datelike, Local, NaiveDate};
use serde::{Deserialize, Serialize};

/// Width of the zero-padded sequence part of a document number
pub const SEQUENCE_WIDTH: usize = 4;

/// First month (April) of a financial year
pub const FINANCIAL_YEAR_START_MONTH: u32 = 4;

/// Document family with its own counter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    Bill,
    Receipt,
    VendorCreditNote,
    VendorPayment,
}

impl DocumentKind {
    pub const ALL: [DocumentKind; 4] = [
        DocumentKind::Bill,
        DocumentKind::Receipt,
        DocumentKind::VendorCreditNote,
        DocumentKind::VendorPayment,
    ];

    /// Counter key stored in `sequence_counters.domain`
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentKind::Bill => "bill",
            DocumentKind::Receipt => "receipt",
            DocumentKind::VendorCreditNote => "vendor_credit_note",
            DocumentKind::VendorPayment => "vendor_payment",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "bill" => Some(DocumentKind::Bill),
            "receipt" => Some(DocumentKind::Receipt),
            "vendor_credit_note" => Some(DocumentKind::VendorCreditNote),
            "vendor_payment" => Some(DocumentKind::VendorPayment),
            _ => None,
        }
    }

    pub fn prefix(&self) -> &'static str {
        match self {
            DocumentKind::Bill => "BILL",
            DocumentKind::Receipt => "RCP",
            DocumentKind::VendorCreditNote => "VCN",
            DocumentKind::VendorPayment => "VPMT",
        }
    }
}

impl std::fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// April-to-March accounting period, identified by its starting calendar year
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FinancialYear {
    start_year: i32,
}

impl FinancialYear {
    pub fn starting(start_year: i32) -> Self {
        Self { start_year }
    }

    pub fn for_date(date: NaiveDate) -> Self {
        let start_year = if date.month() >= FINANCIAL_YEAR_START_MONTH {
            date.year()
        } else {
            date.year() - 1
        };
        Self { start_year }
    }

    /// Financial year of the local wall clock
    pub fn current() -> Self {
        Self::for_date(Local::now().date_naive())
    }

    pub fn start_year(&self) -> i32 {
        self.start_year
    }

    pub fn end_year(&self) -> i32 {
        self.start_year + 1
    }

    /// Parse the `2024-2025` form; the two years must be consecutive
    pub fn parse(s: &str) -> Option<Self> {
        let (start, end) = s.split_once('-')?;
        if start.len() != 4 || end.len() != 4 {
            return None;
        }
        let start: i32 = start.parse().ok()?;
        let end: i32 = end.parse().ok()?;
        (end == start + 1).then_some(Self { start_year: start })
    }
}

impl std::fmt::Display for FinancialYear {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.start_year, self.end_year())
    }
}

impl Serialize for FinancialYear {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for FinancialYear {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        FinancialYear::parse(&s)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid financial year: {}", s)))
    }
}

/// Prefix shared by every number of one kind in one year, e.g. `BILL-2024-2025-`
pub fn number_prefix(kind: DocumentKind, year: FinancialYear) -> String {
    format!("{}-{}-", kind.prefix(), year)
}

/// Format a document number, e.g. `BILL-2024-2025-0007`
pub fn format_document_number(kind: DocumentKind, year: FinancialYear, number: i64) -> String {
    format!(
        "{}{:0width$}",
        number_prefix(kind, year),
        number,
        width = SEQUENCE_WIDTH
    )
}

/// Extract the trailing `-(\d+)$` counter from a stored document number
pub fn parse_sequence_suffix(document_number: &str) -> Option<i64> {
    let (_, digits) = document_number.rsplit_once('-')?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Highest counter among stored numbers; unparseable numbers are skipped
pub fn highest_suffix<'a, I>(document_numbers: I) -> Option<i64>
where
    I: IntoIterator<Item = &'a str>,
{
    document_numbers
        .into_iter()
        .filter_map(parse_sequence_suffix)
        .max()
}

/// Counter value after reconciliation. Never moves the counter backwards.
pub fn reconciled_last_number(current: i64, observed_max: Option<i64>) -> i64 {
    observed_max.map_or(current, |max| max.max(current))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_financial_year_boundary() {
        assert_eq!(FinancialYear::for_date(date(2024, 3, 31)).to_string(), "2023-2024");
        assert_eq!(FinancialYear::for_date(date(2024, 4, 1)).to_string(), "2024-2025");
        assert_eq!(FinancialYear::for_date(date(2025, 1, 15)).to_string(), "2024-2025");
        assert_eq!(FinancialYear::for_date(date(2024, 12, 31)).to_string(), "2024-2025");
    }

    #[test]
    fn test_financial_year_parse() {
        assert_eq!(FinancialYear::parse("2024-2025"), Some(FinancialYear::starting(2024)));
        assert_eq!(FinancialYear::parse("2024-2026"), None);
        assert_eq!(FinancialYear::parse("24-25"), None);
        assert_eq!(FinancialYear::parse("2024"), None);
    }

    #[test]
    fn test_format_document_number() {
        let fy = FinancialYear::starting(2024);
        assert_eq!(format_document_number(DocumentKind::Bill, fy, 7), "BILL-2024-2025-0007");
        assert_eq!(format_document_number(DocumentKind::Receipt, fy, 12), "RCP-2024-2025-0012");
        assert_eq!(format_document_number(DocumentKind::VendorCreditNote, fy, 1), "VCN-2024-2025-0001");
        assert_eq!(format_document_number(DocumentKind::VendorPayment, fy, 12345), "VPMT-2024-2025-12345");
    }

    #[test]
    fn test_parse_sequence_suffix() {
        assert_eq!(parse_sequence_suffix("BILL-2024-2025-0007"), Some(7));
        assert_eq!(parse_sequence_suffix("VPMT-2024-2025-12345"), Some(12345));
        assert_eq!(parse_sequence_suffix("BILL-2024-2025-"), None);
        assert_eq!(parse_sequence_suffix("BILL-2024-2025-00A7"), None);
        assert_eq!(parse_sequence_suffix("0007"), None);
    }

    #[test]
    fn test_highest_suffix_skips_malformed() {
        let numbers = ["BILL-2024-2025-0003", "garbage", "BILL-2024-2025-0011", "BILL-2024-2025-0009"];
        assert_eq!(highest_suffix(numbers), Some(11));
        assert_eq!(highest_suffix(std::iter::empty::<&str>()), None);
    }

    #[test]
    fn test_reconcile_never_lowers() {
        assert_eq!(reconciled_last_number(6, Some(10)), 10);
        assert_eq!(reconciled_last_number(6, Some(3)), 6);
        assert_eq!(reconciled_last_number(6, None), 6);
    }

    #[test]
    fn test_document_kind_round_trip_names() {
        for kind in DocumentKind::ALL {
            assert_eq!(DocumentKind::from_str(kind.as_str()), Some(kind));
        }
    }
}
