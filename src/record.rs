use chrono::{Datelike, NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::{ReportError, Result};

/// Short month names in calendar order, index 0 is January.
pub const MONTH_LABELS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// Largest accepted absolute amount of a single sale.
///
/// Keeps every sum over an upload far inside `Decimal`'s range.
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(2_764_472_320, 232_830, 0, false, 0);

const DATE_FORMATS: [&str; 4] = ["%Y-%m-%d", "%Y/%m/%d", "%d/%m/%Y", "%d-%m-%Y"];
const DATETIME_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"];

/// One row of uploaded sales data
///
/// Records are built once by the loader and only read afterwards.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SaleRecord {
    /// Date of the sale
    pub date: NaiveDate,

    /// Sale amount, negative for returns and adjustments
    pub amount: Decimal,

    /// Client identifier
    pub client: String,

    /// Category identifier
    pub category: String,
}

impl SaleRecord {
    pub fn new(
        date: NaiveDate,
        amount: Decimal,
        client: impl Into<String>,
        category: impl Into<String>,
    ) -> Self {
        SaleRecord {
            date,
            amount,
            client: client.into(),
            category: category.into(),
        }
    }

    /// Build a record from raw cell text
    ///
    /// # Arguments
    /// * `row` - 1-based sheet row the values came from (the header is row 1)
    /// * `date` - Date text, see [`parse_date`] for the accepted forms
    /// * `amount` - Decimal text, optionally prefixed with `$`
    ///
    /// Dates whose year comes last (`09/02/2024`, `09-02-2024`) are always
    /// read day-first, so that example is the 9th of February.
    ///
    /// # Errors
    /// * `ReportError::InvalidRecord` naming the row when the date or the amount
    ///   cannot be parsed, or when the amount exceeds [`MAX_AMOUNT`]
    pub fn parse(
        row: usize,
        date: &str,
        amount: &str,
        client: &str,
        category: &str,
    ) -> Result<Self> {
        let date = parse_date(date).ok_or_else(|| {
            ReportError::invalid_record(row, format!("date '{}' is not a calendar date", date.trim()))
        })?;
        let amount = parse_amount(amount).ok_or_else(|| {
            ReportError::invalid_record(row, format!("amount '{}' is not a number", amount.trim()))
        })?;

        Ok(SaleRecord::new(date, check_amount(row, amount)?, client.trim(), category.trim()))
    }

    pub fn year(&self) -> i32 {
        self.date.year()
    }

    /// Calendar month, 1 for January
    pub fn month(&self) -> u32 {
        self.date.month()
    }
}

/// Parse a date in one of the layouts found in exported sales sheets.
///
/// Slash and dash forms with the year last are read day-first.
pub fn parse_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
                .map(|dt| dt.date())
        })
}

pub fn parse_amount(text: &str) -> Option<Decimal> {
    let text = text.trim();
    let text = text.strip_prefix('$').unwrap_or(text).trim();
    if text.is_empty() {
        return None;
    }
    Decimal::from_str(text)
        .or_else(|_| Decimal::from_scientific(text))
        .ok()
}

/// Reject amounts beyond [`MAX_AMOUNT`] in either direction
pub fn check_amount(row: usize, amount: Decimal) -> Result<Decimal> {
    if amount.abs() > MAX_AMOUNT {
        return Err(ReportError::invalid_record(
            row,
            format!("amount {} is outside the accepted range", amount),
        ));
    }
    Ok(amount)
}

/// Label for a 1-based calendar month, `"?"` outside 1..=12.
pub fn month_label(month: u32) -> &'static str {
    month
        .checked_sub(1)
        .and_then(|idx| MONTH_LABELS.get(idx as usize))
        .copied()
        .unwrap_or("?")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    #[test]
    fn parses_a_valid_row() {
        let rec = SaleRecord::parse(2, "2023-03-15", " 120.50 ", " ACME ", "Tools").unwrap();
        assert_eq!(rec.date, NaiveDate::from_ymd_opt(2023, 3, 15).unwrap());
        assert_eq!(rec.amount, Decimal::new(12050, 2));
        assert_eq!(rec.client, "ACME");
        assert_eq!(rec.category, "Tools");
        assert_eq!(rec.year(), 2023);
        assert_eq!(rec.month(), 3);
    }

    #[test]
    fn negative_amounts_are_allowed() {
        let rec = SaleRecord::parse(2, "2023-03-15", "-40", "ACME", "Returns").unwrap();
        assert_eq!(rec.amount, Decimal::from(-40));
    }

    #[test]
    fn accepts_common_date_layouts() {
        let expected = NaiveDate::from_ymd_opt(2024, 2, 9).unwrap();
        for text in [
            "2024-02-09",
            "2024/02/09",
            "09/02/2024",
            "09-02-2024",
            "2024-02-09 13:45:00",
            "2024-02-09T13:45:00",
        ] {
            assert_eq!(parse_date(text), Some(expected), "layout {text}");
        }
    }

    #[test]
    fn bad_date_is_an_invalid_record() {
        let err = SaleRecord::parse(5, "31/31/2024", "10", "a", "b").unwrap_err();
        match err {
            ReportError::InvalidRecord { row, reason } => {
                assert_eq!(row, 5);
                assert!(reason.contains("31/31/2024"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn non_numeric_amount_is_an_invalid_record() {
        let err = SaleRecord::parse(4, "2024-01-01", "twelve", "a", "b").unwrap_err();
        assert!(matches!(err, ReportError::InvalidRecord { row: 4, .. }));

        let err = SaleRecord::parse(4, "2024-01-01", "", "a", "b").unwrap_err();
        assert!(matches!(err, ReportError::InvalidRecord { row: 4, .. }));
    }

    #[test]
    fn amount_accepts_currency_prefix_and_exponent() {
        assert_eq!(parse_amount("$ 15.25"), Some(Decimal::new(1525, 2)));
        assert_eq!(parse_amount("1.5e2"), Some(Decimal::from(150)));
    }

    #[test]
    fn oversized_amounts_are_rejected() {
        assert_eq!(MAX_AMOUNT, Decimal::from(1_000_000_000_000_000i64));
        let err = SaleRecord::parse(7, "2024-01-01", "50000000000000000000000000000", "a", "b")
            .unwrap_err();
        assert!(matches!(err, ReportError::InvalidRecord { row: 7, .. }), "{err:?}");

        let err = SaleRecord::parse(7, "2024-01-01", "-7e28", "a", "b").unwrap_err();
        assert!(matches!(err, ReportError::InvalidRecord { row: 7, .. }), "{err:?}");

        let rec = SaleRecord::parse(7, "2024-01-01", "-1000000000000000", "a", "b").unwrap();
        assert_eq!(rec.amount, -MAX_AMOUNT);
    }

    #[test]
    fn year_last_dates_are_day_first() {
        let rec = SaleRecord::parse(2, "03/04/2023", "1", "a", "b").unwrap();
        assert_eq!(rec.date, NaiveDate::from_ymd_opt(2023, 4, 3).unwrap());
    }

    #[test]
    fn month_labels_follow_the_calendar() {
        assert_eq!(month_label(1), "Jan");
        assert_eq!(month_label(12), "Dec");
        assert_eq!(month_label(0), "?");
        assert_eq!(month_label(13), "?");
    }
}
