//! Yearly, monthly and per-category aggregation of sales records.
//!
//! Every function here is a pure, single pass over the records. Totals are
//! summed exactly with `Decimal`; only the yearly totals are rounded, to two
//! places, half-even.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

use crate::record::{SaleRecord, month_label};

/// Rounding applied to yearly totals and to displayed percentages.
pub const ROUNDING: RoundingStrategy = RoundingStrategy::MidpointNearestEven;

/// Decimal places kept in yearly totals.
pub const TOTAL_DECIMALS: u32 = 2;

/// Percentage change of a yearly total against the previous year present.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Growth {
    /// Change in percent; 0 for the earliest year.
    Percent(Decimal),
    /// The previous total was zero, so no ratio exists.
    Undefined,
}

impl Growth {
    /// Percentage value, `None` when undefined
    pub fn percent(&self) -> Option<Decimal> {
        match self {
            Growth::Percent(p) => Some(*p),
            Growth::Undefined => None,
        }
    }
}

impl fmt::Display for Growth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Growth::Percent(p) => write!(f, "{}%", format_2dp(*p)),
            Growth::Undefined => f.write_str("n/a"),
        }
    }
}

/// Aggregated total and growth for one calendar year
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PeriodSummary {
    pub year: i32,

    /// Sum of the year's amounts, rounded to two places
    pub total: Decimal,

    pub growth: Growth,
}

impl PeriodSummary {
    /// `Year: 2023 | Sales: $150.00 | Growth: 50.00%`
    pub fn report_line(&self) -> String {
        format!(
            "Year: {} | Sales: ${} | Growth: {}",
            self.year,
            format_2dp(self.total),
            self.growth
        )
    }
}

/// Calendar month of a given year, ordered by year then month
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct MonthKey {
    pub year: i32,
    /// 1 for January, 12 for December
    pub month: u32,
}

impl MonthKey {
    pub fn label(&self) -> &'static str {
        month_label(self.month)
    }
}

/// Summed amounts per (year, month), iterated in calendar order
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MonthlyTotals(BTreeMap<MonthKey, Decimal>);

impl MonthlyTotals {
    pub fn get(&self, year: i32, month: u32) -> Option<Decimal> {
        self.0.get(&MonthKey { year, month }).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&MonthKey, &Decimal)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn years(&self) -> Vec<i32> {
        let mut years: Vec<i32> = self.0.keys().map(|k| k.year).collect();
        years.dedup();
        years
    }

    /// One series per year, each holding `(month, total)` in calendar order
    pub fn series(&self) -> BTreeMap<i32, Vec<(u32, Decimal)>> {
        let mut series: BTreeMap<i32, Vec<(u32, Decimal)>> = BTreeMap::new();
        for (key, total) in &self.0 {
            series.entry(key.year).or_default().push((key.month, *total));
        }
        series
    }
}

pub type CategoryTotals = BTreeMap<String, Decimal>;

/// Summarize sales per calendar year
///
/// Amounts are summed per year, each sum is rounded to two places (half-even)
/// and the years are sorted ascending. Growth compares each rounded total with
/// the previous year present in the data, which need not be the previous
/// calendar year. The earliest year has a growth of 0; a year following a
/// zero total gets [`Growth::Undefined`].
///
/// # Examples
/// ```
/// use chrono::NaiveDate;
/// use rust_decimal::Decimal;
/// use sales_report::record::SaleRecord;
/// use sales_report::summary::{summarize_by_year, Growth};
///
/// let day = |y| NaiveDate::from_ymd_opt(y, 1, 1).unwrap();
/// let records = vec![
///     SaleRecord::new(day(2022), Decimal::from(100), "a", "x"),
///     SaleRecord::new(day(2023), Decimal::from(150), "a", "x"),
/// ];
/// let summary = summarize_by_year(&records);
/// assert_eq!(summary[1].growth, Growth::Percent(Decimal::from(50)));
/// ```
pub fn summarize_by_year(records: &[SaleRecord]) -> Vec<PeriodSummary> {
    let mut totals: BTreeMap<i32, Decimal> = BTreeMap::new();
    for rec in records {
        let total = totals.entry(rec.year()).or_default();
        *total = total.saturating_add(rec.amount);
    }

    let mut summary = Vec::with_capacity(totals.len());
    let mut previous: Option<Decimal> = None;

    for (year, total) in totals {
        let total = total.round_dp_with_strategy(TOTAL_DECIMALS, ROUNDING);
        let growth = match previous {
            None => Growth::Percent(Decimal::ZERO),
            Some(prev) => growth_between(prev, total),
        };
        summary.push(PeriodSummary {
            year,
            total,
            growth,
        });
        previous = Some(total);
    }

    summary
}

fn growth_between(previous: Decimal, current: Decimal) -> Growth {
    if previous.is_zero() {
        return Growth::Undefined;
    }
    current
        .checked_sub(previous)
        .and_then(|change| change.checked_div(previous))
        .and_then(|ratio| ratio.checked_mul(Decimal::ONE_HUNDRED))
        .map(|pct| Growth::Percent(pct.normalize()))
        .unwrap_or(Growth::Undefined)
}

/// Sum sales per (year, month)
///
/// Like every aggregation here, sums saturate at `Decimal`'s bounds instead of
/// panicking; loaded records are bounded by [`crate::record::MAX_AMOUNT`].
pub fn group_by_month(records: &[SaleRecord]) -> MonthlyTotals {
    let mut totals = BTreeMap::new();
    for rec in records {
        let key = MonthKey {
            year: rec.year(),
            month: rec.month(),
        };
        let total = totals.entry(key).or_insert(Decimal::ZERO);
        *total = total.saturating_add(rec.amount);
    }
    MonthlyTotals(totals)
}

/// Sum sales per category
pub fn group_by_category(records: &[SaleRecord]) -> CategoryTotals {
    let mut totals = CategoryTotals::new();
    for rec in records {
        let total = totals.entry(rec.category.clone()).or_insert(Decimal::ZERO);
        *total = total.saturating_add(rec.amount);
    }
    totals
}

pub fn grand_total(records: &[SaleRecord]) -> Decimal {
    records
        .iter()
        .fold(Decimal::ZERO, |sum, rec| sum.saturating_add(rec.amount))
}

/// Two-decimal text of a value, rounded with [`ROUNDING`]
pub fn format_2dp(value: Decimal) -> String {
    let rounded = value.round_dp_with_strategy(2, ROUNDING);
    format!("{:.2}", rounded)
}
