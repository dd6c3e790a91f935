use serde::Serialize;

use crate::error::{ReportError, Result};
use crate::filter::RecordFilter;
use crate::record::SaleRecord;
use crate::summary::{
    CategoryTotals, MonthlyTotals, PeriodSummary, group_by_category, group_by_month,
    summarize_by_year,
};

/// Everything derived from one upload and one filter selection
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SalesReport {
    /// Number of records left after filtering
    pub record_count: usize,
    pub yearly: Vec<PeriodSummary>,
    #[serde(skip)]
    pub monthly: MonthlyTotals,
    pub categories: CategoryTotals,
}

impl SalesReport {
    /// Filter the records and aggregate what remains
    ///
    /// # Errors
    /// * `ReportError::EmptyResult` when no record survives the filter
    pub fn build(records: &[SaleRecord], filter: &RecordFilter) -> Result<Self> {
        let selected = filter.apply(records);
        if selected.is_empty() {
            log::warn!(
                "no records left after filtering ({} loaded, filter {:?})",
                records.len(),
                filter
            );
            return Err(ReportError::EmptyResult);
        }

        let report = Self::from_records(&selected);
        log::info!(
            "built report over {} records spanning {} year(s)",
            report.record_count,
            report.yearly.len()
        );
        Ok(report)
    }

    /// Aggregate the given records without filtering
    pub fn from_records(records: &[SaleRecord]) -> Self {
        SalesReport {
            record_count: records.len(),
            yearly: summarize_by_year(records),
            monthly: group_by_month(records),
            categories: group_by_category(records),
        }
    }

    /// One formatted line per year, as printed in the PDF
    pub fn summary_lines(&self) -> Vec<String> {
        self.yearly.iter().map(PeriodSummary::report_line).collect()
    }
}

#[cfg(feature = "web")]
impl SalesReport {
    /// Render the charts and assemble the PDF document
    pub fn render_pdf(&self, settings: &crate::settings::Settings) -> Result<Vec<u8>> {
        let charts = crate::graph::render_charts(self, &settings.chart)?;
        crate::downloader::to_pdf(&settings.report, &self.summary_lines(), &charts.images())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    fn records() -> Vec<SaleRecord> {
        let day = |y, m| NaiveDate::from_ymd_opt(y, m, 1).unwrap();
        vec![
            SaleRecord::new(day(2022, 3), Decimal::from(100), "acme", "tools"),
            SaleRecord::new(day(2023, 1), Decimal::from(150), "acme", "paint"),
            SaleRecord::new(day(2023, 2), Decimal::from(30), "globex", "paint"),
        ]
    }

    #[test]
    fn builds_all_aggregates() {
        let report = SalesReport::build(&records(), &RecordFilter::new()).unwrap();
        assert_eq!(report.record_count, 3);
        assert_eq!(report.yearly.len(), 2);
        assert_eq!(report.monthly.len(), 3);
        assert_eq!(report.categories["paint"], Decimal::from(180));
    }

    #[test]
    fn filter_applies_before_aggregation() {
        let filter = RecordFilter::new().with_clients(["acme"]);
        let report = SalesReport::build(&records(), &filter).unwrap();
        assert_eq!(
            report.summary_lines(),
            vec![
                "Year: 2022 | Sales: $100.00 | Growth: 0.00%",
                "Year: 2023 | Sales: $150.00 | Growth: 50.00%",
            ]
        );
    }

    #[test]
    fn filter_matching_nothing_is_an_empty_result() {
        let filter = RecordFilter::new().with_categories(["garden"]);
        let err = SalesReport::build(&records(), &filter).unwrap_err();
        assert!(matches!(err, ReportError::EmptyResult));
    }
}
