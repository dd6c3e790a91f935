use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::record::SaleRecord;

/// Client and category selection applied before aggregation
///
/// An empty set places no restriction on that field, the way an untouched
/// multiselect behaves in the upload form.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordFilter {
    pub clients: BTreeSet<String>,
    pub categories: BTreeSet<String>,
}

impl RecordFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_clients<I, S>(mut self, clients: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.clients.extend(clients.into_iter().map(Into::into));
        self
    }

    pub fn with_categories<I, S>(mut self, categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.categories.extend(categories.into_iter().map(Into::into));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty() && self.categories.is_empty()
    }

    pub fn matches(&self, record: &SaleRecord) -> bool {
        (self.clients.is_empty() || self.clients.contains(&record.client))
            && (self.categories.is_empty() || self.categories.contains(&record.category))
    }

    /// Records passing the filter, in input order
    pub fn apply(&self, records: &[SaleRecord]) -> Vec<SaleRecord> {
        records
            .iter()
            .filter(|rec| self.matches(rec))
            .cloned()
            .collect()
    }
}

/// Distinct client identifiers in order of first appearance
pub fn distinct_clients(records: &[SaleRecord]) -> Vec<String> {
    distinct(records.iter().map(|rec| rec.client.as_str()))
}

/// Distinct category identifiers in order of first appearance
pub fn distinct_categories(records: &[SaleRecord]) -> Vec<String> {
    distinct(records.iter().map(|rec| rec.category.as_str()))
}

fn distinct<'a>(values: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut seen = BTreeSet::new();
    values
        .filter(|v| seen.insert(*v))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::summary::summarize_by_year;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    fn records() -> Vec<SaleRecord> {
        let day = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        vec![
            SaleRecord::new(day, Decimal::from(10), "globex", "paint"),
            SaleRecord::new(day, Decimal::from(20), "acme", "tools"),
            SaleRecord::new(day, Decimal::from(30), "globex", "tools"),
            SaleRecord::new(day, Decimal::from(40), "acme", "paint"),
        ]
    }

    #[test]
    fn empty_filter_keeps_everything() {
        let filter = RecordFilter::new();
        assert!(filter.is_empty());
        assert_eq!(filter.apply(&records()), records());
    }

    #[test]
    fn filters_by_client() {
        let kept = RecordFilter::new().with_clients(["acme"]).apply(&records());
        let amounts: Vec<Decimal> = kept.iter().map(|r| r.amount).collect();
        assert_eq!(amounts, vec![Decimal::from(20), Decimal::from(40)]);
    }

    #[test]
    fn client_and_category_must_both_match() {
        let filter = RecordFilter::new()
            .with_clients(["globex", "acme"])
            .with_categories(["tools"]);
        let kept = filter.apply(&records());
        assert_eq!(kept.len(), 2);
        assert!(kept.iter().all(|r| r.category == "tools"));
    }

    #[test]
    fn unknown_client_gives_an_empty_summary() {
        let kept = RecordFilter::new().with_clients(["nobody"]).apply(&records());
        assert!(kept.is_empty());
        assert!(summarize_by_year(&kept).is_empty());
    }

    #[test]
    fn distinct_values_keep_first_appearance_order() {
        assert_eq!(distinct_clients(&records()), vec!["globex", "acme"]);
        assert_eq!(distinct_categories(&records()), vec!["paint", "tools"]);
    }
}
