//! Monthly activity aggregation
//!
//! Groups dataset rows by the calendar month of their wall-clock date and
//! counts them in total and per selected category.

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};

use crate::types::{Category, MonthlyAggregate, NormalizedDataset};

/// Stateless helper that groups rows by month
pub struct MonthlyAggregator;

impl MonthlyAggregator {
    /// Aggregate rows by month, ascending by `year_month`
    ///
    /// Every selected category appears in each month's breakdown, zero when it
    /// had no activity. Months without any rows are not emitted.
    pub fn aggregate(dataset: &NormalizedDataset) -> Vec<MonthlyAggregate> {
        let mut months: BTreeMap<(i32, u32), MonthlyAggregate> = BTreeMap::new();

        for row in &dataset.rows {
            let local = row.date.local();
            let month = months
                .entry((local.year(), local.month()))
                .or_insert_with(|| empty_month(row.date.year_month(), &dataset.categories));

            month.total_count += 1;
            *month
                .per_category_counts
                .entry(row.source_category)
                .or_insert(0) += 1;
        }

        months.into_values().collect()
    }

    /// Insert zero rows for months missing between the first and last aggregate
    ///
    /// For consumers that need a continuous axis.
    pub fn fill_missing_months(
        aggregates: &[MonthlyAggregate],
        categories: &[Category],
    ) -> Vec<MonthlyAggregate> {
        let (Some(first), Some(last)) = (aggregates.first(), aggregates.last()) else {
            return Vec::new();
        };
        let (Some(mut cursor), Some(end)) = (
            parse_year_month(&first.year_month),
            parse_year_month(&last.year_month),
        ) else {
            return aggregates.to_vec();
        };

        let mut by_month: BTreeMap<&str, &MonthlyAggregate> = aggregates
            .iter()
            .map(|a| (a.year_month.as_str(), a))
            .collect();

        let mut filled = Vec::new();
        while cursor <= end {
            let label = cursor.format("%Y-%m").to_string();
            match by_month.remove(label.as_str()) {
                Some(existing) => filled.push(existing.clone()),
                None => filled.push(empty_month(label, categories)),
            }
            cursor = match next_month(cursor) {
                Some(next) => next,
                None => break,
            };
        }

        filled
    }

    /// Sum of counts per category across all months
    pub fn category_totals(aggregates: &[MonthlyAggregate]) -> BTreeMap<Category, u64> {
        let mut totals = BTreeMap::new();
        for month in aggregates {
            for (category, count) in &month.per_category_counts {
                *totals.entry(*category).or_insert(0) += count;
            }
        }
        totals
    }
}

fn empty_month(year_month: String, categories: &[Category]) -> MonthlyAggregate {
    MonthlyAggregate {
        year_month,
        total_count: 0,
        per_category_counts: categories.iter().map(|c| (*c, 0)).collect(),
    }
}

fn parse_year_month(label: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(&format!("{}-01", label), "%Y-%m-%d").ok()
}

fn next_month(date: NaiveDate) -> Option<NaiveDate> {
    if date.month() == 12 {
        NaiveDate::from_ymd_opt(date.year() + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(date.year(), date.month() + 1, 1)
    }
}
