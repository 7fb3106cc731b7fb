use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::Serialize;
use shared::domain::{LoanType, Record};

use crate::filters::FilterSelection;

pub const NO_FILTERS_SUMMARY: &str = "No filters applied";

/// Read-only statistics over the current result set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoanAggregates {
    pub total_amount: Decimal,
    /// Always holds every `LoanType`, zero when absent from the records.
    pub counts_by_type: BTreeMap<LoanType, usize>,
    pub has_active_filters: bool,
    pub filter_summary: String,
}

impl LoanAggregates {
    pub fn count(&self, loan_type: LoanType) -> usize {
        self.counts_by_type.get(&loan_type).copied().unwrap_or_default()
    }
}

pub fn aggregate(records: &[Record], filters: &FilterSelection) -> LoanAggregates {
    let mut counts_by_type: BTreeMap<LoanType, usize> =
        LoanType::ALL.iter().map(|loan_type| (*loan_type, 0)).collect();
    for record in records {
        *counts_by_type.entry(record.loan_type).or_default() += 1;
    }

    let mut descriptions = Vec::new();
    if let Some(loan_type) = filters.loan_type.loan_type() {
        descriptions.push(format!("Type: {}", loan_type.label()));
    }
    let search = &filters.search_text;
    if !search.is_empty() {
        descriptions.push(format!("Search: \"{search}\""));
    }

    let has_active_filters = !descriptions.is_empty();
    let filter_summary = if has_active_filters {
        descriptions.join(", ")
    } else {
        NO_FILTERS_SUMMARY.to_string()
    };

    LoanAggregates {
        total_amount: records.iter().map(|record| record.amount).sum(),
        counts_by_type,
        has_active_filters,
        filter_summary,
    }
}
