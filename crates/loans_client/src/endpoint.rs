use std::collections::BTreeMap;

use shared::domain::{LoanId, StatusFilter, TypeFilter};

use crate::filters::FilterSelection;

pub const LIST_PATH: &str = "/loans/";
pub const CHECKS_PATH: &str = "/loans/checks/";
pub const STANDING_ORDER_PATH: &str = "/loans/standing-order/";
pub const DASHBOARD_SUMMARY_PATH: &str = "/dashboard/loan-summary/";

pub const STATUS_PARAM: &str = "status";
pub const SEARCH_PARAM: &str = "search";

/// Path and query parameters of one list request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestDescriptor {
    pub path: String,
    pub query: BTreeMap<String, String>,
}

impl RequestDescriptor {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            query: BTreeMap::new(),
        }
    }

    pub fn param(&self, key: &str) -> Option<&str> {
        self.query.get(key).map(String::as_str)
    }
}

/// Maps a filter selection to the list request it should issue.
///
/// `status` is omitted only for `StatusFilter::All`, so the default active
/// filter is always sent. Only the debounced search text is ever used.
pub fn resolve(selection: &FilterSelection) -> RequestDescriptor {
    let path = match selection.loan_type {
        TypeFilter::All => LIST_PATH,
        TypeFilter::Checks => CHECKS_PATH,
        TypeFilter::StandingOrder => STANDING_ORDER_PATH,
    };
    let mut request = RequestDescriptor::new(path);

    if let StatusFilter::Only(status) = selection.status {
        request
            .query
            .insert(STATUS_PARAM.to_string(), status.as_query_value().to_string());
    }

    let search = &selection.debounced_search_text;
    if !search.is_empty() {
        request
            .query
            .insert(SEARCH_PARAM.to_string(), search.clone());
    }

    request
}

pub fn detail_path(loan_id: &LoanId) -> String {
    format!("{LIST_PATH}{}/", loan_id.as_str())
}

pub fn payments_path(loan_id: &LoanId) -> String {
    format!("{LIST_PATH}{}/payments/", loan_id.as_str())
}
