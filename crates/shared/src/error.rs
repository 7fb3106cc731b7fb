use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Structured error body returned by the loans API.
///
/// Different backend revisions use `detail`, `message` or `error` for the
/// human-readable text, sometimes next to a machine-readable `code`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ApiErrorBody {
    /// Parses a response body, returning `None` when it is not a JSON object.
    pub fn parse(raw: &str) -> Option<Self> {
        serde_json::from_str(raw).ok()
    }

    pub fn message(&self) -> Option<&str> {
        [&self.detail, &self.message, &self.error]
            .into_iter()
            .flatten()
            .map(|text| text.trim())
            .find(|text| !text.is_empty())
    }
}

/// A backend payload that cannot be turned into a normalized record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NormalizeError {
    #[error("loan payload is missing an id")]
    MissingId,
    #[error("unknown loan type '{0}'")]
    UnknownLoanType(String),
    #[error("unknown loan status '{0}'")]
    UnknownStatus(String),
    #[error("unknown payment status '{0}'")]
    UnknownPaymentStatus(String),
    #[error("invalid amount '{0}'")]
    InvalidAmount(String),
    #[error("negative amount {0}")]
    NegativeAmount(String),
    #[error("charge day {0} is outside 1..=31")]
    InvalidChargeDay(i64),
    #[error("payment count {0} is negative")]
    InvalidPaymentCount(i64),
}
