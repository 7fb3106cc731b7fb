use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use shared::{
    domain::{DashboardSummary, LoanDetail, LoanId, PaymentSchedule, Record},
    error::{ApiErrorBody, NormalizeError},
    protocol::{
        normalize_list, ApiDashboardSummary, ApiLoanDetails, ApiLoanList, ApiPaymentSchedule,
    },
};
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::endpoint::{detail_path, payments_path, RequestDescriptor, DASHBOARD_SUMMARY_PATH};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportCode {
    TimedOut,
    ConnectionAborted,
    Connect,
    Other,
}

/// Why a repository call did not produce a value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchFailure {
    #[error("server responded with status {status}")]
    Status {
        status: u16,
        /// Human-readable text from a structured error body, if any.
        message: Option<String>,
    },
    #[error("transport failure ({code:?}): {detail}")]
    Transport { code: TransportCode, detail: String },
    #[error("unreadable response: {0}")]
    Decode(String),
}

impl FetchFailure {
    pub fn status(status: u16) -> Self {
        Self::Status {
            status,
            message: None,
        }
    }

    pub fn transport(code: TransportCode, detail: impl Into<String>) -> Self {
        Self::Transport {
            code,
            detail: detail.into(),
        }
    }
}

impl From<reqwest::Error> for FetchFailure {
    fn from(err: reqwest::Error) -> Self {
        let code = if err.is_timeout() {
            TransportCode::TimedOut
        } else if err.is_connect() {
            TransportCode::Connect
        } else if err.is_decode() {
            return Self::Decode(err.to_string());
        } else if err.is_body() || err.is_request() {
            TransportCode::ConnectionAborted
        } else {
            TransportCode::Other
        };
        Self::transport(code, err.to_string())
    }
}

impl From<NormalizeError> for FetchFailure {
    fn from(err: NormalizeError) -> Self {
        Self::Decode(err.to_string())
    }
}

/// Source of normalized loan data.
#[async_trait]
pub trait LoanRepository: Send + Sync {
    async fn fetch_list(&self, request: &RequestDescriptor) -> Result<Vec<Record>, FetchFailure>;
    async fn fetch_detail(&self, loan_id: &LoanId) -> Result<LoanDetail, FetchFailure>;
    async fn fetch_payments(&self, loan_id: &LoanId) -> Result<PaymentSchedule, FetchFailure>;
    async fn fetch_dashboard_summary(&self) -> Result<DashboardSummary, FetchFailure>;
}

/// `LoanRepository` over the loans REST API.
pub struct HttpLoanRepository {
    http: Client,
    base_url: Url,
}

impl HttpLoanRepository {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let mut base_url =
            Url::parse(base_url).with_context(|| format!("invalid api base url: {base_url}"))?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build http client")?;
        Ok(Self { http, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url, FetchFailure> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|err| FetchFailure::transport(TransportCode::Other, err.to_string()))
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, FetchFailure> {
        let url = self.endpoint(path)?;
        debug!(url = %url, "loans api: GET");
        let response = self.http.get(url).query(query).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(status_failure(status, response.text().await.unwrap_or_default()));
        }
        Ok(response.json().await?)
    }
}

fn status_failure(status: StatusCode, body: String) -> FetchFailure {
    let message = ApiErrorBody::parse(&body).and_then(|body| body.message().map(str::to_string));
    FetchFailure::Status {
        status: status.as_u16(),
        message,
    }
}

#[async_trait]
impl LoanRepository for HttpLoanRepository {
    async fn fetch_list(&self, request: &RequestDescriptor) -> Result<Vec<Record>, FetchFailure> {
        let query = request
            .query
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
            .collect::<Vec<_>>();
        let list: ApiLoanList = self.get_json(&request.path, &query).await?;
        Ok(normalize_list(list)?)
    }

    async fn fetch_detail(&self, loan_id: &LoanId) -> Result<LoanDetail, FetchFailure> {
        let details: ApiLoanDetails = self.get_json(&detail_path(loan_id), &[]).await?;
        Ok(LoanDetail::try_from(details)?)
    }

    async fn fetch_payments(&self, loan_id: &LoanId) -> Result<PaymentSchedule, FetchFailure> {
        let schedule: ApiPaymentSchedule = self.get_json(&payments_path(loan_id), &[]).await?;
        Ok(PaymentSchedule::try_from(schedule)?)
    }

    async fn fetch_dashboard_summary(&self) -> Result<DashboardSummary, FetchFailure> {
        let summary: ApiDashboardSummary = self.get_json(DASHBOARD_SUMMARY_PATH, &[]).await?;
        Ok(DashboardSummary::try_from(summary)?)
    }
}

#[cfg(test)]
#[path = "tests/repository_tests.rs"]
mod tests;
