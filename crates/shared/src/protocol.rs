//! Wire shapes of the loans API and their translation into domain types.
//!
//! Every backend revision seen so far is accepted here, so nothing past this
//! module has to probe payload fields.

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{
    domain::{
        Borrower, DashboardSummary, LoanDetail, LoanId, LoanStatus, LoanTerms, LoanType,
        PaymentId, PaymentRow, PaymentSchedule, PaymentStatus, PaymentSummary, Record, Trustee,
    },
    error::NormalizeError,
};

/// Monetary value as sent by the backend: a decimal string, or a bare number
/// in older revisions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ApiAmount {
    Text(String),
    Number(serde_json::Number),
}

impl ApiAmount {
    pub fn to_decimal(&self) -> Result<Decimal, NormalizeError> {
        let raw = match self {
            Self::Text(text) => text.trim().to_string(),
            Self::Number(number) => number.to_string(),
        };
        Decimal::from_str(&raw)
            .or_else(|_| Decimal::from_scientific(&raw))
            .map_err(|_| NormalizeError::InvalidAmount(raw))
    }

    fn to_non_negative(&self) -> Result<Decimal, NormalizeError> {
        let amount = self.to_decimal()?;
        if amount.is_sign_negative() && !amount.is_zero() {
            return Err(NormalizeError::NegativeAmount(amount.to_string()));
        }
        Ok(amount)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ApiId {
    Text(String),
    Number(i64),
}

impl ApiId {
    fn into_string(self) -> String {
        match self {
            Self::Text(text) => text.trim().to_string(),
            Self::Number(number) => number.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiBorrower {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiTrustee {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub community: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiLoanListItem {
    #[serde(default, alias = "id")]
    pub loan_id: Option<ApiId>,
    #[serde(alias = "type")]
    pub loan_type: String,
    pub amount: ApiAmount,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    pub status: String,
    #[serde(default)]
    pub borrower: ApiBorrower,
    #[serde(default)]
    pub trustee: Option<ApiTrustee>,
}

/// A list response: a bare array, or a paged envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ApiLoanList {
    Items(Vec<ApiLoanListItem>),
    Paged {
        #[serde(alias = "results")]
        loans: Vec<ApiLoanListItem>,
    },
}

impl ApiLoanList {
    pub fn into_items(self) -> Vec<ApiLoanListItem> {
        match self {
            Self::Items(items) => items,
            Self::Paged { loans } => loans,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ApiLoanTerms {
    Checks {
        num_payments: i64,
        #[serde(default)]
        check_details: Option<String>,
        #[serde(default = "predefined_schedule_default")]
        predefined_schedule: bool,
    },
    StandingOrder {
        monthly_amount: ApiAmount,
        charge_day: i64,
        #[serde(default)]
        stop_date: Option<NaiveDate>,
    },
}

fn predefined_schedule_default() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiLoanDetails {
    #[serde(flatten)]
    pub item: ApiLoanListItem,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub form_file_url: Option<String>,
    pub details: ApiLoanTerms,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiPaymentSummary {
    pub total_amount: ApiAmount,
    pub paid_amount: ApiAmount,
    pub total_payments: u32,
    pub paid_payments: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiPaymentRow {
    #[serde(alias = "id")]
    pub payment_id: ApiId,
    pub due_date: NaiveDate,
    #[serde(alias = "amount")]
    pub amount_due: ApiAmount,
    #[serde(default)]
    pub amount_paid: Option<ApiAmount>,
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiPaymentSchedule {
    pub loan_id: ApiId,
    #[serde(default)]
    pub summary: Option<ApiPaymentSummary>,
    #[serde(default)]
    pub payments: Vec<ApiPaymentRow>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiDashboardSummary {
    pub active_loans_count: u64,
    pub total_active_loans_amount: ApiAmount,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
}

impl TryFrom<ApiLoanListItem> for Record {
    type Error = NormalizeError;

    fn try_from(item: ApiLoanListItem) -> Result<Self, Self::Error> {
        let id = item
            .loan_id
            .map(ApiId::into_string)
            .filter(|id| !id.is_empty())
            .ok_or(NormalizeError::MissingId)?;
        let loan_type = LoanType::from_wire(&item.loan_type)
            .ok_or_else(|| NormalizeError::UnknownLoanType(item.loan_type.clone()))?;
        let status = LoanStatus::from_wire(&item.status)
            .ok_or_else(|| NormalizeError::UnknownStatus(item.status.clone()))?;
        let amount = item.amount.to_non_negative()?;

        let borrower = Borrower {
            name: non_empty(item.borrower.name).unwrap_or_default(),
            phone: non_empty(item.borrower.phone).unwrap_or_default(),
            email: non_empty(item.borrower.email),
        };
        // Older list views emit `{"name": null, ...}` for loans without a trustee.
        let trustee = item.trustee.and_then(|trustee| {
            non_empty(trustee.name).map(|name| Trustee {
                name,
                community: non_empty(trustee.community),
            })
        });

        Ok(Record {
            id: LoanId(id),
            loan_type,
            amount,
            status,
            start_date: item.start_date,
            borrower,
            trustee,
        })
    }
}

impl TryFrom<ApiLoanTerms> for LoanTerms {
    type Error = NormalizeError;

    fn try_from(terms: ApiLoanTerms) -> Result<Self, Self::Error> {
        match terms {
            ApiLoanTerms::Checks {
                num_payments,
                check_details,
                predefined_schedule,
            } => Ok(LoanTerms::Checks {
                num_payments: u32::try_from(num_payments)
                    .map_err(|_| NormalizeError::InvalidPaymentCount(num_payments))?,
                check_details: non_empty(check_details),
                predefined_schedule,
            }),
            ApiLoanTerms::StandingOrder {
                monthly_amount,
                charge_day,
                stop_date,
            } => {
                if !(1..=31).contains(&charge_day) {
                    return Err(NormalizeError::InvalidChargeDay(charge_day));
                }
                Ok(LoanTerms::StandingOrder {
                    monthly_amount: monthly_amount.to_non_negative()?,
                    charge_day: charge_day as u8,
                    stop_date,
                })
            }
        }
    }
}

impl TryFrom<ApiLoanDetails> for LoanDetail {
    type Error = NormalizeError;

    fn try_from(details: ApiLoanDetails) -> Result<Self, Self::Error> {
        Ok(LoanDetail {
            record: Record::try_from(details.item)?,
            created_at: details.created_at,
            form_file_url: non_empty(details.form_file_url),
            terms: LoanTerms::try_from(details.details)?,
        })
    }
}

impl TryFrom<ApiPaymentRow> for PaymentRow {
    type Error = NormalizeError;

    fn try_from(row: ApiPaymentRow) -> Result<Self, Self::Error> {
        let status = match row.status.trim().to_ascii_uppercase().as_str() {
            "PAID" => PaymentStatus::Paid,
            "PENDING" => PaymentStatus::Pending,
            _ => return Err(NormalizeError::UnknownPaymentStatus(row.status)),
        };
        let amount_paid = match &row.amount_paid {
            Some(amount) => amount.to_non_negative()?,
            None => Decimal::ZERO,
        };
        Ok(PaymentRow {
            payment_id: PaymentId(row.payment_id.into_string()),
            due_date: row.due_date,
            amount_due: row.amount_due.to_non_negative()?,
            amount_paid,
            status,
        })
    }
}

impl TryFrom<ApiPaymentSchedule> for PaymentSchedule {
    type Error = NormalizeError;

    fn try_from(schedule: ApiPaymentSchedule) -> Result<Self, Self::Error> {
        let payments = schedule
            .payments
            .into_iter()
            .map(PaymentRow::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        let summary = match schedule.summary {
            Some(summary) => PaymentSummary {
                total_amount: summary.total_amount.to_non_negative()?,
                paid_amount: summary.paid_amount.to_non_negative()?,
                total_payments: summary.total_payments,
                paid_payments: summary.paid_payments,
            },
            None => summarize_payments(&payments),
        };
        Ok(PaymentSchedule {
            loan_id: LoanId(schedule.loan_id.into_string()),
            summary,
            payments,
        })
    }
}

impl TryFrom<ApiDashboardSummary> for DashboardSummary {
    type Error = NormalizeError;

    fn try_from(summary: ApiDashboardSummary) -> Result<Self, Self::Error> {
        Ok(DashboardSummary {
            active_loans_count: summary.active_loans_count,
            total_active_amount: summary.total_active_loans_amount.to_non_negative()?,
        })
    }
}

/// Builds a payment summary from the rows when the backend omits one.
pub fn summarize_payments(payments: &[PaymentRow]) -> PaymentSummary {
    PaymentSummary {
        total_amount: payments.iter().map(|row| row.amount_due).sum(),
        paid_amount: payments.iter().map(|row| row.amount_paid).sum(),
        total_payments: payments.len() as u32,
        paid_payments: payments
            .iter()
            .filter(|row| row.status == PaymentStatus::Paid)
            .count() as u32,
    }
}

/// Normalizes a whole list response, preserving server order.
pub fn normalize_list(list: ApiLoanList) -> Result<Vec<Record>, NormalizeError> {
    list.into_items()
        .into_iter()
        .map(Record::try_from)
        .collect()
}
