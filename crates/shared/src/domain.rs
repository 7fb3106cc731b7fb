use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.pad(&self.0)
            }
        }
    };
}

id_newtype!(LoanId);
id_newtype!(PaymentId);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoanType {
    Checks,
    StandingOrder,
}

impl LoanType {
    /// Every declared loan type, in display order.
    pub const ALL: [LoanType; 2] = [LoanType::Checks, LoanType::StandingOrder];

    /// Accepts the spellings the backend has used across API revisions.
    pub fn from_wire(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "checks" | "check" => Some(Self::Checks),
            "standing_order" | "standing_orders" | "standing-order" => Some(Self::StandingOrder),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Checks => "Checks",
            Self::StandingOrder => "Standing order",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LoanStatus {
    Pending,
    Active,
    Paid,
    Rejected,
}

impl LoanStatus {
    pub fn from_wire(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "PENDING" => Some(Self::Pending),
            "ACTIVE" => Some(Self::Active),
            "PAID" => Some(Self::Paid),
            "REJECTED" => Some(Self::Rejected),
            _ => None,
        }
    }

    /// Value sent in the `status` query parameter.
    pub fn as_query_value(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Active => "ACTIVE",
            Self::Paid => "PAID",
            Self::Rejected => "REJECTED",
        }
    }
}

/// Record-type half of a filter selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeFilter {
    #[default]
    All,
    Checks,
    StandingOrder,
}

impl TypeFilter {
    pub fn loan_type(self) -> Option<LoanType> {
        match self {
            Self::All => None,
            Self::Checks => Some(LoanType::Checks),
            Self::StandingOrder => Some(LoanType::StandingOrder),
        }
    }
}

impl From<LoanType> for TypeFilter {
    fn from(value: LoanType) -> Self {
        match value {
            LoanType::Checks => Self::Checks,
            LoanType::StandingOrder => Self::StandingOrder,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusFilter {
    All,
    Only(LoanStatus),
}

impl Default for StatusFilter {
    fn default() -> Self {
        Self::Only(LoanStatus::Active)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Borrower {
    pub name: String,
    pub phone: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trustee {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub community: Option<String>,
}

/// One normalized loan as held in client state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub id: LoanId,
    pub loan_type: LoanType,
    pub amount: Decimal,
    pub status: LoanStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,
    pub borrower: Borrower,
    pub trustee: Option<Trustee>,
}

/// Type-specific repayment terms of a loan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LoanTerms {
    Checks {
        num_payments: u32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        check_details: Option<String>,
        predefined_schedule: bool,
    },
    StandingOrder {
        monthly_amount: Decimal,
        charge_day: u8,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        stop_date: Option<NaiveDate>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanDetail {
    pub record: Record,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub form_file_url: Option<String>,
    pub terms: LoanTerms,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Paid,
    Pending,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRow {
    pub payment_id: PaymentId,
    pub due_date: NaiveDate,
    pub amount_due: Decimal,
    pub amount_paid: Decimal,
    pub status: PaymentStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PaymentSummary {
    pub total_amount: Decimal,
    pub paid_amount: Decimal,
    pub total_payments: u32,
    pub paid_payments: u32,
}

impl PaymentSummary {
    pub fn outstanding_amount(&self) -> Decimal {
        self.total_amount - self.paid_amount
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentSchedule {
    pub loan_id: LoanId,
    pub summary: PaymentSummary,
    pub payments: Vec<PaymentRow>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DashboardSummary {
    pub active_loans_count: u64,
    pub total_active_amount: Decimal,
}
