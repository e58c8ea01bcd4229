use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::{Date, OffsetDateTime};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Expense {
    pub expense_id: i32,
    pub vendor_id: i32,
    pub department_id: i32,
    pub engagement_id: i32,
    pub expense_category: String,
    pub expense_description: String,
    pub expense_amount: Decimal,
    pub expense_reference_type: String,
    pub expense_reference_number: String,
    pub expense_start_date: Date,
    pub expense_end_date: Date,
    pub expense_status: String,
    pub original_currency: Option<String>,
    pub original_amount: Option<Decimal>,
    pub tenure_days: i32,
    pub tenure_months: i32,
    pub tenure_years: i32,
    pub approved_by: Option<Uuid>,
    pub approved_at: Option<OffsetDateTime>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Serialize, FromRow)]
pub struct ExpenseView {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub expense: Expense,
    pub vendor_name: Option<String>,
}

/// Active engagement with the ids an expense form needs.
#[derive(Debug, Serialize, FromRow)]
pub struct ExpenseEngagement {
    pub engagement_id: i32,
    pub engagement_name: String,
    pub vendor_id: i32,
    pub vendor_name: String,
    pub department_id: Option<i32>,
    pub department_name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewExpense {
    pub vendor_id: i32,
    pub department_id: i32,
    pub engagement_id: i32,
    pub expense_category: String,
    pub expense_description: String,
    pub expense_amount: Decimal,
    pub expense_reference_type: String,
    pub expense_reference_number: String,
    pub expense_start_date: Date,
    pub expense_end_date: Date,
    pub original_currency: Option<String>,
    pub original_amount: Option<Decimal>,
    pub tenure_days: i32,
    pub tenure_months: i32,
    pub tenure_years: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExpenseStatus {
    Pending,
    Approved,
    Rejected,
}

impl ExpenseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExpenseStatus::Pending => "Pending",
            ExpenseStatus::Approved => "Approved",
            ExpenseStatus::Rejected => "Rejected",
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct StatusUpdate {
    pub expense_status: ExpenseStatus,
}
