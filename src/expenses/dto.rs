use serde::Serialize;

use super::repo_types::NewExpense;
use crate::{
    error::{ApiError, ApiResult},
    multipart::FormData,
};

const REQUIRED_FIELDS: &[&str] = &[
    "vendor_id",
    "department_id",
    "engagement_id",
    "expense_category",
    "expense_description",
    "expense_amount",
    "expense_reference_type",
    "expense_reference_number",
    "expense_start_date",
    "expense_end_date",
    "tenure_days",
    "tenure_months",
    "tenure_years",
];

#[derive(Debug, Serialize)]
pub struct ExpenseCreated {
    pub message: String,
    pub id: i32,
    pub documents: usize,
}

fn required<T: std::str::FromStr>(form: &FormData, name: &str) -> ApiResult<T> {
    form.parse(name)?
        .ok_or_else(|| ApiError::validation(format!("{} is required", name)))
}

impl NewExpense {
    pub fn from_form(form: &FormData) -> ApiResult<Self> {
        let missing: Vec<&str> = REQUIRED_FIELDS
            .iter()
            .copied()
            .filter(|f| form.text(f).is_none())
            .collect();
        if !missing.is_empty() {
            return Err(ApiError::validation(format!(
                "Missing required fields: {}",
                missing.join(", ")
            )));
        }

        let new = Self {
            vendor_id: required(form, "vendor_id")?,
            department_id: required(form, "department_id")?,
            engagement_id: required(form, "engagement_id")?,
            expense_category: form.required("expense_category")?.to_string(),
            expense_description: form.required("expense_description")?.to_string(),
            expense_amount: required(form, "expense_amount")?,
            expense_reference_type: form.required("expense_reference_type")?.to_string(),
            expense_reference_number: form.required("expense_reference_number")?.to_string(),
            expense_start_date: form
                .date("expense_start_date")?
                .ok_or_else(|| ApiError::validation("expense_start_date is required"))?,
            expense_end_date: form
                .date("expense_end_date")?
                .ok_or_else(|| ApiError::validation("expense_end_date is required"))?,
            original_currency: form.owned("original_currency"),
            original_amount: form.parse("original_amount")?,
            tenure_days: required(form, "tenure_days")?,
            tenure_months: required(form, "tenure_months")?,
            tenure_years: required(form, "tenure_years")?,
        };

        if new.expense_amount.is_sign_negative() {
            return Err(ApiError::validation("expense_amount must not be negative"));
        }
        if new.expense_end_date < new.expense_start_date {
            return Err(ApiError::validation(
                "expense_end_date must not be before expense_start_date",
            ));
        }
        if new.tenure_days < 0 || new.tenure_months < 0 || new.tenure_years < 0 {
            return Err(ApiError::validation("tenure must not be negative"));
        }
        Ok(new)
    }
}
