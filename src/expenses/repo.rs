use anyhow::Context;
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use super::repo_types::{ExpenseEngagement, ExpenseStatus, ExpenseView, NewExpense};
use crate::documents::attachments::StagedDocuments;

const VIEW_SELECT: &str = r#"
    SELECT x.expense_id, x.vendor_id, x.department_id, x.engagement_id, x.expense_category,
           x.expense_description, x.expense_amount, x.expense_reference_type,
           x.expense_reference_number, x.expense_start_date, x.expense_end_date,
           x.expense_status, x.original_currency, x.original_amount, x.tenure_days,
           x.tenure_months, x.tenure_years, x.approved_by, x.approved_at,
           x.created_at, x.updated_at,
           v.vendor_name
      FROM expenses x
      LEFT JOIN vendor v ON v.vendor_id = x.vendor_id
"#;

pub async fn list(db: &PgPool) -> anyhow::Result<Vec<ExpenseView>> {
    let rows = sqlx::query_as::<_, ExpenseView>(&format!(
        "{VIEW_SELECT} ORDER BY x.created_at DESC"
    ))
    .fetch_all(db)
    .await
    .context("list expenses")?;
    Ok(rows)
}

pub async fn find(db: &PgPool, expense_id: i32) -> anyhow::Result<Option<ExpenseView>> {
    let row = sqlx::query_as::<_, ExpenseView>(&format!("{VIEW_SELECT} WHERE x.expense_id = $1"))
        .bind(expense_id)
        .fetch_optional(db)
        .await
        .context("find expense")?;
    Ok(row)
}

/// Engagements are linked to departments by name.
pub async fn active_engagements(db: &PgPool) -> anyhow::Result<Vec<ExpenseEngagement>> {
    let rows = sqlx::query_as::<_, ExpenseEngagement>(
        r#"
        SELECT e.engagement_id, e.engagement_name, v.vendor_id, v.vendor_name,
               d.department_id, d.department_name
          FROM engagement e
          JOIN vendor v ON v.vendor_id = e.engaged_vendor_id
          LEFT JOIN departments d ON d.department_name = e.engaged_department
         WHERE e.engagement_status = 'Active'
         ORDER BY e.engagement_name
        "#,
    )
    .fetch_all(db)
    .await
    .context("list expense engagements")?;
    Ok(rows)
}

pub async fn create(
    db: &PgPool,
    x: &NewExpense,
    documents: &StagedDocuments,
    now: OffsetDateTime,
) -> anyhow::Result<i32> {
    let mut tx = db.begin().await?;

    let expense_id: i32 = sqlx::query_scalar(
        r#"
        INSERT INTO expenses (
            vendor_id, department_id, engagement_id, expense_category, expense_description,
            expense_amount, expense_reference_type, expense_reference_number,
            expense_start_date, expense_end_date, expense_status, original_currency,
            original_amount, tenure_days, tenure_months, tenure_years, created_at, updated_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, 'Pending', $11, $12, $13, $14, $15, $16, $16)
        RETURNING expense_id
        "#,
    )
    .bind(x.vendor_id)
    .bind(x.department_id)
    .bind(x.engagement_id)
    .bind(&x.expense_category)
    .bind(&x.expense_description)
    .bind(x.expense_amount)
    .bind(&x.expense_reference_type)
    .bind(&x.expense_reference_number)
    .bind(x.expense_start_date)
    .bind(x.expense_end_date)
    .bind(&x.original_currency)
    .bind(x.original_amount)
    .bind(x.tenure_days)
    .bind(x.tenure_months)
    .bind(x.tenure_years)
    .bind(now)
    .fetch_one(&mut *tx)
    .await
    .context("insert expense")?;

    documents.insert_tx(&mut *tx, expense_id, now).await?;

    tx.commit().await?;
    Ok(expense_id)
}

pub async fn set_status(
    db: &PgPool,
    expense_id: i32,
    status: ExpenseStatus,
    decided_by: Uuid,
    now: OffsetDateTime,
) -> anyhow::Result<bool> {
    let (approved_by, approved_at) = match status {
        ExpenseStatus::Pending => (None, None),
        ExpenseStatus::Approved | ExpenseStatus::Rejected => (Some(decided_by), Some(now)),
    };
    let res = sqlx::query(
        r#"
        UPDATE expenses
        SET expense_status = $1, approved_by = $2, approved_at = $3, updated_at = $4
        WHERE expense_id = $5
        "#,
    )
    .bind(status.as_str())
    .bind(approved_by)
    .bind(approved_at)
    .bind(now)
    .bind(expense_id)
    .execute(db)
    .await
    .context("update expense status")?;
    Ok(res.rows_affected() > 0)
}

pub async fn delete(db: &PgPool, expense_id: i32) -> anyhow::Result<bool> {
    let res = sqlx::query("DELETE FROM expenses WHERE expense_id = $1")
        .bind(expense_id)
        .execute(db)
        .await
        .context("delete expense")?;
    Ok(res.rows_affected() > 0)
}
