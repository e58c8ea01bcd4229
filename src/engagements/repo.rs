use anyhow::Context;
use sqlx::PgPool;
use time::OffsetDateTime;

use super::repo_types::{EngagementFields, EngagementView};
use crate::documents::attachments::StagedDocuments;

const VIEW_SELECT: &str = r#"
    SELECT e.engagement_id, e.engaged_vendor_id, e.engagement_name, e.engagement_type,
           e.start_date, e.end_date, e.engagement_status, e.contact_name, e.contact_email,
           e.contact_phone, e.engaged_department, e.created_at, e.updated_at,
           v.vendor_name
      FROM engagement e
      LEFT JOIN vendor v ON v.vendor_id = e.engaged_vendor_id
"#;

pub async fn list(db: &PgPool, active_only: bool) -> anyhow::Result<Vec<EngagementView>> {
    let filter = if active_only {
        "WHERE e.engagement_status = 'Active'"
    } else {
        ""
    };
    let rows = sqlx::query_as::<_, EngagementView>(&format!(
        "{VIEW_SELECT} {filter} ORDER BY e.created_at DESC"
    ))
    .fetch_all(db)
    .await
    .context("list engagements")?;
    Ok(rows)
}

pub async fn find(db: &PgPool, engagement_id: i32) -> anyhow::Result<Option<EngagementView>> {
    let row = sqlx::query_as::<_, EngagementView>(&format!(
        "{VIEW_SELECT} WHERE e.engagement_id = $1"
    ))
    .bind(engagement_id)
    .fetch_optional(db)
    .await
    .context("find engagement")?;
    Ok(row)
}

pub async fn create(
    db: &PgPool,
    f: &EngagementFields,
    documents: &StagedDocuments,
    now: OffsetDateTime,
) -> anyhow::Result<i32> {
    let mut tx = db.begin().await?;

    let engagement_id: i32 = sqlx::query_scalar(
        r#"
        INSERT INTO engagement (
            engaged_vendor_id, engagement_name, engagement_type, start_date, end_date,
            engagement_status, contact_name, contact_email, contact_phone,
            engaged_department, created_at, updated_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $11)
        RETURNING engagement_id
        "#,
    )
    .bind(f.engaged_vendor_id)
    .bind(&f.engagement_name)
    .bind(&f.engagement_type)
    .bind(f.start_date)
    .bind(f.end_date)
    .bind(&f.engagement_status)
    .bind(&f.contact_name)
    .bind(&f.contact_email)
    .bind(&f.contact_phone)
    .bind(&f.engaged_department)
    .bind(now)
    .fetch_one(&mut *tx)
    .await
    .context("insert engagement")?;

    documents.insert_tx(&mut *tx, engagement_id, now).await?;

    tx.commit().await?;
    Ok(engagement_id)
}

pub async fn update(
    db: &PgPool,
    engagement_id: i32,
    f: &EngagementFields,
    now: OffsetDateTime,
) -> anyhow::Result<bool> {
    let res = sqlx::query(
        r#"
        UPDATE engagement
        SET engaged_vendor_id = $1, engagement_name = $2, engagement_type = $3,
            start_date = $4, end_date = $5, engagement_status = $6, contact_name = $7,
            contact_email = $8, contact_phone = $9, engaged_department = $10, updated_at = $11
        WHERE engagement_id = $12
        "#,
    )
    .bind(f.engaged_vendor_id)
    .bind(&f.engagement_name)
    .bind(&f.engagement_type)
    .bind(f.start_date)
    .bind(f.end_date)
    .bind(&f.engagement_status)
    .bind(&f.contact_name)
    .bind(&f.contact_email)
    .bind(&f.contact_phone)
    .bind(&f.engaged_department)
    .bind(now)
    .bind(engagement_id)
    .execute(db)
    .await
    .context("update engagement")?;
    Ok(res.rows_affected() > 0)
}

pub async fn delete(db: &PgPool, engagement_id: i32) -> anyhow::Result<bool> {
    let res = sqlx::query("DELETE FROM engagement WHERE engagement_id = $1")
        .bind(engagement_id)
        .execute(db)
        .await
        .context("delete engagement")?;
    Ok(res.rows_affected() > 0)
}
