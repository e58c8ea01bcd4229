use anyhow::Context;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Department {
    pub department_id: i32,
    pub department_name: String,
    pub description: Option<String>,
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Deserialize)]
pub struct NewDepartment {
    pub department_name: String,
    pub description: Option<String>,
}

pub async fn list(db: &PgPool) -> anyhow::Result<Vec<Department>> {
    let rows = sqlx::query_as::<_, Department>(
        r#"
        SELECT department_id, department_name, description, created_at
        FROM departments
        ORDER BY department_name
        "#,
    )
    .fetch_all(db)
    .await
    .context("list departments")?;
    Ok(rows)
}

pub async fn create(
    db: &PgPool,
    name: &str,
    description: Option<&str>,
    now: OffsetDateTime,
) -> anyhow::Result<Department> {
    let row = sqlx::query_as::<_, Department>(
        r#"
        INSERT INTO departments (department_name, description, created_at)
        VALUES ($1, $2, $3)
        RETURNING department_id, department_name, description, created_at
        "#,
    )
    .bind(name)
    .bind(description)
    .bind(now)
    .fetch_one(db)
    .await
    .context("insert department")?;
    Ok(row)
}
