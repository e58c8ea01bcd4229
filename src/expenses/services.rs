use time::OffsetDateTime;
use tracing::{info, warn};

use super::{
    repo,
    repo_types::{ExpenseStatus, NewExpense},
};
use crate::{
    auth::{
        extractors::Identity,
        roles::{Permission, Role},
    },
    documents::{
        attachments::{Attachment, StagedDocuments},
        repo_types::EntityType,
    },
    error::{ApiError, ApiResult},
    state::AppState,
};

pub async fn create_expense(
    st: &AppState,
    identity: &Identity,
    new: NewExpense,
    attachments: Vec<Attachment>,
    now: OffsetDateTime,
) -> ApiResult<(i32, usize)> {
    let staged =
        StagedDocuments::upload(st.storage.as_ref(), identity, EntityType::Expense, attachments)
            .await?;
    match repo::create(&st.db, &new, &staged, now).await {
        Ok(expense_id) => {
            info!(expense_id, amount = %new.expense_amount, "expense submitted");
            Ok((expense_id, staged.len()))
        }
        Err(e) => {
            warn!(error = %e, "expense creation rolled back");
            staged.discard(st.storage.as_ref()).await;
            Err(e.into())
        }
    }
}

pub async fn set_status(
    st: &AppState,
    identity: &Identity,
    expense_id: i32,
    status: ExpenseStatus,
    now: OffsetDateTime,
) -> ApiResult<()> {
    identity.require_permission(Permission::ApproveExpenses)?;
    if !repo::set_status(&st.db, expense_id, status, identity.id, now).await? {
        return Err(ApiError::not_found("Expense not found"));
    }
    info!(expense_id, status = status.as_str(), approver = %identity.id, "expense status changed");
    Ok(())
}

/// Admins and managers only.
pub async fn delete_expense(st: &AppState, identity: &Identity, expense_id: i32) -> ApiResult<()> {
    identity.require_role(&[Role::Admin, Role::Manager])?;
    if !repo::delete(&st.db, expense_id).await? {
        return Err(ApiError::not_found("Expense not found"));
    }
    info!(expense_id, user_id = %identity.id, "expense deleted");
    Ok(())
}
