use time::OffsetDateTime;
use tracing::{info, warn};

use super::{repo, repo_types::EngagementFields};
use crate::{
    auth::extractors::Identity,
    documents::{
        attachments::{Attachment, StagedDocuments},
        repo_types::EntityType,
    },
    error::{ApiError, ApiResult},
    state::AppState,
};

pub async fn create_engagement(
    st: &AppState,
    identity: &Identity,
    fields: EngagementFields,
    attachments: Vec<Attachment>,
    now: OffsetDateTime,
) -> ApiResult<(i32, usize)> {
    let staged = StagedDocuments::upload(
        st.storage.as_ref(),
        identity,
        EntityType::Engagement,
        attachments,
    )
    .await?;
    match repo::create(&st.db, &fields, &staged, now).await {
        Ok(engagement_id) => {
            info!(engagement_id, documents = staged.len(), "engagement created");
            Ok((engagement_id, staged.len()))
        }
        Err(e) => {
            warn!(error = %e, "engagement creation rolled back");
            staged.discard(st.storage.as_ref()).await;
            Err(e.into())
        }
    }
}

pub async fn update_engagement(
    st: &AppState,
    engagement_id: i32,
    fields: EngagementFields,
    now: OffsetDateTime,
) -> ApiResult<()> {
    let fields = fields.validated()?;
    if !repo::update(&st.db, engagement_id, &fields, now).await? {
        return Err(ApiError::not_found("Engagement not found"));
    }
    info!(engagement_id, "engagement updated");
    Ok(())
}

pub async fn delete_engagement(st: &AppState, engagement_id: i32) -> ApiResult<()> {
    if !repo::delete(&st.db, engagement_id).await? {
        return Err(ApiError::not_found("Engagement not found"));
    }
    info!(engagement_id, "engagement deleted");
    Ok(())
}
