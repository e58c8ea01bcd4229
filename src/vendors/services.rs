use time::OffsetDateTime;
use tracing::{info, warn};

use super::{
    repo,
    repo_types::{NewAddress, VendorFields, VendorUpdate},
};
use crate::{
    auth::{extractors::Identity, roles::Permission},
    documents::{
        attachments::{Attachment, StagedDocuments},
        repo_types::EntityType,
    },
    error::{ApiError, ApiResult},
    state::AppState,
};

pub fn require_manage(identity: &Identity) -> ApiResult<()> {
    identity.require_permission(Permission::ManageVendors)
}

/// Creates the vendor with its main address and documents; stored files are
/// removed again when the transaction fails.
pub async fn create_vendor(
    st: &AppState,
    identity: &Identity,
    fields: VendorFields,
    address: NewAddress,
    attachments: Vec<Attachment>,
    now: OffsetDateTime,
) -> ApiResult<(i32, usize)> {
    require_manage(identity)?;

    let staged =
        StagedDocuments::upload(st.storage.as_ref(), identity, EntityType::Vendor, attachments)
            .await?;
    match repo::create(&st.db, &fields, &address, &staged, now).await {
        Ok(vendor_id) => {
            info!(vendor_id, documents = staged.len(), "vendor created");
            Ok((vendor_id, staged.len()))
        }
        Err(e) => {
            warn!(error = %e, "vendor creation rolled back");
            staged.discard(st.storage.as_ref()).await;
            Err(e.into())
        }
    }
}

/// Replaces the vendor fields and address list and adds any new documents.
pub async fn update_vendor(
    st: &AppState,
    identity: &Identity,
    vendor_id: i32,
    update: VendorUpdate,
    attachments: Vec<Attachment>,
    now: OffsetDateTime,
) -> ApiResult<()> {
    require_manage(identity)?;
    let fields = update.fields.trimmed()?;

    let staged =
        StagedDocuments::upload(st.storage.as_ref(), identity, EntityType::Vendor, attachments)
            .await?;
    match repo::update(&st.db, vendor_id, &fields, &update.addresses, &staged, now).await {
        Ok(true) => {
            info!(
                vendor_id,
                addresses = update.addresses.len(),
                documents = staged.len(),
                "vendor updated"
            );
            Ok(())
        }
        Ok(false) => {
            staged.discard(st.storage.as_ref()).await;
            Err(ApiError::not_found("Vendor not found"))
        }
        Err(e) => {
            warn!(error = %e, vendor_id, "vendor update rolled back");
            staged.discard(st.storage.as_ref()).await;
            Err(e.into())
        }
    }
}

pub async fn delete_vendor(st: &AppState, identity: &Identity, vendor_id: i32) -> ApiResult<()> {
    require_manage(identity)?;
    if !repo::delete(&st.db, vendor_id).await? {
        return Err(ApiError::not_found("Vendor not found"));
    }
    info!(vendor_id, "vendor deleted");
    Ok(())
}
