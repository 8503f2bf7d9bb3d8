use chrono::Utc;
use validator::Validate;

use crate::context::AppContext;
use crate::db::StoreError;
use crate::models::{Org, OrgFilter, OrgView, VerificationStatus};
use crate::revalidate::{
    DASHBOARD_PATH, INVITE_CODES_PATH, NGOS_PATH, PROTESTS_PATH, REQUESTS_PATH,
};
use crate::storage::{Upload, org_picture_key};
use crate::utils::{generate_id, hash_password};

use super::{ServiceError, non_empty, parse_status, upload_picture};

/// Status given to NGOs created from the dashboard when the form leaves it
/// unset. Admin-created orgs skip the request workflow.
pub const DEFAULT_CREATE_STATUS: VerificationStatus = VerificationStatus::Verified;

#[derive(Debug, Clone, Default, Validate)]
pub struct CreateNgoInput {
    #[validate(required)]
    pub username: Option<String>,
    #[validate(required)]
    pub name: Option<String>,
    #[validate(required)]
    pub country: Option<String>,
    #[validate(required)]
    pub social_media_platform: Option<String>,
    #[validate(required)]
    pub social_media_handle: Option<String>,
    #[validate(required)]
    pub password: Option<String>,
    pub verification_status: Option<String>,
}

impl CreateNgoInput {
    fn normalized(self) -> Self {
        Self {
            username: non_empty(self.username),
            name: non_empty(self.name),
            country: non_empty(self.country),
            social_media_platform: non_empty(self.social_media_platform),
            social_media_handle: non_empty(self.social_media_handle),
            // Passwords are taken verbatim.
            password: self.password.filter(|p| !p.is_empty()),
            verification_status: self.verification_status,
        }
    }
}

#[derive(Debug, Clone, Default, Validate)]
pub struct UpdateNgoInput {
    #[validate(required)]
    pub username: Option<String>,
    #[validate(required)]
    pub name: Option<String>,
    #[validate(required)]
    pub country: Option<String>,
    #[validate(required)]
    pub social_media_platform: Option<String>,
    #[validate(required)]
    pub social_media_handle: Option<String>,
    pub verification_status: Option<String>,
}

impl UpdateNgoInput {
    fn normalized(self) -> Self {
        Self {
            username: non_empty(self.username),
            name: non_empty(self.name),
            country: non_empty(self.country),
            social_media_platform: non_empty(self.social_media_platform),
            social_media_handle: non_empty(self.social_media_handle),
            verification_status: self.verification_status,
        }
    }
}

fn username_conflict(err: StoreError) -> ServiceError {
    match err {
        StoreError::Duplicate(constraint) if constraint.contains("username") => {
            ServiceError::validation("Username already exists", &["username"])
        }
        other => ServiceError::Persistence(other),
    }
}

/// Verified NGOs, newest first.
pub async fn list_ngos(ctx: &AppContext) -> Result<Vec<OrgView>, ServiceError> {
    let orgs = ctx
        .store
        .list_orgs(&OrgFilter::with_statuses(&[VerificationStatus::Verified]))
        .await?;
    Ok(orgs.into_iter().map(OrgView::from).collect())
}

pub async fn get_ngo(ctx: &AppContext, id: &str) -> Result<OrgView, ServiceError> {
    ctx.store
        .get_org(id)
        .await?
        .map(OrgView::from)
        .ok_or(ServiceError::NotFound("NGO"))
}

pub async fn create_ngo(
    ctx: &AppContext,
    input: CreateNgoInput,
    picture: Option<Upload>,
) -> Result<OrgView, ServiceError> {
    let input = input.normalized();
    input.validate()?;
    let status = parse_status(input.verification_status)?.unwrap_or(DEFAULT_CREATE_STATUS);

    // validate() guarantees these are present.
    let (
        Some(username),
        Some(name),
        Some(country),
        Some(platform),
        Some(handle),
        Some(password),
    ) = (
        input.username,
        input.name,
        input.country,
        input.social_media_platform,
        input.social_media_handle,
        input.password,
    )
    else {
        return Err(ServiceError::validation("Missing required fields", &[]));
    };

    let password_hash = tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| ServiceError::Internal(format!("password hashing task failed: {}", e)))?
        .map_err(|e| ServiceError::Internal(format!("password hashing failed: {}", e)))?;

    let id = generate_id();
    let now = Utc::now();

    let picture_url = match &picture {
        Some(upload) => {
            let key = org_picture_key(&id, upload, now.timestamp_millis());
            Some(upload_picture(ctx, &key, upload).await?)
        }
        None => None,
    };

    let org = Org {
        id,
        username,
        name: Some(name),
        country: Some(country),
        social_media_platform: Some(platform),
        social_media_handle: Some(handle),
        password_hash,
        verification_status: status,
        verified_at: (status == VerificationStatus::Verified).then_some(now),
        picture_url,
        invite_code_used: None,
        created_at: now,
        updated_at: now,
    };

    let created = ctx.store.insert_org(&org).await.map_err(username_conflict)?;

    tracing::info!("NGO {} created with status {}", created.id, status);
    ctx.revalidator.revalidate(&[NGOS_PATH, REQUESTS_PATH, DASHBOARD_PATH]);

    Ok(created.into())
}

pub async fn update_ngo(
    ctx: &AppContext,
    id: &str,
    input: UpdateNgoInput,
    picture: Option<Upload>,
) -> Result<OrgView, ServiceError> {
    let input = input.normalized();
    input.validate()?;
    let requested_status = parse_status(input.verification_status)?;

    let mut org = ctx
        .store
        .get_org(id)
        .await?
        .ok_or(ServiceError::NotFound("NGO"))?;

    let (Some(username), Some(name), Some(country), Some(platform), Some(handle)) = (
        input.username,
        input.name,
        input.country,
        input.social_media_platform,
        input.social_media_handle,
    ) else {
        return Err(ServiceError::validation("Missing required fields", &[]));
    };

    let now = Utc::now();
    let status = requested_status.unwrap_or(org.verification_status);
    org.verified_at = match (org.verification_status, status) {
        (VerificationStatus::Verified, VerificationStatus::Verified) => {
            org.verified_at.or(Some(now))
        }
        (_, VerificationStatus::Verified) => Some(now),
        _ => None,
    };
    org.verification_status = status;
    org.username = username;
    org.name = Some(name);
    org.country = Some(country);
    org.social_media_platform = Some(platform);
    org.social_media_handle = Some(handle);

    if let Some(upload) = &picture {
        let key = org_picture_key(&org.id, upload, now.timestamp_millis());
        org.picture_url = Some(upload_picture(ctx, &key, upload).await?);
    }

    let updated = ctx
        .store
        .update_org(&org)
        .await
        .map_err(username_conflict)?
        .ok_or(ServiceError::NotFound("NGO"))?;

    tracing::info!("NGO {} updated", id);
    ctx.revalidator.revalidate(&[NGOS_PATH, REQUESTS_PATH, DASHBOARD_PATH]);

    Ok(updated.into())
}

pub async fn delete_ngo(ctx: &AppContext, id: &str) -> Result<(), ServiceError> {
    let org = ctx
        .store
        .get_org(id)
        .await?
        .ok_or(ServiceError::NotFound("NGO"))?;

    // The redeemed code goes with the org. A failure here must not block
    // deleting the org itself.
    if let Some(code) = org.invite_code_used.as_deref() {
        match ctx.store.delete_invite_code_by_code(code).await {
            Ok(true) => tracing::info!("Invite code {} removed with NGO {}", code, id),
            Ok(false) => tracing::debug!("Invite code {} of NGO {} already gone", code, id),
            Err(e) => tracing::warn!("Failed to delete invite code {} of NGO {}: {}", code, id, e),
        }
    }

    if !ctx.store.delete_org(id).await? {
        return Err(ServiceError::NotFound("NGO"));
    }

    tracing::info!("NGO {} deleted", id);
    ctx.revalidator.revalidate(&[
        NGOS_PATH,
        REQUESTS_PATH,
        INVITE_CODES_PATH,
        PROTESTS_PATH,
        DASHBOARD_PATH,
    ]);
    Ok(())
}
