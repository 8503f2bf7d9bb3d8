// ============================================
// Verification request workflow
// ============================================
//
//   pending ──► under_review ──► approved ──(mobile redemption)──► verified
//                    │
//                    └─────────► rejected
//
// Approving issues an invite code. Every other target status is a plain
// overwrite, including reverting an org to an earlier state.

use chrono::{Duration, Utc};
use serde::Serialize;

use crate::context::AppContext;
use crate::models::{InviteCode, IssuedInviteCode, OrgFilter, OrgView, VerificationStatus};
use crate::revalidate::{DASHBOARD_PATH, INVITE_CODES_PATH, NGOS_PATH, REQUESTS_PATH};
use crate::utils::generate_id;

use super::{ServiceError, invite_codes};

pub const INVITE_CODE_VALIDITY_DAYS: i64 = 30;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdate {
    pub org: OrgView,
    pub invite_code: Option<IssuedInviteCode>,
}

/// Orgs that have not completed verification, newest first.
pub async fn list_requests(ctx: &AppContext) -> Result<Vec<OrgView>, ServiceError> {
    let orgs = ctx
        .store
        .list_orgs(&OrgFilter::with_statuses(&VerificationStatus::OPEN_REQUESTS))
        .await?;
    Ok(orgs.into_iter().map(OrgView::from).collect())
}

pub async fn update_request_status(
    ctx: &AppContext,
    id: &str,
    status: VerificationStatus,
) -> Result<StatusUpdate, ServiceError> {
    match status {
        VerificationStatus::Approved => approve(ctx, id).await,
        other => set_status(ctx, id, other).await,
    }
}

async fn approve(ctx: &AppContext, id: &str) -> Result<StatusUpdate, ServiceError> {
    let org = ctx
        .store
        .get_org(id)
        .await?
        .ok_or(ServiceError::NotFound("Organization"))?;

    if org.verification_status != VerificationStatus::UnderReview {
        tracing::warn!(
            "Refusing to approve org {} in status {}",
            id,
            org.verification_status
        );
        return Err(not_under_review());
    }

    let code = invite_codes::generate_unique_code(ctx.store.as_ref()).await?;
    let now = Utc::now();
    let invite = InviteCode {
        id: generate_id(),
        code,
        is_used: false,
        expires_at: now + Duration::days(INVITE_CODE_VALIDITY_DAYS),
        sent_to: Some(org.recipient_label()),
        sent_at: Some(now),
        created_at: now,
        updated_at: now,
    };

    // The store re-checks the status inside its transaction, so a concurrent
    // approval that won the race leaves us with `None` and no new code.
    let Some(approved) = ctx
        .store
        .approve_org(id, &invite, &org.recipient_keys())
        .await?
    else {
        tracing::warn!("Org {} left under_review before approval committed", id);
        return Err(not_under_review());
    };

    tracing::info!(
        "Org {} approved, invite code issued to {:?} (expires {})",
        id,
        invite.sent_to,
        invite.expires_at
    );
    ctx.revalidator.revalidate(&[REQUESTS_PATH, INVITE_CODES_PATH, DASHBOARD_PATH]);

    Ok(StatusUpdate {
        org: approved.into(),
        invite_code: Some(IssuedInviteCode::from(&invite)),
    })
}

async fn set_status(
    ctx: &AppContext,
    id: &str,
    status: VerificationStatus,
) -> Result<StatusUpdate, ServiceError> {
    let verified_at = (status == VerificationStatus::Verified).then(Utc::now);

    let org = ctx
        .store
        .set_org_status(id, status, verified_at)
        .await?
        .ok_or(ServiceError::NotFound("Organization"))?;

    tracing::info!("Org {} moved to {}", id, status);
    ctx.revalidator.revalidate(&[REQUESTS_PATH, NGOS_PATH, DASHBOARD_PATH]);

    Ok(StatusUpdate {
        org: org.into(),
        invite_code: None,
    })
}

fn not_under_review() -> ServiceError {
    ServiceError::PreconditionFailed("Organization must be under review to approve".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Store;
    use crate::services::test_support::{harness, seed_org};

    #[tokio::test]
    async fn approving_under_review_issues_one_code() {
        let h = harness();
        let org = seed_org(&h.store, "ngo1", VerificationStatus::UnderReview).await;

        let before = Utc::now();
        let update = update_request_status(&h.ctx, &org.id, VerificationStatus::Approved)
            .await
            .unwrap();

        assert_eq!(update.org.verification_status, VerificationStatus::Approved);
        assert!(update.org.verified_at.is_none());

        let issued = update.invite_code.unwrap();
        let expected = before + Duration::days(INVITE_CODE_VALIDITY_DAYS);
        assert!((issued.expires_at - expected).num_seconds().abs() <= 1);

        let codes = h.store.invite_codes().await;
        assert_eq!(codes.len(), 1);
        assert_eq!(codes[0].code, issued.code);
        assert!(!codes[0].is_used);
        assert_eq!(codes[0].sent_to.as_deref(), Some("ngo1 name"));
    }

    #[tokio::test]
    async fn approving_outside_review_fails_without_code() {
        let h = harness();
        for status in [
            VerificationStatus::Pending,
            VerificationStatus::Approved,
            VerificationStatus::Rejected,
        ] {
            let org = seed_org(&h.store, &format!("org-{}", status), status).await;
            let err = update_request_status(&h.ctx, &org.id, VerificationStatus::Approved)
                .await
                .unwrap_err();
            assert!(matches!(err, ServiceError::PreconditionFailed(_)));

            let stored = h.store.get_org(&org.id).await.unwrap().unwrap();
            assert_eq!(stored.verification_status, status);
        }
        assert!(h.store.invite_codes().await.is_empty());
    }

    #[tokio::test]
    async fn approval_replaces_stale_unused_codes_only() {
        let h = harness();
        let org = seed_org(&h.store, "ngo2", VerificationStatus::UnderReview).await;

        let now = Utc::now();
        let stale = |code: &str, sent_to: &str, is_used: bool| InviteCode {
            id: generate_id(),
            code: code.to_string(),
            is_used,
            expires_at: now + Duration::days(1),
            sent_to: Some(sent_to.to_string()),
            sent_at: Some(now),
            created_at: now,
            updated_at: now,
        };
        h.store
            .seed_invite_code(stale("OLDNAME1", "ngo2 name", false))
            .await
            .unwrap();
        h.store
            .seed_invite_code(stale("OLDUSER1", "ngo2", false))
            .await
            .unwrap();
        h.store
            .seed_invite_code(stale("USEDCODE", "ngo2", true))
            .await
            .unwrap();
        h.store
            .seed_invite_code(stale("OTHERORG", "someone else", false))
            .await
            .unwrap();

        let update = update_request_status(&h.ctx, &org.id, VerificationStatus::Approved)
            .await
            .unwrap();
        let issued = update.invite_code.unwrap().code;

        let mut remaining: Vec<String> = h
            .store
            .invite_codes()
            .await
            .into_iter()
            .map(|c| c.code)
            .collect();
        remaining.sort();
        let mut expected = vec!["OTHERORG".to_string(), "USEDCODE".to_string(), issued];
        expected.sort();
        assert_eq!(remaining, expected);
    }

    #[tokio::test]
    async fn second_approval_is_rejected() {
        let h = harness();
        let org = seed_org(&h.store, "ngo3", VerificationStatus::UnderReview).await;

        update_request_status(&h.ctx, &org.id, VerificationStatus::Approved)
            .await
            .unwrap();
        let err = update_request_status(&h.ctx, &org.id, VerificationStatus::Approved)
            .await
            .unwrap_err();

        assert!(matches!(err, ServiceError::PreconditionFailed(_)));
        assert_eq!(h.store.invite_codes().await.len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_approvals_issue_a_single_code() {
        let h = harness();
        let org = seed_org(&h.store, "ngo4", VerificationStatus::UnderReview).await;

        let attempts: Vec<_> = (0..8)
            .map(|_| {
                let ctx = h.ctx.clone();
                let id = org.id.clone();
                tokio::spawn(async move {
                    update_request_status(&ctx, &id, VerificationStatus::Approved).await
                })
            })
            .collect();

        let mut approved = 0;
        for attempt in attempts {
            match attempt.await.unwrap() {
                Ok(update) => {
                    assert!(update.invite_code.is_some());
                    approved += 1;
                }
                Err(err) => assert!(matches!(err, ServiceError::PreconditionFailed(_))),
            }
        }

        assert_eq!(approved, 1);
        assert_eq!(h.store.invite_codes().await.len(), 1);
        let org = h.store.get_org(&org.id).await.unwrap().unwrap();
        assert_eq!(org.verification_status, VerificationStatus::Approved);
    }

    #[tokio::test]
    async fn plain_transitions_manage_verified_at() {
        let h = harness();
        let org = seed_org(&h.store, "ngo4", VerificationStatus::Pending).await;

        let update = update_request_status(&h.ctx, &org.id, VerificationStatus::UnderReview)
            .await
            .unwrap();
        assert_eq!(update.org.verification_status, VerificationStatus::UnderReview);
        assert!(update.org.verified_at.is_none());
        assert!(update.invite_code.is_none());

        let update = update_request_status(&h.ctx, &org.id, VerificationStatus::Verified)
            .await
            .unwrap();
        assert!(update.org.verified_at.is_some());

        let update = update_request_status(&h.ctx, &org.id, VerificationStatus::Rejected)
            .await
            .unwrap();
        assert!(update.org.verified_at.is_none());
    }

    #[tokio::test]
    async fn unknown_org_is_not_found() {
        let h = harness();
        for status in [VerificationStatus::Approved, VerificationStatus::Rejected] {
            let err = update_request_status(&h.ctx, "missing", status)
                .await
                .unwrap_err();
            assert!(matches!(err, ServiceError::NotFound(_)));
        }
    }

    #[tokio::test]
    async fn requests_exclude_verified_orgs() {
        let h = harness();
        seed_org(&h.store, "a", VerificationStatus::Pending).await;
        seed_org(&h.store, "b", VerificationStatus::Verified).await;
        seed_org(&h.store, "c", VerificationStatus::Rejected).await;

        let requests = list_requests(&h.ctx).await.unwrap();
        let mut names: Vec<_> = requests.into_iter().map(|o| o.username).collect();
        names.sort();
        assert_eq!(names, vec!["a", "c"]);
    }
}
