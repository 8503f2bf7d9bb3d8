use crate::context::AppContext;
use crate::db::Store;
use crate::models::InviteCodeRecord;
use crate::revalidate::{DASHBOARD_PATH, INVITE_CODES_PATH};
use crate::utils::random_base36;

use super::ServiceError;

pub const CODE_LENGTH: usize = 8;
pub const MAX_GENERATION_ATTEMPTS: usize = 20;

/// Draw random codes until one is not already stored.
pub async fn generate_unique_code(store: &dyn Store) -> Result<String, ServiceError> {
    generate_unique_code_with(store, || random_base36(CODE_LENGTH)).await
}

/// Same as [`generate_unique_code`] with the candidate source injected.
pub async fn generate_unique_code_with<F>(
    store: &dyn Store,
    mut candidate: F,
) -> Result<String, ServiceError>
where
    F: FnMut() -> String + Send,
{
    for attempt in 1..=MAX_GENERATION_ATTEMPTS {
        let code = candidate();
        if !store.invite_code_exists(&code).await? {
            return Ok(code);
        }
        tracing::debug!("Invite code collision on attempt {}", attempt);
    }

    tracing::error!(
        "Gave up generating an invite code after {} attempts",
        MAX_GENERATION_ATTEMPTS
    );
    Err(ServiceError::Generation(MAX_GENERATION_ATTEMPTS))
}

pub async fn list_invite_codes(ctx: &AppContext) -> Result<Vec<InviteCodeRecord>, ServiceError> {
    Ok(ctx.store.list_invite_codes(None).await?)
}

pub async fn delete_invite_code(ctx: &AppContext, id: &str) -> Result<(), ServiceError> {
    if !ctx.store.delete_invite_code(id).await? {
        tracing::warn!("Invite code {} not found for deletion", id);
        return Err(ServiceError::NotFound("Invite code"));
    }

    tracing::info!("Invite code {} deleted", id);
    ctx.revalidator.revalidate(&[INVITE_CODES_PATH, DASHBOARD_PATH]);
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use chrono::{Duration, Utc};

    use super::*;
    use crate::db::MemoryStore;
    use crate::models::InviteCode;
    use crate::services::test_support::harness;

    fn invite(code: &str) -> InviteCode {
        let now = Utc::now();
        InviteCode {
            id: crate::utils::generate_id(),
            code: code.to_string(),
            is_used: false,
            expires_at: now + Duration::days(30),
            sent_to: None,
            sent_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn issued_codes_are_distinct() {
        let store = MemoryStore::new();
        let mut seen = HashSet::new();
        for _ in 0..200 {
            let code = generate_unique_code(&store).await.unwrap();
            assert_eq!(code.len(), CODE_LENGTH);
            assert!(code.chars().all(|c| c.is_ascii_digit() || c.is_ascii_uppercase()));
            store.seed_invite_code(invite(&code)).await.unwrap();
            seen.insert(code);
        }
        assert_eq!(seen.len(), 200);
    }

    #[tokio::test]
    async fn skips_colliding_candidates() {
        let store = MemoryStore::new();
        store.seed_invite_code(invite("AAAAAAAA")).await.unwrap();

        let mut candidates = vec!["BBBBBBBB", "AAAAAAAA"];
        let code = generate_unique_code_with(&store, || candidates.pop().unwrap().to_string())
            .await
            .unwrap();
        assert_eq!(code, "BBBBBBBB");
    }

    #[tokio::test]
    async fn gives_up_after_bounded_attempts() {
        let store = MemoryStore::new();
        store.seed_invite_code(invite("AAAAAAAA")).await.unwrap();

        let mut calls = 0;
        let err = generate_unique_code_with(&store, || {
            calls += 1;
            "AAAAAAAA".to_string()
        })
        .await
        .unwrap_err();

        assert!(matches!(err, ServiceError::Generation(MAX_GENERATION_ATTEMPTS)));
        assert_eq!(calls, MAX_GENERATION_ATTEMPTS);
    }

    #[tokio::test]
    async fn delete_unknown_code_is_not_found() {
        let h = harness();
        let err = delete_invite_code(&h.ctx, "missing").await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound("Invite code")));
    }

    #[tokio::test]
    async fn delete_removes_code_and_signals() {
        let h = harness();
        let code = invite("ZZZZ0000");
        h.store.seed_invite_code(code.clone()).await.unwrap();
        let mut events = h.ctx.revalidator.subscribe();

        delete_invite_code(&h.ctx, &code.id).await.unwrap();

        assert!(h.store.invite_codes().await.is_empty());
        assert_eq!(events.recv().await.unwrap().path, INVITE_CODES_PATH);
    }
}
