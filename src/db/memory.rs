use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::{CountWindow, DashboardCounts, Store, StoreError};
use crate::models::{
    InviteCode, InviteCodeRecord, Org, OrgFilter, OrganizerSummary, Protest, ProtestRecord,
    RedeemerSummary, VerificationStatus,
};

#[derive(Default)]
struct Tables {
    orgs: Vec<Org>,
    invite_codes: Vec<InviteCode>,
    protests: Vec<Protest>,
}

impl Tables {
    fn organizer(&self, id: &str) -> Option<OrganizerSummary> {
        self.orgs.iter().find(|o| o.id == id).map(|o| OrganizerSummary {
            id: o.id.clone(),
            name: o.name.clone(),
            username: o.username.clone(),
            picture_url: o.picture_url.clone(),
        })
    }

    fn protest_record(&self, protest: &Protest) -> ProtestRecord {
        ProtestRecord {
            protest: protest.clone(),
            organizer: self.organizer(&protest.organizer_id),
        }
    }

    fn username_taken(&self, username: &str, except_id: Option<&str>) -> bool {
        self.orgs
            .iter()
            .any(|o| o.username == username && Some(o.id.as_str()) != except_id)
    }
}

fn newest_first<T>(items: &mut [T], created_at: impl Fn(&T) -> DateTime<Utc>) {
    items.sort_by(|a, b| created_at(b).cmp(&created_at(a)));
}

fn apply_limit<T>(mut items: Vec<T>, limit: Option<i64>) -> Vec<T> {
    if let Some(limit) = limit {
        items.truncate(limit.max(0) as usize);
    }
    items
}

/// In-process store with the same constraints as the PostgreSQL schema
/// (unique usernames and codes, organizer foreign key, protest cascade).
///
/// Backs the test-suite and local runs without `DATABASE_URL`.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

// Test fixtures. Redemption belongs to the mobile app.
#[cfg(test)]
impl MemoryStore {
    /// Insert an invite code directly, bypassing the approval workflow.
    pub(crate) async fn seed_invite_code(&self, invite: InviteCode) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        if tables.invite_codes.iter().any(|c| c.code == invite.code) {
            return Err(StoreError::Duplicate("invite_code_code_key".into()));
        }
        tables.invite_codes.push(invite);
        Ok(())
    }

    /// Mark an org as having redeemed `code`, as the mobile app does.
    pub(crate) async fn redeem_invite_code(
        &self,
        org_id: &str,
        code: &str,
    ) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        let Some(invite) = tables.invite_codes.iter_mut().find(|c| c.code == code) else {
            return Err(StoreError::MissingReference("org_invite_code_used_fkey".into()));
        };
        invite.is_used = true;
        invite.updated_at = Utc::now();

        let Some(org) = tables.orgs.iter_mut().find(|o| o.id == org_id) else {
            return Err(StoreError::MissingReference("org_pkey".into()));
        };
        org.invite_code_used = Some(code.to_string());
        org.verification_status = VerificationStatus::Verified;
        org.verified_at = Some(Utc::now());
        Ok(())
    }

    pub(crate) async fn invite_codes(&self) -> Vec<InviteCode> {
        self.tables.read().await.invite_codes.clone()
    }

    pub(crate) async fn org_count(&self) -> usize {
        self.tables.read().await.orgs.len()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn list_orgs(&self, filter: &OrgFilter) -> Result<Vec<Org>, StoreError> {
        let tables = self.tables.read().await;
        let mut orgs: Vec<Org> = tables
            .orgs
            .iter()
            .filter(|o| filter.matches(o))
            .cloned()
            .collect();
        newest_first(&mut orgs, |o| o.created_at);
        Ok(apply_limit(orgs, filter.limit))
    }

    async fn get_org(&self, id: &str) -> Result<Option<Org>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.orgs.iter().find(|o| o.id == id).cloned())
    }

    async fn insert_org(&self, org: &Org) -> Result<Org, StoreError> {
        let mut tables = self.tables.write().await;
        if tables.orgs.iter().any(|o| o.id == org.id) {
            return Err(StoreError::Duplicate("org_pkey".into()));
        }
        if tables.username_taken(&org.username, None) {
            return Err(StoreError::Duplicate("org_username_key".into()));
        }
        tables.orgs.push(org.clone());
        Ok(org.clone())
    }

    async fn update_org(&self, org: &Org) -> Result<Option<Org>, StoreError> {
        let mut tables = self.tables.write().await;
        if tables.username_taken(&org.username, Some(&org.id)) {
            return Err(StoreError::Duplicate("org_username_key".into()));
        }
        let Some(existing) = tables.orgs.iter_mut().find(|o| o.id == org.id) else {
            return Ok(None);
        };
        existing.username = org.username.clone();
        existing.name = org.name.clone();
        existing.country = org.country.clone();
        existing.social_media_platform = org.social_media_platform.clone();
        existing.social_media_handle = org.social_media_handle.clone();
        existing.verification_status = org.verification_status;
        existing.verified_at = org.verified_at;
        existing.picture_url = org.picture_url.clone();
        existing.updated_at = Utc::now();
        Ok(Some(existing.clone()))
    }

    async fn set_org_status(
        &self,
        id: &str,
        status: VerificationStatus,
        verified_at: Option<DateTime<Utc>>,
    ) -> Result<Option<Org>, StoreError> {
        let mut tables = self.tables.write().await;
        let Some(org) = tables.orgs.iter_mut().find(|o| o.id == id) else {
            return Ok(None);
        };
        org.verification_status = status;
        org.verified_at = verified_at;
        org.updated_at = Utc::now();
        Ok(Some(org.clone()))
    }

    async fn approve_org(
        &self,
        id: &str,
        invite: &InviteCode,
        stale_recipients: &[String],
    ) -> Result<Option<Org>, StoreError> {
        // One write guard for the whole approval keeps it atomic.
        let mut tables = self.tables.write().await;

        let Some(index) = tables
            .orgs
            .iter()
            .position(|o| o.id == id && o.verification_status == VerificationStatus::UnderReview)
        else {
            return Ok(None);
        };

        let is_stale = |c: &InviteCode| {
            !c.is_used
                && c.sent_to
                    .as_ref()
                    .is_some_and(|to| stale_recipients.contains(to))
        };

        // Reject before touching anything so a failed approval leaves no trace.
        if tables
            .invite_codes
            .iter()
            .any(|c| c.code == invite.code && !is_stale(c))
        {
            return Err(StoreError::Duplicate("invite_code_code_key".into()));
        }

        tables.invite_codes.retain(|c| !is_stale(c));
        tables.invite_codes.push(invite.clone());

        let org = &mut tables.orgs[index];
        org.verification_status = VerificationStatus::Approved;
        org.verified_at = None;
        org.updated_at = Utc::now();
        Ok(Some(org.clone()))
    }

    async fn delete_org(&self, id: &str) -> Result<bool, StoreError> {
        let mut tables = self.tables.write().await;
        let before = tables.orgs.len();
        tables.orgs.retain(|o| o.id != id);
        let deleted = tables.orgs.len() < before;
        if deleted {
            tables.protests.retain(|p| p.organizer_id != id);
        }
        Ok(deleted)
    }

    async fn list_invite_codes(
        &self,
        limit: Option<i64>,
    ) -> Result<Vec<InviteCodeRecord>, StoreError> {
        let tables = self.tables.read().await;
        let mut invites = tables.invite_codes.clone();
        newest_first(&mut invites, |c| c.created_at);

        let records = apply_limit(invites, limit)
            .into_iter()
            .map(|invite| {
                let orgs = tables
                    .orgs
                    .iter()
                    .filter(|o| o.invite_code_used.as_deref() == Some(invite.code.as_str()))
                    .map(|o| RedeemerSummary {
                        id: o.id.clone(),
                        name: o.name.clone(),
                        username: o.username.clone(),
                        picture_url: o.picture_url.clone(),
                        verification_status: o.verification_status,
                        verified_at: o.verified_at,
                    })
                    .collect();
                InviteCodeRecord { invite, orgs }
            })
            .collect();

        Ok(records)
    }

    async fn invite_code_exists(&self, code: &str) -> Result<bool, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.invite_codes.iter().any(|c| c.code == code))
    }

    async fn delete_invite_code(&self, id: &str) -> Result<bool, StoreError> {
        let mut tables = self.tables.write().await;
        let Some(index) = tables.invite_codes.iter().position(|c| c.id == id) else {
            return Ok(false);
        };
        let removed = tables.invite_codes.remove(index);
        for org in tables
            .orgs
            .iter_mut()
            .filter(|o| o.invite_code_used.as_deref() == Some(removed.code.as_str()))
        {
            org.invite_code_used = None;
        }
        Ok(true)
    }

    async fn delete_invite_code_by_code(&self, code: &str) -> Result<bool, StoreError> {
        let id = {
            let tables = self.tables.read().await;
            tables
                .invite_codes
                .iter()
                .find(|c| c.code == code)
                .map(|c| c.id.clone())
        };
        match id {
            Some(id) => self.delete_invite_code(&id).await,
            None => Ok(false),
        }
    }

    async fn list_protests(&self, limit: Option<i64>) -> Result<Vec<ProtestRecord>, StoreError> {
        let tables = self.tables.read().await;
        let mut protests = tables.protests.clone();
        newest_first(&mut protests, |p| p.created_at);
        Ok(apply_limit(protests, limit)
            .iter()
            .map(|p| tables.protest_record(p))
            .collect())
    }

    async fn get_protest(&self, id: &str) -> Result<Option<ProtestRecord>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .protests
            .iter()
            .find(|p| p.id == id)
            .map(|p| tables.protest_record(p)))
    }

    async fn insert_protest(&self, protest: &Protest) -> Result<ProtestRecord, StoreError> {
        let mut tables = self.tables.write().await;
        if !tables.orgs.iter().any(|o| o.id == protest.organizer_id) {
            return Err(StoreError::MissingReference(
                "protest_organizer_id_fkey".into(),
            ));
        }
        tables.protests.push(protest.clone());
        Ok(tables.protest_record(protest))
    }

    async fn update_protest(
        &self,
        protest: &Protest,
    ) -> Result<Option<ProtestRecord>, StoreError> {
        let mut tables = self.tables.write().await;
        let Some(existing) = tables.protests.iter_mut().find(|p| p.id == protest.id) else {
            return Ok(None);
        };
        existing.title = protest.title.clone();
        existing.description = protest.description.clone();
        existing.location = protest.location.clone();
        existing.city = protest.city.clone();
        existing.country = protest.country.clone();
        existing.date_time = protest.date_time;
        existing.picture_url = protest.picture_url.clone();
        existing.updated_at = Utc::now();
        let updated = existing.clone();
        Ok(Some(tables.protest_record(&updated)))
    }

    async fn delete_protest(&self, id: &str) -> Result<bool, StoreError> {
        let mut tables = self.tables.write().await;
        let before = tables.protests.len();
        tables.protests.retain(|p| p.id != id);
        Ok(tables.protests.len() < before)
    }

    async fn dashboard_counts(&self, window: &CountWindow) -> Result<DashboardCounts, StoreError> {
        let tables = self.tables.read().await;

        let count_orgs =
            |f: &dyn Fn(&Org) -> bool| tables.orgs.iter().filter(|o| f(o)).count() as i64;
        let count_protests =
            |f: &dyn Fn(&Protest) -> bool| tables.protests.iter().filter(|p| f(p)).count() as i64;
        let count_codes = |f: &dyn Fn(&InviteCode) -> bool| {
            tables.invite_codes.iter().filter(|c| f(c)).count() as i64
        };

        let this_month = |at: DateTime<Utc>| at >= window.this_month_start;
        let last_month =
            |at: DateTime<Utc>| at >= window.last_month_start && at < window.this_month_start;

        Ok(DashboardCounts {
            total_ngos: tables.orgs.len() as i64,
            verified_ngos: count_orgs(&|o| {
                o.verification_status == VerificationStatus::Verified
            }),
            pending_requests: count_orgs(&|o| {
                o.verification_status == VerificationStatus::Pending
            }),
            under_review_requests: count_orgs(&|o| {
                o.verification_status == VerificationStatus::UnderReview
            }),
            approved_requests: count_orgs(&|o| {
                o.verification_status == VerificationStatus::Approved
            }),
            ngos_this_month: count_orgs(&|o| this_month(o.created_at)),
            ngos_last_month: count_orgs(&|o| last_month(o.created_at)),
            total_protests: tables.protests.len() as i64,
            upcoming_protests: count_protests(&|p| p.date_time > window.now),
            protests_this_month: count_protests(&|p| this_month(p.created_at)),
            protests_last_month: count_protests(&|p| last_month(p.created_at)),
            total_invite_codes: tables.invite_codes.len() as i64,
            active_invite_codes: count_codes(&|c| !c.is_used && c.expires_at > window.now),
            used_invite_codes: count_codes(&|c| c.is_used),
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::services::test_support::seed_org;
    use crate::utils::generate_id;

    fn unused_code(code: &str, sent_to: &str) -> InviteCode {
        let now = Utc::now();
        InviteCode {
            id: generate_id(),
            code: code.to_string(),
            is_used: false,
            expires_at: now + Duration::days(1),
            sent_to: Some(sent_to.to_string()),
            sent_at: Some(now),
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn rejected_approval_keeps_stale_codes() {
        let store = MemoryStore::new();
        let org = seed_org(&store, "ngo1", VerificationStatus::UnderReview).await;
        store
            .seed_invite_code(unused_code("STALE001", "ngo1"))
            .await
            .unwrap();
        store
            .seed_invite_code(unused_code("TAKEN001", "someone else"))
            .await
            .unwrap();

        let result = store
            .approve_org(&org.id, &unused_code("TAKEN001", "ngo1"), &org.recipient_keys())
            .await;

        assert!(matches!(result, Err(StoreError::Duplicate(_))));
        let mut codes: Vec<String> = store
            .invite_codes()
            .await
            .into_iter()
            .map(|c| c.code)
            .collect();
        codes.sort();
        assert_eq!(codes, vec!["STALE001", "TAKEN001"]);
        let org = store.get_org(&org.id).await.unwrap().unwrap();
        assert_eq!(org.verification_status, VerificationStatus::UnderReview);
    }

    #[tokio::test]
    async fn approval_only_applies_to_under_review() {
        let store = MemoryStore::new();
        let org = seed_org(&store, "ngo2", VerificationStatus::Pending).await;
        store
            .seed_invite_code(unused_code("STALE002", "ngo2"))
            .await
            .unwrap();

        let approved = store
            .approve_org(&org.id, &unused_code("NEWCODE1", "ngo2"), &org.recipient_keys())
            .await
            .unwrap();

        assert!(approved.is_none());
        let codes: Vec<String> = store
            .invite_codes()
            .await
            .into_iter()
            .map(|c| c.code)
            .collect();
        assert_eq!(codes, vec!["STALE002"]);
    }
}
