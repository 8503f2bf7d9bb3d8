// ============================================
// Persistence layer
// ============================================
//
// Services talk to the database through the `Store` trait so the same
// workflow code runs against PostgreSQL in production and against the
// in-process store in tests and database-less local runs.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::{
    InviteCode, InviteCodeRecord, Org, OrgFilter, Protest, ProtestRecord, VerificationStatus,
};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A unique constraint rejected the write. Carries the constraint name.
    #[error("duplicate value for {0}")]
    Duplicate(String),

    /// A foreign key pointed at a row that does not exist.
    #[error("referenced record does not exist: {0}")]
    MissingReference(String),

    #[error("database error: {0}")]
    Database(#[source] sqlx::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            let constraint = db_err.constraint().unwrap_or("unknown").to_string();
            if db_err.is_unique_violation() {
                return StoreError::Duplicate(constraint);
            }
            if db_err.is_foreign_key_violation() {
                return StoreError::MissingReference(constraint);
            }
        }
        StoreError::Database(err)
    }
}

/// Time boundaries used by the dashboard counters.
#[derive(Debug, Clone, Copy)]
pub struct CountWindow {
    pub now: DateTime<Utc>,
    pub this_month_start: DateTime<Utc>,
    pub last_month_start: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DashboardCounts {
    pub total_ngos: i64,
    pub verified_ngos: i64,
    pub pending_requests: i64,
    pub under_review_requests: i64,
    pub approved_requests: i64,
    pub total_protests: i64,
    pub upcoming_protests: i64,
    pub total_invite_codes: i64,
    pub active_invite_codes: i64,
    pub used_invite_codes: i64,
    pub ngos_this_month: i64,
    pub ngos_last_month: i64,
    pub protests_this_month: i64,
    pub protests_last_month: i64,
}

#[async_trait]
pub trait Store: Send + Sync {
    /// Cheap liveness check used by `/health`.
    async fn ping(&self) -> Result<(), StoreError>;

    /// Release connections on shutdown.
    async fn close(&self) {}

    // ---- organizations ----

    async fn list_orgs(&self, filter: &OrgFilter) -> Result<Vec<Org>, StoreError>;

    async fn get_org(&self, id: &str) -> Result<Option<Org>, StoreError>;

    async fn insert_org(&self, org: &Org) -> Result<Org, StoreError>;

    /// Overwrites every mutable column of an existing org. `None` if the id
    /// is unknown.
    async fn update_org(&self, org: &Org) -> Result<Option<Org>, StoreError>;

    async fn set_org_status(
        &self,
        id: &str,
        status: VerificationStatus,
        verified_at: Option<DateTime<Utc>>,
    ) -> Result<Option<Org>, StoreError>;

    /// Atomically moves an org from `under_review` to `approved`, deletes
    /// unused codes addressed to any of `stale_recipients`, and stores
    /// `invite`. Returns `None` and changes nothing when the org is not
    /// (or no longer) `under_review`.
    async fn approve_org(
        &self,
        id: &str,
        invite: &InviteCode,
        stale_recipients: &[String],
    ) -> Result<Option<Org>, StoreError>;

    async fn delete_org(&self, id: &str) -> Result<bool, StoreError>;

    // ---- invite codes ----

    async fn list_invite_codes(&self, limit: Option<i64>)
    -> Result<Vec<InviteCodeRecord>, StoreError>;

    async fn invite_code_exists(&self, code: &str) -> Result<bool, StoreError>;

    async fn delete_invite_code(&self, id: &str) -> Result<bool, StoreError>;

    async fn delete_invite_code_by_code(&self, code: &str) -> Result<bool, StoreError>;

    // ---- protests ----

    async fn list_protests(&self, limit: Option<i64>) -> Result<Vec<ProtestRecord>, StoreError>;

    async fn get_protest(&self, id: &str) -> Result<Option<ProtestRecord>, StoreError>;

    async fn insert_protest(&self, protest: &Protest) -> Result<ProtestRecord, StoreError>;

    async fn update_protest(&self, protest: &Protest)
    -> Result<Option<ProtestRecord>, StoreError>;

    async fn delete_protest(&self, id: &str) -> Result<bool, StoreError>;

    // ---- dashboard ----

    async fn dashboard_counts(&self, window: &CountWindow) -> Result<DashboardCounts, StoreError>;
}
