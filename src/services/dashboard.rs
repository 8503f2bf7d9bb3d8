use chrono::{DateTime, Datelike, Months, Utc};
use serde::Serialize;

use crate::context::AppContext;
use crate::db::{CountWindow, DashboardCounts};
use crate::models::{InviteCodeRecord, OrgFilter, OrgView, ProtestRecord, VerificationStatus};

use super::ServiceError;

const RECENT_LIMIT: i64 = 5;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    #[serde(rename = "totalNGOs")]
    pub total_ngos: i64,
    #[serde(rename = "verifiedNGOs")]
    pub verified_ngos: i64,
    pub pending_requests: i64,
    pub under_review_requests: i64,
    pub approved_requests: i64,
    pub total_protests: i64,
    /// Protests scheduled after now.
    #[serde(rename = "activeProtests")]
    pub upcoming_protests: i64,
    pub total_invite_codes: i64,
    pub active_invite_codes: i64,
    pub used_invite_codes: i64,
    pub ngos_change: i64,
    pub protests_change: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentActivity {
    pub ngos: Vec<OrgView>,
    pub requests: Vec<OrgView>,
    pub protests: Vec<ProtestRecord>,
    pub invite_codes: Vec<InviteCodeRecord>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Dashboard {
    pub stats: DashboardStats,
    pub recent: RecentActivity,
}

/// Calendar-month boundaries (UTC) around `now`.
pub fn count_window(now: DateTime<Utc>) -> Option<CountWindow> {
    let this_month_start = now.date_naive().with_day(1)?.and_hms_opt(0, 0, 0)?.and_utc();
    let last_month_start = this_month_start.checked_sub_months(Months::new(1))?;
    Some(CountWindow {
        now,
        this_month_start,
        last_month_start,
    })
}

/// Month-over-month change in percent, rounded half up. Zero when there is
/// no previous month to compare against.
pub fn percent_change(this_month: i64, last_month: i64) -> i64 {
    if last_month <= 0 {
        return 0;
    }
    let change = (this_month - last_month) as f64 / last_month as f64 * 100.0;
    (change + 0.5).floor() as i64
}

impl DashboardStats {
    fn from_counts(counts: &DashboardCounts) -> Self {
        Self {
            total_ngos: counts.total_ngos,
            verified_ngos: counts.verified_ngos,
            pending_requests: counts.pending_requests,
            under_review_requests: counts.under_review_requests,
            approved_requests: counts.approved_requests,
            total_protests: counts.total_protests,
            upcoming_protests: counts.upcoming_protests,
            total_invite_codes: counts.total_invite_codes,
            active_invite_codes: counts.active_invite_codes,
            used_invite_codes: counts.used_invite_codes,
            ngos_change: percent_change(counts.ngos_this_month, counts.ngos_last_month),
            protests_change: percent_change(counts.protests_this_month, counts.protests_last_month),
        }
    }
}

pub async fn dashboard(ctx: &AppContext, now: DateTime<Utc>) -> Result<Dashboard, ServiceError> {
    let window = count_window(now)
        .ok_or_else(|| ServiceError::Internal(format!("no month window for {}", now)))?;

    let recent_ngos = OrgFilter::default().limit(RECENT_LIMIT);
    let recent_requests = OrgFilter::with_statuses(&[
        VerificationStatus::Pending,
        VerificationStatus::UnderReview,
    ])
    .limit(RECENT_LIMIT);

    let store = ctx.store.as_ref();
    let (counts, ngos, requests, protests, invite_codes) = tokio::try_join!(
        store.dashboard_counts(&window),
        store.list_orgs(&recent_ngos),
        store.list_orgs(&recent_requests),
        store.list_protests(Some(RECENT_LIMIT)),
        store.list_invite_codes(Some(RECENT_LIMIT)),
    )?;

    tracing::debug!("Dashboard stats computed: {:?}", counts);

    Ok(Dashboard {
        stats: DashboardStats::from_counts(&counts),
        recent: RecentActivity {
            ngos: ngos.into_iter().map(OrgView::from).collect(),
            requests: requests.into_iter().map(OrgView::from).collect(),
            protests,
            invite_codes,
        },
    })
}
