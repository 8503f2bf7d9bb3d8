use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Position of an organization in the admin review pipeline.
///
/// `Verified` is the terminal redemption state, set once the organization
/// redeems its invite code in the mobile app.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    Pending,
    UnderReview,
    Approved,
    Rejected,
    Verified,
}

impl VerificationStatus {
    /// Statuses shown on the requests board (everything not yet verified).
    pub const OPEN_REQUESTS: [VerificationStatus; 4] = [
        VerificationStatus::Pending,
        VerificationStatus::UnderReview,
        VerificationStatus::Approved,
        VerificationStatus::Rejected,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            VerificationStatus::Pending => "pending",
            VerificationStatus::UnderReview => "under_review",
            VerificationStatus::Approved => "approved",
            VerificationStatus::Rejected => "rejected",
            VerificationStatus::Verified => "verified",
        }
    }
}

impl fmt::Display for VerificationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown verification status '{0}'")]
pub struct UnknownStatus(pub String);

impl FromStr for VerificationStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(VerificationStatus::Pending),
            "under_review" => Ok(VerificationStatus::UnderReview),
            "approved" => Ok(VerificationStatus::Approved),
            "rejected" => Ok(VerificationStatus::Rejected),
            "verified" => Ok(VerificationStatus::Verified),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

/// Organization row as stored, including the password hash.
#[derive(Debug, Clone, PartialEq)]
pub struct Org {
    pub id: String,
    pub username: String,
    pub name: Option<String>,
    pub country: Option<String>,
    pub social_media_platform: Option<String>,
    pub social_media_handle: Option<String>,
    pub password_hash: String,
    pub verification_status: VerificationStatus,
    pub verified_at: Option<DateTime<Utc>>,
    pub picture_url: Option<String>,
    pub invite_code_used: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Org {
    /// Identifiers an invite code may have been addressed to.
    pub fn recipient_keys(&self) -> Vec<String> {
        let mut keys = Vec::with_capacity(3);
        if let Some(name) = self.name.as_deref().filter(|n| !n.is_empty()) {
            keys.push(name.to_string());
        }
        keys.push(self.username.clone());
        keys.push(self.id.clone());
        keys
    }

    /// Recipient label written into `sent_to` when a code is issued.
    pub fn recipient_label(&self) -> String {
        self.name
            .as_deref()
            .filter(|n| !n.is_empty())
            .unwrap_or(&self.username)
            .to_string()
    }
}

/// Organization as returned to clients. The password hash never leaves the
/// service layer.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrgView {
    pub id: String,
    pub username: String,
    pub name: Option<String>,
    pub country: Option<String>,
    pub social_media_platform: Option<String>,
    pub social_media_handle: Option<String>,
    pub verification_status: VerificationStatus,
    pub verified_at: Option<DateTime<Utc>>,
    pub picture_url: Option<String>,
    pub invite_code_used: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Org> for OrgView {
    fn from(org: Org) -> Self {
        Self {
            id: org.id,
            username: org.username,
            name: org.name,
            country: org.country,
            social_media_platform: org.social_media_platform,
            social_media_handle: org.social_media_handle,
            verification_status: org.verification_status,
            verified_at: org.verified_at,
            picture_url: org.picture_url,
            invite_code_used: org.invite_code_used,
            created_at: org.created_at,
            updated_at: org.updated_at,
        }
    }
}

/// Listing filter for organizations. Results are always newest first.
#[derive(Debug, Clone, Default)]
pub struct OrgFilter {
    /// Empty means any status.
    pub statuses: Vec<VerificationStatus>,
    pub limit: Option<i64>,
}

impl OrgFilter {
    pub fn with_statuses(statuses: &[VerificationStatus]) -> Self {
        Self {
            statuses: statuses.to_vec(),
            limit: None,
        }
    }

    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn matches(&self, org: &Org) -> bool {
        self.statuses.is_empty() || self.statuses.contains(&org.verification_status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_parses_wire_names() {
        for status in [
            VerificationStatus::Pending,
            VerificationStatus::UnderReview,
            VerificationStatus::Approved,
            VerificationStatus::Rejected,
            VerificationStatus::Verified,
        ] {
            assert_eq!(status.as_str().parse::<VerificationStatus>(), Ok(status));
        }
        assert!("underReview".parse::<VerificationStatus>().is_err());
    }

    #[test]
    fn recipient_keys_skip_missing_name() {
        let now = Utc::now();
        let org = Org {
            id: "abc".into(),
            username: "ngo1".into(),
            name: None,
            country: None,
            social_media_platform: None,
            social_media_handle: None,
            password_hash: "x".into(),
            verification_status: VerificationStatus::UnderReview,
            verified_at: None,
            picture_url: None,
            invite_code_used: None,
            created_at: now,
            updated_at: now,
        };
        assert_eq!(org.recipient_keys(), vec!["ngo1".to_string(), "abc".to_string()]);
        assert_eq!(org.recipient_label(), "ngo1");
    }
}
