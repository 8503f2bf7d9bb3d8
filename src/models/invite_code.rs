use chrono::{DateTime, Utc};
use serde::Serialize;

use super::VerificationStatus;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InviteCode {
    pub id: String,
    pub code: String,
    pub is_used: bool,
    pub expires_at: DateTime<Utc>,
    pub sent_to: Option<String>,
    pub sent_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Organization that redeemed an invite code.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RedeemerSummary {
    pub id: String,
    pub name: Option<String>,
    pub username: String,
    pub picture_url: Option<String>,
    pub verification_status: VerificationStatus,
    pub verified_at: Option<DateTime<Utc>>,
}

/// Invite code listing entry with its redeemers.
#[derive(Debug, Clone, Serialize)]
pub struct InviteCodeRecord {
    #[serde(flatten)]
    pub invite: InviteCode,
    pub orgs: Vec<RedeemerSummary>,
}

/// The part of a freshly issued code handed back to the approving admin.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IssuedInviteCode {
    pub code: String,
    pub expires_at: DateTime<Utc>,
}

impl From<&InviteCode> for IssuedInviteCode {
    fn from(code: &InviteCode) -> Self {
        Self {
            code: code.code.clone(),
            expires_at: code.expires_at,
        }
    }
}
