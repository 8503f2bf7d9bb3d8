use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Protest {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub location: String,
    pub city: Option<String>,
    pub country: Option<String>,
    pub date_time: DateTime<Utc>,
    pub organizer_id: String,
    pub picture_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrganizerSummary {
    pub id: String,
    pub name: Option<String>,
    pub username: String,
    pub picture_url: Option<String>,
}

/// Protest listing entry with its organizer embedded.
#[derive(Debug, Clone, Serialize)]
pub struct ProtestRecord {
    #[serde(flatten)]
    pub protest: Protest,
    pub organizer: Option<OrganizerSummary>,
}
