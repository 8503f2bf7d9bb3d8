// ============================================
// Service layer
// ============================================
//
// Each operation validates its input, talks to the store and bucket through
// `AppContext`, announces stale listings, and returns a sanitized result.
// Errors never escape as panics; handlers turn `ServiceError` into the
// response envelope.

use crate::context::AppContext;
use crate::db::StoreError;
use crate::models::VerificationStatus;
use crate::storage::{StorageError, Upload};

pub mod dashboard;
pub mod invite_codes;
pub mod ngos;
pub mod protests;
pub mod requests;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// Missing or malformed input. `fields` uses the wire (camelCase) names.
    #[error("{message}")]
    Validation { message: String, fields: Vec<String> },

    #[error("{0} not found")]
    NotFound(&'static str),

    /// A workflow guard rejected the transition.
    #[error("{0}")]
    PreconditionFailed(String),

    #[error("picture upload failed: {0}")]
    Upload(#[from] StorageError),

    #[error("no unique invite code after {0} attempts")]
    Generation(usize),

    #[error("persistence failure: {0}")]
    Persistence(#[from] StoreError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    pub fn validation(message: impl Into<String>, fields: &[&str]) -> Self {
        ServiceError::Validation {
            message: message.into(),
            fields: fields.iter().map(|f| f.to_string()).collect(),
        }
    }
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut fields: Vec<String> = errors
            .field_errors()
            .keys()
            .map(|field| camel_case(field))
            .collect();
        fields.sort();

        ServiceError::Validation {
            message: "Missing required fields".to_string(),
            fields,
        }
    }
}

fn camel_case(field: &str) -> String {
    let mut out = String::with_capacity(field.len());
    let mut upper = false;
    for c in field.chars() {
        if c == '_' {
            upper = true;
        } else if upper {
            out.extend(c.to_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out
}

/// Trimmed form value, `None` when blank.
pub(crate) fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub(crate) fn parse_status(
    value: Option<String>,
) -> Result<Option<VerificationStatus>, ServiceError> {
    non_empty(value)
        .map(|raw| raw.parse::<VerificationStatus>())
        .transpose()
        .map_err(|e| ServiceError::validation(e.to_string(), &["verificationStatus"]))
}

pub(crate) async fn upload_picture(
    ctx: &AppContext,
    key: &str,
    upload: &Upload,
) -> Result<String, ServiceError> {
    match ctx.storage.upload(key, upload).await {
        Ok(url) => {
            tracing::info!("Picture uploaded to {} as {}", ctx.storage.backend(), key);
            Ok(url)
        }
        Err(e) => {
            tracing::error!("Picture upload failed for {}: {}", key, e);
            Err(ServiceError::Upload(e))
        }
    }
}
