// ============================================
// Object storage for organization and protest pictures
// ============================================

use async_trait::async_trait;

pub mod local;
pub mod supabase;

pub use local::LocalStorage;
pub use supabase::SupabaseStorage;

/// A picture received from a multipart form.
#[derive(Debug, Clone)]
pub struct Upload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl Upload {
    /// Extension taken from the client file name, `bin` when it has none
    /// or it is not plain alphanumeric.
    pub fn extension(&self) -> &str {
        match self.file_name.rsplit_once('.') {
            Some((_, ext)) if !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()) => {
                ext
            }
            _ => "bin",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("storage request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("storage rejected upload ({status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("storage io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid object key '{0}'")]
    InvalidKey(String),
}

#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Short backend name for logs and `/health`.
    fn backend(&self) -> &'static str;

    /// Store `upload` under `key` and return its public URL.
    async fn upload(&self, key: &str, upload: &Upload) -> Result<String, StorageError>;

    async fn is_healthy(&self) -> bool;
}

/// Object key for an organization picture.
pub fn org_picture_key(org_id: &str, upload: &Upload, millis: i64) -> String {
    format!("org-{}-{}.{}", org_id, millis, upload.extension())
}

/// Object key for a protest picture.
pub fn protest_picture_key(random_id: &str, upload: &Upload) -> String {
    format!("protest-{}.{}", random_id, upload.extension())
}

pub(crate) fn validate_key(key: &str) -> Result<(), StorageError> {
    let valid = !key.is_empty()
        && !key.contains("..")
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));

    if valid {
        Ok(())
    } else {
        Err(StorageError::InvalidKey(key.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upload(name: &str) -> Upload {
        Upload {
            file_name: name.to_string(),
            content_type: "image/png".to_string(),
            bytes: vec![1, 2, 3],
        }
    }

    #[test]
    fn keys_follow_bucket_naming() {
        assert_eq!(
            org_picture_key("abc", &upload("logo.final.png"), 1700000000000),
            "org-abc-1700000000000.png"
        );
        assert_eq!(protest_picture_key("x1", &upload("march.jpg")), "protest-x1.jpg");
        assert_eq!(upload("noext").extension(), "bin");
        assert_eq!(upload("odd.p/ng").extension(), "bin");
    }

    #[test]
    fn rejects_path_traversal() {
        assert!(validate_key("org-1.png").is_ok());
        assert!(validate_key("../etc/passwd").is_err());
        assert!(validate_key("a/b.png").is_err());
        assert!(validate_key("").is_err());
    }
}
