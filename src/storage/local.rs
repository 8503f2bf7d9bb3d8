use std::path::PathBuf;

use async_trait::async_trait;

use super::{ObjectStorage, StorageError, Upload, validate_key};

/// Pictures written to a local directory and served by the API under
/// `/uploads`.
#[derive(Clone)]
pub struct LocalStorage {
    root: PathBuf,
    public_base_url: String,
}

impl LocalStorage {
    pub fn new(root: impl Into<PathBuf>, public_base_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl ObjectStorage for LocalStorage {
    fn backend(&self) -> &'static str {
        "local"
    }

    async fn upload(&self, key: &str, upload: &Upload) -> Result<String, StorageError> {
        validate_key(key)?;

        tokio::fs::create_dir_all(&self.root).await?;
        let path = self.root.join(key);
        if tokio::fs::try_exists(&path).await? {
            return Err(StorageError::Rejected {
                status: 409,
                body: format!("object '{}' already exists", key),
            });
        }
        tokio::fs::write(&path, &upload.bytes).await?;

        Ok(format!("{}/uploads/{}", self.public_base_url, key))
    }

    async fn is_healthy(&self) -> bool {
        tokio::fs::create_dir_all(&self.root).await.is_ok()
    }
}
