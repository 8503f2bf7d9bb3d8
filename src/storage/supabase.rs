use async_trait::async_trait;
use reqwest::header;

use super::{ObjectStorage, StorageError, Upload, validate_key};

/// Supabase Storage bucket accessed with the service-role key.
#[derive(Clone)]
pub struct SupabaseStorage {
    client: reqwest::Client,
    base_url: String,
    service_key: String,
    bucket: String,
}

impl SupabaseStorage {
    pub fn new(
        base_url: impl Into<String>,
        service_key: impl Into<String>,
        bucket: impl Into<String>,
    ) -> Result<Self, StorageError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            service_key: service_key.into(),
            bucket: bucket.into(),
        })
    }

    fn object_url(&self, key: &str) -> String {
        format!("{}/storage/v1/object/{}/{}", self.base_url, self.bucket, key)
    }

    pub fn public_url(&self, key: &str) -> String {
        format!(
            "{}/storage/v1/object/public/{}/{}",
            self.base_url, self.bucket, key
        )
    }
}

#[async_trait]
impl ObjectStorage for SupabaseStorage {
    fn backend(&self) -> &'static str {
        "supabase"
    }

    async fn upload(&self, key: &str, upload: &Upload) -> Result<String, StorageError> {
        validate_key(key)?;

        let response = self
            .client
            .post(self.object_url(key))
            .bearer_auth(&self.service_key)
            .header("apikey", &self.service_key)
            .header(header::CONTENT_TYPE, &upload.content_type)
            .header("x-upsert", "false")
            .body(upload.bytes.clone())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StorageError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        Ok(self.public_url(key))
    }

    async fn is_healthy(&self) -> bool {
        let url = format!("{}/storage/v1/bucket/{}", self.base_url, self.bucket);
        match self
            .client
            .get(url)
            .bearer_auth(&self.service_key)
            .header("apikey", &self.service_key)
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                tracing::warn!("Storage health check failed: {}", e);
                false
            }
        }
    }
}
