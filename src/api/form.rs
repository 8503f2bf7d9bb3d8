use std::collections::HashMap;

use axum::extract::{FromRequest, Multipart, Request};

use super::ApiError;
use crate::storage::Upload;

/// Name of the multipart field carrying the picture file.
const PICTURE_FIELD: &str = "picture";

/// A multipart form split into text fields and an optional picture.
#[derive(Debug, Default)]
pub struct FormData {
    fields: HashMap<String, String>,
    pub picture: Option<Upload>,
}

impl FormData {
    async fn read(mut multipart: Multipart) -> Result<Self, ApiError> {
        let mut form = FormData::default();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| ApiError::BadRequest(e.body_text()))?
        {
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };

            if name == PICTURE_FIELD {
                let file_name = field.file_name().unwrap_or(PICTURE_FIELD).to_string();
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::BadRequest(e.body_text()))?;

                // Browsers send an empty part when no file was chosen.
                if !bytes.is_empty() {
                    form.picture = Some(Upload {
                        file_name,
                        content_type,
                        bytes: bytes.to_vec(),
                    });
                }
            } else {
                let value = field
                    .text()
                    .await
                    .map_err(|e| ApiError::BadRequest(e.body_text()))?;
                form.fields.insert(name, value);
            }
        }

        Ok(form)
    }

    pub fn take(&mut self, name: &str) -> Option<String> {
        self.fields.remove(name)
    }
}

impl<S> FromRequest<S> for FormData
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let multipart = Multipart::from_request(req, state)
            .await
            .map_err(|e| ApiError::BadRequest(e.body_text()))?;
        Self::read(multipart).await
    }
}
