use chrono::{DateTime, NaiveDateTime, Utc};
use validator::Validate;

use crate::context::AppContext;
use crate::db::StoreError;
use crate::models::{Protest, ProtestRecord};
use crate::revalidate::{DASHBOARD_PATH, PROTESTS_PATH};
use crate::storage::{Upload, protest_picture_key};
use crate::utils::generate_id;

use super::{ServiceError, non_empty, upload_picture};

/// Formats accepted besides RFC 3339. These are what an HTML
/// `datetime-local` input submits, read as UTC.
const LOCAL_DATE_TIME_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"];

#[derive(Debug, Clone, Default, Validate)]
pub struct CreateProtestInput {
    #[validate(required)]
    pub title: Option<String>,
    pub description: Option<String>,
    #[validate(required)]
    pub location: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
    #[validate(required)]
    pub date_time: Option<String>,
    #[validate(required)]
    pub organizer_id: Option<String>,
}

impl CreateProtestInput {
    fn normalized(self) -> Self {
        Self {
            title: non_empty(self.title),
            description: non_empty(self.description),
            location: non_empty(self.location),
            city: non_empty(self.city),
            country: non_empty(self.country),
            date_time: non_empty(self.date_time),
            organizer_id: non_empty(self.organizer_id),
        }
    }
}

/// Protest edits never move a protest to another organizer.
#[derive(Debug, Clone, Default, Validate)]
pub struct UpdateProtestInput {
    #[validate(required)]
    pub title: Option<String>,
    pub description: Option<String>,
    #[validate(required)]
    pub location: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
    #[validate(required)]
    pub date_time: Option<String>,
}

impl UpdateProtestInput {
    fn normalized(self) -> Self {
        Self {
            title: non_empty(self.title),
            description: non_empty(self.description),
            location: non_empty(self.location),
            city: non_empty(self.city),
            country: non_empty(self.country),
            date_time: non_empty(self.date_time),
        }
    }
}

pub(crate) fn parse_date_time(raw: &str) -> Result<DateTime<Utc>, ServiceError> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Ok(parsed.with_timezone(&Utc));
    }
    LOCAL_DATE_TIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .map(|naive| naive.and_utc())
        .ok_or_else(|| ServiceError::validation("Invalid date and time", &["dateTime"]))
}

pub async fn list_protests(ctx: &AppContext) -> Result<Vec<ProtestRecord>, ServiceError> {
    Ok(ctx.store.list_protests(None).await?)
}

pub async fn get_protest(ctx: &AppContext, id: &str) -> Result<ProtestRecord, ServiceError> {
    ctx.store
        .get_protest(id)
        .await?
        .ok_or(ServiceError::NotFound("Protest"))
}

pub async fn create_protest(
    ctx: &AppContext,
    input: CreateProtestInput,
    picture: Option<Upload>,
) -> Result<ProtestRecord, ServiceError> {
    let input = input.normalized();
    input.validate()?;

    let (Some(title), Some(location), Some(date_time), Some(organizer_id)) = (
        input.title,
        input.location,
        input.date_time,
        input.organizer_id,
    ) else {
        return Err(ServiceError::validation("Missing required fields", &[]));
    };
    let date_time = parse_date_time(&date_time)?;

    if ctx.store.get_org(&organizer_id).await?.is_none() {
        tracing::warn!("Protest organizer {} does not exist", organizer_id);
        return Err(ServiceError::NotFound("Organizer"));
    }

    let id = generate_id();
    let picture_url = match &picture {
        Some(upload) => Some(upload_picture(ctx, &protest_picture_key(&id, upload), upload).await?),
        None => None,
    };

    let now = Utc::now();
    let protest = Protest {
        id,
        title,
        description: input.description,
        location,
        city: input.city,
        country: input.country,
        date_time,
        organizer_id,
        picture_url,
        created_at: now,
        updated_at: now,
    };

    let created = ctx
        .store
        .insert_protest(&protest)
        .await
        .map_err(|e| match e {
            // Organizer deleted between the check and the insert.
            StoreError::MissingReference(_) => ServiceError::NotFound("Organizer"),
            other => ServiceError::Persistence(other),
        })?;

    tracing::info!("Protest {} created by {}", created.protest.id, created.protest.organizer_id);
    ctx.revalidator.revalidate(&[PROTESTS_PATH, DASHBOARD_PATH]);

    Ok(created)
}

pub async fn update_protest(
    ctx: &AppContext,
    id: &str,
    input: UpdateProtestInput,
    picture: Option<Upload>,
) -> Result<ProtestRecord, ServiceError> {
    let input = input.normalized();
    input.validate()?;

    let (Some(title), Some(location), Some(date_time)) =
        (input.title, input.location, input.date_time)
    else {
        return Err(ServiceError::validation("Missing required fields", &[]));
    };
    let date_time = parse_date_time(&date_time)?;

    let mut protest = get_protest(ctx, id).await?.protest;
    protest.title = title;
    protest.description = input.description;
    protest.location = location;
    protest.city = input.city;
    protest.country = input.country;
    protest.date_time = date_time;

    if let Some(upload) = &picture {
        let key = protest_picture_key(&generate_id(), upload);
        protest.picture_url = Some(upload_picture(ctx, &key, upload).await?);
    }

    let updated = ctx
        .store
        .update_protest(&protest)
        .await?
        .ok_or(ServiceError::NotFound("Protest"))?;

    tracing::info!("Protest {} updated", id);
    ctx.revalidator.revalidate(&[PROTESTS_PATH, DASHBOARD_PATH]);

    Ok(updated)
}

pub async fn delete_protest(ctx: &AppContext, id: &str) -> Result<(), ServiceError> {
    if !ctx.store.delete_protest(id).await? {
        return Err(ServiceError::NotFound("Protest"));
    }

    tracing::info!("Protest {} deleted", id);
    ctx.revalidator.revalidate(&[PROTESTS_PATH, DASHBOARD_PATH]);
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::models::VerificationStatus;
    use crate::services::test_support::{broken_storage_harness, harness, picture, seed_org};

    fn march(organizer_id: &str) -> CreateProtestInput {
        CreateProtestInput {
            title: Some("Climate March".into()),
            description: Some("".into()),
            location: Some("City Hall".into()),
            city: Some("Berlin".into()),
            country: Some(" ".into()),
            date_time: Some("2030-05-01T14:30".into()),
            organizer_id: Some(organizer_id.into()),
        }
    }

    #[test]
    fn accepts_rfc3339_and_datetime_local() {
        let expected = Utc.with_ymd_and_hms(2030, 5, 1, 14, 30, 0).unwrap();
        assert_eq!(parse_date_time("2030-05-01T14:30").unwrap(), expected);
        assert_eq!(parse_date_time("2030-05-01T14:30:00").unwrap(), expected);
        assert_eq!(parse_date_time("2030-05-01T16:30:00+02:00").unwrap(), expected);
        assert!(parse_date_time("next tuesday").is_err());
    }

    #[tokio::test]
    async fn create_embeds_organizer_and_nulls_blanks() {
        let h = harness();
        let org = seed_org(&h.store, "marchers", VerificationStatus::Verified).await;

        let created = create_protest(&h.ctx, march(&org.id), Some(picture()))
            .await
            .unwrap();

        assert_eq!(created.protest.description, None);
        assert_eq!(created.protest.country, None);
        assert_eq!(created.protest.city.as_deref(), Some("Berlin"));
        assert_eq!(created.organizer.as_ref().map(|o| o.id.as_str()), Some(org.id.as_str()));

        let url = created.protest.picture_url.unwrap();
        let expected = format!("http://localhost:8080/uploads/protest-{}.png", created.protest.id);
        assert_eq!(url, expected);
    }

    #[tokio::test]
    async fn create_requires_existing_organizer() {
        let h = harness();
        let err = create_protest(&h.ctx, march("ghost"), None).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound("Organizer")));
        assert!(list_protests(&h.ctx).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn create_reports_missing_fields() {
        let h = harness();
        let input = CreateProtestInput {
            title: None,
            date_time: None,
            ..march("x")
        };
        match create_protest(&h.ctx, input, None).await {
            Err(ServiceError::Validation { fields, .. }) => {
                assert_eq!(fields, vec!["dateTime".to_string(), "title".to_string()])
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn update_keeps_organizer_and_picture() {
        let h = harness();
        let org = seed_org(&h.store, "marchers", VerificationStatus::Verified).await;
        let created = create_protest(&h.ctx, march(&org.id), Some(picture()))
            .await
            .unwrap();

        let input = UpdateProtestInput {
            title: Some("Climate March II".into()),
            description: Some("Bring water".into()),
            location: Some("Park".into()),
            city: None,
            country: None,
            date_time: Some("2030-06-01T10:00:00Z".into()),
        };
        let updated = update_protest(&h.ctx, &created.protest.id, input, None)
            .await
            .unwrap();

        assert_eq!(updated.protest.title, "Climate March II");
        assert_eq!(updated.protest.organizer_id, org.id);
        assert_eq!(updated.protest.picture_url, created.protest.picture_url);
        assert_eq!(updated.protest.city, None);
    }

    #[tokio::test]
    async fn delete_then_get_is_not_found() {
        let h = harness();
        let org = seed_org(&h.store, "marchers", VerificationStatus::Verified).await;
        let created = create_protest(&h.ctx, march(&org.id), None).await.unwrap();

        delete_protest(&h.ctx, &created.protest.id).await.unwrap();

        assert!(matches!(
            get_protest(&h.ctx, &created.protest.id).await,
            Err(ServiceError::NotFound("Protest"))
        ));
        assert!(matches!(
            delete_protest(&h.ctx, &created.protest.id).await,
            Err(ServiceError::NotFound("Protest"))
        ));
    }

    #[tokio::test]
    async fn upload_failure_aborts_create() {
        let (ctx, store) = broken_storage_harness();
        let org = seed_org(&store, "marchers", VerificationStatus::Verified).await;

        let err = create_protest(&ctx, march(&org.id), Some(picture()))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Upload(_)));
        assert!(list_protests(&ctx).await.unwrap().is_empty());
    }
}
