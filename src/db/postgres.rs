use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

use super::{CountWindow, DashboardCounts, Store, StoreError};
use crate::models::{
    InviteCode, InviteCodeRecord, Org, OrgFilter, OrganizerSummary, Protest, ProtestRecord,
    RedeemerSummary, VerificationStatus,
};

const ORG_COLUMNS: &str = "id, username, name, country, social_media_platform, \
     social_media_handle, password, verification_status, verified_at, picture_url, \
     invite_code_used, created_at, updated_at";

const INVITE_COLUMNS: &str =
    "id, code, is_used, expires_at, sent_to, sent_at, created_at, updated_at";

const PROTEST_SELECT: &str = r#"
    SELECT
        p.id, p.title, p.description, p.location, p.city, p.country, p.date_time,
        p.organizer_id, p.picture_url, p.created_at, p.updated_at,
        o.id AS organizer_ref, o.name AS organizer_name,
        o.username AS organizer_username, o.picture_url AS organizer_picture_url
"#;

/// PostgreSQL-backed store.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

// ============================================
// Row mapping
// ============================================

fn status_from_row(row: &PgRow, column: &str) -> Result<VerificationStatus, sqlx::Error> {
    let raw: String = row.try_get(column)?;
    raw.parse().map_err(|e| sqlx::Error::ColumnDecode {
        index: column.to_string(),
        source: Box::new(e),
    })
}

fn org_from_row(row: &PgRow) -> Result<Org, sqlx::Error> {
    Ok(Org {
        id: row.try_get("id")?,
        username: row.try_get("username")?,
        name: row.try_get("name")?,
        country: row.try_get("country")?,
        social_media_platform: row.try_get("social_media_platform")?,
        social_media_handle: row.try_get("social_media_handle")?,
        password_hash: row.try_get("password")?,
        verification_status: status_from_row(row, "verification_status")?,
        verified_at: row.try_get("verified_at")?,
        picture_url: row.try_get("picture_url")?,
        invite_code_used: row.try_get("invite_code_used")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn invite_from_row(row: &PgRow) -> Result<InviteCode, sqlx::Error> {
    Ok(InviteCode {
        id: row.try_get("id")?,
        code: row.try_get("code")?,
        is_used: row.try_get("is_used")?,
        expires_at: row.try_get("expires_at")?,
        sent_to: row.try_get("sent_to")?,
        sent_at: row.try_get("sent_at")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn protest_from_row(row: &PgRow) -> Result<ProtestRecord, sqlx::Error> {
    let protest = Protest {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        location: row.try_get("location")?,
        city: row.try_get("city")?,
        country: row.try_get("country")?,
        date_time: row.try_get("date_time")?,
        organizer_id: row.try_get("organizer_id")?,
        picture_url: row.try_get("picture_url")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    };

    let organizer = match row.try_get::<Option<String>, _>("organizer_ref")? {
        Some(id) => Some(OrganizerSummary {
            id,
            name: row.try_get("organizer_name")?,
            username: row.try_get("organizer_username")?,
            picture_url: row.try_get("organizer_picture_url")?,
        }),
        None => None,
    };

    Ok(ProtestRecord { protest, organizer })
}

fn status_list(statuses: &[VerificationStatus]) -> Vec<String> {
    statuses.iter().map(|s| s.as_str().to_string()).collect()
}

// ============================================
// Store implementation
// ============================================

#[async_trait]
impl Store for PgStore {
    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").fetch_one(&self.pool).await?;
        Ok(())
    }

    async fn close(&self) {
        self.pool.close().await;
        tracing::info!("PostgreSQL pool closed");
    }

    async fn list_orgs(&self, filter: &OrgFilter) -> Result<Vec<Org>, StoreError> {
        let sql = format!(
            r#"
            SELECT {ORG_COLUMNS}
            FROM org
            WHERE (cardinality($1::text[]) = 0 OR verification_status = ANY($1))
            ORDER BY created_at DESC
            LIMIT $2
            "#
        );

        let rows = sqlx::query(&sql)
            .bind(status_list(&filter.statuses))
            .bind(filter.limit)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .iter()
            .map(org_from_row)
            .collect::<Result<Vec<_>, _>>()?)
    }

    async fn get_org(&self, id: &str) -> Result<Option<Org>, StoreError> {
        let sql = format!("SELECT {ORG_COLUMNS} FROM org WHERE id = $1");
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(org_from_row).transpose()?)
    }

    async fn insert_org(&self, org: &Org) -> Result<Org, StoreError> {
        let sql = format!(
            r#"
            INSERT INTO org (
                id, username, name, country, social_media_platform, social_media_handle,
                password, verification_status, verified_at, picture_url, invite_code_used,
                created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            RETURNING {ORG_COLUMNS}
            "#
        );

        let row = sqlx::query(&sql)
            .bind(&org.id)
            .bind(&org.username)
            .bind(&org.name)
            .bind(&org.country)
            .bind(&org.social_media_platform)
            .bind(&org.social_media_handle)
            .bind(&org.password_hash)
            .bind(org.verification_status.as_str())
            .bind(org.verified_at)
            .bind(&org.picture_url)
            .bind(&org.invite_code_used)
            .bind(org.created_at)
            .bind(org.updated_at)
            .fetch_one(&self.pool)
            .await?;

        Ok(org_from_row(&row)?)
    }

    async fn update_org(&self, org: &Org) -> Result<Option<Org>, StoreError> {
        let sql = format!(
            r#"
            UPDATE org
            SET username = $1, name = $2, country = $3, social_media_platform = $4,
                social_media_handle = $5, verification_status = $6, verified_at = $7,
                picture_url = $8, updated_at = NOW()
            WHERE id = $9
            RETURNING {ORG_COLUMNS}
            "#
        );

        let row = sqlx::query(&sql)
            .bind(&org.username)
            .bind(&org.name)
            .bind(&org.country)
            .bind(&org.social_media_platform)
            .bind(&org.social_media_handle)
            .bind(org.verification_status.as_str())
            .bind(org.verified_at)
            .bind(&org.picture_url)
            .bind(&org.id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(org_from_row).transpose()?)
    }

    async fn set_org_status(
        &self,
        id: &str,
        status: VerificationStatus,
        verified_at: Option<DateTime<Utc>>,
    ) -> Result<Option<Org>, StoreError> {
        let sql = format!(
            r#"
            UPDATE org
            SET verification_status = $1, verified_at = $2, updated_at = NOW()
            WHERE id = $3
            RETURNING {ORG_COLUMNS}
            "#
        );

        let row = sqlx::query(&sql)
            .bind(status.as_str())
            .bind(verified_at)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(org_from_row).transpose()?)
    }

    async fn approve_org(
        &self,
        id: &str,
        invite: &InviteCode,
        stale_recipients: &[String],
    ) -> Result<Option<Org>, StoreError> {
        let mut tx = self.pool.begin().await?;

        // Compare-and-swap on the previous status closes the double-approval race.
        let sql = format!(
            r#"
            UPDATE org
            SET verification_status = 'approved', verified_at = NULL, updated_at = NOW()
            WHERE id = $1 AND verification_status = 'under_review'
            RETURNING {ORG_COLUMNS}
            "#
        );
        let row = sqlx::query(&sql).bind(id).fetch_optional(&mut *tx).await?;

        let Some(row) = row else {
            tx.rollback().await?;
            return Ok(None);
        };
        let org = org_from_row(&row)?;

        let removed =
            sqlx::query("DELETE FROM invite_code WHERE is_used = FALSE AND sent_to = ANY($1)")
                .bind(stale_recipients)
                .execute(&mut *tx)
                .await?;

        if removed.rows_affected() > 0 {
            tracing::info!(
                "Removed {} stale invite code(s) for org {}",
                removed.rows_affected(),
                id
            );
        }

        sqlx::query(
            r#"
            INSERT INTO invite_code
                (id, code, is_used, expires_at, sent_to, sent_at, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(&invite.id)
        .bind(&invite.code)
        .bind(invite.is_used)
        .bind(invite.expires_at)
        .bind(&invite.sent_to)
        .bind(invite.sent_at)
        .bind(invite.created_at)
        .bind(invite.updated_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(Some(org))
    }

    async fn delete_org(&self, id: &str) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM org WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_invite_codes(
        &self,
        limit: Option<i64>,
    ) -> Result<Vec<InviteCodeRecord>, StoreError> {
        let sql = format!(
            "SELECT {INVITE_COLUMNS} FROM invite_code ORDER BY created_at DESC LIMIT $1"
        );
        let rows = sqlx::query(&sql)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        let invites = rows
            .iter()
            .map(invite_from_row)
            .collect::<Result<Vec<_>, _>>()?;

        let codes: Vec<String> = invites.iter().map(|i| i.code.clone()).collect();

        let redeemer_rows = sqlx::query(
            r#"
            SELECT id, name, username, picture_url, verification_status, verified_at,
                   invite_code_used
            FROM org
            WHERE invite_code_used = ANY($1)
            ORDER BY created_at DESC
            "#,
        )
        .bind(&codes)
        .fetch_all(&self.pool)
        .await?;

        let mut by_code: HashMap<String, Vec<RedeemerSummary>> = HashMap::new();
        for row in &redeemer_rows {
            let code: String = row.try_get("invite_code_used")?;
            by_code.entry(code).or_default().push(RedeemerSummary {
                id: row.try_get("id")?,
                name: row.try_get("name")?,
                username: row.try_get("username")?,
                picture_url: row.try_get("picture_url")?,
                verification_status: status_from_row(row, "verification_status")?,
                verified_at: row.try_get("verified_at")?,
            });
        }

        Ok(invites
            .into_iter()
            .map(|invite| {
                let orgs = by_code.remove(&invite.code).unwrap_or_default();
                InviteCodeRecord { invite, orgs }
            })
            .collect())
    }

    async fn invite_code_exists(&self, code: &str) -> Result<bool, StoreError> {
        let row = sqlx::query("SELECT EXISTS(SELECT 1 FROM invite_code WHERE code = $1) AS found")
            .bind(code)
            .fetch_one(&self.pool)
            .await?;

        Ok(row.try_get("found")?)
    }

    async fn delete_invite_code(&self, id: &str) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM invite_code WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_invite_code_by_code(&self, code: &str) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM invite_code WHERE code = $1")
            .bind(code)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_protests(&self, limit: Option<i64>) -> Result<Vec<ProtestRecord>, StoreError> {
        let sql = format!(
            r#"
            {PROTEST_SELECT}
            FROM protest p
            LEFT JOIN org o ON o.id = p.organizer_id
            ORDER BY p.created_at DESC
            LIMIT $1
            "#
        );

        let rows = sqlx::query(&sql)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .iter()
            .map(protest_from_row)
            .collect::<Result<Vec<_>, _>>()?)
    }

    async fn get_protest(&self, id: &str) -> Result<Option<ProtestRecord>, StoreError> {
        let sql = format!(
            r#"
            {PROTEST_SELECT}
            FROM protest p
            LEFT JOIN org o ON o.id = p.organizer_id
            WHERE p.id = $1
            "#
        );

        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(protest_from_row).transpose()?)
    }

    async fn insert_protest(&self, protest: &Protest) -> Result<ProtestRecord, StoreError> {
        let sql = format!(
            r#"
            WITH p AS (
                INSERT INTO protest (
                    id, title, description, location, city, country, date_time,
                    organizer_id, picture_url, created_at, updated_at
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
                RETURNING *
            )
            {PROTEST_SELECT}
            FROM p
            LEFT JOIN org o ON o.id = p.organizer_id
            "#
        );

        let row = sqlx::query(&sql)
            .bind(&protest.id)
            .bind(&protest.title)
            .bind(&protest.description)
            .bind(&protest.location)
            .bind(&protest.city)
            .bind(&protest.country)
            .bind(protest.date_time)
            .bind(&protest.organizer_id)
            .bind(&protest.picture_url)
            .bind(protest.created_at)
            .bind(protest.updated_at)
            .fetch_one(&self.pool)
            .await?;

        Ok(protest_from_row(&row)?)
    }

    async fn update_protest(
        &self,
        protest: &Protest,
    ) -> Result<Option<ProtestRecord>, StoreError> {
        let sql = format!(
            r#"
            WITH p AS (
                UPDATE protest
                SET title = $1, description = $2, location = $3, city = $4, country = $5,
                    date_time = $6, picture_url = $7, updated_at = NOW()
                WHERE id = $8
                RETURNING *
            )
            {PROTEST_SELECT}
            FROM p
            LEFT JOIN org o ON o.id = p.organizer_id
            "#
        );

        let row = sqlx::query(&sql)
            .bind(&protest.title)
            .bind(&protest.description)
            .bind(&protest.location)
            .bind(&protest.city)
            .bind(&protest.country)
            .bind(protest.date_time)
            .bind(&protest.picture_url)
            .bind(&protest.id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(protest_from_row).transpose()?)
    }

    async fn delete_protest(&self, id: &str) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM protest WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn dashboard_counts(&self, window: &CountWindow) -> Result<DashboardCounts, StoreError> {
        let (org_result, protest_result, invite_result) = tokio::join!(
            sqlx::query(
                r#"
                SELECT
                    COUNT(*) AS total,
                    COUNT(*) FILTER (WHERE verification_status = 'verified') AS verified,
                    COUNT(*) FILTER (WHERE verification_status = 'pending') AS pending,
                    COUNT(*) FILTER (WHERE verification_status = 'under_review') AS under_review,
                    COUNT(*) FILTER (WHERE verification_status = 'approved') AS approved,
                    COUNT(*) FILTER (WHERE created_at >= $1) AS this_month,
                    COUNT(*) FILTER (WHERE created_at >= $2 AND created_at < $1) AS last_month
                FROM org
                "#,
            )
            .bind(window.this_month_start)
            .bind(window.last_month_start)
            .fetch_one(&self.pool),
            sqlx::query(
                r#"
                SELECT
                    COUNT(*) AS total,
                    COUNT(*) FILTER (WHERE date_time > $3) AS upcoming,
                    COUNT(*) FILTER (WHERE created_at >= $1) AS this_month,
                    COUNT(*) FILTER (WHERE created_at >= $2 AND created_at < $1) AS last_month
                FROM protest
                "#,
            )
            .bind(window.this_month_start)
            .bind(window.last_month_start)
            .bind(window.now)
            .fetch_one(&self.pool),
            sqlx::query(
                r#"
                SELECT
                    COUNT(*) AS total,
                    COUNT(*) FILTER (WHERE is_used = FALSE AND expires_at > $1) AS active,
                    COUNT(*) FILTER (WHERE is_used = TRUE) AS used
                FROM invite_code
                "#,
            )
            .bind(window.now)
            .fetch_one(&self.pool),
        );

        let org_row = org_result?;
        let protest_row = protest_result?;
        let invite_row = invite_result?;

        Ok(DashboardCounts {
            total_ngos: org_row.try_get("total")?,
            verified_ngos: org_row.try_get("verified")?,
            pending_requests: org_row.try_get("pending")?,
            under_review_requests: org_row.try_get("under_review")?,
            approved_requests: org_row.try_get("approved")?,
            ngos_this_month: org_row.try_get("this_month")?,
            ngos_last_month: org_row.try_get("last_month")?,
            total_protests: protest_row.try_get("total")?,
            upcoming_protests: protest_row.try_get("upcoming")?,
            protests_this_month: protest_row.try_get("this_month")?,
            protests_last_month: protest_row.try_get("last_month")?,
            total_invite_codes: invite_row.try_get("total")?,
            active_invite_codes: invite_row.try_get("active")?,
            used_invite_codes: invite_row.try_get("used")?,
        })
    }
}
