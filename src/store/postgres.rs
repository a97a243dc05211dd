//! PostgreSQL stores
//!
//! `details` and `verified` live in `json` columns and are read back as text so
//! key order is preserved. `pan_normalized` is written alongside every details
//! write; a partial unique index on it is the authoritative PAN constraint.
//! `pan_lookup` carries the same value without the constraint so legacy rows
//! that lost a backfill collision stay visible to lookups.

use super::{FieldCatalogStore, Profile, ProfileId, ProfileStore, StoreError, StoreResult};
use crate::catalog::{Field, FieldId};
use crate::pan;
use crate::sections::{ProfileDetails, VerificationMap};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use tracing::{debug, info, warn};

const PAN_CONSTRAINT: &str = "kyc_profiles_pan_normalized_key";
const FIELD_NAME_CONSTRAINT: &str = "fields_name_key";

const PROFILE_COLUMNS: &str =
    "id, details::text AS details, verified::text AS verified, created_at, updated_at";

#[derive(Debug, FromRow)]
struct ProfileRecord {
    id: i64,
    details: String,
    verified: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ProfileRecord> for Profile {
    type Error = StoreError;

    fn try_from(row: ProfileRecord) -> StoreResult<Self> {
        Ok(Profile {
            id: row.id,
            details: serde_json::from_str(&row.details)?,
            verified: serde_json::from_str(&row.verified)?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn violates(err: &sqlx::Error, constraint: &str) -> bool {
    match err {
        sqlx::Error::Database(db) => {
            db.constraint() == Some(constraint)
                || (db.constraint().is_none() && db.is_unique_violation())
        }
        _ => false,
    }
}

fn profile_write_error(err: sqlx::Error, pan_normalized: Option<&str>) -> StoreError {
    match pan_normalized {
        Some(value) if violates(&err, PAN_CONSTRAINT) => StoreError::PanTaken {
            masked_pan: pan::mask(value),
        },
        _ => StoreError::Database(err),
    }
}

// =============================================================================
// PROFILES
// =============================================================================

/// Profile store over `kyc_profiles`
#[derive(Clone)]
pub struct PgProfileStore {
    pool: PgPool,
}

impl PgProfileStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Fill `pan_normalized` for rows written before the column existed.
    ///
    /// Rows whose PAN would collide with an existing one keep a NULL
    /// `pan_normalized` and are reported in the returned list for manual
    /// review. Their `pan_lookup` is still set, so they are found by PAN and
    /// block new profiles from taking it.
    pub async fn backfill_pan_normalized(&self) -> StoreResult<Vec<ProfileId>> {
        let rows: Vec<(i64, String)> = sqlx::query_as(
            "SELECT id, details::text FROM kyc_profiles WHERE pan_normalized IS NULL ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut skipped = Vec::new();
        for (id, raw) in rows {
            let Some(normalized) = pan::resolve_normalized_json(&raw) else {
                continue;
            };
            let result = sqlx::query(
                "UPDATE kyc_profiles SET pan_normalized = $1, pan_lookup = $1 WHERE id = $2",
            )
            .bind(&normalized)
            .bind(id)
            .execute(&self.pool)
            .await;
            match result {
                Ok(_) => {}
                Err(e) if violates(&e, PAN_CONSTRAINT) => {
                    sqlx::query("UPDATE kyc_profiles SET pan_lookup = $1 WHERE id = $2")
                        .bind(&normalized)
                        .bind(id)
                        .execute(&self.pool)
                        .await?;
                    warn!(
                        profile_id = id,
                        pan = %pan::mask(&normalized),
                        "Legacy profile shares a normalized PAN"
                    );
                    skipped.push(id);
                }
                Err(e) => return Err(e.into()),
            }
        }

        info!(skipped = skipped.len(), "Backfilled normalized PANs");
        Ok(skipped)
    }
}

#[async_trait]
impl ProfileStore for PgProfileStore {
    async fn insert_profile(&self, details: &ProfileDetails) -> StoreResult<Profile> {
        let pan_normalized = pan::resolve_normalized(details);
        let sql = format!(
            "INSERT INTO kyc_profiles (details, verified, pan_normalized, pan_lookup) \
             VALUES ($1::json, '{{}}'::json, $2, $2) RETURNING {}",
            PROFILE_COLUMNS
        );
        let row: ProfileRecord = sqlx::query_as(&sql)
            .bind(serde_json::to_string(details)?)
            .bind(pan_normalized.as_deref())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| profile_write_error(e, pan_normalized.as_deref()))?;

        debug!(profile_id = row.id, "postgres store: inserted profile");
        row.try_into()
    }

    async fn update_details(
        &self,
        id: ProfileId,
        details: &ProfileDetails,
    ) -> StoreResult<Option<Profile>> {
        let pan_normalized = pan::resolve_normalized(details);
        let sql = format!(
            "UPDATE kyc_profiles \
             SET details = $2::json, pan_normalized = $3, pan_lookup = $3, updated_at = now() \
             WHERE id = $1 RETURNING {}",
            PROFILE_COLUMNS
        );
        let row: Option<ProfileRecord> = sqlx::query_as(&sql)
            .bind(id)
            .bind(serde_json::to_string(details)?)
            .bind(pan_normalized.as_deref())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| profile_write_error(e, pan_normalized.as_deref()))?;

        row.map(Profile::try_from).transpose()
    }

    async fn replace_verified(
        &self,
        id: ProfileId,
        verified: &VerificationMap,
    ) -> StoreResult<Option<Profile>> {
        let sql = format!(
            "UPDATE kyc_profiles SET verified = $2::json, updated_at = now() \
             WHERE id = $1 RETURNING {}",
            PROFILE_COLUMNS
        );
        let row: Option<ProfileRecord> = sqlx::query_as(&sql)
            .bind(id)
            .bind(serde_json::to_string(verified)?)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Profile::try_from).transpose()
    }

    async fn get_profile(&self, id: ProfileId) -> StoreResult<Option<Profile>> {
        let sql = format!("SELECT {} FROM kyc_profiles WHERE id = $1", PROFILE_COLUMNS);
        let row: Option<ProfileRecord> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Profile::try_from).transpose()
    }

    async fn find_by_pan(
        &self,
        normalized_pan: &str,
        exclude: Option<ProfileId>,
    ) -> StoreResult<Vec<Profile>> {
        let sql = format!(
            "SELECT {} FROM kyc_profiles \
             WHERE pan_lookup = $1 AND ($2::BIGINT IS NULL OR id <> $2) \
             ORDER BY id",
            PROFILE_COLUMNS
        );
        let rows: Vec<ProfileRecord> = sqlx::query_as(&sql)
            .bind(normalized_pan)
            .bind(exclude)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(Profile::try_from).collect()
    }

    async fn pan_in_use(&self, normalized_pan: &str, exclude: Option<ProfileId>) -> StoreResult<bool> {
        let (exists,): (bool,) = sqlx::query_as(
            "SELECT EXISTS (SELECT 1 FROM kyc_profiles \
             WHERE pan_lookup = $1 AND ($2::BIGINT IS NULL OR id <> $2))",
        )
        .bind(normalized_pan)
        .bind(exclude)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }
}

// =============================================================================
// FIELD CATALOG
// =============================================================================

/// Field catalog over the `fields` table
#[derive(Clone)]
pub struct PgFieldCatalog {
    pool: PgPool,
}

impl PgFieldCatalog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct FieldRecord {
    id: i64,
    name: String,
    section_category: String,
}

impl From<FieldRecord> for Field {
    fn from(row: FieldRecord) -> Self {
        Field {
            id: row.id,
            name: row.name,
            section_category: row.section_category,
        }
    }
}

fn field_write_error(err: sqlx::Error, name: &str) -> StoreError {
    if violates(&err, FIELD_NAME_CONSTRAINT) {
        StoreError::DuplicateFieldName {
            name: name.to_string(),
        }
    } else {
        StoreError::Database(err)
    }
}

#[async_trait]
impl FieldCatalogStore for PgFieldCatalog {
    async fn list_fields(&self) -> StoreResult<Vec<Field>> {
        let rows: Vec<FieldRecord> =
            sqlx::query_as("SELECT id, name, section_category FROM fields ORDER BY id")
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().map(Field::from).collect())
    }

    async fn insert_field(&self, name: &str, section_category: &str) -> StoreResult<Field> {
        let row: FieldRecord = sqlx::query_as(
            "INSERT INTO fields (name, section_category) VALUES ($1, $2) \
             RETURNING id, name, section_category",
        )
        .bind(name)
        .bind(section_category)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| field_write_error(e, name))?;
        Ok(row.into())
    }

    async fn rename_field(&self, id: FieldId, name: &str) -> StoreResult<Option<Field>> {
        let row: Option<FieldRecord> = sqlx::query_as(
            "UPDATE fields SET name = $2 WHERE id = $1 RETURNING id, name, section_category",
        )
        .bind(id)
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| field_write_error(e, name))?;
        Ok(row.map(Field::from))
    }

    async fn delete_field(&self, id: FieldId) -> StoreResult<()> {
        sqlx::query("DELETE FROM fields WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
