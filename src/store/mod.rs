//! Persistence traits for profiles and the field catalog
//!
//! The services operate exclusively through these traits so the backing store
//! is pluggable: `memory` for tests and single-process use, `postgres` (behind
//! the `database` feature) for production.
//!
//! Both backends enforce PAN uniqueness themselves. The application-level check
//! in `uniqueness` runs first and produces the friendly error, but the store is
//! the authority: two racing writers cannot both persist the same normalized
//! PAN.

use crate::catalog::{Field, FieldId};
use crate::sections::{ProfileDetails, VerificationMap};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub mod memory;
#[cfg(feature = "database")]
pub mod postgres;

pub use memory::{MemoryFieldCatalog, MemoryProfileStore};
#[cfg(feature = "database")]
pub use postgres::{PgFieldCatalog, PgProfileStore};

pub type ProfileId = i64;

/// A persisted KYC profile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: ProfileId,
    pub details: ProfileDetails,
    #[serde(default)]
    pub verified: VerificationMap,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Storage layer errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("normalized PAN {masked_pan} is already assigned to another profile")]
    PanTaken { masked_pan: String },

    #[error("field name '{name}' already exists")]
    DuplicateFieldName { name: String },

    #[cfg(feature = "database")]
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Profile persistence
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Insert a profile with an empty `verified` map and assign its id.
    async fn insert_profile(&self, details: &ProfileDetails) -> StoreResult<Profile>;

    /// Replace `details`. Returns `None` for an unknown id.
    async fn update_details(
        &self,
        id: ProfileId,
        details: &ProfileDetails,
    ) -> StoreResult<Option<Profile>>;

    /// Replace `verified` wholesale. Returns `None` for an unknown id.
    async fn replace_verified(
        &self,
        id: ProfileId,
        verified: &VerificationMap,
    ) -> StoreResult<Option<Profile>>;

    async fn get_profile(&self, id: ProfileId) -> StoreResult<Option<Profile>>;

    /// Profiles whose resolved PAN normalizes to `normalized_pan`, by id.
    async fn find_by_pan(
        &self,
        normalized_pan: &str,
        exclude: Option<ProfileId>,
    ) -> StoreResult<Vec<Profile>>;

    /// Whether any profile other than `exclude` holds `normalized_pan`.
    async fn pan_in_use(&self, normalized_pan: &str, exclude: Option<ProfileId>) -> StoreResult<bool> {
        Ok(!self.find_by_pan(normalized_pan, exclude).await?.is_empty())
    }
}

/// Field catalog persistence
#[async_trait]
pub trait FieldCatalogStore: Send + Sync {
    /// All fields in creation order
    async fn list_fields(&self) -> StoreResult<Vec<Field>>;

    /// Fails with `DuplicateFieldName` when `name` exists (case-sensitive).
    async fn insert_field(&self, name: &str, section_category: &str) -> StoreResult<Field>;

    /// Returns `None` for an unknown id.
    async fn rename_field(&self, id: FieldId, name: &str) -> StoreResult<Option<Field>>;

    /// Deleting an unknown id is not an error.
    async fn delete_field(&self, id: FieldId) -> StoreResult<()>;
}
