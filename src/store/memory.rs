//! In-memory stores
//!
//! Ids are assigned sequentially from 1. The uniqueness constraint on the
//! normalized PAN is checked under the same write lock as the insert/update,
//! which is what the unique index gives the Postgres store.

use super::{FieldCatalogStore, Profile, ProfileId, ProfileStore, StoreError, StoreResult};
use crate::catalog::{Field, FieldId};
use crate::pan;
use crate::sections::{ProfileDetails, VerificationMap};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use tokio::sync::RwLock;
use tracing::debug;

// =============================================================================
// PROFILES
// =============================================================================

struct ProfileRow {
    profile: Profile,
    /// Derived column backing the uniqueness constraint
    pan_normalized: Option<String>,
}

#[derive(Default)]
struct ProfileTable {
    last_id: ProfileId,
    rows: BTreeMap<ProfileId, ProfileRow>,
}

impl ProfileTable {
    fn pan_taken(&self, value: &str, exclude: Option<ProfileId>) -> bool {
        self.rows
            .iter()
            .filter(|(id, _)| Some(**id) != exclude)
            .any(|(_, row)| row.pan_normalized.as_deref() == Some(value))
    }

    fn check_constraint(&self, normalized: Option<&str>, exclude: Option<ProfileId>) -> StoreResult<()> {
        match normalized {
            Some(value) if self.pan_taken(value, exclude) => Err(StoreError::PanTaken {
                masked_pan: pan::mask(value),
            }),
            _ => Ok(()),
        }
    }
}

/// Profile store backed by a `BTreeMap` behind a `tokio` lock
#[derive(Default)]
pub struct MemoryProfileStore {
    table: RwLock<ProfileTable>,
}

impl MemoryProfileStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProfileStore for MemoryProfileStore {
    async fn insert_profile(&self, details: &ProfileDetails) -> StoreResult<Profile> {
        let pan_normalized = pan::resolve_normalized(details);
        let mut table = self.table.write().await;
        table.check_constraint(pan_normalized.as_deref(), None)?;

        table.last_id += 1;
        let now = Utc::now();
        let profile = Profile {
            id: table.last_id,
            details: details.clone(),
            verified: VerificationMap::new(),
            created_at: now,
            updated_at: now,
        };
        table.rows.insert(
            profile.id,
            ProfileRow {
                profile: profile.clone(),
                pan_normalized,
            },
        );
        debug!(profile_id = profile.id, "memory store: inserted profile");
        Ok(profile)
    }

    async fn update_details(
        &self,
        id: ProfileId,
        details: &ProfileDetails,
    ) -> StoreResult<Option<Profile>> {
        let pan_normalized = pan::resolve_normalized(details);
        let mut table = self.table.write().await;
        if !table.rows.contains_key(&id) {
            return Ok(None);
        }
        table.check_constraint(pan_normalized.as_deref(), Some(id))?;

        let Some(row) = table.rows.get_mut(&id) else {
            return Ok(None);
        };
        row.profile.details = details.clone();
        row.profile.updated_at = Utc::now();
        row.pan_normalized = pan_normalized;
        Ok(Some(row.profile.clone()))
    }

    async fn replace_verified(
        &self,
        id: ProfileId,
        verified: &VerificationMap,
    ) -> StoreResult<Option<Profile>> {
        let mut table = self.table.write().await;
        Ok(table.rows.get_mut(&id).map(|row| {
            row.profile.verified = verified.clone();
            row.profile.updated_at = Utc::now();
            row.profile.clone()
        }))
    }

    async fn get_profile(&self, id: ProfileId) -> StoreResult<Option<Profile>> {
        let table = self.table.read().await;
        Ok(table.rows.get(&id).map(|row| row.profile.clone()))
    }

    async fn find_by_pan(
        &self,
        normalized_pan: &str,
        exclude: Option<ProfileId>,
    ) -> StoreResult<Vec<Profile>> {
        let table = self.table.read().await;
        Ok(table
            .rows
            .values()
            .filter(|row| Some(row.profile.id) != exclude)
            .filter(|row| {
                pan::find_pan(&row.profile.details).map(pan::normalize).as_deref()
                    == Some(normalized_pan)
            })
            .map(|row| row.profile.clone())
            .collect())
    }
}

// =============================================================================
// FIELD CATALOG
// =============================================================================

#[derive(Default)]
struct FieldTable {
    last_id: FieldId,
    rows: Vec<Field>,
}

/// Field catalog kept in creation order
#[derive(Default)]
pub struct MemoryFieldCatalog {
    table: RwLock<FieldTable>,
}

impl MemoryFieldCatalog {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl FieldCatalogStore for MemoryFieldCatalog {
    async fn list_fields(&self) -> StoreResult<Vec<Field>> {
        Ok(self.table.read().await.rows.clone())
    }

    async fn insert_field(&self, name: &str, section_category: &str) -> StoreResult<Field> {
        let mut table = self.table.write().await;
        if table.rows.iter().any(|f| f.name == name) {
            return Err(StoreError::DuplicateFieldName {
                name: name.to_string(),
            });
        }
        table.last_id += 1;
        let field = Field {
            id: table.last_id,
            name: name.to_string(),
            section_category: section_category.to_string(),
        };
        table.rows.push(field.clone());
        Ok(field)
    }

    async fn rename_field(&self, id: FieldId, name: &str) -> StoreResult<Option<Field>> {
        let mut table = self.table.write().await;
        if table.rows.iter().any(|f| f.id != id && f.name == name) {
            return Err(StoreError::DuplicateFieldName {
                name: name.to_string(),
            });
        }
        Ok(table.rows.iter_mut().find(|f| f.id == id).map(|field| {
            field.name = name.to_string();
            field.clone()
        }))
    }

    async fn delete_field(&self, id: FieldId) -> StoreResult<()> {
        self.table.write().await.rows.retain(|f| f.id != id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn details(json: &str) -> ProfileDetails {
        serde_json::from_str(json).unwrap()
    }

    #[tokio::test]
    async fn test_ids_are_sequential() {
        let store = MemoryProfileStore::new();
        let a = store.insert_profile(&details(r#"{"S": {"Name": "A"}}"#)).await.unwrap();
        let b = store.insert_profile(&details(r#"{"S": {"Name": "B"}}"#)).await.unwrap();
        assert_eq!((a.id, b.id), (1, 2));
        assert!(a.verified.is_empty());
    }

    #[tokio::test]
    async fn test_constraint_rejects_normalized_duplicate() {
        let store = MemoryProfileStore::new();
        store
            .insert_profile(&details(r#"{"S": {"PAN": " abcde1234f "}}"#))
            .await
            .unwrap();

        let err = store
            .insert_profile(&details(r#"{"Other": {"pan number": "ABCDE1234F"}}"#))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::PanTaken { ref masked_pan } if masked_pan == "******234F"));
    }

    #[tokio::test]
    async fn test_update_excludes_self() {
        let store = MemoryProfileStore::new();
        let p = store
            .insert_profile(&details(r#"{"S": {"PAN": "ABCDE1234F", "Name": "A"}}"#))
            .await
            .unwrap();

        let updated = store
            .update_details(p.id, &details(r#"{"S": {"PAN": "abcde1234f", "Name": "B"}}"#))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.details.field("S", "Name"), Some(&"B".to_string()));
        assert!(updated.updated_at >= p.updated_at);
    }

    #[tokio::test]
    async fn test_update_unknown_id() {
        let store = MemoryProfileStore::new();
        let result = store
            .update_details(99, &details(r#"{"S": {"Name": "A"}}"#))
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_profiles_without_pan_do_not_collide() {
        let store = MemoryProfileStore::new();
        store.insert_profile(&details(r#"{"S": {"PAN": ""}}"#)).await.unwrap();
        store.insert_profile(&details(r#"{"S": {"PAN": "  "}}"#)).await.unwrap();
        store.insert_profile(&details(r#"{"S": {"Name": "x"}}"#)).await.unwrap();
        assert!(store.get_profile(3).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_find_by_pan_respects_exclude() {
        let store = MemoryProfileStore::new();
        let p = store
            .insert_profile(&details(r#"{"S": {"PAN": "abcde1234f"}}"#))
            .await
            .unwrap();
        assert_eq!(store.find_by_pan("ABCDE1234F", None).await.unwrap().len(), 1);
        assert!(!store.pan_in_use("ABCDE1234F", Some(p.id)).await.unwrap());
        assert!(store.pan_in_use("ABCDE1234F", None).await.unwrap());
    }

    #[tokio::test]
    async fn test_field_catalog_crud() {
        let catalog = MemoryFieldCatalog::new();
        let pan = catalog.insert_field("PAN", "Personal").await.unwrap();
        catalog.insert_field("Email", "Contact").await.unwrap();

        let dup = catalog.insert_field("PAN", "Contact").await;
        assert!(matches!(dup, Err(StoreError::DuplicateFieldName { .. })));

        // case-sensitive
        catalog.insert_field("pan", "Personal").await.unwrap();

        let renamed = catalog.rename_field(pan.id, "PAN Number").await.unwrap().unwrap();
        assert_eq!(renamed.name, "PAN Number");
        assert!(catalog.rename_field(42, "X").await.unwrap().is_none());
        assert!(matches!(
            catalog.rename_field(pan.id, "Email").await,
            Err(StoreError::DuplicateFieldName { .. })
        ));

        catalog.delete_field(pan.id).await.unwrap();
        catalog.delete_field(pan.id).await.unwrap();
        let names: Vec<String> = catalog
            .list_fields()
            .await
            .unwrap()
            .into_iter()
            .map(|f| f.name)
            .collect();
        assert_eq!(names, vec!["Email", "pan"]);
    }
}
