//! Field catalog
//!
//! Admin-managed list of `(name, section_category)` pairs. The catalog decides
//! which sections a Maker sees and which fields each section holds.

use crate::error::{KycError, KycResult};
use crate::sections::{OrderedMap, ProfileDetails};
use crate::store::FieldCatalogStore;
use crate::validation::{FieldError, FieldRule};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

pub type FieldId = i64;

/// Catalog entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub id: FieldId,
    pub name: String,
    pub section_category: String,
}

// =============================================================================
// SECTION LAYOUT
// =============================================================================

/// Section name -> field names, in the order a Maker walks through them
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SectionLayout(OrderedMap<Vec<String>>);

impl SectionLayout {
    /// Group catalog fields by section, in creation order.
    ///
    /// Fields with a blank section are unassigned and left out.
    pub fn from_fields(fields: &[Field]) -> Self {
        let mut sections: OrderedMap<Vec<String>> = OrderedMap::new();
        for field in fields {
            let section = field.section_category.trim();
            if section.is_empty() {
                continue;
            }
            sections
                .get_or_insert_with(section, Vec::new)
                .push(field.name.clone());
        }
        Self(sections)
    }

    /// Layout implied by an existing profile's details
    pub fn from_details(details: &ProfileDetails) -> Self {
        Self(
            details
                .iter()
                .map(|(section, fields)| {
                    let names: Vec<String> = fields.keys().map(str::to_string).collect();
                    (section, names)
                })
                .collect(),
        )
    }

    /// Build from explicit `(section, fields)` pairs, dropping empty sections.
    pub fn from_sections<S, F>(sections: impl IntoIterator<Item = (S, Vec<F>)>) -> Self
    where
        S: Into<String>,
        F: Into<String>,
    {
        Self(
            sections
                .into_iter()
                .filter(|(_, fields)| !fields.is_empty())
                .map(|(s, fields)| {
                    let names: Vec<String> = fields.into_iter().map(Into::into).collect();
                    (s, names)
                })
                .collect(),
        )
    }

    pub fn is_empty(&self) -> bool {
        self.0.values().all(Vec::is_empty)
    }

    /// Sections that actually carry fields
    pub fn sections(&self) -> Vec<&str> {
        self.0
            .iter()
            .filter(|(_, fields)| !fields.is_empty())
            .map(|(section, _)| section)
            .collect()
    }

    pub fn fields(&self, section: &str) -> &[String] {
        self.0.get(section).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn contains(&self, section: &str, field: &str) -> bool {
        self.fields(section).iter().any(|f| f == field)
    }
}

// =============================================================================
// SERVICE
// =============================================================================

/// Catalog operations for the admin surface
#[derive(Clone)]
pub struct FieldCatalog {
    store: Arc<dyn FieldCatalogStore>,
}

impl FieldCatalog {
    pub fn new(store: Arc<dyn FieldCatalogStore>) -> Self {
        Self { store }
    }

    pub async fn list(&self) -> KycResult<Vec<Field>> {
        Ok(self.store.list_fields().await?)
    }

    /// Case-insensitive substring search over field names
    pub async fn search(&self, query: &str) -> KycResult<Vec<Field>> {
        let needle = query.trim().to_lowercase();
        let fields = self.list().await?;
        if needle.is_empty() {
            return Ok(fields);
        }
        Ok(fields
            .into_iter()
            .filter(|f| f.name.to_lowercase().contains(&needle))
            .collect())
    }

    pub async fn create(&self, name: &str, section_category: &str) -> KycResult<Field> {
        let name = required_name(name, section_category)?;
        let field = self
            .store
            .insert_field(name, section_category.trim())
            .await?;
        info!(field_id = field.id, name = %field.name, section = %field.section_category, "Created catalog field");
        Ok(field)
    }

    pub async fn rename(&self, id: FieldId, name: &str) -> KycResult<Field> {
        let name = required_name(name, "")?;
        let field = self
            .store
            .rename_field(id, name)
            .await?
            .ok_or_else(|| KycError::not_found("field", id))?;
        info!(field_id = id, name = %field.name, "Renamed catalog field");
        Ok(field)
    }

    pub async fn delete(&self, id: FieldId) -> KycResult<()> {
        self.store.delete_field(id).await?;
        info!(field_id = id, "Deleted catalog field");
        Ok(())
    }

    /// Current section layout derived from the catalog
    pub async fn layout(&self) -> KycResult<SectionLayout> {
        Ok(SectionLayout::from_fields(&self.list().await?))
    }
}

fn required_name<'a>(name: &'a str, section: &str) -> KycResult<&'a str> {
    let name = name.trim();
    if name.is_empty() {
        return Err(KycError::Validation(
            FieldError::new(section, "name", FieldRule::Required).into(),
        ));
    }
    Ok(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryFieldCatalog;

    fn catalog() -> FieldCatalog {
        FieldCatalog::new(Arc::new(MemoryFieldCatalog::new()))
    }

    #[tokio::test]
    async fn test_create_conflict_is_distinct() {
        let catalog = catalog();
        catalog.create("PAN", "Personal").await.unwrap();
        let err = catalog.create(" PAN ", "Contact").await.unwrap_err();
        assert!(matches!(err, KycError::Conflict { .. }));

        let err = catalog.create("   ", "Contact").await.unwrap_err();
        assert!(matches!(err, KycError::Validation(_)));
    }

    #[tokio::test]
    async fn test_rename_unknown_is_not_found() {
        let err = catalog().rename(7, "Name").await.unwrap_err();
        assert!(matches!(err, KycError::NotFound { entity: "field", .. }));
    }

    #[tokio::test]
    async fn test_layout_groups_by_section_in_creation_order() {
        let catalog = catalog();
        catalog.create("Name", "Personal").await.unwrap();
        catalog.create("Email", "Contact").await.unwrap();
        catalog.create("PAN", "Personal").await.unwrap();
        catalog.create("Unassigned", " ").await.unwrap();

        let layout = catalog.layout().await.unwrap();
        assert_eq!(layout.sections(), vec!["Personal", "Contact"]);
        assert_eq!(layout.fields("Personal"), ["Name", "PAN"]);
        assert!(layout.contains("Contact", "Email"));
        assert!(!layout.contains("Contact", "Unassigned"));
    }

    #[tokio::test]
    async fn test_search_is_case_insensitive() {
        let catalog = catalog();
        catalog.create("PAN Number", "Personal").await.unwrap();
        catalog.create("Email", "Contact").await.unwrap();

        let hits = catalog.search("pan").await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, "PAN Number");
        assert_eq!(catalog.search("").await.unwrap().len(), 2);
    }

    #[test]
    fn test_layout_from_sections_drops_empty() {
        let layout = SectionLayout::from_sections(vec![
            ("A", vec!["Name"]),
            ("B", vec![]),
            ("C", vec!["PAN"]),
        ]);
        assert_eq!(layout.sections(), vec!["A", "C"]);
        assert!(SectionLayout::default().is_empty());
    }
}
