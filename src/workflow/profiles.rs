//! Profile Service - create, update, verify and look up KYC profiles
//!
//! Every write resolves the profile's PAN, normalizes it and asks the
//! uniqueness enforcer before touching the store. Field-rule validation is the
//! workflow's job; this layer only rejects structurally unusable details.

use crate::error::{KycError, KycResult};
use crate::pan;
use crate::report::ProfileReport;
use crate::sections::{ProfileDetails, VerificationMap};
use crate::store::{Profile, ProfileId, ProfileStore};
use crate::uniqueness::UniquenessEnforcer;
use crate::validation::validate_structure;
use std::sync::Arc;
use tracing::{debug, info};

/// Profile operations backed by a `ProfileStore`
#[derive(Clone)]
pub struct ProfileService {
    store: Arc<dyn ProfileStore>,
    enforcer: UniquenessEnforcer,
}

impl ProfileService {
    pub fn new(store: Arc<dyn ProfileStore>) -> Self {
        Self {
            enforcer: UniquenessEnforcer::new(store.clone()),
            store,
        }
    }

    /// Persist a new profile with an empty `verified` map.
    pub async fn create_profile(&self, details: &ProfileDetails) -> KycResult<Profile> {
        validate_structure(details)?;

        let normalized = pan::resolve_normalized(details);
        if let Some(pan) = normalized.as_deref() {
            self.enforcer.ensure_available(pan, None).await?;
        }

        let profile = self
            .store
            .insert_profile(details)
            .await
            .map_err(|e| UniquenessEnforcer::write_error(e, None))?;

        info!(
            profile_id = profile.id,
            pan = %normalized.as_deref().map(pan::mask).unwrap_or_default(),
            "Created KYC profile"
        );
        Ok(profile)
    }

    /// Replace a profile's details. `verified` is left as it was.
    pub async fn update_profile(&self, id: ProfileId, details: &ProfileDetails) -> KycResult<Profile> {
        validate_structure(details)?;

        let normalized = pan::resolve_normalized(details);
        if let Some(pan) = normalized.as_deref() {
            self.enforcer.ensure_available(pan, Some(id)).await?;
        }

        let profile = self
            .store
            .update_details(id, details)
            .await
            .map_err(|e| UniquenessEnforcer::write_error(e, Some(id)))?
            .ok_or_else(|| KycError::not_found("profile", id))?;

        info!(
            profile_id = id,
            pan = %normalized.as_deref().map(pan::mask).unwrap_or_default(),
            "Updated KYC profile"
        );
        Ok(profile)
    }

    /// Replace the checker's decisions wholesale.
    ///
    /// Fields the caller leaves out become pending again.
    pub async fn record_verification(
        &self,
        id: ProfileId,
        verified: &VerificationMap,
    ) -> KycResult<Profile> {
        let profile = self
            .store
            .replace_verified(id, verified)
            .await?
            .ok_or_else(|| KycError::not_found("profile", id))?;

        info!(
            profile_id = id,
            decisions = verified.field_count(),
            "Recorded verification"
        );
        Ok(profile)
    }

    pub async fn fetch_by_id(&self, id: ProfileId) -> KycResult<Option<Profile>> {
        Ok(self.store.get_profile(id).await?)
    }

    /// Like `fetch_by_id`, but an unknown id is an error.
    pub async fn require(&self, id: ProfileId) -> KycResult<Profile> {
        self.fetch_by_id(id)
            .await?
            .ok_or_else(|| KycError::not_found("profile", id))
    }

    /// Profiles whose PAN matches `raw_pan` after normalization, ordered by id.
    pub async fn fetch_by_pan(&self, raw_pan: &str) -> KycResult<Vec<Profile>> {
        let normalized = pan::normalize(raw_pan);
        if normalized.is_empty() {
            return Ok(Vec::new());
        }
        let profiles = self.store.find_by_pan(&normalized, None).await?;
        debug!(pan = %pan::mask(&normalized), matches = profiles.len(), "Looked up profiles by PAN");
        Ok(profiles)
    }

    /// Resolved reports for every profile matching `raw_pan`
    pub async fn generate_report(&self, raw_pan: &str) -> KycResult<Vec<ProfileReport>> {
        Ok(self
            .fetch_by_pan(raw_pan)
            .await?
            .iter()
            .map(ProfileReport::from_profile)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::VerificationStatus;
    use crate::store::MemoryProfileStore;
    use proptest::prelude::*;

    fn service() -> ProfileService {
        ProfileService::new(Arc::new(MemoryProfileStore::new()))
    }

    fn details(json: &str) -> ProfileDetails {
        serde_json::from_str(json).unwrap()
    }

    #[tokio::test]
    async fn test_case_and_whitespace_variants_conflict() {
        let service = service();
        service
            .create_profile(&details(r#"{"Personal": {"PAN": " abcde1234f "}}"#))
            .await
            .unwrap();

        let err = service
            .create_profile(&details(r#"{"Personal": {"PAN": "ABCDE1234F"}}"#))
            .await
            .unwrap_err();
        assert!(matches!(err, KycError::Conflict { .. }));
    }

    #[tokio::test]
    async fn test_update_does_not_conflict_with_itself() {
        let service = service();
        let profile = service
            .create_profile(&details(r#"{"Personal": {"PAN": "ABCDE1234F", "Name": "A"}}"#))
            .await
            .unwrap();

        let updated = service
            .update_profile(
                profile.id,
                &details(r#"{"Personal": {"PAN": "abcde1234f", "Name": "Renamed"}}"#),
            )
            .await
            .unwrap();
        assert_eq!(updated.details.field("Personal", "Name").unwrap(), "Renamed");
    }

    #[tokio::test]
    async fn test_update_onto_another_pan_conflicts() {
        let service = service();
        service
            .create_profile(&details(r#"{"Personal": {"PAN": "ABCDE1234F"}}"#))
            .await
            .unwrap();
        let second = service
            .create_profile(&details(r#"{"Personal": {"PAN": "ZZZZZ9999Z"}}"#))
            .await
            .unwrap();

        let err = service
            .update_profile(second.id, &details(r#"{"Personal": {"PAN": "abcde1234f"}}"#))
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Conflict: This PAN number is already assigned to another profile."
        );
    }

    #[tokio::test]
    async fn test_update_unknown_profile() {
        let err = service()
            .update_profile(42, &details(r#"{"Personal": {"Name": "A"}}"#))
            .await
            .unwrap_err();
        assert!(matches!(err, KycError::NotFound { entity: "profile", .. }));
    }

    #[tokio::test]
    async fn test_verification_is_replaced_not_merged() {
        let service = service();
        let profile = service
            .create_profile(&details(r#"{"SectionX": {"fieldY": "a", "fieldZ": "b"}}"#))
            .await
            .unwrap();

        let first: VerificationMap =
            serde_json::from_str(r#"{"SectionX": {"fieldY": true, "fieldZ": false}}"#).unwrap();
        service.record_verification(profile.id, &first).await.unwrap();

        let second: VerificationMap =
            serde_json::from_str(r#"{"SectionX": {"fieldY": true}}"#).unwrap();
        let stored = service.record_verification(profile.id, &second).await.unwrap();

        assert_eq!(stored.verified.field("SectionX", "fieldY"), Some(&true));
        assert_eq!(stored.verified.field("SectionX", "fieldZ"), None);
    }

    #[tokio::test]
    async fn test_structure_is_checked_before_the_store() {
        let err = service().create_profile(&ProfileDetails::new()).await.unwrap_err();
        assert!(matches!(err, KycError::Validation(_)));
    }

    #[tokio::test]
    async fn test_report_lookup_normalizes() {
        let service = service();
        let profile = service
            .create_profile(&details(r#"{"Personal": {"PAN": "abcde1234f", "Name": "A"}}"#))
            .await
            .unwrap();

        let reports = service.generate_report("  ABCDE1234F").await.unwrap();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].profile_id, profile.id);
        assert_eq!(
            reports[0].status("Personal", "Name"),
            Some(VerificationStatus::Pending)
        );
        assert!(service.fetch_by_pan("   ").await.unwrap().is_empty());
    }

    proptest! {
        #[test]
        fn prop_created_profiles_never_share_a_pan(pans in proptest::collection::vec("[a-cA-C ]{1,4}", 1..8)) {
            let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
            rt.block_on(async {
                let service = service();
                let mut accepted: Vec<String> = Vec::new();
                for raw in &pans {
                    let mut d = ProfileDetails::new();
                    d.set_field("Personal", "PAN", raw.clone());
                    if service.create_profile(&d).await.is_ok() {
                        if let Some(n) = pan::resolve_normalized(&d) {
                            accepted.push(n);
                        }
                    }
                }
                let mut deduped = accepted.clone();
                deduped.sort();
                deduped.dedup();
                prop_assert_eq!(deduped.len(), accepted.len());
                Ok::<(), TestCaseError>(())
            })?;
        }
    }
}
