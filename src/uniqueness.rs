//! PAN uniqueness enforcement
//!
//! The check runs before every profile write so the caller gets a clean
//! `Conflict` without touching the store. It is check-then-act and therefore
//! advisory; the store's own constraint settles races and surfaces through the
//! same error.

use crate::error::{KycError, KycResult};
use crate::pan;
use crate::store::{ProfileId, ProfileStore, StoreError};
use std::sync::Arc;
use tracing::warn;

const CREATE_CONFLICT: &str = "A profile with this PAN number already exists.";
const UPDATE_CONFLICT: &str = "This PAN number is already assigned to another profile.";

/// Conflict message for a write, depending on whether it is an update
pub fn conflict_message(exclude_id: Option<ProfileId>) -> &'static str {
    match exclude_id {
        Some(_) => UPDATE_CONFLICT,
        None => CREATE_CONFLICT,
    }
}

/// Decides whether a normalized PAN is free for a given profile
#[derive(Clone)]
pub struct UniquenessEnforcer {
    store: Arc<dyn ProfileStore>,
}

impl UniquenessEnforcer {
    pub fn new(store: Arc<dyn ProfileStore>) -> Self {
        Self { store }
    }

    /// Whether a profile other than `exclude_id` already holds `normalized_pan`.
    pub async fn check_conflict(
        &self,
        normalized_pan: &str,
        exclude_id: Option<ProfileId>,
    ) -> KycResult<bool> {
        Ok(self.store.pan_in_use(normalized_pan, exclude_id).await?)
    }

    /// `Conflict` when the PAN is taken, `Ok` otherwise.
    pub async fn ensure_available(
        &self,
        normalized_pan: &str,
        exclude_id: Option<ProfileId>,
    ) -> KycResult<()> {
        if self.check_conflict(normalized_pan, exclude_id).await? {
            warn!(
                pan = %pan::mask(normalized_pan),
                exclude_id = ?exclude_id,
                "Rejected profile write: duplicate PAN"
            );
            return Err(KycError::conflict(conflict_message(exclude_id)));
        }
        Ok(())
    }

    /// Translate a store error from the write itself.
    ///
    /// A constraint violation here means another writer won the race after
    /// `ensure_available` passed.
    pub fn write_error(err: StoreError, exclude_id: Option<ProfileId>) -> KycError {
        match err {
            StoreError::PanTaken { masked_pan } => {
                warn!(pan = %masked_pan, exclude_id = ?exclude_id, "PAN constraint violated on write");
                KycError::conflict(conflict_message(exclude_id))
            }
            other => other.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sections::ProfileDetails;
    use crate::store::MemoryProfileStore;

    async fn seeded() -> (UniquenessEnforcer, ProfileId) {
        let store = Arc::new(MemoryProfileStore::new());
        let details: ProfileDetails =
            serde_json::from_str(r#"{"Personal": {"PAN": " abcde1234f "}}"#).unwrap();
        let profile = store.insert_profile(&details).await.unwrap();
        (UniquenessEnforcer::new(store), profile.id)
    }

    #[tokio::test]
    async fn test_stored_pan_is_normalized_before_comparison() {
        let (enforcer, _) = seeded().await;
        assert!(enforcer.check_conflict("ABCDE1234F", None).await.unwrap());
        assert!(!enforcer.check_conflict("ZZZZZ9999Z", None).await.unwrap());
    }

    #[tokio::test]
    async fn test_exclude_id_skips_own_profile() {
        let (enforcer, id) = seeded().await;
        assert!(!enforcer.check_conflict("ABCDE1234F", Some(id)).await.unwrap());
        assert!(enforcer.ensure_available("ABCDE1234F", Some(id)).await.is_ok());
    }

    #[tokio::test]
    async fn test_messages_differ_for_create_and_update() {
        let (enforcer, id) = seeded().await;
        let create = enforcer.ensure_available("ABCDE1234F", None).await.unwrap_err();
        assert_eq!(create.to_string(), format!("Conflict: {}", CREATE_CONFLICT));

        let update = enforcer
            .ensure_available("ABCDE1234F", Some(id + 1))
            .await
            .unwrap_err();
        assert_eq!(update.to_string(), format!("Conflict: {}", UPDATE_CONFLICT));
    }

    #[test]
    fn test_write_error_maps_constraint_to_conflict() {
        let err = UniquenessEnforcer::write_error(
            StoreError::PanTaken {
                masked_pan: "******234F".into(),
            },
            None,
        );
        assert!(matches!(err, KycError::Conflict { .. }));
    }
}
