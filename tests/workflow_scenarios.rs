//! End-to-end workflow scenarios against the in-memory stores
//!
//! These exercise the public crate API the way the HTTP layer does: profile
//! writes through `ProfileService`, Maker/Checker/Reporter through the
//! coordinator.

use chrono::Duration;
use kyc_portal::store::{MemoryFieldCatalog, MemoryProfileStore};
use kyc_portal::workflow::{ProfileService, SessionStore, WorkflowCoordinator, WorkflowStage};
use kyc_portal::{FieldCatalog, KycError, ProfileDetails, VerificationMap, VerificationStatus};
use std::sync::Arc;

// =========================================================================
// HELPERS
// =========================================================================

fn details(json: &str) -> ProfileDetails {
    serde_json::from_str(json).unwrap()
}

async fn portal() -> WorkflowCoordinator {
    let catalog = FieldCatalog::new(Arc::new(MemoryFieldCatalog::new()));
    for (name, section) in [
        ("Full Name", "Personal Information"),
        ("PAN Number", "Personal Information"),
        ("Date of Birth", "Personal Information"),
        ("Aadhaar", "Identity"),
        ("Mobile", "Contact"),
        ("Email", "Contact"),
    ] {
        catalog.create(name, section).await.unwrap();
    }
    WorkflowCoordinator::new(
        ProfileService::new(Arc::new(MemoryProfileStore::new())),
        catalog,
        SessionStore::new(Duration::minutes(30)),
    )
}

// =========================================================================
// PROFILE SERVICE
// =========================================================================

#[tokio::test]
async fn create_conflict_then_fetch_by_pan() {
    let service = ProfileService::new(Arc::new(MemoryProfileStore::new()));

    let first = service
        .create_profile(&details(r#"{"Personal": {"PAN": "abcde1234f", "Name": "A"}}"#))
        .await
        .unwrap();
    assert_eq!(first.id, 1);
    assert!(first.verified.is_empty());

    let err = service
        .create_profile(&details(r#"{"Personal": {"PAN": "ABCDE1234F", "Name": "B"}}"#))
        .await
        .unwrap_err();
    assert!(matches!(err, KycError::Conflict { .. }));

    let found = service.fetch_by_pan("abcde1234f").await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id, 1);
    assert_eq!(found[0].details.field("Personal", "Name").unwrap(), "A");
}

#[tokio::test]
async fn pan_field_in_any_section_is_deduplicated() {
    let service = ProfileService::new(Arc::new(MemoryProfileStore::new()));
    service
        .create_profile(&details(r#"{"Tax": {"pan number": "ZZZZZ9999Z"}}"#))
        .await
        .unwrap();

    let err = service
        .create_profile(&details(
            r#"{"Personal": {"Name": "B"}, "Identity": {"PAN": " zzzzz9999z"}}"#,
        ))
        .await
        .unwrap_err();
    assert!(matches!(err, KycError::Conflict { .. }));
}

#[tokio::test]
async fn first_pan_in_order_wins() {
    let service = ProfileService::new(Arc::new(MemoryProfileStore::new()));
    service
        .create_profile(&details(
            r#"{"A": {"PAN": "AAAAA1111A"}, "B": {"PAN": "BBBBB2222B"}}"#,
        ))
        .await
        .unwrap();

    // The second PAN was never the profile's PAN, so it is still free.
    service
        .create_profile(&details(r#"{"C": {"PAN": "BBBBB2222B"}}"#))
        .await
        .unwrap();
    assert!(service
        .create_profile(&details(r#"{"C": {"PAN": "aaaaa1111a"}}"#))
        .await
        .is_err());
}

#[tokio::test]
async fn profiles_without_pan_never_conflict() {
    let service = ProfileService::new(Arc::new(MemoryProfileStore::new()));
    for _ in 0..3 {
        service
            .create_profile(&details(r#"{"Personal": {"Name": "No PAN", "PAN": "  "}}"#))
            .await
            .unwrap();
    }
    assert!(service.fetch_by_pan("").await.unwrap().is_empty());
}

#[tokio::test]
async fn verification_replacement_clears_untouched_fields() {
    let service = ProfileService::new(Arc::new(MemoryProfileStore::new()));
    let profile = service
        .create_profile(&details(r#"{"SectionX": {"fieldY": "1", "fieldZ": "2"}}"#))
        .await
        .unwrap();

    let full: VerificationMap =
        serde_json::from_str(r#"{"SectionX": {"fieldY": true, "fieldZ": false}}"#).unwrap();
    service.record_verification(profile.id, &full).await.unwrap();

    let partial: VerificationMap =
        serde_json::from_str(r#"{"SectionX": {"fieldY": true}}"#).unwrap();
    service.record_verification(profile.id, &partial).await.unwrap();

    let reports = service.generate_report("").await.unwrap();
    assert!(reports.is_empty());

    let stored = service.fetch_by_id(profile.id).await.unwrap().unwrap();
    assert_eq!(stored.verified.field("SectionX", "fieldZ"), None);

    let missing = service.record_verification(99, &partial).await.unwrap_err();
    assert!(matches!(missing, KycError::NotFound { .. }));
}

// =========================================================================
// WORKFLOW
// =========================================================================

#[tokio::test]
async fn maker_checker_reporter_round_trip() {
    let portal = portal().await;
    let session = portal.start_session(None).await.unwrap();
    assert_eq!(
        session.sections(),
        vec!["Personal Information", "Identity", "Contact"]
    );
    let id = session.session_id;

    for (section, field, value) in [
        ("Personal Information", "Full Name", "Asha Rao"),
        ("Personal Information", "PAN Number", "ABCDE1234F"),
        ("Personal Information", "Date of Birth", "1990-02-28"),
        ("Identity", "Aadhaar", "123456789012"),
        ("Contact", "Mobile", "9876543210"),
        ("Contact", "Email", "asha@example.in"),
    ] {
        portal.set_field(id, section, field, value).await.unwrap();
    }
    portal.next_section(id).await.unwrap();
    portal.next_section(id).await.unwrap();
    assert_eq!(portal.session(id).await.unwrap().active_section, "Contact");

    let session = portal.submit(id).await.unwrap();
    assert_eq!(session.stage, WorkflowStage::Submitted);

    portal
        .set_verified(id, "Personal Information", "PAN Number", true)
        .await
        .unwrap();
    portal
        .set_verified(id, "Identity", "Aadhaar", false)
        .await
        .unwrap();
    portal.submit_verification(id).await.unwrap();

    let reports = portal.report_by_pan(" abcde1234f ").await.unwrap();
    assert_eq!(reports.len(), 1);
    let report = &reports[0];
    assert_eq!(
        report.status("Personal Information", "PAN Number"),
        Some(VerificationStatus::Verified)
    );
    assert_eq!(
        report.status("Identity", "Aadhaar"),
        Some(VerificationStatus::NotVerified)
    );
    assert_eq!(
        report.status("Contact", "Email"),
        Some(VerificationStatus::Pending)
    );
    assert_eq!(report.summary.total, 6);
    assert_eq!(report.summary.verified, 1);
    assert_eq!(report.summary.not_verified, 5);
}

#[tokio::test]
async fn invalid_values_are_reported_per_field() {
    let portal = portal().await;
    let id = portal.start_session(None).await.unwrap().session_id;
    portal
        .set_field(id, "Personal Information", "PAN Number", "abcde1234f")
        .await
        .unwrap();
    portal
        .set_field(id, "Identity", "Aadhaar", "12345")
        .await
        .unwrap();

    let err = portal.submit(id).await.unwrap_err();
    let errors = err.field_errors().unwrap();
    assert!(errors
        .for_field("Personal Information", "PAN Number")
        .is_some());
    assert!(errors.for_field("Identity", "Aadhaar").is_some());
    assert!(errors.for_field("Contact", "Email").is_some());
    assert!(errors
        .for_field("Personal Information", "Date of Birth")
        .is_some());
    assert!(portal
        .profiles()
        .fetch_by_pan("ABCDE1234F")
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn correction_loop_updates_the_same_profile() {
    let portal = portal().await;
    let id = portal.start_session(None).await.unwrap().session_id;
    for (section, field, value) in [
        ("Personal Information", "Full Name", "Asha Rao"),
        ("Personal Information", "PAN Number", "ABCDE1234F"),
        ("Personal Information", "Date of Birth", "1990-02-28"),
        ("Identity", "Aadhaar", "123456789012"),
        ("Contact", "Mobile", "9876543210"),
        ("Contact", "Email", "asha@example.in"),
    ] {
        portal.set_field(id, section, field, value).await.unwrap();
    }
    let profile_id = portal.submit(id).await.unwrap().profile_id.unwrap();

    // A checker opens the stored profile in a fresh session and sends it back.
    let checker = portal.open_profile(profile_id).await.unwrap().session_id;
    portal.edit(checker, Some("Contact")).await.unwrap();
    portal
        .set_field(checker, "Contact", "Mobile", "9123456780")
        .await
        .unwrap();
    let session = portal.submit(checker).await.unwrap();
    assert_eq!(session.profile_id, Some(profile_id));

    let stored = portal.profiles().require(profile_id).await.unwrap();
    assert_eq!(stored.details.field("Contact", "Mobile").unwrap(), "9123456780");
    assert_eq!(
        portal.profiles().fetch_by_pan("ABCDE1234F").await.unwrap().len(),
        1
    );
}
