//! KYC Portal - maker-checker-reporter profiles with PAN deduplication
//!
//! Profiles are schema-less `section -> field -> value` records whose sections
//! come from an admin-managed field catalog. One field, the PAN, must be unique
//! across all profiles after normalization (uppercase, trimmed).
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use kyc_portal::sections::ProfileDetails;
//! use kyc_portal::store::MemoryProfileStore;
//! use kyc_portal::workflow::ProfileService;
//! use std::sync::Arc;
//!
//! # async fn run() -> kyc_portal::KycResult<()> {
//! let service = ProfileService::new(Arc::new(MemoryProfileStore::new()));
//! let mut details = ProfileDetails::new();
//! details.set_field("Personal", "PAN", "abcde1234f".to_string());
//! let profile = service.create_profile(&details).await?;
//! assert_eq!(service.fetch_by_pan("ABCDE1234F").await?[0].id, profile.id);
//! # Ok(())
//! # }
//! ```

// Core error handling
pub mod error;

// Profile data model
pub mod pan;
pub mod sections;
pub mod validation;

// Field catalog and section layout
pub mod catalog;

// Persistence
pub mod store;
pub mod uniqueness;

// Maker / Checker / Reporter
pub mod report;
pub mod workflow;

pub mod config;

// Database integration (when enabled)
#[cfg(feature = "database")]
pub mod database;

// REST API (when enabled)
#[cfg(feature = "server")]
pub mod api;

pub use catalog::{Field, FieldCatalog, SectionLayout};
pub use config::PortalConfig;
pub use error::{KycError, KycResult};
pub use report::{ProfileReport, VerificationStatus, VerificationSummary};
pub use sections::{OrderedMap, ProfileDetails, VerificationMap};
pub use store::{Profile, ProfileId, ProfileStore};
pub use workflow::{ProfileService, WorkflowCoordinator, WorkflowSession, WorkflowStage};

#[cfg(feature = "database")]
pub use database::{DatabaseConfig, DatabaseManager};
