//! Report view of a profile
//!
//! Resolves each field's verification tri-state into a display status and
//! counts the checker's progress. Export formats (spreadsheet, PDF, CSV) are
//! plain serializers over `ProfileReport` and live outside this crate.

use crate::sections::{ProfileDetails, VerificationMap};
use crate::store::{Profile, ProfileId};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

/// Checker decision for one field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    Verified,
    NotVerified,
    Pending,
}

impl VerificationStatus {
    /// `true` / `false` / absent
    pub fn resolve(verified: &VerificationMap, section: &str, field: &str) -> Self {
        match verified.field(section, field) {
            Some(true) => Self::Verified,
            Some(false) => Self::NotVerified,
            None => Self::Pending,
        }
    }
}

impl fmt::Display for VerificationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Verified => write!(f, "Verified"),
            Self::NotVerified => write!(f, "Not Verified"),
            Self::Pending => write!(f, "Pending"),
        }
    }
}

/// Checker progress over the fields present in `details`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct VerificationSummary {
    pub total: usize,
    pub verified: usize,
    /// Everything not explicitly verified, pending fields included
    pub not_verified: usize,
}

impl VerificationSummary {
    pub fn compute(details: &ProfileDetails, verified: &VerificationMap) -> Self {
        let mut summary = Self::default();
        for (section, fields) in details.iter() {
            for (field, _) in fields.iter() {
                summary.total += 1;
                if verified.field(section, field) == Some(&true) {
                    summary.verified += 1;
                }
            }
        }
        summary.not_verified = summary.total - summary.verified;
        summary
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportRow {
    pub field: String,
    pub value: String,
    pub status: VerificationStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportSection {
    pub section: String,
    pub rows: Vec<ReportRow>,
}

/// Fully resolved report for one profile
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProfileReport {
    pub profile_id: ProfileId,
    pub sections: Vec<ReportSection>,
    pub summary: VerificationSummary,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProfileReport {
    pub fn from_profile(profile: &Profile) -> Self {
        let sections = profile
            .details
            .iter()
            .map(|(section, fields)| ReportSection {
                section: section.to_string(),
                rows: fields
                    .iter()
                    .map(|(field, value)| ReportRow {
                        field: field.to_string(),
                        value: value.clone(),
                        status: VerificationStatus::resolve(&profile.verified, section, field),
                    })
                    .collect(),
            })
            .collect();

        Self {
            profile_id: profile.id,
            sections,
            summary: VerificationSummary::compute(&profile.details, &profile.verified),
            created_at: profile.created_at,
            updated_at: profile.updated_at,
        }
    }

    /// Status of a single field, if the field is in the report
    pub fn status(&self, section: &str, field: &str) -> Option<VerificationStatus> {
        self.sections
            .iter()
            .find(|s| s.section == section)?
            .rows
            .iter()
            .find(|r| r.field == field)
            .map(|r| r.status)
    }
}
