//! Per-field validation rules
//!
//! The rule for a field is picked from its name (case-insensitive substring
//! match, first hit wins) and applied to the raw submitted value. PAN values
//! are validated as typed; normalization only applies to duplicate detection.

use crate::sections::ProfileDetails;
use chrono::NaiveDate;
use regex::Regex;
use serde::Serialize;
use std::fmt;
use std::sync::LazyLock;

// =============================================================================
// PATTERNS
// =============================================================================

static AADHAAR_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d{12}$").unwrap());

/// 5 letters, 4 digits, 1 letter
static PAN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z]{5}[0-9]{4}[A-Z]$").unwrap());

static DATE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").unwrap());

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^.+@.+\..+$").unwrap());

static PHONE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d{10}$").unwrap());

// =============================================================================
// RULES
// =============================================================================

/// Validation rule selected for a field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldRule {
    Aadhaar,
    Pan,
    /// `YYYY-MM-DD`, and the date must exist on the calendar (`1990-02-30`
    /// is rejected even though it has the right shape)
    DateOfBirth,
    Email,
    Phone,
    Required,
    /// Section or field naming problems in the submitted structure
    Structure,
}

impl FieldRule {
    /// Pick the rule for a field name
    pub fn for_field(name: &str) -> Self {
        let lower = name.to_lowercase();
        if lower.contains("aadhar") || lower.contains("aadhaar") {
            Self::Aadhaar
        } else if lower.contains("pan") {
            Self::Pan
        } else if lower.contains("dob") || lower.contains("date of birth") {
            Self::DateOfBirth
        } else if lower.contains("email") {
            Self::Email
        } else if lower.contains("phone") || lower.contains("mobile") {
            Self::Phone
        } else {
            Self::Required
        }
    }

    /// Check a raw value against this rule
    pub fn accepts(self, value: &str) -> bool {
        match self {
            Self::Aadhaar => AADHAAR_RE.is_match(value),
            Self::Pan => PAN_RE.is_match(value),
            Self::DateOfBirth => {
                DATE_RE.is_match(value) && NaiveDate::parse_from_str(value, "%Y-%m-%d").is_ok()
            }
            Self::Email => EMAIL_RE.is_match(value),
            Self::Phone => PHONE_RE.is_match(value),
            Self::Required | Self::Structure => !value.trim().is_empty(),
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            Self::Aadhaar => "Aadhaar must be 12 digits.",
            Self::Pan => "PAN must be 5 uppercase letters, 4 digits and 1 uppercase letter.",
            Self::DateOfBirth => "Date must be a valid YYYY-MM-DD date.",
            Self::Email => "Invalid email.",
            Self::Phone => "Phone must be 10 digits.",
            Self::Required => "This field is required.",
            Self::Structure => "Section and field names must not be blank.",
        }
    }
}

// =============================================================================
// ERRORS
// =============================================================================

/// A single offending input
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub section: String,
    pub field: String,
    pub rule: FieldRule,
    pub message: String,
}

impl FieldError {
    pub fn new(section: impl Into<String>, field: impl Into<String>, rule: FieldRule) -> Self {
        Self {
            section: section.into(),
            field: field.into(),
            rule,
            message: rule.message().to_string(),
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }
}

/// All field errors from one validation pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors(Vec<FieldError>);

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, error: FieldError) {
        self.0.push(error);
    }

    pub fn extend(&mut self, errors: impl IntoIterator<Item = FieldError>) {
        self.0.extend(errors);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn errors(&self) -> &[FieldError] {
        &self.0
    }

    /// Errors reported against one field
    pub fn for_field(&self, section: &str, field: &str) -> Option<&FieldError> {
        self.0
            .iter()
            .find(|e| e.section == section && e.field == field)
    }

    /// `Ok(())` when nothing was collected
    pub fn into_result(self) -> Result<(), ValidationErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl IntoIterator for ValidationErrors {
    type Item = FieldError;
    type IntoIter = std::vec::IntoIter<FieldError>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl From<FieldError> for ValidationErrors {
    fn from(error: FieldError) -> Self {
        Self(vec![error])
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} field(s) failed validation", self.0.len())?;
        for (i, e) in self.0.iter().enumerate() {
            let sep = if i == 0 { ": " } else { "; " };
            write!(f, "{}{}/{} ({})", sep, e.section, e.field, e.message)?;
        }
        Ok(())
    }
}

// =============================================================================
// ENTRY POINTS
// =============================================================================

/// Validate one value against the rule its field name selects.
pub fn validate_value(section: &str, field: &str, value: &str) -> Result<(), FieldError> {
    let rule = FieldRule::for_field(field);
    if rule.accepts(value) {
        Ok(())
    } else {
        Err(FieldError::new(section, field, rule))
    }
}

/// Validate a run of `(field, value)` pairs belonging to one section.
pub fn validate_section<'a>(
    section: &str,
    fields: impl IntoIterator<Item = (&'a str, &'a str)>,
) -> ValidationErrors {
    let mut errors = ValidationErrors::new();
    for (field, value) in fields {
        if let Err(e) = validate_value(section, field, value) {
            errors.push(e);
        }
    }
    errors
}

/// Validate every field of every section in `details`.
pub fn validate_details(details: &ProfileDetails) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::new();
    for (section, fields) in details.iter() {
        errors.extend(validate_section(
            section,
            fields.iter().map(|(f, v)| (f, v.as_str())),
        ));
    }
    errors.into_result()
}

/// Structural checks applied on every profile write.
///
/// Values are free text here; only the shape is checked. Empty sections are
/// rejected because a profile must be reopenable in a workflow session.
pub fn validate_structure(details: &ProfileDetails) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::new();
    if details.is_empty() {
        errors.push(
            FieldError::new("", "", FieldRule::Structure)
                .with_message("Profile details must contain at least one section."),
        );
    }
    for (section, fields) in details.iter() {
        if section.trim().is_empty() {
            errors.push(FieldError::new(section, "", FieldRule::Structure));
        }
        if fields.is_empty() {
            errors.push(
                FieldError::new(section, "", FieldRule::Structure)
                    .with_message("Each section must contain at least one field."),
            );
        }
        for (field, _) in fields.iter() {
            if field.trim().is_empty() {
                errors.push(FieldError::new(section, field, FieldRule::Structure));
            }
        }
    }
    errors.into_result()
}
