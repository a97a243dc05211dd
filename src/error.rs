//! Error taxonomy for the KYC portal
//!
//! Every fallible operation in the services returns `KycResult<T>`. The
//! variants line up with what a caller can do about them: fix the input
//! (`Validation`), change the PAN or name (`Conflict`), stop using a stale id
//! (`NotFound`), or give up (`Storage`).

use crate::store::StoreError;
use crate::validation::ValidationErrors;
use crate::workflow::session::SessionError;
use thiserror::Error;

/// Main error type for profile, catalog and workflow operations
#[derive(Error, Debug)]
pub enum KycError {
    #[error("Validation error: {0}")]
    Validation(ValidationErrors),

    #[error("Conflict: {message}")]
    Conflict { message: String },

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("Storage error: {0}")]
    Storage(#[source] StoreError),
}

pub type KycResult<T> = Result<T, KycError>;

impl KycError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    /// Field errors carried by a `Validation` error
    pub fn field_errors(&self) -> Option<&ValidationErrors> {
        match self {
            Self::Validation(errors) => Some(errors),
            _ => None,
        }
    }
}

impl From<ValidationErrors> for KycError {
    fn from(errors: ValidationErrors) -> Self {
        Self::Validation(errors)
    }
}

impl From<StoreError> for KycError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::PanTaken { .. } => {
                Self::conflict("A profile with this PAN number already exists.")
            }
            StoreError::DuplicateFieldName { name } => {
                Self::conflict(format!("A field named '{}' already exists.", name))
            }
            other => Self::Storage(other),
        }
    }
}
