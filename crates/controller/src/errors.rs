//! Typed errors returned by the core operations
//!
//! The transport layer maps these onto its own response format. Notifier
//! failures never show up here, they are logged and swallowed after the
//! primary write committed.

use database::DatabaseError;
use std::borrow::Cow;
use validator::ValidationErrors;

/// A single invalid input field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    /// The field related to the error, None for operation level errors
    pub field: Option<Cow<'static, str>>,
    /// Human readable error message
    pub message: Cow<'static, str>,
}

impl FieldError {
    pub fn new<F, M>(field: F, message: M) -> Self
    where
        F: Into<Cow<'static, str>>,
        M: Into<Cow<'static, str>>,
    {
        Self {
            field: Some(field.into()),
            message: message.into(),
        }
    }

    pub fn operation<M>(message: M) -> Self
    where
        M: Into<Cow<'static, str>>,
    {
        Self {
            field: None,
            message: message.into(),
        }
    }
}

/// The error taxonomy of the event and registration core
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// Missing or malformed input, the caller's fault and not retryable
    #[error("Some provided values are invalid")]
    Validation(Vec<FieldError>),

    /// The principal's role does not permit the operation
    #[error("Access to the requested resource is forbidden")]
    Forbidden,

    /// A referenced entity does not exist
    #[error("A requested resource could not be found")]
    NotFound,

    /// A write lost against a uniqueness constraint or the current entity state
    #[error("The request conflicts with the state of the resource: {0}")]
    Conflict(&'static str),

    /// The blob store rejected or timed out an image upload, the enclosing
    /// operation was aborted
    #[error("Image upload failed")]
    Upload(#[source] anyhow::Error),

    /// Unexpected storage failure
    #[error("An internal error occurred")]
    Internal(#[source] anyhow::Error),
}

impl CoreError {
    pub fn validation<F, M>(field: F, message: M) -> Self
    where
        F: Into<Cow<'static, str>>,
        M: Into<Cow<'static, str>>,
    {
        Self::Validation(vec![FieldError::new(field, message)])
    }
}

impl From<DatabaseError> for CoreError {
    fn from(db_error: DatabaseError) -> Self {
        match db_error {
            DatabaseError::NotFound => Self::NotFound,
            e if e.is_unique_violation() => Self::Conflict("unique constraint violated"),
            // A dangling reference in a write means the referenced row is gone
            e if e.is_foreign_key_violation() => Self::NotFound,
            e if e.is_check_violation() => {
                Self::Validation(vec![FieldError::operation("storage constraint violated")])
            }
            e => {
                log::error!("Core threw internal error from database error: {}", e);
                Self::Internal(e.into())
            }
        }
    }
}

impl From<crate::BlockingError> for CoreError {
    fn from(e: crate::BlockingError) -> Self {
        log::error!("Core threw internal error from blocking error: {}", e);
        Self::Internal(e.into())
    }
}

impl From<ValidationErrors> for CoreError {
    fn from(validation_errors: ValidationErrors) -> Self {
        let mut entries = Vec::with_capacity(validation_errors.errors().len());

        for (field, errors) in validation_errors.field_errors() {
            for error in errors {
                let message = error
                    .message
                    .clone()
                    .unwrap_or_else(|| Cow::Owned(format!("invalid value for {field}")));

                // struct level validations report under "__all__"
                if field == "__all__" {
                    entries.push(FieldError::operation(message));
                } else {
                    entries.push(FieldError::new(field.to_owned(), message));
                }
            }
        }

        Self::Validation(entries)
    }
}
