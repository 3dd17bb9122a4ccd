use std::borrow::Cow;

use thiserror::Error;

/// Top-level error type returned by the attribute engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Validation failed for one or more field keys.
    #[error("validation failed")]
    Validation(#[from] ValidationError),

    /// A referenced entity does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// The (listing, field) pair already has a value row. Raised by the
    /// storage backstop when two applies race on the same listing; the
    /// caller may re-run the whole apply.
    #[error("value row already exists for listing {listing_id}, field {field_id}")]
    Conflict { listing_id: i64, field_id: i64 },

    /// Invalid input supplied to a translation/search operation.
    #[error("invalid request: {message}")]
    InvalidRequest { message: String },

    /// Search-index failure surfaced on a read path. Write-path index
    /// failures never take this route; they are logged and swallowed.
    #[error("search index error: {0}")]
    Index(#[from] crate::search::IndexError),

    /// Underlying storage adapter failure.
    #[error("storage error: {message}")]
    Storage { message: Cow<'static, str> },
}

impl EngineError {
    /// Whether re-running the failed operation unchanged can succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, EngineError::Conflict { .. })
    }

    pub(crate) fn storage(message: impl Into<Cow<'static, str>>) -> Self {
        EngineError::Storage {
            message: message.into(),
        }
    }
}

/// Collection of validation issues encountered while preparing a mutation.
/// Every offending key is reported, not just the first.
#[derive(Debug, Error)]
#[error("validation errors: {issues:?}")]
pub struct ValidationError {
    pub issues: Vec<ValidationIssue>,
}

impl ValidationError {
    pub fn new<I>(issues: I) -> Self
    where
        I: IntoIterator<Item = ValidationIssue>,
    {
        Self {
            issues: issues.into_iter().collect(),
        }
    }

    /// Convenience helper for a single-field validation error.
    pub fn single(field: impl Into<String>, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new([ValidationIssue::new(field, code, message)])
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    /// Field keys named by the collected issues, in report order.
    pub fn fields(&self) -> Vec<&str> {
        self.issues.iter().map(|issue| issue.field.as_str()).collect()
    }
}

/// Detailed validation failure for a single field key.
#[derive(Debug, Clone)]
pub struct ValidationIssue {
    pub field: String,
    pub code: String,
    pub message: String,
}

impl ValidationIssue {
    pub fn new(field: impl Into<String>, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            code: code.into(),
            message: message.into(),
        }
    }
}

/// Alias used by coercion and translation helpers.
pub type ValidationResult<T> = Result<T, ValidationError>;
