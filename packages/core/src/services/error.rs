//! Service Layer Error Types
//!
//! This module defines error types for export and import operations. Every
//! variant means "operation failed, destination unchanged".

use crate::db::DatabaseError;
use crate::models::{DuplicateCodeError, ValidationError};
use thiserror::Error;

/// Export/import errors
///
/// # Categories
///
/// - **Precondition**: `DuplicateCodes` (source or destination), raised before any write
/// - **Malformed input**: `MalformedDocument`, `InvalidDocument`
/// - **Impossible state**: `InvariantViolation` and `Database(InvariantViolation)`,
///   fatal and not retryable
/// - **Storage / transport**: `Database`, `Io`, propagated unchanged
#[derive(Error, Debug)]
pub enum HierarchyServiceError {
    /// `code` is not unique, so it cannot serve as a merge key
    #[error(transparent)]
    DuplicateCodes(#[from] DuplicateCodeError),

    /// The document parsed but its interval structure is inconsistent
    #[error("Invalid hierarchy document: {0}")]
    InvalidDocument(#[from] ValidationError),

    /// The document could not be parsed into the expected shape
    #[error("Malformed hierarchy document: {0}")]
    MalformedDocument(#[from] serde_json::Error),

    /// Database operation failed
    #[error("Database operation failed: {0}")]
    Database(#[from] DatabaseError),

    /// Reading or writing a document stream failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The tree reached a state the algorithm cannot produce
    #[error("Hierarchy invariant violated: {0}")]
    InvariantViolation(String),
}

impl HierarchyServiceError {
    /// Create an invariant violation error
    pub fn invariant_violation(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    /// Whether the error indicates corrupted invariants rather than bad input
    /// or a transient storage failure
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::InvariantViolation(_) | Self::Database(DatabaseError::InvariantViolation(_))
        )
    }
}
