//! Identity Resolution
//!
//! Maps a document entry's `code` onto the persistent identity of an existing
//! row, deciding insert-vs-update during the apply phase of an import.

use crate::db::{HierarchyStore, IdentityLookup};
use crate::models::{DuplicateCodeError, HierarchyId, TreeSide};
use crate::services::error::HierarchyServiceError;

/// Outcome of resolving a `code` against the destination
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityResolution {
    /// A row with this code exists; update it in place
    Existing(HierarchyId),
    /// No row with this code; insert with a fresh identity
    CreateNew,
}

impl IdentityResolution {
    pub fn identity(self) -> Option<HierarchyId> {
        match self {
            IdentityResolution::Existing(id) => Some(id),
            IdentityResolution::CreateNew => None,
        }
    }
}

/// Stateless lookup backed by [`IdentityLookup::find_identity_by_code`]
///
/// Borrowing an open transaction makes rows inserted earlier in the same
/// import visible to later lookups.
pub struct IdentityResolver<'a, L: IdentityLookup + ?Sized> {
    lookup: &'a L,
}

impl<'a, L: IdentityLookup + ?Sized> IdentityResolver<'a, L> {
    pub fn new(lookup: &'a L) -> Self {
        Self { lookup }
    }

    /// Resolve `code` to an existing identity or signal creation
    ///
    /// # Errors
    ///
    /// More than one row for `code` surfaces as a fatal
    /// `Database(InvariantViolation)`; the uniqueness precondition should have
    /// made that impossible.
    pub async fn resolve(&self, code: &str) -> Result<IdentityResolution, HierarchyServiceError> {
        let resolution = match self.lookup.find_identity_by_code(code).await? {
            Some(identity) => IdentityResolution::Existing(identity),
            None => IdentityResolution::CreateNew,
        };
        tracing::trace!(code, ?resolution, "resolved identity");
        Ok(resolution)
    }
}

/// Fail with `DuplicateCodes` when the destination cannot use `code` as a
/// merge key
pub async fn ensure_unique_codes(store: &dyn HierarchyStore) -> Result<(), HierarchyServiceError> {
    let duplicates = store.find_duplicate_codes().await?;
    if duplicates.is_empty() {
        return Ok(());
    }
    tracing::warn!(count = duplicates.len(), "destination holds duplicate codes");
    Err(DuplicateCodeError::new(TreeSide::Destination, duplicates).into())
}
