//! HierarchyStore Trait - Storage Abstraction Layer
//!
//! This module defines the traits that abstract persistence of hierarchy rows.
//! Services (export, import, identity resolution) depend only on these traits.
//!
//! # Design Decisions
//!
//! 1. **Async-First**: All methods are async so embedded and networked backends
//!    share one interface
//! 2. **Isolated Imports**: `HierarchyStore::begin_import` hands out a
//!    [`HierarchyTransaction`] bound to its own connection. Every structural
//!    rewrite goes through that handle; reads on the store never observe it
//!    until `commit`
//! 3. **Errors**: Storage failures surface as `DatabaseError`; turning
//!    duplicate codes into a failed precondition is left to the services
//!
//! # Examples
//!
//! ```rust,no_run
//! use hierarchy_sync_core::db::{DatabaseService, HierarchyStore, TursoHierarchyStore};
//! use std::path::PathBuf;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Arc::new(DatabaseService::new(PathBuf::from("./data/hierarchy.db")).await?);
//!     let store: Arc<dyn HierarchyStore> = Arc::new(TursoHierarchyStore::new(db));
//!
//!     assert!(store.find_duplicate_codes().await?.is_empty());
//!     for node in store.load_all().await? {
//!         println!("{} {}", node.position_id, node.code);
//!     }
//!     Ok(())
//! }
//! ```

use crate::db::DatabaseError;
use crate::models::{DuplicateCode, HierarchyEntry, HierarchyId, HierarchyNode};
use async_trait::async_trait;

/// Code-to-identity lookup shared by stores and open transactions
#[async_trait]
pub trait IdentityLookup: Send + Sync {
    /// Identity of the row carrying `code`
    ///
    /// # Errors
    ///
    /// `DatabaseError::InvariantViolation` when more than one row matches.
    async fn find_identity_by_code(&self, code: &str)
        -> Result<Option<HierarchyId>, DatabaseError>;
}

/// Abstraction layer for hierarchy persistence
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`. Reads see committed data only;
/// structural mutations happen inside a [`HierarchyTransaction`].
///
/// # Method Categories
///
/// - **Uniqueness**: `find_duplicate_codes`
/// - **Lookup**: `find_identity_by_code`, `find_by_code`, `find_by_identity`
/// - **Reads**: `load_all`, `load_subtree`, `max_position_id`
/// - **Writes**: `upsert` (autocommit)
/// - **Transactions**: `begin_import`
#[async_trait]
pub trait HierarchyStore: IdentityLookup {
    /// Every `code` held by more than one row, with its count, ordered by code
    async fn find_duplicate_codes(&self) -> Result<Vec<DuplicateCode>, DatabaseError>;

    async fn find_by_code(&self, code: &str) -> Result<Option<HierarchyNode>, DatabaseError>;

    async fn find_by_identity(
        &self,
        identity: HierarchyId,
    ) -> Result<Option<HierarchyNode>, DatabaseError>;

    /// All rows, ascending by `position_id`
    async fn load_all(&self) -> Result<Vec<HierarchyNode>, DatabaseError>;

    /// The node at `position_id` and every descendant, ascending by `position_id`
    ///
    /// Empty when no node sits at `position_id`.
    async fn load_subtree(&self, position_id: i64) -> Result<Vec<HierarchyNode>, DatabaseError>;

    /// Highest `position_id` in the table, `None` when the table is empty
    async fn max_position_id(&self) -> Result<Option<i64>, DatabaseError>;

    /// Insert or update a single row in its own implicit transaction
    ///
    /// - `identity = None`: insert, allocating a fresh identity
    /// - `identity = Some(id)`: update that row in place, keeping `id`
    ///
    /// Returns the identity of the written row.
    async fn upsert(
        &self,
        identity: Option<HierarchyId>,
        entry: &HierarchyEntry,
    ) -> Result<HierarchyId, DatabaseError>;

    /// Open a write transaction on a dedicated connection
    async fn begin_import(&self) -> Result<Box<dyn HierarchyTransaction>, DatabaseError>;
}

/// An open write transaction
///
/// Every call sees the transaction's own uncommitted writes. After `commit` or
/// `rollback` the handle must not be used again; dropping it without either
/// discards the writes.
#[async_trait]
pub trait HierarchyTransaction: IdentityLookup {
    /// All rows, ascending by `position_id`
    async fn load_all(&self) -> Result<Vec<HierarchyNode>, DatabaseError>;

    /// Highest `position_id`, `None` when the table is empty
    async fn max_position_id(&self) -> Result<Option<i64>, DatabaseError>;

    /// Same contract as [`HierarchyStore::upsert`], inside the transaction
    async fn upsert(
        &self,
        identity: Option<HierarchyId>,
        entry: &HierarchyEntry,
    ) -> Result<HierarchyId, DatabaseError>;

    /// Rows carrying a negative `position_id`, ordered by `position_id`
    /// descending (i.e. by original position ascending)
    async fn load_orphans(&self) -> Result<Vec<HierarchyNode>, DatabaseError>;

    /// Set `max_descendant_position_id` of the row at `position_id`
    ///
    /// Returns the number of rows affected (0 or 1).
    async fn set_max_descendant(
        &self,
        position_id: i64,
        max_descendant_position_id: i64,
    ) -> Result<u64, DatabaseError>;

    async fn commit(&self) -> Result<(), DatabaseError>;

    async fn rollback(&self) -> Result<(), DatabaseError>;
}
