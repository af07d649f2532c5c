//! Database Layer
//!
//! This module handles all persistence of the hierarchy using libsql:
//!
//! - Database initialization and connection management (`DatabaseService`)
//! - The storage abstraction used by every service (`HierarchyStore`,
//!   `HierarchyTransaction`)
//! - The embedded implementation (`TursoHierarchyStore`)
//!
//! # Architecture
//!
//! One flat `hierarchy` table holds the nested-interval encoding of a single
//! rooted tree. The persistent `identity` column is the only value other
//! tables may reference; position columns are rewritten freely by imports.

mod database;
mod error;
mod hierarchy_store;
mod turso_store;

pub use database::{DatabaseService, DEFAULT_BUSY_TIMEOUT_MS};
pub use error::DatabaseError;
pub use hierarchy_store::{HierarchyStore, HierarchyTransaction, IdentityLookup};
pub use turso_store::{TursoHierarchyStore, TursoHierarchyTransaction};
