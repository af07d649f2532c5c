//! Hierarchy Sync Core
//!
//! Moves a nested-interval organizational tree between environments without
//! breaking references to its nodes.
//!
//! # Architecture
//!
//! - **Two ID spaces**: `HierarchyId` is a persistent identity other tables
//!   reference; `position_id` is the structural nested-interval coordinate and
//!   is freely renumbered
//! - **Code as merge key**: documents carry no identities; imports match rows
//!   by their unique `code`
//! - **libsql**: embedded SQLite-compatible storage, one explicit transaction
//!   per import
//!
//! # Modules
//!
//! - [`models`] - Hierarchy nodes, document entries, and validation
//! - [`db`] - Database layer with libsql integration
//! - [`services`] - Export, import, and identity resolution
//! - [`config`] - Runtime configuration

pub mod config;
pub mod db;
pub mod models;
pub mod services;

// Re-export commonly used types
pub use config::HierarchySyncConfig;
pub use models::*;
pub use services::*;
