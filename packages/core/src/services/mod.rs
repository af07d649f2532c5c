//! Business Services
//!
//! This module contains the export and import services:
//!
//! - `ExportService` - Serializes the live tree into a portable document
//! - `ImportEngine` - Four-phase, identity-preserving merge of a document
//! - `IdentityResolver` - Maps a document `code` onto an existing identity
//!
//! Services coordinate between the database layer and the document models,
//! and own the transaction boundary for imports.

pub mod error;
pub mod export_service;
pub mod identity_resolver;
pub mod import_engine;

pub use error::HierarchyServiceError;
pub use export_service::ExportService;
pub use identity_resolver::{ensure_unique_codes, IdentityResolution, IdentityResolver};
pub use import_engine::{ImportEngine, ImportOptions, ImportPhase, ImportReport, OrphanedNode};
