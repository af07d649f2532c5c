//! Data Models
//!
//! This module contains the core data structures used throughout hierarchy sync:
//!
//! - `HierarchyNode` - A persisted tree row, including its persistent identity
//! - `HierarchyEntry` - The identity-free form carried by documents
//! - `HierarchyDocument` - The ordered import/export payload
//!
//! Positions use the nested-interval (modified preorder) encoding so that
//! subtree queries reduce to integer range comparisons.

mod document;
mod hierarchy_node;

pub use document::{HierarchyDocument, ValidationError};
pub use hierarchy_node::{
    find_duplicate_codes, orphaned_position, restored_position, DuplicateCode,
    DuplicateCodeError, HierarchyEntry, HierarchyId, HierarchyNode, TreeSide, ROOT_POSITION_ID,
};
