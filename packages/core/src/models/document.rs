//! Hierarchy Document
//!
//! The portable import/export payload: an ordered JSON array of
//! [`HierarchyEntry`] values, ascending by `nodeId`.
//!
//! ```json
//! [
//!   { "nodeId": 0, "parentId": 0, "maxChildId": 1, "name": "Root", "code": "ROOT" },
//!   { "nodeId": 1, "parentId": 0, "maxChildId": 1, "name": "Human Resources", "code": "HR" }
//! ]
//! ```
//!
//! Persistent identities are never part of a document.

use crate::models::hierarchy_node::{
    find_duplicate_codes, DuplicateCode, DuplicateCodeError, HierarchyEntry, TreeSide,
    ROOT_POSITION_ID,
};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::io::{Read, Write};
use thiserror::Error;

/// Structural problems found in an import document
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Document contains no entries")]
    EmptyDocument,

    #[error("Document has no root entry (nodeId = 0, parentId = 0)")]
    MissingRoot,

    #[error("Negative nodeId {position_id} for code '{code}'")]
    NegativePosition { code: String, position_id: i64 },

    #[error("nodeId {position_id} appears more than once")]
    DuplicatePosition { position_id: i64 },

    #[error("Entry '{code}' has maxChildId {max_descendant_position_id} below its nodeId {position_id}")]
    InvertedInterval {
        code: String,
        position_id: i64,
        max_descendant_position_id: i64,
    },

    #[error("Entry '{code}' references parent nodeId {parent_position_id} which is not in the document")]
    UnknownParent {
        code: String,
        parent_position_id: i64,
    },

    #[error("Entry '{code}' lies outside its parent's interval: {reason}")]
    ContainmentViolation { code: String, reason: String },
}

/// Ordered list of hierarchy entries exchanged between environments
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HierarchyDocument {
    entries: Vec<HierarchyEntry>,
}

impl HierarchyDocument {
    pub fn new(entries: Vec<HierarchyEntry>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[HierarchyEntry] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<HierarchyEntry> {
        self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, serde_json::Error> {
        serde_json::from_reader(reader)
    }

    /// Pretty-printed JSON, the format operators download and re-upload
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn write_pretty<W: Write>(&self, writer: W) -> Result<(), serde_json::Error> {
        serde_json::to_writer_pretty(writer, self)
    }

    pub fn duplicate_codes(&self) -> Vec<DuplicateCode> {
        find_duplicate_codes(self.entries.iter().map(|e| e.code.as_str()))
    }

    /// Fail if any `code` appears more than once
    pub fn ensure_unique_codes(&self) -> Result<(), DuplicateCodeError> {
        let duplicates = self.duplicate_codes();
        if duplicates.is_empty() {
            Ok(())
        } else {
            Err(DuplicateCodeError::new(TreeSide::Document, duplicates))
        }
    }

    /// Check the nested-interval structure before it is written anywhere
    ///
    /// # Rules
    ///
    /// - at least one entry, and a root with `nodeId = 0, parentId = 0`
    /// - every `nodeId` is non-negative and unique
    /// - every `maxChildId >= nodeId`
    /// - every non-root entry names a parent present in the document, sits strictly
    ///   after the parent and within its `maxChildId`, and its own `maxChildId`
    ///   does not exceed the parent's
    pub fn validate_structure(&self) -> Result<(), ValidationError> {
        if self.entries.is_empty() {
            return Err(ValidationError::EmptyDocument);
        }

        let mut seen = HashSet::with_capacity(self.entries.len());
        for entry in &self.entries {
            if entry.position_id < 0 {
                return Err(ValidationError::NegativePosition {
                    code: entry.code.clone(),
                    position_id: entry.position_id,
                });
            }
            if !seen.insert(entry.position_id) {
                return Err(ValidationError::DuplicatePosition {
                    position_id: entry.position_id,
                });
            }
            if entry.max_descendant_position_id < entry.position_id {
                return Err(ValidationError::InvertedInterval {
                    code: entry.code.clone(),
                    position_id: entry.position_id,
                    max_descendant_position_id: entry.max_descendant_position_id,
                });
            }
        }

        if !self.entries.iter().any(HierarchyEntry::is_root) {
            return Err(ValidationError::MissingRoot);
        }

        let by_position: HashMap<i64, &HierarchyEntry> =
            self.entries.iter().map(|e| (e.position_id, e)).collect();

        for entry in self.entries.iter().filter(|e| e.position_id != ROOT_POSITION_ID) {
            let parent = by_position.get(&entry.parent_position_id).ok_or_else(|| {
                ValidationError::UnknownParent {
                    code: entry.code.clone(),
                    parent_position_id: entry.parent_position_id,
                }
            })?;

            if entry.position_id <= parent.position_id
                || entry.position_id > parent.max_descendant_position_id
            {
                return Err(ValidationError::ContainmentViolation {
                    code: entry.code.clone(),
                    reason: format!(
                        "nodeId {} not in ({}, {}]",
                        entry.position_id, parent.position_id, parent.max_descendant_position_id
                    ),
                });
            }

            if entry.max_descendant_position_id > parent.max_descendant_position_id {
                return Err(ValidationError::ContainmentViolation {
                    code: entry.code.clone(),
                    reason: format!(
                        "maxChildId {} exceeds parent maxChildId {}",
                        entry.max_descendant_position_id, parent.max_descendant_position_id
                    ),
                });
            }
        }

        Ok(())
    }
}

impl From<Vec<HierarchyEntry>> for HierarchyDocument {
    fn from(entries: Vec<HierarchyEntry>) -> Self {
        Self::new(entries)
    }
}
