//! Hierarchy Node Data Structures
//!
//! This module defines the persisted `HierarchyNode` row and the identity-free
//! `HierarchyEntry` that travels between environments.
//!
//! # Two ID Spaces
//!
//! - **Identity** (`HierarchyId`): allocated once by the database, referenced by
//!   other tables as a foreign key, never recomputed
//! - **Position** (`position_id`, `parent_position_id`, `max_descendant_position_id`):
//!   the nested-interval encoding of the tree, fully recomputable on import
//!
//! A node `X` is a descendant of `Y` exactly when
//! `Y.position_id <= X.position_id <= Y.max_descendant_position_id`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Position of the root node. The root is its own parent.
pub const ROOT_POSITION_ID: i64 = 0;

/// Persistent identity of a hierarchy node
///
/// Other tables hold this value as a foreign key, so it must survive every
/// import for as long as the node's `code` does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HierarchyId(i64);

impl HierarchyId {
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    pub fn value(self) -> i64 {
        self.0
    }
}

impl fmt::Display for HierarchyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A persisted hierarchy row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HierarchyNode {
    /// Persistent identity (foreign-key target)
    pub identity: HierarchyId,

    /// Structural index in the nested-interval encoding
    pub position_id: i64,

    /// `position_id` of the structural parent (root points at itself)
    pub parent_position_id: i64,

    /// Largest `position_id` anywhere in this node's subtree
    pub max_descendant_position_id: i64,

    /// Stable business key, used as the merge key across environments
    pub code: String,

    /// Display label
    pub name: String,
}

impl HierarchyNode {
    /// Whether this node is the tree root
    pub fn is_root(&self) -> bool {
        self.position_id == ROOT_POSITION_ID && self.parent_position_id == ROOT_POSITION_ID
    }

    /// Whether `other` lies inside this node's interval (a node contains itself)
    pub fn contains(&self, other: &HierarchyNode) -> bool {
        self.position_id <= other.position_id
            && other.position_id <= self.max_descendant_position_id
    }

    /// Strip the identity for export
    pub fn to_entry(&self) -> HierarchyEntry {
        HierarchyEntry {
            position_id: self.position_id,
            parent_position_id: self.parent_position_id,
            max_descendant_position_id: self.max_descendant_position_id,
            name: self.name.clone(),
            code: self.code.clone(),
        }
    }

    /// This row with every position mapped through [`orphaned_position`]
    pub fn orphaned_entry(&self) -> HierarchyEntry {
        HierarchyEntry {
            position_id: orphaned_position(self.position_id),
            parent_position_id: orphaned_position(self.parent_position_id),
            max_descendant_position_id: orphaned_position(self.max_descendant_position_id),
            name: self.name.clone(),
            code: self.code.clone(),
        }
    }
}

/// One entry of an import/export document
///
/// Field names on the wire (`nodeId`, `parentId`, `maxChildId`) are kept
/// compatible with documents produced by earlier exporters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HierarchyEntry {
    #[serde(rename = "nodeId")]
    pub position_id: i64,

    #[serde(rename = "parentId")]
    pub parent_position_id: i64,

    #[serde(rename = "maxChildId")]
    pub max_descendant_position_id: i64,

    pub name: String,

    pub code: String,
}

impl HierarchyEntry {
    pub fn new(
        position_id: i64,
        parent_position_id: i64,
        max_descendant_position_id: i64,
        code: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            position_id,
            parent_position_id,
            max_descendant_position_id,
            name: name.into(),
            code: code.into(),
        }
    }

    pub fn is_root(&self) -> bool {
        self.position_id == ROOT_POSITION_ID && self.parent_position_id == ROOT_POSITION_ID
    }
}

/// Map a position into the negative "orphaned" space: `f(x) = -(x + 1)`.
///
/// `f` is a strictly decreasing bijection from `x >= 0` onto `x <= -1`, so
/// ordering orphaned rows by `f(x)` descending recovers the original
/// ascending order.
pub fn orphaned_position(position_id: i64) -> i64 {
    -(position_id + 1)
}

/// Inverse of [`orphaned_position`]
pub fn restored_position(orphaned: i64) -> i64 {
    -orphaned - 1
}

/// A `code` that occurs more than once, with its occurrence count
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicateCode {
    pub code: String,
    pub count: usize,
}

/// Which tree a uniqueness check ran against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TreeSide {
    /// The live tree in the backing store
    Destination,
    /// An import document
    Document,
}

impl fmt::Display for TreeSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TreeSide::Destination => write!(f, "destination hierarchy"),
            TreeSide::Document => write!(f, "import document"),
        }
    }
}

/// Raised when `code` cannot serve as a merge key because it is not unique
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Found hierarchy nodes with duplicate codes in {side}: {}", describe_duplicates(.duplicates))]
pub struct DuplicateCodeError {
    pub side: TreeSide,
    pub duplicates: Vec<DuplicateCode>,
}

impl DuplicateCodeError {
    pub fn new(side: TreeSide, duplicates: Vec<DuplicateCode>) -> Self {
        Self { side, duplicates }
    }
}

fn describe_duplicates(duplicates: &[DuplicateCode]) -> String {
    duplicates
        .iter()
        .map(|d| format!("Code: \"{}\", Count {}", d.code, d.count))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Count codes and keep those seen more than once, sorted by code
pub fn find_duplicate_codes<'a, I>(codes: I) -> Vec<DuplicateCode>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for code in codes {
        *counts.entry(code).or_insert(0) += 1;
    }

    counts
        .into_iter()
        .filter(|(_, count)| *count > 1)
        .map(|(code, count)| DuplicateCode {
            code: code.to_string(),
            count,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(position: i64, parent: i64, max: i64, code: &str) -> HierarchyNode {
        HierarchyNode {
            identity: HierarchyId::new(position + 100),
            position_id: position,
            parent_position_id: parent,
            max_descendant_position_id: max,
            code: code.to_string(),
            name: code.to_string(),
        }
    }

    #[test]
    fn test_orphaned_position_is_negative_and_reversible() {
        for x in [0, 1, 2, 17, 1_000_000] {
            let orphaned = orphaned_position(x);
            assert!(orphaned < 0);
            assert_eq!(restored_position(orphaned), x);
        }
    }

    #[test]
    fn test_orphaned_position_reverses_order() {
        let mut originals = vec![4, 0, 9, 2];
        let mut transformed: Vec<i64> = originals.iter().map(|x| orphaned_position(*x)).collect();

        originals.sort();
        transformed.sort_by(|a, b| b.cmp(a));

        let recovered: Vec<i64> = transformed.into_iter().map(restored_position).collect();
        assert_eq!(recovered, originals);
    }

    #[test]
    fn test_contains_uses_interval() {
        let parent = node(1, 0, 4, "A");
        let child = node(3, 1, 3, "B");
        let outside = node(5, 0, 5, "C");

        assert!(parent.contains(&child));
        assert!(parent.contains(&parent));
        assert!(!parent.contains(&outside));
        assert!(!child.contains(&parent));
    }

    #[test]
    fn test_entry_wire_names() {
        let entry = HierarchyEntry::new(1, 0, 1, "HR", "Human Resources");
        let json = serde_json::to_value(&entry).unwrap();

        assert_eq!(json["nodeId"], 1);
        assert_eq!(json["parentId"], 0);
        assert_eq!(json["maxChildId"], 1);
        assert_eq!(json["code"], "HR");
        assert_eq!(json["name"], "Human Resources");
        assert!(json.get("identity").is_none());
    }

    #[test]
    fn test_to_entry_drops_identity() {
        let n = node(2, 0, 2, "FIN");
        let entry = n.to_entry();
        assert_eq!(entry, HierarchyEntry::new(2, 0, 2, "FIN", "FIN"));
    }

    #[test]
    fn test_orphaned_entry_maps_every_position() {
        let n = node(3, 1, 5, "OPS");
        let entry = n.orphaned_entry();
        assert_eq!(entry, HierarchyEntry::new(-4, -2, -6, "OPS", "OPS"));
        assert_eq!(restored_position(entry.position_id), n.position_id);

        // Root points at itself before and after
        let root = node(0, 0, 5, "ROOT").orphaned_entry();
        assert_eq!(root.position_id, root.parent_position_id);
    }

    #[test]
    fn test_find_duplicate_codes() {
        let dups = find_duplicate_codes(["B", "A", "B", "C", "A", "B"]);
        assert_eq!(
            dups,
            vec![
                DuplicateCode {
                    code: "A".to_string(),
                    count: 2
                },
                DuplicateCode {
                    code: "B".to_string(),
                    count: 3
                },
            ]
        );

        assert!(find_duplicate_codes(["X", "Y"]).is_empty());
    }

    #[test]
    fn test_duplicate_code_error_message() {
        let err = DuplicateCodeError::new(
            TreeSide::Destination,
            find_duplicate_codes(["HR", "HR", "FIN", "FIN", "FIN"]),
        );
        let msg = err.to_string();
        assert!(msg.contains("destination hierarchy"));
        assert!(msg.contains("Code: \"FIN\", Count 3"));
        assert!(msg.contains("Code: \"HR\", Count 2"));
    }
}
