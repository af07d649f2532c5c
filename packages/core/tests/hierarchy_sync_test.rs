//! Integration tests for export and import between two databases
//!
//! Tests cover:
//! - Export/import round trip into an empty destination
//! - Identity preservation for matched codes
//! - No deletion of destination-only nodes
//! - Containment invariant after merges of differently shaped trees
//! - Subtree queries on the merged tree

use anyhow::Result;
use hierarchy_sync_core::{
    db::{DatabaseService, HierarchyStore, TursoHierarchyStore},
    services::{ExportService, ImportEngine},
    HierarchyDocument, HierarchyEntry, HierarchyId, HierarchyNode, ROOT_POSITION_ID,
};
use std::collections::HashMap;
use std::sync::Arc;
use tempfile::TempDir;

/// Test helper: open a store in its own database file
async fn create_store(temp_dir: &TempDir, name: &str) -> Result<Arc<TursoHierarchyStore>> {
    let db = DatabaseService::new(temp_dir.path().join(name)).await?;
    Ok(Arc::new(TursoHierarchyStore::new(Arc::new(db))))
}

async fn seed(store: &TursoHierarchyStore, entries: &[HierarchyEntry]) -> Result<()> {
    for entry in entries {
        store.upsert(None, entry).await?;
    }
    Ok(())
}

/// Nested-interval entries for a tree with `breadth` children per node
fn generate_tree(prefix: &str, breadth: usize, depth: usize) -> Vec<HierarchyEntry> {
    fn visit(
        out: &mut Vec<HierarchyEntry>,
        prefix: &str,
        label: String,
        parent: i64,
        breadth: usize,
        depth: usize,
    ) -> i64 {
        let position = out.len() as i64;
        let code = if position == ROOT_POSITION_ID {
            "ROOT".to_string()
        } else {
            format!("{}-{}", prefix, label)
        };
        out.push(HierarchyEntry::new(position, parent, position, code, label.clone()));

        let mut max = position;
        if depth > 0 {
            for i in 0..breadth {
                max = visit(out, prefix, format!("{}.{}", label, i), position, breadth, depth - 1);
            }
        }
        out[position as usize].max_descendant_position_id = max;
        max
    }

    let mut out = Vec::new();
    visit(&mut out, prefix, "0".to_string(), ROOT_POSITION_ID, breadth, depth);
    out
}

fn assert_containment(nodes: &[HierarchyNode]) {
    let by_position: HashMap<i64, &HierarchyNode> =
        nodes.iter().map(|n| (n.position_id, n)).collect();

    for node in nodes.iter().filter(|n| !n.is_root()) {
        let parent = by_position
            .get(&node.parent_position_id)
            .unwrap_or_else(|| panic!("{} has no parent", node.code));
        assert!(parent.contains(node), "{} outside {}", node.code, parent.code);
        assert!(node.position_id > parent.position_id);
        assert!(node.max_descendant_position_id <= parent.max_descendant_position_id);
        assert!(node.position_id >= 0);
    }
}

fn identities_by_code(nodes: &[HierarchyNode]) -> HashMap<String, HierarchyId> {
    nodes.iter().map(|n| (n.code.clone(), n.identity)).collect()
}

// =========================================================================
// Round Trip Tests
// =========================================================================

#[tokio::test]
async fn test_round_trip_into_empty_destination() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let source = create_store(&temp_dir, "source.db").await?;
    let destination = create_store(&temp_dir, "destination.db").await?;
    seed(&source, &generate_tree("S", 3, 2)).await?;

    let json = ExportService::new(source.clone()).export_json().await?;
    let report = ImportEngine::new(destination.clone()).import_json(&json).await?;
    assert_eq!(report.inserted, 13);
    assert!(report.orphaned.is_empty());

    let exported_again = ExportService::new(destination.clone()).export_json().await?;
    assert_eq!(exported_again, json);
    Ok(())
}

#[tokio::test]
async fn test_matched_codes_keep_identity_and_nothing_is_deleted() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let source = create_store(&temp_dir, "source.db").await?;
    let destination = create_store(&temp_dir, "destination.db").await?;

    // Destination: ROOT, A, A.x, B, C
    seed(
        &destination,
        &[
            HierarchyEntry::new(0, 0, 4, "ROOT", "Root"),
            HierarchyEntry::new(1, 0, 2, "A", "A"),
            HierarchyEntry::new(2, 1, 2, "AX", "A.x"),
            HierarchyEntry::new(3, 0, 3, "B", "B"),
            HierarchyEntry::new(4, 0, 4, "C", "C"),
        ],
    )
    .await?;
    let before = identities_by_code(&destination.load_all().await?);

    // Source restructures: C moves under B, AX is gone, D is new
    seed(
        &source,
        &[
            HierarchyEntry::new(0, 0, 4, "ROOT", "Root"),
            HierarchyEntry::new(1, 0, 3, "B", "B"),
            HierarchyEntry::new(2, 1, 3, "C", "C"),
            HierarchyEntry::new(3, 2, 3, "D", "D"),
            HierarchyEntry::new(4, 0, 4, "A", "A"),
        ],
    )
    .await?;

    let document = ExportService::new(source).export_tree().await?;
    let report = ImportEngine::new(destination.clone())
        .import_document(&document)
        .await?;

    assert_eq!((report.inserted, report.updated), (1, 4));
    assert_eq!(report.orphaned_codes(), vec!["AX"]);

    let after_nodes = destination.load_all().await?;
    let after = identities_by_code(&after_nodes);
    for (code, identity) in &before {
        assert_eq!(after.get(code), Some(identity), "identity changed for {}", code);
    }
    assert_eq!(after.len(), before.len() + 1);

    let c = destination.find_by_code("C").await?.expect("C present");
    assert_eq!((c.position_id, c.parent_position_id), (2, 1));
    let ax = destination.find_by_code("AX").await?.expect("AX retained");
    assert_eq!(
        (ax.position_id, ax.parent_position_id, ax.max_descendant_position_id),
        (5, ROOT_POSITION_ID, 5)
    );

    assert_containment(&after_nodes);
    Ok(())
}

#[tokio::test]
async fn test_merge_of_unrelated_trees_keeps_containment() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let destination = create_store(&temp_dir, "destination.db").await?;
    let destination_tree = generate_tree("D", 2, 3);
    seed(&destination, &destination_tree).await?;

    let document = HierarchyDocument::new(generate_tree("S", 3, 2));
    let report = ImportEngine::new(destination.clone())
        .import_document(&document)
        .await?;

    // Only ROOT is shared
    assert_eq!(report.updated, 1);
    assert_eq!(report.inserted, document.len() - 1);
    assert_eq!(report.orphaned.len(), destination_tree.len() - 1);

    let nodes = destination.load_all().await?;
    assert_eq!(nodes.len(), document.len() + destination_tree.len() - 1);
    assert_containment(&nodes);

    let root = destination.find_by_code("ROOT").await?.expect("root");
    assert_eq!(root.max_descendant_position_id, nodes.len() as i64 - 1);

    // Orphans follow the imported nodes in their original order
    let orphan_codes: Vec<String> = destination_tree[1..].iter().map(|e| e.code.clone()).collect();
    let reported: Vec<String> = report.orphaned.iter().map(|o| o.code.clone()).collect();
    assert_eq!(reported, orphan_codes);
    Ok(())
}

#[tokio::test]
async fn test_subtree_after_import() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let destination = create_store(&temp_dir, "destination.db").await?;
    let tree = generate_tree("T", 2, 2);

    ImportEngine::new(destination.clone())
        .import_document(&HierarchyDocument::new(tree.clone()))
        .await?;

    // First child of the root and its two children
    let top = &tree[1];
    let subtree = destination.load_subtree(top.position_id).await?;
    let codes: Vec<&str> = subtree.iter().map(|n| n.code.as_str()).collect();
    assert_eq!(codes, vec![tree[1].code.as_str(), tree[2].code.as_str(), tree[3].code.as_str()]);
    Ok(())
}
