//! Import Engine - Identity-Preserving Hierarchy Merge
//!
//! Reconciles an exported [`HierarchyDocument`] with the live tree in a
//! [`HierarchyStore`] without deleting destination-only nodes and without
//! reassigning the persistent identity of any node whose `code` survives.
//!
//! # Constraints
//!
//! - `code` is the merge key. A node whose code exists in the destination is
//!   updated in place, so rows referencing it by identity keep working.
//! - Nothing is deleted. Destination nodes missing from the document
//!   ("orphans") become direct children of the root, after the imported nodes,
//!   in their original relative order.
//!
//! # Algorithm
//!
//! All four phases run inside one transaction on its own connection, so
//! concurrent readers of the store keep seeing the last committed tree:
//!
//! 1. **Orphan**: rewrite every position field through `f(x) = -(x + 1)`
//!    ([`orphaned_position`](crate::models::orphaned_position)). This
//!    frees the non-negative space for document rows under the live `UNIQUE`
//!    constraint, and since `f` is decreasing, sorting by `f(x)` descending
//!    recovers the original order.
//! 2. **Apply**: for each document entry in order, update the row with the
//!    same code or insert a new one.
//! 3. **Reparent**: rows still negative were not in the document. One at a
//!    time, in original order, give each `position = max + 1` under the root.
//! 4. **Root fix-up**: stretch the root's interval over the appended orphans.
//!
//! Any failure rolls the transaction back; the destination is unchanged.

use crate::db::{HierarchyStore, HierarchyTransaction};
use crate::models::{
    restored_position, HierarchyDocument, HierarchyEntry, HierarchyId, HierarchyNode,
    ROOT_POSITION_ID,
};
use crate::services::error::HierarchyServiceError;
use crate::services::identity_resolver::{ensure_unique_codes, IdentityResolution, IdentityResolver};
use serde::Serialize;
use std::fmt;
use std::io::Read;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Progress of an import through its transaction
///
/// `Validated -> Orphaned -> Applied -> Reparented -> RootFixedUp -> Committed`,
/// with any failure leading to `Aborted`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportPhase {
    Validated,
    Orphaned,
    Applied,
    Reparented,
    RootFixedUp,
    Committed,
    Aborted,
}

impl fmt::Display for ImportPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ImportPhase::Validated => "validated",
            ImportPhase::Orphaned => "orphaned",
            ImportPhase::Applied => "applied",
            ImportPhase::Reparented => "reparented",
            ImportPhase::RootFixedUp => "root-fixed-up",
            ImportPhase::Committed => "committed",
            ImportPhase::Aborted => "aborted",
        };
        f.write_str(name)
    }
}

/// Knobs for [`ImportEngine`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportOptions {
    /// Reject documents whose interval structure is inconsistent before any
    /// write. Turning this off trusts the document as-is.
    pub validate_document_structure: bool,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            validate_document_structure: true,
        }
    }
}

/// A destination node that was absent from the document and moved under the root
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrphanedNode {
    pub identity: HierarchyId,
    pub code: String,
    pub name: String,
    /// Position held before the import
    pub previous_position_id: i64,
    /// Position assigned during reparenting
    pub position_id: i64,
}

/// Outcome of a committed import
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    /// Document entries whose code was new to the destination
    pub inserted: usize,
    /// Document entries that updated an existing row
    pub updated: usize,
    /// Destination-only nodes, in the order they were reparented
    pub orphaned: Vec<OrphanedNode>,
}

impl ImportReport {
    pub fn orphaned_codes(&self) -> Vec<&str> {
        self.orphaned.iter().map(|n| n.code.as_str()).collect()
    }
}

/// Four-phase merge of a document into a destination store
pub struct ImportEngine {
    store: Arc<dyn HierarchyStore>,
    options: ImportOptions,
    /// Serializes imports issued through this engine
    import_lock: Mutex<()>,
}

impl ImportEngine {
    pub fn new(store: Arc<dyn HierarchyStore>) -> Self {
        Self::with_options(store, ImportOptions::default())
    }

    pub fn with_options(store: Arc<dyn HierarchyStore>, options: ImportOptions) -> Self {
        Self {
            store,
            options,
            import_lock: Mutex::new(()),
        }
    }

    pub fn options(&self) -> ImportOptions {
        self.options
    }

    /// Parse `json` and import it
    pub async fn import_json(&self, json: &str) -> Result<ImportReport, HierarchyServiceError> {
        let document = HierarchyDocument::from_json(json)?;
        self.import_document(&document).await
    }

    /// Parse a document from `reader` and import it
    pub async fn import_from_reader<R: Read>(
        &self,
        reader: R,
    ) -> Result<ImportReport, HierarchyServiceError> {
        let document = HierarchyDocument::from_reader(reader)?;
        self.import_document(&document).await
    }

    /// Merge `document` into the destination
    ///
    /// # Errors
    ///
    /// - `DuplicateCodes` if the document or the destination repeats a code
    /// - `InvalidDocument` if structure validation is enabled and fails
    /// - `Database` for storage failures (the transaction is rolled back)
    ///
    /// No error leaves a partial import behind.
    pub async fn import_document(
        &self,
        document: &HierarchyDocument,
    ) -> Result<ImportReport, HierarchyServiceError> {
        let _guard = self.import_lock.lock().await;

        self.validate(document).await?;
        tracing::debug!(
            entries = document.len(),
            phase = %ImportPhase::Validated,
            "import validated"
        );

        let tx = self.store.begin_import().await?;

        let mut phase = ImportPhase::Validated;
        let report = match run_phases(tx.as_ref(), document, &mut phase).await {
            Ok(report) => report,
            Err(err) => {
                abort(tx.as_ref(), phase, &err).await;
                return Err(err);
            }
        };

        if let Err(err) = tx.commit().await {
            let err = HierarchyServiceError::from(err);
            abort(tx.as_ref(), phase, &err).await;
            return Err(err);
        }

        tracing::info!(
            inserted = report.inserted,
            updated = report.updated,
            orphaned = report.orphaned.len(),
            phase = %ImportPhase::Committed,
            "hierarchy import committed"
        );
        Ok(report)
    }

    /// Preconditions, checked before the transaction opens
    async fn validate(&self, document: &HierarchyDocument) -> Result<(), HierarchyServiceError> {
        document.ensure_unique_codes()?;
        if self.options.validate_document_structure {
            document.validate_structure()?;
        }
        ensure_unique_codes(self.store.as_ref()).await
    }
}

async fn run_phases(
    tx: &dyn HierarchyTransaction,
    document: &HierarchyDocument,
    phase: &mut ImportPhase,
) -> Result<ImportReport, HierarchyServiceError> {
    let orphaned_rows = orphan_existing_nodes(tx).await?;
    *phase = ImportPhase::Orphaned;
    tracing::debug!(rows = orphaned_rows, phase = %phase, "existing nodes orphaned");

    let (inserted, updated) = apply_document_nodes(tx, document).await?;
    *phase = ImportPhase::Applied;
    tracing::debug!(inserted, updated, phase = %phase, "document nodes applied");

    let orphaned = reparent_orphan_nodes(tx).await?;
    *phase = ImportPhase::Reparented;
    tracing::debug!(orphans = orphaned.len(), phase = %phase, "orphans reparented");

    fix_up_root(tx).await?;
    *phase = ImportPhase::RootFixedUp;

    Ok(ImportReport {
        inserted,
        updated,
        orphaned,
    })
}

async fn abort(tx: &dyn HierarchyTransaction, phase: ImportPhase, err: &HierarchyServiceError) {
    tracing::warn!(
        last_completed = %phase,
        phase = %ImportPhase::Aborted,
        error = %err,
        "hierarchy import aborted, rolling back"
    );
    if let Err(rollback_err) = tx.rollback().await {
        tracing::error!(error = %rollback_err, "rollback after failed import also failed");
    }
}

/// Move every row into the negative space, one row at a time
///
/// `orphaned_position` maps distinct non-negative positions to distinct
/// negative ones, so no intermediate state breaks `UNIQUE(position_id)`.
async fn orphan_existing_nodes(
    tx: &dyn HierarchyTransaction,
) -> Result<usize, HierarchyServiceError> {
    let nodes = tx.load_all().await?;
    for node in &nodes {
        tx.upsert(Some(node.identity), &node.orphaned_entry()).await?;
    }
    Ok(nodes.len())
}

/// Update or insert every document entry, in document order
async fn apply_document_nodes(
    tx: &dyn HierarchyTransaction,
    document: &HierarchyDocument,
) -> Result<(usize, usize), HierarchyServiceError> {
    let resolver = IdentityResolver::new(tx);
    let mut inserted = 0;
    let mut updated = 0;

    for entry in document.entries() {
        let resolution = resolver.resolve(&entry.code).await?;
        tx.upsert(resolution.identity(), entry).await?;

        match resolution {
            IdentityResolution::Existing(_) => updated += 1,
            IdentityResolution::CreateNew => inserted += 1,
        }
    }

    Ok((inserted, updated))
}

/// Move every still-negative row under the root, one at a time
async fn reparent_orphan_nodes(
    tx: &dyn HierarchyTransaction,
) -> Result<Vec<OrphanedNode>, HierarchyServiceError> {
    let orphans = tx.load_orphans().await?;
    let mut reparented = Vec::with_capacity(orphans.len());

    for orphan in orphans {
        let position_id = next_position_id(tx).await?;
        let HierarchyNode {
            identity,
            position_id: orphaned_at,
            code,
            name,
            ..
        } = orphan;

        let entry = HierarchyEntry {
            position_id,
            parent_position_id: ROOT_POSITION_ID,
            max_descendant_position_id: position_id,
            name,
            code,
        };
        tx.upsert(Some(identity), &entry).await?;

        reparented.push(OrphanedNode {
            identity,
            code: entry.code,
            name: entry.name,
            previous_position_id: restored_position(orphaned_at),
            position_id,
        });
    }

    Ok(reparented)
}

async fn next_position_id(tx: &dyn HierarchyTransaction) -> Result<i64, HierarchyServiceError> {
    // Called only while orphan rows exist, so the table is never empty here
    let max = tx.max_position_id().await?.ok_or_else(|| {
        HierarchyServiceError::invariant_violation("hierarchy emptied during reparenting")
    })?;
    Ok(max + 1)
}

async fn fix_up_root(tx: &dyn HierarchyTransaction) -> Result<(), HierarchyServiceError> {
    let Some(max) = tx.max_position_id().await? else {
        return Ok(());
    };

    let affected = tx.set_max_descendant(ROOT_POSITION_ID, max).await?;
    if affected == 0 {
        tracing::warn!("no root node after import; root interval not updated");
    }
    Ok(())
}

#[cfg(test)]
#[path = "import_engine_test.rs"]
mod import_engine_test;
