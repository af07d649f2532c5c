//! Export Service
//!
//! Serializes the whole destination tree into a portable [`HierarchyDocument`].
//! Read-only: the only way an export fails (besides storage errors) is the
//! duplicate-code precondition.

use crate::db::HierarchyStore;
use crate::models::{HierarchyDocument, HierarchyNode};
use crate::services::error::HierarchyServiceError;
use crate::services::identity_resolver::ensure_unique_codes;
use std::io::Write;
use std::sync::Arc;

/// Produces import documents from a [`HierarchyStore`]
///
/// # Examples
///
/// ```no_run
/// # use hierarchy_sync_core::db::{DatabaseService, TursoHierarchyStore};
/// # use hierarchy_sync_core::services::ExportService;
/// # use std::path::PathBuf;
/// # use std::sync::Arc;
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let db = DatabaseService::new(PathBuf::from("./source.db")).await?;
/// let exporter = ExportService::new(Arc::new(TursoHierarchyStore::new(Arc::new(db))));
///
/// let json = exporter.export_json().await?;
/// std::fs::write("organizationalUnits.json", json)?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct ExportService {
    store: Arc<dyn HierarchyStore>,
}

impl ExportService {
    pub fn new(store: Arc<dyn HierarchyStore>) -> Self {
        Self { store }
    }

    /// Export every node, ascending by position
    ///
    /// Identities are never included; importers match on `code`.
    pub async fn export_tree(&self) -> Result<HierarchyDocument, HierarchyServiceError> {
        ensure_unique_codes(self.store.as_ref()).await?;

        let entries = self
            .store
            .load_all()
            .await?
            .iter()
            .map(HierarchyNode::to_entry)
            .collect::<Vec<_>>();

        tracing::info!(nodes = entries.len(), "exported hierarchy");
        Ok(HierarchyDocument::new(entries))
    }

    /// Export as pretty-printed JSON
    pub async fn export_json(&self) -> Result<String, HierarchyServiceError> {
        Ok(self.export_tree().await?.to_json_pretty()?)
    }

    /// Export as pretty-printed JSON into `writer`
    pub async fn export_to_writer<W: Write>(
        &self,
        mut writer: W,
    ) -> Result<(), HierarchyServiceError> {
        let document = self.export_tree().await?;
        document.write_pretty(&mut writer)?;
        writer.flush()?;
        Ok(())
    }
}
