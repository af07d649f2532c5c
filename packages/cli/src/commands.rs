use anyhow::{bail, Context, Result};
use hierarchy_sync_core::db::{DatabaseService, HierarchyStore, TursoHierarchyStore};
use hierarchy_sync_core::{
    ExportService, HierarchyNode, HierarchySyncConfig, ImportEngine, ImportOptions, ImportReport,
};
use std::fmt::Write as _;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use std::sync::Arc;

use crate::cli::Command;

pub async fn run(cmd: Command, config: HierarchySyncConfig) -> Result<()> {
    let store = open_store(&config).await?;

    match cmd {
        Command::Export { output } => run_export(store, output.as_deref()).await,
        Command::Import {
            file,
            trust_document,
        } => {
            let mut options = config.import_options();
            if trust_document {
                options.validate_document_structure = false;
            }
            let report = run_import(store, options, &file).await?;
            print!("{}", render_import_report(&report));
            Ok(())
        }
        Command::Check => run_check(store).await,
        Command::Tree { code } => {
            print!("{}", run_tree(store, code.as_deref()).await?);
            Ok(())
        }
    }
}

pub async fn open_store(config: &HierarchySyncConfig) -> Result<Arc<TursoHierarchyStore>> {
    let db_path = config
        .resolve_database_path()
        .context("failed to resolve database path")?;
    tracing::debug!(path = %db_path.display(), "opening hierarchy database");

    let db = DatabaseService::with_busy_timeout(db_path, config.busy_timeout_ms).await?;
    Ok(Arc::new(TursoHierarchyStore::new(Arc::new(db))))
}

pub async fn run_export(store: Arc<TursoHierarchyStore>, output: Option<&Path>) -> Result<()> {
    let exporter = ExportService::new(store);

    match output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("failed to create {}", path.display()))?;
            exporter.export_to_writer(BufWriter::new(file)).await?;
            eprintln!("exported hierarchy to {}", path.display());
        }
        None => println!("{}", exporter.export_json().await?),
    }
    Ok(())
}

pub async fn run_import(
    store: Arc<TursoHierarchyStore>,
    options: ImportOptions,
    file: &Path,
) -> Result<ImportReport> {
    let reader = File::open(file)
        .map(BufReader::new)
        .with_context(|| format!("failed to open {}", file.display()))?;

    let engine = ImportEngine::with_options(store, options);
    Ok(engine.import_from_reader(reader).await?)
}

pub async fn run_check(store: Arc<TursoHierarchyStore>) -> Result<()> {
    let duplicates = store.find_duplicate_codes().await?;
    if !duplicates.is_empty() {
        for dup in &duplicates {
            eprintln!("duplicate code {:?}: {} nodes", dup.code, dup.count);
        }
        bail!("{} duplicate code(s) found", duplicates.len());
    }

    let nodes = store.load_all().await?;
    println!("ok: {} nodes, all codes unique", nodes.len());
    Ok(())
}

pub async fn run_tree(store: Arc<TursoHierarchyStore>, code: Option<&str>) -> Result<String> {
    let nodes = match code {
        Some(code) => {
            let Some(top) = store.find_by_code(code).await? else {
                bail!("no hierarchy node with code {:?}", code);
            };
            store.load_subtree(top.position_id).await?
        }
        None => store.load_all().await?,
    };
    Ok(render_tree(&nodes))
}

/// Indent nodes (ascending by position) by their depth within the slice
pub fn render_tree(nodes: &[HierarchyNode]) -> String {
    let mut out = String::new();
    // Open intervals, innermost last
    let mut open: Vec<i64> = Vec::new();

    for node in nodes {
        while open.last().is_some_and(|max| node.position_id > *max) {
            open.pop();
        }
        let _ = writeln!(
            out,
            "{}{} ({}) [{}..{}]",
            "  ".repeat(open.len()),
            node.name,
            node.code,
            node.position_id,
            node.max_descendant_position_id
        );
        open.push(node.max_descendant_position_id);
    }
    out
}

pub fn render_import_report(report: &ImportReport) -> String {
    let mut out = format!(
        "imported: {} inserted, {} updated, {} orphaned\n",
        report.inserted,
        report.updated,
        report.orphaned.len()
    );

    if !report.orphaned.is_empty() {
        out.push_str("orphaned nodes moved under the root:\n");
        let _ = writeln!(
            out,
            "{:>10}  {:<16} {:<32} {:>8} {:>8}",
            "IDENTITY", "CODE", "NAME", "WAS", "NOW"
        );
        for orphan in &report.orphaned {
            let _ = writeln!(
                out,
                "{:>10}  {:<16} {:<32} {:>8} {:>8}",
                orphan.identity.value(),
                orphan.code,
                orphan.name,
                orphan.previous_position_id,
                orphan.position_id
            );
        }
    }
    out
}
