//! TursoHierarchyStore - HierarchyStore Implementation for libsql
//!
//! This module implements the `HierarchyStore` and `HierarchyTransaction`
//! traits on top of an embedded libsql database created by [`DatabaseService`].
//!
//! # Design Principles
//!
//! 1. **Connection per Operation**: Store reads and autocommit writes open a
//!    fresh connection, so under WAL they only ever see committed data
//! 2. **Connection per Import**: `begin_import` opens a dedicated connection
//!    and issues `BEGIN IMMEDIATE`; the returned handle owns it until
//!    `commit`/`rollback`
//! 3. **Row Conversion**: All reads go through `row_to_node`
//! 4. **No Business Logic**: Ordering, orphaning and reparenting decisions live
//!    in the import engine; this layer only issues the statements
//!
//! # Examples
//!
//! ```rust,no_run
//! use hierarchy_sync_core::db::{DatabaseService, HierarchyStore, TursoHierarchyStore};
//! use std::path::PathBuf;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Arc::new(DatabaseService::new(PathBuf::from("./data/hierarchy.db")).await?);
//!     let store = TursoHierarchyStore::new(db);
//!
//!     let max = store.max_position_id().await?;
//!     println!("highest position: {:?}", max);
//!     Ok(())
//! }
//! ```

use crate::db::hierarchy_store::{HierarchyStore, HierarchyTransaction, IdentityLookup};
use crate::db::{DatabaseError, DatabaseService};
use crate::models::{DuplicateCode, HierarchyEntry, HierarchyId, HierarchyNode};
use async_trait::async_trait;
use libsql::params::IntoParams;
use libsql::{Connection, Row};
use std::sync::Arc;

const NODE_COLUMNS: &str =
    "identity, position_id, parent_position_id, max_descendant_position_id, code, name";

/// libsql-backed hierarchy store
pub struct TursoHierarchyStore {
    db: Arc<DatabaseService>,
}

impl TursoHierarchyStore {
    pub fn new(db: Arc<DatabaseService>) -> Self {
        Self { db }
    }
}

/// Write transaction holding its own libsql connection
pub struct TursoHierarchyTransaction {
    conn: Connection,
}

/// Convert libsql::Row to HierarchyNode
///
/// # Row Format
///
/// Expected columns (in order), see `NODE_COLUMNS`:
/// - identity (INTEGER)
/// - position_id (INTEGER)
/// - parent_position_id (INTEGER)
/// - max_descendant_position_id (INTEGER)
/// - code (TEXT)
/// - name (TEXT)
fn row_to_node(row: &Row) -> Result<HierarchyNode, DatabaseError> {
    let column_err = |column: &str, e: libsql::Error| {
        DatabaseError::sql_execution(format!("Failed to get {}: {}", column, e))
    };

    let identity: i64 = row.get(0).map_err(|e| column_err("identity", e))?;
    let position_id: i64 = row.get(1).map_err(|e| column_err("position_id", e))?;
    let parent_position_id: i64 = row.get(2).map_err(|e| column_err("parent_position_id", e))?;
    let max_descendant_position_id: i64 = row
        .get(3)
        .map_err(|e| column_err("max_descendant_position_id", e))?;
    let code: String = row.get(4).map_err(|e| column_err("code", e))?;
    let name: String = row.get(5).map_err(|e| column_err("name", e))?;

    Ok(HierarchyNode {
        identity: HierarchyId::new(identity),
        position_id,
        parent_position_id,
        max_descendant_position_id,
        code,
        name,
    })
}

async fn query_nodes(
    conn: &Connection,
    sql: &str,
    params: impl IntoParams,
) -> Result<Vec<HierarchyNode>, DatabaseError> {
    let mut rows = conn.query(sql, params).await.map_err(|e| {
        DatabaseError::sql_execution(format!("Failed to execute query '{}': {}", sql, e))
    })?;

    let mut nodes = Vec::new();
    while let Some(row) = rows
        .next()
        .await
        .map_err(|e| DatabaseError::sql_execution(e.to_string()))?
    {
        nodes.push(row_to_node(&row)?);
    }
    Ok(nodes)
}

async fn query_single_node(
    conn: &Connection,
    sql: &str,
    params: impl IntoParams,
) -> Result<Option<HierarchyNode>, DatabaseError> {
    let mut nodes = query_nodes(conn, sql, params).await?;
    match nodes.len() {
        0 => Ok(None),
        1 => Ok(nodes.pop()),
        n => Err(DatabaseError::invariant_violation(format!(
            "expected at most one row for '{}', found {}",
            sql, n
        ))),
    }
}

async fn execute_statement(
    conn: &Connection,
    sql: &str,
    context: &str,
) -> Result<u64, DatabaseError> {
    conn.execute(sql, ())
        .await
        .map_err(|e| DatabaseError::sql_execution(format!("{}: {}", context, e)))
}

async fn load_all_nodes(conn: &Connection) -> Result<Vec<HierarchyNode>, DatabaseError> {
    query_nodes(
        conn,
        &format!("SELECT {} FROM hierarchy ORDER BY position_id", NODE_COLUMNS),
        (),
    )
    .await
}

async fn select_identity_by_code(
    conn: &Connection,
    code: &str,
) -> Result<Option<HierarchyId>, DatabaseError> {
    let mut rows = conn
        .query("SELECT identity FROM hierarchy WHERE code = ?", [code])
        .await
        .map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to look up code '{}': {}", code, e))
        })?;

    let mut identities = Vec::with_capacity(1);
    while let Some(row) = rows
        .next()
        .await
        .map_err(|e| DatabaseError::sql_execution(e.to_string()))?
    {
        let identity: i64 = row.get(0)?;
        identities.push(HierarchyId::new(identity));
    }

    match identities.as_slice() {
        [] => Ok(None),
        [identity] => Ok(Some(*identity)),
        many => Err(DatabaseError::invariant_violation(format!(
            "code '{}' resolves to {} rows",
            code,
            many.len()
        ))),
    }
}

async fn select_max_position(conn: &Connection) -> Result<Option<i64>, DatabaseError> {
    let mut rows = conn
        .query("SELECT MAX(position_id) FROM hierarchy", ())
        .await
        .map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to query max position: {}", e))
        })?;

    match rows
        .next()
        .await
        .map_err(|e| DatabaseError::sql_execution(e.to_string()))?
    {
        Some(row) => Ok(row.get::<Option<i64>>(0)?),
        None => Ok(None),
    }
}

async fn write_entry(
    conn: &Connection,
    identity: Option<HierarchyId>,
    entry: &HierarchyEntry,
) -> Result<HierarchyId, DatabaseError> {
    match identity {
        None => {
            conn.execute(
                "INSERT INTO hierarchy (position_id, parent_position_id, max_descendant_position_id, code, name)
                 VALUES (?, ?, ?, ?, ?)",
                (
                    entry.position_id,
                    entry.parent_position_id,
                    entry.max_descendant_position_id,
                    entry.code.as_str(),
                    entry.name.as_str(),
                ),
            )
            .await
            .map_err(|e| {
                DatabaseError::sql_execution(format!(
                    "Failed to insert node '{}': {}",
                    entry.code, e
                ))
            })?;

            Ok(HierarchyId::new(conn.last_insert_rowid()))
        }
        Some(identity) => {
            let affected = conn
                .execute(
                    "UPDATE hierarchy
                     SET position_id = ?, parent_position_id = ?, max_descendant_position_id = ?, code = ?, name = ?
                     WHERE identity = ?",
                    (
                        entry.position_id,
                        entry.parent_position_id,
                        entry.max_descendant_position_id,
                        entry.code.as_str(),
                        entry.name.as_str(),
                        identity.value(),
                    ),
                )
                .await
                .map_err(|e| {
                    DatabaseError::sql_execution(format!(
                        "Failed to update node '{}' (identity {}): {}",
                        entry.code, identity, e
                    ))
                })?;

            if affected != 1 {
                return Err(DatabaseError::invariant_violation(format!(
                    "update of identity {} affected {} rows",
                    identity, affected
                )));
            }
            Ok(identity)
        }
    }
}

#[async_trait]
impl IdentityLookup for TursoHierarchyStore {
    async fn find_identity_by_code(
        &self,
        code: &str,
    ) -> Result<Option<HierarchyId>, DatabaseError> {
        let conn = self.db.connect_with_timeout().await?;
        select_identity_by_code(&conn, code).await
    }
}

#[async_trait]
impl HierarchyStore for TursoHierarchyStore {
    async fn find_duplicate_codes(&self) -> Result<Vec<DuplicateCode>, DatabaseError> {
        let conn = self.db.connect_with_timeout().await?;
        let mut rows = conn
            .query(
                "SELECT code, COUNT(*) FROM hierarchy GROUP BY code HAVING COUNT(*) > 1 ORDER BY code",
                (),
            )
            .await
            .map_err(|e| {
                DatabaseError::sql_execution(format!("Failed to query duplicate codes: {}", e))
            })?;

        let mut duplicates = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::sql_execution(e.to_string()))?
        {
            let code: String = row.get(0)?;
            let count: i64 = row.get(1)?;
            duplicates.push(DuplicateCode {
                code,
                count: count as usize,
            });
        }
        Ok(duplicates)
    }

    async fn find_by_code(&self, code: &str) -> Result<Option<HierarchyNode>, DatabaseError> {
        let conn = self.db.connect_with_timeout().await?;
        query_single_node(
            &conn,
            &format!("SELECT {} FROM hierarchy WHERE code = ?", NODE_COLUMNS),
            [code],
        )
        .await
    }

    async fn find_by_identity(
        &self,
        identity: HierarchyId,
    ) -> Result<Option<HierarchyNode>, DatabaseError> {
        let conn = self.db.connect_with_timeout().await?;
        query_single_node(
            &conn,
            &format!("SELECT {} FROM hierarchy WHERE identity = ?", NODE_COLUMNS),
            [identity.value()],
        )
        .await
    }

    async fn load_all(&self) -> Result<Vec<HierarchyNode>, DatabaseError> {
        let conn = self.db.connect_with_timeout().await?;
        load_all_nodes(&conn).await
    }

    async fn load_subtree(&self, position_id: i64) -> Result<Vec<HierarchyNode>, DatabaseError> {
        let conn = self.db.connect_with_timeout().await?;
        // NULL upper bound (no such node) matches nothing
        query_nodes(
            &conn,
            &format!(
                "SELECT {} FROM hierarchy
                 WHERE position_id BETWEEN ?1
                   AND (SELECT max_descendant_position_id FROM hierarchy WHERE position_id = ?1)
                 ORDER BY position_id",
                NODE_COLUMNS
            ),
            [position_id],
        )
        .await
    }

    async fn max_position_id(&self) -> Result<Option<i64>, DatabaseError> {
        let conn = self.db.connect_with_timeout().await?;
        select_max_position(&conn).await
    }

    async fn upsert(
        &self,
        identity: Option<HierarchyId>,
        entry: &HierarchyEntry,
    ) -> Result<HierarchyId, DatabaseError> {
        let conn = self.db.connect_with_timeout().await?;
        write_entry(&conn, identity, entry).await
    }

    async fn begin_import(&self) -> Result<Box<dyn HierarchyTransaction>, DatabaseError> {
        let conn = self.db.connect_with_timeout().await?;
        // IMMEDIATE takes the write lock up front; other writers wait on busy_timeout
        execute_statement(
            &conn,
            "BEGIN IMMEDIATE TRANSACTION",
            "Failed to begin transaction",
        )
        .await?;
        Ok(Box::new(TursoHierarchyTransaction { conn }))
    }
}

#[async_trait]
impl IdentityLookup for TursoHierarchyTransaction {
    async fn find_identity_by_code(
        &self,
        code: &str,
    ) -> Result<Option<HierarchyId>, DatabaseError> {
        select_identity_by_code(&self.conn, code).await
    }
}

#[async_trait]
impl HierarchyTransaction for TursoHierarchyTransaction {
    async fn load_all(&self) -> Result<Vec<HierarchyNode>, DatabaseError> {
        load_all_nodes(&self.conn).await
    }

    async fn max_position_id(&self) -> Result<Option<i64>, DatabaseError> {
        select_max_position(&self.conn).await
    }

    async fn upsert(
        &self,
        identity: Option<HierarchyId>,
        entry: &HierarchyEntry,
    ) -> Result<HierarchyId, DatabaseError> {
        write_entry(&self.conn, identity, entry).await
    }

    async fn load_orphans(&self) -> Result<Vec<HierarchyNode>, DatabaseError> {
        query_nodes(
            &self.conn,
            &format!(
                "SELECT {} FROM hierarchy WHERE position_id < 0 ORDER BY position_id DESC",
                NODE_COLUMNS
            ),
            (),
        )
        .await
    }

    async fn set_max_descendant(
        &self,
        position_id: i64,
        max_descendant_position_id: i64,
    ) -> Result<u64, DatabaseError> {
        self.conn
            .execute(
                "UPDATE hierarchy SET max_descendant_position_id = ? WHERE position_id = ?",
                (max_descendant_position_id, position_id),
            )
            .await
            .map_err(|e| {
                DatabaseError::sql_execution(format!(
                    "Failed to update max descendant of position {}: {}",
                    position_id, e
                ))
            })
    }

    async fn commit(&self) -> Result<(), DatabaseError> {
        execute_statement(&self.conn, "COMMIT", "Failed to commit transaction")
            .await
            .map(|_| ())
    }

    async fn rollback(&self) -> Result<(), DatabaseError> {
        execute_statement(&self.conn, "ROLLBACK", "Failed to roll back transaction")
            .await
            .map(|_| ())
    }
}
