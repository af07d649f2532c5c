//! Database Connection Management
//!
//! This module provides the core database connection and initialization
//! functionality using libsql for hierarchy storage.
//!
//! # Architecture
//!
//! - **Path-agnostic**: Accepts any valid PathBuf
//! - **WAL mode**: Write-Ahead Logging so readers on other connections never
//!   observe an uncommitted import
//! - **Immediate uniqueness**: `position_id` is `UNIQUE`, checked per statement
//! - **Codes not constrained**: `code` uniqueness is a checked precondition, not
//!   a schema constraint, matching how hierarchies are administered upstream
//!
//! # Database Connection Patterns
//!
//! Use `connect_with_timeout()` in async functions. The busy timeout lets a
//! second connection wait for an in-flight import to commit instead of failing
//! immediately with `SQLITE_BUSY`.
//!
//! ```no_run
//! # use hierarchy_sync_core::db::DatabaseService;
//! # use std::path::PathBuf;
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let db_service = DatabaseService::new(PathBuf::from("./data/hierarchy.db")).await?;
//! let conn = db_service.connect_with_timeout().await?;
//! # Ok(())
//! # }
//! ```

use crate::db::error::DatabaseError;
use libsql::{Builder, Database};
use std::path::PathBuf;
use std::sync::Arc;

/// Busy timeout applied to every connection unless configured otherwise
pub const DEFAULT_BUSY_TIMEOUT_MS: u32 = 5000;

/// Database service for managing libsql connection and schema
///
/// # Examples
///
/// ```no_run
/// use hierarchy_sync_core::db::DatabaseService;
/// use std::path::PathBuf;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let db_path = PathBuf::from("/path/to/hierarchy.db");
///     let db_service = DatabaseService::new(db_path).await?;
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct DatabaseService {
    /// libsql database connection (wrapped in Arc for sharing)
    pub db: Arc<Database>,

    /// Path to the database file
    pub db_path: PathBuf,

    busy_timeout_ms: u32,
}

impl DatabaseService {
    /// Create a new DatabaseService with the default busy timeout
    ///
    /// This will:
    /// 1. Ensure the parent directory exists (create if needed)
    /// 2. Open/create the database file
    /// 3. Initialize the schema (CREATE TABLE IF NOT EXISTS)
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if:
    /// - Parent directory cannot be created
    /// - Database connection fails
    /// - Schema initialization fails
    pub async fn new(db_path: PathBuf) -> Result<Self, DatabaseError> {
        Self::with_busy_timeout(db_path, DEFAULT_BUSY_TIMEOUT_MS).await
    }

    /// Create a new DatabaseService with an explicit busy timeout (milliseconds)
    pub async fn with_busy_timeout(
        db_path: PathBuf,
        busy_timeout_ms: u32,
    ) -> Result<Self, DatabaseError> {
        // Only new databases need the post-schema checkpoint
        let is_new_database = !db_path.exists();

        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    if e.kind() == std::io::ErrorKind::PermissionDenied {
                        DatabaseError::permission_denied(db_path.clone())
                    } else {
                        DatabaseError::DirectoryCreationFailed(e)
                    }
                })?;
            }
        }

        let db = Builder::new_local(&db_path)
            .build()
            .await
            .map_err(|e| DatabaseError::connection_failed(db_path.clone(), e))?;

        let service = Self {
            db: Arc::new(db),
            db_path,
            busy_timeout_ms,
        };

        service.initialize_schema(is_new_database).await?;

        Ok(service)
    }

    pub fn busy_timeout_ms(&self) -> u32 {
        self.busy_timeout_ms
    }

    /// Execute a PRAGMA statement
    ///
    /// PRAGMA statements return rows, so we must use query() instead of execute().
    async fn execute_pragma(
        &self,
        conn: &libsql::Connection,
        pragma: &str,
    ) -> Result<(), DatabaseError> {
        let mut stmt = conn.prepare(pragma).await.map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to execute '{}': {}", pragma, e))
        })?;
        let _ = stmt.query(()).await.map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to execute '{}': {}", pragma, e))
        })?;
        Ok(())
    }

    /// Initialize database schema and configuration
    ///
    /// Idempotent: safe to call against an existing database.
    ///
    /// # Schema
    ///
    /// - `hierarchy` table: one row per node; `identity` is the persistent
    ///   foreign-key target and is never reused (`AUTOINCREMENT`)
    /// - `idx_hierarchy_code`: point lookups by merge key
    async fn initialize_schema(&self, is_new_database: bool) -> Result<(), DatabaseError> {
        let conn = self.connect_with_timeout().await?;

        self.execute_pragma(&conn, "PRAGMA journal_mode = WAL")
            .await?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS hierarchy (
                identity INTEGER PRIMARY KEY AUTOINCREMENT,
                position_id INTEGER NOT NULL UNIQUE,
                parent_position_id INTEGER NOT NULL,
                max_descendant_position_id INTEGER NOT NULL,
                code TEXT NOT NULL,
                name TEXT NOT NULL
            )",
            (),
        )
        .await
        .map_err(|e| {
            DatabaseError::initialization_failed(format!(
                "Failed to create hierarchy table: {}",
                e
            ))
        })?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_hierarchy_code ON hierarchy(code)",
            (),
        )
        .await
        .map_err(|e| {
            DatabaseError::initialization_failed(format!(
                "Failed to create index 'idx_hierarchy_code': {}",
                e
            ))
        })?;

        if is_new_database {
            self.execute_pragma(&conn, "PRAGMA wal_checkpoint(TRUNCATE)")
                .await?;
        }

        Ok(())
    }

    /// Get a raw connection to the database
    ///
    /// Prefer `connect_with_timeout()` in async code.
    pub fn connect(&self) -> Result<libsql::Connection, DatabaseError> {
        self.db.connect().map_err(DatabaseError::LibsqlError)
    }

    /// Get a connection with the configured busy timeout applied
    pub async fn connect_with_timeout(&self) -> Result<libsql::Connection, DatabaseError> {
        let conn = self.connect()?;

        self.execute_pragma(
            &conn,
            &format!("PRAGMA busy_timeout = {}", self.busy_timeout_ms),
        )
        .await?;

        Ok(conn)
    }

    /// Flush the WAL so the database file is self-contained
    pub async fn db_close(&self) -> Result<(), DatabaseError> {
        let conn = self.connect_with_timeout().await?;
        self.execute_pragma(&conn, "PRAGMA wal_checkpoint(TRUNCATE)")
            .await?;
        Ok(())
    }
}
