/// Configuration for hierarchy export and import
use crate::db::DEFAULT_BUSY_TIMEOUT_MS;
use crate::services::ImportOptions;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const ENV_DB_PATH: &str = "HIERARCHY_SYNC_DB_PATH";
pub const ENV_BUSY_TIMEOUT_MS: &str = "HIERARCHY_SYNC_BUSY_TIMEOUT_MS";
pub const ENV_TRUST_DOCUMENT: &str = "HIERARCHY_SYNC_TRUST_DOCUMENT";

/// Upper bound for the SQLite busy timeout (one minute)
const MAX_BUSY_TIMEOUT_MS: u32 = 60_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HierarchySyncConfig {
    /// Database file; `None` means `~/.hierarchy-sync/hierarchy.db`
    pub database_path: Option<PathBuf>,

    /// How long a connection waits on a locked database
    pub busy_timeout_ms: u32,

    /// Validate interval structure of import documents before writing
    pub validate_document_structure: bool,
}

impl Default for HierarchySyncConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            validate_document_structure: true,
        }
    }
}

impl HierarchySyncConfig {
    /// Defaults overlaid with `HIERARCHY_SYNC_*` environment variables
    pub fn from_env() -> Result<Self, String> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overlaid with values from `lookup`
    ///
    /// Split out of [`Self::from_env`] so callers (and tests) can supply
    /// variables without touching the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(path) = lookup(ENV_DB_PATH).filter(|p| !p.trim().is_empty()) {
            config.database_path = Some(PathBuf::from(path));
        }

        if let Some(raw) = lookup(ENV_BUSY_TIMEOUT_MS) {
            config.busy_timeout_ms = raw
                .trim()
                .parse()
                .map_err(|e| format!("{} must be an integer: {}", ENV_BUSY_TIMEOUT_MS, e))?;
        }

        if let Some(raw) = lookup(ENV_TRUST_DOCUMENT) {
            config.validate_document_structure = !parse_flag(ENV_TRUST_DOCUMENT, &raw)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Get the database path, falling back to `~/.hierarchy-sync/hierarchy.db`
    pub fn resolve_database_path(&self) -> Result<PathBuf, std::io::Error> {
        if let Some(path) = &self.database_path {
            return Ok(path.clone());
        }

        let home_dir = dirs::home_dir().ok_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "Cannot determine home directory",
            )
        })?;

        Ok(home_dir.join(".hierarchy-sync").join("hierarchy.db"))
    }

    pub fn import_options(&self) -> ImportOptions {
        ImportOptions {
            validate_document_structure: self.validate_document_structure,
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.busy_timeout_ms > MAX_BUSY_TIMEOUT_MS {
            return Err(format!(
                "busy_timeout_ms cannot exceed {}",
                MAX_BUSY_TIMEOUT_MS
            ));
        }

        if let Some(path) = &self.database_path {
            if path.as_os_str().is_empty() {
                return Err("database_path cannot be empty".to_string());
            }
            if path.is_dir() {
                return Err(format!("database_path {:?} is a directory", path));
            }
        }

        Ok(())
    }
}

fn parse_flag(name: &str, raw: &str) -> Result<bool, String> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => Err(format!("{} must be a boolean, got {:?}", name, other)),
    }
}
