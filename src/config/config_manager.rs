// ==========================================
// Beneficiary reconciliation - config manager
// ==========================================
// Storage: config_kv table (key-value + scope), scope 'global'
// Missing keys fall back to defaults; malformed values are errors.
// ==========================================

use crate::config::import_config_trait::ImportConfigReader;
use crate::db::open_sqlite_connection;
use crate::importer::error::{ImportError, ImportResult};
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::json;
use std::collections::HashMap;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

// ==========================================
// ConfigManager
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// Open the database at `db_path`
    pub fn new(db_path: &str) -> ImportResult<Self> {
        let conn = open_sqlite_connection(db_path).map_err(|e| ImportError::ConfigReadError {
            key: "*".to_string(),
            message: e.to_string(),
        })?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Share an existing connection.
    ///
    /// The shared PRAGMAs are re-applied (idempotent).
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> ImportResult<Self> {
        {
            let guard = conn
                .lock()
                .map_err(|e| ImportError::InternalError(format!("lock poisoned: {}", e)))?;
            crate::db::configure_sqlite_connection(&guard).map_err(|e| {
                ImportError::ConfigReadError {
                    key: "*".to_string(),
                    message: e.to_string(),
                }
            })?;
        }

        Ok(Self { conn })
    }

    /// Read a global value (None when the key is absent)
    pub fn get_global_config_value(&self, key: &str) -> ImportResult<Option<String>> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| ImportError::InternalError(format!("lock poisoned: {}", e)))?;

        conn.query_row(
            "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
            params![key],
            |row| row.get::<_, String>(0),
        )
        .optional()
        .map_err(|e| ImportError::ConfigReadError {
            key: key.to_string(),
            message: e.to_string(),
        })
    }

    /// Upsert a global value
    pub fn set_global_config_value(&self, key: &str, value: &str) -> ImportResult<()> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| ImportError::InternalError(format!("lock poisoned: {}", e)))?;

        conn.execute(
            "INSERT INTO config_kv (scope_id, key, value) VALUES ('global', ?1, ?2)
             ON CONFLICT(scope_id, key) DO UPDATE SET value = ?2, updated_at = datetime('now')",
            params![key, value],
        )
        .map_err(|e| ImportError::ConfigReadError {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        Ok(())
    }

    /// JSON snapshot of every global key, logged at the start of a run
    pub fn get_config_snapshot(&self) -> ImportResult<String> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| ImportError::InternalError(format!("lock poisoned: {}", e)))?;

        let to_config_err = |e: rusqlite::Error| ImportError::ConfigReadError {
            key: "*".to_string(),
            message: e.to_string(),
        };

        let mut stmt = conn
            .prepare("SELECT key, value FROM config_kv WHERE scope_id = 'global' ORDER BY key")
            .map_err(to_config_err)?;
        let rows = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })
            .map_err(to_config_err)?;

        let mut config_map: HashMap<String, String> = HashMap::new();
        for row in rows {
            let (key, value) = row.map_err(to_config_err)?;
            config_map.insert(key, value);
        }

        Ok(json!(config_map).to_string())
    }

    /// Parse a numeric key, falling back to `default` when absent.
    fn get_parsed_or_default<T>(&self, key: &str, default: T) -> ImportResult<T>
    where
        T: FromStr + PartialOrd + Default,
        T::Err: std::fmt::Display,
    {
        let raw = match self.get_global_config_value(key)? {
            Some(v) => v,
            None => return Ok(default),
        };

        let parsed = raw
            .trim()
            .parse::<T>()
            .map_err(|e| ImportError::ConfigValueError {
                key: key.to_string(),
                value: raw.clone(),
                message: e.to_string(),
            })?;

        if parsed <= T::default() {
            return Err(ImportError::ConfigValueError {
                key: key.to_string(),
                value: raw,
                message: "must be greater than zero".to_string(),
            });
        }
        Ok(parsed)
    }
}

// ==========================================
// ImportConfigReader impl
// ==========================================
#[async_trait]
impl ImportConfigReader for ConfigManager {
    async fn get_age_ceiling_years(&self) -> ImportResult<u32> {
        self.get_parsed_or_default(config_keys::AGE_CEILING_YEARS, defaults::AGE_CEILING_YEARS)
    }

    async fn get_fourteen_or_less_years(&self) -> ImportResult<u32> {
        self.get_parsed_or_default(
            config_keys::FOURTEEN_OR_LESS_YEARS,
            defaults::FOURTEEN_OR_LESS_YEARS,
        )
    }

    async fn get_progress_publish_every_rows(&self) -> ImportResult<usize> {
        self.get_parsed_or_default(
            config_keys::PROGRESS_PUBLISH_EVERY_ROWS,
            defaults::PROGRESS_PUBLISH_EVERY_ROWS,
        )
    }

    async fn get_exclusion_report_dir(&self) -> ImportResult<PathBuf> {
        match self.get_global_config_value(config_keys::EXCLUSION_REPORT_DIR)? {
            Some(dir) if !dir.trim().is_empty() => Ok(PathBuf::from(dir.trim())),
            _ => Ok(defaults::exclusion_report_dir()),
        }
    }
}

// ==========================================
// Config keys
// ==========================================
pub mod config_keys {
    pub const AGE_CEILING_YEARS: &str = "age_ceiling_years";
    pub const FOURTEEN_OR_LESS_YEARS: &str = "fourteen_or_less_years";
    pub const PROGRESS_PUBLISH_EVERY_ROWS: &str = "progress_publish_every_rows";
    pub const EXCLUSION_REPORT_DIR: &str = "exclusion_report_dir";
}

pub mod defaults {
    use std::path::PathBuf;

    pub const AGE_CEILING_YEARS: u32 = 18;
    pub const FOURTEEN_OR_LESS_YEARS: u32 = 14;
    pub const PROGRESS_PUBLISH_EVERY_ROWS: usize = 500;

    pub fn exclusion_report_dir() -> PathBuf {
        crate::db::default_data_dir().join("reports")
    }
}
