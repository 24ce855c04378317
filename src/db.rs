// ==========================================
// Beneficiary reconciliation - SQLite connection setup
// ==========================================
// - Same PRAGMAs for every Connection::open
// - busy_timeout to absorb short write contention
// - Idempotent schema creation for families/dependents/config
// ==========================================

use rusqlite::Connection;
use rusqlite::OptionalExtension;
use std::path::PathBuf;
use std::time::Duration;

/// Default busy_timeout (milliseconds)
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// Schema version written by `ensure_schema`
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

/// Directory name under the platform data dir
pub const APP_DIR_NAME: &str = "beneficiary-reconciliation";

/// Apply the shared PRAGMAs to a connection.
///
/// foreign_keys and busy_timeout are per-connection settings.
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// Open a SQLite connection with the shared configuration
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// Create every table the engine uses (no-op when present).
pub fn ensure_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS config_scope (
            scope_id TEXT PRIMARY KEY,
            scope_type TEXT NOT NULL,
            scope_key TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            UNIQUE(scope_type, scope_key)
        );

        INSERT OR IGNORE INTO config_scope (scope_id, scope_type, scope_key)
        VALUES ('global', 'GLOBAL', 'global');

        CREATE TABLE IF NOT EXISTS config_kv (
            scope_id TEXT NOT NULL REFERENCES config_scope(scope_id) ON DELETE CASCADE,
            key TEXT NOT NULL,
            value TEXT NOT NULL,
            updated_at TEXT NOT NULL DEFAULT (datetime('now')),
            PRIMARY KEY (scope_id, key)
        );

        CREATE TABLE IF NOT EXISTS families (
            family_id TEXT PRIMARY KEY,
            city_id TEXT NOT NULL,
            code TEXT NOT NULL,
            guardian_nis TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            UNIQUE(city_id, code)
        );

        CREATE INDEX IF NOT EXISTS idx_families_guardian
          ON families(city_id, guardian_nis);

        CREATE TABLE IF NOT EXISTS dependents (
            dependent_id TEXT PRIMARY KEY,
            family_id TEXT NOT NULL REFERENCES families(family_id),
            city_id TEXT NOT NULL,
            nis TEXT NOT NULL,
            name TEXT NOT NULL,
            birth_date TEXT,
            is_responsible INTEGER NOT NULL DEFAULT 0,
            school_name TEXT,
            enrollment_source TEXT,
            occupation TEXT,
            monthly_income REAL,
            created_at TEXT NOT NULL,
            deactivated_at TEXT
        );

        CREATE UNIQUE INDEX IF NOT EXISTS ux_dependents_active_nis
          ON dependents(city_id, nis) WHERE deactivated_at IS NULL;

        CREATE UNIQUE INDEX IF NOT EXISTS ux_dependents_one_responsible
          ON dependents(family_id) WHERE is_responsible = 1 AND deactivated_at IS NULL;

        CREATE INDEX IF NOT EXISTS idx_dependents_family
          ON dependents(family_id);
        "#,
    )?;

    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
        [CURRENT_SCHEMA_VERSION],
    )?;
    Ok(())
}

/// Read schema_version (None when the table does not exist)
pub fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<i64>> {
    let has_table: bool = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version' LIMIT 1",
            [],
            |_row| Ok(true),
        )
        .optional()?
        .unwrap_or(false);

    if !has_table {
        return Ok(None);
    }

    let v: Option<i64> =
        conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    Ok(v)
}

/// Platform data directory for this application
pub fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR_NAME)
}

/// Default database file location
pub fn default_db_path() -> PathBuf {
    default_data_dir().join("beneficiaries.db")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ensure_schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        configure_sqlite_connection(&conn).unwrap();
        assert_eq!(read_schema_version(&conn).unwrap(), None);

        ensure_schema(&conn).unwrap();
        ensure_schema(&conn).unwrap();

        assert_eq!(read_schema_version(&conn).unwrap(), Some(CURRENT_SCHEMA_VERSION));
    }

    #[test]
    fn test_active_nis_is_unique_per_city() {
        let conn = Connection::open_in_memory().unwrap();
        ensure_schema(&conn).unwrap();
        conn.execute_batch(
            r#"
            INSERT INTO families VALUES ('f1', 'c1', 'A', '1', 't', 't');
            INSERT INTO dependents (dependent_id, family_id, city_id, nis, name, created_at)
              VALUES ('d1', 'f1', 'c1', '999', 'Ana', 't');
            "#,
        )
        .unwrap();

        let dup = conn.execute(
            "INSERT INTO dependents (dependent_id, family_id, city_id, nis, name, created_at)
             VALUES ('d2', 'f1', 'c1', '999', 'Ana', 't')",
            [],
        );
        assert!(dup.is_err());

        conn.execute("UPDATE dependents SET deactivated_at = 't2' WHERE dependent_id = 'd1'", [])
            .unwrap();
        conn.execute(
            "INSERT INTO dependents (dependent_id, family_id, city_id, nis, name, created_at)
             VALUES ('d3', 'f1', 'c1', '999', 'Ana', 't')",
            [],
        )
        .unwrap();
    }
}
