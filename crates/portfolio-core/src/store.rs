//! # Store
//!
//! SQLite-backed storage for the portfolio service.
//!
//! A [`Store`] owns one connection behind a mutex and is cheap to clone, so
//! request handlers share it directly. Opening a store creates the schema,
//! applies migrations for older layouts, and enables foreign keys.

use crate::{Result, StoreError};
use rusqlite::{Connection, OpenFlags, Transaction};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Schema SQL embedded at compile time.
const SCHEMA_SQL: &str = include_str!("schema.sql");

/// Columns an early `ports` layout used before the switch to snake_case.
const LEGACY_PORT_COLUMNS: [&str; 3] = ["portNumber", "serverType", "createdAt"];

const PORTS_TABLE_SQL: &str = "CREATE TABLE ports (
    id TEXT PRIMARY KEY,
    port_number INTEGER UNIQUE NOT NULL,
    server_type TEXT NOT NULL CHECK(server_type IN ('frontend', 'backend', 'api')),
    name TEXT,
    description TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
)";

// =============================================================================
// STORE
// =============================================================================

/// The portfolio database.
#[derive(Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
    path: Option<PathBuf>,
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store").field("path", &self.path).finish()
    }
}

impl Store {
    /// Opens or creates a database at the specified path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or initialized.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        Self::initialize(&conn)?;
        tracing::debug!(path = %path.display(), "database opened");

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path: Some(path.to_path_buf()),
        })
    }

    /// Creates an in-memory database, used by tests.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::initialize(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path: None,
        })
    }

    /// The file backing this store, if any.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn initialize(conn: &Connection) -> Result<()> {
        conn.execute_batch(SCHEMA_SQL)?;
        migrate(conn)
    }

    /// Run `f` with the locked connection.
    pub(crate) fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let conn = self.conn.lock().map_err(|_| StoreError::LockPoisoned)?;
        f(&conn)
    }

    /// Run `f` inside a transaction; commits on `Ok`, rolls back on `Err`.
    pub(crate) fn with_tx<T>(&self, f: impl FnOnce(&Transaction<'_>) -> Result<T>) -> Result<T> {
        let mut conn = self.conn.lock().map_err(|_| StoreError::LockPoisoned)?;
        let tx = conn.transaction()?;
        let value = f(&tx)?;
        tx.commit()?;
        Ok(value)
    }

    /// Row counts for every table.
    pub fn counts(&self) -> Result<TableCounts> {
        self.with_conn(|conn| {
            let count = |table: &str| -> Result<u64> {
                let n: i64 =
                    conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
                        row.get(0)
                    })?;
                Ok(n as u64)
            };
            Ok(TableCounts {
                partitions: count("partitions")?,
                projects: count("projects")?,
                project_partitions: count("project_partitions")?,
                ports: count("ports")?,
                traffic_logs: count("traffic_logs")?,
            })
        })
    }
}

/// Number of rows in each table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TableCounts {
    pub partitions: u64,
    pub projects: u64,
    pub project_partitions: u64,
    pub ports: u64,
    pub traffic_logs: u64,
}

// =============================================================================
// MIGRATIONS
// =============================================================================

fn table_columns(conn: &Connection, table: &str) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table})"))?;
    let columns = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(columns)
}

/// Bring tables created by older versions up to the current layout.
fn migrate(conn: &Connection) -> Result<()> {
    let port_columns = table_columns(conn, "ports")?;
    if port_columns
        .iter()
        .any(|c| LEGACY_PORT_COLUMNS.contains(&c.as_str()))
    {
        tracing::info!("recreating ports table with snake_case columns");
        if let Err(e) = conn.execute_batch(&format!("DROP TABLE IF EXISTS ports; {PORTS_TABLE_SQL};"))
        {
            tracing::warn!(error = %e, "ports migration failed");
        }
    }

    let project_columns = table_columns(conn, "projects")?;
    if !project_columns.iter().any(|c| c == "nsfw") {
        tracing::info!("adding projects.nsfw column");
        conn.execute_batch(
            "ALTER TABLE projects ADD COLUMN nsfw INTEGER DEFAULT 0;
             UPDATE projects SET nsfw = 0 WHERE nsfw IS NULL;",
        )?;
    }
    if !project_columns.iter().any(|c| c == "logoUrl") {
        tracing::info!("adding projects.logoUrl column");
        conn.execute_batch("ALTER TABLE projects ADD COLUMN logoUrl TEXT;")?;
    }

    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn in_memory_store_starts_empty() {
        let store = Store::in_memory().unwrap();
        assert_eq!(store.counts().unwrap(), TableCounts::default());
        assert!(store.path().is_none());
    }

    #[test]
    fn foreign_keys_are_enforced() {
        let store = Store::in_memory().unwrap();
        let enabled: i64 = store
            .with_conn(|conn| Ok(conn.query_row("PRAGMA foreign_keys", [], |r| r.get(0))?))
            .unwrap();
        assert_eq!(enabled, 1);
    }

    #[test]
    fn reopening_file_store_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("portfolio.db");

        let store = Store::open(&path).unwrap();
        store
            .with_conn(|conn| {
                conn.execute(
                    "INSERT INTO partitions (id, slug, name, sortOrder) VALUES ('a', 'a', 'A', 1)",
                    [],
                )?;
                Ok(())
            })
            .unwrap();
        drop(store);

        let reopened = Store::open(&path).unwrap();
        assert_eq!(reopened.counts().unwrap().partitions, 1);
        assert_eq!(reopened.path(), Some(path.as_path()));
    }

    #[test]
    fn legacy_layouts_are_migrated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("legacy.db");
        {
            let conn = Connection::open(&path).unwrap();
            conn.execute_batch(
                "CREATE TABLE ports (id TEXT PRIMARY KEY, portNumber INTEGER, serverType TEXT, createdAt TEXT);
                 CREATE TABLE projects (
                     id TEXT PRIMARY KEY, slug TEXT UNIQUE NOT NULL, name TEXT NOT NULL,
                     tagline TEXT, shortDescription TEXT, longDescription TEXT,
                     status TEXT NOT NULL, primaryRepoUrl TEXT, liveUrl TEXT,
                     githubRepoFullName TEXT, createdAt TEXT NOT NULL, updatedAt TEXT NOT NULL,
                     inPortfolio INTEGER DEFAULT 1
                 );
                 INSERT INTO projects (id, slug, name, status, createdAt, updatedAt)
                 VALUES ('p', 'p', 'P', 'live', 't', 't');",
            )
            .unwrap();
        }

        let store = Store::open(&path).unwrap();
        let (ports, projects) = store
            .with_conn(|conn| Ok((table_columns(conn, "ports")?, table_columns(conn, "projects")?)))
            .unwrap();
        assert!(ports.iter().any(|c| c == "port_number"));
        assert!(!ports.iter().any(|c| c == "portNumber"));
        assert!(projects.iter().any(|c| c == "nsfw"));
        assert!(projects.iter().any(|c| c == "logoUrl"));

        let nsfw: i64 = store
            .with_conn(|conn| {
                Ok(conn.query_row("SELECT nsfw FROM projects WHERE id = 'p'", [], |r| r.get(0))?)
            })
            .unwrap();
        assert_eq!(nsfw, 0);
    }
}
