//! # Port Allocations
//!
//! Reserved port numbers for local development servers. A reservation is a
//! row in `ports`; whether something is actually listening is a runtime
//! question answered by the service's probe, not by the store.

use crate::clock;
use crate::patch::{Assignments, blank_to_null};
use crate::render::or_empty;
use crate::{Result, Store};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, Value, ValueRef};
use rusqlite::{Connection, OptionalExtension, Row, params};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const COLUMNS: &str = "id, port_number, server_type, name, description, created_at, updated_at";

/// Highest valid TCP port.
pub const MAX_PORT: i64 = 65_535;

/// Whether `n` is a usable TCP port number (1..=65535).
#[must_use]
pub fn validate_port_number(n: i64) -> bool {
    (1..=MAX_PORT).contains(&n)
}

// =============================================================================
// SERVER TYPE
// =============================================================================

/// The kind of server a port is reserved for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerType {
    Frontend,
    Backend,
    Api,
}

impl ServerType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Frontend => "frontend",
            Self::Backend => "backend",
            Self::Api => "api",
        }
    }
}

impl fmt::Display for ServerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a string is not a known server type.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid server type: {0}")]
pub struct ParseServerTypeError(pub String);

impl FromStr for ServerType {
    type Err = ParseServerTypeError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "frontend" => Ok(Self::Frontend),
            "backend" => Ok(Self::Backend),
            "api" => Ok(Self::Api),
            other => Err(ParseServerTypeError(other.to_string())),
        }
    }
}

impl ToSql for ServerType {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for ServerType {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e| FromSqlError::Other(Box::new(e)))
    }
}

impl From<ServerType> for Value {
    fn from(value: ServerType) -> Self {
        Self::Text(value.as_str().to_string())
    }
}

// =============================================================================
// RECORDS
// =============================================================================

/// A stored port reservation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Port {
    pub id: String,
    pub port_number: i64,
    pub server_type: ServerType,
    #[serde(serialize_with = "or_empty")]
    pub name: Option<String>,
    #[serde(serialize_with = "or_empty")]
    pub description: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl Port {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            port_number: row.get(1)?,
            server_type: row.get(2)?,
            name: row.get(3)?,
            description: row.get(4)?,
            created_at: row.get(5)?,
            updated_at: row.get(6)?,
        })
    }
}

/// Fields for a new reservation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPort {
    pub id: String,
    pub port_number: i64,
    pub server_type: ServerType,
    pub name: Option<String>,
    pub description: Option<String>,
}

/// A partial update; absent fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PortPatch {
    pub port_number: Option<i64>,
    pub server_type: Option<ServerType>,
    pub name: Option<Option<String>>,
    pub description: Option<Option<String>>,
}

// =============================================================================
// QUERIES
// =============================================================================

/// Port queries, obtained from [`Store::ports`].
#[derive(Debug, Clone, Copy)]
pub struct Ports<'a> {
    store: &'a Store,
}

impl Store {
    /// Access port reservation queries.
    #[must_use]
    pub fn ports(&self) -> Ports<'_> {
        Ports { store: self }
    }
}

pub(crate) fn insert(conn: &Connection, new: &NewPort) -> rusqlite::Result<usize> {
    let now = clock::now();
    conn.execute(
        "INSERT INTO ports (id, port_number, server_type, name, description, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
        params![
            new.id,
            new.port_number,
            new.server_type,
            blank_to_null(new.name.clone()),
            blank_to_null(new.description.clone()),
            now,
        ],
    )
}

fn find(conn: &Connection, id: &str) -> rusqlite::Result<Option<Port>> {
    conn.query_row(
        &format!("SELECT {COLUMNS} FROM ports WHERE id = ?1"),
        params![id],
        Port::from_row,
    )
    .optional()
}

impl Ports<'_> {
    /// All reservations ordered by server type, then port number.
    pub fn list(&self) -> Result<Vec<Port>> {
        self.store.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {COLUMNS} FROM ports ORDER BY server_type, port_number"
            ))?;
            let rows = stmt
                .query_map([], Port::from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
    }

    pub fn get(&self, id: &str) -> Result<Option<Port>> {
        self.store.with_conn(|conn| Ok(find(conn, id)?))
    }

    /// The reservation holding `port_number`, if any.
    pub fn get_by_number(&self, port_number: i64) -> Result<Option<Port>> {
        self.store.with_conn(|conn| {
            Ok(conn
                .query_row(
                    &format!("SELECT {COLUMNS} FROM ports WHERE port_number = ?1"),
                    params![port_number],
                    Port::from_row,
                )
                .optional()?)
        })
    }

    /// Reservations of one server type ordered by port number.
    pub fn by_server_type(&self, server_type: ServerType) -> Result<Vec<Port>> {
        self.store.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {COLUMNS} FROM ports WHERE server_type = ?1 ORDER BY port_number"
            ))?;
            let rows = stmt
                .query_map(params![server_type], Port::from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
    }

    /// Insert a reservation and return the stored row.
    pub fn create(&self, new: &NewPort) -> Result<Port> {
        self.store.with_conn(|conn| {
            insert(conn, new)?;
            Ok(find(conn, &new.id)?.ok_or(rusqlite::Error::QueryReturnedNoRows)?)
        })
    }

    /// Apply `patch`, bumping `updated_at` when anything changed.
    pub fn update(&self, id: &str, patch: PortPatch) -> Result<Option<Port>> {
        self.store.with_conn(|conn| {
            let mut set = Assignments::new();
            set.set_if("port_number", patch.port_number);
            set.set_if("server_type", patch.server_type);
            set.set_nullable("name", patch.name);
            set.set_nullable("description", patch.description);

            if !set.is_empty() {
                set.set("updated_at", clock::now());
                set.execute(conn, "ports", &[("id", Value::Text(id.to_string()))])?;
            }
            Ok(find(conn, id)?)
        })
    }

    /// Delete a reservation together with its traffic logs.
    pub fn delete(&self, id: &str) -> Result<bool> {
        self.store.with_tx(|tx| {
            let logs = tx.execute("DELETE FROM traffic_logs WHERE port_id = ?1", params![id])?;
            let changed = tx.execute("DELETE FROM ports WHERE id = ?1", params![id])?;
            tracing::debug!(port = id, logs, "port deleted");
            Ok(changed > 0)
        })
    }
}

// =============================================================================
// TESTS
// =============================================================================
