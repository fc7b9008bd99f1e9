//! Partial-update helpers.
//!
//! Update requests only touch the fields the client sent. Nullable columns
//! need to tell "absent" apart from "explicitly null", which is what
//! [`double_option`] does; [`Assignments`] turns the present fields into a
//! single parameterized `UPDATE`.

use rusqlite::types::Value;
use rusqlite::{Connection, params_from_iter};
use serde::{Deserialize, Deserializer};

/// Deserialize a field as `Some(inner)` whenever the key is present,
/// including `Some(None)` for an explicit `null`.
///
/// Pair with `#[serde(default)]` so a missing key stays `None`.
pub fn double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Collapse empty strings to `None`.
#[must_use]
pub fn blank_to_null(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.is_empty())
}

/// Column assignments for a partial `UPDATE`.
#[derive(Debug, Default)]
pub struct Assignments {
    columns: Vec<&'static str>,
    values: Vec<Value>,
}

impl Assignments {
    /// Create an empty assignment list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Assign `value` to `column`.
    pub fn set(&mut self, column: &'static str, value: impl Into<Value>) {
        self.columns.push(column);
        self.values.push(value.into());
    }

    /// Assign `value` to `column` only if it is present.
    pub fn set_if<V: Into<Value>>(&mut self, column: &'static str, value: Option<V>) {
        if let Some(value) = value {
            self.set(column, value);
        }
    }

    /// Assign a nullable text column; present-but-empty becomes NULL.
    pub fn set_nullable(&mut self, column: &'static str, value: Option<Option<String>>) {
        if let Some(value) = value {
            self.set(column, blank_to_null(value));
        }
    }

    /// Whether nothing has been assigned.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Number of assigned columns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Render the `UPDATE` statement for `table` keyed by `keys`.
    #[must_use]
    pub fn to_sql(&self, table: &str, keys: &[&str]) -> String {
        let set = self
            .columns
            .iter()
            .enumerate()
            .map(|(i, column)| format!("{column} = ?{}", i + 1))
            .collect::<Vec<_>>()
            .join(", ");
        let filter = keys
            .iter()
            .enumerate()
            .map(|(i, key)| format!("{key} = ?{}", self.columns.len() + i + 1))
            .collect::<Vec<_>>()
            .join(" AND ");
        format!("UPDATE {table} SET {set} WHERE {filter}")
    }

    /// Execute the update. Returns the number of changed rows.
    ///
    /// `keys` pairs each key column with its value.
    pub fn execute(
        self,
        conn: &Connection,
        table: &str,
        keys: &[(&str, Value)],
    ) -> rusqlite::Result<usize> {
        let key_columns: Vec<&str> = keys.iter().map(|(column, _)| *column).collect();
        let sql = self.to_sql(table, &key_columns);
        let params = self
            .values
            .into_iter()
            .chain(keys.iter().map(|(_, value)| value.clone()));
        conn.execute(&sql, params_from_iter(params))
    }
}
