//! # Partitions
//!
//! Categories that group projects on the portfolio.

use crate::patch::{Assignments, blank_to_null, double_option};
use crate::render::or_empty;
use crate::{Result, Store};
use rusqlite::types::Value;
use rusqlite::{Connection, OptionalExtension, Row, params};
use serde::{Deserialize, Serialize};

const COLUMNS: &str = "id, slug, name, description, sortOrder";

/// A stored partition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Partition {
    pub id: String,
    pub slug: String,
    pub name: String,
    #[serde(serialize_with = "or_empty")]
    pub description: Option<String>,
    pub sort_order: i64,
}

impl Partition {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            slug: row.get(1)?,
            name: row.get(2)?,
            description: row.get(3)?,
            sort_order: row.get(4)?,
        })
    }
}

/// Fields for a new partition.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPartition {
    pub id: String,
    pub slug: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub sort_order: i64,
}

/// A partial update; absent fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartitionPatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    #[serde(default)]
    pub sort_order: Option<i64>,
}

/// Partition queries, obtained from [`Store::partitions`].
#[derive(Debug, Clone, Copy)]
pub struct Partitions<'a> {
    store: &'a Store,
}

impl Store {
    /// Access partition queries.
    #[must_use]
    pub fn partitions(&self) -> Partitions<'_> {
        Partitions { store: self }
    }
}

pub(crate) fn insert(conn: &Connection, new: &NewPartition) -> rusqlite::Result<usize> {
    conn.execute(
        "INSERT INTO partitions (id, slug, name, description, sortOrder)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            new.id,
            new.slug,
            new.name,
            blank_to_null(new.description.clone()),
            new.sort_order,
        ],
    )
}

fn find(conn: &Connection, column: &str, key: &str) -> rusqlite::Result<Option<Partition>> {
    conn.query_row(
        &format!("SELECT {COLUMNS} FROM partitions WHERE {column} = ?1"),
        params![key],
        Partition::from_row,
    )
    .optional()
}

impl Partitions<'_> {
    /// All partitions ordered by `sortOrder`.
    pub fn list(&self) -> Result<Vec<Partition>> {
        self.store.with_conn(|conn| {
            let mut stmt =
                conn.prepare(&format!("SELECT {COLUMNS} FROM partitions ORDER BY sortOrder"))?;
            let rows = stmt
                .query_map([], Partition::from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
    }

    pub fn get(&self, id: &str) -> Result<Option<Partition>> {
        self.store.with_conn(|conn| Ok(find(conn, "id", id)?))
    }

    pub fn get_by_slug(&self, slug: &str) -> Result<Option<Partition>> {
        self.store.with_conn(|conn| Ok(find(conn, "slug", slug)?))
    }

    /// Insert a partition and return the stored row.
    pub fn create(&self, new: &NewPartition) -> Result<Partition> {
        self.store.with_conn(|conn| {
            insert(conn, new)?;
            Ok(find(conn, "id", &new.id)?.ok_or(rusqlite::Error::QueryReturnedNoRows)?)
        })
    }

    /// Apply `patch` and return the updated row, or `None` if it does not exist.
    pub fn update(&self, id: &str, patch: PartitionPatch) -> Result<Option<Partition>> {
        self.store.with_conn(|conn| {
            let mut set = Assignments::new();
            set.set_if("name", patch.name);
            set.set_nullable("description", patch.description);
            set.set_if("sortOrder", patch.sort_order);

            if !set.is_empty() {
                set.execute(conn, "partitions", &[("id", Value::Text(id.to_string()))])?;
            }
            Ok(find(conn, "id", id)?)
        })
    }

    /// Delete a partition. Associations must be removed first.
    pub fn delete(&self, id: &str) -> Result<bool> {
        self.store.with_conn(|conn| {
            let changed = conn.execute("DELETE FROM partitions WHERE id = ?1", params![id])?;
            Ok(changed > 0)
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn new_partition(id: &str, sort_order: i64) -> NewPartition {
        NewPartition {
            id: id.into(),
            slug: format!("{id}-slug"),
            name: id.to_uppercase(),
            description: None,
            sort_order,
        }
    }

    #[test]
    fn list_is_ordered_by_sort_order() {
        let store = Store::in_memory().unwrap();
        let partitions = store.partitions();
        partitions.create(&new_partition("b", 2)).unwrap();
        partitions.create(&new_partition("a", 3)).unwrap();
        partitions.create(&new_partition("c", 1)).unwrap();

        let ids: Vec<String> = partitions.list().unwrap().into_iter().map(|p| p.id).collect();
        assert_eq!(ids, vec!["c", "b", "a"]);
    }

    #[test]
    fn lookup_by_id_and_slug() {
        let store = Store::in_memory().unwrap();
        store.partitions().create(&new_partition("tools", 1)).unwrap();

        assert!(store.partitions().get("tools").unwrap().is_some());
        assert!(store.partitions().get_by_slug("tools-slug").unwrap().is_some());
        assert!(store.partitions().get("missing").unwrap().is_none());
    }

    #[test]
    fn empty_description_is_stored_as_null() {
        let store = Store::in_memory().unwrap();
        let mut new = new_partition("x", 1);
        new.description = Some(String::new());
        let created = store.partitions().create(&new).unwrap();
        assert_eq!(created.description, None);
    }

    #[test]
    fn duplicate_slug_is_a_constraint_violation() {
        let store = Store::in_memory().unwrap();
        store.partitions().create(&new_partition("x", 1)).unwrap();
        let mut dup = new_partition("y", 1);
        dup.slug = "x-slug".into();

        let err = store.partitions().create(&dup).unwrap_err();
        assert!(err.is_constraint_violation());
    }

    #[test]
    fn update_touches_only_present_fields() {
        let store = Store::in_memory().unwrap();
        let mut new = new_partition("x", 1);
        new.description = Some("desc".into());
        store.partitions().create(&new).unwrap();

        let updated = store
            .partitions()
            .update(
                "x",
                PartitionPatch {
                    sort_order: Some(9),
                    ..PartitionPatch::default()
                },
            )
            .unwrap()
            .unwrap();
        assert_eq!(updated.sort_order, 9);
        assert_eq!(updated.description.as_deref(), Some("desc"));
        assert_eq!(updated.name, "X");

        let cleared = store
            .partitions()
            .update(
                "x",
                PartitionPatch {
                    description: Some(None),
                    ..PartitionPatch::default()
                },
            )
            .unwrap()
            .unwrap();
        assert_eq!(cleared.description, None);
    }

    #[test]
    fn empty_patch_returns_current_row() {
        let store = Store::in_memory().unwrap();
        let created = store.partitions().create(&new_partition("x", 4)).unwrap();
        let same = store
            .partitions()
            .update("x", PartitionPatch::default())
            .unwrap();
        assert_eq!(same, Some(created));
        assert!(
            store
                .partitions()
                .update("missing", PartitionPatch::default())
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn delete_reports_whether_a_row_was_removed() {
        let store = Store::in_memory().unwrap();
        store.partitions().create(&new_partition("x", 1)).unwrap();
        assert!(store.partitions().delete("x").unwrap());
        assert!(!store.partitions().delete("x").unwrap());
    }

    #[test]
    fn serializes_camel_case_with_empty_description() {
        let store = Store::in_memory().unwrap();
        let created = store.partitions().create(&new_partition("x", 1)).unwrap();
        let json = serde_json::to_value(&created).unwrap();
        assert_eq!(json["sortOrder"], 1);
        assert_eq!(json["description"], "");
    }
}
