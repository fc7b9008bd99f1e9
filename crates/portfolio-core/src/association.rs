//! # Project ↔ Partition Associations
//!
//! The many-to-many link table, keyed by `(projectId, partitionId)`.

use crate::patch::Assignments;
use crate::render::flag;
use crate::{Result, Store};
use rusqlite::types::Value;
use rusqlite::{Connection, OptionalExtension, Row, params};
use serde::{Deserialize, Serialize};

const COLUMNS: &str = "projectId, partitionId, isFeatured, sortOrder";

/// A project placed in a partition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Association {
    pub project_id: String,
    pub partition_id: String,
    pub is_featured: bool,
    pub sort_order: i64,
}

impl Association {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            project_id: row.get(0)?,
            partition_id: row.get(1)?,
            is_featured: flag(row.get(2)?),
            sort_order: row.get(3)?,
        })
    }
}

/// Fields for a new association.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAssociation {
    pub project_id: String,
    pub partition_id: String,
    #[serde(default)]
    pub is_featured: Option<bool>,
    #[serde(default)]
    pub sort_order: i64,
}

/// A partial update; absent fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssociationPatch {
    #[serde(default)]
    pub is_featured: Option<bool>,
    #[serde(default)]
    pub sort_order: Option<i64>,
}

/// Association queries, obtained from [`Store::associations`].
#[derive(Debug, Clone, Copy)]
pub struct Associations<'a> {
    store: &'a Store,
}

impl Store {
    /// Access association queries.
    #[must_use]
    pub fn associations(&self) -> Associations<'_> {
        Associations { store: self }
    }
}

pub(crate) fn insert(conn: &Connection, new: &NewAssociation) -> rusqlite::Result<usize> {
    conn.execute(
        "INSERT INTO project_partitions (projectId, partitionId, isFeatured, sortOrder)
         VALUES (?1, ?2, ?3, ?4)",
        params![
            new.project_id,
            new.partition_id,
            new.is_featured == Some(true),
            new.sort_order,
        ],
    )
}

fn find(
    conn: &Connection,
    project_id: &str,
    partition_id: &str,
) -> rusqlite::Result<Option<Association>> {
    conn.query_row(
        &format!(
            "SELECT {COLUMNS} FROM project_partitions WHERE projectId = ?1 AND partitionId = ?2"
        ),
        params![project_id, partition_id],
        Association::from_row,
    )
    .optional()
}

fn select(conn: &Connection, filter: Option<(&str, &str)>) -> rusqlite::Result<Vec<Association>> {
    match filter {
        Some((column, key)) => {
            let mut stmt = conn.prepare(&format!(
                "SELECT {COLUMNS} FROM project_partitions WHERE {column} = ?1 ORDER BY sortOrder"
            ))?;
            stmt.query_map(params![key], Association::from_row)?
                .collect()
        }
        None => {
            let mut stmt = conn.prepare(&format!(
                "SELECT {COLUMNS} FROM project_partitions ORDER BY sortOrder"
            ))?;
            stmt.query_map([], Association::from_row)?.collect()
        }
    }
}

impl Associations<'_> {
    /// All associations ordered by `sortOrder`.
    pub fn list(&self) -> Result<Vec<Association>> {
        self.store.with_conn(|conn| Ok(select(conn, None)?))
    }

    /// Associations of one project ordered by `sortOrder`.
    pub fn by_project(&self, project_id: &str) -> Result<Vec<Association>> {
        self.store
            .with_conn(|conn| Ok(select(conn, Some(("projectId", project_id)))?))
    }

    /// Associations of one partition ordered by `sortOrder`.
    pub fn by_partition(&self, partition_id: &str) -> Result<Vec<Association>> {
        self.store
            .with_conn(|conn| Ok(select(conn, Some(("partitionId", partition_id)))?))
    }

    pub fn get(&self, project_id: &str, partition_id: &str) -> Result<Option<Association>> {
        self.store
            .with_conn(|conn| Ok(find(conn, project_id, partition_id)?))
    }

    /// Insert an association and return the stored row.
    pub fn create(&self, new: &NewAssociation) -> Result<Association> {
        self.store.with_conn(|conn| {
            insert(conn, new)?;
            Ok(find(conn, &new.project_id, &new.partition_id)?
                .ok_or(rusqlite::Error::QueryReturnedNoRows)?)
        })
    }

    pub fn update(
        &self,
        project_id: &str,
        partition_id: &str,
        patch: AssociationPatch,
    ) -> Result<Option<Association>> {
        self.store.with_conn(|conn| {
            let mut set = Assignments::new();
            set.set_if("isFeatured", patch.is_featured);
            set.set_if("sortOrder", patch.sort_order);

            if !set.is_empty() {
                set.execute(
                    conn,
                    "project_partitions",
                    &[
                        ("projectId", Value::Text(project_id.to_string())),
                        ("partitionId", Value::Text(partition_id.to_string())),
                    ],
                )?;
            }
            Ok(find(conn, project_id, partition_id)?)
        })
    }

    pub fn delete(&self, project_id: &str, partition_id: &str) -> Result<bool> {
        self.store.with_conn(|conn| {
            let changed = conn.execute(
                "DELETE FROM project_partitions WHERE projectId = ?1 AND partitionId = ?2",
                params![project_id, partition_id],
            )?;
            Ok(changed > 0)
        })
    }

    /// Remove every association of a project. Returns whether any existed.
    pub fn delete_by_project(&self, project_id: &str) -> Result<bool> {
        self.store.with_conn(|conn| {
            let changed = conn.execute(
                "DELETE FROM project_partitions WHERE projectId = ?1",
                params![project_id],
            )?;
            Ok(changed > 0)
        })
    }

    /// Remove every association of a partition. Returns whether any existed.
    pub fn delete_by_partition(&self, partition_id: &str) -> Result<bool> {
        self.store.with_conn(|conn| {
            let changed = conn.execute(
                "DELETE FROM project_partitions WHERE partitionId = ?1",
                params![partition_id],
            )?;
            Ok(changed > 0)
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::{NewPartition, NewProject};

    fn seeded() -> Store {
        let store = Store::in_memory().unwrap();
        for id in ["alpha", "beta"] {
            store
                .projects()
                .create(&NewProject {
                    id: id.into(),
                    slug: id.into(),
                    name: id.into(),
                    status: "live".into(),
                    ..NewProject::default()
                })
                .unwrap();
        }
        for (id, order) in [("tools", 1), ("games", 2)] {
            store
                .partitions()
                .create(&NewPartition {
                    id: id.into(),
                    slug: id.into(),
                    name: id.into(),
                    description: None,
                    sort_order: order,
                })
                .unwrap();
        }
        store
    }

    fn link(store: &Store, project: &str, partition: &str, order: i64) -> Association {
        store
            .associations()
            .create(&NewAssociation {
                project_id: project.into(),
                partition_id: partition.into(),
                is_featured: None,
                sort_order: order,
            })
            .unwrap()
    }

    #[test]
    fn create_defaults_to_not_featured() {
        let store = seeded();
        let assoc = link(&store, "alpha", "tools", 1);
        assert!(!assoc.is_featured);
        assert_eq!(assoc.sort_order, 1);
    }

    #[test]
    fn unknown_project_violates_foreign_key() {
        let store = seeded();
        let err = store
            .associations()
            .create(&NewAssociation {
                project_id: "ghost".into(),
                partition_id: "tools".into(),
                is_featured: None,
                sort_order: 0,
            })
            .unwrap_err();
        assert!(err.is_constraint_violation());
    }

    #[test]
    fn filtered_lists_are_ordered() {
        let store = seeded();
        link(&store, "alpha", "tools", 2);
        link(&store, "beta", "tools", 1);
        link(&store, "alpha", "games", 5);

        let tools: Vec<String> = store
            .associations()
            .by_partition("tools")
            .unwrap()
            .into_iter()
            .map(|a| a.project_id)
            .collect();
        assert_eq!(tools, vec!["beta", "alpha"]);

        assert_eq!(store.associations().by_project("alpha").unwrap().len(), 2);
        assert_eq!(store.associations().list().unwrap().len(), 3);
    }

    #[test]
    fn update_and_delete_by_keys() {
        let store = seeded();
        link(&store, "alpha", "tools", 1);

        let updated = store
            .associations()
            .update(
                "alpha",
                "tools",
                AssociationPatch {
                    is_featured: Some(true),
                    sort_order: None,
                },
            )
            .unwrap()
            .unwrap();
        assert!(updated.is_featured);
        assert_eq!(updated.sort_order, 1);

        assert!(store.associations().delete("alpha", "tools").unwrap());
        assert!(store.associations().get("alpha", "tools").unwrap().is_none());
    }

    #[test]
    fn cascading_helpers_remove_all_links() {
        let store = seeded();
        link(&store, "alpha", "tools", 1);
        link(&store, "beta", "tools", 2);
        link(&store, "alpha", "games", 1);

        assert!(store.associations().delete_by_partition("tools").unwrap());
        assert_eq!(store.associations().list().unwrap().len(), 1);
        assert!(store.associations().delete_by_project("alpha").unwrap());
        assert!(!store.associations().delete_by_project("alpha").unwrap());
    }
}
