//! # Projects
//!
//! Portfolio entries. Optional text columns are NULL when unset and render as
//! empty strings; `inPortfolio` and `nsfw` are stored as `0`/`1`.

use crate::clock;
use crate::patch::{Assignments, blank_to_null, double_option};
use crate::render::{flag, or_empty};
use crate::{Result, Store};
use rusqlite::types::Value;
use rusqlite::{Connection, OptionalExtension, Row, params};
use serde::{Deserialize, Serialize};

const COLUMNS: &str = "id, slug, name, tagline, shortDescription, longDescription, status, \
     primaryRepoUrl, liveUrl, githubRepoFullName, logoUrl, createdAt, updatedAt, inPortfolio, nsfw";

/// A stored project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    pub slug: String,
    pub name: String,
    #[serde(serialize_with = "or_empty")]
    pub tagline: Option<String>,
    #[serde(serialize_with = "or_empty")]
    pub short_description: Option<String>,
    #[serde(serialize_with = "or_empty")]
    pub long_description: Option<String>,
    pub status: String,
    #[serde(serialize_with = "or_empty")]
    pub primary_repo_url: Option<String>,
    #[serde(serialize_with = "or_empty")]
    pub live_url: Option<String>,
    #[serde(serialize_with = "or_empty")]
    pub github_repo_full_name: Option<String>,
    #[serde(serialize_with = "or_empty")]
    pub logo_url: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub in_portfolio: bool,
    pub nsfw: bool,
}

impl Project {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            slug: row.get(1)?,
            name: row.get(2)?,
            tagline: row.get(3)?,
            short_description: row.get(4)?,
            long_description: row.get(5)?,
            status: row.get(6)?,
            primary_repo_url: row.get(7)?,
            live_url: row.get(8)?,
            github_repo_full_name: row.get(9)?,
            logo_url: row.get(10)?,
            created_at: row.get(11)?,
            updated_at: row.get(12)?,
            in_portfolio: flag(row.get(13)?),
            nsfw: flag(row.get(14)?),
        })
    }
}

/// Fields for a new project.
///
/// `created_at`/`updated_at` default to the insertion time; seed data
/// supplies its own.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProject {
    pub id: String,
    pub slug: String,
    pub name: String,
    #[serde(default)]
    pub tagline: Option<String>,
    #[serde(default)]
    pub short_description: Option<String>,
    #[serde(default)]
    pub long_description: Option<String>,
    pub status: String,
    #[serde(default)]
    pub primary_repo_url: Option<String>,
    #[serde(default)]
    pub live_url: Option<String>,
    #[serde(default)]
    pub github_repo_full_name: Option<String>,
    #[serde(default)]
    pub logo_url: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub in_portfolio: Option<bool>,
    #[serde(default)]
    pub nsfw: Option<bool>,
}

/// A partial update; absent fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectPatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub tagline: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub short_description: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub long_description: Option<Option<String>>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub primary_repo_url: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub live_url: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub github_repo_full_name: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub logo_url: Option<Option<String>>,
    #[serde(default)]
    pub in_portfolio: Option<bool>,
    #[serde(default)]
    pub nsfw: Option<bool>,
}

/// Project queries, obtained from [`Store::projects`].
#[derive(Debug, Clone, Copy)]
pub struct Projects<'a> {
    store: &'a Store,
}

impl Store {
    /// Access project queries.
    #[must_use]
    pub fn projects(&self) -> Projects<'_> {
        Projects { store: self }
    }
}

pub(crate) fn insert(conn: &Connection, new: &NewProject) -> rusqlite::Result<usize> {
    let now = clock::now();
    let created_at = new.created_at.clone().unwrap_or_else(|| now.clone());
    let updated_at = new.updated_at.clone().unwrap_or(now);
    conn.execute(
        "INSERT INTO projects (
            id, slug, name, tagline, shortDescription, longDescription,
            status, primaryRepoUrl, liveUrl, githubRepoFullName, logoUrl,
            createdAt, updatedAt, inPortfolio, nsfw
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
        params![
            new.id,
            new.slug,
            new.name,
            blank_to_null(new.tagline.clone()),
            blank_to_null(new.short_description.clone()),
            blank_to_null(new.long_description.clone()),
            new.status,
            blank_to_null(new.primary_repo_url.clone()),
            blank_to_null(new.live_url.clone()),
            blank_to_null(new.github_repo_full_name.clone()),
            blank_to_null(new.logo_url.clone()),
            created_at,
            updated_at,
            new.in_portfolio != Some(false),
            new.nsfw == Some(true),
        ],
    )
}

fn find(conn: &Connection, column: &str, key: &str) -> rusqlite::Result<Option<Project>> {
    conn.query_row(
        &format!("SELECT {COLUMNS} FROM projects WHERE {column} = ?1"),
        params![key],
        Project::from_row,
    )
    .optional()
}

impl Projects<'_> {
    /// All projects, newest first.
    pub fn list(&self) -> Result<Vec<Project>> {
        self.store.with_conn(|conn| {
            let mut stmt =
                conn.prepare(&format!("SELECT {COLUMNS} FROM projects ORDER BY createdAt DESC"))?;
            let rows = stmt
                .query_map([], Project::from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
    }

    pub fn get(&self, id: &str) -> Result<Option<Project>> {
        self.store.with_conn(|conn| Ok(find(conn, "id", id)?))
    }

    pub fn get_by_slug(&self, slug: &str) -> Result<Option<Project>> {
        self.store.with_conn(|conn| Ok(find(conn, "slug", slug)?))
    }

    /// Insert a project and return the stored row.
    pub fn create(&self, new: &NewProject) -> Result<Project> {
        self.store.with_conn(|conn| {
            insert(conn, new)?;
            Ok(find(conn, "id", &new.id)?.ok_or(rusqlite::Error::QueryReturnedNoRows)?)
        })
    }

    /// Apply `patch`, bumping `updatedAt` when anything changed.
    ///
    /// Returns `None` if the project does not exist.
    pub fn update(&self, id: &str, patch: ProjectPatch) -> Result<Option<Project>> {
        self.store.with_conn(|conn| {
            let mut set = Assignments::new();
            set.set_if("name", patch.name);
            set.set_nullable("tagline", patch.tagline);
            set.set_nullable("shortDescription", patch.short_description);
            set.set_nullable("longDescription", patch.long_description);
            set.set_if("status", patch.status);
            set.set_nullable("primaryRepoUrl", patch.primary_repo_url);
            set.set_nullable("liveUrl", patch.live_url);
            set.set_nullable("githubRepoFullName", patch.github_repo_full_name);
            set.set_nullable("logoUrl", patch.logo_url);
            set.set_if("inPortfolio", patch.in_portfolio);
            set.set_if("nsfw", patch.nsfw);

            if !set.is_empty() {
                set.set("updatedAt", clock::now());
                set.execute(conn, "projects", &[("id", Value::Text(id.to_string()))])?;
            }
            Ok(find(conn, "id", id)?)
        })
    }

    /// Delete a project. Associations must be removed first.
    pub fn delete(&self, id: &str) -> Result<bool> {
        self.store.with_conn(|conn| {
            let changed = conn.execute("DELETE FROM projects WHERE id = ?1", params![id])?;
            Ok(changed > 0)
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn new_project(id: &str, created_at: &str) -> NewProject {
        NewProject {
            id: id.into(),
            slug: id.into(),
            name: id.into(),
            status: "live".into(),
            created_at: Some(created_at.into()),
            updated_at: Some(created_at.into()),
            ..NewProject::default()
        }
    }

    #[test]
    fn list_is_newest_first() {
        let store = Store::in_memory().unwrap();
        store
            .projects()
            .create(&new_project("old", "2022-01-01T00:00:00.000Z"))
            .unwrap();
        store
            .projects()
            .create(&new_project("new", "2024-01-01T00:00:00.000Z"))
            .unwrap();

        let ids: Vec<String> = store
            .projects()
            .list()
            .unwrap()
            .into_iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(ids, vec!["new", "old"]);
    }

    #[test]
    fn flags_default_to_in_portfolio_and_safe() {
        let store = Store::in_memory().unwrap();
        let project = store
            .projects()
            .create(&NewProject {
                id: "p".into(),
                slug: "p".into(),
                name: "P".into(),
                status: "live".into(),
                ..NewProject::default()
            })
            .unwrap();
        assert!(project.in_portfolio);
        assert!(!project.nsfw);
        assert_eq!(project.created_at, project.updated_at);

        let hidden = store
            .projects()
            .create(&NewProject {
                id: "h".into(),
                slug: "h".into(),
                name: "H".into(),
                status: "archived".into(),
                in_portfolio: Some(false),
                nsfw: Some(true),
                ..NewProject::default()
            })
            .unwrap();
        assert!(!hidden.in_portfolio);
        assert!(hidden.nsfw);
    }

    #[test]
    fn update_bumps_updated_at_only_when_changed() {
        let store = Store::in_memory().unwrap();
        store
            .projects()
            .create(&new_project("p", "2020-01-01T00:00:00.000Z"))
            .unwrap();

        let untouched = store
            .projects()
            .update("p", ProjectPatch::default())
            .unwrap()
            .unwrap();
        assert_eq!(untouched.updated_at, "2020-01-01T00:00:00.000Z");

        let updated = store
            .projects()
            .update(
                "p",
                ProjectPatch {
                    tagline: Some(Some("A tagline".into())),
                    nsfw: Some(true),
                    logo_url: Some(Some("/logo.png".into())),
                    ..ProjectPatch::default()
                },
            )
            .unwrap()
            .unwrap();
        assert_eq!(updated.tagline.as_deref(), Some("A tagline"));
        assert_eq!(updated.logo_url.as_deref(), Some("/logo.png"));
        assert!(updated.nsfw);
        assert_ne!(updated.updated_at, "2020-01-01T00:00:00.000Z");
        assert_eq!(updated.created_at, "2020-01-01T00:00:00.000Z");
    }

    #[test]
    fn serializes_booleans_and_empty_strings() {
        let store = Store::in_memory().unwrap();
        let project = store
            .projects()
            .create(&new_project("p", "2020-01-01T00:00:00.000Z"))
            .unwrap();
        let json = serde_json::to_value(&project).unwrap();
        assert_eq!(json["inPortfolio"], true);
        assert_eq!(json["nsfw"], false);
        assert_eq!(json["liveUrl"], "");
        assert_eq!(json["githubRepoFullName"], "");
        assert_eq!(json["createdAt"], "2020-01-01T00:00:00.000Z");
    }

    #[test]
    fn lookup_by_slug_and_delete() {
        let store = Store::in_memory().unwrap();
        store
            .projects()
            .create(&new_project("p", "2020-01-01T00:00:00.000Z"))
            .unwrap();
        assert!(store.projects().get_by_slug("p").unwrap().is_some());
        assert!(store.projects().delete("p").unwrap());
        assert!(store.projects().get("p").unwrap().is_none());
    }
}
