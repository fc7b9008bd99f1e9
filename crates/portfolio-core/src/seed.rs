//! # Seeding
//!
//! Initial data for a fresh database: default port allocations for the known
//! local projects, and portfolio content loaded from a JSON seed file.
//!
//! Each step only runs against an empty table and inserts everything in one
//! transaction, so seeding is safe to attempt at every startup.

use crate::association::{self, NewAssociation};
use crate::partition::{self, NewPartition};
use crate::port::{self, NewPort, ServerType};
use crate::project::{self, NewProject};
use crate::{Result, Store, StoreError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Projects that get a backend and a frontend port on first start.
pub const PORT_PROJECTS: [&str; 11] = [
    "portfolio",
    "glass-spa",
    "glass-spa-2",
    "interaction-log",
    "notes-phoneline",
    "nsfw-project",
    "rambulations",
    "routine-builder",
    "simples",
    "sound-mixer",
    "tutorone",
];

/// First backend port handed out.
pub const FIRST_BACKEND_PORT: i64 = 3000;
/// First frontend port handed out.
pub const FIRST_FRONTEND_PORT: i64 = 5145;

/// Seed file names tried in order when none are configured.
pub const DEFAULT_SEED_FILES: [&str; 2] = ["seed.json", "seed_p_1.json"];

/// The backend/frontend pair for every entry in [`PORT_PROJECTS`].
#[must_use]
pub fn default_port_allocations() -> Vec<NewPort> {
    let mut allocations = Vec::with_capacity(PORT_PROJECTS.len() * 2);
    for ((project, backend), frontend) in PORT_PROJECTS
        .iter()
        .zip(FIRST_BACKEND_PORT..)
        .zip(FIRST_FRONTEND_PORT..)
    {
        allocations.push(NewPort {
            id: format!("{project}-backend"),
            port_number: backend,
            server_type: ServerType::Backend,
            name: Some(format!("{project} Backend")),
            description: Some(format!("Backend server port for {project}")),
        });
        allocations.push(NewPort {
            id: format!("{project}-frontend"),
            port_number: frontend,
            server_type: ServerType::Frontend,
            name: Some(format!("{project} Frontend")),
            description: Some(format!("Frontend server port for {project}")),
        });
    }
    allocations
}

/// Contents of a seed file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeedData {
    #[serde(default)]
    pub partitions: Vec<NewPartition>,
    #[serde(default)]
    pub projects: Vec<NewProject>,
    #[serde(default)]
    pub project_partitions: Vec<NewAssociation>,
}

impl SeedData {
    /// Parse a seed file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Load the first candidate that exists.
    pub fn load_first(candidates: &[PathBuf]) -> Result<(PathBuf, Self)> {
        let path = candidates
            .iter()
            .find(|p| p.exists())
            .ok_or_else(|| StoreError::SeedNotFound(candidates.to_vec()))?;
        Ok((path.clone(), Self::from_file(path)?))
    }
}

/// What a seeding pass inserted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeedReport {
    pub ports: usize,
    pub partitions: usize,
    pub projects: usize,
    pub project_partitions: usize,
    pub source: Option<PathBuf>,
}

impl Store {
    /// Insert [`default_port_allocations`] if `ports` is empty.
    ///
    /// Returns the number of rows inserted.
    pub fn seed_ports(&self) -> Result<usize> {
        self.with_tx(|tx| {
            let existing: i64 = tx.query_row("SELECT COUNT(*) FROM ports", [], |r| r.get(0))?;
            if existing > 0 {
                tracing::debug!(existing, "ports already seeded");
                return Ok(0);
            }
            let allocations = default_port_allocations();
            for allocation in &allocations {
                port::insert(tx, allocation)?;
            }
            Ok(allocations.len())
        })
    }

    /// Insert `data` if `partitions` is empty.
    ///
    /// Seed flags are stored as `1` only when literally `true`.
    pub fn seed_content(&self, data: &SeedData) -> Result<SeedReport> {
        self.with_tx(|tx| {
            let existing: i64 =
                tx.query_row("SELECT COUNT(*) FROM partitions", [], |r| r.get(0))?;
            if existing > 0 {
                tracing::debug!(existing, "content already seeded");
                return Ok(SeedReport::default());
            }
            for new in &data.partitions {
                partition::insert(tx, new)?;
            }
            for new in &data.projects {
                let new = NewProject {
                    in_portfolio: Some(new.in_portfolio == Some(true)),
                    ..new.clone()
                };
                project::insert(tx, &new)?;
            }
            for new in &data.project_partitions {
                association::insert(tx, new)?;
            }
            Ok(SeedReport {
                partitions: data.partitions.len(),
                projects: data.projects.len(),
                project_partitions: data.project_partitions.len(),
                ..SeedReport::default()
            })
        })
    }

    /// Run both seeding steps, logging failures instead of returning them.
    ///
    /// Content is only loaded when `partitions` is empty; a missing seed file
    /// is a warning.
    pub fn seed_defaults(&self, candidates: &[PathBuf]) -> SeedReport {
        let mut report = SeedReport::default();

        match self.seed_ports() {
            Ok(0) => {}
            Ok(n) => {
                tracing::info!(count = n, "seeded port allocations");
                report.ports = n;
            }
            Err(e) => tracing::error!(error = %e, "failed to seed port allocations"),
        }

        match self.counts() {
            Ok(counts) if counts.partitions > 0 => return report,
            Ok(_) => {}
            Err(e) => {
                tracing::error!(error = %e, "failed to inspect partitions");
                return report;
            }
        }

        let loaded = SeedData::load_first(candidates).and_then(|(path, data)| {
            let content = self.seed_content(&data)?;
            Ok((path, content))
        });
        match loaded {
            Ok((path, content)) => {
                tracing::info!(
                    source = %path.display(),
                    partitions = content.partitions,
                    projects = content.projects,
                    project_partitions = content.project_partitions,
                    "loaded seed data"
                );
                report.partitions = content.partitions;
                report.projects = content.projects;
                report.project_partitions = content.project_partitions;
                report.source = Some(path);
            }
            Err(e @ StoreError::SeedNotFound(_)) => tracing::warn!("{e}"),
            Err(e) => tracing::error!(error = %e, "failed to load seed data"),
        }
        report
    }
}
