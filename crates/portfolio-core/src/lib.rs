//! # Portfolio Core
//!
//! The relational store behind the portfolio service.
//!
//! Everything here is synchronous: each operation maps to one parameterized
//! SQL statement (or one transaction) against a single SQLite connection.
//! The HTTP layer lives in `apps/portfolio`.
//!
//! ## Entities
//!
//! - [`Partition`]: a category that groups projects.
//! - [`Project`]: a portfolio entry.
//! - [`Association`]: the many-to-many link between the two.
//! - [`Port`]: a reserved port number for a local development server.
//! - [`TrafficLog`]: a click or data-transfer event, optionally tied to a port.

pub mod association;
pub mod clock;
pub mod error;
pub mod partition;
pub mod patch;
pub mod port;
pub mod project;
pub mod render;
pub mod seed;
pub mod store;
pub mod traffic;

pub use association::{Association, AssociationPatch, NewAssociation};
pub use error::StoreError;
pub use partition::{NewPartition, Partition, PartitionPatch};
pub use port::{NewPort, ParseServerTypeError, Port, PortPatch, ServerType, validate_port_number};
pub use project::{NewProject, Project, ProjectPatch};
pub use seed::{DEFAULT_SEED_FILES, SeedData, SeedReport};
pub use store::{Store, TableCounts};
pub use traffic::{EventType, NewTrafficLog, TrafficLog, TrafficStats};

/// Result alias used throughout the store.
pub type Result<T> = std::result::Result<T, StoreError>;
