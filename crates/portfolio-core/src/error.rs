//! Error types for the portfolio store.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StoreError {
    /// Database error from SQLite.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// I/O error while reading seed files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding or decoding failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A thread panicked while holding the connection lock.
    #[error("database connection lock poisoned")]
    LockPoisoned,

    /// None of the candidate seed files exist.
    #[error("no seed file found (tried: {})", display_paths(.0))]
    SeedNotFound(Vec<PathBuf>),
}

impl StoreError {
    /// Whether this error is a SQLite constraint violation
    /// (unique, foreign key, check, not null).
    #[must_use]
    pub fn is_constraint_violation(&self) -> bool {
        matches!(
            self,
            Self::Database(rusqlite::Error::SqliteFailure(err, _))
                if err.code == rusqlite::ErrorCode::ConstraintViolation
        )
    }
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seed_not_found_lists_candidates() {
        let err = StoreError::SeedNotFound(vec![
            PathBuf::from("seed.json"),
            PathBuf::from("seed_p_1.json"),
        ]);
        assert_eq!(
            err.to_string(),
            "no seed file found (tried: seed.json, seed_p_1.json)"
        );
    }

    #[test]
    fn lock_poisoned_is_not_constraint() {
        assert!(!StoreError::LockPoisoned.is_constraint_violation());
    }
}
