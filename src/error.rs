//! Error types for the store, rule loading and condition evaluation.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Message not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),
}

/// Failure of a single condition. Never aborts a rule run.
#[derive(Debug, thiserror::Error)]
pub enum EvalError {
    #[error("Unparseable date literal: {0:?}")]
    InvalidDate(String),

    #[error("Expected a whole number of days, got {0:?}")]
    InvalidDays(String),
}

#[derive(Debug, thiserror::Error)]
pub enum RuleError {
    #[error("Failed to read rules file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse rules: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Rules must be a list or an object with a \"rules\" list")]
    Shape,
}
