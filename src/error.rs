//! Error taxonomy for a load run.
//!
//! Expected-absence failures (dropping a table that is not there) never reach
//! this type; they are logged and swallowed where they happen. Everything here
//! is either fatal or a per-row failure that the loader may collect instead of
//! raising, depending on [`crate::loader::RowErrorPolicy`].

use std::path::PathBuf;

use thiserror::Error;

use crate::database::DatabaseError;

pub type LoadResult<T> = std::result::Result<T, LoadError>;

/// The step of the deduplication protocol that was running when it failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DedupStep {
    ReadColumns,
    BeginTransaction,
    MaterializeSorted,
    DropOriginal,
    RecreateDistinct,
    Commit,
    RewriteFile,
    DropTemporary,
}

impl std::fmt::Display for DedupStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            DedupStep::ReadColumns => "reading table columns",
            DedupStep::BeginTransaction => "opening the dedup transaction",
            DedupStep::MaterializeSorted => "materializing the sorted temporary table",
            DedupStep::DropOriginal => "dropping the original table",
            DedupStep::RecreateDistinct => "recreating the table from distinct rows",
            DedupStep::Commit => "committing the dedup transaction",
            DedupStep::RewriteFile => "rewriting the source file",
            DedupStep::DropTemporary => "dropping the temporary table",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("invalid table name '{0}': expected letters, digits and underscores, not starting with a digit")]
    InvalidTableName(String),

    #[error("cannot derive a table name from {0:?}")]
    UnnamedInput(PathBuf),

    #[error("failed to read {path:?}")]
    Input {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    #[error("database error")]
    Database(#[from] DatabaseError),

    #[error("failed to create table '{table}'")]
    CreateTable {
        table: String,
        #[source]
        source: DatabaseError,
    },

    #[error("row at line {line} could not be inserted into '{table}'")]
    RowAborted {
        table: String,
        line: u64,
        #[source]
        source: DatabaseError,
    },

    #[error(
        "deduplication of '{table}' failed while {step}; the table may be missing or stale"
    )]
    DedupWindow {
        table: String,
        step: DedupStep,
        #[source]
        source: anyhow::Error,
    },
}

impl LoadError {
    pub(crate) fn input(path: impl Into<PathBuf>, source: impl Into<anyhow::Error>) -> Self {
        LoadError::Input {
            path: path.into(),
            source: source.into(),
        }
    }

    pub(crate) fn dedup(
        table: &str,
        step: DedupStep,
        source: impl Into<anyhow::Error>,
    ) -> Self {
        LoadError::DedupWindow {
            table: table.to_string(),
            step,
            source: source.into(),
        }
    }
}
