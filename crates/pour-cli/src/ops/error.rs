//! Domain-specific errors for package operations

use pour_core::install::InstallError;
use pour_core::io::download::DownloadError;
use pour_core::io::extract::ExtractError;
use pour_schema::FormulaError;
use thiserror::Error;

use crate::store::DbError;

#[derive(Error, Debug)]
pub enum OpError {
    #[error(transparent)]
    Formula(#[from] FormulaError),

    #[error("{name} requires {missing}; install it first or pass --ignore-dependencies")]
    MissingDependencies { name: String, missing: String },

    #[error("Download failed: {0}")]
    Download(#[from] DownloadError),

    #[error("Extraction failed: {0}")]
    Extract(#[from] ExtractError),

    #[error(transparent)]
    Install(#[from] InstallError),

    #[error("State database error: {0}")]
    Db(#[from] DbError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0} is not installed")]
    NotInstalled(String),

    #[error("could not remove {count} file(s) of {name}; use --force to drop the record anyway")]
    RemoveIncomplete { name: String, count: usize },
}

impl OpError {
    /// Whether the archive failed its integrity check.
    pub fn is_integrity_failure(&self) -> bool {
        matches!(self, Self::Download(e) if e.is_integrity_failure())
    }
}
