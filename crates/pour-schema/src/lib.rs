//! Shared types for pour: the formula descriptor, its TOML and Ruby DSL
//! encodings, integrity digests, and release-history checks.

pub mod dsl;
pub mod formula;
pub mod hash;
pub mod history;
pub mod types;

// Re-exports
pub use formula::{Dependencies, Formula, FormulaError, PackageInfo, Source, ValidationIssue};
pub use hash::{Blake3Hash, DigestError, Sha256Digest};
pub use history::{Finding, FormulaHistory, HistoryError, Severity};
pub use types::*;
