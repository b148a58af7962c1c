//! pour - install software from verified formula descriptors
#![allow(missing_docs)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::missing_panics_doc)]
//!
//! A formula names one release of a program: where its archive lives, the
//! SHA-256 the archive must hash to, what it needs at runtime, and which
//! files to copy where. pour fetches the archive, refuses it on any digest
//! mismatch, and places the files all-or-nothing.
//!
//! # Directory Layout
//!
//! ```text
//! ~/.pour/            # POUR_HOME
//! ├── config.toml
//! ├── state.db        # installed packages, files, history
//! ├── cache/          # verified archives, keyed by sha256
//! ├── tmp/            # extraction scratch space
//! ├── bin/            # default prefix: executables
//! └── share/man/      # default prefix: manual pages
//! ```

pub mod cmd;
pub mod ops;
pub mod store;
pub mod ui;

pub use pour_core::USER_AGENT;
pub use pour_core::paths::*;
pub use store::db;

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "pour")]
#[command(author, version = env!("POUR_VERSION"), about = "pour - install software from verified formula descriptors")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Install from formula files (.toml or .rb)
    Install {
        /// Formula file(s)
        #[arg(required = true)]
        formulas: Vec<PathBuf>,
        /// Overwrite files that belong to another package or to nobody
        #[arg(long, short = 'f')]
        force: bool,
        /// Install even if runtime dependencies are missing
        #[arg(long)]
        ignore_dependencies: bool,
        /// Fetch, verify and show what would be placed, without placing it
        #[arg(long)]
        dry_run: bool,
    },
    /// Remove installed packages
    Remove {
        /// Package name(s)
        #[arg(required = true)]
        packages: Vec<String>,
        /// Drop the record even if files cannot be deleted
        #[arg(long, short = 'f')]
        force: bool,
    },
    /// List installed packages
    List,
    /// Show a formula or an installed package
    Info {
        /// Installed package name or formula file
        package: String,
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Download and verify a formula's archive without installing
    Fetch {
        /// Formula file(s)
        #[arg(required = true)]
        formulas: Vec<PathBuf>,
    },
    /// Validate formula files and check release history consistency
    Lint {
        /// Formula file(s); records of the same package are checked as a history
        #[arg(required = true)]
        formulas: Vec<PathBuf>,
    },
    /// Re-encode a formula as TOML or Ruby DSL
    Convert {
        /// Formula file
        formula: PathBuf,
        /// Output encoding
        #[arg(long, value_enum)]
        to: Encoding,
        /// Write to a file instead of stdout
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
    },
    /// Compute SHA256 hash of a file (for formula authoring)
    Hash {
        /// Files to hash
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Verify installed files against what was recorded at install time
    Check {
        /// Package name(s); all installed packages if omitted
        packages: Vec<String>,
    },
    /// View install/remove history of a package
    History {
        /// Package name
        package: String,
    },
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: clap_complete::Shell,
    },
}

/// Formula encodings understood by `pour convert`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Encoding {
    Toml,
    Rb,
}
