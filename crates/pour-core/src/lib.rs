pub mod config;
pub mod deps;
pub mod install;
pub mod io;
pub mod paths;

pub mod reporter;

pub use paths::*;
pub use reporter::{NullReporter, Reporter};

/// User Agent string for core operations
pub const USER_AGENT: &str = concat!("pour/", env!("CARGO_PKG_VERSION"));
