//! Command modules - one file per CLI command

pub mod check;
pub mod completions;
pub mod convert;
pub mod fetch;
pub mod hash;
pub mod history;
pub mod info;
pub mod install;
pub mod lint;
pub mod list;
pub mod remove;
