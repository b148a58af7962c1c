//! Operations behind the commands, independent of terminal rendering.

pub mod check;
pub mod context;
pub mod error;
pub mod install;
pub mod remove;

#[cfg(test)]
pub(crate) mod test_support;

pub use context::Context;
pub use error::OpError;
