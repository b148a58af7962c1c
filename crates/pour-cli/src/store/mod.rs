//! Persistent state.

pub mod db;

pub use db::{DbError, StateDb};
