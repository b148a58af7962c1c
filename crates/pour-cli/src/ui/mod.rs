//! Terminal output.
//!
//! ```text
//! Commands / core pipeline
//!        │ Reporter calls
//!        ▼
//!     Output  ── events ──▶  Actor thread  ──▶  stdout / stderr
//! ```
//!
//! Tabular listings (`pour list`, `pour info`) are rendered directly with
//! `comfy-table` since they are printed once, after all work is done.

pub mod actor;
pub mod output;
pub mod theme;

pub use output::Output;
pub use theme::{Theme, format_mode, format_size};
