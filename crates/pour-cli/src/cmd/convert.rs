//! Convert command

use std::path::Path;

use anyhow::{Context, Result};
use pour_schema::Formula;

use crate::Encoding;

/// Render a formula in the requested encoding.
pub fn render(formula: &Formula, to: Encoding) -> Result<String> {
    match to {
        Encoding::Toml => formula.to_toml().context("Failed to serialize formula"),
        Encoding::Rb => {
            if formula.source.format.is_some() {
                tracing::warn!("explicit archive format cannot be expressed in the Ruby DSL; dropped");
            }
            Ok(formula.to_dsl())
        }
    }
}

/// Re-encode a formula file, to stdout or to `output`.
pub fn convert(path: &Path, to: Encoding, output: Option<&Path>) -> Result<()> {
    let formula =
        Formula::from_file(path).with_context(|| format!("Failed to load {}", path.display()))?;
    let rendered = render(&formula, to)?;

    match output {
        Some(out) => std::fs::write(out, rendered)
            .with_context(|| format!("Failed to write {}", out.display()))?,
        None => print!("{rendered}"),
    }
    Ok(())
}
