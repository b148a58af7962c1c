//! Fetch command

use std::path::PathBuf;

use anyhow::{Context as _, Result, bail};
use pour_core::Reporter;
use pour_core::io::download::fetch_archive;
use pour_schema::Formula;

use crate::ops::Context;
use crate::ui::Output;

/// Download and verify archives into the cache without installing.
pub async fn fetch(formulas: &[PathBuf]) -> Result<()> {
    let output = Output::new();
    let ctx = Context::from_env(output.clone())?;
    ctx.layout
        .ensure_dirs()
        .context("Failed to create cache directory")?;

    output.section("Fetching");
    let mut failed = 0;
    for path in formulas {
        let formula = match Formula::from_file(path).and_then(|f| f.ensure_valid().map(|()| f)) {
            Ok(formula) => formula,
            Err(e) => {
                output.error(&format!("{}: {e}", path.display()));
                failed += 1;
                continue;
            }
        };

        match fetch_archive(&ctx.client, &formula, &ctx.layout, &output).await {
            Ok(archive) => {
                let size = std::fs::metadata(&archive).ok().map(|m| m.len());
                output.done(formula.name(), formula.version(), "verified", size);
                output.wait();
                println!("{}", archive.display());
            }
            Err(e) => {
                output.failed(formula.name(), formula.version(), &e.to_string());
                failed += 1;
            }
        }
    }

    if failed > 0 {
        bail!("{failed} of {} formula(s) could not be fetched", formulas.len());
    }
    Ok(())
}
