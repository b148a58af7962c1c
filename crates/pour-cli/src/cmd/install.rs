//! Install command

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Result, bail};
use pour_core::Reporter;
use pour_schema::Formula;

use crate::ops::Context;
use crate::ops::install::{InstallOptions, InstallOutcome, install_formula};
use crate::ui::Output;

/// Install formulas one after another; a failure does not stop the rest.
pub async fn install(formulas: &[PathBuf], opts: InstallOptions) -> Result<()> {
    let output = Output::new();
    let mut ctx = Context::from_env(output.clone())?;
    let start = Instant::now();

    output.section(if opts.dry_run { "Planning" } else { "Installing" });

    let mut installed = 0;
    let mut failed = 0;

    for path in formulas {
        let formula = match Formula::from_file(path) {
            Ok(formula) => formula,
            Err(e) => {
                output.error(&format!("{}: {e}", path.display()));
                failed += 1;
                continue;
            }
        };
        let (name, version) = (formula.name(), formula.version());

        match install_formula(&mut ctx, &formula, opts).await {
            Ok(InstallOutcome::Installed { previous, .. }) => {
                installed += 1;
                if let Some(previous) = previous.filter(|p| p != version.as_str()) {
                    output.info(&format!("{name}: replaced {previous}"));
                }
            }
            Ok(InstallOutcome::Planned(plan)) => {
                for file in &plan.files {
                    let note = if file.replaces { " (replaces existing)" } else { "" };
                    output.info(&format!(
                        "{name} {version}: {} -> {}{note}",
                        file.source.display(),
                        file.dest.display()
                    ));
                }
            }
            Err(e) => {
                tracing::debug!(error = ?e, "install failed");
                output.failed(name, version, &e.to_string());
                failed += 1;
            }
        }
    }

    if installed > 0 {
        output.summary(installed, "installed", start.elapsed().as_secs_f64());
    }
    if failed > 0 {
        bail!("{failed} of {} formula(s) failed", formulas.len());
    }
    Ok(())
}
