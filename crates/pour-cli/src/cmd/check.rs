//! Check command

use anyhow::{Context, Result, bail};
use crossterm::style::Stylize;
use pour_core::config;
use pour_core::install::FileStatus;

use crate::ops::check::check_packages;
use crate::store::StateDb;
use crate::ui::format_mode;

/// Verify installed files still match what was placed.
pub fn check(packages: &[String]) -> Result<()> {
    let (_, layout) = config::load_from_env()?;
    let db = StateDb::open(&layout).context("Failed to open state database")?;

    let problems = check_packages(&db, packages)?;
    if problems.is_empty() {
        println!("  {} all installed files intact", "✓".green());
        return Ok(());
    }

    for problem in &problems {
        let what = match &problem.status {
            FileStatus::Ok => continue,
            FileStatus::Missing => "missing".to_string(),
            FileStatus::Modified => "content changed".to_string(),
            FileStatus::ModeChanged { expected, actual } => format!(
                "mode {} (expected {})",
                format_mode(*actual),
                format_mode(*expected)
            ),
        };
        println!(
            "  {} {} {}: {what}",
            "✗".red(),
            problem.package,
            problem.path
        );
    }
    bail!("{} file(s) differ from what was installed", problems.len());
}
