//! Info command

use std::path::Path;

use anyhow::{Context, Result, bail};
use crossterm::style::Stylize;
use pour_core::config;
use pour_schema::{Formula, PackageName};
use serde_json::json;

use crate::store::StateDb;
use crate::store::db::{FileRecord, Package};
use crate::ui::{format_mode, format_size};

const LABEL_WIDTH: usize = 12;

/// Show a formula file or an installed package.
///
/// An argument naming an existing file is read as a formula; anything else
/// is looked up among installed packages.
pub fn info(package: &str, as_json: bool) -> Result<()> {
    let (_, layout) = config::load_from_env()?;
    let db = StateDb::open(&layout).context("Failed to open state database")?;

    let formula = if Path::new(package).is_file() {
        Some(
            Formula::from_file(Path::new(package))
                .with_context(|| format!("Failed to load formula {package}"))?,
        )
    } else {
        None
    };

    let name = formula
        .as_ref()
        .map_or_else(|| PackageName::new(package), |f| f.name().clone());
    let installed = db.get_package(name.as_str())?;
    let files = match installed {
        Some(_) => db.get_package_files(name.as_str())?,
        None => Vec::new(),
    };

    if formula.is_none() && installed.is_none() {
        bail!("Package '{name}' is not installed and no formula file named '{package}' exists");
    }

    if as_json {
        let value = json!({
            "name": name.as_str(),
            "formula": formula,
            "installed": installed,
            "files": files,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    print_text(&name, formula.as_ref(), installed.as_ref(), &files);
    Ok(())
}

fn print_text(
    name: &PackageName,
    formula: Option<&Formula>,
    installed: Option<&Package>,
    files: &[FileRecord],
) {
    let lw = LABEL_WIDTH;
    let version = formula
        .map(|f| f.version().to_string())
        .or_else(|| installed.map(|p| p.version.clone()))
        .unwrap_or_default();

    println!();
    println!("  {} {}", name.as_str().white().bold(), version.dark_grey());

    if let Some(formula) = formula {
        if !formula.package.description.is_empty() {
            println!("  {}", formula.package.description);
        }
        println!();
        if !formula.package.homepage.is_empty() {
            println!("  {:<lw$}{}", "homepage", formula.package.homepage);
        }
        if let Some(license) = &formula.package.license {
            println!("  {:<lw$}{license}", "license");
        }
        println!("  {:<lw$}{}", "url", formula.source.url);
        println!("  {:<lw$}{}", "sha256", formula.source.sha256);
        if !formula.dependencies.runtime.is_empty() {
            let deps: Vec<&str> = formula
                .dependencies
                .runtime
                .iter()
                .map(PackageName::as_str)
                .collect();
            println!("  {:<lw$}{}", "requires", deps.join(", "));
        }
        for action in &formula.install {
            println!("  {:<lw$}{} -> {}", "installs", action.source, action.target);
        }
    }

    match installed {
        Some(pkg) => {
            let date = chrono::DateTime::from_timestamp(pkg.installed_at, 0)
                .unwrap_or_default()
                .format("%Y-%m-%d")
                .to_string();
            println!(
                "  {:<lw$}{} ({}, {date})",
                "installed",
                pkg.version,
                format_size(pkg.size_bytes)
            );
            for file in files {
                println!(
                    "  {:<lw$}{} {}",
                    "",
                    format_mode(file.mode).dark_grey(),
                    file.path
                );
            }
        }
        None => println!("  {:<lw$}{}", "installed", "no".dark_grey()),
    }
}
