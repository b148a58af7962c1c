use anyhow::{Context, Result};
use comfy_table::presets::NOTHING;
use comfy_table::{Cell, CellAlignment, Table};
use pour_core::config;

use crate::store::StateDb;
use crate::ui::format_size;

/// List all installed packages
pub fn list() -> Result<()> {
    let (_, layout) = config::load_from_env()?;
    let db = StateDb::open(&layout).context("Failed to open state database")?;
    let packages = db.list_packages()?;

    if packages.is_empty() {
        println!();
        println!("  No packages installed.");
        println!("  Run 'pour install <formula>' to get started.");
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(NOTHING);
    table.set_header(vec!["NAME", "VERSION", "SIZE", "INSTALLED"]);

    let mut total_size: u64 = 0;
    for pkg in &packages {
        total_size += pkg.size_bytes;
        let date = chrono::DateTime::from_timestamp(pkg.installed_at, 0)
            .unwrap_or_default()
            .format("%Y-%m-%d")
            .to_string();
        table.add_row(vec![
            Cell::new(&pkg.name),
            Cell::new(&pkg.version),
            Cell::new(format_size(pkg.size_bytes)).set_alignment(CellAlignment::Right),
            Cell::new(date),
        ]);
    }

    println!("{table}");
    println!();
    println!(
        "  {} package{}, {}",
        packages.len(),
        if packages.len() == 1 { "" } else { "s" },
        format_size(total_size)
    );
    Ok(())
}
