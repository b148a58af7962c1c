//! History command

use anyhow::{Context, Result};
use chrono::DateTime;
use pour_core::config;

use crate::store::StateDb;
use crate::store::db::HistoryEvent;

/// One line of `pour history` output (without timestamp).
pub fn describe(event: &HistoryEvent) -> String {
    match event.action.as_str() {
        "install" => {
            let to = event.version_to.as_deref().unwrap_or("?");
            match event.version_from.as_deref() {
                Some(from) if from == to => format!("Reinstalled {to}"),
                Some(from) => format!("Updated from {from} to {to}"),
                None => format!("Installed {to}"),
            }
        }
        "remove" => {
            let from = event.version_from.as_deref().unwrap_or("?");
            format!("Removed {from}")
        }
        other => format!("{other} {}", event.version_to.as_deref().unwrap_or("")),
    }
}

pub fn history(pkg_name: &str) -> Result<()> {
    let (_, layout) = config::load_from_env()?;
    let db = StateDb::open(&layout).context("Failed to open state database")?;
    let events = db.history(pkg_name)?;

    if events.is_empty() {
        println!("  No history found for '{pkg_name}'");
        return Ok(());
    }

    println!();
    for event in &events {
        let time = DateTime::from_timestamp_millis(event.timestamp)
            .unwrap_or_default()
            .with_timezone(&chrono::Local)
            .format("%Y-%m-%d %H:%M:%S");
        println!("  [{time}] {}", describe(event));
    }
    println!();
    Ok(())
}
