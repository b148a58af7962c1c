//! Remove command

use anyhow::{Result, bail};
use pour_core::Reporter;
use pour_schema::{PackageName, Version};

use crate::ops::Context;
use crate::ops::remove::remove_package;
use crate::ui::Output;

/// Remove one or more packages
pub fn remove(packages: &[String], force: bool) -> Result<()> {
    let output = Output::new();
    let mut ctx = Context::from_env(output.clone())?;

    let mut failed = 0;
    for pkg in packages {
        let name = PackageName::new(pkg);
        match remove_package(&mut ctx, &name, force) {
            Ok(Some(_)) => {}
            Ok(None) => output.info(&format!("{name} is not installed")),
            Err(e) => {
                output.failed(&name, &Version::from("-"), &e.to_string());
                failed += 1;
            }
        }
    }

    if failed > 0 {
        bail!("{failed} package(s) could not be removed");
    }
    Ok(())
}
