//! Package removal.

use std::path::PathBuf;

use pour_core::Reporter;
use pour_core::install;
use pour_schema::{PackageName, Version};

use crate::ops::{Context, OpError};

/// Delete every file recorded for `name` and drop its records.
///
/// If some files cannot be deleted the record is kept (so a later `remove`
/// can retry) unless `force` is set. With `force`, a package that is not
/// installed is not an error.
pub fn remove_package<R: Reporter>(
    ctx: &mut Context<R>,
    name: &PackageName,
    force: bool,
) -> Result<Option<Version>, OpError> {
    let Some(record) = ctx.db.get_package(name.as_str())? else {
        if force {
            tracing::debug!(package = %name, "not installed, nothing to do");
            return Ok(None);
        }
        return Err(OpError::NotInstalled(name.to_string()));
    };
    let version = Version::from(record.version.as_str());

    let paths: Vec<PathBuf> = ctx
        .db
        .get_package_files(name.as_str())?
        .into_iter()
        .map(|f| PathBuf::from(f.path))
        .collect();

    let failures = install::remove_files(name, &version, &paths, &ctx.reporter);
    for (path, e) in &failures {
        ctx.reporter
            .warning(&format!("could not remove {}: {e}", path.display()));
    }
    if !failures.is_empty() && !force {
        return Err(OpError::RemoveIncomplete {
            name: name.to_string(),
            count: failures.len(),
        });
    }

    ctx.db.remove_package(name.as_str())?;
    ctx.db
        .add_history(name.as_str(), "remove", Some(version.as_str()), None)?;
    ctx.reporter.done(name, &version, "removed", None);
    Ok(Some(version))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::install::{InstallOptions, install_formula};
    use crate::ops::test_support::{Sandbox, git_absorb_archive};

    #[tokio::test]
    async fn removes_installed_files_and_records() {
        let mut sandbox = Sandbox::new();
        let formula = sandbox.formula_for("0.2.0", &git_absorb_archive());
        install_formula(&mut sandbox.ctx, &formula, InstallOptions::default())
            .await
            .unwrap();

        let name = PackageName::new("git-absorb");
        let removed = remove_package(&mut sandbox.ctx, &name, false).unwrap();
        assert_eq!(removed, Some(Version::from("0.2.0")));

        assert!(!sandbox.ctx.layout.bin_dir().join("git-absorb").exists());
        assert!(!sandbox.ctx.layout.man_dir(1).join("git-absorb.1").exists());
        assert!(sandbox.ctx.db.get_package("git-absorb").unwrap().is_none());

        let history = sandbox.ctx.db.history("git-absorb").unwrap();
        assert_eq!(history.last().unwrap().action, "remove");
    }

    #[test]
    fn removing_unknown_package() {
        let mut sandbox = Sandbox::new();
        let name = PackageName::new("nope");
        assert!(matches!(
            remove_package(&mut sandbox.ctx, &name, false),
            Err(OpError::NotInstalled(_))
        ));
        assert_eq!(remove_package(&mut sandbox.ctx, &name, true).unwrap(), None);
    }

    #[tokio::test]
    async fn already_deleted_files_do_not_block_removal() {
        let mut sandbox = Sandbox::new();
        let formula = sandbox.formula_for("0.2.0", &git_absorb_archive());
        install_formula(&mut sandbox.ctx, &formula, InstallOptions::default())
            .await
            .unwrap();
        std::fs::remove_file(sandbox.ctx.layout.bin_dir().join("git-absorb")).unwrap();

        let name = PackageName::new("git-absorb");
        assert!(remove_package(&mut sandbox.ctx, &name, false).unwrap().is_some());
    }
}
