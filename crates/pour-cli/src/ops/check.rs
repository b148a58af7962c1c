//! Integrity check of installed files.

use std::path::Path;

use pour_core::install::{FileStatus, inspect_file};

use crate::ops::OpError;
use crate::store::StateDb;

/// A recorded file whose on-disk state differs from what was installed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Problem {
    pub package: String,
    pub path: String,
    pub status: FileStatus,
}

/// Compare every recorded file of `packages` (or of all installed packages
/// when empty) against its recorded mode and fingerprint.
pub fn check_packages(db: &StateDb, packages: &[String]) -> Result<Vec<Problem>, OpError> {
    let names: Vec<String> = if packages.is_empty() {
        db.list_packages()?.into_iter().map(|p| p.name).collect()
    } else {
        for name in packages {
            if db.get_package(name)?.is_none() {
                return Err(OpError::NotInstalled(name.clone()));
            }
        }
        packages.to_vec()
    };

    let mut problems = Vec::new();
    for name in &names {
        for file in db.get_package_files(name)? {
            let status = inspect_file(Path::new(&file.path), file.mode, &file.blake3)?;
            tracing::debug!(path = %file.path, ?status, "checked");
            if status != FileStatus::Ok {
                problems.push(Problem {
                    package: name.clone(),
                    path: file.path,
                    status,
                });
            }
        }
    }
    Ok(problems)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::install::{InstallOptions, install_formula};
    use crate::ops::test_support::{Sandbox, git_absorb_archive};

    #[tokio::test]
    async fn detects_missing_and_modified_files() {
        let mut sandbox = Sandbox::new();
        let formula = sandbox.formula_for("0.2.0", &git_absorb_archive());
        install_formula(&mut sandbox.ctx, &formula, InstallOptions::default())
            .await
            .unwrap();

        assert!(check_packages(&sandbox.ctx.db, &[]).unwrap().is_empty());

        let bin = sandbox.ctx.layout.bin_dir().join("git-absorb");
        let man = sandbox.ctx.layout.man_dir(1).join("git-absorb.1");
        std::fs::remove_file(&bin).unwrap();
        std::fs::write(&man, "tampered").unwrap();

        let problems = check_packages(&sandbox.ctx.db, &["git-absorb".to_string()]).unwrap();
        assert_eq!(problems.len(), 2);
        assert!(
            problems
                .iter()
                .any(|p| p.path == bin.to_string_lossy() && p.status == FileStatus::Missing)
        );
        assert!(
            problems
                .iter()
                .any(|p| p.path == man.to_string_lossy() && p.status == FileStatus::Modified)
        );
    }

    #[test]
    fn unknown_package_is_an_error() {
        let sandbox = Sandbox::new();
        assert!(matches!(
            check_packages(&sandbox.ctx.db, &["nope".to_string()]),
            Err(OpError::NotInstalled(_))
        ));
    }
}
