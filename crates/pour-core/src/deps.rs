//! Runtime dependency probing.
//!
//! A dependency counts as present if pour installed it, or if an executable
//! with the same name is already on the search path (e.g. `bash` shipped by
//! the OS).

use std::ffi::OsString;

use pour_schema::{Formula, PackageName};

/// Where a dependency was found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Satisfaction {
    /// Recorded as installed by pour.
    Installed,
    /// Found as an executable on the search path.
    OnPath(std::path::PathBuf),
    /// Not found anywhere.
    Missing,
}

/// Resolves dependencies against the state database and the search path.
#[derive(Debug, Clone, Default)]
pub struct DependencyProbe {
    search_path: Option<OsString>,
}

impl DependencyProbe {
    /// Probe using the process's `PATH`.
    pub fn from_env() -> Self {
        Self {
            search_path: std::env::var_os("PATH"),
        }
    }

    /// Probe using an explicit search path.
    pub fn with_search_path(path: impl Into<OsString>) -> Self {
        Self {
            search_path: Some(path.into()),
        }
    }

    /// Check a single dependency.
    pub fn probe(
        &self,
        dep: &PackageName,
        is_installed: impl Fn(&PackageName) -> bool,
    ) -> Satisfaction {
        if is_installed(dep) {
            return Satisfaction::Installed;
        }
        let Some(paths) = self.search_path.as_ref() else {
            return Satisfaction::Missing;
        };
        let cwd = std::env::current_dir().unwrap_or_default();
        match which::which_in(dep.as_str(), Some(paths), cwd) {
            Ok(path) => Satisfaction::OnPath(path),
            Err(_) => Satisfaction::Missing,
        }
    }

    /// Return every runtime dependency of `formula` that cannot be found.
    pub fn missing(
        &self,
        formula: &Formula,
        is_installed: impl Fn(&PackageName) -> bool,
    ) -> Vec<PackageName> {
        formula
            .dependencies
            .runtime
            .iter()
            .filter(|dep| {
                let found = self.probe(dep, &is_installed);
                tracing::debug!(dependency = %dep, ?found, "probed dependency");
                found == Satisfaction::Missing
            })
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn formula_with_deps(deps: &[&str]) -> Formula {
        let deps = deps
            .iter()
            .map(|d| format!("\"{d}\""))
            .collect::<Vec<_>>()
            .join(", ");
        Formula::parse(&format!(
            r#"
[package]
name = "git-absorb"
version = "0.2.0"

[source]
url = "https://example.com/v0.2.0.tar.gz"
sha256 = "9e87daac2b6cb182e02657fdb8ff085ad018cf6164919ac21493a355fe4291c6"

[dependencies]
runtime = [{deps}]
"#
        ))
        .unwrap()
    }

    #[cfg(unix)]
    #[test]
    fn finds_executables_on_search_path() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let bash = dir.path().join("bash");
        std::fs::write(&bash, "#!/bin/sh\n").unwrap();
        std::fs::set_permissions(&bash, std::fs::Permissions::from_mode(0o755)).unwrap();

        let probe = DependencyProbe::with_search_path(dir.path());
        let formula = formula_with_deps(&["bash", "fish"]);

        assert_eq!(
            probe.probe(&PackageName::new("bash"), |_| false),
            Satisfaction::OnPath(bash)
        );
        assert_eq!(probe.missing(&formula, |_| false), vec![PackageName::new("fish")]);
    }

    #[test]
    fn installed_packages_satisfy_dependencies() {
        let probe = DependencyProbe::default();
        let formula = formula_with_deps(&["bash"]);
        assert!(probe.missing(&formula, |name| name == "bash").is_empty());
        assert_eq!(
            probe.missing(&formula, |_| false),
            vec![PackageName::new("bash")]
        );
    }
}
