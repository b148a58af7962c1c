//! Release history checks.
//!
//! A package publishes one immutable formula per version. Consecutive records
//! are expected to differ only in their version-tagged fields (`version`,
//! `source.url`, `source.sha256`); anything else has to be called out with a
//! `behavior_change` note on the newer record.

use std::collections::BTreeSet;
use std::fmt;

use thiserror::Error;

use crate::formula::Formula;
use crate::types::{InstallAction, PackageName, Version};

/// Errors raised when assembling a history.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HistoryError {
    /// No records were supplied.
    #[error("no formula records given")]
    Empty,

    /// Records belong to different packages.
    #[error("records mix packages: expected '{expected}', found '{found}'")]
    MixedPackages {
        /// Name of the first record.
        expected: PackageName,
        /// Conflicting name.
        found: PackageName,
    },

    /// Two records claim the same version.
    #[error("version {0} appears more than once")]
    DuplicateVersion(Version),
}

/// How serious a finding is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// Worth a look, does not fail a lint run.
    Warning,
    /// Breaks a release invariant.
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Warning => f.write_str("warning"),
            Self::Error => f.write_str("error"),
        }
    }
}

/// One result of [`FormulaHistory::check`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finding {
    /// How serious the finding is.
    pub severity: Severity,
    /// Version of the record the finding is about.
    pub version: Version,
    /// Human-readable description.
    pub message: String,
}

impl Finding {
    fn error(version: &Version, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            version: version.clone(),
            message: message.into(),
        }
    }

    fn warning(version: &Version, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            version: version.clone(),
            message: message.into(),
        }
    }
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]: {}", self.severity, self.version, self.message)
    }
}

/// All published records of one package, ordered oldest first.
#[derive(Debug, Clone)]
pub struct FormulaHistory {
    records: Vec<Formula>,
}

impl FormulaHistory {
    /// Build a history, sorting the records by version.
    ///
    /// # Errors
    ///
    /// Fails if `records` is empty, mixes package names, or repeats a version.
    pub fn new(mut records: Vec<Formula>) -> Result<Self, HistoryError> {
        let first = records.first().ok_or(HistoryError::Empty)?;
        let expected = first.package.name.clone();

        if let Some(other) = records.iter().find(|r| r.package.name != expected) {
            return Err(HistoryError::MixedPackages {
                expected,
                found: other.package.name.clone(),
            });
        }

        records.sort_by(|a, b| a.package.version.cmp(&b.package.version));
        if let Some(pair) = records
            .windows(2)
            .find(|w| w[0].package.version == w[1].package.version)
        {
            return Err(HistoryError::DuplicateVersion(pair[0].package.version.clone()));
        }

        Ok(Self { records })
    }

    /// Package the history belongs to.
    pub fn name(&self) -> &PackageName {
        &self.records[0].package.name
    }

    /// All records, oldest first.
    pub fn records(&self) -> &[Formula] {
        &self.records
    }

    /// The newest record.
    pub fn latest(&self) -> &Formula {
        &self.records[self.records.len() - 1]
    }

    /// Look up the record for a given version.
    pub fn get(&self, version: &str) -> Option<&Formula> {
        self.records.iter().find(|r| r.package.version == version)
    }

    /// Run every per-record and cross-record check.
    pub fn check(&self) -> Vec<Finding> {
        let mut findings = Vec::new();

        for record in &self.records {
            let version = &record.package.version;
            for issue in record.validate() {
                findings.push(Finding::error(version, issue.to_string()));
            }
        }

        for pair in self.records.windows(2) {
            findings.extend(compare(&pair[0], &pair[1]));
        }

        findings
    }

    /// Whether [`check`](Self::check) reports no errors (warnings allowed).
    pub fn is_consistent(&self) -> bool {
        self.check().iter().all(|f| f.severity < Severity::Error)
    }
}

/// Compare two consecutive records of the same package.
///
/// Source paths and URLs are compared after substituting the older version
/// string with the newer one, so `pkg-0.2.0/bin/pkg` -> `pkg-0.2.1/bin/pkg`
/// counts as unchanged.
pub fn compare(prev: &Formula, next: &Formula) -> Vec<Finding> {
    let mut findings = Vec::new();
    let old_v = prev.package.version.as_str();
    let new_v = next.package.version.as_str();
    let documented = next.package.behavior_change.is_some();

    let retag = |s: &str| {
        if old_v.is_empty() {
            s.to_string()
        } else {
            s.replace(old_v, new_v)
        }
    };

    if prev.source.sha256 == next.source.sha256 {
        findings.push(Finding::error(
            &next.package.version,
            format!("sha256 is identical to {old_v}; a new release must have a new archive"),
        ));
    }

    if retag(&prev.source.url) != next.source.url {
        findings.push(Finding::warning(
            &next.package.version,
            format!(
                "source URL pattern changed ({} -> {})",
                prev.source.url, next.source.url
            ),
        ));
    }

    let prev_deps: BTreeSet<_> = prev.dependencies.runtime.iter().collect();
    let next_deps: BTreeSet<_> = next.dependencies.runtime.iter().collect();
    if prev_deps != next_deps {
        let added: Vec<_> = next_deps.difference(&prev_deps).map(|d| d.as_str()).collect();
        let removed: Vec<_> = prev_deps.difference(&next_deps).map(|d| d.as_str()).collect();
        let message = format!(
            "dependency set changed (added: [{}], removed: [{}])",
            added.join(", "),
            removed.join(", ")
        );
        findings.push(shape_finding(&next.package.version, documented, message));
    }

    let prev_shape: Vec<InstallAction> = prev
        .install
        .iter()
        .map(|a| InstallAction::new(retag(&a.source), a.target))
        .collect();
    if prev_shape != next.install {
        let describe = |actions: &[InstallAction]| {
            actions
                .iter()
                .map(|a| format!("{}<-{}", a.target, a.source))
                .collect::<Vec<_>>()
                .join(", ")
        };
        let message = format!(
            "install directives changed ([{}] -> [{}])",
            describe(&prev.install),
            describe(&next.install)
        );
        findings.push(shape_finding(&next.package.version, documented, message));
    }

    if prev.archive_format() != next.archive_format() {
        findings.push(Finding::warning(
            &next.package.version,
            format!(
                "archive format changed ({} -> {})",
                prev.archive_format(),
                next.archive_format()
            ),
        ));
    }

    if prev.package.description != next.package.description {
        findings.push(Finding::warning(&next.package.version, "description changed"));
    }
    if prev.package.homepage != next.package.homepage {
        findings.push(Finding::warning(&next.package.version, "homepage changed"));
    }

    findings
}

fn shape_finding(version: &Version, documented: bool, message: String) -> Finding {
    if documented {
        Finding::warning(version, format!("{message} (documented behavior change)"))
    } else {
        Finding::error(version, format!("{message} without a documented behavior change"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formula::tests::git_absorb;
    use crate::hash::Sha256Digest;
    use crate::types::InstallTarget;

    fn release_021() -> Formula {
        let mut f = git_absorb();
        f.package.version = Version::from("0.2.1");
        f.source.url = "https://github.com/MrFlynn/git-absorb/archive/v0.2.1.tar.gz".to_string();
        f.source.sha256 = Sha256Digest::compute(b"git-absorb 0.2.1");
        f
    }

    #[test]
    fn consecutive_releases_are_consistent() {
        let history = FormulaHistory::new(vec![release_021(), git_absorb()]).unwrap();
        assert_eq!(history.records()[0].package.version, Version::from("0.2.0"));
        assert_eq!(history.latest().package.version, Version::from("0.2.1"));
        assert!(history.check().is_empty(), "{:?}", history.check());
        assert!(history.is_consistent());
    }

    #[test]
    fn reused_hash_is_an_error() {
        let mut next = release_021();
        next.source.sha256 = git_absorb().source.sha256;
        let findings = compare(&git_absorb(), &next);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].severity, Severity::Error);
    }

    #[test]
    fn undocumented_dependency_change_is_an_error() {
        let mut next = release_021();
        next.dependencies.runtime.push(PackageName::new("git"));
        let findings = compare(&git_absorb(), &next);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].severity, Severity::Error);
        assert!(findings[0].message.contains("added: [git]"));
    }

    #[test]
    fn documented_install_change_is_a_warning() {
        let mut next = release_021();
        next.install
            .push(InstallAction::new("completions/_git-absorb", InstallTarget::ZshCompletion));
        next.package.behavior_change = Some("ships zsh completions".to_string());

        let findings = compare(&git_absorb(), &next);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].severity, Severity::Warning);
    }

    #[test]
    fn versioned_source_paths_are_not_a_shape_change() {
        let mut prev = git_absorb();
        prev.install[0].source = "git-absorb-0.2.0/bin/git-absorb".to_string();
        let mut next = release_021();
        next.install[0].source = "git-absorb-0.2.1/bin/git-absorb".to_string();
        assert!(compare(&prev, &next).is_empty());
    }

    #[test]
    fn history_rejects_duplicates_and_mixed_names() {
        assert_eq!(
            FormulaHistory::new(vec![git_absorb(), git_absorb()]).unwrap_err(),
            HistoryError::DuplicateVersion(Version::from("0.2.0"))
        );

        let mut other = release_021();
        other.package.name = PackageName::new("git-other");
        assert!(matches!(
            FormulaHistory::new(vec![git_absorb(), other]),
            Err(HistoryError::MixedPackages { .. })
        ));

        assert_eq!(FormulaHistory::new(Vec::new()).unwrap_err(), HistoryError::Empty);
    }

    #[test]
    fn record_level_issues_surface_in_check() {
        let mut bad = release_021();
        bad.source.url = "https://github.com/MrFlynn/git-absorb/archive/latest.tar.gz".to_string();
        let history = FormulaHistory::new(vec![git_absorb(), bad]).unwrap();
        let findings = history.check();
        assert!(findings
            .iter()
            .any(|f| f.severity == Severity::Error && f.message.contains("does not contain version")));
        assert!(!history.is_consistent());
        assert!(history.get("0.2.1").is_some());
    }
}
