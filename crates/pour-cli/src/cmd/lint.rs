//! Lint command
//!
//! Validates each formula file, then checks the records of every package as
//! a release history: consecutive versions may only differ in their
//! version-tagged fields unless the newer record documents a behavior change.

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{Result, bail};
use crossterm::style::Stylize;
use pour_schema::{Finding, Formula, FormulaHistory, PackageName, Severity};

/// Outcome of linting a set of files.
#[derive(Debug, Default)]
pub struct LintReport {
    /// Files that could not be parsed at all.
    pub unreadable: Vec<(PathBuf, String)>,
    /// Findings per package, in name order.
    pub findings: BTreeMap<PackageName, Vec<Finding>>,
    /// Number of records checked.
    pub records: usize,
}

impl LintReport {
    pub fn error_count(&self) -> usize {
        self.unreadable.len()
            + self
                .findings
                .values()
                .flatten()
                .filter(|f| f.severity == Severity::Error)
                .count()
    }
}

/// Parse and check formula files without printing anything.
pub fn lint_files(formulas: &[PathBuf]) -> LintReport {
    let mut report = LintReport::default();
    let mut by_name: BTreeMap<PackageName, Vec<Formula>> = BTreeMap::new();

    for path in formulas {
        match Formula::from_file(path) {
            Ok(formula) => by_name
                .entry(formula.name().clone())
                .or_default()
                .push(formula),
            Err(e) => report.unreadable.push((path.clone(), e.to_string())),
        }
    }

    for (name, records) in by_name {
        report.records += records.len();
        let findings = match FormulaHistory::new(records) {
            Ok(history) => history.check(),
            Err(e) => vec![Finding {
                severity: Severity::Error,
                version: "-".into(),
                message: e.to_string(),
            }],
        };
        report.findings.insert(name, findings);
    }
    report
}

/// Validate formula files and check release history consistency
pub fn lint(formulas: &[PathBuf]) -> Result<()> {
    let report = lint_files(formulas);

    for (path, error) in &report.unreadable {
        println!("  {} {}: {error}", "✗".red(), path.display());
    }
    for (name, findings) in &report.findings {
        if findings.is_empty() {
            println!("  {} {name}", "✓".green());
            continue;
        }
        for finding in findings {
            let icon = match finding.severity {
                Severity::Error => "✗".red(),
                Severity::Warning => "⚠".yellow(),
            };
            println!("  {icon} {name} {finding}");
        }
    }

    let errors = report.error_count();
    if errors > 0 {
        bail!("{errors} error(s) in {} file(s)", formulas.len());
    }
    println!();
    println!("  {} record(s) checked", report.records);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const RECORD: &str = r#"class GitAbsorb < Formula
  version "0.2.0"
  desc "An extension for Git that combines multiple repositories into a single repository"
  homepage "https://github.com/MrFlynn/git-absorb"
  url "https://github.com/MrFlynn/git-absorb/archive/v0.2.0.tar.gz"
  sha256 "9e87daac2b6cb182e02657fdb8ff085ad018cf6164919ac21493a355fe4291c6"

  depends_on "bash"

  def install
    bin.install "bin/git-absorb"
    man1.install "man/git-absorb.1"
  end
end
"#;

    fn write(dir: &std::path::Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn clean_history_has_no_errors() {
        let dir = tempfile::tempdir().unwrap();
        let next = RECORD.replace("0.2.0", "0.2.1").replace(
            "9e87daac2b6cb182e02657fdb8ff085ad018cf6164919ac21493a355fe4291c6",
            "1111111111111111111111111111111111111111111111111111111111111111",
        );
        let files = vec![
            write(dir.path(), "a.rb", RECORD),
            write(dir.path(), "b.rb", &next),
        ];

        let report = lint_files(&files);
        assert_eq!(report.records, 2);
        assert_eq!(report.error_count(), 0, "{report:?}");
    }

    #[test]
    fn undocumented_dependency_change_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let next = RECORD
            .replace("0.2.0", "0.2.1")
            .replace(
                "9e87daac2b6cb182e02657fdb8ff085ad018cf6164919ac21493a355fe4291c6",
                "2222222222222222222222222222222222222222222222222222222222222222",
            )
            .replace("depends_on \"bash\"", "depends_on \"zsh\"");
        let files = vec![
            write(dir.path(), "a.rb", RECORD),
            write(dir.path(), "b.rb", &next),
        ];

        assert!(lint_files(&files).error_count() > 0);
    }

    #[test]
    fn unreadable_file_is_counted() {
        let dir = tempfile::tempdir().unwrap();
        let files = vec![write(dir.path(), "bad.rb", "class Broken\n")];
        let report = lint_files(&files);
        assert_eq!(report.unreadable.len(), 1);
        assert_eq!(report.error_count(), 1);
    }
}
