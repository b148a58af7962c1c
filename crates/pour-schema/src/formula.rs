//! Formula descriptor parsing and validation
//!
//! A formula is the immutable, per-release record that says where an archive
//! lives, what it must hash to, what it needs at runtime, and which files are
//! copied out of it.

use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::{Component, Path};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::dsl::{self, DslError};
use crate::hash::Sha256Digest;
use crate::types::{ArtifactFormat, InstallAction, PackageName, Version};

/// Errors that can occur when loading or parsing a formula.
#[derive(Error, Debug)]
pub enum FormulaError {
    /// An I/O error occurred while reading a formula file.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The TOML content could not be deserialized into a valid formula.
    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// The formula could not be serialized to TOML.
    #[error("Serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// The Ruby DSL content could not be read.
    #[error(transparent)]
    Dsl(#[from] DslError),

    /// The formula parsed but failed validation.
    #[error("Formula '{name}' is invalid:\n{}", format_issues(.issues))]
    Invalid {
        /// Name of the offending formula.
        name: String,
        /// Every problem found.
        issues: Vec<ValidationIssue>,
    },
}

fn format_issues(issues: &[ValidationIssue]) -> String {
    issues
        .iter()
        .map(|i| format!("  - {i}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// A single problem reported by [`Formula::validate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    /// Field the problem is attached to (e.g. `source.url`).
    pub field: &'static str,
    /// Human-readable description.
    pub message: String,
}

impl ValidationIssue {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Metadata describing a package's identity and provenance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageInfo {
    /// Unique name that identifies this package.
    pub name: PackageName,
    /// Semantic version string for the release.
    pub version: Version,
    /// Short human-readable summary of the package.
    #[serde(default)]
    pub description: String,
    /// URL of the project's homepage.
    #[serde(default)]
    pub homepage: String,
    /// SPDX license identifier, if declared.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license: Option<String>,
    /// Documents an intentional change of dependencies or install shape
    /// relative to the previous release.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub behavior_change: Option<String>,
}

/// Location and integrity information for the release archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    /// Download URL for the archive (`https://`, `http://` or `file://`).
    pub url: String,
    /// Expected SHA-256 digest of the downloaded archive.
    pub sha256: Sha256Digest,
    /// Archive format; inferred from the URL when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<ArtifactFormat>,
}

/// Packages that must be present before installation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependencies {
    /// Packages required at runtime.
    #[serde(default)]
    pub runtime: Vec<PackageName>,
}

/// Complete formula descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Formula {
    /// Core metadata (name, version, description, ...).
    pub package: PackageInfo,
    /// Archive location and integrity data.
    pub source: Source,
    /// Runtime dependencies.
    #[serde(default)]
    pub dependencies: Dependencies,
    /// Ordered install directives.
    #[serde(default)]
    pub install: Vec<InstallAction>,
}

impl Formula {
    /// Load a formula from disk, choosing the encoding by extension.
    ///
    /// `.rb` files are read as the Ruby DSL; everything else as TOML.
    ///
    /// # Errors
    ///
    /// Returns `FormulaError::Io` if the file cannot be read, or a parse
    /// error if the content is malformed.
    pub fn from_file(path: &Path) -> Result<Self, FormulaError> {
        let content = fs::read_to_string(path)?;
        if is_dsl_path(path) {
            Ok(dsl::parse(&content)?)
        } else {
            Self::parse(&content)
        }
    }

    /// Parse a formula from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns `FormulaError::Parse` if the TOML content is invalid or does
    /// not match the expected schema.
    pub fn parse(content: &str) -> Result<Self, FormulaError> {
        Ok(toml::from_str(content)?)
    }

    /// Serialize this formula to a pretty-printed TOML string.
    ///
    /// # Errors
    ///
    /// Returns `FormulaError::Serialize` if serialization fails.
    pub fn to_toml(&self) -> Result<String, FormulaError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Render this formula in the host package manager's Ruby DSL.
    pub fn to_dsl(&self) -> String {
        dsl::render(self)
    }

    /// Package name shortcut.
    pub fn name(&self) -> &PackageName {
        &self.package.name
    }

    /// Version shortcut.
    pub fn version(&self) -> &Version {
        &self.package.version
    }

    /// Final path segment of the source URL.
    pub fn archive_file_name(&self) -> &str {
        let trimmed = self.source.url.split(['?', '#']).next().unwrap_or_default();
        trimmed.rsplit('/').next().unwrap_or_default()
    }

    /// Effective archive format (explicit, or detected from the URL).
    pub fn archive_format(&self) -> ArtifactFormat {
        self.source
            .format
            .unwrap_or_else(|| ArtifactFormat::detect(self.archive_file_name()))
    }

    /// Whether the source URL embeds this record's own version string.
    pub fn url_contains_version(&self) -> bool {
        !self.package.version.is_empty() && self.source.url.contains(self.package.version.as_str())
    }

    /// Check every field and return all problems found.
    pub fn validate(&self) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();
        let pkg = &self.package;

        if pkg.name.is_empty() {
            issues.push(ValidationIssue::new("package.name", "must not be empty"));
        } else if !pkg.name.is_well_formed() {
            issues.push(ValidationIssue::new(
                "package.name",
                format!("'{}' contains characters outside [a-z0-9+._-]", pkg.name),
            ));
        }

        if pkg.version.is_empty() {
            issues.push(ValidationIssue::new("package.version", "must not be empty"));
        } else if pkg.version.semver().is_none() {
            issues.push(ValidationIssue::new(
                "package.version",
                format!("'{}' is not a semantic version", pkg.version),
            ));
        }

        if pkg.description.trim().is_empty() {
            issues.push(ValidationIssue::new("package.description", "must not be empty"));
        }

        if !is_http_url(&pkg.homepage) {
            issues.push(ValidationIssue::new(
                "package.homepage",
                format!("'{}' is not an http(s) URL", pkg.homepage),
            ));
        }

        let url = &self.source.url;
        if !(is_http_url(url) || url.starts_with("file://")) {
            issues.push(ValidationIssue::new(
                "source.url",
                format!("'{url}' must use https://, http:// or file://"),
            ));
        } else if self.archive_file_name().is_empty() {
            issues.push(ValidationIssue::new(
                "source.url",
                "does not end in a file name",
            ));
        }
        if !pkg.version.is_empty() && !self.url_contains_version() {
            issues.push(ValidationIssue::new(
                "source.url",
                format!("does not contain version '{}'", pkg.version),
            ));
        }

        let mut seen_deps = HashSet::new();
        for dep in &self.dependencies.runtime {
            if !dep.is_well_formed() {
                issues.push(ValidationIssue::new(
                    "dependencies.runtime",
                    format!("'{dep}' is not a valid package name"),
                ));
            }
            if dep == &pkg.name {
                issues.push(ValidationIssue::new(
                    "dependencies.runtime",
                    "package depends on itself",
                ));
            }
            if !seen_deps.insert(dep) {
                issues.push(ValidationIssue::new(
                    "dependencies.runtime",
                    format!("'{dep}' listed twice"),
                ));
            }
        }

        if self.install.is_empty() {
            issues.push(ValidationIssue::new("install", "no install directives"));
        }

        let mut seen_dest = HashSet::new();
        for action in &self.install {
            if let Some(problem) = source_path_problem(&action.source) {
                issues.push(ValidationIssue::new(
                    "install.source",
                    format!("'{}' {problem}", action.source),
                ));
                continue;
            }
            if let Some(dest) = action.destination(&pkg.name) {
                if !seen_dest.insert(dest.clone()) {
                    issues.push(ValidationIssue::new(
                        "install.target",
                        format!("two directives install to '{}'", dest.display()),
                    ));
                }
            }
        }

        issues
    }

    /// Validate and turn any problems into an error.
    ///
    /// # Errors
    ///
    /// Returns `FormulaError::Invalid` listing every issue found.
    pub fn ensure_valid(&self) -> Result<(), FormulaError> {
        let issues = self.validate();
        if issues.is_empty() {
            Ok(())
        } else {
            Err(FormulaError::Invalid {
                name: self.package.name.to_string(),
                issues,
            })
        }
    }
}

impl std::str::FromStr for Formula {
    type Err = FormulaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Whether `path` names a Ruby DSL formula.
pub fn is_dsl_path(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "rb")
}

fn is_http_url(s: &str) -> bool {
    let rest = s
        .strip_prefix("https://")
        .or_else(|| s.strip_prefix("http://"));
    rest.is_some_and(|r| !r.is_empty())
}

fn source_path_problem(source: &str) -> Option<&'static str> {
    if source.is_empty() {
        return Some("is empty");
    }
    let path = Path::new(source);
    if path.is_absolute() {
        return Some("must be relative to the archive root");
    }
    if path
        .components()
        .any(|c| matches!(c, Component::ParentDir | Component::Prefix(_)))
    {
        return Some("must not leave the archive root");
    }
    if path.file_name().is_none() {
        return Some("does not name a file");
    }
    None
}
