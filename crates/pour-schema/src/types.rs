//! Core identifiers: package names, versions, archive formats, install targets.

use std::borrow::Borrow;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// A normalized package name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PackageName(String);

impl PackageName {
    /// Create a new package name, normalizing the input to lowercase.
    pub fn new(name: &str) -> Self {
        Self(name.to_lowercase())
    }

    /// Return the normalized name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the name is usable as a file name and DSL identifier.
    ///
    /// Allowed: a leading `[a-z0-9]` followed by `[a-z0-9+._-]`.
    pub fn is_well_formed(&self) -> bool {
        let mut chars = self.0.chars();
        match chars.next() {
            Some(c) if c.is_ascii_lowercase() || c.is_ascii_digit() => {}
            _ => return false,
        }
        chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || "+._-".contains(c))
    }

    /// Derive a package name from a formula class name (`GitAbsorb` -> `git-absorb`).
    pub fn from_class_name(class: &str) -> Self {
        let mut out = String::with_capacity(class.len() + 4);
        let mut prev_lower_or_digit = false;
        for c in class.chars() {
            if c.is_ascii_uppercase() {
                if prev_lower_or_digit {
                    out.push('-');
                }
                out.push(c.to_ascii_lowercase());
                prev_lower_or_digit = false;
            } else {
                out.push(c);
                prev_lower_or_digit = c.is_ascii_lowercase() || c.is_ascii_digit();
            }
        }
        Self(out)
    }

    /// Render the formula class name for this package (`git-absorb` -> `GitAbsorb`).
    pub fn class_name(&self) -> String {
        self.0
            .split(['-', '_', '.', '+'])
            .filter(|part| !part.is_empty())
            .map(|part| {
                let mut chars = part.chars();
                chars.next().map_or_else(String::new, |first| {
                    first.to_ascii_uppercase().to_string() + chars.as_str()
                })
            })
            .collect()
    }
}

impl AsRef<std::ffi::OsStr> for PackageName {
    fn as_ref(&self) -> &std::ffi::OsStr {
        self.0.as_ref()
    }
}

impl AsRef<Path> for PackageName {
    fn as_ref(&self) -> &Path {
        Path::new(&self.0)
    }
}

impl fmt::Display for PackageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::ops::Deref for PackageName {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<str> for PackageName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for PackageName {
    fn eq(&self, other: &str) -> bool {
        self.0 == other.to_lowercase()
    }
}

impl PartialEq<&str> for PackageName {
    fn eq(&self, other: &&str) -> bool {
        self.0 == other.to_lowercase()
    }
}

impl Borrow<str> for PackageName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for PackageName {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for PackageName {
    fn from(s: String) -> Self {
        Self::new(&s)
    }
}

/// A semantic version string.
///
/// Stored verbatim so it can be matched against URLs; ordering falls back to
/// lexical comparison for strings `semver` cannot parse.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Version(String);

impl Ord for Version {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        match (self.semver(), other.semver()) {
            (Some(a), Some(b)) => a.cmp(&b),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => self.0.cmp(&other.0),
        }
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Version {
    /// Create a new version from the given string (stored as-is).
    pub fn new(v: &str) -> Self {
        Self(v.to_string())
    }

    /// Return the version string as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Parse as a semantic version, if possible.
    pub fn semver(&self) -> Option<semver::Version> {
        semver::Version::parse(&self.0).ok()
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::ops::Deref for Version {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<str> for Version {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Version {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for Version {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl PartialEq<&str> for Version {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// Archive or binary format of a downloadable artifact.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactFormat {
    /// Gzip-compressed tar archive (`.tar.gz` / `.tgz`).
    #[serde(rename = "tar.gz")]
    TarGz,
    /// Zstandard-compressed tar archive (`.tar.zst`).
    #[serde(rename = "tar.zst")]
    TarZst,
    /// Uncompressed tar archive (`.tar`).
    Tar,
    /// Zip archive (`.zip`).
    Zip,
    /// Standalone file with no archive wrapper.
    Binary,
}

impl ArtifactFormat {
    /// Detect the format from a file name or URL suffix.
    pub fn detect(name: &str) -> Self {
        let lower = name.to_lowercase();
        if lower.ends_with(".tar.zst") || lower.ends_with(".tzst") {
            Self::TarZst
        } else if lower.ends_with(".tar.gz") || lower.ends_with(".tgz") {
            Self::TarGz
        } else if lower.ends_with(".tar") {
            Self::Tar
        } else if lower.ends_with(".zip") {
            Self::Zip
        } else {
            Self::Binary
        }
    }
}

impl fmt::Display for ArtifactFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::TarGz => "tar.gz",
            Self::TarZst => "tar.zst",
            Self::Tar => "tar",
            Self::Zip => "zip",
            Self::Binary => "binary",
        };
        f.write_str(s)
    }
}

/// Destination directory class of an install directive.
///
/// Names follow the host package manager's DSL receivers (`bin`, `man1`, ...),
/// so they serialize the same way in TOML and in the Ruby DSL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum InstallTarget {
    /// Executables on the search path.
    Bin,
    /// System administration executables.
    Sbin,
    /// Private executables not placed on the search path.
    Libexec,
    /// Libraries.
    Lib,
    /// C headers.
    Include,
    /// Architecture-independent data.
    Share,
    /// Package documentation (`share/doc/<name>`).
    Doc,
    /// Manual pages of the given section (1-8).
    Man(u8),
    /// Bash completion scripts.
    BashCompletion,
    /// Zsh completion functions.
    ZshCompletion,
    /// Fish completion scripts.
    FishCompletion,
}

impl InstallTarget {
    /// Parse a DSL receiver name such as `bin` or `man1`.
    pub fn parse(s: &str) -> Option<Self> {
        let target = match s {
            "bin" => Self::Bin,
            "sbin" => Self::Sbin,
            "libexec" => Self::Libexec,
            "lib" => Self::Lib,
            "include" => Self::Include,
            "share" => Self::Share,
            "doc" => Self::Doc,
            "bash_completion" => Self::BashCompletion,
            "zsh_completion" => Self::ZshCompletion,
            "fish_completion" => Self::FishCompletion,
            other => {
                let section: u8 = other.strip_prefix("man")?.parse().ok()?;
                if !(1..=8).contains(&section) {
                    return None;
                }
                Self::Man(section)
            }
        };
        Some(target)
    }

    /// Whether files placed here must carry the executable bit.
    pub fn is_executable(self) -> bool {
        matches!(self, Self::Bin | Self::Sbin | Self::Libexec)
    }

    /// File mode applied to installed files of this target.
    pub fn mode(self) -> u32 {
        if self.is_executable() { 0o755 } else { 0o644 }
    }

    /// Directory, relative to the install prefix, that this target resolves to.
    pub fn relative_dir(self, package: &PackageName) -> PathBuf {
        match self {
            Self::Bin => PathBuf::from("bin"),
            Self::Sbin => PathBuf::from("sbin"),
            Self::Libexec => PathBuf::from("libexec").join(package.as_str()),
            Self::Lib => PathBuf::from("lib"),
            Self::Include => PathBuf::from("include"),
            Self::Share => PathBuf::from("share"),
            Self::Doc => PathBuf::from("share/doc").join(package.as_str()),
            Self::Man(section) => PathBuf::from(format!("share/man/man{section}")),
            Self::BashCompletion => PathBuf::from("etc/bash_completion.d"),
            Self::ZshCompletion => PathBuf::from("share/zsh/site-functions"),
            Self::FishCompletion => PathBuf::from("share/fish/vendor_completions.d"),
        }
    }
}

impl fmt::Display for InstallTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bin => f.write_str("bin"),
            Self::Sbin => f.write_str("sbin"),
            Self::Libexec => f.write_str("libexec"),
            Self::Lib => f.write_str("lib"),
            Self::Include => f.write_str("include"),
            Self::Share => f.write_str("share"),
            Self::Doc => f.write_str("doc"),
            Self::Man(section) => write!(f, "man{section}"),
            Self::BashCompletion => f.write_str("bash_completion"),
            Self::ZshCompletion => f.write_str("zsh_completion"),
            Self::FishCompletion => f.write_str("fish_completion"),
        }
    }
}

impl TryFrom<String> for InstallTarget {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s).ok_or_else(|| format!("unknown install target '{s}'"))
    }
}

impl From<InstallTarget> for String {
    fn from(t: InstallTarget) -> Self {
        t.to_string()
    }
}

/// One copy directive: a file inside the archive and where it goes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InstallAction {
    /// Path of the file relative to the archive's content root.
    pub source: String,
    /// Destination directory class.
    pub target: InstallTarget,
}

impl InstallAction {
    /// Build a directive.
    pub fn new(source: impl Into<String>, target: InstallTarget) -> Self {
        Self {
            source: source.into(),
            target,
        }
    }

    /// Final file name of the installed file.
    pub fn file_name(&self) -> Option<&str> {
        Path::new(&self.source).file_name().and_then(|n| n.to_str())
    }

    /// Destination path relative to the install prefix.
    pub fn destination(&self, package: &PackageName) -> Option<PathBuf> {
        self.file_name()
            .map(|name| self.target.relative_dir(package).join(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn class_name_round_trip() {
        let name = PackageName::from_class_name("GitAbsorb");
        assert_eq!(name.as_str(), "git-absorb");
        assert_eq!(name.class_name(), "GitAbsorb");
    }

    #[test]
    fn class_name_keeps_digits_attached() {
        assert_eq!(PackageName::from_class_name("Libfoo2").as_str(), "libfoo2");
        assert_eq!(PackageName::new("python3.12").class_name(), "Python312");
    }

    #[test]
    fn well_formed_names() {
        assert!(PackageName::new("git-absorb").is_well_formed());
        assert!(PackageName::new("c++-utils").is_well_formed());
        assert!(!PackageName::new("-leading").is_well_formed());
        assert!(!PackageName::new("has space").is_well_formed());
        assert!(!PackageName::new("").is_well_formed());
    }

    #[test]
    fn version_ordering_uses_semver() {
        let mut versions = vec![
            Version::from("0.10.0"),
            Version::from("0.2.1"),
            Version::from("0.2.0"),
        ];
        versions.sort();
        assert_eq!(versions, vec!["0.2.0".into(), "0.2.1".into(), Version::from("0.10.0")]);
    }

    #[test]
    fn detect_formats() {
        assert_eq!(
            ArtifactFormat::detect("https://x/archive/v0.2.0.tar.gz"),
            ArtifactFormat::TarGz
        );
        assert_eq!(ArtifactFormat::detect("a.TZST"), ArtifactFormat::TarZst);
        assert_eq!(ArtifactFormat::detect("a.zip"), ArtifactFormat::Zip);
        assert_eq!(ArtifactFormat::detect("git-absorb"), ArtifactFormat::Binary);
    }

    #[test]
    fn install_targets_parse_and_display() {
        for name in ["bin", "man1", "man8", "doc", "zsh_completion"] {
            let target = InstallTarget::parse(name).unwrap();
            assert_eq!(target.to_string(), name);
        }
        assert!(InstallTarget::parse("man0").is_none());
        assert!(InstallTarget::parse("man9").is_none());
        assert!(InstallTarget::parse("etc").is_none());
    }

    #[test]
    fn destinations_and_modes() {
        let pkg = PackageName::new("git-absorb");
        let bin = InstallAction::new("bin/git-absorb", InstallTarget::Bin);
        let man = InstallAction::new("man/git-absorb.1", InstallTarget::Man(1));

        assert_eq!(bin.destination(&pkg).unwrap(), PathBuf::from("bin/git-absorb"));
        assert_eq!(
            man.destination(&pkg).unwrap(),
            PathBuf::from("share/man/man1/git-absorb.1")
        );
        assert_eq!(bin.target.mode(), 0o755);
        assert_eq!(man.target.mode(), 0o644);
    }
}
