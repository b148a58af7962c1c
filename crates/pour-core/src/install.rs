//! Transactional placement of install directives.
//!
//! Installation runs in three phases so that a failure never leaves a
//! half-installed package behind:
//!
//! 1. **plan**: resolve every directive against the extracted archive. A
//!    missing source file aborts here, before any destination is touched.
//! 2. **stage**: copy each source into a temp file next to its destination
//!    (same filesystem) and apply the final mode.
//! 3. **commit**: move pre-existing destinations aside, rename staged files
//!    into place, and undo everything if any step fails.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use pour_schema::{Blake3Hash, Formula, InstallTarget, PackageName, Version};
use tempfile::NamedTempFile;
use thiserror::Error;

use crate::Reporter;
use crate::paths::Layout;

/// Errors raised while placing files.
#[derive(Error, Debug)]
pub enum InstallError {
    /// A directive names a file the archive does not contain.
    #[error("archive does not contain '{source_path}' (looked in {root})")]
    MissingSource {
        /// Source path from the directive.
        source_path: String,
        /// Content root that was searched.
        root: PathBuf,
    },

    /// A directive names something that is not a regular file.
    #[error("'{0}' in archive is not a regular file")]
    NotAFile(String),

    /// A directive cannot be mapped to a destination.
    #[error("invalid install directive: {0}")]
    InvalidDirective(String),

    /// The destination exists and does not belong to this package.
    #[error("{} already exists{}; use --force to overwrite", .path.display(), owner_suffix(.owner.as_deref()))]
    Conflict {
        /// Conflicting destination.
        path: PathBuf,
        /// Package that owns it, if pour installed it.
        owner: Option<String>,
    },

    /// A filesystem operation failed while staging or committing.
    #[error("failed to write {}: {source}", .path.display())]
    Io {
        /// Path being written.
        path: PathBuf,
        /// Underlying error.
        source: io::Error,
    },
}

fn owner_suffix(owner: Option<&str>) -> String {
    owner.map(|o| format!(" (owned by {o})")).unwrap_or_default()
}

fn io_err(path: &Path) -> impl FnOnce(io::Error) -> InstallError + '_ {
    move |source| InstallError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// A file placed by a successful install.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledFile {
    /// Absolute destination path.
    pub path: PathBuf,
    /// Directive target it came from.
    pub target: InstallTarget,
    /// Fingerprint of the installed content.
    pub blake3: Blake3Hash,
    /// File mode applied.
    pub mode: u32,
    /// Size in bytes.
    pub size: u64,
}

/// One resolved directive.
#[derive(Debug, Clone)]
pub struct PlannedFile {
    /// File inside the extracted archive.
    pub source: PathBuf,
    /// Absolute destination.
    pub dest: PathBuf,
    /// Directive target.
    pub target: InstallTarget,
    /// Whether `dest` exists and will be replaced.
    pub replaces: bool,
}

/// Fully resolved install, ready to commit.
#[derive(Debug, Clone)]
pub struct InstallPlan {
    /// Package being installed.
    pub name: PackageName,
    /// Version being installed.
    pub version: Version,
    /// Files in directive order.
    pub files: Vec<PlannedFile>,
}

/// Resolve every directive of `formula` against `content_root`.
///
/// `owner_of` reports which package (if any) pour recorded as owning a
/// destination path. Existing destinations owned by another package, or by
/// nobody, are conflicts unless `force` is set.
///
/// # Errors
///
/// Returns a layout error ([`InstallError::MissingSource`],
/// [`InstallError::NotAFile`]) or a [`InstallError::Conflict`]. Nothing on
/// disk is modified.
pub fn plan(
    formula: &Formula,
    content_root: &Path,
    layout: &Layout,
    owner_of: impl Fn(&Path) -> Option<String>,
    force: bool,
) -> Result<InstallPlan, InstallError> {
    let name = formula.name();
    let mut files = Vec::with_capacity(formula.install.len());

    for action in &formula.install {
        let source = content_root.join(&action.source);
        let meta = match fs::symlink_metadata(&source) {
            Ok(meta) => meta,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(InstallError::MissingSource {
                    source_path: action.source.clone(),
                    root: content_root.to_path_buf(),
                });
            }
            Err(e) => return Err(io_err(&source)(e)),
        };
        if !meta.is_file() {
            return Err(InstallError::NotAFile(action.source.clone()));
        }

        let dest = layout
            .destination(name, action)
            .ok_or_else(|| InstallError::InvalidDirective(action.source.clone()))?;

        if files.iter().any(|f: &PlannedFile| f.dest == dest) {
            return Err(InstallError::InvalidDirective(format!(
                "two directives install to {}",
                dest.display()
            )));
        }

        let replaces = fs::symlink_metadata(&dest).is_ok();
        if replaces {
            let owner = owner_of(&dest);
            if owner.as_deref() != Some(name.as_str()) && !force {
                return Err(InstallError::Conflict { path: dest, owner });
            }
        }

        files.push(PlannedFile {
            source,
            dest,
            target: action.target,
            replaces,
        });
    }

    Ok(InstallPlan {
        name: name.clone(),
        version: formula.version().clone(),
        files,
    })
}

struct Staged {
    temp: NamedTempFile,
    planned: PlannedFile,
    installed: InstalledFile,
}

#[derive(Debug)]
struct Committed {
    dest: PathBuf,
    backup: Option<PathBuf>,
}

impl InstallPlan {
    /// Stage and commit every planned file, all or nothing.
    ///
    /// # Errors
    ///
    /// Returns [`InstallError::Io`] if any copy or rename fails; every file
    /// already placed is removed and every replaced file restored first.
    pub fn commit<R: Reporter>(self, reporter: &R) -> Result<Vec<InstalledFile>, InstallError> {
        self.place(reporter).map(Placement::finish)
    }

    /// Stage and rename every planned file into place, keeping the replaced
    /// files as backups until the returned [`Placement`] is finished.
    ///
    /// Dropping the placement without calling [`Placement::finish`] undoes it.
    ///
    /// # Errors
    ///
    /// As for [`InstallPlan::commit`].
    pub fn place<R: Reporter>(self, reporter: &R) -> Result<Placement, InstallError> {
        let total = self.files.len();
        let mut staged = Vec::with_capacity(total);

        for (i, planned) in self.files.into_iter().enumerate() {
            reporter.installing(&self.name, &self.version, i + 1, total);
            staged.push(stage(planned)?);
        }

        let mut placement = Placement {
            name: self.name,
            version: self.version,
            files: Vec::with_capacity(total),
            committed: Vec::with_capacity(total),
        };

        for item in staged {
            let (done, file) = commit_one(item).inspect_err(|e| {
                tracing::warn!(error = %e, "install failed, rolling back");
            })?;
            placement.committed.push(done);
            placement.files.push(file);
        }

        Ok(placement)
    }
}

/// Files renamed into place whose replaced originals are still kept aside.
///
/// Rolls back on drop unless [`Placement::finish`] is called.
#[derive(Debug)]
#[must_use = "a placement is rolled back when dropped"]
pub struct Placement {
    name: PackageName,
    version: Version,
    files: Vec<InstalledFile>,
    committed: Vec<Committed>,
}

impl Placement {
    /// Files placed, in directive order.
    pub fn files(&self) -> &[InstalledFile] {
        &self.files
    }

    /// Keep the placed files and delete the backups.
    pub fn finish(mut self) -> Vec<InstalledFile> {
        for done in std::mem::take(&mut self.committed) {
            if let Some(backup) = done.backup {
                if let Err(e) = fs::remove_file(&backup) {
                    tracing::warn!(path = %backup.display(), error = %e, "could not remove backup");
                }
            }
        }
        tracing::info!(package = %self.name, version = %self.version, files = self.files.len(), "installed");
        std::mem::take(&mut self.files)
    }

    /// Remove the placed files and restore what they replaced.
    pub fn undo(mut self) {
        tracing::info!(package = %self.name, version = %self.version, "undoing placement");
        rollback(std::mem::take(&mut self.committed));
    }
}

impl Drop for Placement {
    fn drop(&mut self) {
        if !self.committed.is_empty() {
            rollback(std::mem::take(&mut self.committed));
        }
    }
}

fn stage(planned: PlannedFile) -> Result<Staged, InstallError> {
    let dir = planned
        .dest
        .parent()
        .ok_or_else(|| InstallError::InvalidDirective(planned.dest.display().to_string()))?;
    fs::create_dir_all(dir).map_err(io_err(dir))?;

    let mut temp = tempfile::Builder::new()
        .prefix(".pour-stage-")
        .tempfile_in(dir)
        .map_err(io_err(dir))?;

    let mut input = fs::File::open(&planned.source).map_err(io_err(&planned.source))?;
    let size = io::copy(&mut input, temp.as_file_mut()).map_err(io_err(temp.path()))?;
    temp.as_file().sync_all().map_err(io_err(temp.path()))?;

    let mode = planned.target.mode();
    set_mode(temp.path(), mode)?;

    let blake3 = Blake3Hash::compute_file(temp.path()).map_err(io_err(temp.path()))?;
    let installed = InstalledFile {
        path: planned.dest.clone(),
        target: planned.target,
        blake3,
        mode,
        size,
    };

    Ok(Staged {
        temp,
        planned,
        installed,
    })
}

fn commit_one(item: Staged) -> Result<(Committed, InstalledFile), InstallError> {
    let dest = item.planned.dest;
    let backup = if item.planned.replaces && fs::symlink_metadata(&dest).is_ok() {
        let backup = backup_path(&dest);
        fs::rename(&dest, &backup).map_err(io_err(&dest))?;
        Some(backup)
    } else {
        None
    };

    if let Err(e) = item.temp.persist(&dest) {
        if let Some(backup) = &backup {
            fs::rename(backup, &dest).ok();
        }
        return Err(io_err(&dest)(e.error));
    }

    Ok((Committed { dest, backup }, item.installed))
}

fn rollback(committed: Vec<Committed>) {
    for done in committed.into_iter().rev() {
        if let Err(e) = fs::remove_file(&done.dest) {
            tracing::warn!(path = %done.dest.display(), error = %e, "rollback: could not remove");
        }
        if let Some(backup) = done.backup {
            if let Err(e) = fs::rename(&backup, &done.dest) {
                tracing::warn!(path = %backup.display(), error = %e, "rollback: could not restore");
            }
        }
    }
}

fn backup_path(dest: &Path) -> PathBuf {
    let mut name = dest.file_name().unwrap_or_default().to_os_string();
    name.push(".pour-backup");
    dest.with_file_name(name)
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> Result<(), InstallError> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode)).map_err(io_err(path))
}

#[cfg(not(unix))]
fn set_mode(_path: &Path, _mode: u32) -> Result<(), InstallError> {
    Ok(())
}

/// Remove previously installed files. Already-missing files are not errors.
///
/// Returns the paths that could not be removed, with the reason.
pub fn remove_files<R: Reporter>(
    name: &PackageName,
    version: &Version,
    paths: &[PathBuf],
    reporter: &R,
) -> Vec<(PathBuf, io::Error)> {
    reporter.removing(name, version);
    let mut failures = Vec::new();
    for path in paths {
        match fs::remove_file(path) {
            Ok(()) => tracing::debug!(path = %path.display(), "removed"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "already gone");
            }
            Err(e) => failures.push((path.clone(), e)),
        }
    }
    failures
}

/// State of an installed file compared to what was recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileStatus {
    /// Present with the recorded mode and content.
    Ok,
    /// Not on disk.
    Missing,
    /// Mode differs from what was applied.
    ModeChanged {
        /// Recorded mode.
        expected: u32,
        /// Mode on disk.
        actual: u32,
    },
    /// Content differs from what was installed.
    Modified,
}

/// Compare an installed file on disk with its recorded mode and fingerprint.
///
/// # Errors
///
/// Returns an I/O error other than "not found" while reading the file.
pub fn inspect_file(path: &Path, mode: u32, blake3: &str) -> io::Result<FileStatus> {
    let meta = match fs::metadata(path) {
        Ok(meta) => meta,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(FileStatus::Missing),
        Err(e) => return Err(e),
    };

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let actual = meta.permissions().mode() & 0o7777;
        if actual != mode {
            return Ok(FileStatus::ModeChanged {
                expected: mode,
                actual,
            });
        }
    }
    #[cfg(not(unix))]
    let _ = (meta, mode);

    if Blake3Hash::compute_file(path)?.as_str() != blake3 {
        return Ok(FileStatus::Modified);
    }
    Ok(FileStatus::Ok)
}
