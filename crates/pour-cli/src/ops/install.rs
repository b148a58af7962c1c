//! Formula installation.
//!
//! One formula goes through: dependency probe, fetch + verify, extract,
//! plan, commit, record. Every step before commit is side-effect free with
//! respect to the install prefix, so an integrity, fetch, or layout failure
//! never places a file.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use pour_core::Reporter;
use pour_core::install::{self, InstallPlan, InstalledFile};
use pour_core::io::extract::ExtractedFile;
use pour_core::io::{download, extract};
use pour_schema::Formula;

use crate::ops::{Context, OpError};

/// Flags accepted by `pour install`.
#[derive(Debug, Clone, Copy, Default)]
pub struct InstallOptions {
    /// Overwrite destinations not owned by this package.
    pub force: bool,
    /// Install even if runtime dependencies are missing.
    pub ignore_dependencies: bool,
    /// Fetch, verify and plan, but place nothing.
    pub dry_run: bool,
}

/// What an install did.
#[derive(Debug)]
pub enum InstallOutcome {
    /// Files were placed and recorded.
    Installed {
        files: Vec<InstalledFile>,
        /// Version that was replaced, if the package was already installed.
        previous: Option<String>,
    },
    /// Dry run: what would have been placed.
    Planned(InstallPlan),
}

/// Install a single formula.
pub async fn install_formula<R: Reporter>(
    ctx: &mut Context<R>,
    formula: &Formula,
    opts: InstallOptions,
) -> Result<InstallOutcome, OpError> {
    formula.ensure_valid()?;
    let name = formula.name();
    let version = formula.version();

    let missing = ctx.probe.missing(formula, |dep| {
        matches!(ctx.db.get_package(dep.as_str()), Ok(Some(_)))
    });
    if !missing.is_empty() {
        let missing = missing
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        if !opts.ignore_dependencies {
            return Err(OpError::MissingDependencies {
                name: name.to_string(),
                missing,
            });
        }
        ctx.reporter
            .warning(&format!("{name}: ignoring missing dependencies: {missing}"));
    }

    ctx.layout.ensure_dirs()?;
    let archive = download::fetch_archive(&ctx.client, formula, &ctx.layout, &ctx.reporter).await?;

    ctx.reporter.extracting(name, version);
    let scratch = tempfile::Builder::new()
        .prefix(&format!("{name}-"))
        .tempdir_in(ctx.layout.tmp_dir())?;
    let extracted = extract::extract(
        &archive,
        formula.archive_format(),
        scratch.path(),
        formula.archive_file_name(),
    )?;
    let root = extract::content_root(scratch.path())?;
    tracing::debug!(root = %root.display(), "resolved content root");

    let db = &ctx.db;
    let owner_of = |path: &Path| match db.find_file_owner(&path.to_string_lossy()) {
        Ok(owner) => owner,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "owner lookup failed");
            None
        }
    };
    let plan = install::plan(formula, &root, &ctx.layout, owner_of, opts.force)?;

    for source in unexecutable_sources(&plan, &extracted) {
        ctx.reporter.warning(&format!(
            "{name}: {} is not executable in the archive; installing it executable anyway",
            source.strip_prefix(&root).unwrap_or(source).display()
        ));
    }

    if opts.dry_run {
        return Ok(InstallOutcome::Planned(plan));
    }

    let previous = ctx.db.get_package(name.as_str())?;
    let previous_files = match &previous {
        Some(_) => ctx.db.get_package_files(name.as_str())?,
        None => Vec::new(),
    };

    // Files stay provisional until the record is written.
    let placement = plan.place(&ctx.reporter)?;
    if let Err(e) = ctx.db.install_package(
        name.as_str(),
        version.as_str(),
        formula.source.sha256.as_str(),
        placement.files(),
    ) {
        placement.undo();
        return Err(e.into());
    }
    let files = placement.finish();

    let previous_version = previous.map(|p| p.version);
    if let Err(e) = ctx.db.add_history(
        name.as_str(),
        "install",
        previous_version.as_deref(),
        Some(version.as_str()),
    ) {
        tracing::warn!(package = %name, error = %e, "could not record history");
    }

    // Files the old version placed that the new one no longer does.
    let placed: HashSet<String> = files
        .iter()
        .map(|f| f.path.to_string_lossy().into_owned())
        .collect();
    let stale: Vec<PathBuf> = previous_files
        .into_iter()
        .filter(|f| !placed.contains(&f.path))
        .map(|f| PathBuf::from(f.path))
        .collect();
    if !stale.is_empty() {
        for (path, e) in install::remove_files(name, version, &stale, &ctx.reporter) {
            ctx.reporter
                .warning(&format!("could not remove stale {}: {e}", path.display()));
        }
    }

    let size: u64 = files.iter().map(|f| f.size).sum();
    ctx.reporter.done(name, version, "installed", Some(size));

    Ok(InstallOutcome::Installed {
        files,
        previous: previous_version,
    })
}

/// Sources bound for an executable target that the archive did not mark executable.
fn unexecutable_sources<'a>(plan: &'a InstallPlan, extracted: &[ExtractedFile]) -> Vec<&'a Path> {
    plan.files
        .iter()
        .filter(|f| f.target.is_executable())
        .filter(|f| {
            extracted
                .iter()
                .any(|e| e.absolute_path == f.source && !e.is_executable)
        })
        .map(|f| f.source.as_path())
        .collect()
}
