use std::path::{Path, PathBuf};

use dirs::home_dir;
use pour_schema::{InstallAction, PackageName};

/// Environment variable overriding the state directory.
pub const HOME_ENV: &str = "POUR_HOME";

/// Name of the config file inside the state directory.
pub const CONFIG_FILE: &str = "config.toml";

/// Environment variable overriding the install prefix.
pub const PREFIX_ENV: &str = "POUR_PREFIX";

/// Returns the state directory (`$POUR_HOME`, else `~/.pour`), or None if the
/// user's home cannot be resolved.
pub fn try_pour_home() -> Option<PathBuf> {
    if let Ok(val) = std::env::var(HOME_ENV) {
        if !val.is_empty() {
            return Some(PathBuf::from(val));
        }
    }
    home_dir().map(|h| h.join(".pour"))
}

/// Directory layout used by one pour invocation.
///
/// ```text
/// <home>/
/// ├── config.toml
/// ├── state.db
/// ├── cache/      # verified archives, keyed by sha256
/// └── tmp/        # extraction scratch space
/// <prefix>/
/// ├── bin/
/// └── share/man/man1/
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    home: PathBuf,
    prefix: PathBuf,
}

impl Layout {
    /// Build a layout from explicit directories.
    pub fn new(home: impl Into<PathBuf>, prefix: impl Into<PathBuf>) -> Self {
        Self {
            home: home.into(),
            prefix: prefix.into(),
        }
    }

    /// State directory.
    pub fn home(&self) -> &Path {
        &self.home
    }

    /// Root that install targets resolve under.
    pub fn prefix(&self) -> &Path {
        &self.prefix
    }

    /// `SQLite` database path: <home>/state.db
    pub fn db_path(&self) -> PathBuf {
        self.home.join("state.db")
    }

    /// Archive cache: <home>/cache
    pub fn cache_dir(&self) -> PathBuf {
        self.home.join("cache")
    }

    /// Scratch space: <home>/tmp
    pub fn tmp_dir(&self) -> PathBuf {
        self.home.join("tmp")
    }

    /// Binary installation target: <prefix>/bin
    pub fn bin_dir(&self) -> PathBuf {
        self.prefix.join("bin")
    }

    /// Manual page directory for a section: <prefix>/share/man/man<N>
    pub fn man_dir(&self, section: u8) -> PathBuf {
        self.prefix.join(format!("share/man/man{section}"))
    }

    /// Absolute destination of an install directive.
    pub fn destination(&self, package: &PackageName, action: &InstallAction) -> Option<PathBuf> {
        action.destination(package).map(|rel| self.prefix.join(rel))
    }

    /// Cache file for an archive with the given digest and file name.
    pub fn cached_archive(&self, sha256: &str, file_name: &str) -> PathBuf {
        let file_name = if file_name.is_empty() { "archive" } else { file_name };
        self.cache_dir().join(format!("{sha256}-{file_name}"))
    }

    /// Create the state directories if missing.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error if a directory cannot be created.
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(self.cache_dir())?;
        std::fs::create_dir_all(self.tmp_dir())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pour_schema::InstallTarget;

    #[test]
    fn layout_paths() {
        let layout = Layout::new("/h", "/p");
        assert_eq!(layout.db_path(), PathBuf::from("/h/state.db"));
        assert_eq!(layout.bin_dir(), PathBuf::from("/p/bin"));
        assert_eq!(layout.man_dir(1), PathBuf::from("/p/share/man/man1"));

        let pkg = PackageName::new("git-absorb");
        let man = InstallAction::new("man/git-absorb.1", InstallTarget::Man(1));
        assert_eq!(
            layout.destination(&pkg, &man).unwrap(),
            layout.man_dir(1).join("git-absorb.1")
        );
        assert_eq!(
            layout.cached_archive("abc", "v0.2.0.tar.gz"),
            PathBuf::from("/h/cache/abc-v0.2.0.tar.gz")
        );
    }
}
