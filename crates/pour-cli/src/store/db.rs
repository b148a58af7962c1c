//! SQLite state database
//!
//! Tracks installed packages, the files each one placed, and an append-only
//! log of install/remove events.

use std::path::Path;

use pour_core::Layout;
use pour_core::install::InstalledFile;
use rusqlite::{Connection, OptionalExtension, params};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("failed to create {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("Package not found: {0}")]
    PackageNotFound(String),
}

/// Installed package record
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct Package {
    pub name: String,
    pub version: String,
    /// Digest of the archive the package was installed from
    pub sha256: String,
    pub size_bytes: u64,
    /// Unix seconds
    pub installed_at: i64,
}

/// Installed file record
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct FileRecord {
    pub path: String,
    pub package: String,
    pub target: String,
    pub blake3: String,
    pub mode: u32,
    pub size: u64,
}

/// One install or remove event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEvent {
    pub package: String,
    pub action: String,
    pub version_from: Option<String>,
    pub version_to: Option<String>,
    /// Unix milliseconds
    pub timestamp: i64,
}

/// State database for tracking installations
#[derive(Debug)]
pub struct StateDb {
    conn: Connection,
}

impl StateDb {
    /// Open or create the state database for a layout
    pub fn open(layout: &Layout) -> Result<Self, DbError> {
        std::fs::create_dir_all(layout.home()).map_err(|source| DbError::Io {
            path: layout.home().display().to_string(),
            source,
        })?;
        Self::open_at(&layout.db_path())
    }

    /// Open database at a specific path (for testing)
    pub fn open_at(path: &Path) -> Result<Self, DbError> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;

        let db = Self { conn };
        db.init_schema()?;
        Ok(db)
    }

    fn init_schema(&self) -> Result<(), DbError> {
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS packages (
                name TEXT PRIMARY KEY,
                version TEXT NOT NULL,
                sha256 TEXT NOT NULL,
                size_bytes INTEGER NOT NULL DEFAULT 0,
                installed_at INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS files (
                path TEXT PRIMARY KEY,
                package TEXT NOT NULL REFERENCES packages(name) ON DELETE CASCADE,
                target TEXT NOT NULL,
                blake3 TEXT NOT NULL,
                mode INTEGER NOT NULL,
                size INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_files_package ON files(package);

            CREATE TABLE IF NOT EXISTS history (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                package TEXT NOT NULL,
                action TEXT NOT NULL,
                version_from TEXT,
                version_to TEXT,
                timestamp INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_history_package ON history(package);
            ",
        )?;
        Ok(())
    }

    /// Record a package installation, replacing any previous record of the
    /// package and its files in one transaction.
    pub fn install_package(
        &mut self,
        name: &str,
        version: &str,
        sha256: &str,
        files: &[InstalledFile],
    ) -> Result<(), DbError> {
        let size: u64 = files.iter().map(|f| f.size).sum();
        let now = chrono::Utc::now().timestamp();

        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM files WHERE package = ?1", params![name])?;
        tx.execute(
            "INSERT OR REPLACE INTO packages (name, version, sha256, size_bytes, installed_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![name, version, sha256, size as i64, now],
        )?;
        {
            let mut stmt = tx.prepare(
                "INSERT OR REPLACE INTO files (path, package, target, blake3, mode, size)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?;
            for file in files {
                stmt.execute(params![
                    file.path.to_string_lossy(),
                    name,
                    file.target.to_string(),
                    file.blake3.as_str(),
                    file.mode,
                    file.size as i64,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Remove a package and its files, returning the file paths it owned
    pub fn remove_package(&mut self, name: &str) -> Result<Vec<String>, DbError> {
        let files = self.get_package_files(name)?;

        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM files WHERE package = ?1", params![name])?;
        let deleted = tx.execute("DELETE FROM packages WHERE name = ?1", params![name])?;
        if deleted == 0 {
            return Err(DbError::PackageNotFound(name.to_string()));
        }
        tx.commit()?;

        Ok(files.into_iter().map(|f| f.path).collect())
    }

    /// Get a package by name
    pub fn get_package(&self, name: &str) -> Result<Option<Package>, DbError> {
        self.conn
            .query_row(
                "SELECT name, version, sha256, size_bytes, installed_at
                 FROM packages WHERE name = ?1",
                params![name],
                row_to_package,
            )
            .optional()
            .map_err(Into::into)
    }

    /// List all installed packages
    pub fn list_packages(&self) -> Result<Vec<Package>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT name, version, sha256, size_bytes, installed_at
             FROM packages ORDER BY name",
        )?;
        let packages = stmt.query_map([], row_to_package)?;
        packages.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Get all files for a package, in path order
    pub fn get_package_files(&self, package: &str) -> Result<Vec<FileRecord>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT path, package, target, blake3, mode, size
             FROM files WHERE package = ?1 ORDER BY path",
        )?;

        let files = stmt.query_map(params![package], |row| {
            Ok(FileRecord {
                path: row.get(0)?,
                package: row.get(1)?,
                target: row.get(2)?,
                blake3: row.get(3)?,
                mode: row.get(4)?,
                size: row.get::<_, i64>(5)? as u64,
            })
        })?;

        files.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Find which package owns a file
    pub fn find_file_owner(&self, path: &str) -> Result<Option<String>, DbError> {
        self.conn
            .query_row(
                "SELECT package FROM files WHERE path = ?1",
                params![path],
                |row| row.get(0),
            )
            .optional()
            .map_err(Into::into)
    }

    /// Append an event to the history log
    pub fn add_history(
        &self,
        package: &str,
        action: &str,
        version_from: Option<&str>,
        version_to: Option<&str>,
    ) -> Result<(), DbError> {
        self.conn.execute(
            "INSERT INTO history (package, action, version_from, version_to, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                package,
                action,
                version_from,
                version_to,
                chrono::Utc::now().timestamp_millis()
            ],
        )?;
        Ok(())
    }

    /// Events recorded for a package, oldest first
    pub fn history(&self, package: &str) -> Result<Vec<HistoryEvent>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT package, action, version_from, version_to, timestamp
             FROM history WHERE package = ?1 ORDER BY id",
        )?;

        let events = stmt.query_map(params![package], |row| {
            Ok(HistoryEvent {
                package: row.get(0)?,
                action: row.get(1)?,
                version_from: row.get(2)?,
                version_to: row.get(3)?,
                timestamp: row.get(4)?,
            })
        })?;

        events.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }
}

fn row_to_package(row: &rusqlite::Row<'_>) -> rusqlite::Result<Package> {
    Ok(Package {
        name: row.get(0)?,
        version: row.get(1)?,
        sha256: row.get(2)?,
        size_bytes: row.get::<_, i64>(3)? as u64,
        installed_at: row.get(4)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pour_schema::{Blake3Hash, InstallTarget};
    use std::path::PathBuf;
    use tempfile::tempdir;

    fn file(path: &str, target: InstallTarget) -> InstalledFile {
        InstalledFile {
            path: PathBuf::from(path),
            target,
            blake3: Blake3Hash::compute(path.as_bytes()),
            mode: target.mode(),
            size: 10,
        }
    }

    #[test]
    fn test_install_and_list() {
        let dir = tempdir().unwrap();
        let mut db = StateDb::open_at(&dir.path().join("state.db")).unwrap();

        db.install_package("git-absorb", "0.2.0", "abc", &[]).unwrap();
        db.install_package("bash", "5.2", "def", &[]).unwrap();

        let packages = db.list_packages().unwrap();
        assert_eq!(packages.len(), 2);
        assert_eq!(packages[0].name, "bash");
        assert_eq!(packages[1].name, "git-absorb");
    }

    #[test]
    fn test_file_tracking() {
        let dir = tempdir().unwrap();
        let mut db = StateDb::open_at(&dir.path().join("state.db")).unwrap();

        db.install_package(
            "git-absorb",
            "0.2.0",
            "abc",
            &[
                file("/p/bin/git-absorb", InstallTarget::Bin),
                file("/p/share/man/man1/git-absorb.1", InstallTarget::Man(1)),
            ],
        )
        .unwrap();

        assert_eq!(
            db.find_file_owner("/p/bin/git-absorb").unwrap(),
            Some("git-absorb".to_string())
        );
        assert_eq!(db.find_file_owner("/p/bin/other").unwrap(), None);

        let files = db.get_package_files("git-absorb").unwrap();
        assert_eq!(files.len(), 2);
        assert_eq!(files[0].mode, 0o755);
        assert_eq!(files[1].target, "man1");
        assert_eq!(db.get_package("git-absorb").unwrap().unwrap().size_bytes, 20);
    }

    #[test]
    fn test_reinstall_replaces_file_set() {
        let dir = tempdir().unwrap();
        let mut db = StateDb::open_at(&dir.path().join("state.db")).unwrap();

        db.install_package(
            "git-absorb",
            "0.2.0",
            "abc",
            &[file("/p/bin/old", InstallTarget::Bin)],
        )
        .unwrap();
        db.install_package(
            "git-absorb",
            "0.2.1",
            "def",
            &[file("/p/bin/git-absorb", InstallTarget::Bin)],
        )
        .unwrap();

        let files = db.get_package_files("git-absorb").unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].path, "/p/bin/git-absorb");
        assert_eq!(db.get_package("git-absorb").unwrap().unwrap().version, "0.2.1");
    }

    #[test]
    fn test_remove_package() {
        let dir = tempdir().unwrap();
        let mut db = StateDb::open_at(&dir.path().join("state.db")).unwrap();

        db.install_package(
            "git-absorb",
            "0.2.0",
            "abc",
            &[file("/p/bin/git-absorb", InstallTarget::Bin)],
        )
        .unwrap();

        let files = db.remove_package("git-absorb").unwrap();
        assert_eq!(files, vec!["/p/bin/git-absorb"]);
        assert!(db.get_package("git-absorb").unwrap().is_none());
        assert!(matches!(
            db.remove_package("git-absorb"),
            Err(DbError::PackageNotFound(_))
        ));
    }

    #[test]
    fn test_history_log() {
        let dir = tempdir().unwrap();
        let db = StateDb::open_at(&dir.path().join("state.db")).unwrap();

        db.add_history("git-absorb", "install", None, Some("0.2.0")).unwrap();
        db.add_history("git-absorb", "install", Some("0.2.0"), Some("0.2.1")).unwrap();
        db.add_history("git-absorb", "remove", Some("0.2.1"), None).unwrap();

        let events = db.history("git-absorb").unwrap();
        assert_eq!(events.len(), 3);
        assert_eq!(events[1].version_from.as_deref(), Some("0.2.0"));
        assert_eq!(events[2].action, "remove");
        assert!(db.history("bash").unwrap().is_empty());
    }
}
