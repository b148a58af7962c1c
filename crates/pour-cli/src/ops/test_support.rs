//! Fixtures shared by operation tests.

use std::path::Path;

use flate2::Compression;
use flate2::write::GzEncoder;
use pour_core::deps::DependencyProbe;
use pour_core::{Layout, NullReporter};
use pour_schema::{Formula, Sha256Digest};
use tempfile::TempDir;

use crate::ops::Context;
use crate::store::StateDb;

/// Build a `.tar.gz` with the given `(path, mode, contents)` entries.
pub(crate) fn tar_gz(entries: &[(&str, u32, &[u8])]) -> Vec<u8> {
    let encoder = GzEncoder::new(Vec::new(), Compression::default());
    let mut builder = tar::Builder::new(encoder);
    for (path, mode, data) in entries {
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(*mode);
        header.set_cksum();
        builder.append_data(&mut header, path, *data).unwrap();
    }
    builder.into_inner().unwrap().finish().unwrap()
}

/// GitHub-style release archive with a binary and a man page.
pub(crate) fn git_absorb_archive() -> Vec<u8> {
    tar_gz(&[
        (
            "git-absorb-0.2.0/bin/git-absorb",
            0o755,
            b"#!/bin/bash\necho absorb\n",
        ),
        (
            "git-absorb-0.2.0/man/git-absorb.1",
            0o644,
            b".TH GIT-ABSORB 1\n",
        ),
        ("git-absorb-0.2.0/README.md", 0o644, b"# git-absorb\n"),
    ])
}

/// A throwaway home, prefix and state database.
pub(crate) struct Sandbox {
    pub(crate) dir: TempDir,
    pub(crate) ctx: Context<NullReporter>,
}

impl Sandbox {
    pub(crate) fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let layout = Layout::new(dir.path().join("home"), dir.path().join("prefix"));
        let db = StateDb::open(&layout).unwrap();
        let mut ctx = Context::new(db, layout, reqwest::Client::new(), NullReporter);

        // A private search path that only provides `bash`.
        let path_dir = dir.path().join("path");
        std::fs::create_dir_all(&path_dir).unwrap();
        write_executable(&path_dir.join("bash"));
        ctx.probe = DependencyProbe::with_search_path(&path_dir);

        Self { dir, ctx }
    }

    /// Write `archive` to disk and return a formula pointing at it.
    pub(crate) fn formula_for(&self, version: &str, archive: &[u8]) -> Formula {
        let dir = self.dir.path().join("archives");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(format!("git-absorb-{version}.tar.gz"));
        std::fs::write(&path, archive).unwrap();

        Formula::parse(&format!(
            r#"
[package]
name = "git-absorb"
version = "{version}"
description = "Combine multiple repositories into one"
homepage = "https://github.com/MrFlynn/git-absorb"

[source]
url = "file://{}"
sha256 = "{}"

[dependencies]
runtime = ["bash"]

[[install]]
source = "bin/git-absorb"
target = "bin"

[[install]]
source = "man/git-absorb.1"
target = "man1"
"#,
            path.display(),
            Sha256Digest::compute(archive)
        ))
        .unwrap()
    }
}

fn write_executable(path: &Path) {
    std::fs::write(path, "#!/bin/sh\n").unwrap();
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).unwrap();
    }
}
