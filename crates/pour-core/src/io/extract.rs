//! Archive extraction module
//!
//! Handles tar.gz, tar.zst, tar, zip and bare-file artifacts.

use std::fs::{self, File};
use std::io::{self, BufReader, Read};
use std::path::{Component, Path, PathBuf};

use pour_schema::ArtifactFormat;
use thiserror::Error;
use zip::ZipArchive;
use zstd::stream::Decoder as ZstdDecoder;

/// Errors raised while unpacking an archive.
#[derive(Error, Debug)]
pub enum ExtractError {
    /// Filesystem failure.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// The archive is corrupt or contains unsafe entries.
    #[error("Archive error: {0}")]
    Archive(String),
}

/// Information about an extracted file
#[derive(Debug, Clone)]
pub struct ExtractedFile {
    /// Path relative to extraction root
    pub relative_path: PathBuf,
    /// Absolute path on disk
    pub absolute_path: PathBuf,
    /// Whether this is an executable
    pub is_executable: bool,
}

/// Extract an archive of the given format into `dest_dir`.
///
/// For [`ArtifactFormat::Binary`] the file itself is copied into `dest_dir`
/// under `file_name`.
///
/// # Errors
///
/// Returns [`ExtractError`] on I/O failure, a corrupt archive, or an entry
/// that would land outside `dest_dir`.
pub fn extract(
    archive_path: &Path,
    format: ArtifactFormat,
    dest_dir: &Path,
    file_name: &str,
) -> Result<Vec<ExtractedFile>, ExtractError> {
    tracing::debug!(archive = %archive_path.display(), %format, "extracting");
    match format {
        ArtifactFormat::TarZst => {
            let reader = BufReader::new(File::open(archive_path)?);
            extract_tar(ZstdDecoder::new(reader)?, dest_dir)
        }
        ArtifactFormat::TarGz => {
            let reader = BufReader::new(File::open(archive_path)?);
            extract_tar(flate2::read::GzDecoder::new(reader), dest_dir)
        }
        ArtifactFormat::Tar => extract_tar(BufReader::new(File::open(archive_path)?), dest_dir),
        ArtifactFormat::Zip => extract_zip(archive_path, dest_dir),
        ArtifactFormat::Binary => {
            fs::create_dir_all(dest_dir)?;
            let relative_path = PathBuf::from(file_name);
            if !is_safe_relative(&relative_path) || relative_path.components().count() != 1 {
                return Err(ExtractError::Archive(format!(
                    "Invalid file name: {file_name}"
                )));
            }
            let absolute_path = dest_dir.join(&relative_path);
            fs::copy(archive_path, &absolute_path)?;

            Ok(vec![ExtractedFile {
                relative_path,
                absolute_path,
                is_executable: true,
            }])
        }
    }
}

/// Extract a tar archive from a reader.
///
/// Only directories and regular files are unpacked. Links and special files
/// are skipped, so no later entry can be routed through them.
fn extract_tar<R: Read>(reader: R, dest_dir: &Path) -> Result<Vec<ExtractedFile>, ExtractError> {
    fs::create_dir_all(dest_dir)?;

    let mut archive = tar::Archive::new(reader);
    let mut extracted_files = Vec::new();

    for entry in archive.entries()? {
        let mut entry = entry?;
        let relative_path = entry.path()?.into_owned();

        if !is_safe_relative(&relative_path) {
            return Err(ExtractError::Archive(format!(
                "Invalid path in archive: {}",
                relative_path.display()
            )));
        }

        let entry_type = entry.header().entry_type();
        if !entry_type.is_dir() && !entry_type.is_file() {
            tracing::debug!(path = %relative_path.display(), ?entry_type, "skipping non-regular entry");
            continue;
        }

        // unpack_in refuses anything resolving outside dest_dir
        if !entry.unpack_in(dest_dir)? {
            return Err(ExtractError::Archive(format!(
                "Entry escapes extraction directory: {}",
                relative_path.display()
            )));
        }
        if entry_type.is_dir() {
            continue;
        }

        let is_executable = entry
            .header()
            .mode()
            .map(|m| m & 0o111 != 0)
            .unwrap_or(false);

        extracted_files.push(ExtractedFile {
            absolute_path: dest_dir.join(&relative_path),
            relative_path,
            is_executable,
        });
    }

    Ok(extracted_files)
}

/// Extract a zip archive
fn extract_zip(archive_path: &Path, dest_dir: &Path) -> Result<Vec<ExtractedFile>, ExtractError> {
    let file = File::open(archive_path)?;
    let mut archive = ZipArchive::new(file).map_err(|e| ExtractError::Archive(e.to_string()))?;

    fs::create_dir_all(dest_dir)?;
    let mut extracted_files = Vec::new();

    for i in 0..archive.len() {
        let mut file = archive
            .by_index(i)
            .map_err(|e| ExtractError::Archive(e.to_string()))?;
        let Some(relative_path) = file.enclosed_name() else {
            return Err(ExtractError::Archive(format!(
                "Invalid path in archive: {}",
                file.name()
            )));
        };

        if file.is_dir() {
            fs::create_dir_all(dest_dir.join(&relative_path))?;
            continue;
        }
        if file.is_symlink() {
            tracing::debug!(path = %relative_path.display(), "skipping symlink entry");
            continue;
        }

        let absolute_path = dest_dir.join(&relative_path);
        if let Some(p) = absolute_path.parent() {
            fs::create_dir_all(p)?;
        }

        let mut outfile = File::create(&absolute_path)?;
        io::copy(&mut file, &mut outfile)?;

        #[cfg(unix)]
        let is_executable = if let Some(mode) = file.unix_mode() {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&absolute_path, fs::Permissions::from_mode(mode & 0o7777))?;
            mode & 0o111 != 0
        } else {
            false
        };
        #[cfg(not(unix))]
        let is_executable = false;

        extracted_files.push(ExtractedFile {
            relative_path,
            absolute_path,
            is_executable,
        });
    }

    Ok(extracted_files)
}

/// Directory that install directives resolve against.
///
/// Release archives usually wrap everything in one top-level directory
/// (`git-absorb-0.2.0/`). If `dir` holds exactly one non-hidden entry and it
/// is a directory, that directory is the content root; otherwise `dir` is.
///
/// # Errors
///
/// Returns the I/O error if `dir` cannot be listed.
pub fn content_root(dir: &Path) -> io::Result<PathBuf> {
    let mut entries: Vec<_> = fs::read_dir(dir)?.filter_map(Result::ok).collect();

    // Filter out hidden files (like .DS_Store)
    entries.retain(|e| !e.file_name().to_string_lossy().starts_with('.'));

    if entries.len() == 1 && entries[0].file_type()?.is_dir() {
        return Ok(entries[0].path());
    }
    Ok(dir.to_path_buf())
}

fn is_safe_relative(path: &Path) -> bool {
    path.components().count() > 0
        && path
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use std::io::Write;
    use tempfile::tempdir;

    const RELEASE: &[(&str, u32, &[u8])] = &[
        ("git-absorb-0.2.0/bin/git-absorb", 0o755, b"#!/bin/bash\n"),
        ("git-absorb-0.2.0/man/git-absorb.1", 0o644, b".TH GIT-ABSORB 1\n"),
    ];

    /// Build an uncompressed tar with the given `(path, mode, contents)` entries.
    fn plain_tar(entries: &[(&str, u32, &[u8])]) -> Vec<u8> {
        let mut builder = tar::Builder::new(Vec::new());
        for (path, mode, data) in entries {
            let mut header = tar::Header::new_gnu();
            header.set_size(data.len() as u64);
            header.set_mode(*mode);
            header.set_cksum();
            builder.append_data(&mut header, path, *data).unwrap();
        }
        builder.into_inner().unwrap()
    }

    /// Build a `.tar.gz` with the given `(path, mode, contents)` entries.
    pub(crate) fn tar_gz(entries: &[(&str, u32, &[u8])]) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&plain_tar(entries)).unwrap();
        encoder.finish().unwrap()
    }

    fn assert_release_extracted(files: &[ExtractedFile], dest: &Path) {
        assert_eq!(files.len(), 2);
        assert!(files[0].is_executable);
        assert!(!files[1].is_executable);
        let root = content_root(dest).unwrap();
        assert_eq!(root, dest.join("git-absorb-0.2.0"));
        assert_eq!(fs::read(root.join("bin/git-absorb")).unwrap(), b"#!/bin/bash\n");
        assert!(root.join("man/git-absorb.1").is_file());
    }

    #[test]
    fn test_extract_plain_tar() {
        let dir = tempdir().unwrap();
        let archive = dir.path().join("release.tar");
        fs::write(&archive, plain_tar(RELEASE)).unwrap();

        let dest = dir.path().join("out");
        let files = extract(&archive, ArtifactFormat::Tar, &dest, "release.tar").unwrap();
        assert_release_extracted(&files, &dest);
    }

    #[test]
    fn test_extract_tar_zst() {
        let dir = tempdir().unwrap();
        let archive = dir.path().join("release.tar.zst");
        fs::write(&archive, zstd::stream::encode_all(&plain_tar(RELEASE)[..], 0).unwrap()).unwrap();

        let dest = dir.path().join("out");
        let files = extract(&archive, ArtifactFormat::TarZst, &dest, "release.tar.zst").unwrap();
        assert_release_extracted(&files, &dest);
    }

    #[test]
    fn test_extract_zip_keeps_executable_bit() {
        let dir = tempdir().unwrap();
        let archive = dir.path().join("release.zip");
        let mut writer = zip::ZipWriter::new(File::create(&archive).unwrap());
        for (path, mode, data) in RELEASE {
            let options = zip::write::SimpleFileOptions::default().unix_permissions(*mode);
            writer.start_file(*path, options).unwrap();
            writer.write_all(data).unwrap();
        }
        writer
            .add_symlink(
                "git-absorb-0.2.0/link",
                "/etc/passwd",
                zip::write::SimpleFileOptions::default(),
            )
            .unwrap();
        writer.finish().unwrap();

        let dest = dir.path().join("out");
        let files = extract(&archive, ArtifactFormat::Zip, &dest, "release.zip").unwrap();
        assert_release_extracted(&files, &dest);
        assert!(fs::symlink_metadata(dest.join("git-absorb-0.2.0/link")).is_err());

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = |p: &str| fs::metadata(dest.join(p)).unwrap().permissions().mode() & 0o777;
            assert_eq!(mode("git-absorb-0.2.0/bin/git-absorb"), 0o755);
            assert_eq!(mode("git-absorb-0.2.0/man/git-absorb.1"), 0o644);
        }
    }

    #[test]
    fn test_links_cannot_route_entries_outside() {
        let dir = tempdir().unwrap();
        let outside = dir.path().join("outside");
        fs::create_dir(&outside).unwrap();

        let mut builder = tar::Builder::new(Vec::new());
        let mut link = tar::Header::new_gnu();
        link.set_entry_type(tar::EntryType::Symlink);
        link.set_size(0);
        link.set_mode(0o777);
        builder.append_link(&mut link, "pkg/link", &outside).unwrap();

        let mut hard = tar::Header::new_gnu();
        hard.set_entry_type(tar::EntryType::Link);
        hard.set_size(0);
        hard.set_mode(0o644);
        builder.append_link(&mut hard, "pkg/hard", "/etc/passwd").unwrap();

        let mut file = tar::Header::new_gnu();
        file.set_size(5);
        file.set_mode(0o644);
        file.set_cksum();
        builder.append_data(&mut file, "pkg/link/pwned", &b"owned"[..]).unwrap();
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&builder.into_inner().unwrap()).unwrap();

        let archive = dir.path().join("evil.tar.gz");
        fs::write(&archive, encoder.finish().unwrap()).unwrap();

        let dest = dir.path().join("scratch");
        let files = extract(&archive, ArtifactFormat::TarGz, &dest, "evil.tar.gz").unwrap();

        assert!(!outside.join("pwned").exists());
        assert!(fs::symlink_metadata(dest.join("pkg/hard")).is_err());
        assert_eq!(files.len(), 1);
        assert!(dest.join("pkg/link/pwned").is_file());
        assert!(!fs::symlink_metadata(dest.join("pkg/link")).unwrap().file_type().is_symlink());
    }

    #[test]
    fn test_extract_tar_gz_and_find_root() {
        let dir = tempdir().unwrap();
        let archive = dir.path().join("v0.2.0.tar.gz");
        fs::write(&archive, tar_gz(RELEASE)).unwrap();

        let dest = dir.path().join("out");
        let files = extract(&archive, ArtifactFormat::TarGz, &dest, "v0.2.0.tar.gz").unwrap();
        assert_release_extracted(&files, &dest);
    }

    #[test]
    fn test_rejects_path_traversal() {
        // tar::Builder refuses `..` itself, so write the name into the header directly.
        let encoder = GzEncoder::new(Vec::new(), Compression::default());
        let mut builder = tar::Builder::new(encoder);
        let mut header = tar::Header::new_old();
        header.as_old_mut().name[..9].copy_from_slice(b"../escape");
        header.set_size(1);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append(&header, &b"x"[..]).unwrap();
        let bytes = builder.into_inner().unwrap().finish().unwrap();

        let dir = tempdir().unwrap();
        let archive = dir.path().join("evil.tar.gz");
        fs::write(&archive, bytes).unwrap();

        let err = extract(&archive, ArtifactFormat::TarGz, &dir.path().join("out"), "x")
            .unwrap_err();
        assert!(matches!(err, ExtractError::Archive(_)));
        assert!(!dir.path().join("escape").exists());
    }

    #[test]
    fn test_extract_raw_binary() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("download");
        fs::write(&src, b"binary content").unwrap();

        let dest = dir.path().join("extracted");
        let files = extract(&src, ArtifactFormat::Binary, &dest, "git-absorb").unwrap();

        assert_eq!(files.len(), 1);
        assert_eq!(files[0].relative_path, PathBuf::from("git-absorb"));
        assert!(files[0].absolute_path.exists());
        assert_eq!(content_root(&dest).unwrap(), dest);
    }

    #[test]
    fn test_corrupt_archive_is_an_error() {
        let dir = tempdir().unwrap();
        let archive = dir.path().join("bad.zip");
        fs::write(&archive, b"definitely not a zip").unwrap();
        assert!(extract(&archive, ArtifactFormat::Zip, &dir.path().join("out"), "bad.zip").is_err());
    }

    #[test]
    fn test_content_root_ignores_hidden_files() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("nested");
        fs::create_dir(&nested).unwrap();
        fs::write(nested.join("file.txt"), "content").unwrap();
        fs::write(dir.path().join(".DS_Store"), "junk").unwrap();

        assert_eq!(content_root(dir.path()).unwrap(), nested);

        fs::write(dir.path().join("README"), "two entries now").unwrap();
        assert_eq!(content_root(dir.path()).unwrap(), dir.path());
    }
}
