//! Async download and verification.
//!
//! Handles archive downloads with streaming SHA256 verification. Nothing is
//! left at the destination unless the content matched the expected digest.

use std::path::{Path, PathBuf};

use futures::StreamExt;
use pour_schema::{Formula, PackageName, Sha256Digest, Version};
use reqwest::Client;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::Reporter;
use crate::paths::Layout;

/// Errors raised while fetching an archive.
#[derive(Error, Debug)]
pub enum DownloadError {
    /// Network failure or non-success HTTP status.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Local filesystem failure.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The content does not hash to the expected digest.
    #[error("Hash mismatch: expected {expected}, got {actual}")]
    HashMismatch {
        /// Digest declared by the formula.
        expected: String,
        /// Digest of the bytes received.
        actual: String,
    },

    /// The URL scheme is not one pour can fetch from.
    #[error("Unsupported URL: {0}")]
    UnsupportedUrl(String),
}

impl DownloadError {
    /// Whether this is an integrity failure (as opposed to a fetch failure).
    pub fn is_integrity_failure(&self) -> bool {
        matches!(self, Self::HashMismatch { .. })
    }
}

/// Request for a download operation
pub struct DownloadRequest<'a, R: Reporter> {
    /// HTTP client.
    pub client: &'a Client,
    /// Package the archive belongs to (for progress reporting).
    pub pkg_name: &'a PackageName,
    /// Version the archive belongs to (for progress reporting).
    pub version: &'a Version,
    /// Source URL (`http(s)://`, `file://`, or a plain path).
    pub url: &'a str,
    /// Final location of the verified archive.
    pub dest: &'a Path,
    /// Digest the content must match.
    pub expected: &'a Sha256Digest,
    /// Progress sink.
    pub reporter: &'a R,
}

impl<R: Reporter> std::fmt::Debug for DownloadRequest<'_, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownloadRequest")
            .field("pkg_name", self.pkg_name)
            .field("version", self.version)
            .field("url", &self.url)
            .field("dest", &self.dest)
            .finish_non_exhaustive()
    }
}

impl<R: Reporter> DownloadRequest<'_, R> {
    /// Execute the download, returning the verified digest.
    ///
    /// # Errors
    ///
    /// Returns a fetch error, or [`DownloadError::HashMismatch`] when the
    /// content does not match. In both cases `dest` is left untouched.
    pub async fn execute(self) -> Result<Sha256Digest, DownloadError> {
        let part = partial_path(self.dest);
        if let Some(parent) = self.dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let result = if self.url.starts_with("http://") || self.url.starts_with("https://") {
            self.stream_http(&part).await
        } else {
            let path = local_source_path(self.url)?;
            self.copy_local(&path, &part).await
        };

        let actual = match result {
            Ok(actual) => actual,
            Err(e) => {
                tokio::fs::remove_file(&part).await.ok();
                return Err(e);
            }
        };

        if actual.as_str() != self.expected.as_str() {
            self.reporter
                .failed(self.pkg_name, self.version, "hash mismatch");
            tokio::fs::remove_file(&part).await.ok();
            return Err(DownloadError::HashMismatch {
                expected: self.expected.to_string(),
                actual: actual.to_string(),
            });
        }

        tokio::fs::rename(&part, self.dest).await?;
        self.reporter
            .verified(self.pkg_name, self.version, actual.as_str());
        Ok(actual)
    }

    async fn stream_http(&self, part: &Path) -> Result<Sha256Digest, DownloadError> {
        tracing::debug!(url = self.url, "downloading");
        let response = self.client.get(self.url).send().await?.error_for_status()?;

        let total_size = response.content_length();
        self.reporter
            .downloading(self.pkg_name, self.version, 0, total_size);

        let mut file = File::create(part).await?;
        let mut stream = response.bytes_stream();
        let mut hasher = Sha256::new();
        let mut downloaded: u64 = 0;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            hasher.update(&chunk);
            downloaded += chunk.len() as u64;
            self.reporter
                .downloading(self.pkg_name, self.version, downloaded, total_size);
        }

        file.flush().await?;
        Ok(Sha256Digest::from_hasher(hasher))
    }

    async fn copy_local(&self, source: &Path, part: &Path) -> Result<Sha256Digest, DownloadError> {
        tracing::debug!(source = %source.display(), "copying local archive");
        let mut input = File::open(source).await?;
        let total_size = input.metadata().await.ok().map(|m| m.len());
        self.reporter
            .downloading(self.pkg_name, self.version, 0, total_size);

        let mut output = File::create(part).await?;
        let mut hasher = Sha256::new();
        let mut buffer = vec![0u8; 64 * 1024];
        let mut copied: u64 = 0;

        loop {
            let count = input.read(&mut buffer).await?;
            if count == 0 {
                break;
            }
            output.write_all(&buffer[..count]).await?;
            hasher.update(&buffer[..count]);
            copied += count as u64;
            self.reporter
                .downloading(self.pkg_name, self.version, copied, total_size);
        }

        output.flush().await?;
        Ok(Sha256Digest::from_hasher(hasher))
    }
}

/// Fetch a formula's archive into the cache, reusing a cached copy only if it
/// still hashes to the declared digest.
///
/// # Errors
///
/// Returns a [`DownloadError`]; on an integrity failure no file is left in the cache.
pub async fn fetch_archive<R: Reporter>(
    client: &Client,
    formula: &Formula,
    layout: &Layout,
    reporter: &R,
) -> Result<PathBuf, DownloadError> {
    let expected = &formula.source.sha256;
    let dest = layout.cached_archive(expected.as_str(), formula.archive_file_name());

    if tokio::fs::try_exists(&dest).await.unwrap_or(false) {
        let path = dest.clone();
        let cached = tokio::task::spawn_blocking(move || Sha256Digest::compute_file(&path))
            .await
            .map_err(std::io::Error::other)??;
        if &cached == expected {
            tracing::debug!(path = %dest.display(), "cache hit");
            reporter.verified(formula.name(), formula.version(), cached.as_str());
            return Ok(dest);
        }
        tracing::warn!(path = %dest.display(), "cached archive is corrupt, refetching");
        tokio::fs::remove_file(&dest).await?;
    }

    DownloadRequest {
        client,
        pkg_name: formula.name(),
        version: formula.version(),
        url: &formula.source.url,
        dest: &dest,
        expected,
        reporter,
    }
    .execute()
    .await?;

    Ok(dest)
}

fn partial_path(dest: &Path) -> PathBuf {
    let mut name = dest.file_name().unwrap_or_default().to_os_string();
    name.push(".part");
    dest.with_file_name(name)
}

fn local_source_path(url: &str) -> Result<PathBuf, DownloadError> {
    if let Some(rest) = url.strip_prefix("file://") {
        return Ok(PathBuf::from(rest));
    }
    if url.contains("://") {
        return Err(DownloadError::UnsupportedUrl(url.to_string()));
    }
    Ok(PathBuf::from(url))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NullReporter;

    const BODY: &[u8] = b"pretend this is a tarball";

    fn formula_for(url: &str, body: &[u8]) -> Formula {
        let toml = format!(
            r#"
[package]
name = "git-absorb"
version = "0.2.0"
description = "test"
homepage = "https://example.com"

[source]
url = "{url}"
sha256 = "{}"

[[install]]
source = "bin/git-absorb"
target = "bin"
"#,
            Sha256Digest::compute(body)
        );
        Formula::parse(&toml).unwrap()
    }

    #[tokio::test]
    async fn downloads_and_verifies_over_http() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/archive/v0.2.0.tar.gz")
            .with_status(200)
            .with_body(BODY)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let layout = Layout::new(dir.path(), dir.path());
        let formula = formula_for(&format!("{}/archive/v0.2.0.tar.gz", server.url()), BODY);

        let path = fetch_archive(&Client::new(), &formula, &layout, &NullReporter)
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(std::fs::read(&path).unwrap(), BODY);
        assert!(path.starts_with(layout.cache_dir()));
    }

    #[tokio::test]
    async fn mismatch_leaves_nothing_behind() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/archive/v0.2.0.tar.gz")
            .with_status(200)
            .with_body("tampered")
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let layout = Layout::new(dir.path(), dir.path());
        let formula = formula_for(&format!("{}/archive/v0.2.0.tar.gz", server.url()), BODY);

        let err = fetch_archive(&Client::new(), &formula, &layout, &NullReporter)
            .await
            .unwrap_err();
        assert!(err.is_integrity_failure(), "{err}");

        let leftovers: Vec<_> = std::fs::read_dir(layout.cache_dir())
            .unwrap()
            .collect();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn http_error_status_is_a_fetch_failure() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/archive/v0.2.0.tar.gz")
            .with_status(404)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let layout = Layout::new(dir.path(), dir.path());
        let formula = formula_for(&format!("{}/archive/v0.2.0.tar.gz", server.url()), BODY);

        let err = fetch_archive(&Client::new(), &formula, &layout, &NullReporter)
            .await
            .unwrap_err();
        assert!(matches!(err, DownloadError::Http(_)));
    }

    #[tokio::test]
    async fn local_file_urls_and_cache_reuse() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("git-absorb-0.2.0.tar.gz");
        std::fs::write(&src, BODY).unwrap();

        let layout = Layout::new(dir.path().join("home"), dir.path().join("prefix"));
        let formula = formula_for(&format!("file://{}", src.display()), BODY);

        let first = fetch_archive(&Client::new(), &formula, &layout, &NullReporter)
            .await
            .unwrap();

        // Source gone: a second fetch must be served from the cache.
        std::fs::remove_file(&src).unwrap();
        let second = fetch_archive(&Client::new(), &formula, &layout, &NullReporter)
            .await
            .unwrap();
        assert_eq!(first, second);

        // Corrupt cache entry is discarded and refetched (which now fails).
        std::fs::write(&first, b"bitrot").unwrap();
        let err = fetch_archive(&Client::new(), &formula, &layout, &NullReporter)
            .await
            .unwrap_err();
        assert!(matches!(err, DownloadError::Io(_)));
        assert!(!first.exists());
    }

    #[test]
    fn rejects_unknown_schemes() {
        assert!(matches!(
            local_source_path("ftp://example.com/a.tar.gz"),
            Err(DownloadError::UnsupportedUrl(_))
        ));
        assert_eq!(
            local_source_path("file:///tmp/a.tar.gz").unwrap(),
            PathBuf::from("/tmp/a.tar.gz")
        );
    }
}
