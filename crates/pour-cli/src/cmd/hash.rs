//! Hash command

use std::path::PathBuf;

use anyhow::{Context, Result};
use pour_schema::Sha256Digest;

/// Compute SHA256 hash of files, in `sha256sum` format
pub fn hash(files: &[PathBuf]) -> Result<()> {
    for file in files {
        let digest = Sha256Digest::compute_file(file)
            .with_context(|| format!("Failed to read {}", file.display()))?;
        println!("{digest}  {}", file.display());
    }
    Ok(())
}
