use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tempfile::NamedTempFile;

/// Write `contents` to `path` in one step.
///
/// The bytes go to a temp file next to the target, which then replaces it,
/// so an interrupted run never leaves a partial calendar behind.
/// Returns the absolute path written.
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<PathBuf> {
    let path = std::path::absolute(path)
        .with_context(|| format!("Invalid output path {}", path.display()))?;
    let dir = path
        .parent()
        .context("Output path has no parent directory")?;

    let mut file = NamedTempFile::new_in(dir)
        .with_context(|| format!("Failed to create temp file in {}", dir.display()))?;
    file.write_all(contents)
        .context("Failed to write calendar data")?;
    file.as_file().sync_all().context("Failed to flush calendar data")?;
    file.persist(&path)
        .with_context(|| format!("Failed to write {}", path.display()))?;

    Ok(path)
}
