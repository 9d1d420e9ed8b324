//! Atomic document persistence via tempfile + rename.
//!
//! The edited body is written to a temporary file next to the target and
//! renamed over it, so a crash mid-write never leaves a half-edited document.

use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};

/// Atomically replace the document at `path` with `body`.
///
/// Permissions of an existing document are carried over to the new file.
///
/// # Errors
///
/// Returns an error if the parent directory is missing, writing fails, or
/// the rename fails (e.g., cross-device).
pub fn persist_document(path: &Path, body: &str) -> Result<()> {
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    let mut tmp = tempfile::NamedTempFile::new_in(parent)
        .with_context(|| format!("failed to create temp file in {}", parent.display()))?;

    tmp.write_all(body.as_bytes())
        .with_context(|| format!("failed to write edited body for {}", path.display()))?;
    tmp.as_file()
        .sync_all()
        .with_context(|| format!("failed to sync edited body for {}", path.display()))?;

    if let Ok(meta) = std::fs::metadata(path) {
        tmp.as_file()
            .set_permissions(meta.permissions())
            .with_context(|| format!("failed to copy permissions of {}", path.display()))?;
    }

    tmp.persist(path)
        .with_context(|| format!("failed to atomically replace {}", path.display()))?;
    Ok(())
}
