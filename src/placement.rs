//! File Placement
//!
//! Moves a categorized source file to `root/path/filename`, creating missing
//! directories and probing `name_1.ext`, `name_2.ext`, ... when the name is
//! taken. The move either completes or leaves the source where it was.

use crate::error::{DocsortError, Result};
use crate::pipeline::Categorization;
use std::path::{Path, PathBuf};

/// Highest `_N` suffix tried before giving up
pub const MAX_DUPLICATE_SUFFIX: usize = 10_000;

#[derive(Debug, Clone)]
pub struct FileMover {
    root: PathBuf,
}

impl FileMover {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Move `source` into place; returns the final path
    pub fn move_file(&self, source: &Path, location: &Categorization) -> Result<PathBuf> {
        if location.filename.is_empty() {
            return Err(DocsortError::placement(source, "Empty target filename"));
        }

        let target_dir = self.root.join(location.relative_dir());
        std::fs::create_dir_all(&target_dir).map_err(|e| {
            DocsortError::placement(&target_dir, format!("Failed to create directory: {}", e))
        })?;

        let mut target = target_dir.join(&location.filename);
        if target.exists() {
            target = unique_destination(&target_dir, &location.filename)?;
        }

        move_path(source, &target)?;
        tracing::info!("[FileMover] {} -> {}", source.display(), target.display());
        Ok(target)
    }
}

/// First free `stem_N.ext` in `dir`
fn unique_destination(dir: &Path, filename: &str) -> Result<PathBuf> {
    let path = Path::new(filename);
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| filename.to_string());
    let ext = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();

    for counter in 1..=MAX_DUPLICATE_SUFFIX {
        let candidate = dir.join(format!("{}_{}{}", stem, counter, ext));
        if !candidate.exists() {
            return Ok(candidate);
        }
    }

    Err(DocsortError::placement(
        dir.join(filename),
        format!("No free name after {} attempts", MAX_DUPLICATE_SUFFIX),
    ))
}

/// Rename, falling back to copy and delete across filesystems
fn move_path(source: &Path, target: &Path) -> Result<()> {
    if std::fs::rename(source, target).is_ok() {
        return Ok(());
    }

    if let Err(e) = std::fs::copy(source, target) {
        // Source stays authoritative
        let _ = std::fs::remove_file(target);
        return Err(DocsortError::placement(source, format!("Failed to move file: {}", e)));
    }

    if let Err(e) = std::fs::remove_file(source) {
        let _ = std::fs::remove_file(target);
        return Err(DocsortError::placement(
            source,
            format!("Failed to remove source after copy: {}", e),
        ));
    }

    Ok(())
}
