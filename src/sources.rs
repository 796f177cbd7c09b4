//! Source directory scanning.
//!
//! Walks a directory tree and returns the files matching the include globs
//! (minus the exclude globs), sorted by their relative path. The relative
//! path doubles as the source identifier carried by every chunk and record.

use anyhow::Result;
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::{Path, PathBuf};
use tracing::warn;
use walkdir::WalkDir;

/// A file discovered under a source directory.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceFile {
    pub path: PathBuf,
    /// Path relative to the scanned root, with `/` separators.
    pub source_id: String,
    pub content_type: String,
}

/// Scan `root` for files matching `include` and not matching `exclude`.
///
/// A missing root yields an empty list; callers decide whether that is fatal.
/// Unreadable directory entries are logged and skipped.
pub fn scan(root: &Path, include: &[String], exclude: &[String]) -> Result<Vec<SourceFile>> {
    if !root.exists() {
        warn!(root = %root.display(), "source directory does not exist");
        return Ok(Vec::new());
    }

    let include_set = build_globset(include)?;
    let mut default_excludes = vec!["**/.git/**".to_string(), "**/.*".to_string()];
    default_excludes.extend(exclude.iter().cloned());
    let exclude_set = build_globset(&default_excludes)?;

    let mut files = Vec::new();

    for entry in WalkDir::new(root) {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                warn!(error = %e, "skipping unreadable directory entry");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        let rel_str = relative.to_string_lossy().replace('\\', "/");

        if exclude_set.is_match(&rel_str) || !include_set.is_match(&rel_str) {
            continue;
        }

        files.push(SourceFile {
            path: path.to_path_buf(),
            content_type: content_type_for(path).to_string(),
            source_id: rel_str,
        });
    }

    files.sort_by(|a, b| a.source_id.cmp(&b.source_id));
    Ok(files)
}

/// Map a file extension to the MIME type understood by [`crate::extract`].
pub fn content_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "pdf" => crate::extract::MIME_PDF,
        "md" | "markdown" => crate::extract::MIME_MARKDOWN,
        "json" => crate::extract::MIME_JSON,
        _ => crate::extract::MIME_TEXT,
    }
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}
