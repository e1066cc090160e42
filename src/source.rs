//! Routine source discovery and reading.
//!
//! Walks `loader.source_dir`, keeping files that match `include_globs` and
//! none of `exclude_globs` (both relative to the source directory).

use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use routine_loader_core::error::{LoaderError, LoaderResult};
use routine_loader_core::models::RoutineSource;

use crate::config::LoaderConfig;

pub fn discover_sources(config: &LoaderConfig) -> Result<Vec<PathBuf>> {
    let root = &config.source_dir;
    if !root.is_dir() {
        bail!("Source directory does not exist: {}", root.display());
    }

    let include_set = build_globset(&config.include_globs)?;
    let exclude_set = build_globset(&config.exclude_globs)?;

    let mut paths = Vec::new();

    for entry in WalkDir::new(root) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);

        if exclude_set.is_match(relative) {
            continue;
        }
        if !include_set.is_match(relative) {
            continue;
        }

        paths.push(path.to_path_buf());
    }

    paths.sort();
    Ok(paths)
}

/// Last modification time of `path` in seconds since the Unix epoch.
pub fn source_mtime(path: &Path) -> LoaderResult<i64> {
    let modified = std::fs::metadata(path)
        .and_then(|m| m.modified())
        .map_err(|source| LoaderError::SourceUnreadable {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(DateTime::<Utc>::from(modified).timestamp())
}

/// Reads a routine source. The path is canonicalized so that `__FILE__`
/// and `__DIR__` expand to absolute paths.
pub fn read_source(path: &Path) -> LoaderResult<RoutineSource> {
    let unreadable = |source| LoaderError::SourceUnreadable {
        path: path.to_path_buf(),
        source,
    };

    let canonical = std::fs::canonicalize(path).map_err(unreadable)?;
    let text = std::fs::read_to_string(&canonical).map_err(unreadable)?;
    let mtime = source_mtime(&canonical)?;

    Ok(RoutineSource::new(canonical, text, mtime))
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}
