//! File discovery
//!
//! Walks a root directory and returns an ordered list of files matching
//! the include globs. Exclude globs take precedence, and a directory
//! matching an exclude glob is pruned rather than descended into.

use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Error during file discovery
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("root path not found: {0}")]
    RootNotFound(PathBuf),

    #[error("invalid glob pattern '{pattern}': {source}")]
    InvalidGlob {
        pattern: String,
        source: globset::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Find files under `root` matching the include globs.
///
/// `**` matches any number of path segments, `*` stays within one.
/// Matching is done against paths relative to `root`. The returned list
/// is sorted for deterministic downstream ordering.
pub fn find_files(
    root: &Path,
    include: &[String],
    exclude: &[String],
    recursive: bool,
) -> Result<Vec<PathBuf>, DiscoveryError> {
    if !root.exists() {
        return Err(DiscoveryError::RootNotFound(root.to_path_buf()));
    }
    if root.is_file() {
        return Ok(vec![root.to_path_buf()]);
    }

    let include_set = build_globset(include)?;
    let exclude_set = build_globset(exclude)?;
    let prune_set = build_globset(&prune_patterns(exclude))?;

    let mut files = Vec::new();
    walk(
        root,
        root,
        &include_set,
        &exclude_set,
        &prune_set,
        recursive,
        &mut files,
    )?;
    files.sort();
    Ok(files)
}

fn walk(
    root: &Path,
    dir: &Path,
    include: &GlobSet,
    exclude: &GlobSet,
    prune: &GlobSet,
    recursive: bool,
    out: &mut Vec<PathBuf>,
) -> Result<(), DiscoveryError> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(&path);

        if path.is_dir() {
            if !recursive || prune.is_match(relative) {
                continue;
            }
            walk(root, &path, include, exclude, prune, recursive, out)?;
        } else if include.is_match(relative) && !exclude.is_match(relative) {
            out.push(path);
        }
    }
    Ok(())
}

fn build_globset(patterns: &[String]) -> Result<GlobSet, DiscoveryError> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = GlobBuilder::new(pattern)
            .literal_separator(true)
            .build()
            .map_err(|e| DiscoveryError::InvalidGlob {
                pattern: pattern.clone(),
                source: e,
            })?;
        builder.add(glob);
    }
    builder.build().map_err(|e| DiscoveryError::InvalidGlob {
        pattern: String::new(),
        source: e,
    })
}

/// Directory forms of the exclude patterns: `**/Pods/**` should prune the
/// `Pods` directory itself, not just the files beneath it.
fn prune_patterns(exclude: &[String]) -> Vec<String> {
    exclude
        .iter()
        .map(|p| p.strip_suffix("/**").unwrap_or(p).to_string())
        .collect()
}
