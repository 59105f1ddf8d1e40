//! Discovery of build containers in a source tree.

use std::io;
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

use crate::builders::drivers;
use crate::types::{BuildPath, WaldoError};

/// Directory suffixes the walker never descends into.
const PRUNED_SUFFIXES: [&str; 6] = [
    ".docset",
    ".framework",
    ".lproj",
    ".xcassets",
    ".xcodeproj",
    ".xcworkspace",
];

/// Directory names the walker never descends into.
const PRUNED_NAMES: [&str; 7] = [
    "build",
    "Carthage",
    "CordovaLib",
    "fastlane",
    "gradle",
    "node_modules",
    "Pods",
];

/// Whether a directory with this name is skipped entirely.
pub fn is_pruned_name(name: &str) -> bool {
    name.starts_with('.')
        || PRUNED_NAMES.contains(&name)
        || PRUNED_SUFFIXES.iter().any(|suffix| name.ends_with(suffix))
}

fn descend_into(entry: &DirEntry) -> bool {
    if entry.depth() == 0 {
        return true;
    }
    entry.file_type().is_dir() && !is_pruned_name(&entry.file_name().to_string_lossy())
}

/// Walks `root` depth-first and reports every build container.
///
/// Drivers are consulted in [`drivers`] order; the first one that claims a
/// directory wins and the directory's subtree is not searched further.
/// Relative paths in the result are relative to `root`.
///
/// Fails with [`WaldoError::NotFound`] when nothing is found.
pub fn detect(root: &Path) -> Result<Vec<BuildPath>, WaldoError> {
    let root = root.canonicalize()?;
    let drivers = drivers();
    let mut found = Vec::new();

    let mut walker = WalkDir::new(&root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(descend_into);

    while let Some(entry) = walker.next() {
        let entry = entry.map_err(io::Error::from)?;
        if !entry.file_type().is_dir() {
            continue;
        }
        let path = entry.path();
        let claimed = drivers
            .iter()
            .find_map(|driver| driver.is_container(path).map(|support| (driver.family(), support)));
        let Some((family, support)) = claimed else {
            continue;
        };

        tracing::debug!(path = %path.display(), %family, "found build container");
        found.push(BuildPath {
            abs_path: path.to_path_buf(),
            rel_path: relative_to(path, &root),
            family,
            android_support: support.android,
            ios_support: support.ios,
        });
        walker.skip_current_dir();
    }

    if found.is_empty() {
        return Err(WaldoError::NotFound(format!(
            "build containers under {}",
            root.display()
        )));
    }
    Ok(found)
}

/// `path` relative to `base`, or `.` when they are the same directory.
pub fn relative_to(path: &Path, base: &Path) -> PathBuf {
    match path.strip_prefix(base) {
        Ok(rel) if rel.as_os_str().is_empty() => PathBuf::from("."),
        Ok(rel) => rel.to_path_buf(),
        Err(_) => path.to_path_buf(),
    }
}
