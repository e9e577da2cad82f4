//! Target expansion

use anyhow::{bail, Context, Result};
use std::collections::BTreeSet;
use std::path::PathBuf;
use walkdir::WalkDir;

/// Check `paths` exist and, when `recursive`, add every directory below them
///
/// Only directories are added by the walk: the kqueue backend reports entry
/// changes through them, and one descriptor per file would exhaust the
/// descriptor limit on large trees. Symlinks are not followed.
pub fn expand_targets(paths: &[PathBuf], recursive: bool) -> Result<Vec<PathBuf>> {
    if paths.is_empty() {
        bail!("at least one path is required");
    }

    let mut targets = BTreeSet::new();
    for path in paths {
        let path = path
            .canonicalize()
            .with_context(|| format!("Cannot watch {}", path.display()))?;

        if recursive && path.is_dir() {
            for entry in WalkDir::new(&path).follow_links(false) {
                let entry = entry.with_context(|| format!("Failed to walk {}", path.display()))?;
                if entry.file_type().is_dir() {
                    targets.insert(entry.into_path());
                }
            }
        }
        targets.insert(path);
    }
    Ok(targets.into_iter().collect())
}
