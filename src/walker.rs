//! Path enumeration for backup runs.
//!
//! Walks the configured roots, applies the exclusion filter, and buffers one
//! [`FileTask`] per eligible file. The buffered vector doubles as the
//! eligible-file count, so progress sizing and task dispatch can never drift
//! apart. Excluded directories prune their whole subtree; the walker never
//! descends into them.

use std::path::{Path, PathBuf};

use tracing::warn;
use walkdir::WalkDir;

use crate::filter::ExclusionFilter;

/// Top-level archive folder that namespaces content entries away from
/// the metadata entries.
pub const DATA_DIR: &str = "data";

/// One file to archive: where it lives and the entry name it is stored
/// under. Created here, consumed exactly once by a backup worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileTask {
    /// Absolute path of the source file.
    pub source: PathBuf,
    /// Archive-relative destination, forward-slash separated:
    /// `data/<root-basename>/<relative-path>`.
    pub entry_name: String,
}

/// The outcome of enumerating every configured root.
#[derive(Debug, Default)]
pub struct Enumeration {
    pub tasks: Vec<FileTask>,
    pub skipped_files: u64,
    pub skipped_dirs: u64,
    /// Roots that could not be fully traversed. Tasks collected before the
    /// failure are kept.
    pub failed_roots: u64,
}

/// Enumerates all eligible files under the configured roots.
///
/// A traversal error aborts enumeration for that root only; the failure is
/// logged and counted, and the remaining roots still run.
pub fn enumerate(roots: &[PathBuf], filter: &ExclusionFilter) -> Enumeration {
    let mut result = Enumeration::default();

    for root in roots {
        if let Err(e) = enumerate_root(root, filter, &mut result) {
            warn!("skipping backup path {}: {e}", root.display());
            result.failed_roots += 1;
        }
    }

    result
}

fn enumerate_root(
    root: &Path,
    filter: &ExclusionFilter,
    out: &mut Enumeration,
) -> std::io::Result<()> {
    let metadata = std::fs::metadata(root)?;

    let Some(base) = root.file_name() else {
        return Err(std::io::Error::other("backup path has no basename"));
    };
    let base = base.to_string_lossy();

    if !metadata.is_dir() {
        if filter.is_excluded_file(&base) {
            out.skipped_files += 1;
        } else {
            out.tasks.push(FileTask {
                source: std::path::absolute(root)?,
                entry_name: format!("{DATA_DIR}/{base}"),
            });
        }
        return Ok(());
    }

    let mut it = WalkDir::new(root).into_iter();
    while let Some(entry) = it.next() {
        let entry = entry.map_err(std::io::Error::other)?;
        let name = entry.file_name().to_string_lossy();

        if entry.file_type().is_dir() {
            if filter.is_excluded_dir(&name) {
                out.skipped_dirs += 1;
                it.skip_current_dir();
            }
            continue;
        }

        if filter.is_excluded_file(&name) {
            out.skipped_files += 1;
            continue;
        }

        let rel = entry
            .path()
            .strip_prefix(root)
            .map_err(std::io::Error::other)?;
        out.tasks.push(FileTask {
            source: std::path::absolute(entry.path())?,
            entry_name: format!("{DATA_DIR}/{base}/{}", slashed(rel)),
        });
    }

    Ok(())
}

/// Joins path components with forward slashes regardless of the host
/// separator, so archives restore across platforms.
fn slashed(rel: &Path) -> String {
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}
