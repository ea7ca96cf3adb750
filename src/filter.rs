//! Exclusion predicates applied during path enumeration.
//!
//! Directory names are matched exactly against the configured list; file
//! names are matched against shell-style glob patterns compiled into a
//! single [`GlobSet`]. Both predicates see basenames only, never full paths:
//! exclusion is evaluated per path segment, and a directory match prunes the
//! entire subtree at the walker.

use globset::{Glob, GlobSet, GlobSetBuilder};
use tracing::warn;

/// Compiled exclusion rules. Pure predicates, no side effects.
#[derive(Debug, Clone)]
pub struct ExclusionFilter {
    dirs: Vec<String>,
    files: GlobSet,
}

impl ExclusionFilter {
    /// Compiles the exclusion rules from a backup configuration.
    ///
    /// Malformed glob patterns are dropped with a warning and never match;
    /// a bad pattern must not abort a backup run.
    pub fn new(exclude_dirs: &[String], exclude_files: &[String]) -> Self {
        let mut builder = GlobSetBuilder::new();
        for pattern in exclude_files {
            match Glob::new(pattern) {
                Ok(glob) => {
                    builder.add(glob);
                }
                Err(e) => warn!("ignoring malformed exclude pattern '{pattern}': {e}"),
            }
        }
        let files = builder.build().unwrap_or_else(|e| {
            warn!("failed to compile exclude patterns: {e}");
            GlobSet::empty()
        });

        Self {
            dirs: exclude_dirs.to_vec(),
            files,
        }
    }

    /// True iff `name` exactly equals one configured excluded directory name.
    pub fn is_excluded_dir(&self, name: &str) -> bool {
        self.dirs.iter().any(|d| d == name)
    }

    /// True iff `name` matches at least one configured file pattern.
    pub fn is_excluded_file(&self, name: &str) -> bool {
        self.files.is_match(name)
    }
}
