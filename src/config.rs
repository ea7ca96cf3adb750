//! Backup run configuration.
//!
//! A backup run is described by a TOML file listing the paths to capture and
//! the exclusion rules to apply while walking them. The raw bytes of that
//! file are carried into the archive verbatim, so a restore on another
//! machine can recover the exact configuration the backup was taken with.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// The set of paths to capture and the rules for what to leave out.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct BackupConfig {
    /// Source files or directories to include, in order.
    pub backup_paths: Vec<PathBuf>,
    /// Directory basenames excluded by exact match; a match prunes the
    /// whole subtree.
    #[serde(default)]
    pub exclude_dirs: Vec<String>,
    /// File basename glob patterns to exclude (`*`, `?`, character classes).
    #[serde(default)]
    pub exclude_files: Vec<String>,
}

impl BackupConfig {
    /// Reads and parses a configuration file, returning the parsed config
    /// together with the raw bytes for round-tripping into the archive.
    pub fn load(path: &Path) -> Result<(Self, Vec<u8>)> {
        let raw = fs::read(path)?;
        let text = std::str::from_utf8(&raw)
            .map_err(|e| Error::InvalidConfig(format!("{}: not UTF-8: {e}", path.display())))?;
        let config: BackupConfig = toml::from_str(text)?;
        config.validate()?;
        Ok((config, raw))
    }

    /// Parses a configuration previously embedded in an archive.
    pub fn from_bytes(raw: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(raw)
            .map_err(|e| Error::InvalidConfig(format!("embedded config is not UTF-8: {e}")))?;
        let config: BackupConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.backup_paths.is_empty() {
            return Err(Error::InvalidConfig(
                "backup_paths must name at least one file or directory".into(),
            ));
        }
        Ok(())
    }
}
