//! The path map linking archive entries back to their original locations.
//!
//! Every successfully archived file contributes one entry mapping its
//! archive-relative path to the absolute path it was captured from. The map
//! is the authoritative un-rebasing table: restore destinations come from
//! here and are never re-derived from entry naming. Keys are stored in a
//! BTreeMap so the serialized form is key-ordered and reproducible.

use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Archive-relative path → original absolute path.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(transparent)]
pub struct FileMap(BTreeMap<String, String>);

impl FileMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one archived file. The archive-relative key is unique; a
    /// duplicate key keeps the latest value.
    pub fn insert(&mut self, entry_name: String, source: &Path) {
        self.0
            .insert(entry_name, source.to_string_lossy().into_owned());
    }

    /// Restore destination for an archive entry, if the map knows it.
    pub fn destination(&self, entry_name: &str) -> Option<PathBuf> {
        self.0.get(entry_name).map(PathBuf::from)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.0.iter()
    }

    /// Rewrites every destination under an alternate root directory, so a
    /// restore lands in a sandbox instead of the original absolute paths.
    ///
    /// Root and prefix components of the recorded path are stripped and the
    /// remainder is joined below `root` (simple prefix-join). A foreign-style
    /// absolute path with no recognizable prefix lands as a single literal
    /// component under `root`.
    pub fn rebase(&mut self, root: &Path) {
        for value in self.0.values_mut() {
            let relative: PathBuf = Path::new(value)
                .components()
                .filter(|c| !matches!(c, Component::RootDir | Component::Prefix(_)))
                .collect();
            *value = root.join(relative).to_string_lossy().into_owned();
        }
    }

    /// Serializes the map for the archive's metadata entry.
    pub fn to_toml(&self) -> Result<Vec<u8>> {
        Ok(toml::to_string_pretty(self)?.into_bytes())
    }

    /// Parses a map previously read from the archive.
    pub fn from_toml(raw: &[u8]) -> Result<Self> {
        let text = String::from_utf8_lossy(raw);
        Ok(toml::from_str(&text)?)
    }
}
