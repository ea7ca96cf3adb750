use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Unified result type for all fallible operations in zipsnap.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced by the backup and restore engines.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] io::Error),

    #[error(transparent)]
    Zip(#[from] zip::result::ZipError),

    #[error("failed to serialize metadata: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("failed to parse metadata: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("archive entry '{0}' not found")]
    MissingEntry(String),

    /// Restoration cannot proceed without the path map.
    #[error("archive has no usable file map; cannot restore")]
    MissingFileMap,

    #[error("archive contains no restorable entries")]
    NothingToRestore,

    #[error("{}: {source}", .path.display())]
    ItemFailed {
        path: PathBuf,
        #[source]
        source: Box<Error>,
    },

    #[error("worker task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("extraction pool closed unexpectedly")]
    PoolClosed,
}

impl Error {
    /// Wraps a per-item failure with the path it occurred on.
    pub(crate) fn item(path: impl Into<PathBuf>, source: Error) -> Self {
        Error::ItemFailed {
            path: path.into(),
            source: Box::new(source),
        }
    }
}
