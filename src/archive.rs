//! The archive container.
//!
//! One zip file holds two metadata entries plus one content entry per backed
//! up file. The zip format cannot host concurrent entry writers, so all
//! entry creation funnels through a single mutex; workers overlap on file
//! reads and everything else, and serialize only here. The reader side
//! mirrors that: the zip reader needs `&mut self`, so entry reads are
//! mutex-guarded and extraction tasks copy entry bytes out before touching
//! the filesystem.

use std::fs::{self, File};
use std::io::{self, BufReader, Read, Write};
use std::path::Path;
use std::sync::Mutex;

use zip::result::ZipError;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipArchive, ZipWriter};

use crate::error::{Error, Result};

/// Entry carrying the original configuration bytes, verbatim.
pub const CONFIG_ENTRY: &str = "backup_config.toml";
/// Entry carrying the serialized file map.
pub const FILE_MAP_ENTRY: &str = "file_map.toml";

/// True for the two metadata entries that are not part of the restore set.
pub fn is_metadata_entry(name: &str) -> bool {
    name == CONFIG_ENTRY || name == FILE_MAP_ENTRY
}

/// Fixed entry options so that identical inputs produce identical entry
/// bytes: deflate at maximum compression, epoch timestamp.
fn entry_options() -> SimpleFileOptions {
    SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .compression_level(Some(9))
        .last_modified_time(DateTime::default())
}

/// Write side of the archive. Shared across the worker pool; every entry
/// write is an atomic "create entry, write all bytes" under one lock.
pub struct ArchiveWriter {
    inner: Mutex<ZipWriter<File>>,
}

impl ArchiveWriter {
    /// Creates the output archive, including missing parent directories.
    pub fn create(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        let file = File::create(path)?;
        Ok(Self {
            inner: Mutex::new(ZipWriter::new(file)),
        })
    }

    /// Writes a named entry with exactly the given bytes.
    pub fn write_entry(&self, name: &str, data: &[u8]) -> Result<()> {
        let mut zip = self.inner.lock().unwrap();
        zip.start_file(name, entry_options())?;
        zip.write_all(data)?;
        Ok(())
    }

    /// Streams a source file into a named entry. The source is opened
    /// before the lock is taken so open errors never stall other workers.
    /// A failed copy aborts the half-written entry, keeping the archive's
    /// entry set aligned with the file map.
    pub fn write_file(&self, name: &str, source: &Path) -> Result<()> {
        let mut reader = BufReader::new(File::open(source)?);
        let mut zip = self.inner.lock().unwrap();
        zip.start_file(name, entry_options())?;
        if let Err(e) = io::copy(&mut reader, &mut *zip) {
            let _ = zip.abort_file();
            return Err(e.into());
        }
        Ok(())
    }

    /// Flushes the central directory and closes the archive.
    pub fn finish(self) -> Result<()> {
        let mut zip = self.inner.into_inner().unwrap();
        zip.finish()?;
        Ok(())
    }
}

/// Read side of the archive, shared across extraction tasks.
pub struct ArchiveReader {
    inner: Mutex<ZipArchive<File>>,
}

impl ArchiveReader {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        Ok(Self {
            inner: Mutex::new(ZipArchive::new(file)?),
        })
    }

    /// Names of every entry in the archive, metadata included.
    pub fn entry_names(&self) -> Vec<String> {
        self.inner
            .lock()
            .unwrap()
            .file_names()
            .map(String::from)
            .collect()
    }

    /// Reads a named entry fully into memory.
    pub fn read_entry(&self, name: &str) -> Result<Vec<u8>> {
        let mut zip = self.inner.lock().unwrap();
        let mut entry = zip.by_name(name).map_err(|e| match e {
            ZipError::FileNotFound => Error::MissingEntry(name.to_string()),
            other => Error::Zip(other),
        })?;
        let mut buf = Vec::with_capacity(entry.size() as usize);
        entry.read_to_end(&mut buf)?;
        Ok(buf)
    }
}
