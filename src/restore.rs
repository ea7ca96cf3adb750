//! The restore engine.
//!
//! Metadata is fully parsed before any extraction begins: the embedded
//! configuration and the file map are loaded first, the map optionally
//! rebased under an alternate root, and only then does the extraction
//! fan-out start. Parallelism is capped by a counting semaphore rather
//! than the backup side's queue, since the full restore set is known up
//! front. Destinations come exclusively from the file map; archive entries
//! the map does not know are skipped, never fatal.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Local;
use tokio::runtime::Builder;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::archive::{ArchiveReader, CONFIG_ENTRY, FILE_MAP_ENTRY, is_metadata_entry};
use crate::backup::{self, BackupOptions, worker_count};
use crate::config::BackupConfig;
use crate::error::{Error, Result};
use crate::filemap::FileMap;

/// Directory under the home dir holding pre-restore snapshots.
const SNAPSHOT_DIR_NAME: &str = ".zipsnap_restore";
/// How many pre-restore snapshots survive cleanup.
const RETAINED_SNAPSHOTS: usize = 3;

/// Tunables for one restore run.
#[derive(Debug, Clone, Default)]
pub struct RestoreOptions {
    /// Re-root every destination under this directory instead of restoring
    /// to the original absolute paths.
    pub alternate_root: Option<PathBuf>,
    /// Extraction parallelism; defaults to available parallelism.
    pub workers: Option<usize>,
    /// Stop the whole run at the first extraction failure.
    pub fail_fast: bool,
    /// Back up the currently-configured paths before overwriting anything,
    /// keeping the newest [`RETAINED_SNAPSHOTS`] snapshots.
    pub snapshot_before_restore: bool,
}

/// Per-run accumulators returned to the caller.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RestoreReport {
    /// Files written back to the filesystem.
    pub restored: u64,
    /// Archive entries with no file-map key, left alone.
    pub skipped_entries: u64,
    /// Entries that failed to extract.
    pub failed_files: u64,
}

struct PoolOutcome {
    restored: u64,
    failed: u64,
}

/// Restores an archive produced by [`backup::run`].
pub fn run(archive_path: &Path, options: &RestoreOptions) -> Result<RestoreReport> {
    let reader = Arc::new(ArchiveReader::open(archive_path)?);

    let config_bytes = reader.read_entry(CONFIG_ENTRY)?;
    let config = BackupConfig::from_bytes(&config_bytes)?;

    let map_bytes = reader.read_entry(FILE_MAP_ENTRY).map_err(|e| match e {
        Error::MissingEntry(_) => Error::MissingFileMap,
        other => other,
    })?;
    let mut file_map = FileMap::from_toml(&map_bytes)?;
    if file_map.is_empty() {
        return Err(Error::MissingFileMap);
    }

    if options.snapshot_before_restore {
        snapshot_current_state(&config, &config_bytes)?;
    }

    if let Some(root) = &options.alternate_root {
        file_map.rebase(root);
    }

    let mut jobs: Vec<(String, PathBuf)> = Vec::new();
    let mut skipped_entries = 0u64;
    for name in reader.entry_names() {
        if is_metadata_entry(&name) {
            continue;
        }
        match file_map.destination(&name) {
            Some(dest) => jobs.push((name, dest)),
            None => {
                warn!("skipping archive entry with no mapped destination: {name}");
                skipped_entries += 1;
            }
        }
    }
    if jobs.is_empty() {
        return Err(Error::NothingToRestore);
    }

    info!("{} files to restore", jobs.len());
    let workers = worker_count(options.workers);

    let rt = Builder::new_multi_thread().enable_all().build()?;
    let outcome = rt.block_on(run_pool(jobs, reader, workers, options.fail_fast))?;

    info!(
        "restore complete: {} restored, {} skipped, {} failed",
        outcome.restored, skipped_entries, outcome.failed,
    );

    Ok(RestoreReport {
        restored: outcome.restored,
        skipped_entries,
        failed_files: outcome.failed,
    })
}

/// Extracts every job, at most `workers` in flight at once.
async fn run_pool(
    jobs: Vec<(String, PathBuf)>,
    reader: Arc<ArchiveReader>,
    workers: usize,
    fail_fast: bool,
) -> Result<PoolOutcome> {
    let semaphore = Arc::new(Semaphore::new(workers));
    let mut pool = JoinSet::new();

    for (name, dest) in jobs {
        let semaphore = Arc::clone(&semaphore);
        let reader = Arc::clone(&reader);
        pool.spawn(async move {
            let _permit = semaphore
                .acquire_owned()
                .await
                .map_err(|_| Error::PoolClosed)?;
            let result = tokio::task::spawn_blocking({
                let dest = dest.clone();
                move || extract_one(&reader, &name, &dest)
            })
            .await?;
            result.map_err(|e| Error::item(dest, e))
        });
    }

    let mut outcome = PoolOutcome {
        restored: 0,
        failed: 0,
    };
    while let Some(joined) = pool.join_next().await {
        match joined? {
            Ok(()) => outcome.restored += 1,
            Err(e) if fail_fast => {
                pool.shutdown().await;
                return Err(e);
            }
            Err(e) => {
                warn!("failed to restore {e}");
                outcome.failed += 1;
            }
        }
    }
    Ok(outcome)
}

/// Reads entry bytes under the reader lock, then reconstructs the file at
/// its mapped destination, overwriting whatever is there.
fn extract_one(reader: &ArchiveReader, name: &str, dest: &Path) -> Result<()> {
    let bytes = reader.read_entry(name)?;
    if let Some(parent) = dest.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }
    let mut out = File::create(dest)?;
    out.write_all(&bytes)?;
    Ok(())
}

/// Backs up the archive's own configured paths before they get overwritten.
fn snapshot_current_state(config: &BackupConfig, config_bytes: &[u8]) -> Result<()> {
    let home = dirs::home_dir().ok_or_else(|| {
        Error::InvalidConfig("cannot locate a home directory for the pre-restore snapshot".into())
    })?;
    let dir = home.join(SNAPSHOT_DIR_NAME);
    fs::create_dir_all(&dir)?;

    let stamp = Local::now().format("%Y%m%d%H%M%S");
    let output = dir.join(format!("restore_{stamp}.zip"));
    info!("backing up current files to {}", output.display());
    backup::run(config, config_bytes, &output, &BackupOptions::default())?;

    cleanup_old_snapshots(&dir, RETAINED_SNAPSHOTS);
    Ok(())
}

/// Deletes the oldest snapshots, keeping `keep`. Timestamped names sort
/// chronologically. Failures here never fail the restore.
fn cleanup_old_snapshots(dir: &Path, keep: usize) {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("cannot read snapshot directory {}: {e}", dir.display());
            return;
        }
    };

    let mut snapshots: Vec<PathBuf> = entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && path.extension().is_some_and(|ext| ext == "zip"))
        .collect();
    if snapshots.len() <= keep {
        return;
    }

    snapshots.sort();
    for old in &snapshots[..snapshots.len() - keep] {
        match fs::remove_file(old) {
            Ok(()) => info!("removed old snapshot {}", old.display()),
            Err(e) => warn!("failed to remove old snapshot {}: {e}", old.display()),
        }
    }
}
