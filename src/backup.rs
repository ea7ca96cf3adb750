//! The backup engine.
//!
//! Enumerated file tasks flow through a bounded queue into a fixed pool of
//! blocking workers. Each worker streams its file into the shared archive
//! writer and records the entry in the file map; the archive mutex and the
//! map mutex are the only shared state, and they are independent critical
//! sections. The file map entry is written only after the queue is closed
//! and every worker has finished, so content entries always precede it.

use std::num::NonZeroUsize;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use tokio::runtime::Builder;
use tokio::sync::mpsc::{self, Receiver};
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::archive::{ArchiveWriter, CONFIG_ENTRY, FILE_MAP_ENTRY};
use crate::config::BackupConfig;
use crate::error::{Error, Result};
use crate::filemap::FileMap;
use crate::filter::ExclusionFilter;
use crate::walker::{self, FileTask};

/// Queue capacity. Large enough that the enumerator rarely stalls behind
/// the workers, without being unbounded.
const TASK_QUEUE_CAPACITY: usize = 1024;

/// Tunables for one backup run.
#[derive(Debug, Clone, Default)]
pub struct BackupOptions {
    /// Worker count; defaults to available parallelism.
    pub workers: Option<usize>,
    /// Stop the whole run at the first per-file failure instead of
    /// logging, counting, and continuing.
    pub fail_fast: bool,
}

/// Per-run accumulators returned to the caller.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BackupReport {
    /// Files successfully written to the archive.
    pub archived: u64,
    /// Files excluded by the filter.
    pub skipped_files: u64,
    /// Directory subtrees pruned by the filter.
    pub skipped_dirs: u64,
    /// Files that failed to open, read, or write.
    pub failed_files: u64,
    /// Configured roots that could not be traversed.
    pub failed_roots: u64,
}

impl BackupReport {
    pub fn total_skipped(&self) -> u64 {
        self.skipped_files + self.skipped_dirs + self.failed_files
    }
}

struct PoolOutcome {
    archived: u64,
    failed: u64,
}

#[derive(Default)]
struct WorkerStats {
    archived: u64,
    failed: u64,
}

/// Captures the configured paths into a new archive at `output`.
///
/// `config_bytes` is the raw configuration file, embedded verbatim as the
/// first metadata entry. Fatal errors (unwritable output, metadata write
/// failures) abort the run; per-file errors follow `options.fail_fast`.
pub fn run(
    config: &BackupConfig,
    config_bytes: &[u8],
    output: &Path,
    options: &BackupOptions,
) -> Result<BackupReport> {
    let filter = ExclusionFilter::new(&config.exclude_dirs, &config.exclude_files);

    let writer = Arc::new(ArchiveWriter::create(output)?);
    writer.write_entry(CONFIG_ENTRY, config_bytes)?;

    let enumeration = walker::enumerate(&config.backup_paths, &filter);
    info!("{} files to back up", enumeration.tasks.len());

    let file_map = Arc::new(Mutex::new(FileMap::new()));
    let workers = worker_count(options.workers);

    let rt = Builder::new_multi_thread().enable_all().build()?;
    let outcome = rt.block_on(run_pool(
        enumeration.tasks,
        Arc::clone(&writer),
        Arc::clone(&file_map),
        workers,
        options.fail_fast,
    ))?;

    let map = Arc::into_inner(file_map)
        .expect("workers still hold the file map")
        .into_inner()
        .unwrap();
    writer.write_entry(FILE_MAP_ENTRY, &map.to_toml()?)?;

    Arc::into_inner(writer)
        .expect("workers still hold the archive writer")
        .finish()?;

    info!(
        "backup complete: {} archived, {} skipped, {} failed",
        outcome.archived,
        enumeration.skipped_files + enumeration.skipped_dirs,
        outcome.failed,
    );

    Ok(BackupReport {
        archived: outcome.archived,
        skipped_files: enumeration.skipped_files,
        skipped_dirs: enumeration.skipped_dirs,
        failed_files: outcome.failed,
        failed_roots: enumeration.failed_roots,
    })
}

/// Drives the bounded queue and worker pool to completion.
async fn run_pool(
    tasks: Vec<FileTask>,
    writer: Arc<ArchiveWriter>,
    file_map: Arc<Mutex<FileMap>>,
    workers: usize,
    fail_fast: bool,
) -> Result<PoolOutcome> {
    let (tx, rx) = mpsc::channel::<FileTask>(TASK_QUEUE_CAPACITY);
    let rx = Arc::new(Mutex::new(rx));
    let cancelled = Arc::new(AtomicBool::new(false));

    let mut pool = JoinSet::new();
    for _ in 0..workers {
        let rx = Arc::clone(&rx);
        let writer = Arc::clone(&writer);
        let file_map = Arc::clone(&file_map);
        let cancelled = Arc::clone(&cancelled);
        pool.spawn_blocking(move || worker_loop(&rx, &writer, &file_map, &cancelled, fail_fast));
    }

    // The feeder owns the sender; dropping it on return closes the queue.
    // A send fails only once every worker has exited, which ends feeding
    // early on fail-fast cancellation.
    let feeder_cancelled = Arc::clone(&cancelled);
    let feeder = tokio::task::spawn_blocking(move || {
        for task in tasks {
            if feeder_cancelled.load(Ordering::Relaxed) {
                break;
            }
            if tx.blocking_send(task).is_err() {
                break;
            }
        }
    });
    feeder.await?;

    let mut outcome = PoolOutcome {
        archived: 0,
        failed: 0,
    };
    let mut first_error = None;
    while let Some(joined) = pool.join_next().await {
        match joined? {
            Ok(stats) => {
                outcome.archived += stats.archived;
                outcome.failed += stats.failed;
            }
            Err(e) => {
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
        }
    }

    match first_error {
        Some(e) => Err(e),
        None => Ok(outcome),
    }
}

/// One worker: dequeue, archive, record, repeat until the queue drains.
fn worker_loop(
    rx: &Mutex<Receiver<FileTask>>,
    writer: &ArchiveWriter,
    file_map: &Mutex<FileMap>,
    cancelled: &AtomicBool,
    fail_fast: bool,
) -> Result<WorkerStats> {
    let mut stats = WorkerStats::default();
    loop {
        if cancelled.load(Ordering::Relaxed) {
            break;
        }
        let task = { rx.lock().unwrap().blocking_recv() };
        let Some(task) = task else { break };

        match archive_one(&task, writer, file_map) {
            Ok(()) => stats.archived += 1,
            Err(e) if fail_fast => {
                cancelled.store(true, Ordering::Relaxed);
                return Err(Error::item(task.source, e));
            }
            Err(e) => {
                warn!("failed to back up {}: {e}", task.source.display());
                stats.failed += 1;
            }
        }
    }
    Ok(stats)
}

fn archive_one(task: &FileTask, writer: &ArchiveWriter, file_map: &Mutex<FileMap>) -> Result<()> {
    writer.write_file(&task.entry_name, &task.source)?;
    file_map
        .lock()
        .unwrap()
        .insert(task.entry_name.clone(), &task.source);
    Ok(())
}

/// Pool size: the caller's override if positive, otherwise available
/// hardware parallelism.
pub(crate) fn worker_count(requested: Option<usize>) -> usize {
    requested
        .filter(|&n| n > 0)
        .unwrap_or_else(|| thread::available_parallelism().map(NonZeroUsize::get).unwrap_or(1))
}
