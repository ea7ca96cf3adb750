//! Command-line interface definition for zipsnap.
//!
//! This module defines the CLI commands and their arguments, and the thin
//! handlers that turn parsed arguments into engine calls and a user-facing
//! summary line.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::Local;
use clap::{Parser, Subcommand};

use crate::archive::{self, ArchiveReader};
use crate::backup::BackupOptions;
use crate::config::BackupConfig;
use crate::restore::RestoreOptions;

/// Command-line interface definition for zipsnap.
#[derive(Parser)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub commands: Option<Commands>,
    /// Only log errors.
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

/// Supported zipsnap commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Capture the configured paths into a new archive.
    Backup {
        /// Configuration file path.
        #[arg(short, long, default_value = "config.toml")]
        config: PathBuf,
        /// Archive output path. Defaults to backup_<timestamp>.zip.
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Worker count. Defaults to available parallelism.
        #[arg(short, long)]
        workers: Option<usize>,
        /// Abort the run at the first per-file failure instead of
        /// skipping and counting it.
        #[arg(long)]
        fail_fast: bool,
    },
    /// Restore an archive to its mapped destinations.
    Restore {
        /// Archive to restore from.
        #[arg(short, long)]
        input: PathBuf,
        /// Restore under this root instead of the original absolute paths.
        #[arg(short, long)]
        root_dir: Option<PathBuf>,
        /// Extraction parallelism. Defaults to available parallelism.
        #[arg(short, long)]
        workers: Option<usize>,
        /// Abort the run at the first extraction failure.
        #[arg(long)]
        fail_fast: bool,
        /// Back up the currently configured paths before overwriting them.
        #[arg(short = 'b', long)]
        backup_before_restore: bool,
    },
    /// Inspect the metadata embedded in an archive.
    Config {
        /// Archive to inspect.
        #[arg(short = 'b', long)]
        backup: PathBuf,
        /// Metadata entry to show.
        #[arg(short, long, default_value = archive::CONFIG_ENTRY)]
        view: String,
        /// Write the entry to this path instead of printing it.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

/// Runs a backup and prints the end-of-run summary.
pub fn backup(
    config_path: &Path,
    output: Option<PathBuf>,
    workers: Option<usize>,
    fail_fast: bool,
) -> anyhow::Result<()> {
    let (config, raw) = BackupConfig::load(config_path)
        .with_context(|| format!("failed to load config {}", config_path.display()))?;
    let output = output.unwrap_or_else(default_output_name);

    let options = BackupOptions { workers, fail_fast };
    let report = crate::backup::run(&config, &raw, &output, &options)?;

    println!(
        "Backup complete: {} ({} files archived, {} files skipped, {} directories skipped)",
        output.display(),
        report.archived,
        report.skipped_files + report.failed_files,
        report.skipped_dirs,
    );
    if report.failed_roots > 0 {
        eprintln!("{} backup path(s) could not be traversed", report.failed_roots);
    }
    Ok(())
}

/// Runs a restore and prints the end-of-run summary.
pub fn restore(
    input: &Path,
    root_dir: Option<PathBuf>,
    workers: Option<usize>,
    fail_fast: bool,
    backup_before_restore: bool,
) -> anyhow::Result<()> {
    let options = RestoreOptions {
        alternate_root: root_dir,
        workers,
        fail_fast,
        snapshot_before_restore: backup_before_restore,
    };
    let report = crate::restore::run(input, &options)?;

    println!(
        "Restore complete: {} files restored, {} entries skipped, {} failed",
        report.restored, report.skipped_entries, report.failed_files,
    );
    Ok(())
}

/// Prints or exports a metadata entry from an existing archive.
pub fn config(backup_path: &Path, entry: &str, output: Option<PathBuf>) -> anyhow::Result<()> {
    let reader = ArchiveReader::open(backup_path)
        .with_context(|| format!("failed to open archive {}", backup_path.display()))?;
    let data = reader.read_entry(entry)?;

    match output {
        Some(path) => {
            fs::write(&path, &data).with_context(|| format!("failed to write {}", path.display()))?;
            println!("{entry} exported to {}", path.display());
        }
        None => print!("{}", String::from_utf8_lossy(&data)),
    }
    Ok(())
}

fn default_output_name() -> PathBuf {
    PathBuf::from(format!("backup_{}.zip", Local::now().format("%Y%m%d%H%M%S")))
}
