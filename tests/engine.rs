//! End-to-end tests for the backup and restore engines.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use tempfile::tempdir;
use zipsnap::archive::{ArchiveReader, ArchiveWriter, CONFIG_ENTRY, FILE_MAP_ENTRY};
use zipsnap::backup::{self, BackupOptions};
use zipsnap::config::BackupConfig;
use zipsnap::error::Error;
use zipsnap::filemap::FileMap;
use zipsnap::restore::{self, RestoreOptions};

fn write_tree(root: &Path, files: &[(&str, &str)]) {
    for (rel, contents) in files {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }
}

fn make_config(
    paths: &[&Path],
    exclude_dirs: &[&str],
    exclude_files: &[&str],
) -> (BackupConfig, Vec<u8>) {
    let config = BackupConfig {
        backup_paths: paths.iter().map(PathBuf::from).collect(),
        exclude_dirs: exclude_dirs.iter().map(|s| s.to_string()).collect(),
        exclude_files: exclude_files.iter().map(|s| s.to_string()).collect(),
    };
    let raw = toml::to_string(&config).unwrap().into_bytes();
    (config, raw)
}

fn entry_set(archive: &Path) -> BTreeSet<String> {
    ArchiveReader::open(archive)
        .unwrap()
        .entry_names()
        .into_iter()
        .collect()
}

fn read_file_map(archive: &Path) -> FileMap {
    let reader = ArchiveReader::open(archive).unwrap();
    FileMap::from_toml(&reader.read_entry(FILE_MAP_ENTRY).unwrap()).unwrap()
}

/// Joins an absolute path under an alternate root the way a rebased
/// restore does.
fn under_root(root: &Path, absolute: &Path) -> PathBuf {
    let rel: PathBuf = absolute
        .components()
        .filter(|c| !matches!(c, std::path::Component::RootDir | std::path::Component::Prefix(_)))
        .collect();
    root.join(rel)
}

#[test]
fn round_trip_restores_identical_bytes_and_relative_paths() {
    let dir = tempdir().unwrap();
    let source = dir.path().join("a");
    write_tree(
        &source,
        &[
            ("x.txt", "first file"),
            ("sub/y.txt", "second file, nested"),
            ("sub/deeper/z.bin", "third"),
        ],
    );

    let (config, raw) = make_config(&[&source], &[], &[]);
    let archive = dir.path().join("out.zip");
    let report = backup::run(&config, &raw, &archive, &BackupOptions::default()).unwrap();
    assert_eq!(report.archived, 3);
    assert_eq!(report.total_skipped(), 0);

    let alt = dir.path().join("restored");
    let restored = restore::run(
        &archive,
        &RestoreOptions {
            alternate_root: Some(alt.clone()),
            ..Default::default()
        },
    )
    .unwrap();
    assert_eq!(restored.restored, 3);
    assert_eq!(restored.failed_files, 0);

    for rel in ["x.txt", "sub/y.txt", "sub/deeper/z.bin"] {
        let original = source.join(rel);
        let copy = under_root(&alt, &original);
        assert_eq!(
            fs::read(&copy).unwrap(),
            fs::read(&original).unwrap(),
            "mismatch for {rel}"
        );
    }
}

#[test]
fn combined_exclusions_archive_only_the_eligible_file() {
    // paths: [<dir>/a], exclude_dirs: [tmp], exclude_files: [*.log]
    let dir = tempdir().unwrap();
    let source = dir.path().join("a");
    write_tree(
        &source,
        &[("x.txt", "x"), ("tmp/y.txt", "y"), ("z.log", "z")],
    );

    let (config, raw) = make_config(&[&source], &["tmp"], &["*.log"]);
    let archive = dir.path().join("out.zip");
    let report = backup::run(&config, &raw, &archive, &BackupOptions::default()).unwrap();

    assert_eq!(report.archived, 1);
    assert_eq!(report.skipped_files, 1);
    assert_eq!(report.skipped_dirs, 1);

    let entries = entry_set(&archive);
    let expected: BTreeSet<String> = [CONFIG_ENTRY, FILE_MAP_ENTRY, "data/a/x.txt"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    assert_eq!(entries, expected);

    let map = read_file_map(&archive);
    assert_eq!(map.len(), 1);
    assert_eq!(
        map.destination("data/a/x.txt"),
        Some(source.join("x.txt"))
    );
}

#[test]
fn excluded_directory_is_pruned_not_filtered() {
    let dir = tempdir().unwrap();
    let source = dir.path().join("a");
    write_tree(
        &source,
        &[
            ("keep.txt", "k"),
            ("cache/one.txt", "1"),
            ("cache/nested/two.txt", "2"),
            ("sub/cache/three.txt", "3"),
        ],
    );

    let (config, raw) = make_config(&[&source], &["cache"], &[]);
    let archive = dir.path().join("out.zip");
    let report = backup::run(&config, &raw, &archive, &BackupOptions::default()).unwrap();

    for entry in entry_set(&archive) {
        assert!(
            !entry.split('/').any(|segment| segment == "cache"),
            "excluded directory leaked into {entry}"
        );
    }
    // two pruned subtrees, and no per-file skips from inside them
    assert_eq!(report.skipped_dirs, 2);
    assert_eq!(report.skipped_files, 0);
}

#[test]
fn glob_excluded_file_appears_nowhere() {
    let dir = tempdir().unwrap();
    let source = dir.path().join("a");
    write_tree(&source, &[("x.txt", "x"), ("trace.tmp", "t"), ("sub/b.tmp", "b")]);

    let (config, raw) = make_config(&[&source], &[], &["*.tmp"]);
    let archive = dir.path().join("out.zip");
    backup::run(&config, &raw, &archive, &BackupOptions::default()).unwrap();

    let entries = entry_set(&archive);
    assert!(entries.iter().all(|e| !e.ends_with(".tmp")));

    let map = read_file_map(&archive);
    assert!(map.iter().all(|(k, _)| !k.ends_with(".tmp")));
}

#[test]
fn file_map_is_a_bijection_over_content_entries() {
    let dir = tempdir().unwrap();
    let source = dir.path().join("a");
    write_tree(
        &source,
        &[("x.txt", "x"), ("sub/y.txt", "y"), ("sub/z.txt", "z")],
    );

    let (config, raw) = make_config(&[&source], &[], &[]);
    let archive = dir.path().join("out.zip");
    backup::run(&config, &raw, &archive, &BackupOptions::default()).unwrap();

    let content: BTreeSet<String> = entry_set(&archive)
        .into_iter()
        .filter(|e| e != CONFIG_ENTRY && e != FILE_MAP_ENTRY)
        .collect();
    let keys: BTreeSet<String> = read_file_map(&archive)
        .iter()
        .map(|(k, _)| k.clone())
        .collect();
    assert_eq!(content, keys);
}

#[test]
fn restoring_twice_under_different_roots_gives_independent_trees() {
    let dir = tempdir().unwrap();
    let source = dir.path().join("a");
    write_tree(&source, &[("x.txt", "x"), ("sub/y.txt", "y")]);

    let (config, raw) = make_config(&[&source], &[], &[]);
    let archive = dir.path().join("out.zip");
    backup::run(&config, &raw, &archive, &BackupOptions::default()).unwrap();

    let first = dir.path().join("first");
    let second = dir.path().join("second");
    for root in [&first, &second] {
        let report = restore::run(
            &archive,
            &RestoreOptions {
                alternate_root: Some(root.clone()),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(report.restored, 2);
    }

    for root in [&first, &second] {
        for rel in ["x.txt", "sub/y.txt"] {
            let copy = under_root(root, &source.join(rel));
            assert_eq!(fs::read(&copy).unwrap(), fs::read(source.join(rel)).unwrap());
        }
    }
}

#[test]
fn worker_count_does_not_change_archive_membership() {
    let dir = tempdir().unwrap();
    let source = dir.path().join("a");
    let files: Vec<(String, String)> = (0..40)
        .map(|i| (format!("sub{}/f{}.txt", i % 5, i), format!("contents {i}")))
        .collect();
    let borrowed: Vec<(&str, &str)> = files
        .iter()
        .map(|(a, b)| (a.as_str(), b.as_str()))
        .collect();
    write_tree(&source, &borrowed);

    let (config, raw) = make_config(&[&source], &[], &[]);

    let serial = dir.path().join("serial.zip");
    let parallel = dir.path().join("parallel.zip");
    backup::run(
        &config,
        &raw,
        &serial,
        &BackupOptions {
            workers: Some(1),
            ..Default::default()
        },
    )
    .unwrap();
    backup::run(
        &config,
        &raw,
        &parallel,
        &BackupOptions {
            workers: Some(8),
            ..Default::default()
        },
    )
    .unwrap();

    assert_eq!(entry_set(&serial), entry_set(&parallel));
    assert_eq!(read_file_map(&serial), read_file_map(&parallel));
}

#[test]
fn restore_without_file_map_is_fatal() {
    let dir = tempdir().unwrap();
    let archive = dir.path().join("foreign.zip");
    let writer = ArchiveWriter::create(&archive).unwrap();
    writer
        .write_entry(CONFIG_ENTRY, b"backup_paths = [\"/data/a\"]\n")
        .unwrap();
    writer.write_entry("data/a/x.txt", b"x").unwrap();
    writer.finish().unwrap();

    let err = restore::run(&archive, &RestoreOptions::default()).unwrap_err();
    assert!(matches!(err, Error::MissingFileMap));
}

#[test]
fn restore_with_empty_file_map_is_fatal() {
    let dir = tempdir().unwrap();
    let archive = dir.path().join("empty-map.zip");
    let writer = ArchiveWriter::create(&archive).unwrap();
    writer
        .write_entry(CONFIG_ENTRY, b"backup_paths = [\"/data/a\"]\n")
        .unwrap();
    writer.write_entry(FILE_MAP_ENTRY, b"").unwrap();
    writer.finish().unwrap();

    let err = restore::run(&archive, &RestoreOptions::default()).unwrap_err();
    assert!(matches!(err, Error::MissingFileMap));
}

#[test]
fn unmapped_archive_entries_are_skipped_not_fatal() {
    let dir = tempdir().unwrap();
    let source = dir.path().join("a");
    write_tree(&source, &[("x.txt", "x")]);

    let (config, raw) = make_config(&[&source], &[], &[]);
    let archive = dir.path().join("out.zip");
    backup::run(&config, &raw, &archive, &BackupOptions::default()).unwrap();

    // splice a foreign entry into a rebuilt archive alongside the real ones
    let reader = ArchiveReader::open(&archive).unwrap();
    let tampered = dir.path().join("tampered.zip");
    let writer = ArchiveWriter::create(&tampered).unwrap();
    for name in reader.entry_names() {
        writer
            .write_entry(&name, &reader.read_entry(&name).unwrap())
            .unwrap();
    }
    writer.write_entry("data/ghost.bin", b"not mapped").unwrap();
    writer.finish().unwrap();

    let alt = dir.path().join("restored");
    let report = restore::run(
        &tampered,
        &RestoreOptions {
            alternate_root: Some(alt.clone()),
            ..Default::default()
        },
    )
    .unwrap();

    assert_eq!(report.restored, 1);
    assert_eq!(report.skipped_entries, 1);
    assert!(!under_root(&alt, Path::new("/ghost.bin")).exists());
}

#[cfg(unix)]
#[test]
fn unreadable_source_is_skipped_by_default_and_fatal_with_fail_fast() {
    let dir = tempdir().unwrap();
    let source = dir.path().join("a");
    write_tree(&source, &[("x.txt", "x"), ("y.txt", "y")]);
    // dangling symlink: enumerated as a file, fails to open in the worker
    std::os::unix::fs::symlink(dir.path().join("gone"), source.join("broken")).unwrap();

    let (config, raw) = make_config(&[&source], &[], &[]);

    let archive = dir.path().join("skip.zip");
    let report = backup::run(&config, &raw, &archive, &BackupOptions::default()).unwrap();
    assert_eq!(report.archived, 2);
    assert_eq!(report.failed_files, 1);
    let map = read_file_map(&archive);
    assert_eq!(map.len(), 2);
    assert_eq!(map.destination("data/a/broken"), None);

    let strict = dir.path().join("strict.zip");
    let err = backup::run(
        &config,
        &raw,
        &strict,
        &BackupOptions {
            fail_fast: true,
            ..Default::default()
        },
    )
    .unwrap_err();
    assert!(matches!(err, Error::ItemFailed { .. }));
}

#[test]
fn extraction_failure_is_counted_by_default_and_fatal_with_fail_fast() {
    let dir = tempdir().unwrap();
    let source = dir.path().join("a");
    write_tree(&source, &[("x.txt", "x"), ("sub/y.txt", "y")]);

    let (config, raw) = make_config(&[&source], &[], &[]);
    let archive = dir.path().join("out.zip");
    backup::run(&config, &raw, &archive, &BackupOptions::default()).unwrap();

    // the rebased destination of sub/y.txt needs sub/ as a directory;
    // planting a file there makes that one extraction fail
    let alt = dir.path().join("blocked");
    let blocked_parent = under_root(&alt, &source.join("sub"));
    fs::create_dir_all(blocked_parent.parent().unwrap()).unwrap();
    fs::write(&blocked_parent, "in the way").unwrap();

    let report = restore::run(
        &archive,
        &RestoreOptions {
            alternate_root: Some(alt.clone()),
            ..Default::default()
        },
    )
    .unwrap();
    assert_eq!(report.restored, 1);
    assert_eq!(report.failed_files, 1);

    let err = restore::run(
        &archive,
        &RestoreOptions {
            alternate_root: Some(alt),
            fail_fast: true,
            ..Default::default()
        },
    )
    .unwrap_err();
    assert!(matches!(err, Error::ItemFailed { .. }));
}

#[test]
fn single_file_roots_are_archived_under_their_basename() {
    let dir = tempdir().unwrap();
    let file = dir.path().join("notes.txt");
    fs::write(&file, "standalone").unwrap();

    let (config, raw) = make_config(&[&file], &[], &[]);
    let archive = dir.path().join("out.zip");
    backup::run(&config, &raw, &archive, &BackupOptions::default()).unwrap();

    assert!(entry_set(&archive).contains("data/notes.txt"));

    let alt = dir.path().join("restored");
    restore::run(
        &archive,
        &RestoreOptions {
            alternate_root: Some(alt.clone()),
            ..Default::default()
        },
    )
    .unwrap();
    assert_eq!(
        fs::read(under_root(&alt, &file)).unwrap(),
        b"standalone"
    );
}

#[test]
fn embedded_config_round_trips_byte_for_byte() {
    let dir = tempdir().unwrap();
    let source = dir.path().join("a");
    write_tree(&source, &[("x.txt", "x")]);

    // raw bytes with a comment that serde would never re-emit
    let raw = format!(
        "# point-in-time capture\nbackup_paths = [{:?}]\n",
        source.to_string_lossy()
    )
    .into_bytes();
    let config = BackupConfig::from_bytes(&raw).unwrap();

    let archive = dir.path().join("out.zip");
    backup::run(&config, &raw, &archive, &BackupOptions::default()).unwrap();

    let reader = ArchiveReader::open(&archive).unwrap();
    assert_eq!(reader.read_entry(CONFIG_ENTRY).unwrap(), raw);
}
