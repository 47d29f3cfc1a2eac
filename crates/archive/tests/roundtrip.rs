//! Create/extract round trips through the public engine API

#![allow(clippy::unwrap_used, clippy::expect_used)]

use cachemover_archive::{
    Archive, ArchiveOptions, EntryKind, Error, MetadataStep, MetadataWriter, Naming, reader,
};
use filetime::FileTime;
use std::fs;
use std::io;
use std::path::Path;
use tempfile::TempDir;

fn engine(root: &Path, preserve: bool) -> Archive {
    Archive::new(ArchiveOptions::new(root).with_preserve_metadata(preserve))
}

fn sample_tree(root: &Path) {
    fs::create_dir_all(root.join("cache/nested/deeper")).unwrap();
    fs::create_dir_all(root.join("cache/empty")).unwrap();
    fs::write(root.join("cache/top.txt"), b"top level").unwrap();
    fs::write(root.join("cache/nested/mid.bin"), vec![0xAB_u8; 4096]).unwrap();
    fs::write(root.join("cache/nested/deeper/leaf.txt"), b"leaf").unwrap();
}

// ============================================================================
// Content round trips
// ============================================================================

#[test]
fn test_content_round_trip_with_and_without_metadata() {
    for preserve in [false, true] {
        let src = TempDir::new().unwrap();
        let dst = TempDir::new().unwrap();
        sample_tree(src.path());
        let archive = engine(src.path(), preserve);

        let mut buffer = Vec::new();
        let created = archive
            .create(&[src.path().join("cache")], &mut buffer, Naming::RootRelative)
            .unwrap();
        assert_eq!(created.bytes_written, 9 + 4096 + 4);
        // cache, empty, nested, deeper: 4 directories plus 3 files
        assert_eq!(created.entries, 7);

        let extracted = archive.extract(dst.path(), buffer.as_slice()).unwrap();
        assert_eq!(extracted.bytes_written, created.bytes_written);
        assert_eq!(extracted.entries, 7);

        let out = dst.path().join("cache");
        assert_eq!(fs::read(out.join("top.txt")).unwrap(), b"top level");
        assert_eq!(fs::read(out.join("nested/mid.bin")).unwrap(), vec![0xAB_u8; 4096]);
        assert_eq!(fs::read(out.join("nested/deeper/leaf.txt")).unwrap(), b"leaf");
        assert!(out.join("empty").is_dir());
    }
}

#[test]
fn test_multiple_sources_share_one_archive() {
    let src = TempDir::new().unwrap();
    let dst = TempDir::new().unwrap();
    fs::create_dir(src.path().join("one")).unwrap();
    fs::create_dir(src.path().join("two")).unwrap();
    fs::write(src.path().join("one/a"), b"a").unwrap();
    fs::write(src.path().join("two/b"), b"bb").unwrap();
    let archive = engine(src.path(), false);

    let mut buffer = Vec::new();
    let sources = [src.path().join("one"), src.path().join("two")];
    let created = archive
        .create(&sources, &mut buffer, Naming::RootRelative)
        .unwrap();
    assert_eq!(created.bytes_written, 3);

    archive.extract(dst.path(), buffer.as_slice()).unwrap();
    assert_eq!(fs::read(dst.path().join("one/a")).unwrap(), b"a");
    assert_eq!(fs::read(dst.path().join("two/b")).unwrap(), b"bb");
}

#[test]
fn test_as_given_naming_keeps_absolute_paths() {
    let src = TempDir::new().unwrap();
    let file = src.path().join("abs.txt");
    fs::write(&file, b"x").unwrap();
    let archive = engine(Path::new("/unrelated"), false);

    let mut buffer = Vec::new();
    archive.create(&[&file], &mut buffer, Naming::AsGiven).unwrap();

    let mut names = Vec::new();
    reader::read_entries(buffer.as_slice(), |entry, _| {
        names.push(entry.name.clone());
        Ok(())
    })
    .unwrap();
    assert_eq!(names, vec![file.to_str().unwrap().to_string()]);
}

// ============================================================================
// Metadata preservation
// ============================================================================

#[cfg(unix)]
#[test]
fn test_hello_world_keeps_mode_and_mtime() {
    use std::os::unix::fs::PermissionsExt;

    let src = TempDir::new().unwrap();
    let dst = TempDir::new().unwrap();
    let file = src.path().join("testfile.txt");
    fs::write(&file, "Hello, World!").unwrap();
    fs::set_permissions(&file, fs::Permissions::from_mode(0o644)).unwrap();
    // 2023-01-01T12:00:00Z
    let mtime = FileTime::from_unix_time(1_672_574_400, 0);
    filetime::set_file_mtime(&file, mtime).unwrap();

    let archive = engine(src.path(), true);
    let mut buffer = Vec::new();
    archive.create(&[&file], &mut buffer, Naming::RootRelative).unwrap();
    archive.extract(dst.path(), buffer.as_slice()).unwrap();

    let restored = dst.path().join("testfile.txt");
    let metadata = fs::metadata(&restored).unwrap();
    assert_eq!(FileTime::from_last_modification_time(&metadata), mtime);
    assert_eq!(metadata.permissions().mode() & 0o777, 0o644);
    assert_eq!(fs::read_to_string(&restored).unwrap(), "Hello, World!");
}

#[cfg(unix)]
#[test]
fn test_restrictive_modes_and_sub_second_times() {
    use std::os::unix::fs::PermissionsExt;

    let src = TempDir::new().unwrap();
    let dst = TempDir::new().unwrap();
    let dir = src.path().join("private");
    fs::create_dir(&dir).unwrap();
    fs::write(dir.join("key"), b"secret").unwrap();
    fs::set_permissions(dir.join("key"), fs::Permissions::from_mode(0o600)).unwrap();
    let mtime = FileTime::from_unix_time(1_600_000_000, 123_456_789);
    filetime::set_file_mtime(dir.join("key"), mtime).unwrap();
    fs::set_permissions(&dir, fs::Permissions::from_mode(0o700)).unwrap();

    let archive = engine(src.path(), true);
    let mut buffer = Vec::new();
    archive.create(&[&dir], &mut buffer, Naming::RootRelative).unwrap();
    archive.extract(dst.path(), buffer.as_slice()).unwrap();

    let key = fs::metadata(dst.path().join("private/key")).unwrap();
    assert_eq!(key.permissions().mode() & 0o777, 0o600);
    assert_eq!(FileTime::from_last_modification_time(&key), mtime);
    let restored_dir = fs::metadata(dst.path().join("private")).unwrap();
    assert_eq!(restored_dir.permissions().mode() & 0o777, 0o700);
}

#[cfg(unix)]
#[test]
fn test_true_access_time_is_archived() {
    let src = TempDir::new().unwrap();
    let dst = TempDir::new().unwrap();
    let file = src.path().join("touched");
    fs::write(&file, b"t").unwrap();
    let mtime = FileTime::from_unix_time(1_500_000_000, 0);
    let atime = FileTime::from_unix_time(1_700_000_000, 0);
    filetime::set_file_times(&file, atime, mtime).unwrap();

    let archive = engine(src.path(), true);
    let mut buffer = Vec::new();
    archive.create(&[&file], &mut buffer, Naming::RootRelative).unwrap();

    let mut seen = Vec::new();
    reader::read_entries(buffer.as_slice(), |entry, _| {
        seen.push(entry.clone());
        Ok(())
    })
    .unwrap();
    assert_eq!(seen[0].modified, mtime);
    assert_eq!(seen[0].accessed, Some(atime));
    assert!(seen[0].changed.is_some());

    archive.extract(dst.path(), buffer.as_slice()).unwrap();
    let restored = fs::metadata(dst.path().join("touched")).unwrap();
    assert_eq!(FileTime::from_last_access_time(&restored), atime);
}

#[test]
fn test_directory_times_survive_nested_extraction() {
    let src = TempDir::new().unwrap();
    let dst = TempDir::new().unwrap();
    let a = src.path().join("a");
    let b = a.join("b");
    let c = b.join("c");
    fs::create_dir_all(&c).unwrap();
    fs::write(c.join("file.txt"), b"inside").unwrap();

    let times = [
        (&c, FileTime::from_unix_time(1_300_000_000, 0)),
        (&b, FileTime::from_unix_time(1_200_000_000, 0)),
        (&a, FileTime::from_unix_time(1_100_000_000, 0)),
    ];
    for (dir, time) in &times {
        filetime::set_file_times(dir, *time, *time).unwrap();
    }

    let archive = engine(src.path(), true);
    let mut buffer = Vec::new();
    archive.create(&[&a], &mut buffer, Naming::RootRelative).unwrap();
    archive.extract(dst.path(), buffer.as_slice()).unwrap();

    for (dir, time) in &times {
        let relative = dir.strip_prefix(src.path()).unwrap();
        let restored = fs::metadata(dst.path().join(relative)).unwrap();
        assert_eq!(
            FileTime::from_last_modification_time(&restored),
            *time,
            "mtime of {}",
            relative.display()
        );
    }
}

// ============================================================================
// Header format switch
// ============================================================================

#[test]
fn test_format_follows_metadata_preservation() {
    let src = TempDir::new().unwrap();
    sample_tree(src.path());

    for preserve in [false, true] {
        let archive = engine(src.path(), preserve);
        let mut buffer = Vec::new();
        archive
            .create(&[src.path().join("cache")], &mut buffer, Naming::RootRelative)
            .unwrap();

        let mut tar = tar::Archive::new(buffer.as_slice());
        let mut count = 0;
        for entry in tar.entries().unwrap() {
            let mut entry = entry.unwrap();
            let has_pax = entry.pax_extensions().unwrap().is_some();
            assert_eq!(has_pax, preserve, "{:?}", entry.path().unwrap());
            if preserve {
                assert!(entry.header().as_ustar().is_some());
            } else {
                assert!(entry.header().as_gnu().is_some());
            }
            count += 1;
        }
        assert_eq!(count, 7);
    }
}

// ============================================================================
// Links
// ============================================================================

#[cfg(unix)]
#[test]
fn test_symlink_target_is_preserved_exactly() {
    let src = TempDir::new().unwrap();
    let dst = TempDir::new().unwrap();
    let dir = src.path().join("links");
    fs::create_dir(&dir).unwrap();
    // Dangling on purpose: the target is never read
    std::os::unix::fs::symlink("../../does/not/exist", dir.join("dangling")).unwrap();

    let archive = engine(src.path(), true);
    let mut buffer = Vec::new();
    let created = archive.create(&[&dir], &mut buffer, Naming::RootRelative).unwrap();
    assert_eq!(created.bytes_written, 0);

    archive.extract(dst.path(), buffer.as_slice()).unwrap();
    let target = fs::read_link(dst.path().join("links/dangling")).unwrap();
    assert_eq!(target, Path::new("../../does/not/exist"));
}

#[cfg(unix)]
#[test]
fn test_skip_symlinks_omits_links() {
    let src = TempDir::new().unwrap();
    let dst = TempDir::new().unwrap();
    let dir = src.path().join("links");
    fs::create_dir(&dir).unwrap();
    fs::write(dir.join("real"), b"r").unwrap();
    std::os::unix::fs::symlink("real", dir.join("alias")).unwrap();

    let archive = Archive::new(ArchiveOptions::new(src.path()).with_skip_symlinks(true));
    let mut buffer = Vec::new();
    let created = archive.create(&[&dir], &mut buffer, Naming::RootRelative).unwrap();
    assert_eq!(created.entries, 2);

    archive.extract(dst.path(), buffer.as_slice()).unwrap();
    assert!(dst.path().join("links/real").exists());
    assert!(fs::symlink_metadata(dst.path().join("links/alias")).is_err());
}

#[test]
fn test_hard_link_entries_are_restored() {
    let dst = TempDir::new().unwrap();
    let mut builder = tar::Builder::new(Vec::new());

    let mut header = tar::Header::new_gnu();
    header.set_path("data/original").unwrap();
    header.set_size(5);
    header.set_mode(0o644);
    header.set_cksum();
    builder.append(&header, &b"hello"[..]).unwrap();

    let mut link = tar::Header::new_gnu();
    link.set_path("data/alias").unwrap();
    link.set_entry_type(tar::EntryType::Link);
    link.set_link_name("data/original").unwrap();
    link.set_size(0);
    link.set_cksum();
    builder.append(&link, io::empty()).unwrap();
    let buffer = builder.into_inner().unwrap();

    let archive = engine(dst.path(), false);
    let extracted = archive.extract(dst.path(), buffer.as_slice()).unwrap();
    assert_eq!(extracted.entries, 2);
    assert_eq!(fs::read(dst.path().join("data/alias")).unwrap(), b"hello");
}

// ============================================================================
// Failures
// ============================================================================

struct Unprivileged;

impl MetadataWriter for Unprivileged {
    fn set_mode(&self, _path: &Path, _mode: u32) -> io::Result<()> {
        Err(io::Error::from(io::ErrorKind::PermissionDenied))
    }

    fn set_times(&self, path: &Path, accessed: FileTime, modified: FileTime) -> io::Result<()> {
        filetime::set_file_times(path, accessed, modified)
    }

    fn set_owner(&self, _path: &Path, _uid: u64, _gid: u64) -> io::Result<()> {
        Err(io::Error::from(io::ErrorKind::PermissionDenied))
    }

    fn set_symlink_owner(&self, _path: &Path, _uid: u64, _gid: u64) -> io::Result<()> {
        Err(io::Error::from(io::ErrorKind::PermissionDenied))
    }
}

#[test]
fn test_denied_metadata_still_restores_content() {
    let src = TempDir::new().unwrap();
    let dst = TempDir::new().unwrap();
    sample_tree(src.path());
    let options = ArchiveOptions::new(src.path()).with_preserve_metadata(true);

    let mut buffer = Vec::new();
    let created = Archive::new(options.clone())
        .create(&[src.path().join("cache")], &mut buffer, Naming::RootRelative)
        .unwrap();

    let degraded = Archive::with_metadata_writer(options, Unprivileged);
    let extracted = degraded.extract(dst.path(), buffer.as_slice()).unwrap();

    assert_eq!(extracted.bytes_written, created.bytes_written);
    assert_eq!(
        fs::read(dst.path().join("cache/nested/deeper/leaf.txt")).unwrap(),
        b"leaf"
    );
    assert!(!extracted.metadata_warnings.is_empty());
    assert!(
        extracted
            .metadata_warnings
            .iter()
            .all(|w| matches!(w.step, MetadataStep::Mode | MetadataStep::Owner))
    );
    // Every file and directory reports its denied mode change
    let mode_warnings = extracted
        .metadata_warnings
        .iter()
        .filter(|w| w.step == MetadataStep::Mode)
        .count();
    assert_eq!(mode_warnings, 7);
}

#[test]
fn test_missing_source_reports_partial_progress() {
    let src = TempDir::new().unwrap();
    let present = src.path().join("present.txt");
    fs::write(&present, b"12345").unwrap();
    let archive = engine(src.path(), false);

    let sources = [present, src.path().join("missing")];
    let mut buffer = Vec::new();
    let aborted = archive
        .create(&sources, &mut buffer, Naming::RootRelative)
        .unwrap_err();

    assert_eq!(aborted.bytes_written, 5);
    assert!(matches!(aborted.source, Error::SourceUnreachable { .. }));
    // Header and payload of the first file, without end-of-archive blocks
    assert_eq!(buffer.len(), 1024);
    assert!(buffer[512..].starts_with(b"12345"));
}

#[test]
fn test_truncated_archive_is_not_readable() {
    let src = TempDir::new().unwrap();
    let dst = TempDir::new().unwrap();
    fs::write(src.path().join("big"), vec![1u8; 2000]).unwrap();
    let archive = engine(src.path(), false);

    let mut buffer = Vec::new();
    archive
        .create(&[src.path().join("big")], &mut buffer, Naming::RootRelative)
        .unwrap();
    buffer.truncate(512 + 1000);

    let aborted = archive.extract(dst.path(), buffer.as_slice()).unwrap_err();
    assert_eq!(aborted.bytes_written, 1000);
    assert!(matches!(aborted.source, Error::ArchiveNotReadable { .. }));
}

#[test]
fn test_unknown_entry_type_aborts_extraction() {
    let dst = TempDir::new().unwrap();
    let mut header = tar::Header::new_gnu();
    header.set_path("mystery").unwrap();
    header.set_entry_type(tar::EntryType::new(b'Z'));
    header.set_size(0);
    header.set_cksum();
    let mut builder = tar::Builder::new(Vec::new());
    builder.append(&header, io::empty()).unwrap();
    let buffer = builder.into_inner().unwrap();

    let aborted = engine(dst.path(), false)
        .extract(dst.path(), buffer.as_slice())
        .unwrap_err();
    match aborted.source {
        Error::UnsupportedEntryType { path, .. } => assert_eq!(path, "mystery"),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn test_global_header_is_ignored() {
    let dst = TempDir::new().unwrap();
    let mut builder = tar::Builder::new(Vec::new());

    let comment = b"18 comment=cached\n";
    let mut global = tar::Header::new_ustar();
    global.set_path("pax_global_header").unwrap();
    global.set_entry_type(tar::EntryType::XGlobalHeader);
    global.set_size(comment.len() as u64);
    global.set_cksum();
    builder.append(&global, &comment[..]).unwrap();

    let mut file = tar::Header::new_gnu();
    file.set_path("kept").unwrap();
    file.set_size(2);
    file.set_mode(0o644);
    file.set_cksum();
    builder.append(&file, &b"ok"[..]).unwrap();
    let buffer = builder.into_inner().unwrap();

    let extracted = engine(dst.path(), false)
        .extract(dst.path(), buffer.as_slice())
        .unwrap();
    assert_eq!(extracted.entries, 1);
    assert!(!dst.path().join("pax_global_header").exists());
    assert_eq!(fs::read(dst.path().join("kept")).unwrap(), b"ok");
}

#[test]
fn test_kind_of_read_entries() {
    let src = TempDir::new().unwrap();
    sample_tree(src.path());
    let archive = engine(src.path(), false);
    let mut buffer = Vec::new();
    archive
        .create(&[src.path().join("cache")], &mut buffer, Naming::RootRelative)
        .unwrap();

    let mut kinds = Vec::new();
    reader::read_entries(buffer.as_slice(), |entry, _| {
        kinds.push((entry.name.clone(), entry.kind));
        Ok(())
    })
    .unwrap();

    assert_eq!(kinds[0], ("cache/".to_string(), EntryKind::Directory));
    // Walk order is sorted by file name within each directory
    let names: Vec<&str> = kinds.iter().map(|(n, _)| n.as_str()).collect();
    assert_eq!(
        names,
        vec![
            "cache/",
            "cache/empty/",
            "cache/nested/",
            "cache/nested/deeper/",
            "cache/nested/deeper/leaf.txt",
            "cache/nested/mid.bin",
            "cache/top.txt",
        ]
    );
}
