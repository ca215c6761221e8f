use crate::error::Error;
use crate::extraction::*;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Create a valid ZIP archive containing the given files
fn create_zip_archive(archive_path: &Path, files: &[(&str, &[u8])]) {
    let file = std::fs::File::create(archive_path).unwrap();
    let mut writer = ::zip::ZipWriter::new(file);
    let options =
        ::zip::write::FileOptions::default().compression_method(::zip::CompressionMethod::Deflated);
    for (name, content) in files {
        writer.start_file(*name, options).unwrap();
        std::io::Write::write_all(&mut writer, content).unwrap();
    }
    writer.finish().unwrap();
}

fn both_members() -> [(&'static str, &'static [u8]); 2] {
    [("SK.csv", b"POLOZKA;CASTKA_DAL\n"), ("RU.csv", b"POLOZKA;CASTKA_MD\n")]
}

// ---------------------------------------------------------------------------
// ZipExtractor
// ---------------------------------------------------------------------------

#[test]
fn zip_extract_places_members_next_to_archive() {
    let temp_dir = TempDir::new().unwrap();
    let archive = temp_dir.path().join("source.zip");
    create_zip_archive(&archive, &both_members());

    let files = ZipExtractor::extract(&archive, temp_dir.path()).unwrap();

    assert_eq!(files.len(), 2);
    assert!(files.contains(&temp_dir.path().join("SK.csv")));
    assert!(files.contains(&temp_dir.path().join("RU.csv")));
    assert_eq!(
        std::fs::read(temp_dir.path().join("SK.csv")).unwrap(),
        b"POLOZKA;CASTKA_DAL\n"
    );
    assert!(archive.exists(), "archive stays in place");
}

#[test]
fn zip_extract_creates_nested_directories() {
    let temp_dir = TempDir::new().unwrap();
    let archive = temp_dir.path().join("source.zip");
    create_zip_archive(&archive, &[("docs/readme.txt", b"hello")]);

    let files = ZipExtractor::extract(&archive, temp_dir.path()).unwrap();

    assert_eq!(files, vec![temp_dir.path().join("docs").join("readme.txt")]);
}

#[test]
fn zip_extract_skips_entries_escaping_destination() {
    let temp_dir = TempDir::new().unwrap();
    let dest = temp_dir.path().join("ws");
    let archive = temp_dir.path().join("source.zip");
    create_zip_archive(&archive, &[("../evil.csv", b"x"), ("SK.csv", b"y")]);

    let files = ZipExtractor::extract(&archive, &dest).unwrap();

    assert_eq!(files, vec![dest.join("SK.csv")]);
    assert!(!temp_dir.path().join("evil.csv").exists());
}

#[test]
fn zip_extract_never_overwrites_the_archive_itself() {
    let temp_dir = TempDir::new().unwrap();
    let archive = temp_dir.path().join("source.zip");
    create_zip_archive(&archive, &[("source.zip", b"not a zip"), ("SK.csv", b"y")]);
    let before = std::fs::read(&archive).unwrap();

    let files = ZipExtractor::extract(&archive, temp_dir.path()).unwrap();

    assert_eq!(files, vec![temp_dir.path().join("SK.csv")]);
    assert_eq!(std::fs::read(&archive).unwrap(), before);
}

#[test]
fn zip_extract_nonexistent_archive_returns_extraction_error() {
    let temp_dir = TempDir::new().unwrap();

    let result = ZipExtractor::extract(Path::new("/no/such/source.zip"), temp_dir.path());
    match result {
        Err(Error::Extraction { archive, reason }) => {
            assert_eq!(archive, PathBuf::from("/no/such/source.zip"));
            assert!(reason.contains("open"), "reason: {reason}");
        }
        other => panic!("expected Extraction, got: {other:?}"),
    }
}

#[test]
fn zip_extract_corrupt_archive_returns_extraction_error() {
    let temp_dir = TempDir::new().unwrap();
    let archive = temp_dir.path().join("source.zip");
    std::fs::write(&archive, b"<html>maintenance page</html>").unwrap();

    let result = ZipExtractor::extract(&archive, temp_dir.path());
    assert!(
        matches!(result, Err(Error::Extraction { .. })),
        "got: {result:?}"
    );
}

#[tokio::test]
async fn extract_archive_runs_on_blocking_pool() {
    let temp_dir = TempDir::new().unwrap();
    let archive = temp_dir.path().join("source.zip");
    create_zip_archive(&archive, &both_members());

    let files = extract_archive(&archive, temp_dir.path()).await.unwrap();
    assert_eq!(files.len(), 2);
}

#[tokio::test]
async fn extract_archive_empty_file_is_extraction_error() {
    let temp_dir = TempDir::new().unwrap();
    let archive = temp_dir.path().join("source.zip");
    std::fs::write(&archive, b"").unwrap();

    let err = extract_archive(&archive, temp_dir.path()).await.unwrap_err();
    assert_eq!(err.error_code(), "extraction_error");
}

// ---------------------------------------------------------------------------
// check_members
// ---------------------------------------------------------------------------

fn paths(dest: &Path, names: &[&str]) -> Vec<PathBuf> {
    names.iter().map(|n| dest.join(n)).collect()
}

#[test]
fn check_members_accepts_exactly_the_two_files() {
    let dest = Path::new("/ws");
    let extracted = paths(dest, &["SK.csv", "RU.csv"]);
    check_members(&dest.join("source.zip"), dest, &extracted, true).unwrap();
}

#[test]
fn check_members_requires_both_files() {
    let dest = Path::new("/ws");
    let extracted = paths(dest, &["SK.csv"]);

    match check_members(&dest.join("source.zip"), dest, &extracted, false) {
        Err(Error::Extraction { reason, .. }) => assert!(reason.contains("RU.csv")),
        other => panic!("expected Extraction, got: {other:?}"),
    }
}

#[test]
fn check_members_requires_top_level_files() {
    let dest = Path::new("/ws");
    let extracted = paths(dest, &["export/SK.csv", "export/RU.csv"]);

    assert!(check_members(&dest.join("source.zip"), dest, &extracted, false).is_err());
}

#[test]
fn check_members_ignores_extras_by_default() {
    let dest = Path::new("/ws");
    let extracted = paths(dest, &["SK.csv", "RU.csv", "PRIJMY.csv"]);
    check_members(&dest.join("source.zip"), dest, &extracted, false).unwrap();
}

#[test]
fn check_members_strict_rejects_extras() {
    let dest = Path::new("/ws");
    let extracted = paths(dest, &["SK.csv", "RU.csv", "PRIJMY.csv"]);

    match check_members(&dest.join("source.zip"), dest, &extracted, true) {
        Err(Error::Extraction { reason, .. }) => {
            assert!(reason.contains("PRIJMY.csv"), "reason: {reason}");
        }
        other => panic!("expected Extraction, got: {other:?}"),
    }
}
