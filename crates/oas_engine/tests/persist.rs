use std::fs;
use std::path::Path;

use oas_engine::{ensure_output_dir, AtomicFileWriter};
use tempfile::TempDir;

#[test]
fn creates_missing_output_dir() {
    let temp = TempDir::new().unwrap();
    let new_dir = temp.path().join("out");
    assert!(!new_dir.exists());
    ensure_output_dir(&new_dir).unwrap();
    assert!(new_dir.is_dir());
}

#[test]
fn rejects_a_file_as_output_dir() {
    let temp = TempDir::new().unwrap();
    let file_path = temp.path().join("plain");
    fs::write(&file_path, "x").unwrap();
    assert!(ensure_output_dir(&file_path).is_err());
}

#[test]
fn atomic_write_replaces_existing_and_creates_parents() {
    let temp = TempDir::new().unwrap();
    let writer = AtomicFileWriter::new(temp.path().to_path_buf());

    let first = writer
        .write(Path::new("specs/html/petstore.html"), b"<html>one</html>")
        .unwrap();
    assert_eq!(first, temp.path().join("specs/html/petstore.html"));
    assert_eq!(fs::read_to_string(&first).unwrap(), "<html>one</html>");

    let second = writer
        .write(Path::new("specs/html/petstore.html"), b"<html>two</html>")
        .unwrap();
    assert_eq!(first, second);
    assert_eq!(fs::read_to_string(&second).unwrap(), "<html>two</html>");

    // Only the target remains; no temp files are left behind.
    let entries = fs::read_dir(temp.path().join("specs/html")).unwrap().count();
    assert_eq!(entries, 1);
}

#[test]
fn no_partial_file_on_error() {
    let temp = TempDir::new().unwrap();
    let file_path = temp.path().join("not_a_dir");
    fs::write(&file_path, "x").unwrap();

    let writer = AtomicFileWriter::new(file_path.clone());
    let result = writer.write(Path::new("doc.html"), b"data");
    assert!(result.is_err());
    assert!(!file_path.with_file_name("doc.html").exists());
}
