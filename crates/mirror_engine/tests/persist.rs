use std::fs;

use mirror_engine::{ensure_output_dir, AtomicFileWriter};
use tempfile::TempDir;

#[test]
fn creates_missing_output_dir() {
    let temp = TempDir::new().unwrap();
    let new_dir = temp.path().join("out").join("example.com");
    assert!(!new_dir.exists());
    ensure_output_dir(&new_dir).unwrap();
    assert!(new_dir.is_dir());
}

#[test]
fn file_in_place_of_output_dir_is_rejected() {
    let temp = TempDir::new().unwrap();
    let file_path = temp.path().join("not_a_dir");
    fs::write(&file_path, "x").unwrap();
    assert!(ensure_output_dir(&file_path).is_err());
}

#[test]
fn atomic_write_replaces_existing_page() {
    let temp = TempDir::new().unwrap();
    let page = temp.path().join("index.html");
    fs::write(&page, "<a href=\"/about\">").unwrap();

    let writer = AtomicFileWriter::for_file(&page);
    let written = writer.write("index.html", b"<a href=\"about.html\">").unwrap();
    assert_eq!(written, page);
    assert_eq!(fs::read_to_string(&page).unwrap(), "<a href=\"about.html\">");

    let leftovers = fs::read_dir(temp.path()).unwrap().count();
    assert_eq!(leftovers, 1);
}

#[test]
fn no_partial_file_on_error() {
    let temp = TempDir::new().unwrap();
    let file_path = temp.path().join("not_a_dir");
    fs::write(&file_path, "x").unwrap();

    let writer = AtomicFileWriter::new(file_path.clone());
    let result = writer.write("page.html", b"data");
    assert!(result.is_err());
    assert!(!file_path.with_file_name("page.html").exists());
}
