// Test discovery: explicit names versus directory listing.

use std::fs;

use chartcheck::discovery::{discover_tests, resolve_test_names};

#[test]
fn lists_immediate_subdirectories_sorted() {
    let root = tempfile::tempdir().unwrap();
    for name in ["zeta", "alpha", "mid"] {
        fs::create_dir(root.path().join(name)).unwrap();
    }
    fs::create_dir_all(root.path().join("alpha").join("nested")).unwrap();
    fs::write(root.path().join("tests.yaml"), "version: 1").unwrap();

    assert_eq!(discover_tests(root.path()).unwrap(), ["alpha", "mid", "zeta"]);
}

#[test]
fn explicit_names_are_used_verbatim() {
    let root = tempfile::tempdir().unwrap();
    fs::create_dir(root.path().join("present")).unwrap();
    let requested = vec!["b".to_string(), "a".to_string(), "not-on-disk".to_string()];
    assert_eq!(resolve_test_names(root.path(), &requested).unwrap(), requested);
}

#[test]
fn empty_request_falls_back_to_discovery() {
    let root = tempfile::tempdir().unwrap();
    fs::create_dir(root.path().join("only")).unwrap();
    assert_eq!(resolve_test_names(root.path(), &[]).unwrap(), ["only"]);
}

#[test]
fn empty_directory_has_no_tests() {
    let root = tempfile::tempdir().unwrap();
    assert!(discover_tests(root.path()).unwrap().is_empty());
}
