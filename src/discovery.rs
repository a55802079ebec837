use std::path::Path;

use walkdir::WalkDir;

use crate::errors::{ChartTestError, Result};

/// Resolves which tests to run.
///
/// Names given on the command line are used verbatim and in order. Otherwise
/// every immediate subdirectory of `tests_dir` is a test, sorted by name.
pub fn resolve_test_names(tests_dir: &Path, requested: &[String]) -> Result<Vec<String>> {
    if !requested.is_empty() {
        return Ok(requested.to_vec());
    }
    discover_tests(tests_dir)
}

/// Lists the immediate subdirectories of `tests_dir`, sorted by name.
pub fn discover_tests(tests_dir: &Path) -> Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in WalkDir::new(tests_dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry.map_err(|err| {
            let context = format!("listing tests in {}", tests_dir.display());
            ChartTestError::io(context, err.into())
        })?;
        if entry.file_type().is_dir() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    Ok(names)
}
