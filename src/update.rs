//! Decides whether an expected fixture is rewritten in update mode.

use std::fmt;
use std::fs;
use std::path::Path;

use tracing::{info, warn};

use crate::errors::{ChartTestError, Result};
use crate::manifest::normalize_manifest;

/// Why an expected file was (or was not) rewritten.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum UpdateType {
    /// Nothing changed.
    #[default]
    None,
    /// Same content, different textual form.
    Formatting,
    /// The rendered content changed.
    Semantic,
}

impl UpdateType {
    pub fn as_str(&self) -> &'static str {
        match self {
            UpdateType::None => "none",
            UpdateType::Formatting => "formatting",
            UpdateType::Semantic => "semantic",
        }
    }

    pub fn requires_write(&self) -> bool {
        !matches!(self, UpdateType::None)
    }
}

impl fmt::Display for UpdateType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classifies an update, in strict priority: a semantic difference wins,
/// then any byte difference between the stored fixture and the normalized
/// actual manifest, otherwise nothing.
pub fn classify_update(is_equal: bool, normalized_actual: &str, stored_expected: &str) -> UpdateType {
    if !is_equal {
        UpdateType::Semantic
    } else if normalized_actual != stored_expected {
        UpdateType::Formatting
    } else {
        UpdateType::None
    }
}

/// Normalizes the actual manifest, falling back to the raw text when it
/// cannot be normalized.
pub fn normalized_or_raw(actual_manifest: &str) -> String {
    match normalize_manifest(actual_manifest) {
        Ok(normalized) => normalized,
        Err(err) => {
            warn!(error = %err, "actual manifest could not be normalized, keeping it as rendered");
            actual_manifest.to_string()
        }
    }
}

/// Classifies and, when needed, rewrites the expected fixture at `path`.
pub fn apply_update(
    path: &Path,
    is_equal: bool,
    actual_manifest: &str,
    stored_expected: &str,
) -> Result<UpdateType> {
    let normalized_actual = normalized_or_raw(actual_manifest);
    let update_type = classify_update(is_equal, &normalized_actual, stored_expected);

    if update_type.requires_write() {
        fs::write(path, normalized_actual.as_bytes()).map_err(|source| ChartTestError::WriteBack {
            path: path.to_path_buf(),
            source,
        })?;
        info!(path = %path.display(), update = %update_type, "rewrote expected file");
    }

    Ok(update_type)
}
