use regex::Regex;
use tracing::debug;

use crate::errors::{ChartTestError, Result};
use crate::manifest::normalize::normalize_document;
use crate::manifest::split::split_manifest;

/// Line patterns excluded from comparison.
#[derive(Debug, Clone, Default)]
pub struct IgnorePatterns {
    patterns: Vec<Regex>,
}

impl IgnorePatterns {
    /// Compiles every pattern up front; the first invalid one is fatal.
    pub fn compile<I, S>(patterns: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns = patterns
            .into_iter()
            .map(|pattern| {
                let pattern = pattern.as_ref();
                Regex::new(pattern).map_err(|source| ChartTestError::IgnorePattern {
                    pattern: pattern.to_string(),
                    source,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { patterns })
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn matches(&self, line: &str) -> bool {
        self.patterns.iter().any(|pattern| pattern.is_match(line))
    }

    /// Drops matching lines from `text`, appending each dropped line to `ignored`.
    fn filter(&self, text: &str, ignored: &mut Vec<String>) -> String {
        if self.is_empty() {
            return text.to_string();
        }
        let mut kept = Vec::new();
        for line in text.split('\n') {
            if self.matches(line) {
                ignored.push(line.to_string());
            } else {
                kept.push(line);
            }
        }
        kept.join("\n")
    }
}

/// Classification of a diff finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemKind {
    /// Present in the expected manifest only.
    Missing,
    /// Present in the actual manifest only.
    Extra,
    /// Present on both sides with different content.
    Different,
}

/// One diff finding for a source path. The side that is absent is empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    pub source: String,
    pub expected: String,
    pub actual: String,
}

impl Item {
    pub fn missing(source: impl Into<String>, expected: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            expected: expected.into(),
            actual: String::new(),
        }
    }

    pub fn extra(source: impl Into<String>, actual: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            expected: String::new(),
            actual: actual.into(),
        }
    }

    pub fn different(
        source: impl Into<String>,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    pub fn kind(&self) -> ItemKind {
        match (self.expected.is_empty(), self.actual.is_empty()) {
            (false, true) => ItemKind::Missing,
            (true, false) => ItemKind::Extra,
            _ => ItemKind::Different,
        }
    }
}

/// Outcome of comparing an expected manifest with an actual one.
///
/// Every list is sorted by source path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Comparison {
    pub missing: Vec<Item>,
    pub extra: Vec<Item>,
    pub different: Vec<Item>,
    /// Lines removed by ignore patterns, kept for the audit trail only.
    pub ignored_lines: Vec<String>,
}

impl Comparison {
    pub fn is_equal(&self) -> bool {
        self.missing.is_empty() && self.extra.is_empty() && self.different.is_empty()
    }
}

/// Compares two composite manifests source by source.
///
/// Sources present on one side only are reported raw. Sources present on
/// both sides are normalized independently; if either side fails to
/// normalize, both sides are compared as raw text instead. Ignore patterns
/// are applied line by line before the equality check, but a `Different`
/// item always carries the unfiltered text.
pub fn compare_manifests(expected: &str, actual: &str, ignore: &IgnorePatterns) -> Comparison {
    let mut expected = split_manifest(expected);
    let mut actual = split_manifest(actual);
    let mut comparison = Comparison::default();

    expected.retain(|source, content| {
        if actual.contains_key(source) {
            return true;
        }
        comparison.missing.push(Item::missing(source.as_str(), content.as_str()));
        false
    });

    actual.retain(|source, content| {
        if expected.contains_key(source) {
            return true;
        }
        comparison.extra.push(Item::extra(source.as_str(), content.as_str()));
        false
    });

    for (source, expected_content) in &expected {
        let Some(actual_content) = actual.get(source) else {
            continue;
        };

        let (expected_text, actual_text) = match (
            normalize_document(expected_content),
            normalize_document(actual_content),
        ) {
            (Ok(e), Ok(a)) => (e, a),
            (e, a) => {
                if let Err(err) = e.as_ref().and(a.as_ref()) {
                    debug!(source = %source, error = %err, "comparing raw text");
                }
                (
                    expected_content.trim().to_string(),
                    actual_content.trim().to_string(),
                )
            }
        };

        let expected_filtered = ignore.filter(&expected_text, &mut comparison.ignored_lines);
        let actual_filtered = ignore.filter(&actual_text, &mut comparison.ignored_lines);

        if expected_filtered != actual_filtered {
            comparison
                .different
                .push(Item::different(source.as_str(), expected_text, actual_text));
        }
    }

    // Split maps iterate in key order already; sort anyway so the contract
    // does not depend on the map type.
    comparison.missing.sort_by(|a, b| a.source.cmp(&b.source));
    comparison.extra.sort_by(|a, b| a.source.cmp(&b.source));
    comparison.different.sort_by(|a, b| a.source.cmp(&b.source));

    comparison
}
