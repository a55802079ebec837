use serde::Deserialize;
use tracing::debug;

use crate::errors::NormalizationError;
use crate::manifest::split::{split_manifest, SOURCE_DELIMITER};

/// Separator emitted between re-encoded documents of one source.
const DOCUMENT_SEPARATOR: &str = "---\n";

/// Upper bound on re-encoding passes before the text is accepted as is.
const MAX_PASSES: usize = 4;

/// Canonicalizes the YAML text of a single source.
///
/// Every document in the stream is decoded and re-encoded with a fixed
/// policy: block style, two-space indentation, keys in source order and
/// scalars quoted only where required. Comments are dropped and text with
/// no YAML content normalizes to an empty string.
///
/// Trimming the encoded text can drop the line break that ends a block
/// scalar, so the pass is repeated until the output no longer changes.
/// Normalizing the result again returns identical text.
pub fn normalize_document(text: &str) -> Result<String, NormalizationError> {
    let mut current = encode_documents(text)?;
    for _ in 1..MAX_PASSES {
        let next = encode_documents(&current)?;
        if next == current {
            break;
        }
        current = next;
    }
    Ok(current)
}

fn encode_documents(text: &str) -> Result<String, NormalizationError> {
    if !has_content(text) {
        return Ok(String::new());
    }
    let mut parts = Vec::new();
    for document in serde_yaml::Deserializer::from_str(text) {
        let value = serde_yaml::Value::deserialize(document)?;
        parts.push(serde_yaml::to_string(&value)?);
    }
    Ok(parts.join(DOCUMENT_SEPARATOR).trim().to_string())
}

/// Whether `text` holds anything besides blank lines, comments and
/// document markers. serde_yaml reads such text as a single `null`.
fn has_content(text: &str) -> bool {
    text.lines().map(str::trim).any(|line| {
        !(line.is_empty() || line.starts_with('#') || line == "---" || line == "...")
    })
}

/// Canonicalizes a whole composite manifest.
///
/// Sources are emitted in sorted order, each under its own source header.
/// A source with no YAML content (comments only) keeps its raw body so that
/// it still splits back out under the same path.
pub fn normalize_manifest(manifest: &str) -> Result<String, NormalizationError> {
    let sections = split_manifest(manifest);
    let mut normalized_parts = Vec::with_capacity(sections.len());

    for (source, content) in &sections {
        let mut normalized = normalize_document(content)?;
        if normalized.is_empty() {
            debug!(source = %source, "source has no YAML content, keeping raw body");
            normalized = content.trim().to_string();
        }
        normalized_parts.push(format!("{SOURCE_DELIMITER}{source}\n{normalized}"));
    }

    Ok(normalized_parts.join("\n"))
}
