use std::collections::BTreeMap;

/// Marks the start of a new source section inside a composite manifest.
/// The source path follows on the same line.
pub const SOURCE_DELIMITER: &str = "---\n# Source: ";

/// Joins the bodies of a source path that occurs more than once.
pub const DOCUMENT_BOUNDARY: &str = "\n---\n";

/// Mapping from source path to the concatenated content rendered for it.
///
/// A `BTreeMap` so that every consumer iterates sources in sorted order.
pub type SplitMap = BTreeMap<String, String>;

/// Splits a composite manifest into its source sections.
///
/// Each section is trimmed, its first line is taken as the source path and
/// the remainder (trimmed) as its body. Sections without both a path line and
/// a body line are skipped, which also discards the empty chunk produced by a
/// leading delimiter. Bodies of repeated paths are joined in encounter order
/// with [`DOCUMENT_BOUNDARY`].
pub fn split_manifest(text: &str) -> SplitMap {
    let mut items = SplitMap::new();

    for chunk in text.split(SOURCE_DELIMITER) {
        let chunk = chunk.trim();
        if chunk.is_empty() {
            continue;
        }

        let Some((path, body)) = chunk.split_once('\n') else {
            continue;
        };
        let path = path.trim();
        let body = body.trim();

        items
            .entry(path.to_string())
            .and_modify(|existing: &mut String| {
                existing.push_str(DOCUMENT_BOUNDARY);
                existing.push_str(body);
            })
            .or_insert_with(|| body.to_string());
    }

    items
}

/// Combines a primary manifest with hook manifests into one composite
/// manifest, each hook introduced by a source header carrying its path.
pub fn combine_manifests<'a, I>(primary: &str, hooks: I) -> String
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut combined = String::with_capacity(primary.len());
    combined.push_str(primary.trim());
    combined.push('\n');
    for (path, manifest) in hooks {
        combined.push_str(SOURCE_DELIMITER);
        combined.push_str(path);
        combined.push('\n');
        combined.push_str(manifest);
        combined.push('\n');
    }
    combined
}
