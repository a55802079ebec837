//! Manifest handling: splitting composite manifests into sources,
//! normalizing YAML documents, and comparing expected against actual output.

pub mod diff;
pub mod normalize;
pub mod split;

pub use diff::{compare_manifests, Comparison, IgnorePatterns, Item, ItemKind};
pub use normalize::{normalize_document, normalize_manifest};
pub use split::{combine_manifests, split_manifest, SplitMap};
