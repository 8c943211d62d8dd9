//! Identifier text.
//!
//! Names are `SmolStr`: short identifiers are stored inline and longer ones
//! share an `Arc`, so cloning a name never allocates.

/// An identifier or qualified path as written in source.
pub type Name = smol_str::SmolStr;

/// Separator between segments of a qualified name (`Outer::Inner`).
const PATH_SEPARATOR: &str = "::";

/// Split a possibly qualified name into its segments.
///
/// Empty segments (from `::Foo` or `Foo::`) are dropped.
pub fn split_qualified(name: &str) -> impl Iterator<Item = &str> {
    name.split(PATH_SEPARATOR).filter(|segment| !segment.is_empty())
}

/// Whether `name` has more than one segment.
pub fn is_qualified(name: &str) -> bool {
    name.contains(PATH_SEPARATOR)
}
