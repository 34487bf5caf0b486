//! Path lookups into nested JSON response trees.
//!
//! Backend responses are deeply nested and change shape without notice, so every
//! field is read through [`walk`], which never panics and returns `None` as soon as
//! a segment cannot be followed.

use serde_json::Value;

/// One step of a path: an object key or an array index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment<'a> {
    Key(&'a str),
    Index(usize),
}

impl<'a> From<&'a str> for Segment<'a> {
    fn from(key: &'a str) -> Self {
        Segment::Key(key)
    }
}

impl From<usize> for Segment<'_> {
    fn from(index: usize) -> Self {
        Segment::Index(index)
    }
}

// Unsuffixed integer literals default to i32. Negative indices never match.
impl From<i32> for Segment<'_> {
    fn from(index: i32) -> Self {
        Segment::Index(usize::try_from(index).unwrap_or(usize::MAX))
    }
}

/// Follow `path` from `root`, one segment at a time.
pub fn walk<'v>(root: &'v Value, path: &[Segment<'_>]) -> Option<&'v Value> {
    path.iter().try_fold(root, |current, segment| match (segment, current) {
        (Segment::Key(key), Value::Object(map)) => map.get(*key),
        (Segment::Index(index), Value::Array(items)) => items.get(*index),
        _ => None,
    })
}

/// Follow `path` and read the leaf as a string.
pub fn walk_str<'v>(root: &'v Value, path: &[Segment<'_>]) -> Option<&'v str> {
    walk(root, path).and_then(Value::as_str)
}

/// Follow `path` and read the leaf as an array.
pub fn walk_array<'v>(root: &'v Value, path: &[Segment<'_>]) -> Option<&'v Vec<Value>> {
    walk(root, path).and_then(Value::as_array)
}

/// Variadic form of [`walk`]: `walk!(root, "contents", 0, "title")`.
macro_rules! walk {
    ($root:expr $(, $segment:expr)* $(,)?) => {
        $crate::tree_path::walk(
            $root,
            &[$($crate::tree_path::Segment::from($segment)),*],
        )
    };
}
