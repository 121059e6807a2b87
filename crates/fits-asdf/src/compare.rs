//! Structural tree equality.
//!
//! Comparison walks both trees in lockstep and reports the first difference
//! with its dotted path. Arrays compare by value ([`NdArray`]'s `==`), never
//! by buffer identity, and mapping key order is significant.

use std::fmt;

use crate::array::NdArray;
use crate::tree::Tree;

/// The first point at which two trees differ.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeMismatch {
    /// Dotted path from the root; empty for the root itself.
    pub path: String,
    pub reason: String,
}

impl fmt::Display for TreeMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let path = if self.path.is_empty() { "<root>" } else { &self.path };
        write!(f, "{path}: {}", self.reason)
    }
}

fn kind(tree: &Tree) -> &'static str {
    match tree {
        Tree::Null => "null",
        Tree::Bool(_) => "bool",
        Tree::Int(_) => "int",
        Tree::Float(_) => "float",
        Tree::String(_) => "string",
        Tree::Mapping(_) => "mapping",
        Tree::Sequence(_) => "sequence",
        Tree::Array(_) => "array",
    }
}

fn join(path: &str, key: &str) -> String {
    if path.is_empty() {
        String::from(key)
    } else {
        format!("{path}.{key}")
    }
}

fn floats_match(a: f64, b: f64) -> bool {
    a == b || a.to_bits() == b.to_bits() || (a.is_nan() && b.is_nan())
}

fn arrays_match(a: &NdArray, b: &NdArray) -> Option<String> {
    if a.dtype() != b.dtype() {
        return Some(format!("dtype {} != {}", a.dtype(), b.dtype()));
    }
    if a.shape() != b.shape() {
        return Some(format!("shape {:?} != {:?}", a.shape(), b.shape()));
    }
    (a != b).then(|| String::from("array contents differ"))
}

fn diff_at(path: &str, a: &Tree, b: &Tree) -> Option<TreeMismatch> {
    let mismatch = |reason: String| {
        Some(TreeMismatch {
            path: String::from(path),
            reason,
        })
    };

    match (a, b) {
        (Tree::Null, Tree::Null) => None,
        (Tree::Bool(x), Tree::Bool(y)) if x == y => None,
        (Tree::Int(x), Tree::Int(y)) if x == y => None,
        (Tree::Float(x), Tree::Float(y)) if floats_match(*x, *y) => None,
        (Tree::String(x), Tree::String(y)) if x == y => None,
        (Tree::Array(x), Tree::Array(y)) => arrays_match(x, y).and_then(mismatch),
        (Tree::Sequence(xs), Tree::Sequence(ys)) => {
            if xs.len() != ys.len() {
                return mismatch(format!("sequence length {} != {}", xs.len(), ys.len()));
            }
            xs.iter()
                .zip(ys)
                .enumerate()
                .find_map(|(i, (x, y))| diff_at(&join(path, &i.to_string()), x, y))
        }
        (Tree::Mapping(xs), Tree::Mapping(ys)) => {
            if !xs.keys().eq(ys.keys()) {
                return mismatch(format!(
                    "keys {:?} != {:?}",
                    xs.keys().collect::<Vec<_>>(),
                    ys.keys().collect::<Vec<_>>()
                ));
            }
            xs.iter()
                .zip(ys.values())
                .find_map(|((key, x), y)| diff_at(&join(path, key), x, y))
        }
        (x, y) if kind(x) == kind(y) => mismatch(format!("{x:?} != {y:?}")),
        (x, y) => mismatch(format!("{} != {}", kind(x), kind(y))),
    }
}

/// Returns the first difference between two trees, or `None` if they match.
pub fn tree_diff(a: &Tree, b: &Tree) -> Option<TreeMismatch> {
    diff_at("", a, b)
}

/// Panics with the mismatch path unless the trees match.
#[track_caller]
pub fn assert_tree_match(expected: &Tree, actual: &Tree) {
    if let Some(m) = tree_diff(expected, actual) {
        panic!("trees differ at {m}");
    }
}

impl PartialEq for Tree {
    fn eq(&self, other: &Self) -> bool {
        tree_diff(self, other).is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Tree {
        Tree::mapping()
            .with(
                "sci",
                Tree::mapping()
                    .with("data", NdArray::from_slice(&[1.0f64, 2.0]))
                    .with("wcs", "WCS info"),
            )
            .with("tags", vec![Tree::from("a"), Tree::Null, Tree::Bool(true)])
    }

    #[test]
    fn identical_structure_matches() {
        assert_eq!(tree_diff(&sample(), &sample()), None);
        assert_eq!(sample(), sample());
    }

    #[test]
    fn nested_scalar_difference_reports_path() {
        let other = Tree::mapping()
            .with(
                "sci",
                Tree::mapping()
                    .with("data", NdArray::from_slice(&[1.0f64, 2.0]))
                    .with("wcs", "other"),
            )
            .with("tags", vec![Tree::from("a"), Tree::Null, Tree::Bool(true)]);
        let m = tree_diff(&sample(), &other).unwrap();
        assert_eq!(m.path, "sci.wcs");
    }

    #[test]
    fn array_difference_reports_path() {
        let other = Tree::mapping()
            .with(
                "sci",
                Tree::mapping()
                    .with("data", NdArray::from_slice(&[1.0f64, 3.0]))
                    .with("wcs", "WCS info"),
            )
            .with("tags", vec![Tree::from("a"), Tree::Null, Tree::Bool(true)]);
        let m = tree_diff(&sample(), &other).unwrap();
        assert_eq!(m.path, "sci.data");
        assert_eq!(m.reason, "array contents differ");
    }

    #[test]
    fn sequence_index_in_path() {
        let a = Tree::from(vec![Tree::Int(1), Tree::Int(2)]);
        let b = Tree::from(vec![Tree::Int(1), Tree::Int(5)]);
        assert_eq!(tree_diff(&a, &b).unwrap().path, "1");
    }

    #[test]
    fn key_order_is_significant() {
        let a = Tree::mapping().with("x", 1i64).with("y", 2i64);
        let b = Tree::mapping().with("y", 2i64).with("x", 1i64);
        assert!(tree_diff(&a, &b).unwrap().reason.starts_with("keys"));
    }

    #[test]
    fn kind_mismatch() {
        let m = tree_diff(&Tree::Int(1), &Tree::Float(1.0)).unwrap();
        assert_eq!(m.reason, "int != float");
        assert_eq!(m.to_string(), "<root>: int != float");
    }

    #[test]
    fn nan_scalars_match() {
        assert_eq!(Tree::Float(f64::NAN), Tree::Float(f64::NAN));
    }

    #[test]
    fn equal_but_distinct_arrays_match() {
        let a = Tree::from(NdArray::from_slice(&[4u8, 5]));
        let b = Tree::from(NdArray::from_slice(&[4u8, 5]));
        assert_tree_match(&a, &b);
    }

    #[test]
    #[should_panic(expected = "trees differ at model")]
    fn assert_tree_match_panics() {
        let a = Tree::mapping().with("model", 1i64);
        let b = Tree::mapping().with("model", 2i64);
        assert_tree_match(&a, &b);
    }
}
