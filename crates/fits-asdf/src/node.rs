//! The reference-bearing shadow tree.
//!
//! A [`Node`] mirrors [`Tree`](crate::tree::Tree) with every array leaf
//! replaced by an [`ArrayRef`] that says where the bytes live.

use indexmap::IndexMap;

use crate::array::{ByteOrder, DType};

/// Where the bytes of an array leaf are stored.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Reference {
    /// Index into the payload's block store.
    Block(usize),
    /// Name of a container extension that owns the array.
    Source(String),
}

impl std::fmt::Display for Reference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Reference::Block(index) => write!(f, "block {index}"),
            Reference::Source(name) => write!(f, "extension {name:?}"),
        }
    }
}

/// An array leaf as recorded in the encoded tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArrayRef {
    pub reference: Reference,
    pub dtype: DType,
    pub shape: Vec<usize>,
    pub byteorder: ByteOrder,
}

/// Structural node of the encoded tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Mapping(IndexMap<String, Node>),
    Sequence(Vec<Node>),
    Array(ArrayRef),
}

impl Node {
    /// Every array reference, depth-first.
    pub fn refs(&self) -> Vec<&ArrayRef> {
        fn walk<'a>(node: &'a Node, out: &mut Vec<&'a ArrayRef>) {
            match node {
                Node::Array(r) => out.push(r),
                Node::Mapping(map) => map.values().for_each(|n| walk(n, out)),
                Node::Sequence(items) => items.iter().for_each(|n| walk(n, out)),
                _ => {}
            }
        }
        let mut out = Vec::new();
        walk(self, &mut out);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refs_are_depth_first() {
        let leaf = |reference| {
            Node::Array(ArrayRef {
                reference,
                dtype: DType::Float64,
                shape: vec![2],
                byteorder: ByteOrder::Big,
            })
        };
        let mut inner = IndexMap::new();
        inner.insert(String::from("data"), leaf(Reference::Source(String::from("SCI"))));
        let mut root = IndexMap::new();
        root.insert(String::from("sci"), Node::Mapping(inner));
        root.insert(String::from("extra"), Node::Sequence(vec![leaf(Reference::Block(0))]));

        let binding = Node::Mapping(root);
        let refs = binding.refs();
        assert_eq!(refs.len(), 2);
        assert_eq!(refs[0].reference, Reference::Source(String::from("SCI")));
        assert_eq!(refs[1].reference, Reference::Block(0));
    }

    #[test]
    fn reference_display() {
        assert_eq!(Reference::Block(3).to_string(), "block 3");
        assert_eq!(
            Reference::Source(String::from("DQ")).to_string(),
            "extension \"DQ\""
        );
    }
}
