//! The in-memory metadata tree.

use indexmap::IndexMap;
use serde::Serialize;
use serde_yaml::Value as Yaml;

use crate::array::NdArray;
use crate::error::{Error, Result};

/// An ordered mapping of string keys to subtrees.
pub type Mapping = IndexMap<String, Tree>;

/// A hierarchical metadata document whose leaves are scalars or arrays.
///
/// Trees are acyclic by construction. Equality (`==`) is structural and
/// value-based; see [`crate::compare`].
#[derive(Debug, Clone, Default)]
pub enum Tree {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Mapping(Mapping),
    Sequence(Vec<Tree>),
    Array(NdArray),
}

impl Tree {
    /// An empty mapping.
    pub fn mapping() -> Self {
        Tree::Mapping(Mapping::new())
    }

    /// Builder-style insert into a mapping.
    ///
    /// Calling this on anything but a mapping is a bug: it panics in debug
    /// builds and leaves `self` unchanged in release builds.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Tree>) -> Self {
        debug_assert!(
            matches!(self, Tree::Mapping(_)),
            "Tree::with called on a non-mapping"
        );
        if let Tree::Mapping(map) = &mut self {
            map.insert(key.into(), value.into());
        }
        self
    }

    /// Mapping lookup.
    pub fn get(&self, key: &str) -> Option<&Tree> {
        match self {
            Tree::Mapping(map) => map.get(key),
            _ => None,
        }
    }

    /// Follows a dotted path of mapping keys and sequence indices, e.g. `model.sci.data`.
    pub fn at(&self, path: &str) -> Option<&Tree> {
        path.split('.').try_fold(self, |node, key| match node {
            Tree::Mapping(map) => map.get(key),
            Tree::Sequence(items) => items.get(key.parse::<usize>().ok()?),
            _ => None,
        })
    }

    pub fn as_array(&self) -> Option<&NdArray> {
        match self {
            Tree::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Tree::String(s) => Some(s),
            _ => None,
        }
    }

    /// Depth-first visit of every array leaf.
    pub fn arrays(&self) -> Vec<&NdArray> {
        let mut out = Vec::new();
        collect_arrays(self, &mut out);
        out
    }

    /// Converts any serializable value into a tree.
    ///
    /// Fails with [`Error::UnsupportedType`] for values the tree cannot hold:
    /// non-string mapping keys, tagged enum values and integers beyond `i64`.
    pub fn from_serialize<T: Serialize + ?Sized>(value: &T) -> Result<Self> {
        Tree::try_from(serde_yaml::to_value(value)?)
    }
}

fn collect_arrays<'a>(tree: &'a Tree, out: &mut Vec<&'a NdArray>) {
    match tree {
        Tree::Array(a) => out.push(a),
        Tree::Mapping(map) => map.values().for_each(|v| collect_arrays(v, out)),
        Tree::Sequence(items) => items.iter().for_each(|v| collect_arrays(v, out)),
        _ => {}
    }
}

impl TryFrom<Yaml> for Tree {
    type Error = Error;

    fn try_from(value: Yaml) -> Result<Self> {
        Ok(match value {
            Yaml::Null => Tree::Null,
            Yaml::Bool(b) => Tree::Bool(b),
            Yaml::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Tree::Int(i)
                } else if n.is_f64() {
                    Tree::Float(n.as_f64().unwrap_or(f64::NAN))
                } else {
                    return Err(Error::UnsupportedType(format!("integer {n} exceeds i64")));
                }
            }
            Yaml::String(s) => Tree::String(s),
            Yaml::Sequence(items) => Tree::Sequence(
                items
                    .into_iter()
                    .map(Tree::try_from)
                    .collect::<Result<_>>()?,
            ),
            Yaml::Mapping(map) => {
                let mut out = Mapping::with_capacity(map.len());
                for (k, v) in map {
                    match k {
                        Yaml::String(key) => out.insert(key, Tree::try_from(v)?),
                        other => {
                            return Err(Error::UnsupportedType(format!(
                                "non-string mapping key {other:?}"
                            )))
                        }
                    };
                }
                Tree::Mapping(out)
            }
            Yaml::Tagged(tagged) => {
                return Err(Error::UnsupportedType(format!("tagged value {}", tagged.tag)))
            }
        })
    }
}

impl From<bool> for Tree {
    fn from(v: bool) -> Self {
        Tree::Bool(v)
    }
}

impl From<i64> for Tree {
    fn from(v: i64) -> Self {
        Tree::Int(v)
    }
}

impl From<i32> for Tree {
    fn from(v: i32) -> Self {
        Tree::Int(v.into())
    }
}

impl From<f64> for Tree {
    fn from(v: f64) -> Self {
        Tree::Float(v)
    }
}

impl From<&str> for Tree {
    fn from(v: &str) -> Self {
        Tree::String(String::from(v))
    }
}

impl From<String> for Tree {
    fn from(v: String) -> Self {
        Tree::String(v)
    }
}

impl From<NdArray> for Tree {
    fn from(v: NdArray) -> Self {
        Tree::Array(v)
    }
}

impl From<&NdArray> for Tree {
    fn from(v: &NdArray) -> Self {
        Tree::Array(v.clone())
    }
}

impl From<Vec<Tree>> for Tree {
    fn from(v: Vec<Tree>) -> Self {
        Tree::Sequence(v)
    }
}

impl From<Mapping> for Tree {
    fn from(v: Mapping) -> Self {
        Tree::Mapping(v)
    }
}
