//! YAML structural codec for reference-bearing trees.
//!
//! Scalars, mappings and sequences map onto plain YAML. Array references are
//! written as tagged mappings:
//!
//! ```yaml
//! data: !core/ndarray-1.0.0
//!   source: fits:SCI      # or an integer block index
//!   datatype: float64
//!   byteorder: big
//!   shape: [512]
//! ```

use indexmap::IndexMap;
use serde_yaml::value::{Tag, TaggedValue};
use serde_yaml::{Mapping, Number, Value};

use crate::array::{ByteOrder, DType};
use crate::error::{Error, Result};
use crate::node::{ArrayRef, Node, Reference};

/// Tag carried by every array reference.
pub const NDARRAY_TAG: &str = "core/ndarray-1.0.0";

/// Prefix of a `source` that names a container extension.
pub const SOURCE_PREFIX: &str = "fits:";

fn ndarray_tag() -> Tag {
    Tag::new(NDARRAY_TAG)
}

fn to_value(node: &Node) -> Value {
    match node {
        Node::Null => Value::Null,
        Node::Bool(b) => Value::Bool(*b),
        Node::Int(i) => Value::Number(Number::from(*i)),
        Node::Float(f) => Value::Number(Number::from(*f)),
        Node::String(s) => Value::String(s.clone()),
        Node::Sequence(items) => Value::Sequence(items.iter().map(to_value).collect()),
        Node::Mapping(map) => Value::Mapping(
            map.iter()
                .map(|(k, v)| (Value::String(k.clone()), to_value(v)))
                .collect(),
        ),
        Node::Array(array) => Value::Tagged(Box::new(TaggedValue {
            tag: ndarray_tag(),
            value: Value::Mapping(array_to_mapping(array)),
        })),
    }
}

fn array_to_mapping(array: &ArrayRef) -> Mapping {
    let source = match &array.reference {
        Reference::Block(index) => Value::Number(Number::from(*index as u64)),
        Reference::Source(name) => Value::String(format!("{SOURCE_PREFIX}{name}")),
    };
    let shape = array
        .shape
        .iter()
        .map(|&d| Value::Number(Number::from(d as u64)))
        .collect();

    let mut map = Mapping::new();
    map.insert(Value::from("source"), source);
    map.insert(Value::from("datatype"), Value::from(array.dtype.name()));
    map.insert(Value::from("byteorder"), Value::from(array.byteorder.name()));
    map.insert(Value::from("shape"), Value::Sequence(shape));
    map
}

/// Encodes a reference-bearing tree as a YAML document body.
pub fn encode(node: &Node) -> Result<Vec<u8>> {
    Ok(serde_yaml::to_string(&to_value(node))?.into_bytes())
}

/// Decodes a YAML document body into a reference-bearing tree.
pub fn decode(bytes: &[u8]) -> Result<Node> {
    let value: Value = serde_yaml::from_slice(bytes)?;
    from_value(value)
}

fn from_value(value: Value) -> Result<Node> {
    Ok(match value {
        Value::Null => Node::Null,
        Value::Bool(b) => Node::Bool(b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Node::Int(i)
            } else if n.is_f64() {
                Node::Float(n.as_f64().unwrap_or(f64::NAN))
            } else {
                return Err(Error::UnsupportedType(format!("integer {n} exceeds i64")));
            }
        }
        Value::String(s) => Node::String(s),
        Value::Sequence(items) => Node::Sequence(
            items
                .into_iter()
                .map(from_value)
                .collect::<Result<_>>()?,
        ),
        Value::Mapping(map) => {
            let mut out = IndexMap::with_capacity(map.len());
            for (k, v) in map {
                match k {
                    Value::String(key) => out.insert(key, from_value(v)?),
                    other => {
                        return Err(Error::UnsupportedType(format!(
                            "non-string mapping key {other:?}"
                        )))
                    }
                };
            }
            Node::Mapping(out)
        }
        Value::Tagged(tagged) => {
            if tagged.tag != ndarray_tag() {
                return Err(Error::UnsupportedType(format!("tag {}", tagged.tag)));
            }
            Node::Array(array_from_value(tagged.value)?)
        }
    })
}

fn array_from_value(value: Value) -> Result<ArrayRef> {
    let Value::Mapping(map) = value else {
        return Err(Error::InvalidTree(String::from("ndarray node is not a mapping")));
    };
    let field = |name: &str| {
        map.get(name)
            .ok_or_else(|| Error::InvalidTree(format!("ndarray node lacks `{name}`")))
    };

    let reference = match field("source")? {
        Value::Number(n) => {
            let index = n
                .as_u64()
                .and_then(|i| usize::try_from(i).ok())
                .ok_or_else(|| Error::InvalidTree(format!("bad block index {n}")))?;
            Reference::Block(index)
        }
        Value::String(s) => match s.strip_prefix(SOURCE_PREFIX) {
            Some(name) => Reference::Source(String::from(name)),
            None => return Err(Error::UnsupportedType(format!("array source {s:?}"))),
        },
        other => return Err(Error::UnsupportedType(format!("array source {other:?}"))),
    };

    let dtype = match field("datatype")? {
        Value::String(s) => {
            DType::from_name(s).ok_or_else(|| Error::UnsupportedType(format!("datatype {s}")))?
        }
        other => return Err(Error::InvalidTree(format!("bad datatype {other:?}"))),
    };

    let byteorder = field("byteorder")?
        .as_str()
        .and_then(ByteOrder::from_name)
        .ok_or_else(|| Error::InvalidTree(String::from("bad byteorder")))?;

    let shape = match field("shape")? {
        Value::Sequence(dims) => dims
            .iter()
            .map(|d| {
                d.as_u64()
                    .and_then(|d| usize::try_from(d).ok())
                    .ok_or_else(|| Error::InvalidTree(format!("bad shape entry {d:?}")))
            })
            .collect::<Result<Vec<_>>>()?,
        other => return Err(Error::InvalidTree(format!("bad shape {other:?}"))),
    };

    Ok(ArrayRef {
        reference,
        dtype,
        shape,
        byteorder,
    })
}
