//! Correlates array leaves with the container extensions that already hold them.
//!
//! Binding compares buffer *identity* ([`NdArray::same_buffer`]), never value
//! equality: two equal arrays with distinct buffers are distinct leaves.

use tracing::trace;

use crate::array::NdArray;
use crate::blocks::BlockStore;
use crate::container::Extension;
use crate::error::{Error, Result};
use crate::node::{ArrayRef, Reference};

/// Decides where `leaf` is stored.
///
/// The first candidate, in order, whose array shares the leaf's buffer yields
/// [`Reference::Source`]. Anything else goes into `blocks`. A match whose
/// name is shadowed by an earlier candidate of the same name also goes into
/// `blocks`, since the name would resolve to the earlier one. Zero-dimensional
/// leaves always go into `blocks`: FITS has no zero-axis image with data, so
/// the extension would read back with shape `[1]`.
pub fn classify(leaf: &NdArray, candidates: &[&Extension], blocks: &mut BlockStore) -> Reference {
    let matched = if leaf.shape().is_empty() {
        None
    } else {
        candidates
            .iter()
            .enumerate()
            .find(|(_, ext)| ext.data().same_buffer(leaf))
    };

    if let Some((i, ext)) = matched {
        let shadowed = candidates[..i].iter().any(|e| e.name() == ext.name());
        if !shadowed {
            trace!(extension = ext.name(), "array leaf bound to extension");
            return Reference::Source(String::from(ext.name()));
        }
    }

    let index = blocks.store(leaf);
    trace!(index, "array leaf bound to block");
    Reference::Block(index)
}

/// Rebuilds the array an [`ArrayRef`] points at.
///
/// Source references return the extension's own array (same buffer). Block
/// references wrap the loaded block, so every reference to one block shares
/// one buffer.
pub fn resolve(
    array: &ArrayRef,
    candidates: &[&Extension],
    blocks: &BlockStore,
) -> Result<NdArray> {
    let resolved = match &array.reference {
        Reference::Source(name) => candidates
            .iter()
            .find(|ext| ext.name() == name.as_str())
            .map(|ext| ext.data().clone())
            .ok_or_else(|| Error::UnresolvedReference(format!("no extension named {name:?}")))?,
        Reference::Block(index) => {
            let bytes = blocks.load(*index)?;
            NdArray::from_shared(array.dtype, array.shape.clone(), array.byteorder, bytes)
                .map_err(|e| Error::UnresolvedReference(format!("block {index}: {e}")))?
        }
    };

    if resolved.dtype() != array.dtype || resolved.shape() != array.shape.as_slice() {
        return Err(Error::UnresolvedReference(format!(
            "{} holds {} {:?}, tree expects {} {:?}",
            array.reference,
            resolved.dtype(),
            resolved.shape(),
            array.dtype,
            array.shape
        )));
    }
    Ok(resolved)
}
