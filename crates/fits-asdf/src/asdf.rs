//! Standalone ASDF documents.
//!
//! The metadata payload is a complete document on its own. Written outside
//! a container every array goes into the block store; read outside one, any
//! extension reference is unresolved.

use std::path::Path;

use tracing::debug;

use crate::embed::{decode_payload, encode_payload};
use crate::error::Result;
use crate::tree::Tree;

/// Encodes `tree` with every array stored inline.
pub fn to_bytes(tree: &Tree) -> Result<Vec<u8>> {
    encode_payload(tree, &[])
}

/// Decodes a standalone document.
pub fn from_bytes(bytes: &[u8]) -> Result<Tree> {
    decode_payload(bytes, &[])
}

/// Writes `tree` as a standalone document, replacing any file at `path`.
pub fn write_file<P: AsRef<Path>>(tree: &Tree, path: P) -> Result<()> {
    let bytes = to_bytes(tree)?;
    std::fs::write(path.as_ref(), &bytes)?;
    debug!(path = %path.as_ref().display(), bytes = bytes.len(), "wrote ASDF document");
    Ok(())
}

/// Reads a standalone document.
pub fn read_file<P: AsRef<Path>>(path: P) -> Result<Tree> {
    from_bytes(&std::fs::read(path.as_ref())?)
}
