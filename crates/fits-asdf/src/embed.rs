//! Embedding a metadata tree into a container and extracting it again.
//!
//! The write path walks the tree, binds each array leaf to an extension or a
//! block, encodes the reference-bearing shadow tree and appends the payload
//! as the reserved metadata extension. The read path reverses this against
//! the container it is given. Neither path mutates its inputs.

use tracing::debug;

use crate::array::DType;
use crate::binding::{classify, resolve};
use crate::blocks::{self, BlockStore};
use crate::codec;
use crate::container::{Container, Extension};
use crate::error::{Error, Result};
use crate::node::{ArrayRef, Node, Reference};
use crate::tree::Tree;

/// Fixed preamble of every metadata payload.
pub const ASDF_HEADER: &[u8] = b"#ASDF 1.0.0\n#ASDF_STANDARD 1.0.0\n%YAML 1.1\n---\n";

/// Marker that closes the YAML tree region.
const DOCUMENT_END: &[u8] = b"\n...\n";

/// What `embed` does when the container already holds a metadata extension.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OverwritePolicy {
    /// Refuse with [`Error::DuplicateMetadataExtension`].
    #[default]
    Fail,
    /// Drop the existing metadata extension and append a fresh one.
    Replace,
}

/// Options for [`EmbeddingEngine`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EmbedOptions {
    pub overwrite: OverwritePolicy,
}

impl EmbedOptions {
    pub fn with_overwrite(mut self, overwrite: OverwritePolicy) -> Self {
        self.overwrite = overwrite;
        self
    }
}

/// A parsed metadata payload, split into its tree and block regions.
#[derive(Debug, Clone, Copy)]
pub struct MetadataPayload<'a> {
    tree: &'a [u8],
    blocks: &'a [u8],
}

impl<'a> MetadataPayload<'a> {
    /// Splits `bytes` at the end of the YAML document.
    pub fn parse(bytes: &'a [u8]) -> Result<Self> {
        if !bytes.starts_with(ASDF_HEADER) {
            return Err(Error::InvalidPayload("missing ASDF header"));
        }
        // Search from the header's final newline so an empty document still matches.
        let search_from = ASDF_HEADER.len() - 1;
        let end = bytes[search_from..]
            .windows(DOCUMENT_END.len())
            .position(|w| w == DOCUMENT_END)
            .map(|p| search_from + p)
            .ok_or(Error::InvalidPayload("unterminated YAML document"))?;
        Ok(MetadataPayload {
            tree: &bytes[ASDF_HEADER.len()..end + 1],
            blocks: &bytes[end + DOCUMENT_END.len()..],
        })
    }

    /// The encoded YAML tree.
    pub fn tree_bytes(&self) -> &'a [u8] {
        self.tree
    }

    /// The serialized block region.
    pub fn block_bytes(&self) -> &'a [u8] {
        self.blocks
    }

    /// Number of blocks in the payload.
    pub fn block_count(&self) -> Result<usize> {
        blocks::block_count(self.blocks)
    }
}

fn bind(tree: &Tree, candidates: &[&Extension], blocks: &mut BlockStore) -> Node {
    match tree {
        Tree::Null => Node::Null,
        Tree::Bool(b) => Node::Bool(*b),
        Tree::Int(i) => Node::Int(*i),
        Tree::Float(f) => Node::Float(*f),
        Tree::String(s) => Node::String(s.clone()),
        Tree::Sequence(items) => Node::Sequence(
            items
                .iter()
                .map(|t| bind(t, candidates, blocks))
                .collect(),
        ),
        Tree::Mapping(map) => Node::Mapping(
            map.iter()
                .map(|(k, v)| (k.clone(), bind(v, candidates, blocks)))
                .collect(),
        ),
        Tree::Array(leaf) => Node::Array(ArrayRef {
            reference: classify(leaf, candidates, blocks),
            dtype: leaf.dtype(),
            shape: leaf.shape().to_vec(),
            byteorder: leaf.byteorder(),
        }),
    }
}

fn unbind(node: Node, candidates: &[&Extension], blocks: &BlockStore) -> Result<Tree> {
    Ok(match node {
        Node::Null => Tree::Null,
        Node::Bool(b) => Tree::Bool(b),
        Node::Int(i) => Tree::Int(i),
        Node::Float(f) => Tree::Float(f),
        Node::String(s) => Tree::String(s),
        Node::Sequence(items) => Tree::Sequence(
            items
                .into_iter()
                .map(|n| unbind(n, candidates, blocks))
                .collect::<Result<_>>()?,
        ),
        Node::Mapping(map) => Tree::Mapping(
            map.into_iter()
                .map(|(k, v)| Ok((k, unbind(v, candidates, blocks)?)))
                .collect::<Result<_>>()?,
        ),
        Node::Array(array) => Tree::Array(resolve(&array, candidates, blocks)?),
    })
}

/// Encodes `tree` as a metadata payload, binding array leaves to `candidates`.
pub fn encode_payload(tree: &Tree, candidates: &[&Extension]) -> Result<Vec<u8>> {
    let mut blocks = BlockStore::new();
    let shadow = bind(tree, candidates, &mut blocks);
    let yaml = codec::encode(&shadow)?;

    let mut out = Vec::with_capacity(ASDF_HEADER.len() + yaml.len() + DOCUMENT_END.len());
    out.extend_from_slice(ASDF_HEADER);
    out.extend_from_slice(&yaml);
    if !out.ends_with(b"\n") {
        out.push(b'\n');
    }
    out.extend_from_slice(&DOCUMENT_END[1..]);
    blocks.write_to(&mut out);

    let sources = shadow
        .refs()
        .iter()
        .filter(|r| matches!(r.reference, Reference::Source(_)))
        .count();
    debug!(
        sources,
        blocks = blocks.len(),
        bytes = out.len(),
        "encoded metadata payload"
    );
    Ok(out)
}

/// Decodes a metadata payload, resolving source references against `candidates`.
pub fn decode_payload(bytes: &[u8], candidates: &[&Extension]) -> Result<Tree> {
    let payload = MetadataPayload::parse(bytes)?;
    let blocks = BlockStore::read(payload.block_bytes())?;
    let shadow = codec::decode(payload.tree_bytes())?;
    let tree = unbind(shadow, candidates, &blocks)?;
    debug!(blocks = blocks.len(), bytes = bytes.len(), "decoded metadata payload");
    Ok(tree)
}

/// Embeds and extracts metadata trees under a fixed set of options.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmbeddingEngine {
    options: EmbedOptions,
}

impl EmbeddingEngine {
    pub fn new(options: EmbedOptions) -> Self {
        EmbeddingEngine { options }
    }

    pub fn options(&self) -> EmbedOptions {
        self.options
    }

    /// Returns a copy of `container` with `tree` appended as the metadata extension.
    ///
    /// Array leaves that share a buffer with one of the container's
    /// extensions are stored as references to it; all others are written to
    /// the payload's block store.
    pub fn embed(&self, tree: &Tree, container: &Container) -> Result<Container> {
        let base = match (container.metadata(), self.options.overwrite) {
            (None, _) => container.clone(),
            (Some(_), OverwritePolicy::Fail) => return Err(Error::DuplicateMetadataExtension),
            (Some(_), OverwritePolicy::Replace) => {
                debug!("replacing existing metadata extension");
                Container::from_extensions(container.user_extensions().cloned().collect())
            }
        };
        let candidates: Vec<&Extension> = base.user_extensions().collect();
        let payload = encode_payload(tree, &candidates)?;
        debug!(extensions = candidates.len(), "embedding metadata");
        Ok(base.append(Extension::metadata(payload)))
    }

    /// Rebuilds the tree stored in `container`'s metadata extension.
    ///
    /// Source-bound leaves come back as the container's own arrays.
    pub fn extract(&self, container: &Container) -> Result<Tree> {
        let mut found = container.extensions().iter().filter(|e| e.is_metadata());
        let metadata = found.next().ok_or(Error::MissingMetadataExtension)?;
        if found.next().is_some() {
            return Err(Error::DuplicateMetadataExtension);
        }
        if metadata.data().dtype() != DType::UInt8 {
            return Err(Error::InvalidPayload("metadata extension is not a byte array"));
        }
        let candidates: Vec<&Extension> = container.user_extensions().collect();
        decode_payload(metadata.data().as_bytes(), &candidates)
    }
}

/// [`EmbeddingEngine::embed`] with default options.
pub fn embed(tree: &Tree, container: &Container) -> Result<Container> {
    EmbeddingEngine::default().embed(tree, container)
}

/// [`EmbeddingEngine::extract`] with default options.
pub fn extract(container: &Container) -> Result<Tree> {
    EmbeddingEngine::default().extract(container)
}
