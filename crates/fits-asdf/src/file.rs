//! File-backed documents: a FITS container paired with its metadata tree.

use std::path::Path;

use tracing::debug;

use crate::container::Container;
use crate::embed::{EmbedOptions, EmbeddingEngine};
use crate::error::Result;
use crate::tree::Tree;

/// A container and the tree that is (or will be) embedded in it.
#[derive(Debug, Clone)]
pub struct FitsDocument {
    container: Container,
    tree: Tree,
}

impl FitsDocument {
    /// Pairs a container with a tree to embed.
    ///
    /// Any metadata extension already in `container` is handled by the
    /// overwrite policy at write time.
    pub fn new(container: Container, tree: Tree) -> Self {
        FitsDocument { container, tree }
    }

    /// Extracts the tree embedded in `container`.
    pub fn read(container: Container) -> Result<Self> {
        let tree = EmbeddingEngine::default().extract(&container)?;
        Ok(FitsDocument { container, tree })
    }

    /// Opens a FITS file and extracts its tree.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::read(Container::open(path)?)
    }

    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    pub fn container(&self) -> &Container {
        &self.container
    }

    pub fn into_parts(self) -> (Container, Tree) {
        (self.container, self.tree)
    }

    /// The container with the tree embedded.
    pub fn to_container(&self, options: &EmbedOptions) -> Result<Container> {
        EmbeddingEngine::new(*options).embed(&self.tree, &self.container)
    }

    /// Embeds the tree and writes the result to `path`.
    ///
    /// Nothing is written unless embedding succeeds.
    pub fn write_to<P: AsRef<Path>>(&self, path: P, options: &EmbedOptions) -> Result<()> {
        self.to_container(options)?.write(path)
    }
}

/// Opens `input`, embeds `tree` against its extensions and writes `output`.
///
/// Leaves of `tree` can only bind to the input's extensions if they share
/// buffers with them, so callers usually build `tree` from a container they
/// opened themselves; see [`FitsDocument`].
pub fn embed_file<P: AsRef<Path>, Q: AsRef<Path>>(
    input: P,
    output: Q,
    tree: &Tree,
    options: &EmbedOptions,
) -> Result<Container> {
    let container = Container::open(input.as_ref())?;
    let embedded = EmbeddingEngine::new(*options).embed(tree, &container)?;
    embedded.write(output.as_ref())?;
    debug!(
        input = %input.as_ref().display(),
        output = %output.as_ref().display(),
        "embedded metadata into file"
    );
    Ok(embedded)
}
