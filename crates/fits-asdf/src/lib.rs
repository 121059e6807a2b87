//! Embed ASDF metadata trees in FITS files.
//!
//! A [`Tree`] whose array leaves already live in a [`Container`]'s
//! extensions is embedded as one extra `ASDF` extension that refers to those
//! extensions by name instead of copying their bytes. Other arrays go into
//! the payload's block store. [`extract`] reverses the process and hands back
//! the container's own arrays for every extension reference.
//!
//! ```no_run
//! use fits_asdf::{embed, extract, Container, Extension, NdArray, Tree};
//!
//! let sci = NdArray::from_slice(&[1.0f64, 2.0, 3.0]);
//! let container = Container::from_extensions(vec![Extension::new("SCI", sci.clone())?]);
//! let tree = Tree::mapping().with("sci", &sci).with("wcs", "WCS info");
//!
//! let embedded = embed(&tree, &container)?;
//! embedded.write("out.fits")?;
//!
//! let back = extract(&Container::open("out.fits")?)?;
//! assert_eq!(back, tree);
//! # Ok::<(), fits_asdf::Error>(())
//! ```

pub mod array;
pub mod asdf;
pub mod binding;
pub mod block;
pub mod blocks;
pub mod codec;
pub mod compare;
pub mod container;
pub mod embed;
pub mod error;
pub mod file;
pub mod hdu;
pub mod header;
pub mod node;
pub mod tree;
pub mod value;

#[cfg(feature = "array")]
mod ndarray_compat;

pub use array::{ByteOrder, DType, Element, NdArray};
pub use block::{BLOCK_SIZE, CARDS_PER_BLOCK, CARD_SIZE};
pub use compare::{assert_tree_match, tree_diff, TreeMismatch};
pub use container::{Container, Extension, METADATA_EXTENSION_NAME};
pub use embed::{
    embed, extract, EmbedOptions, EmbeddingEngine, MetadataPayload, OverwritePolicy,
};
pub use error::{Error, Result};
pub use file::{embed_file, FitsDocument};
pub use node::{ArrayRef, Node, Reference};
pub use tree::{Mapping, Tree};
