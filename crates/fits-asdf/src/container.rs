//! In-memory FITS container: an ordered list of named array extensions.
//!
//! A [`Container`] is a plain value. `append` and `without` return new
//! containers and leave the receiver untouched; extensions share their array
//! buffers between copies, so these are cheap.

use std::path::Path;

use tracing::debug;

use crate::array::{DType, NdArray};
use crate::error::{Error, Result};
use crate::hdu::{parse_fits, write_image_hdu};
use crate::header::Card;

/// Name of the extension that carries the embedded metadata document.
pub const METADATA_EXTENSION_NAME: &str = "ASDF";

/// Name given to a primary HDU that carries no EXTNAME.
pub const PRIMARY_NAME: &str = "PRIMARY";

/// Returns `true` if `name` is the reserved metadata extension name.
pub fn is_reserved_name(name: &str) -> bool {
    name.eq_ignore_ascii_case(METADATA_EXTENSION_NAME)
}

/// Longest EXTNAME content a single card holds, after `'` is doubled.
pub const MAX_NAME_LEN: usize = 68;

/// Returns `true` if `name` survives an EXTNAME write and read unchanged:
/// printable ASCII, no trailing blanks and at most [`MAX_NAME_LEN`] bytes
/// once quotes are escaped.
pub fn is_storable_name(name: &str) -> bool {
    let escaped_len: usize = name.bytes().map(|b| if b == b'\'' { 2 } else { 1 }).sum();
    name.bytes().all(|b| matches!(b, b' '..=b'~'))
        && !name.ends_with(' ')
        && escaped_len <= MAX_NAME_LEN
}

/// One named array section of a container.
#[derive(Debug, Clone, PartialEq)]
pub struct Extension {
    name: String,
    header: Vec<Card>,
    data: NdArray,
}

impl Extension {
    /// Creates a user extension. The metadata name is reserved, and names
    /// EXTNAME cannot hold unchanged are rejected (see [`is_storable_name`]).
    pub fn new(name: impl Into<String>, data: NdArray) -> Result<Self> {
        let name = name.into();
        if is_reserved_name(&name) {
            return Err(Error::ReservedName(name));
        }
        if !is_storable_name(&name) {
            return Err(Error::InvalidName(name));
        }
        Ok(Extension {
            name,
            header: Vec::new(),
            data,
        })
    }

    /// The metadata extension holding an encoded payload.
    pub(crate) fn metadata(payload: Vec<u8>) -> Self {
        Extension {
            name: String::from(METADATA_EXTENSION_NAME),
            header: Vec::new(),
            data: NdArray::from_slice(&payload),
        }
    }

    /// Adds header cards. Structural keywords are dropped when written.
    pub fn with_header(mut self, cards: Vec<Card>) -> Self {
        self.header = cards;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// User header cards.
    pub fn header(&self) -> &[Card] {
        &self.header
    }

    /// The extension's array. Clones of it share the buffer.
    pub fn data(&self) -> &NdArray {
        &self.data
    }

    /// `true` for the reserved metadata extension.
    pub fn is_metadata(&self) -> bool {
        is_reserved_name(&self.name)
    }
}

/// An ordered sequence of extensions, persisted as a FITS file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Container {
    extensions: Vec<Extension>,
}

impl Container {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_extensions(extensions: Vec<Extension>) -> Self {
        Container { extensions }
    }

    pub fn extensions(&self) -> &[Extension] {
        &self.extensions
    }

    pub fn len(&self) -> usize {
        self.extensions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.extensions.is_empty()
    }

    /// Extension names in container order.
    pub fn names(&self) -> Vec<&str> {
        self.extensions.iter().map(Extension::name).collect()
    }

    /// First extension with the given name.
    pub fn find(&self, name: &str) -> Option<&Extension> {
        self.extensions.iter().find(|e| e.name == name)
    }

    /// Index of the first extension with the given name.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.extensions.iter().position(|e| e.name == name)
    }

    /// The metadata extension, if present.
    pub fn metadata(&self) -> Option<&Extension> {
        self.extensions.iter().find(|e| e.is_metadata())
    }

    /// Every extension except the metadata one, in order.
    pub fn user_extensions(&self) -> impl Iterator<Item = &Extension> {
        self.extensions.iter().filter(|e| !e.is_metadata())
    }

    /// Adds an extension at the end.
    pub fn push(&mut self, extension: Extension) {
        self.extensions.push(extension);
    }

    /// A copy with `extension` appended.
    pub fn append(&self, extension: Extension) -> Container {
        let mut next = self.clone();
        next.push(extension);
        next
    }

    /// A copy with every extension named `name` removed.
    pub fn without(&self, name: &str) -> Container {
        Container {
            extensions: self
                .extensions
                .iter()
                .filter(|e| e.name != name)
                .cloned()
                .collect(),
        }
    }

    /// Parses a complete FITS byte stream.
    ///
    /// The primary HDU becomes the first extension, named by its EXTNAME or
    /// [`PRIMARY_NAME`].
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let hdus = parse_fits(data)?;
        let mut extensions = Vec::with_capacity(hdus.len());
        for (i, hdu) in hdus.iter().enumerate() {
            let name = match hdu.extname() {
                Some(name) => String::from(name),
                None if i == 0 => String::from(PRIMARY_NAME),
                None => String::new(),
            };
            extensions.push(Extension {
                name,
                header: hdu.user_cards(),
                data: hdu.read_array(data)?,
            });
        }
        debug!(hdus = extensions.len(), bytes = data.len(), "parsed FITS container");
        Ok(Container { extensions })
    }

    /// Serializes to a FITS byte stream.
    ///
    /// The first extension is written as the primary HDU; an empty container
    /// is written as a bare primary HDU with no data.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        match self.extensions.split_first() {
            None => write_image_hdu(&mut out, true, "", &[], &NdArray::empty(DType::UInt8)),
            Some((first, rest)) => {
                let primary_name = if first.name == PRIMARY_NAME {
                    ""
                } else {
                    first.name.as_str()
                };
                write_image_hdu(&mut out, true, primary_name, &first.header, &first.data);
                for ext in rest {
                    write_image_hdu(&mut out, false, &ext.name, &ext.header, &ext.data);
                }
            }
        }
        out
    }

    /// Reads a FITS file.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let data = std::fs::read(path.as_ref())?;
        Self::from_bytes(&data)
    }

    /// Writes a FITS file, replacing any existing file at `path`.
    pub fn write<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let bytes = self.to_bytes();
        std::fs::write(path.as_ref(), &bytes)?;
        debug!(path = %path.as_ref().display(), bytes = bytes.len(), "wrote FITS container");
        Ok(())
    }
}
