/// All errors that can occur while reading, writing, embedding or extracting.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Malformed FITS header block.
    #[error("invalid FITS header: {0}")]
    InvalidHeader(&'static str),
    /// Premature end of data while reading.
    #[error("unexpected end of file")]
    UnexpectedEof,
    /// Unrecognized BITPIX value.
    #[error("invalid BITPIX value: {0}")]
    InvalidBitpix(i64),
    /// Malformed keyword name in a header card.
    #[error("invalid keyword name")]
    InvalidKeyword,
    /// Unknown or unsupported XTENSION type.
    #[error("unsupported XTENSION type: {0}")]
    UnsupportedExtension(&'static str),
    /// A required keyword was not found in the header.
    #[error("missing required keyword: {0}")]
    MissingKeyword(&'static str),

    /// Buffer length does not match the declared shape and element type.
    #[error("array shape needs {expected} bytes, buffer holds {actual}")]
    ShapeMismatch { expected: usize, actual: usize },
    /// Typed access with an element type other than the array's own.
    #[error("array holds {actual}, requested {requested}")]
    DTypeMismatch {
        requested: &'static str,
        actual: &'static str,
    },
    /// An extension name collides with the reserved metadata extension name.
    #[error("extension name {0:?} is reserved for embedded metadata")]
    ReservedName(String),
    /// An extension name that EXTNAME cannot store unchanged.
    #[error("extension name {0:?} cannot be stored as EXTNAME")]
    InvalidName(String),

    /// The tree holds a value the structural codec cannot represent.
    #[error("unsupported tree value: {0}")]
    UnsupportedType(String),
    /// The container already carries a metadata extension.
    #[error("container already holds an embedded metadata extension")]
    DuplicateMetadataExtension,
    /// The container has no metadata extension to extract.
    #[error("container holds no embedded metadata extension")]
    MissingMetadataExtension,
    /// A decoded array reference points at nothing.
    #[error("unresolved array reference: {0}")]
    UnresolvedReference(String),
    /// A block directory entry points outside the payload.
    #[error("block {index} spans {offset}..{end}, data area holds {available} bytes")]
    Bounds {
        index: usize,
        offset: u64,
        end: u64,
        available: usize,
    },
    /// The metadata payload framing is malformed.
    #[error("invalid metadata payload: {0}")]
    InvalidPayload(&'static str),
    /// The decoded tree is structurally malformed.
    #[error("invalid tree: {0}")]
    InvalidTree(String),

    /// YAML (de)serialization failure.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    /// An I/O error from the standard library.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = core::result::Result<T, Error>;
