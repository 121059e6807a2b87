//! N-dimensional array leaves with shared, identity-bearing buffers.
//!
//! An [`NdArray`] owns its bytes through an `Arc<[u8]>`. Cloning an array
//! clones the handle, not the bytes, so a clone is *the same array* for the
//! purposes of [`NdArray::same_buffer`]. Value equality (`==`) ignores buffer
//! identity and byte order and compares element values.

use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use bytemuck::{pod_collect_to_vec, Pod};

use crate::error::{Error, Result};

/// Element type of an array, covering the six FITS BITPIX types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DType {
    UInt8,
    Int16,
    Int32,
    Int64,
    Float32,
    Float64,
}

impl DType {
    /// Size of one element in bytes.
    pub const fn itemsize(self) -> usize {
        match self {
            DType::UInt8 => 1,
            DType::Int16 => 2,
            DType::Int32 | DType::Float32 => 4,
            DType::Int64 | DType::Float64 => 8,
        }
    }

    /// The FITS BITPIX value for this element type.
    pub const fn bitpix(self) -> i64 {
        match self {
            DType::UInt8 => 8,
            DType::Int16 => 16,
            DType::Int32 => 32,
            DType::Int64 => 64,
            DType::Float32 => -32,
            DType::Float64 => -64,
        }
    }

    /// Maps a BITPIX value back to an element type.
    pub fn from_bitpix(bitpix: i64) -> Result<Self> {
        match bitpix {
            8 => Ok(DType::UInt8),
            16 => Ok(DType::Int16),
            32 => Ok(DType::Int32),
            64 => Ok(DType::Int64),
            -32 => Ok(DType::Float32),
            -64 => Ok(DType::Float64),
            other => Err(Error::InvalidBitpix(other)),
        }
    }

    /// The ASDF `datatype` name.
    pub const fn name(self) -> &'static str {
        match self {
            DType::UInt8 => "uint8",
            DType::Int16 => "int16",
            DType::Int32 => "int32",
            DType::Int64 => "int64",
            DType::Float32 => "float32",
            DType::Float64 => "float64",
        }
    }

    /// Parses an ASDF `datatype` name.
    pub fn from_name(name: &str) -> Option<Self> {
        [
            DType::UInt8,
            DType::Int16,
            DType::Int32,
            DType::Int64,
            DType::Float32,
            DType::Float64,
        ]
        .into_iter()
        .find(|d| d.name() == name)
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Byte order of the elements in a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ByteOrder {
    Big,
    Little,
}

impl ByteOrder {
    /// The byte order of the running platform.
    pub const fn native() -> Self {
        if cfg!(target_endian = "big") {
            ByteOrder::Big
        } else {
            ByteOrder::Little
        }
    }

    /// The ASDF `byteorder` name.
    pub const fn name(self) -> &'static str {
        match self {
            ByteOrder::Big => "big",
            ByteOrder::Little => "little",
        }
    }

    /// Parses an ASDF `byteorder` name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "big" => Some(ByteOrder::Big),
            "little" => Some(ByteOrder::Little),
            _ => None,
        }
    }
}

/// Rust element types that can back an [`NdArray`].
pub trait Element: Pod {
    const DTYPE: DType;
}

impl Element for u8 {
    const DTYPE: DType = DType::UInt8;
}
impl Element for i16 {
    const DTYPE: DType = DType::Int16;
}
impl Element for i32 {
    const DTYPE: DType = DType::Int32;
}
impl Element for i64 {
    const DTYPE: DType = DType::Int64;
}
impl Element for f32 {
    const DTYPE: DType = DType::Float32;
}
impl Element for f64 {
    const DTYPE: DType = DType::Float64;
}

/// Reverses the bytes of every `width`-byte element in place.
pub(crate) fn swap_elements(buf: &mut [u8], width: usize) {
    if width > 1 {
        for chunk in buf.chunks_exact_mut(width) {
            chunk.reverse();
        }
    }
}

/// Opaque identity token of an array buffer. Equal tokens mean the same allocation
/// (valid while both arrays are alive).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferId(usize);

/// A dense, row-major n-dimensional array.
#[derive(Clone)]
pub struct NdArray {
    dtype: DType,
    shape: Vec<usize>,
    byteorder: ByteOrder,
    data: Arc<[u8]>,
}

fn expected_len(dtype: DType, shape: &[usize]) -> usize {
    shape.iter().product::<usize>() * dtype.itemsize()
}

impl NdArray {
    /// Wraps an existing buffer. `data.len()` must equal `product(shape) * itemsize`.
    pub fn from_shared(
        dtype: DType,
        shape: Vec<usize>,
        byteorder: ByteOrder,
        data: Arc<[u8]>,
    ) -> Result<Self> {
        let expected = expected_len(dtype, &shape);
        if data.len() != expected {
            return Err(Error::ShapeMismatch {
                expected,
                actual: data.len(),
            });
        }
        Ok(NdArray {
            dtype,
            shape,
            byteorder,
            data,
        })
    }

    /// Takes ownership of raw bytes in the given order.
    pub fn from_bytes(
        dtype: DType,
        shape: Vec<usize>,
        byteorder: ByteOrder,
        bytes: Vec<u8>,
    ) -> Result<Self> {
        Self::from_shared(dtype, shape, byteorder, Arc::from(bytes))
    }

    /// Builds a native-order array from typed values.
    pub fn from_vec<T: Element>(shape: Vec<usize>, values: Vec<T>) -> Result<Self> {
        let bytes: Vec<u8> = pod_collect_to_vec(values.as_slice());
        Self::from_bytes(T::DTYPE, shape, ByteOrder::native(), bytes)
    }

    /// A one-dimensional native-order array.
    pub fn from_slice<T: Element>(values: &[T]) -> Self {
        NdArray {
            dtype: T::DTYPE,
            shape: vec![values.len()],
            byteorder: ByteOrder::native(),
            data: Arc::from(pod_collect_to_vec::<T, u8>(values)),
        }
    }

    /// A zero-length array of the given element type.
    pub fn empty(dtype: DType) -> Self {
        NdArray {
            dtype,
            shape: vec![0],
            byteorder: ByteOrder::Big,
            data: Arc::from(Vec::new()),
        }
    }

    pub fn dtype(&self) -> DType {
        self.dtype
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn byteorder(&self) -> ByteOrder {
        self.byteorder
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.shape.iter().product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Raw bytes in [`Self::byteorder`].
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// The shared buffer handle.
    pub fn shared_bytes(&self) -> &Arc<[u8]> {
        &self.data
    }

    /// Identity of the underlying buffer.
    pub fn buffer_id(&self) -> BufferId {
        BufferId(Arc::as_ptr(&self.data) as *const u8 as usize)
    }

    /// Buffer identity: `true` only when both arrays share one allocation.
    ///
    /// This is deliberately not `==`, which compares values.
    pub fn same_buffer(&self, other: &NdArray) -> bool {
        Arc::ptr_eq(&self.data, &other.data)
    }

    /// The bytes in the requested order, borrowing when no swap is needed.
    pub fn bytes_in(&self, order: ByteOrder) -> Cow<'_, [u8]> {
        if order == self.byteorder {
            Cow::Borrowed(&self.data[..])
        } else {
            let mut owned = self.data.to_vec();
            swap_elements(&mut owned, self.dtype.itemsize());
            Cow::Owned(owned)
        }
    }

    /// Copies the elements out in native order.
    pub fn to_vec<T: Element>(&self) -> Result<Vec<T>> {
        if T::DTYPE != self.dtype {
            return Err(Error::DTypeMismatch {
                requested: T::DTYPE.name(),
                actual: self.dtype.name(),
            });
        }
        let native = self.bytes_in(ByteOrder::native());
        Ok(pod_collect_to_vec(&native[..]))
    }
}

/// Value equality: dtype, shape and element bits, regardless of buffer or byte order.
impl PartialEq for NdArray {
    fn eq(&self, other: &Self) -> bool {
        self.dtype == other.dtype
            && self.shape == other.shape
            && (self.same_buffer(other)
                || self.bytes_in(ByteOrder::Big) == other.bytes_in(ByteOrder::Big))
    }
}

impl fmt::Debug for NdArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NdArray")
            .field("dtype", &self.dtype)
            .field("shape", &self.shape)
            .field("byteorder", &self.byteorder)
            .field("bytes", &self.data.len())
            .finish()
    }
}
