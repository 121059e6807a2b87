//! The block store: opaque array payloads addressed by position.
//!
//! Serialized layout, all integers big-endian:
//!
//! ```text
//! magic     4 bytes   \xd3 B L K
//! count     u32
//! directory count x (offset u64, length u64), offsets relative to the data area
//! data      concatenated block bytes
//! ```

use std::sync::Arc;

use tracing::trace;

use crate::array::{BufferId, NdArray};
use crate::error::{Error, Result};

/// Leading bytes of a serialized block region.
pub const BLOCK_MAGIC: [u8; 4] = [0xd3, b'B', b'L', b'K'];

const COUNT_LEN: usize = 4;
const ENTRY_LEN: usize = 16;

/// Blocks collected during one write, or loaded for one read.
#[derive(Debug, Default)]
pub struct BlockStore {
    blocks: Vec<Arc<[u8]>>,
    by_buffer: Vec<(BufferId, usize)>,
}

impl BlockStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an array's bytes and returns its 0-based index.
    ///
    /// The buffer is shared, not copied. An array whose buffer is already
    /// stored gets the existing index.
    pub fn store(&mut self, array: &NdArray) -> usize {
        let id = array.buffer_id();
        if let Some(&(_, index)) = self.by_buffer.iter().find(|(b, _)| *b == id) {
            return index;
        }
        let index = self.blocks.len();
        self.blocks.push(Arc::clone(array.shared_bytes()));
        self.by_buffer.push((id, index));
        trace!(index, bytes = array.as_bytes().len(), "stored block");
        index
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Appends the serialized block region to `out`.
    pub fn write_to(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&BLOCK_MAGIC);
        out.extend_from_slice(&(self.blocks.len() as u32).to_be_bytes());
        let mut offset = 0u64;
        for block in &self.blocks {
            let len = block.len() as u64;
            out.extend_from_slice(&offset.to_be_bytes());
            out.extend_from_slice(&len.to_be_bytes());
            offset += len;
        }
        for block in &self.blocks {
            out.extend_from_slice(block);
        }
    }

    /// Parses a block region, validating every directory entry.
    pub fn read(region: &[u8]) -> Result<Self> {
        let directory = Directory::parse(region)?;
        let blocks = (0..directory.count)
            .map(|i| directory.block(region, i).map(Arc::from))
            .collect::<Result<Vec<_>>>()?;
        Ok(BlockStore {
            blocks,
            by_buffer: Vec::new(),
        })
    }

    /// The shared bytes of block `index`. Repeated loads return the same buffer.
    pub fn load(&self, index: usize) -> Result<Arc<[u8]>> {
        self.blocks
            .get(index)
            .cloned()
            .ok_or_else(|| Error::UnresolvedReference(format!("block {index} of {}", self.len())))
    }
}

/// Borrows block `index` straight out of a serialized region.
///
/// Only the directory and the requested block are examined.
pub fn read_block(region: &[u8], index: usize) -> Result<&[u8]> {
    let directory = Directory::parse(region)?;
    if index >= directory.count {
        return Err(Error::UnresolvedReference(format!(
            "block {index} of {}",
            directory.count
        )));
    }
    directory.block(region, index)
}

/// Number of blocks recorded in a serialized region.
pub fn block_count(region: &[u8]) -> Result<usize> {
    Directory::parse(region).map(|d| d.count)
}

struct Directory {
    count: usize,
    data_start: usize,
}

impl Directory {
    fn parse(region: &[u8]) -> Result<Self> {
        if region.get(..BLOCK_MAGIC.len()) != Some(&BLOCK_MAGIC[..]) {
            return Err(Error::InvalidPayload("bad block magic"));
        }
        let count_at = BLOCK_MAGIC.len();
        let count = region
            .get(count_at..count_at + COUNT_LEN)
            .and_then(|b| <[u8; 4]>::try_from(b).ok())
            .map(u32::from_be_bytes)
            .ok_or(Error::InvalidPayload("truncated block count"))? as usize;
        let data_start = count
            .checked_mul(ENTRY_LEN)
            .and_then(|n| n.checked_add(count_at + COUNT_LEN))
            .filter(|&end| end <= region.len())
            .ok_or(Error::InvalidPayload("truncated block directory"))?;
        Ok(Directory { count, data_start })
    }

    fn entry(&self, region: &[u8], index: usize) -> (u64, u64) {
        let at = BLOCK_MAGIC.len() + COUNT_LEN + index * ENTRY_LEN;
        let word = |i: usize| {
            let mut buf = [0u8; 8];
            buf.copy_from_slice(&region[i..i + 8]);
            u64::from_be_bytes(buf)
        };
        (word(at), word(at + 8))
    }

    fn block<'a>(&self, region: &'a [u8], index: usize) -> Result<&'a [u8]> {
        let (offset, len) = self.entry(region, index);
        let data = &region[self.data_start..];
        let bounds = Error::Bounds {
            index,
            offset,
            end: offset.saturating_add(len),
            available: data.len(),
        };
        let Some(end) = offset.checked_add(len) else {
            return Err(bounds);
        };
        let (Ok(start), Ok(end)) = (usize::try_from(offset), usize::try_from(end)) else {
            return Err(bounds);
        };
        data.get(start..end).ok_or(bounds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_blocks() -> (BlockStore, Vec<u8>) {
        let mut store = BlockStore::new();
        assert_eq!(store.store(&NdArray::from_slice(&[1u8, 2, 3])), 0);
        assert_eq!(store.store(&NdArray::from_slice(&[9i16])), 1);
        let mut out = Vec::new();
        store.write_to(&mut out);
        (store, out)
    }

    #[test]
    fn layout() {
        let (_, out) = two_blocks();
        assert_eq!(&out[..4], &BLOCK_MAGIC);
        assert_eq!(&out[4..8], &2u32.to_be_bytes());
        assert_eq!(out.len(), 8 + 2 * ENTRY_LEN + 3 + 2);
    }

    #[test]
    fn read_and_load() {
        let (_, out) = two_blocks();
        let store = BlockStore::read(&out).unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(&store.load(0).unwrap()[..], &[1u8, 2, 3]);
        assert!(Arc::ptr_eq(&store.load(1).unwrap(), &store.load(1).unwrap()));
        assert!(matches!(store.load(2), Err(Error::UnresolvedReference(_))));
    }

    #[test]
    fn store_shares_buffer_and_dedups_aliases() {
        let a = NdArray::from_slice(&[5.0f64; 4]);
        let mut store = BlockStore::new();
        assert_eq!(store.store(&a), 0);
        assert_eq!(store.store(&a.clone()), 0);
        assert_eq!(store.store(&NdArray::from_slice(&[5.0f64; 4])), 1);
        assert!(Arc::ptr_eq(&store.load(0).unwrap(), a.shared_bytes()));
    }

    #[test]
    fn read_block_seeks_directly() {
        let (_, out) = two_blocks();
        assert_eq!(read_block(&out, 1).unwrap(), &9i16.to_ne_bytes());
        assert_eq!(block_count(&out).unwrap(), 2);
        assert!(matches!(read_block(&out, 5), Err(Error::UnresolvedReference(_))));
    }

    #[test]
    fn empty_store() {
        let mut out = Vec::new();
        BlockStore::new().write_to(&mut out);
        assert_eq!(out.len(), 8);
        assert!(BlockStore::read(&out).unwrap().is_empty());
    }

    #[test]
    fn entry_past_data_area_is_bounds_error() {
        let (_, mut out) = two_blocks();
        // Second entry's length.
        let at = 8 + ENTRY_LEN + 8;
        out[at..at + 8].copy_from_slice(&100u64.to_be_bytes());
        let err = BlockStore::read(&out).unwrap_err();
        assert!(matches!(
            err,
            Error::Bounds {
                index: 1,
                offset: 3,
                end: 103,
                available: 5
            }
        ));
        assert_eq!(read_block(&out, 0).unwrap(), &[1u8, 2, 3]);
    }

    #[test]
    fn overflowing_entry_is_bounds_error() {
        let (_, mut out) = two_blocks();
        out[8..16].copy_from_slice(&u64::MAX.to_be_bytes());
        assert!(matches!(
            BlockStore::read(&out),
            Err(Error::Bounds { index: 0, .. })
        ));
    }

    #[test]
    fn bad_magic_and_truncation() {
        assert!(matches!(
            BlockStore::read(b"XBLK\0\0\0\0"),
            Err(Error::InvalidPayload("bad block magic"))
        ));
        assert!(matches!(
            BlockStore::read(&[0xd3, b'B', b'L', b'K', 0]),
            Err(Error::InvalidPayload("truncated block count"))
        ));
        let (_, out) = two_blocks();
        assert!(matches!(
            BlockStore::read(&out[..20]),
            Err(Error::InvalidPayload("truncated block directory"))
        ));
    }
}
