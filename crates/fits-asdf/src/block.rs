//! FITS logical record sizes.

/// FITS block size in bytes. Every header and data segment is a whole number of blocks.
pub const BLOCK_SIZE: usize = 2880;

/// FITS card (keyword record) size in bytes.
pub const CARD_SIZE: usize = 80;

/// Number of cards that fit in a single block.
pub const CARDS_PER_BLOCK: usize = BLOCK_SIZE / CARD_SIZE;

/// Padding byte for header blocks (ASCII space).
pub const HEADER_PAD_BYTE: u8 = 0x20;

/// Padding byte for data blocks.
pub const DATA_PAD_BYTE: u8 = 0x00;

/// Returns the number of FITS blocks required to hold `num_bytes` bytes.
pub const fn blocks_needed(num_bytes: usize) -> usize {
    num_bytes.div_ceil(BLOCK_SIZE)
}

/// Returns `num_bytes` rounded up to a whole number of blocks.
pub const fn padded_byte_len(num_bytes: usize) -> usize {
    blocks_needed(num_bytes) * BLOCK_SIZE
}

/// Like [`padded_byte_len`], but `None` where the rounded length overflows.
pub const fn checked_padded_byte_len(num_bytes: usize) -> Option<usize> {
    blocks_needed(num_bytes).checked_mul(BLOCK_SIZE)
}

/// Appends `src` to `dest` followed by `DATA_PAD_BYTE` up to the next block boundary.
pub fn extend_padded(dest: &mut Vec<u8>, src: &[u8]) {
    dest.extend_from_slice(src);
    let pad = padded_byte_len(src.len()) - src.len();
    dest.resize(dest.len() + pad, DATA_PAD_BYTE);
}
