//! Header Data Unit layout: locating image HDUs in a FITS byte stream and
//! writing them back out.

use crate::array::{ByteOrder, DType, NdArray};
use crate::block::{checked_padded_byte_len, extend_padded, BLOCK_SIZE};
use crate::error::{Error, Result};
use crate::header::{
    card_integer, card_string, header_byte_len, parse_header_blocks, serialize_header, Card,
};
use crate::value::Value;

/// Keywords the writer regenerates; they never appear in [`Hdu::user_cards`].
const STRUCTURAL_KEYWORDS: [&str; 7] = [
    "SIMPLE", "XTENSION", "BITPIX", "PCOUNT", "GCOUNT", "EXTEND", "EXTNAME",
];

fn is_structural(card: &Card) -> bool {
    let name = card.keyword_str();
    STRUCTURAL_KEYWORDS.contains(&name)
        || name
            .strip_prefix("NAXIS")
            .is_some_and(|rest| rest.bytes().all(|b| b.is_ascii_digit()))
}

/// A single image HDU located within a FITS byte stream.
#[derive(Debug, Clone)]
pub struct Hdu {
    /// All header cards, END excluded.
    pub cards: Vec<Card>,
    /// BITPIX value.
    pub bitpix: i64,
    /// Axis lengths in FITS order (NAXIS1 first).
    pub naxes: Vec<usize>,
    /// Byte offset where the data segment begins.
    pub data_start: usize,
    /// Length of the data segment in bytes (unpadded).
    pub data_len: usize,
}

impl Hdu {
    /// EXTNAME, if present.
    pub fn extname(&self) -> Option<&str> {
        card_string(&self.cards, "EXTNAME")
    }

    /// Header cards the writer does not regenerate.
    pub fn user_cards(&self) -> Vec<Card> {
        self.cards.iter().filter(|c| !is_structural(c)).cloned().collect()
    }

    /// Copies the data segment into a big-endian array.
    ///
    /// FITS axes are reversed into row-major order; NAXIS=0 gives shape `[0]`.
    /// An axis of length zero keeps the other axis lengths.
    pub fn read_array(&self, fits_data: &[u8]) -> Result<NdArray> {
        let dtype = DType::from_bitpix(self.bitpix)?;
        if self.naxes.is_empty() {
            return Ok(NdArray::empty(dtype));
        }
        let raw = self
            .data_start
            .checked_add(self.data_len)
            .and_then(|end| fits_data.get(self.data_start..end))
            .ok_or(Error::UnexpectedEof)?;
        let shape = self.naxes.iter().rev().copied().collect();
        NdArray::from_bytes(dtype, shape, ByteOrder::Big, raw.to_vec())
    }
}

fn naxis_values(cards: &[Card]) -> Result<Vec<usize>> {
    let naxis = card_integer(cards, "NAXIS").ok_or(Error::MissingKeyword("NAXIS"))?;
    if naxis < 0 {
        return Err(Error::InvalidHeader("negative NAXIS"));
    }
    (1..=naxis)
        .map(|i| {
            let dim = card_integer(cards, &format!("NAXIS{i}"))
                .ok_or(Error::MissingKeyword("NAXISn"))?;
            usize::try_from(dim).map_err(|_| Error::InvalidHeader("negative NAXISn"))
        })
        .collect()
}

fn parse_hdu(data: &[u8], offset: usize, is_primary: bool) -> Result<Hdu> {
    let remaining = &data[offset..];
    let header_len = header_byte_len(remaining)?;
    let cards = parse_header_blocks(&remaining[..header_len])?;

    let first = cards.first().map(Card::keyword_str);
    if is_primary {
        if first != Some("SIMPLE") {
            return Err(Error::InvalidHeader("first HDU must be primary"));
        }
    } else {
        match card_string(&cards, "XTENSION") {
            Some("IMAGE") => {}
            Some("BINTABLE") => return Err(Error::UnsupportedExtension("BINTABLE")),
            Some("TABLE") => return Err(Error::UnsupportedExtension("TABLE")),
            Some(_) => return Err(Error::UnsupportedExtension("unknown XTENSION")),
            None => return Err(Error::MissingKeyword("XTENSION")),
        }
    }

    let bitpix = card_integer(&cards, "BITPIX").ok_or(Error::MissingKeyword("BITPIX"))?;
    let itemsize = DType::from_bitpix(bitpix)?.itemsize();
    let naxes = naxis_values(&cards)?;

    if card_integer(&cards, "PCOUNT").is_some_and(|p| p != 0)
        || card_integer(&cards, "GCOUNT").is_some_and(|g| g != 1)
    {
        return Err(Error::UnsupportedExtension("random groups"));
    }

    let data_len = if naxes.is_empty() {
        0
    } else {
        naxes
            .iter()
            .try_fold(itemsize, |acc, &d| acc.checked_mul(d))
            .ok_or(Error::InvalidHeader("data size overflow"))?
    };
    let data_start = offset + header_len;
    // Trailing block padding may be missing, the data bytes may not.
    data_start
        .checked_add(data_len)
        .filter(|&end| end <= data.len())
        .ok_or(Error::UnexpectedEof)?;

    Ok(Hdu {
        cards,
        bitpix,
        naxes,
        data_start,
        data_len,
    })
}

/// Locate every HDU in a complete FITS byte stream.
pub fn parse_fits(data: &[u8]) -> Result<Vec<Hdu>> {
    if data.len() < BLOCK_SIZE {
        return Err(Error::UnexpectedEof);
    }

    let mut hdus = Vec::new();
    let mut offset = 0;
    while data.len() - offset >= BLOCK_SIZE {
        let hdu = parse_hdu(data, offset, hdus.is_empty())?;
        let next = checked_padded_byte_len(hdu.data_len)
            .and_then(|padded| hdu.data_start.checked_add(padded));
        hdus.push(hdu);
        match next {
            Some(next) if next < data.len() => offset = next,
            _ => break,
        }
    }
    Ok(hdus)
}

/// Appends one image HDU (header and padded big-endian data) to `out`.
///
/// `primary` selects SIMPLE/EXTEND over XTENSION/PCOUNT/GCOUNT. `name`
/// becomes EXTNAME unless empty. `user_cards` follow the structural ones.
pub fn write_image_hdu(
    out: &mut Vec<u8>,
    primary: bool,
    name: &str,
    user_cards: &[Card],
    array: &NdArray,
) {
    // Zero-dimensional arrays are written as a single-element axis. Empty
    // arrays keep their axes, NAXISn = 0 included.
    let naxes: Vec<usize> = if array.shape().is_empty() {
        vec![1]
    } else {
        array.shape().iter().rev().copied().collect()
    };

    let mut cards = Vec::with_capacity(8 + naxes.len() + user_cards.len());
    if primary {
        cards.push(
            Card::new("SIMPLE", Value::Logical(true)).with_comment("conforms to FITS standard"),
        );
    } else {
        cards.push(
            Card::new("XTENSION", Value::String(String::from("IMAGE")))
                .with_comment("image extension"),
        );
    }
    cards.push(
        Card::new("BITPIX", Value::Integer(array.dtype().bitpix()))
            .with_comment("bits per data value"),
    );
    cards.push(
        Card::new("NAXIS", Value::Integer(naxes.len() as i64)).with_comment("number of axes"),
    );
    for (i, &dim) in naxes.iter().enumerate() {
        cards.push(Card::new(&format!("NAXIS{}", i + 1), Value::Integer(dim as i64)));
    }
    if primary {
        cards.push(Card::new("EXTEND", Value::Logical(true)));
    } else {
        cards.push(Card::new("PCOUNT", Value::Integer(0)));
        cards.push(Card::new("GCOUNT", Value::Integer(1)));
    }
    if !name.is_empty() {
        cards.push(
            Card::new("EXTNAME", Value::String(String::from(name))).with_comment("extension name"),
        );
    }
    cards.extend(user_cards.iter().filter(|c| !is_structural(c)).cloned());

    out.extend_from_slice(&serialize_header(&cards));
    extend_padded(out, &array.bytes_in(ByteOrder::Big));
}
