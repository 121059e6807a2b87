//! FITS header card parsing and writing.

use std::str;

use crate::block::{BLOCK_SIZE, CARDS_PER_BLOCK, CARD_SIZE, HEADER_PAD_BYTE};
use crate::error::{Error, Result};
use crate::value::{format_value, parse_value, Value};

/// One 80-byte keyword record.
#[derive(Debug, Clone, PartialEq)]
pub struct Card {
    /// The 8-byte keyword name, ASCII, left-justified, space-padded.
    pub keyword: [u8; 8],
    /// The parsed value, if the card has a value indicator (`= ` in bytes 8..10).
    pub value: Option<Value>,
    /// Comment text, or the free text of a commentary card.
    pub comment: Option<String>,
}

impl Card {
    /// Builds a valued card. `name` is truncated to eight bytes.
    pub fn new(name: &str, value: Value) -> Self {
        Card {
            keyword: kw(name.as_bytes()),
            value: Some(value),
            comment: None,
        }
    }

    /// Attaches a comment.
    pub fn with_comment(mut self, comment: &str) -> Self {
        self.comment = Some(String::from(comment));
        self
    }

    /// Return the keyword as a trimmed UTF-8 string.
    pub fn keyword_str(&self) -> &str {
        let end = self
            .keyword
            .iter()
            .rposition(|&b| b != b' ')
            .map_or(0, |i| i + 1);
        str::from_utf8(&self.keyword[..end]).unwrap_or("")
    }

    /// Returns `true` if this card is the END keyword.
    pub fn is_end(&self) -> bool {
        &self.keyword == b"END     "
    }
}

/// Pad a keyword name to 8 bytes with trailing ASCII spaces.
pub const fn kw(name: &[u8]) -> [u8; 8] {
    let mut buf = [b' '; 8];
    let mut i = 0;
    while i < name.len() && i < 8 {
        buf[i] = name[i];
        i += 1;
    }
    buf
}

const COMMENTARY_KEYWORDS: [&[u8; 8]; 3] = [b"COMMENT ", b"HISTORY ", b"        "];

fn free_text(bytes: &[u8]) -> Result<Option<String>> {
    let text = str::from_utf8(bytes)
        .map_err(|_| Error::InvalidHeader("non-ASCII card text"))?
        .trim_end();
    Ok((!text.is_empty()).then(|| String::from(text)))
}

/// Parse a single 80-byte card.
pub fn parse_card(bytes: &[u8; CARD_SIZE]) -> Result<Card> {
    let mut keyword = [b' '; 8];
    keyword.copy_from_slice(&bytes[..8]);

    if !keyword
        .iter()
        .all(|b| matches!(b, b'A'..=b'Z' | b'0'..=b'9' | b' ' | b'-' | b'_'))
    {
        return Err(Error::InvalidKeyword);
    }

    let mut card = Card {
        keyword,
        value: None,
        comment: None,
    };
    if card.is_end() {
        return Ok(card);
    }

    let has_value = &bytes[8..10] == b"= " && !COMMENTARY_KEYWORDS.contains(&&keyword);
    if !has_value {
        card.comment = free_text(&bytes[8..])?;
        return Ok(card);
    }

    match parse_value(&bytes[10..]) {
        Some((value, comment)) => {
            card.value = Some(value);
            card.comment = comment.map(String::from);
        }
        None => card.comment = free_text(&bytes[10..])?,
    }
    Ok(card)
}

/// Parse consecutive header blocks until the END card.
///
/// Only complete blocks are scanned; trailing bytes short of a block are ignored.
pub fn parse_header_blocks(data: &[u8]) -> Result<Vec<Card>> {
    let mut cards = Vec::new();
    for chunk in data.chunks_exact(CARD_SIZE).take(data.len() / BLOCK_SIZE * CARDS_PER_BLOCK) {
        let bytes: &[u8; CARD_SIZE] = chunk
            .try_into()
            .map_err(|_| Error::InvalidHeader("short card"))?;
        let card = parse_card(bytes)?;
        if card.is_end() {
            return Ok(cards);
        }
        cards.push(card);
    }
    Err(Error::UnexpectedEof)
}

/// Return the number of bytes consumed by the header, END block included.
pub fn header_byte_len(data: &[u8]) -> Result<usize> {
    let num_blocks = data.len() / BLOCK_SIZE;
    for block_idx in 0..num_blocks {
        let block = &data[block_idx * BLOCK_SIZE..(block_idx + 1) * BLOCK_SIZE];
        if block.chunks_exact(CARD_SIZE).any(|c| &c[..8] == b"END     ") {
            return Ok((block_idx + 1) * BLOCK_SIZE);
        }
    }
    Err(Error::UnexpectedEof)
}

/// Serialize a card into its 80-byte image.
pub fn format_card(card: &Card) -> [u8; CARD_SIZE] {
    let mut buf = [b' '; CARD_SIZE];
    buf[..8].copy_from_slice(&card.keyword);

    match (&card.value, &card.comment) {
        (Some(value), comment) => {
            buf[8] = b'=';
            buf[9] = b' ';
            buf[10..].copy_from_slice(&format_value(value));
            if let Some(comment) = comment {
                insert_comment(&mut buf[10..], comment);
            }
        }
        (None, Some(text)) => {
            let len = text.len().min(CARD_SIZE - 8);
            buf[8..8 + len].copy_from_slice(&text.as_bytes()[..len]);
        }
        (None, None) => {}
    }
    buf
}

/// Writes ` / comment` after the value text, truncating at the card edge.
fn insert_comment(field: &mut [u8], comment: &str) {
    let content_end = if field[0] == b'\'' {
        let mut i = 1;
        while i < field.len() {
            if field[i] == b'\'' {
                if field.get(i + 1) == Some(&b'\'') {
                    i += 2;
                    continue;
                }
                break;
            }
            i += 1;
        }
        i + 1
    } else {
        20
    };

    let start = content_end + 3;
    if start >= field.len() {
        return;
    }
    field[content_end + 1] = b'/';
    let len = comment.len().min(field.len() - start);
    field[start..start + len].copy_from_slice(&comment.as_bytes()[..len]);
}

/// Serialize cards into whole header blocks, appending END and blank padding.
pub fn serialize_header(cards: &[Card]) -> Vec<u8> {
    let total_blocks = (cards.len() + 1).div_ceil(CARDS_PER_BLOCK);
    let mut buf = Vec::with_capacity(total_blocks * BLOCK_SIZE);
    for card in cards {
        buf.extend_from_slice(&format_card(card));
    }
    buf.extend_from_slice(&format_card(&Card {
        keyword: kw(b"END"),
        value: None,
        comment: None,
    }));
    buf.resize(total_blocks * BLOCK_SIZE, HEADER_PAD_BYTE);
    buf
}

/// Returns the first card named `keyword`.
pub fn find_card<'a>(cards: &'a [Card], keyword: &str) -> Option<&'a Card> {
    cards.iter().find(|c| c.keyword_str() == keyword)
}

/// Returns the integer value of `keyword`, if present and integral.
pub fn card_integer(cards: &[Card], keyword: &str) -> Option<i64> {
    match find_card(cards, keyword)?.value {
        Some(Value::Integer(n)) => Some(n),
        _ => None,
    }
}

/// Returns the string value of `keyword`, if present and a string.
pub fn card_string<'a>(cards: &'a [Card], keyword: &str) -> Option<&'a str> {
    match &find_card(cards, keyword)?.value {
        Some(Value::String(s)) => Some(s.as_str()),
        _ => None,
    }
}
