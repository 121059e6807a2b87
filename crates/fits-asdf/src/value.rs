//! FITS header card values.

use std::str;

/// A parsed FITS header value.
///
/// Complex values are not carried; cards holding them are kept with no value
/// and their raw text as the comment.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// FITS logical value (`T` or `F`).
    Logical(bool),
    /// FITS integer value.
    Integer(i64),
    /// FITS floating-point value.
    Float(f64),
    /// FITS character string (content between single quotes, trailing blanks trimmed).
    String(String),
}

/// Width of the value field (card bytes 10..80).
pub const VALUE_FIELD_LEN: usize = 70;

/// Finds the ` /` comment separator, returning `(value_part, comment)`.
///
/// IDL and friends omit the space after the slash, so ` /` alone counts.
fn split_comment(field: &[u8]) -> (&[u8], Option<&str>) {
    match field.windows(2).position(|w| w == b" /") {
        Some(i) => {
            let mut start = i + 2;
            if field.get(start) == Some(&b' ') {
                start += 1;
            }
            let comment = str::from_utf8(&field[start..])
                .ok()
                .map(str::trim_end)
                .filter(|s| !s.is_empty());
            (&field[..i], comment)
        }
        None => (field, None),
    }
}

/// Parses a quoted string starting at `field[0] == '\''`.
fn parse_string(field: &[u8]) -> (Value, Option<&str>) {
    let mut value = String::new();
    let mut i = 1;
    while i < field.len() {
        if field[i] == b'\'' {
            if field.get(i + 1) == Some(&b'\'') {
                value.push('\'');
                i += 2;
                continue;
            }
            i += 1;
            break;
        }
        value.push(field[i] as char);
        i += 1;
    }
    let (_, comment) = split_comment(&field[i.min(field.len())..]);
    (Value::String(value.trim_end().to_string()), comment)
}

fn parse_float(s: &str) -> Option<f64> {
    s.replace(['D', 'd'], "E").parse::<f64>().ok()
}

/// Parses the 70-byte value field of a card whose bytes 8..10 are `= `.
///
/// Returns `None` for an empty or unparseable value.
pub fn parse_value(field: &[u8]) -> Option<(Value, Option<&str>)> {
    let start = field.iter().position(|&b| b != b' ')?;
    let field = &field[start..];
    if field[0] == b'\'' {
        return Some(parse_string(field));
    }

    let (text, comment) = split_comment(field);
    let text = str::from_utf8(text).ok()?.trim();
    let value = match text {
        "" => return None,
        "T" => Value::Logical(true),
        "F" => Value::Logical(false),
        _ if !text.contains(['.', 'E', 'e', 'D', 'd']) => Value::Integer(text.parse().ok()?),
        _ => Value::Float(parse_float(text)?),
    };
    Some((value, comment))
}

/// Formats a value into the fixed-width value field.
///
/// Numbers and logicals are right-justified to column 30; strings start at
/// column 11 and are padded to at least eight characters.
pub fn format_value(value: &Value) -> [u8; VALUE_FIELD_LEN] {
    let mut buf = [b' '; VALUE_FIELD_LEN];
    match value {
        Value::Logical(b) => buf[19] = if *b { b'T' } else { b'F' },
        Value::Integer(n) => right_justify(n.to_string().as_bytes(), &mut buf[..20]),
        Value::Float(f) => right_justify(format_float(*f).as_bytes(), &mut buf[..20]),
        Value::String(s) => write_string(s, &mut buf),
    }
    buf
}

fn right_justify(src: &[u8], dest: &mut [u8]) {
    let len = src.len().min(dest.len());
    let start = dest.len() - len;
    dest[start..].copy_from_slice(&src[..len]);
}

fn format_float(f: f64) -> String {
    if f == 0.0 {
        return String::from("0.0");
    }
    let mut precision = 15usize;
    loop {
        let s = format!("{:.prec$E}", f, prec = precision);
        if s.len() <= 20 || precision == 0 {
            return s;
        }
        precision -= 1;
    }
}

fn write_string(s: &str, buf: &mut [u8; VALUE_FIELD_LEN]) {
    buf[0] = b'\'';
    let mut pos = 1;
    for ch in s.bytes() {
        let width = if ch == b'\'' { 2 } else { 1 };
        if pos + width >= VALUE_FIELD_LEN {
            break;
        }
        buf[pos] = ch;
        if ch == b'\'' {
            buf[pos + 1] = b'\'';
        }
        pos += width;
    }
    buf[pos.max(9)] = b'\'';
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(s: &str) -> [u8; VALUE_FIELD_LEN] {
        let mut buf = [b' '; VALUE_FIELD_LEN];
        buf[..s.len()].copy_from_slice(s.as_bytes());
        buf
    }

    #[test]
    fn parse_logical() {
        let binding = field("                   T / conforms");
        let (v, c) = parse_value(&binding).unwrap();
        assert_eq!(v, Value::Logical(true));
        assert_eq!(c, Some("conforms"));
    }

    #[test]
    fn parse_integer_negative() {
        let (v, _) = parse_value(&field("                 -32")).unwrap();
        assert_eq!(v, Value::Integer(-32));
    }

    #[test]
    fn parse_float_d_exponent() {
        let (v, _) = parse_value(&field("            1.5D+02")).unwrap();
        assert_eq!(v, Value::Float(150.0));
    }

    #[test]
    fn parse_string_with_quote_and_comment() {
        let binding = field("'O''HARA '           / observer");
        let (v, c) = parse_value(&binding).unwrap();
        assert_eq!(v, Value::String(String::from("O'HARA")));
        assert_eq!(c, Some("observer"));
    }

    #[test]
    fn parse_comment_without_trailing_space() {
        let binding = field("                 -32 /No. of bits");
        let (v, c) = parse_value(&binding).unwrap();
        assert_eq!(v, Value::Integer(-32));
        assert_eq!(c, Some("No. of bits"));
    }

    #[test]
    fn parse_empty_is_none() {
        assert!(parse_value(&field("")).is_none());
    }

    #[test]
    fn format_logical_column_30() {
        let buf = format_value(&Value::Logical(false));
        assert_eq!(buf[19], b'F');
        assert!(buf[..19].iter().all(|&b| b == b' '));
    }

    #[test]
    fn format_string_pads_to_eight() {
        let buf = format_value(&Value::String(String::from("SCI")));
        assert_eq!(&buf[..10], b"'SCI     '");
    }

    #[test]
    fn format_then_parse_values() {
        for v in [
            Value::Logical(true),
            Value::Integer(1 << 40),
            Value::Float(-2.5e-7),
            Value::String(String::from("it's")),
        ] {
            let (back, _) = parse_value(&format_value(&v)).unwrap();
            assert_eq!(back, v);
        }
    }
}
