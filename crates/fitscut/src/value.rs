//! Header value parsing and formatting.

/// A parsed FITS header value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// FITS logical value (`T` or `F`).
    Logical(bool),
    /// FITS integer value.
    Integer(i64),
    /// FITS floating-point value.
    Float(f64),
    /// FITS character string (content between single quotes).
    String(String),
    /// FITS complex integer `(real, imaginary)`.
    ComplexInt(i64, i64),
    /// FITS complex float `(real, imaginary)`.
    ComplexFloat(f64, f64),
}

impl Value {
    /// Numeric view of the value; integers widen to `f64`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Integer(n) => Some(*n as f64),
            _ => None,
        }
    }

    /// Integer view of the value. Floats with no fractional part are accepted.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(n) => Some(*n),
            Value::Float(f) if f.fract() == 0.0 => Some(*f as i64),
            _ => None,
        }
    }

    /// String view of the value, trimmed of FITS padding.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s.trim()),
            _ => None,
        }
    }
}

/// Byte offset of a ` /` comment separator, if any.
fn find_separator(field: &[u8]) -> Option<usize> {
    field.windows(2).position(|w| w == b" /")
}

/// Text following a separator at `idx`, with one optional space skipped.
fn comment_after(field: &[u8], idx: usize) -> Option<&str> {
    let mut start = idx + 2;
    if field.get(start) == Some(&b' ') {
        start += 1;
    }
    std::str::from_utf8(&field[start.min(field.len())..])
        .ok()
        .map(str::trim_end)
        .filter(|s| !s.is_empty())
}

/// Split a non-string value field at the comment separator.
///
/// Real-world files produced by IDL and other tools omit the space after the
/// slash (`BITPIX = -32 /No. of bits`), so only ` /` is required.
fn split_comment(field: &[u8]) -> (&[u8], Option<&str>) {
    match find_separator(field) {
        Some(idx) => (&field[..idx], comment_after(field, idx)),
        None => (field, None),
    }
}

/// Parse a quoted string value. Doubled quotes (`''`) are a literal quote and
/// an unterminated string is accepted as-is.
fn parse_string(field: &[u8]) -> Option<(Value, Option<&str>)> {
    if field.first() != Some(&b'\'') {
        return None;
    }

    let mut text = String::new();
    let mut i = 1;
    while i < field.len() {
        match (field[i], field.get(i + 1)) {
            (b'\'', Some(b'\'')) => {
                text.push('\'');
                i += 2;
            }
            (b'\'', _) => {
                i += 1;
                break;
            }
            (b, _) => {
                text.push(b as char);
                i += 1;
            }
        }
    }

    let remainder = &field[i.min(field.len())..];
    let comment = find_separator(remainder).and_then(|idx| comment_after(remainder, idx));
    Some((Value::String(text.trim_end().to_string()), comment))
}

/// Parse a complex value `(real, imag)`.
fn parse_complex(text: &str) -> Option<Value> {
    let inner = text.trim().strip_prefix('(')?.strip_suffix(')')?;
    let (left, right) = inner.split_once(',')?;
    let (left, right) = (left.trim(), right.trim());

    if !left.contains('.') && !right.contains('.') {
        if let (Ok(re), Ok(im)) = (left.parse::<i64>(), right.parse::<i64>()) {
            return Some(Value::ComplexInt(re, im));
        }
    }
    Some(Value::ComplexFloat(parse_float_str(left)?, parse_float_str(right)?))
}

/// Parse a float string, handling FITS `D` exponent notation.
fn parse_float_str(s: &str) -> Option<f64> {
    s.replace(['D', 'd'], "E").parse::<f64>().ok()
}

fn looks_integral(text: &str) -> bool {
    !text.contains(['.', 'E', 'e', 'D', 'd'])
}

/// Parse a FITS header value from the 70-byte value portion of an 80-byte
/// card (bytes 10..80).
///
/// Returns the parsed [`Value`] and an optional comment string. The caller
/// checks that bytes 8..10 of the card are the `= ` value indicator.
pub fn parse_value(value_bytes: &[u8]) -> Option<(Value, Option<&str>)> {
    if value_bytes.first() == Some(&b'\'') {
        return parse_string(value_bytes);
    }

    let (val_part, comment) = split_comment(value_bytes);
    let text = std::str::from_utf8(val_part).ok()?.trim();

    let value = match text {
        "" => return None,
        "T" => Value::Logical(true),
        "F" => Value::Logical(false),
        t if t.starts_with('(') => parse_complex(t)?,
        t if looks_integral(t) => match t.parse::<i64>() {
            Ok(n) => Value::Integer(n),
            Err(_) => Value::Float(parse_float_str(t)?),
        },
        t => Value::Float(parse_float_str(t)?),
    };
    Some((value, comment))
}

/// Serialize a [`Value`] into the 70-byte field that fills bytes 10..80 of a
/// card.
///
/// Numeric and logical values are right-justified in the first 20 bytes
/// (columns 11-30 of the card). String values start at byte 0 with a quote.
pub fn format_value(value: &Value) -> [u8; 70] {
    let mut buf = [b' '; 70];

    match value {
        Value::Logical(b) => buf[19] = if *b { b'T' } else { b'F' },
        Value::Integer(n) => right_justify(n.to_string().as_bytes(), &mut buf[..20]),
        Value::Float(f) => right_justify(format_float(*f, 20).as_bytes(), &mut buf[..20]),
        Value::String(s) => write_string(s, &mut buf),
        Value::ComplexInt(re, im) => {
            right_justify(format!("({re}, {im})").as_bytes(), &mut buf[..30])
        }
        Value::ComplexFloat(re, im) => {
            let s = format!("({}, {})", format_float(*re, 20), format_float(*im, 20));
            right_justify(s.as_bytes(), &mut buf[..50]);
        }
    }

    buf
}

fn right_justify(src: &[u8], dest: &mut [u8]) {
    let len = src.len().min(dest.len());
    let start = dest.len() - len;
    dest.fill(b' ');
    dest[start..].copy_from_slice(&src[..len]);
}

/// Scientific notation with the highest precision that fits in `max_len`.
fn format_float(f: f64, max_len: usize) -> String {
    if f == 0.0 {
        return String::from("0.0");
    }
    (0..=15usize)
        .rev()
        .map(|precision| format!("{:.prec$E}", f, prec = precision))
        .find(|s| s.len() <= max_len)
        .unwrap_or_else(|| format!("{:E}", f))
}

fn write_string(s: &str, buf: &mut [u8; 70]) {
    buf[0] = b'\'';
    let mut pos = 1;

    for ch in s.bytes() {
        let width = if ch == b'\'' { 2 } else { 1 };
        if pos + width > 69 {
            break;
        }
        buf[pos] = ch;
        if ch == b'\'' {
            buf[pos + 1] = b'\'';
        }
        pos += width;
    }

    // Closing quote no earlier than byte 9 (8 characters of content).
    buf[pos.max(9)] = b'\'';
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_field(s: &str) -> [u8; 70] {
        let mut buf = [b' '; 70];
        let bytes = s.as_bytes();
        let len = bytes.len().min(70);
        buf[..len].copy_from_slice(&bytes[..len]);
        buf
    }

    #[test]
    fn parse_logical_with_comment() {
        let field = make_field("                   T / this is a flag");
        let (val, comment) = parse_value(&field).unwrap();
        assert_eq!(val, Value::Logical(true));
        assert_eq!(comment, Some("this is a flag"));
    }

    #[test]
    fn parse_integer_negative() {
        let field = make_field("                 -99");
        let (val, comment) = parse_value(&field).unwrap();
        assert_eq!(val, Value::Integer(-99));
        assert!(comment.is_none());
    }

    #[test]
    fn parse_float_d_exponent() {
        let field = make_field("            1.5D+02");
        let (val, _) = parse_value(&field).unwrap();
        assert_eq!(val, Value::Float(150.0));
    }

    #[test]
    fn parse_float_comment_no_trailing_space() {
        let field = make_field("               -32.5 /No. of bits");
        let (val, comment) = parse_value(&field).unwrap();
        assert_eq!(val, Value::Float(-32.5));
        assert_eq!(comment, Some("No. of bits"));
    }

    #[test]
    fn parse_string_embedded_quotes() {
        let field = make_field("'O''HARA '           / name");
        let (val, comment) = parse_value(&field).unwrap();
        assert_eq!(val, Value::String(String::from("O'HARA")));
        assert_eq!(comment, Some("name"));
    }

    #[test]
    fn parse_string_with_slash_inside() {
        let field = make_field("'km / s  '");
        let (val, comment) = parse_value(&field).unwrap();
        assert_eq!(val, Value::String(String::from("km / s")));
        assert!(comment.is_none());
    }

    #[test]
    fn parse_complex_values() {
        let (val, _) = parse_value(&make_field("(3, -4)")).unwrap();
        assert_eq!(val, Value::ComplexInt(3, -4));
        let (val, _) = parse_value(&make_field("(1.5, 2.0)")).unwrap();
        assert_eq!(val, Value::ComplexFloat(1.5, 2.0));
    }

    #[test]
    fn parse_blank_returns_none() {
        assert!(parse_value(&make_field("")).is_none());
        assert!(parse_value(&make_field("    / only a comment")).is_none());
    }

    #[test]
    fn roundtrip_float() {
        for v in [1.0, -0.000123456789, 2.5e10, 512.5, -1.0 / 3.0] {
            let field = format_value(&Value::Float(v));
            let (parsed, _) = parse_value(&field).unwrap();
            match parsed {
                Value::Float(f) => assert!((f - v).abs() <= v.abs() * 1e-13, "{f} vs {v}"),
                other => panic!("expected float, got {other:?}"),
            }
        }
    }

    #[test]
    fn format_logical_position() {
        let field = format_value(&Value::Logical(true));
        assert_eq!(field[19], b'T');
        assert!(field[..19].iter().all(|&b| b == b' '));
    }

    #[test]
    fn format_integer_right_justified() {
        let field = format_value(&Value::Integer(42));
        assert_eq!(&field[18..20], b"42");
    }

    #[test]
    fn format_string_quotes_and_padding() {
        let field = format_value(&Value::String(String::from("SCI")));
        assert_eq!(&field[..10], b"'SCI     '");
    }

    #[test]
    fn format_string_embedded_quotes_roundtrip() {
        let field = format_value(&Value::String(String::from("it's")));
        let (val, _) = parse_value(&field).unwrap();
        assert_eq!(val, Value::String(String::from("it's")));
    }

    #[test]
    fn accessors() {
        assert_eq!(Value::Integer(3).as_f64(), Some(3.0));
        assert_eq!(Value::Float(4.0).as_i64(), Some(4));
        assert_eq!(Value::Float(4.5).as_i64(), None);
        assert_eq!(Value::String(String::from("SCI  ")).as_str(), Some("SCI"));
        assert_eq!(Value::Logical(true).as_f64(), None);
    }
}
