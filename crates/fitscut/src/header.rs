//! FITS header card parsing and writing, and the ordered keyword map used by
//! the cutout engine.

use crate::block::{pad_to_block, BLOCK_SIZE, CARDS_PER_BLOCK, CARD_SIZE, HEADER_PAD_BYTE};
use crate::error::{Error, Result};
use crate::value::{format_value, parse_value, Value};

// ── Types ──

/// A parsed FITS header card (one 80-byte keyword record).
#[derive(Debug, Clone, PartialEq)]
pub struct Card {
    /// The 8-byte keyword name, ASCII, left-justified, space-padded.
    pub keyword: [u8; 8],
    /// The parsed value, if this card has a value indicator (`= ` in bytes 8..10).
    pub value: Option<Value>,
    /// An optional comment string.
    pub comment: Option<String>,
}

impl Card {
    /// Build a valued card. Names longer than 8 bytes are truncated.
    pub fn new(keyword: &str, value: Value) -> Self {
        Card {
            keyword: make_keyword(keyword),
            value: Some(value),
            comment: None,
        }
    }

    /// Return the keyword as a trimmed UTF-8 string.
    pub fn keyword_str(&self) -> &str {
        let end = self
            .keyword
            .iter()
            .rposition(|&b| b != b' ')
            .map(|i| i + 1)
            .unwrap_or(0);
        std::str::from_utf8(&self.keyword[..end]).unwrap_or("")
    }

    /// Returns `true` if this card is the END keyword.
    pub fn is_end(&self) -> bool {
        &self.keyword == b"END     "
    }

    /// Returns `true` if this is a blank card (keyword is all spaces).
    pub fn is_blank(&self) -> bool {
        self.keyword.iter().all(|&b| b == b' ')
    }

    /// Returns `true` if this card carries a commentary keyword
    /// (COMMENT, HISTORY, or blank).
    pub fn is_commentary(&self) -> bool {
        let kw = self.keyword_str();
        kw == "COMMENT" || kw == "HISTORY" || self.is_blank()
    }
}

/// Pad a keyword name to 8 bytes with trailing ASCII spaces.
pub fn make_keyword(name: &str) -> [u8; 8] {
    let mut k = [b' '; 8];
    let bytes = name.as_bytes();
    let len = bytes.len().min(8);
    k[..len].copy_from_slice(&bytes[..len]);
    k
}

// ── Parsing ──

fn free_text(bytes: &[u8]) -> Result<Option<String>> {
    let text = std::str::from_utf8(bytes)
        .map_err(|_| Error::InvalidHeader("card is not ASCII"))?
        .trim_end();
    Ok((!text.is_empty()).then(|| String::from(text)))
}

/// Parse a single 80-byte FITS header card.
pub fn parse_card(card_bytes: &[u8; CARD_SIZE]) -> Result<Card> {
    let mut keyword = [b' '; 8];
    keyword.copy_from_slice(&card_bytes[..8]);

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

    let has_indicator = card_bytes[8] == b'=' && card_bytes[9] == b' ';
    if card.is_commentary() || !has_indicator {
        card.comment = free_text(&card_bytes[8..])?;
        return Ok(card);
    }

    let field = &card_bytes[10..];
    match parse_value(field) {
        Some((value, comment)) => {
            card.value = Some(value);
            card.comment = comment.map(String::from);
        }
        None => {
            // Undefined value; keep any trailing comment.
            let text = std::str::from_utf8(field).map_err(|_| Error::InvalidHeader("card is not ASCII"))?;
            card.comment = text
                .split_once(" /")
                .map(|(_, c)| c.strip_prefix(' ').unwrap_or(c).trim_end())
                .filter(|c| !c.is_empty())
                .map(String::from);
        }
    }
    Ok(card)
}

/// Parse consecutive 2880-byte header blocks until the END card is found.
///
/// Only complete blocks are scanned; trailing bytes shorter than a block are
/// ignored. The END card is included in the returned list.
pub fn parse_header_blocks(data: &[u8]) -> Result<Vec<Card>> {
    let mut cards = Vec::new();
    for block in data.chunks_exact(BLOCK_SIZE) {
        for raw in block.chunks_exact(CARD_SIZE) {
            let bytes: &[u8; CARD_SIZE] = raw
                .try_into()
                .map_err(|_| Error::InvalidHeader("short card"))?;
            let card = parse_card(bytes)?;
            let is_end = card.is_end();
            cards.push(card);
            if is_end {
                return Ok(cards);
            }
        }
    }
    Err(Error::UnexpectedEof)
}

/// Return the number of bytes consumed by the header (always a multiple of
/// [`BLOCK_SIZE`]).
pub fn header_byte_len(data: &[u8]) -> Result<usize> {
    for (block_idx, block) in data.chunks_exact(BLOCK_SIZE).enumerate() {
        if block
            .chunks_exact(CARD_SIZE)
            .any(|card| &card[..8] == b"END     ")
        {
            return Ok((block_idx + 1) * BLOCK_SIZE);
        }
    }
    Err(Error::UnexpectedEof)
}

// ── Writing ──

/// Serialize a [`Card`] into an 80-byte FITS card image.
pub fn format_card(card: &Card) -> [u8; CARD_SIZE] {
    let mut buf = [b' '; CARD_SIZE];
    buf[..8].copy_from_slice(&card.keyword);

    match (&card.value, &card.comment) {
        (Some(value), comment) => {
            buf[8] = b'=';
            let mut field = format_value(value);
            if let Some(comment) = comment {
                insert_comment(&mut field, comment);
            }
            buf[10..].copy_from_slice(&field);
        }
        (None, Some(comment)) if !card.is_blank() => {
            let bytes = comment.as_bytes();
            let len = bytes.len().min(72);
            buf[8..8 + len].copy_from_slice(&bytes[..len]);
        }
        _ => {}
    }

    buf
}

/// Insert a ` / comment` string into a 70-byte value field.
fn insert_comment(field: &mut [u8; 70], comment: &str) {
    let content_end = if field[0] == b'\'' {
        let mut i = 1;
        while i < 70 {
            if field[i] == b'\'' {
                if i + 1 < 70 && field[i + 1] == b'\'' {
                    i += 2;
                    continue;
                }
                i += 1;
                break;
            }
            i += 1;
        }
        i
    } else {
        field
            .iter()
            .rposition(|&b| b != b' ')
            .map(|i| i + 1)
            .unwrap_or(0)
            .max(20)
    };

    let sep_start = content_end + 1;
    if sep_start + 3 >= 70 {
        return;
    }
    field[sep_start] = b'/';
    let comment_start = sep_start + 2;
    let bytes = comment.as_bytes();
    let len = bytes.len().min(70 - comment_start);
    field[comment_start..comment_start + len].copy_from_slice(&bytes[..len]);
}

/// Create the standard FITS END card.
pub fn format_end_card() -> [u8; CARD_SIZE] {
    let mut buf = [b' '; CARD_SIZE];
    buf[..3].copy_from_slice(b"END");
    buf
}

/// Serialize header cards into complete FITS header blocks.
///
/// Appends the END card and pads the final block with spaces. The returned
/// length is always a multiple of [`BLOCK_SIZE`].
pub fn serialize_header(cards: &[Card]) -> Vec<u8> {
    let mut buf = Vec::with_capacity((cards.len() / CARDS_PER_BLOCK + 1) * BLOCK_SIZE);
    for card in cards.iter().filter(|c| !c.is_end()) {
        buf.extend_from_slice(&format_card(card));
    }
    buf.extend_from_slice(&format_end_card());
    pad_to_block(&mut buf, HEADER_PAD_BYTE);
    buf
}

// ── Keyword map ──

/// An ordered list of header cards with keyword-level access.
///
/// Keywords may repeat (COMMENT, HISTORY); lookups act on the first
/// occurrence. The END card is never stored.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Header {
    cards: Vec<Card>,
}

impl Header {
    /// Create an empty header.
    pub fn new() -> Self {
        Header::default()
    }

    /// Build a header from parsed cards, dropping the END card.
    pub fn from_cards(cards: Vec<Card>) -> Self {
        Header {
            cards: cards.into_iter().filter(|c| !c.is_end()).collect(),
        }
    }

    /// All cards in order.
    pub fn cards(&self) -> &[Card] {
        &self.cards
    }

    /// Number of cards.
    pub fn len(&self) -> usize {
        self.cards.len()
    }

    /// Returns `true` if the header holds no cards.
    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    /// Index of the first card with the given keyword.
    pub fn position(&self, keyword: &str) -> Option<usize> {
        self.cards.iter().position(|c| c.keyword_str() == keyword)
    }

    /// Returns `true` if a card with this keyword carries a value.
    pub fn contains(&self, keyword: &str) -> bool {
        self.get(keyword).is_some()
    }

    /// Value of the first card with the given keyword.
    pub fn get(&self, keyword: &str) -> Option<&Value> {
        self.cards
            .iter()
            .find(|c| c.keyword_str() == keyword)
            .and_then(|c| c.value.as_ref())
    }

    /// Numeric value of a keyword; a present but non-numeric value is an error.
    pub fn get_f64(&self, keyword: &str) -> Result<Option<f64>> {
        match self.get(keyword) {
            None => Ok(None),
            Some(v) => v
                .as_f64()
                .map(Some)
                .ok_or_else(|| Error::InvalidValue(keyword.to_string())),
        }
    }

    /// Integer value of a keyword; a present but non-integer value is an error.
    pub fn get_i64(&self, keyword: &str) -> Result<Option<i64>> {
        match self.get(keyword) {
            None => Ok(None),
            Some(v) => v
                .as_i64()
                .map(Some)
                .ok_or_else(|| Error::InvalidValue(keyword.to_string())),
        }
    }

    /// String value of a keyword, or `None` if absent or not a string.
    pub fn get_str(&self, keyword: &str) -> Option<&str> {
        self.get(keyword).and_then(Value::as_str)
    }

    /// Replace the value of the first card with this keyword, keeping its
    /// position and comment, or append a new card.
    pub fn set(&mut self, keyword: &str, value: Value) {
        match self.position(keyword) {
            Some(idx) => self.cards[idx].value = Some(value),
            None => self.cards.push(Card::new(keyword, value)),
        }
    }

    /// Insert a card at `index` (clamped to the end of the header).
    pub fn insert(&mut self, index: usize, card: Card) {
        let index = index.min(self.cards.len());
        self.cards.insert(index, card);
    }

    /// Remove the first card with this keyword.
    pub fn remove(&mut self, keyword: &str) -> Option<Card> {
        self.position(keyword).map(|idx| self.cards.remove(idx))
    }

    /// Remove every card with this keyword, returning how many were removed.
    pub fn remove_all(&mut self, keyword: &str) -> usize {
        let before = self.cards.len();
        self.cards.retain(|c| c.keyword_str() != keyword);
        before - self.cards.len()
    }

    /// Axis lengths `NAXIS1..NAXISn`.
    pub fn naxes(&self) -> Result<Vec<usize>> {
        let naxis = self
            .get_i64("NAXIS")?
            .ok_or_else(|| Error::MissingKeyword("NAXIS".into()))?;
        (1..=naxis.max(0))
            .map(|i| {
                let kw = format!("NAXIS{i}");
                match self.get_i64(&kw)? {
                    Some(n) if n >= 0 => Ok(n as usize),
                    Some(_) => Err(Error::InvalidHeader("negative NAXISn")),
                    None => Err(Error::MissingKeyword(kw)),
                }
            })
            .collect()
    }

    /// Index just past the mandatory `NAXIS`/`NAXISn` cards.
    pub fn naxis_block_end(&self) -> usize {
        self.cards
            .iter()
            .rposition(|c| {
                let kw = c.keyword_str();
                kw == "NAXIS"
                    || kw
                        .strip_prefix("NAXIS")
                        .is_some_and(|n| n.bytes().all(|b| b.is_ascii_digit()))
            })
            .map(|i| i + 1)
            .unwrap_or(self.cards.len())
    }

    /// Serialize into padded header blocks, END card included.
    pub fn to_bytes(&self) -> Vec<u8> {
        serialize_header(&self.cards)
    }
}

// ── Tests ──

#[cfg(test)]
mod parse_tests {
    use super::*;

    fn make_card(s: &str) -> [u8; CARD_SIZE] {
        let mut buf = [b' '; CARD_SIZE];
        let bytes = s.as_bytes();
        let len = bytes.len().min(CARD_SIZE);
        buf[..len].copy_from_slice(&bytes[..len]);
        buf
    }

    fn make_header_block(cards: &[[u8; CARD_SIZE]]) -> Vec<u8> {
        let mut block = vec![b' '; BLOCK_SIZE];
        for (i, card) in cards.iter().enumerate() {
            block[i * CARD_SIZE..(i + 1) * CARD_SIZE].copy_from_slice(card);
        }
        block
    }

    #[test]
    fn parse_card_string_value() {
        let c = parse_card(&make_card("EXTNAME = 'SCI     '           / extension name")).unwrap();
        assert_eq!(c.keyword_str(), "EXTNAME");
        assert_eq!(c.value, Some(Value::String(String::from("SCI"))));
        assert_eq!(c.comment, Some(String::from("extension name")));
    }

    #[test]
    fn parse_card_float_value() {
        let c = parse_card(&make_card("CRPIX1  =                 50.5")).unwrap();
        assert_eq!(c.value, Some(Value::Float(50.5)));
    }

    #[test]
    fn parse_card_history_keyword() {
        let c = parse_card(&make_card("HISTORY cut from a larger image")).unwrap();
        assert!(c.is_commentary());
        assert!(c.value.is_none());
        assert_eq!(c.comment, Some(String::from("cut from a larger image")));
    }

    #[test]
    fn parse_card_empty_value_with_comment() {
        let c = parse_card(&make_card("BLANKVAL=                      / undefined")).unwrap();
        assert!(c.value.is_none());
        assert_eq!(c.comment, Some(String::from("undefined")));
    }

    #[test]
    fn parse_card_invalid_keyword_lowercase() {
        assert!(matches!(
            parse_card(&make_card("simple  =                    T")),
            Err(Error::InvalidKeyword)
        ));
    }

    #[test]
    fn parse_header_simple() {
        let block = make_header_block(&[
            make_card("SIMPLE  =                    T"),
            make_card("BITPIX  =                    8"),
            make_card("NAXIS   =                    0"),
            make_card("END"),
        ]);
        let cards = parse_header_blocks(&block).unwrap();
        assert_eq!(cards.len(), 4);
        assert!(cards[3].is_end());
        assert_eq!(header_byte_len(&block).unwrap(), BLOCK_SIZE);
    }

    #[test]
    fn parse_header_no_end_card() {
        let block = make_header_block(&[make_card("SIMPLE  =                    T")]);
        assert!(matches!(parse_header_blocks(&block), Err(Error::UnexpectedEof)));
        assert!(matches!(header_byte_len(&block), Err(Error::UnexpectedEof)));
    }
}

#[cfg(test)]
mod write_tests {
    use super::*;

    #[test]
    fn format_card_with_comment() {
        let mut card = Card::new("NAXIS", Value::Integer(2));
        card.comment = Some(String::from("number of axes"));
        let buf = format_card(&card);
        assert_eq!(&buf[..10], b"NAXIS   = ");
        assert_eq!(&buf[29..30], b"2");
        assert_eq!(&buf[31..47], b"/ number of axes");
    }

    #[test]
    fn serialize_header_spills_to_two_blocks() {
        let cards: Vec<Card> = (0..36)
            .map(|i| Card::new(&format!("KEY{i}"), Value::Integer(i)))
            .collect();
        let bytes = serialize_header(&cards);
        assert_eq!(bytes.len(), 2 * BLOCK_SIZE);
        assert_eq!(&bytes[36 * CARD_SIZE..36 * CARD_SIZE + 3], b"END");
    }

    #[test]
    fn roundtrip_serialize_then_parse() {
        let mut card = Card::new("CTYPE1", Value::String(String::from("RA---TAN")));
        card.comment = Some(String::from("projection"));
        let bytes = serialize_header(&[card.clone(), Card::new("CDELT1", Value::Float(-0.25))]);
        let parsed = parse_header_blocks(&bytes).unwrap();
        assert_eq!(parsed[0], card);
        assert_eq!(parsed[1].value, Some(Value::Float(-0.25)));
    }
}
