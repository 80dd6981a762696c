use log::debug;

use crate::block::{pad_to_block, padded_byte_len, BLOCK_SIZE, DATA_PAD_BYTE};
use crate::error::{Error, Result};
use crate::header::{header_byte_len, parse_header_blocks, Card, Header};
use crate::image::ImageData;
use crate::value::Value;

/// The structural kind of an HDU.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HduKind {
    /// First HDU of a file (`SIMPLE = T`).
    Primary,
    /// Image extension (`XTENSION = 'IMAGE'`).
    Image,
    /// Any HDU the cutout engine cannot slice: tables, tile-compressed
    /// images, random groups.
    Other(&'static str),
}

/// A single Header Data Unit.
#[derive(Debug, Clone, PartialEq)]
pub struct Hdu {
    pub kind: HduKind,
    pub header: Header,
    /// Decoded pixels for Primary/Image HDUs with `NAXIS > 0`.
    pub data: Option<ImageData>,
}

impl Hdu {
    pub fn new(kind: HduKind, header: Header, data: Option<ImageData>) -> Self {
        Hdu { kind, header, data }
    }

    /// Trimmed `EXTNAME`, if any.
    pub fn extname(&self) -> Option<&str> {
        self.header.get_str("EXTNAME")
    }

    /// `EXTVER`, or 0 when absent or not an integer.
    pub fn extver(&self) -> i64 {
        self.header.get_i64("EXTVER").ok().flatten().unwrap_or(0)
    }

    /// Returns `true` for image HDUs that carry pixel data.
    pub fn has_image(&self) -> bool {
        matches!(self.kind, HduKind::Primary | HduKind::Image) && self.data.is_some()
    }
}

/// All HDUs of a FITS file, primary first.
#[derive(Debug, Clone, PartialEq)]
pub struct FitsFile {
    pub hdus: Vec<Hdu>,
}

// ── Reading ──

fn required_i64(header: &Header, keyword: &str) -> Result<i64> {
    header
        .get_i64(keyword)?
        .ok_or_else(|| Error::MissingKeyword(keyword.to_string()))
}

fn classify(header: &Header, is_primary: bool) -> Result<HduKind> {
    if is_primary {
        let naxes = header.naxes()?;
        if header.get("GROUPS") == Some(&Value::Logical(true)) && naxes.first() == Some(&0) {
            return Ok(HduKind::Other("random groups"));
        }
        return Ok(HduKind::Primary);
    }
    let xtension = header
        .get_str("XTENSION")
        .ok_or_else(|| Error::MissingKeyword("XTENSION".into()))?;
    Ok(match xtension {
        "IMAGE" => HduKind::Image,
        "BINTABLE" if header.get("ZIMAGE") == Some(&Value::Logical(true)) => {
            HduKind::Other("compressed image")
        }
        "BINTABLE" => HduKind::Other("binary table"),
        "TABLE" => HduKind::Other("ASCII table"),
        _ => HduKind::Other("unknown extension"),
    })
}

/// Size of the data segment in bytes, excluding block padding.
fn data_byte_len(header: &Header, kind: HduKind) -> Result<usize> {
    let bitpix = required_i64(header, "BITPIX")?;
    let bytes_per_value = bitpix.unsigned_abs() as usize / 8;
    let naxes = header.naxes()?;
    if naxes.is_empty() {
        return Ok(0);
    }

    let overflow = || Error::InvalidHeader("data size overflow");
    let count = |dims: &[usize]| {
        dims.iter()
            .try_fold(1usize, |acc, &d| acc.checked_mul(d))
            .ok_or_else(overflow)
    };
    let (pixels, pcount, gcount) = match kind {
        HduKind::Primary => (count(&naxes)?, 0, 1),
        HduKind::Other("random groups") => (
            count(&naxes[1..])?,
            required_i64(header, "PCOUNT")?.max(0) as usize,
            required_i64(header, "GCOUNT")?.max(0) as usize,
        ),
        _ => (
            count(&naxes)?,
            header.get_i64("PCOUNT")?.unwrap_or(0).max(0) as usize,
            header.get_i64("GCOUNT")?.unwrap_or(1).max(1) as usize,
        ),
    };
    pixels
        .checked_add(pcount)
        .and_then(|n| n.checked_mul(gcount))
        .and_then(|n| n.checked_mul(bytes_per_value))
        .ok_or_else(overflow)
}

/// Parse a complete FITS byte stream into its HDUs.
///
/// Image data is decoded for Primary and IMAGE HDUs; other kinds keep their
/// header only. Trailing bytes that do not form a valid header after at least
/// one HDU are ignored.
pub fn parse_fits(data: &[u8]) -> Result<FitsFile> {
    if data.len() < BLOCK_SIZE {
        return Err(Error::UnexpectedEof);
    }

    let mut hdus = Vec::new();
    let mut offset = 0usize;

    while data.len() - offset >= BLOCK_SIZE {
        let remaining = &data[offset..];
        let parsed = header_byte_len(remaining)
            .and_then(|len| Ok((len, parse_header_blocks(&remaining[..len])?)));
        let (header_len, cards) = match parsed {
            Ok(parsed) => parsed,
            Err(e) if !hdus.is_empty() => {
                debug!("stopping at byte {offset}: {e}");
                break;
            }
            Err(e) => return Err(e),
        };

        let is_primary = hdus.is_empty();
        if is_primary && cards.first().map(Card::keyword_str) != Some("SIMPLE") {
            return Err(Error::InvalidHeader("first HDU must be primary"));
        }
        let header = Header::from_cards(cards);
        let kind = classify(&header, is_primary)?;
        let data_len = data_byte_len(&header, kind)?;
        let data_start = offset + header_len;
        if data_start + data_len > data.len() {
            return Err(Error::UnexpectedEof);
        }

        let pixels = match kind {
            HduKind::Primary | HduKind::Image if data_len > 0 => {
                let bitpix = required_i64(&header, "BITPIX")?;
                Some(ImageData::decode(&data[data_start..data_start + data_len], bitpix)?)
            }
            _ => None,
        };

        hdus.push(Hdu::new(kind, header, pixels));
        offset = data_start + padded_byte_len(data_len);
        if offset > data.len() {
            break;
        }
    }

    Ok(FitsFile { hdus })
}

// ── Writing ──

/// Turn any image header into a primary header.
fn to_primary_header(header: &Header, has_extensions: bool) -> Header {
    let mut out = header.clone();
    if out.cards().first().map(Card::keyword_str) != Some("SIMPLE") {
        out.remove("XTENSION");
        out.insert(0, Card::new("SIMPLE", Value::Logical(true)));
    }
    out.remove_all("PCOUNT");
    out.remove_all("GCOUNT");
    if has_extensions && !out.contains("EXTEND") {
        let at = out.naxis_block_end();
        out.insert(at, Card::new("EXTEND", Value::Logical(true)));
    }
    out
}

/// Turn a primary header into an IMAGE extension header.
fn to_extension_header(header: &Header) -> Header {
    if header.cards().first().map(Card::keyword_str) != Some("SIMPLE") {
        return header.clone();
    }
    let mut out = header.clone();
    out.remove("SIMPLE");
    out.insert(0, Card::new("XTENSION", Value::String(String::from("IMAGE"))));
    out.remove_all("EXTEND");
    out.remove_all("GROUPS");
    out.remove_all("PCOUNT");
    out.remove_all("GCOUNT");
    let at = out.naxis_block_end();
    out.insert(at, Card::new("PCOUNT", Value::Integer(0)));
    out.insert(at + 1, Card::new("GCOUNT", Value::Integer(1)));
    out
}

/// Serialize HDUs into a FITS byte stream.
///
/// The first HDU is written with a primary header and every later one as an
/// IMAGE extension, whatever their original position in the source file.
pub fn write_fits(hdus: &[Hdu]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    for (i, hdu) in hdus.iter().enumerate() {
        let header = if i == 0 {
            to_primary_header(&hdu.header, hdus.len() > 1)
        } else {
            to_extension_header(&hdu.header)
        };

        if let Some(data) = &hdu.data {
            let bitpix = required_i64(&header, "BITPIX")?;
            if bitpix != data.bitpix() {
                return Err(Error::InvalidBitpix(bitpix));
            }
            let expected: usize = header.naxes()?.iter().product();
            if expected != data.len() {
                return Err(Error::InvalidHeader("data length does not match NAXISn"));
            }
        }

        out.extend_from_slice(&header.to_bytes());
        if let Some(data) = &hdu.data {
            let mut bytes = data.to_be_bytes();
            pad_to_block(&mut bytes, DATA_PAD_BYTE);
            out.extend_from_slice(&bytes);
        }
    }
    Ok(out)
}
