//! Slicing image data and rewriting the header so its WCS describes the
//! cut-out pixels.

use std::collections::BTreeSet;

use log::debug;
use ndarray::Slice;

use crate::error::{Error, Result};
use crate::hdu::Hdu;
use crate::header::{make_keyword, Card, Header};
use crate::value::Value;

use super::range::PixelRange;
use super::{CutoutOptions, CutoutResult};

/// Keywords that no longer describe a cutout.
static REMOVED_KEYWORDS: [&str; 4] = ["DQ1", "DQ2", "CHECKSUM", "DATASUM"];

/// A cut along one axis, bounded to the axis, 1-based and inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AxisCut {
    pub start: i64,
    pub stop: i64,
    pub step: i64,
}

impl AxisCut {
    /// Bound `range` to an axis of length `len`, or `None` when nothing of
    /// the axis remains.
    pub fn bound(range: &PixelRange, len: usize) -> Option<Self> {
        let n = len as i64;
        let (start, stop) = if range.is_reversed() {
            (range.lower.min(n), range.upper.max(1))
        } else {
            (range.lower.max(1), range.upper.min(n))
        };
        let empty = if range.is_reversed() { start < stop } else { start > stop };
        (!empty && n > 0).then_some(AxisCut {
            start,
            stop,
            step: range.step.max(1),
        })
    }

    pub fn is_descending(&self) -> bool {
        self.start > self.stop
    }

    /// Number of pixels selected.
    pub fn len(&self) -> usize {
        ((self.start - self.stop).abs() / self.step + 1) as usize
    }

    /// 0-based ndarray slice selecting the same pixels in the same order.
    fn slice(&self) -> Slice {
        if self.is_descending() {
            Slice::new((self.stop - 1) as isize, Some(self.start as isize), -(self.step as isize))
        } else {
            Slice::new((self.start - 1) as isize, Some(self.stop as isize), self.step as isize)
        }
    }

    /// Reference pixel in the cut-out frame.
    pub fn crpix(&self, crpix: f64) -> f64 {
        let (start, step) = (self.start as f64, self.step as f64);
        if self.is_descending() {
            (start - crpix) / step + 1.0
        } else {
            (crpix - start) / step + 1.0
        }
    }

    /// Factor applied to the pixel increment of this axis. Negative for a
    /// descending cut, whose output pixels walk the source backwards.
    fn scale(&self) -> f64 {
        let sign = if self.is_descending() { -1.0 } else { 1.0 };
        sign * self.step as f64
    }
}

/// `PCi_j` or `CDi_j`: (prefix, i, j).
fn matrix_keyword(keyword: &str) -> Option<(&str, usize, usize)> {
    let prefix = keyword.get(..2).filter(|p| *p == "PC" || *p == "CD")?;
    let (i, j) = keyword[2..].split_once('_')?;
    Some((prefix, i.parse().ok()?, j.parse().ok()?))
}

/// Cut one image HDU to `ranges` (one per axis).
///
/// Returns [`CutoutResult::NoOverlap`] when a range leaves an axis empty.
/// Errors mean the header cannot be rewritten consistently.
pub fn cut_hdu(hdu: &Hdu, ranges: &[PixelRange], options: &CutoutOptions) -> Result<CutoutResult> {
    let naxes = hdu.header.naxes()?;
    if ranges.len() != naxes.len() {
        return Err(Error::InvalidHeader("range count does not match NAXIS"));
    }

    let mut cuts = Vec::with_capacity(naxes.len());
    for (axis, (range, &len)) in ranges.iter().zip(&naxes).enumerate() {
        match AxisCut::bound(range, len) {
            Some(cut) => cuts.push(cut),
            None => {
                return Ok(CutoutResult::NoOverlap(format!(
                    "pixels {}..{} miss axis {} of length {len}",
                    range.lower,
                    range.upper,
                    axis + 1
                )))
            }
        }
    }

    let header = rewrite_header(&hdu.header, &naxes, &cuts, options)?;
    let data = match &hdu.data {
        Some(data) => {
            let slices: Vec<Slice> = cuts.iter().map(AxisCut::slice).collect();
            Some(data.slice(&naxes, &slices)?)
        }
        None => None,
    };
    Ok(CutoutResult::Extracted(Hdu::new(hdu.kind, header, data)))
}

/// Apply the cut to a copy of `header`.
pub fn rewrite_header(
    header: &Header,
    naxes: &[usize],
    cuts: &[AxisCut],
    options: &CutoutOptions,
) -> Result<Header> {
    let mut out = header.clone();
    let has_matrix = out
        .cards()
        .iter()
        .any(|c| matrix_keyword(c.keyword_str()).is_some());

    for (k, cut) in cuts.iter().enumerate() {
        let axis = k + 1;
        out.set(&format!("NAXIS{axis}"), Value::Integer(cut.len() as i64));

        let key = format!("CRPIX{axis}");
        let crpix = out.get_f64(&key)?.unwrap_or(0.0);
        out.set(&key, Value::Float(cut.crpix(crpix)));

        let scale = cut.scale();
        if scale == 1.0 {
            continue;
        }
        if has_matrix {
            scale_matrix_column(&mut out, axis, scale)?;
        } else {
            let key = format!("CDELT{axis}");
            let cdelt = out.get_f64(&key)?.unwrap_or(1.0);
            out.set(&key, Value::Float(cdelt * scale));
        }
    }

    for keyword in REMOVED_KEYWORDS {
        out.remove_all(keyword);
    }
    if options.prefer_pc {
        cd_to_pc(&mut out);
    }
    place_wcsaxes(&mut out, naxes.len());
    Ok(out)
}

fn scale_matrix_column(header: &mut Header, column: usize, scale: f64) -> Result<()> {
    let keys: Vec<String> = header
        .cards()
        .iter()
        .map(|c| c.keyword_str())
        .filter(|kw| matches!(matrix_keyword(kw), Some((_, _, j)) if j == column))
        .map(String::from)
        .collect();
    for key in keys {
        let value = header.get_f64(&key)?.unwrap_or(0.0);
        header.set(&key, Value::Float(value * scale));
    }
    Ok(())
}

/// Rename every `CDi_j` to `PCi_j` in place and drop `CDELTi` of the
/// converted rows. A `CDi_j` whose `PCi_j` already exists is discarded, and
/// its row keeps `CDELTi` for the existing matrix.
fn cd_to_pc(header: &mut Header) {
    let cd_keys: Vec<(String, usize, usize)> = header
        .cards()
        .iter()
        .filter_map(|c| match matrix_keyword(c.keyword_str()) {
            Some(("CD", i, j)) => Some((c.keyword_str().to_string(), i, j)),
            _ => None,
        })
        .collect();

    let mut converted = BTreeSet::new();
    let mut kept = BTreeSet::new();
    for (cd, i, j) in cd_keys {
        let pc = format!("PC{i}_{j}");
        let Some(pos) = header.position(&cd) else {
            continue;
        };
        let Some(card) = header.remove(&cd) else {
            continue;
        };
        if header.contains(&pc) {
            kept.insert(i);
            continue;
        }
        header.insert(
            pos,
            Card {
                keyword: make_keyword(&pc),
                ..card
            },
        );
        converted.insert(i);
    }
    for i in converted.difference(&kept) {
        header.remove_all(&format!("CDELT{i}"));
    }
}

/// Ensure `WCSAXES = naxis` sits before `CTYPE1`, or after the NAXISn cards
/// when there is no `CTYPE1`.
fn place_wcsaxes(header: &mut Header, naxis: usize) {
    let mut card = header
        .remove("WCSAXES")
        .unwrap_or_else(|| Card::new("WCSAXES", Value::Integer(0)));
    header.remove_all("WCSAXES");
    card.value = Some(Value::Integer(naxis as i64));
    let at = header
        .position("CTYPE1")
        .unwrap_or_else(|| header.naxis_block_end());
    debug!("WCSAXES = {naxis} at card {at}");
    header.insert(at, card);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hdu::HduKind;
    use crate::image::ImageData;

    fn card(keyword: &str, value: Value) -> Card {
        Card::new(keyword, value)
    }

    fn f(v: f64) -> Value {
        Value::Float(v)
    }

    fn image_header(nx: i64, ny: i64) -> Header {
        Header::from_cards(vec![
            card("XTENSION", Value::String("IMAGE".into())),
            card("BITPIX", Value::Integer(32)),
            card("NAXIS", Value::Integer(2)),
            card("NAXIS1", Value::Integer(nx)),
            card("NAXIS2", Value::Integer(ny)),
            card("PCOUNT", Value::Integer(0)),
            card("GCOUNT", Value::Integer(1)),
            card("CTYPE1", Value::String("RA---TAN".into())),
            card("CTYPE2", Value::String("DEC--TAN".into())),
            card("CRPIX1", f(50.0)),
            card("CRPIX2", f(40.0)),
            card("CDELT1", f(-0.1)),
            card("CDELT2", f(0.1)),
            card("CHECKSUM", Value::String("abc".into())),
            card("DATASUM", Value::String("0".into())),
        ])
    }

    fn image(nx: i64, ny: i64) -> Hdu {
        let data = (0..(nx * ny) as i32).collect();
        Hdu::new(HduKind::Image, image_header(nx, ny), Some(ImageData::I32(data)))
    }

    fn cut(start: i64, stop: i64, step: i64) -> AxisCut {
        AxisCut { start, stop, step }
    }

    fn extracted(result: CutoutResult) -> Hdu {
        match result {
            CutoutResult::Extracted(hdu) => hdu,
            CutoutResult::NoOverlap(r) => panic!("unexpected no overlap: {r}"),
        }
    }

    #[test]
    fn bound_ascending_and_descending() {
        assert_eq!(AxisCut::bound(&PixelRange::new(-5, 20), 10), Some(cut(1, 10, 1)));
        assert_eq!(AxisCut::bound(&PixelRange::new(20, -5), 10), Some(cut(10, 1, 1)));
        assert_eq!(AxisCut::bound(&PixelRange::new(11, 20), 10), None);
        assert_eq!(AxisCut::bound(&PixelRange::new(0, -5), 10), None);
    }

    #[test]
    fn cut_length_with_step() {
        assert_eq!(cut(1, 10, 3).len(), 4);
        assert_eq!(cut(10, 1, 2).len(), 5);
        assert_eq!(cut(5, 5, 1).len(), 1);
    }

    #[test]
    fn crpix_formula() {
        assert_eq!(cut(10, 40, 1).crpix(50.0), 41.0);
        assert_eq!(cut(1, 100, 2).crpix(51.0), 26.0);
        assert_eq!(cut(100, 1, 1).crpix(30.0), 71.0);
    }

    #[test]
    fn sub_rectangle_header_and_data() {
        let hdu = image(100, 80);
        let ranges = [PixelRange::new(10, 40), PixelRange::new(21, 30)];
        let out = extracted(cut_hdu(&hdu, &ranges, &CutoutOptions::default()).unwrap());

        assert_eq!(out.header.naxes().unwrap(), vec![31, 10]);
        assert_eq!(out.header.get_f64("CRPIX1").unwrap(), Some(41.0));
        assert_eq!(out.header.get_f64("CRPIX2").unwrap(), Some(20.0));
        assert_eq!(out.header.get_f64("CDELT1").unwrap(), Some(-0.1));
        assert!(!out.header.contains("CHECKSUM"));
        assert!(!out.header.contains("DATASUM"));

        let Some(ImageData::I32(px)) = &out.data else {
            panic!("expected data");
        };
        assert_eq!(px.len(), 310);
        assert_eq!(px[0], 20 * 100 + 9);
        assert_eq!(px[31], 21 * 100 + 9);
    }

    #[test]
    fn full_range_is_identity() {
        let hdu = image(8, 6);
        let ranges = [PixelRange::new(1, 8), PixelRange::new(1, 6)];
        let out = extracted(cut_hdu(&hdu, &ranges, &CutoutOptions::default()).unwrap());
        assert_eq!(out.header.get_f64("CRPIX1").unwrap(), Some(50.0));
        assert_eq!(out.header.get_f64("CDELT2").unwrap(), Some(0.1));
        assert_eq!(out.data, hdu.data);
    }

    #[test]
    fn strided_cut_scales_cdelt() {
        let hdu = image(10, 10);
        let ranges = [PixelRange::with_step(1, 10, 2), PixelRange::new(1, 10)];
        let out = extracted(cut_hdu(&hdu, &ranges, &CutoutOptions::default()).unwrap());
        assert_eq!(out.header.get_f64("CDELT1").unwrap(), Some(-0.2));
        assert_eq!(out.header.get_f64("CDELT2").unwrap(), Some(0.1));
        assert_eq!(out.header.get_i64("NAXIS1").unwrap(), Some(5));
        let Some(ImageData::I32(px)) = &out.data else {
            panic!("expected data");
        };
        assert_eq!(&px[..5], &[0, 2, 4, 6, 8]);
    }

    #[test]
    fn strided_cut_scales_matrix_column() {
        let mut hdu = image(10, 10);
        for (k, v) in [("PC1_1", 0.8), ("PC1_2", -0.6), ("PC2_1", 0.6), ("PC2_2", 0.8)] {
            hdu.header.set(k, f(v));
        }
        let ranges = [PixelRange::new(1, 10), PixelRange::with_step(1, 10, 3)];
        let out = extracted(cut_hdu(&hdu, &ranges, &CutoutOptions::default()).unwrap());
        let h = &out.header;
        assert_eq!(h.get_f64("PC1_1").unwrap(), Some(0.8));
        assert_eq!(h.get_f64("PC2_1").unwrap(), Some(0.6));
        assert!((h.get_f64("PC1_2").unwrap().unwrap() + 1.8).abs() < 1e-12);
        assert!((h.get_f64("PC2_2").unwrap().unwrap() - 2.4).abs() < 1e-12);
        assert_eq!(h.get_f64("CDELT2").unwrap(), Some(0.1));
    }

    #[test]
    fn reversed_axis_flips_increment_and_data() {
        let hdu = image(4, 2);
        let ranges = [PixelRange::new(4, 1), PixelRange::new(1, 2)];
        let out = extracted(cut_hdu(&hdu, &ranges, &CutoutOptions::default()).unwrap());
        assert_eq!(out.header.get_f64("CDELT1").unwrap(), Some(0.1));
        assert_eq!(out.header.get_f64("CRPIX1").unwrap(), Some(-45.0));
        assert_eq!(out.data, Some(ImageData::I32(vec![3, 2, 1, 0, 7, 6, 5, 4])));
    }

    #[test]
    fn empty_axis_is_no_overlap() {
        let hdu = image(10, 10);
        let ranges = [PixelRange::new(20, 30), PixelRange::new(1, 10)];
        assert!(matches!(
            cut_hdu(&hdu, &ranges, &CutoutOptions::default()).unwrap(),
            CutoutResult::NoOverlap(_)
        ));
    }

    #[test]
    fn wcsaxes_before_ctype1() {
        let hdu = image(10, 10);
        let ranges = [PixelRange::new(1, 5), PixelRange::new(1, 5)];
        let out = extracted(cut_hdu(&hdu, &ranges, &CutoutOptions::default()).unwrap());
        let wcsaxes = out.header.position("WCSAXES").unwrap();
        assert_eq!(wcsaxes + 1, out.header.position("CTYPE1").unwrap());
        assert_eq!(out.header.get_i64("WCSAXES").unwrap(), Some(2));
    }

    #[test]
    fn wcsaxes_after_naxis_without_ctype() {
        let header = Header::from_cards(vec![
            card("SIMPLE", Value::Logical(true)),
            card("BITPIX", Value::Integer(8)),
            card("NAXIS", Value::Integer(1)),
            card("NAXIS1", Value::Integer(4)),
            card("WCSAXES", Value::Integer(3)),
            card("OBJECT", Value::String("x".into())),
        ]);
        let hdu = Hdu::new(HduKind::Primary, header, Some(ImageData::U8(vec![1, 2, 3, 4])));
        let out = extracted(cut_hdu(&hdu, &[PixelRange::new(2, 3)], &CutoutOptions::default()).unwrap());
        assert_eq!(out.header.position("WCSAXES"), Some(4));
        assert_eq!(out.header.get_i64("WCSAXES").unwrap(), Some(1));
        assert_eq!(out.data, Some(ImageData::U8(vec![2, 3])));
    }

    #[test]
    fn prefer_pc_converts_cd() {
        let mut hdu = image(10, 10);
        let at = hdu.header.position("CRPIX1").unwrap();
        hdu.header.insert(at, card("CD2_2", f(0.1)));
        hdu.header.insert(at, card("CD1_1", f(-0.1)));
        let options = CutoutOptions {
            prefer_pc: true,
            ..CutoutOptions::default()
        };
        let ranges = [PixelRange::new(1, 10), PixelRange::new(1, 10)];
        let out = extracted(cut_hdu(&hdu, &ranges, &options).unwrap());
        let h = &out.header;
        assert!(!h.contains("CD1_1") && !h.contains("CD2_2"));
        assert_eq!(h.get_f64("PC1_1").unwrap(), Some(-0.1));
        assert_eq!(h.get_f64("PC2_2").unwrap(), Some(0.1));
        assert!(!h.contains("CDELT1") && !h.contains("CDELT2"));
        let ctype2 = h.position("CTYPE2").unwrap();
        assert_eq!(h.position("PC1_1"), Some(ctype2 + 1));
        assert_eq!(h.position("PC2_2"), Some(ctype2 + 2));
    }

    #[test]
    fn prefer_pc_keeps_cdelt_of_existing_pc_rows() {
        let mut hdu = image(10, 10);
        let at = hdu.header.position("CRPIX1").unwrap();
        hdu.header.insert(at, card("PC2_2", f(1.0)));
        hdu.header.insert(at, card("CD2_2", f(0.1)));
        hdu.header.insert(at, card("CD1_1", f(-0.1)));
        let options = CutoutOptions {
            prefer_pc: true,
            ..CutoutOptions::default()
        };
        let ranges = [PixelRange::new(1, 10), PixelRange::new(1, 10)];
        let h = extracted(cut_hdu(&hdu, &ranges, &options).unwrap()).header;
        assert!(!h.contains("CD1_1") && !h.contains("CD2_2"));
        assert_eq!(h.get_f64("PC1_1").unwrap(), Some(-0.1));
        assert!(!h.contains("CDELT1"));
        assert_eq!(h.get_f64("PC2_2").unwrap(), Some(1.0));
        assert_eq!(h.get_f64("CDELT2").unwrap(), Some(0.1));
    }

    #[test]
    fn non_numeric_crpix_is_error() {
        let mut hdu = image(10, 10);
        hdu.header.set("CRPIX1", Value::String("bad".into()));
        let ranges = [PixelRange::new(1, 5), PixelRange::new(1, 5)];
        assert!(matches!(
            cut_hdu(&hdu, &ranges, &CutoutOptions::default()),
            Err(Error::InvalidValue(_))
        ));
    }
}
