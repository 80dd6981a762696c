//! Choosing which HDUs a request applies to and collecting the results.

use log::{debug, info, warn};

use crate::error::{Error, Result};
use crate::hdu::{Hdu, HduKind};
use crate::wcs::WcsProjector;

use super::compose::Composition;
use super::request::{CutoutSpecification, ExtensionSelector, PixelEntry};
use super::rewrite::cut_hdu;
use super::{plan, CutoutOptions, CutoutResult, HduRequest};

/// First HDU matching `selector`, with its index.
pub fn find_hdu<'a>(selector: &ExtensionSelector, hdus: &'a [Hdu]) -> Option<(usize, &'a Hdu)> {
    hdus.iter()
        .enumerate()
        .find(|(i, hdu)| selector.matches(*i, hdu.extname(), hdu.extver(), hdus.len()))
}

/// Apply `spec` to `hdus`.
pub fn resolve<W: WcsProjector>(
    spec: &CutoutSpecification,
    hdus: &[Hdu],
    options: &CutoutOptions,
) -> Result<Vec<Hdu>> {
    if let CutoutSpecification::Pixel(pixel) = spec {
        if let [entry] = pixel.entries.as_slice() {
            return single::<W>(entry, hdus, options);
        }
    }

    let passthrough = hdus.len() > 1;
    let mut out = Vec::new();
    let mut misses = Vec::new();
    let mut extracted = 0usize;

    for (index, hdu) in hdus.iter().enumerate() {
        if let HduKind::Other(kind) = hdu.kind {
            info!("HDU {index}: skipping {kind}");
            continue;
        }
        if hdu.data.is_none() {
            if hdu.kind == HduKind::Primary && passthrough {
                debug!("HDU {index}: copying data-less primary");
                out.push(hdu.clone());
            }
            continue;
        }

        let request = match spec {
            CutoutSpecification::Pixel(pixel) => {
                let entry = pixel
                    .entries
                    .iter()
                    .find(|e| e.extension.matches(index, hdu.extname(), hdu.extver(), hdus.len()));
                match entry {
                    Some(entry) => HduRequest::Pixel(&entry.axes),
                    None => continue,
                }
            }
            CutoutSpecification::World(world) => HduRequest::World(world),
        };

        match cut::<W>(index, hdu, request, options)? {
            CutoutResult::Extracted(cut) => {
                out.push(cut);
                extracted += 1;
            }
            CutoutResult::NoOverlap(reason) => misses.push(format!("HDU {index}: {reason}")),
        }
    }

    if extracted == 0 {
        return Err(Error::NoOverlap(if misses.is_empty() {
            "no extension matches the request".into()
        } else {
            misses.join("; ")
        }));
    }
    Ok(out)
}

fn single<W: WcsProjector>(
    entry: &PixelEntry,
    hdus: &[Hdu],
    options: &CutoutOptions,
) -> Result<Vec<Hdu>> {
    let (index, hdu) = find_hdu(&entry.extension, hdus)
        .ok_or_else(|| Error::ExtensionNotFound(entry.extension.to_string()))?;
    if !hdu.has_image() {
        return Err(Error::NoOverlap(format!("HDU {index} has no image data")));
    }
    match cut::<W>(index, hdu, HduRequest::Pixel(&entry.axes), options)? {
        CutoutResult::Extracted(cut) => Ok(vec![cut]),
        CutoutResult::NoOverlap(reason) => Err(Error::NoOverlap(format!("HDU {index}: {reason}"))),
    }
}

/// Plan and cut one HDU. Rewriter failures skip the HDU instead of failing
/// the request.
fn cut<W: WcsProjector>(
    index: usize,
    hdu: &Hdu,
    request: HduRequest<'_>,
    options: &CutoutOptions,
) -> Result<CutoutResult> {
    let ranges = match plan::<W>(hdu, request, options)? {
        Composition::Ranges(ranges) => ranges,
        Composition::NoOverlap(reason) => {
            debug!("HDU {index}: {reason}");
            return Ok(CutoutResult::NoOverlap(reason));
        }
    };
    match cut_hdu(hdu, &ranges, options) {
        Ok(result) => Ok(result),
        Err(e) => {
            warn!("HDU {index}: skipping, header cannot be rewritten: {e}");
            Ok(CutoutResult::NoOverlap(e.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cutout::range::{AxisSelection, PixelRange};
    use crate::cutout::request::PixelCutout;
    use crate::header::{Card, Header};
    use crate::image::ImageData;
    use crate::value::Value;
    use crate::wcs::HeaderWcs;

    fn card(keyword: &str, value: Value) -> Card {
        Card::new(keyword, value)
    }

    fn primary(with_data: bool) -> Hdu {
        let mut cards = vec![
            card("SIMPLE", Value::Logical(true)),
            card("BITPIX", Value::Integer(8)),
        ];
        if with_data {
            cards.push(card("NAXIS", Value::Integer(1)));
            cards.push(card("NAXIS1", Value::Integer(4)));
        } else {
            cards.push(card("NAXIS", Value::Integer(0)));
        }
        let data = with_data.then(|| ImageData::U8(vec![1, 2, 3, 4]));
        Hdu::new(HduKind::Primary, Header::from_cards(cards), data)
    }

    fn sci(extver: i64) -> Hdu {
        let header = Header::from_cards(vec![
            card("XTENSION", Value::String("IMAGE".into())),
            card("BITPIX", Value::Integer(8)),
            card("NAXIS", Value::Integer(1)),
            card("NAXIS1", Value::Integer(4)),
            card("PCOUNT", Value::Integer(0)),
            card("GCOUNT", Value::Integer(1)),
            card("EXTNAME", Value::String("SCI".into())),
            card("EXTVER", Value::Integer(extver)),
        ]);
        let base = extver as u8 * 10;
        Hdu::new(HduKind::Image, header, Some(ImageData::U8(vec![base, base + 1, base + 2, base + 3])))
    }

    fn named(extname: &str, value: u8) -> Hdu {
        let mut hdu = sci(1);
        hdu.header.set("EXTNAME", Value::String(extname.into()));
        hdu.data = Some(ImageData::U8(vec![value; 4]));
        hdu
    }

    fn table() -> Hdu {
        Hdu::new(HduKind::Other("binary table"), Header::new(), None)
    }

    fn pixel(entries: Vec<(ExtensionSelector, i64, i64)>) -> CutoutSpecification {
        CutoutSpecification::Pixel(PixelCutout {
            entries: entries
                .into_iter()
                .map(|(extension, lo, hi)| PixelEntry {
                    extension,
                    axes: vec![AxisSelection::Range(PixelRange::new(lo, hi))],
                })
                .collect(),
        })
    }

    fn run(spec: &CutoutSpecification, hdus: &[Hdu]) -> Result<Vec<Hdu>> {
        resolve::<HeaderWcs>(spec, hdus, &CutoutOptions::default())
    }

    #[test]
    fn find_by_name_version_and_index() {
        let hdus = [primary(false), sci(1), sci(2)];
        let by_version = ExtensionSelector::ByNameVersion("SCI".into(), 2);
        assert_eq!(find_hdu(&by_version, &hdus).map(|(i, _)| i), Some(2));
        let by_index = ExtensionSelector::ByIndex(1);
        assert_eq!(find_hdu(&by_index, &hdus).map(|(i, _)| i), Some(1));
        let missing = ExtensionSelector::ByName("ERR".into());
        assert!(find_hdu(&missing, &hdus).is_none());
    }

    #[test]
    fn index_wins_over_numeric_extname() {
        let hdus = [primary(false), named("2", 1), named("X", 2)];
        let by_index = ExtensionSelector::ByIndex(2);
        assert_eq!(find_hdu(&by_index, &hdus).map(|(i, _)| i), Some(2));

        let spec = pixel(vec![
            (ExtensionSelector::ByIndex(2), 1, 1),
            (ExtensionSelector::ByName("X".into()), 1, 1),
        ]);
        let out = run(&spec, &hdus).unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[1].data, Some(ImageData::U8(vec![2])));

        let past_end = ExtensionSelector::ByIndex(5);
        let hdus = [primary(false), named("5", 1)];
        assert_eq!(find_hdu(&past_end, &hdus).map(|(i, _)| i), Some(1));
    }

    #[test]
    fn fast_path_cuts_one_hdu() {
        let hdus = [primary(false), sci(1), sci(2)];
        let spec = pixel(vec![(ExtensionSelector::ByNameVersion("sci".into(), 2), 2, 3)]);
        let out = run(&spec, &hdus).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].data, Some(ImageData::U8(vec![21, 22])));
    }

    #[test]
    fn fast_path_missing_extension() {
        let hdus = [primary(false), sci(1)];
        let spec = pixel(vec![(ExtensionSelector::ByName("ERR".into()), 1, 2)]);
        assert!(matches!(run(&spec, &hdus), Err(Error::ExtensionNotFound(s)) if s == "[ERR]"));
    }

    #[test]
    fn fast_path_no_overlap() {
        let hdus = [primary(false), sci(1)];
        let spec = pixel(vec![(ExtensionSelector::ByIndex(1), 10, 20)]);
        assert!(run(&spec, &hdus).unwrap_err().is_no_overlap());
    }

    #[test]
    fn general_path_passes_primary_through() {
        let hdus = [primary(false), sci(1), table(), sci(2)];
        let spec = pixel(vec![
            (ExtensionSelector::ByIndex(1), 1, 2),
            (ExtensionSelector::ByNameVersion("SCI".into(), 2), 3, 4),
        ]);
        let out = run(&spec, &hdus).unwrap();
        assert_eq!(out.len(), 3);
        assert_eq!(out[0], hdus[0]);
        assert_eq!(out[1].data, Some(ImageData::U8(vec![10, 11])));
        assert_eq!(out[2].data, Some(ImageData::U8(vec![22, 23])));
    }

    #[test]
    fn general_path_partial_miss() {
        let hdus = [primary(true), sci(1)];
        let spec = pixel(vec![
            (ExtensionSelector::ByIndex(0), 50, 60),
            (ExtensionSelector::ByIndex(1), 2, 2),
        ]);
        let out = run(&spec, &hdus).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].data, Some(ImageData::U8(vec![11])));
    }

    #[test]
    fn general_path_everything_misses() {
        let hdus = [primary(false), sci(1), sci(2)];
        let spec = pixel(vec![
            (ExtensionSelector::ByIndex(1), 50, 60),
            (ExtensionSelector::ByIndex(2), 50, 60),
        ]);
        let err = run(&spec, &hdus).unwrap_err();
        assert!(matches!(err, Error::NoOverlap(ref r) if r.contains("HDU 1") && r.contains("HDU 2")));
    }

    #[test]
    fn general_path_nothing_matches() {
        let hdus = [primary(false), sci(1)];
        let spec = pixel(vec![
            (ExtensionSelector::ByName("ERR".into()), 1, 2),
            (ExtensionSelector::ByIndex(7), 1, 2),
        ]);
        assert!(run(&spec, &hdus).unwrap_err().is_no_overlap());
    }

    #[test]
    fn rewrite_failure_skips_extension() {
        let mut bad = sci(1);
        bad.header.set("CRPIX1", Value::String("oops".into()));
        let hdus = [primary(false), bad, sci(2)];
        let spec = pixel(vec![
            (ExtensionSelector::ByIndex(1), 1, 2),
            (ExtensionSelector::ByIndex(2), 1, 2),
        ]);
        let out = run(&spec, &hdus).unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[1].extver(), 2);
    }
}
