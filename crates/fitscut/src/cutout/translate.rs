//! World shapes to candidate pixel intervals on one HDU.

use log::debug;

use crate::error::{Error, Result};
use crate::header::Header;
use crate::wcs::{PixelBox, SkyRegion, WcsProjector};

use super::axes::AxisRoleMap;
use super::request::{PolarizationState, Shape};
use super::CutoutOptions;

/// Unclipped pixel bounds on one 1-based axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisInterval {
    pub axis: usize,
    pub lower: f64,
    pub upper: f64,
}

/// What one shape selects on one HDU.
#[derive(Debug, Clone, PartialEq)]
pub enum Translation {
    Intervals(Vec<AxisInterval>),
    NoOverlap(String),
}

/// Length of a 1-based axis; axes past NAXIS are degenerate.
pub(crate) fn axis_len(naxes: &[usize], axis: usize) -> usize {
    axis.checked_sub(1)
        .and_then(|i| naxes.get(i))
        .copied()
        .unwrap_or(1)
}

/// Translate one shape against a header and its WCS.
pub fn translate<W: WcsProjector>(
    shape: &Shape,
    header: &Header,
    wcs: &W,
    roles: &AxisRoleMap,
    naxes: &[usize],
    options: &CutoutOptions,
) -> Result<Translation> {
    match shape {
        Shape::Circle { ra, dec, radius } => {
            let region = SkyRegion::Circle {
                ra: *ra,
                dec: *dec,
                radius: *radius,
                samples: options.circle_vertices,
            };
            sky(&region, wcs, roles, naxes)
        }
        Shape::Polygon { vertices } => {
            let region = SkyRegion::Polygon {
                vertices: vertices.clone(),
            };
            sky(&region, wcs, roles, naxes)
        }
        Shape::Energy { lower, upper } => energy(*lower, *upper, wcs, roles),
        Shape::Polarization { states } => polarization(states, header, roles, naxes),
        Shape::Time { .. } => Err(Error::UnsupportedTimeCutout),
    }
}

fn sky<W: WcsProjector>(
    region: &SkyRegion,
    wcs: &W,
    roles: &AxisRoleMap,
    naxes: &[usize],
) -> Result<Translation> {
    let &[ax, ay] = roles.position.as_slice() else {
        return Ok(Translation::NoOverlap("no celestial axis pair".into()));
    };
    let Some(bbox) = wcs.sub(&[ax, ay])?.sky_bounding_box(region)? else {
        return Ok(Translation::NoOverlap("sky region cannot be projected".into()));
    };
    let PixelBox {
        x_min,
        x_max,
        y_min,
        y_max,
    } = bbox;
    let (nx, ny) = (axis_len(naxes, ax) as f64, axis_len(naxes, ay) as f64);
    debug!("sky region spans x {x_min}..{x_max}, y {y_min}..{y_max} on {nx}x{ny}");

    if x_max < 1.0 || x_min > nx || y_max < 1.0 || y_min > ny {
        return Ok(Translation::NoOverlap(format!(
            "sky region falls outside the {nx}x{ny} image"
        )));
    }
    Ok(Translation::Intervals(vec![
        AxisInterval {
            axis: ax,
            lower: x_min,
            upper: x_max,
        },
        AxisInterval {
            axis: ay,
            lower: y_min,
            upper: y_max,
        },
    ]))
}

fn energy<W: WcsProjector>(lower: f64, upper: f64, wcs: &W, roles: &AxisRoleMap) -> Result<Translation> {
    let Some(axis) = roles.spectral else {
        return Ok(Translation::NoOverlap("no spectral axis".into()));
    };
    let spectral = wcs.sub(&[axis])?.to_wavelength()?;
    let p0 = spectral.world_to_pixel(lower)?;
    let p1 = spectral.world_to_pixel(upper)?;
    if !p0.is_finite() || !p1.is_finite() {
        return Err(Error::SpectralConversion(format!(
            "band {lower}..{upper} m has no pixel position"
        )));
    }
    Ok(Translation::Intervals(vec![AxisInterval {
        axis,
        lower: p0.min(p1),
        upper: p0.max(p1),
    }]))
}

fn required(header: &Header, key: String) -> Result<f64> {
    header.get_f64(&key)?.ok_or(Error::MissingKeyword(key))
}

fn polarization(
    states: &[PolarizationState],
    header: &Header,
    roles: &AxisRoleMap,
    naxes: &[usize],
) -> Result<Translation> {
    let Some(axis) = roles.polarization else {
        return Ok(Translation::NoOverlap("no polarization axis".into()));
    };
    let crval = required(header, format!("CRVAL{axis}"))?;
    let crpix = required(header, format!("CRPIX{axis}"))?;
    let cdelt = required(header, format!("CDELT{axis}"))?;
    if cdelt == 0.0 {
        return Err(Error::InvalidValue(format!("CDELT{axis}")));
    }

    let present: Vec<i64> = (1..=axis_len(naxes, axis))
        .map(|i| (crval + (i as f64 - crpix) * cdelt).round() as i64)
        .collect();
    let pixels: Vec<f64> = states
        .iter()
        .map(|s| s.code())
        .filter(|code| present.contains(code))
        .map(|code| crpix + (code as f64 - crval) / cdelt)
        .collect();
    debug!("STOKES axis {axis} holds {present:?}, matched pixels {pixels:?}");

    if pixels.is_empty() {
        return Ok(Translation::NoOverlap(
            "requested polarization states are not present".into(),
        ));
    }
    let lower = pixels.iter().copied().fold(f64::INFINITY, f64::min);
    let upper = pixels.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    Ok(Translation::Intervals(vec![AxisInterval { axis, lower, upper }]))
}
