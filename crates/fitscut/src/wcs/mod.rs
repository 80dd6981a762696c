//! World coordinate systems.
//!
//! The cutout engine talks to WCS through [`WcsProjector`]. [`HeaderWcs`] is
//! the built-in backend: it reads the linear transform straight from header
//! keywords, hands celestial projections to `mapproj` and implements linear
//! or logarithmic spectral axes.

pub mod celestial;
pub mod spectral;

use log::debug;

use crate::error::{Error, Result};
use crate::header::Header;

use self::celestial::{
    angular_distance, circle_boundary, densify_polygon, polygon_contains, CelestialParams, ProjParams,
    SkyProjection,
};
use self::spectral::{Algorithm, RestFrame};

/// Coordinate type of one WCS axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AxisType {
    Celestial,
    Spectral,
    Stokes,
    Time,
    Linear,
}

const TIME_CODES: &[&str] = &[
    "TIME", "UTC", "TAI", "TT", "TDT", "ET", "IAT", "UT1", "UT", "TDB", "TCG", "TCB", "GPS",
    "LOCAL", "MJD", "JD", "BEPOCH", "JEPOCH",
];

/// Leading type code of a CTYPE value (`RA---TAN` gives `RA`).
pub fn ctype_code(ctype: &str) -> &str {
    let ctype = ctype.trim();
    ctype.split('-').next().unwrap_or(ctype)
}

/// Returns `true` for the longitude member of a celestial pair.
pub fn is_longitude(ctype: &str) -> bool {
    let code = ctype_code(ctype);
    code == "RA" || (code.len() == 4 && (code.ends_with("LON") || code.ends_with("LN")))
}

/// Classify a CTYPE value.
pub fn axis_type(ctype: &str) -> AxisType {
    let code = ctype_code(ctype);
    let four = code.len() == 4;
    if code == "RA"
        || code == "DEC"
        || (four && ["LON", "LAT"].iter().any(|s| code.ends_with(s)))
        || (four && ["LN", "LT"].iter().any(|s| code.ends_with(s)))
    {
        AxisType::Celestial
    } else if spectral::SpectralType::from_code(code).is_some() {
        AxisType::Spectral
    } else if code == "STOKES" {
        AxisType::Stokes
    } else if TIME_CODES.contains(&code) {
        AxisType::Time
    } else {
        AxisType::Linear
    }
}

/// A sky region in degrees.
#[derive(Debug, Clone, PartialEq)]
pub enum SkyRegion {
    /// Small circle, sampled at `samples` points along its circumference.
    Circle {
        ra: f64,
        dec: f64,
        radius: f64,
        samples: usize,
    },
    /// Spherical polygon with great-circle edges.
    Polygon { vertices: Vec<(f64, f64)> },
}

impl SkyRegion {
    /// Sky points whose projected extent bounds the region.
    pub fn boundary(&self) -> Vec<(f64, f64)> {
        match self {
            SkyRegion::Circle {
                ra,
                dec,
                radius,
                samples,
            } => circle_boundary(*ra, *dec, *radius, *samples),
            SkyRegion::Polygon { vertices } => densify_polygon(vertices, 8),
        }
    }

    /// Returns `true` when (`lon`, `lat`) lies inside the region.
    pub fn contains(&self, lon: f64, lat: f64) -> bool {
        match self {
            SkyRegion::Circle {
                ra, dec, radius, ..
            } => angular_distance((*ra, *dec), (lon, lat)) <= *radius,
            SkyRegion::Polygon { vertices } => polygon_contains(vertices, (lon, lat)),
        }
    }
}

/// Pixel-space bounding box, 1-based, rounded to whole pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelBox {
    pub x_min: f64,
    pub x_max: f64,
    pub y_min: f64,
    pub y_max: f64,
}

impl PixelBox {
    /// Covers every pixel of any image.
    pub const UNBOUNDED: PixelBox = PixelBox {
        x_min: f64::NEG_INFINITY,
        x_max: f64::INFINITY,
        y_min: f64::NEG_INFINITY,
        y_max: f64::INFINITY,
    };
}

/// The WCS operations the cutout engine depends on.
///
/// Axis numbers are 1-based; the axes of a `sub` result are numbered in the
/// order they were selected.
pub trait WcsProjector: Sized {
    /// Build from an HDU header.
    fn from_header(header: &Header) -> Result<Self>;

    /// Keep only the given axes.
    fn sub(&self, axes: &[usize]) -> Result<Self>;

    /// Coordinate type of every axis, in axis order.
    fn axis_types(&self) -> Vec<AxisType>;

    /// CTYPE of a 1-based axis.
    fn ctype(&self, axis: usize) -> Option<&str>;

    /// Project a sky region on a two-axis celestial WCS and return its pixel
    /// bounding box.
    ///
    /// Boundary points outside the projection's domain are skipped. When any
    /// are skipped and the region holds the reference point, the box is
    /// [`PixelBox::UNBOUNDED`]. `None` means no part of the region projects.
    fn sky_bounding_box(&self, region: &SkyRegion) -> Result<Option<PixelBox>>;

    /// Switch a single spectral axis to vacuum wavelength in metres.
    fn to_wavelength(&self) -> Result<Self>;

    /// Pixel coordinate of a world value on a single-axis WCS.
    fn world_to_pixel(&self, world: f64) -> Result<f64>;
}

/// WCS read directly from header keywords.
#[derive(Debug, Clone, PartialEq)]
pub struct HeaderWcs {
    ctype: Vec<String>,
    cunit: Vec<String>,
    crpix: Vec<f64>,
    crval: Vec<f64>,
    /// Pixel offset to intermediate world coordinate; row = world axis,
    /// CDELT folded in.
    matrix: Vec<Vec<f64>>,
    lonpole: Option<f64>,
    /// `PVi_m` per axis.
    pv: Vec<ProjParams>,
    rest: RestFrame,
    wavelength_frame: bool,
}

impl HeaderWcs {
    fn naxis(&self) -> usize {
        self.ctype.len()
    }

    /// Keyword value for a 1-based axis, or `default` when absent.
    fn axis_f64(header: &Header, key: &str, axis: usize, default: f64) -> Result<f64> {
        Ok(header.get_f64(&format!("{key}{axis}"))?.unwrap_or(default))
    }

    fn single_axis(&self) -> Result<()> {
        if self.naxis() == 1 {
            Ok(())
        } else {
            Err(Error::InvalidValue(format!(
                "expected a single-axis WCS, found {} axes",
                self.naxis()
            )))
        }
    }
}

impl WcsProjector for HeaderWcs {
    fn from_header(header: &Header) -> Result<Self> {
        let naxis = match header.get_i64("WCSAXES")? {
            Some(n) => n,
            None => header.get_i64("NAXIS")?.unwrap_or(0),
        }
        .max(0) as usize;

        let mut wcs = HeaderWcs {
            ctype: Vec::with_capacity(naxis),
            cunit: Vec::with_capacity(naxis),
            crpix: Vec::with_capacity(naxis),
            crval: Vec::with_capacity(naxis),
            matrix: vec![vec![0.0; naxis]; naxis],
            lonpole: header.get_f64("LONPOLE")?,
            pv: Vec::with_capacity(naxis),
            rest: RestFrame {
                frequency: match header.get_f64("RESTFRQ")? {
                    Some(f) => Some(f),
                    None => header.get_f64("RESTFREQ")?,
                },
                wavelength: header.get_f64("RESTWAV")?,
            },
            wavelength_frame: false,
        };

        for i in 1..=naxis {
            wcs.ctype.push(header.get_str(&format!("CTYPE{i}")).unwrap_or("").to_string());
            wcs.cunit.push(header.get_str(&format!("CUNIT{i}")).unwrap_or("").to_string());
            wcs.crpix.push(Self::axis_f64(header, "CRPIX", i, 0.0)?);
            wcs.crval.push(Self::axis_f64(header, "CRVAL", i, 0.0)?);
            let mut pv: ProjParams = [None; 21];
            for (m, slot) in pv.iter_mut().enumerate() {
                *slot = header.get_f64(&format!("PV{i}_{m}"))?;
            }
            wcs.pv.push(pv);
        }

        let has_cd = header
            .cards()
            .iter()
            .any(|c| c.keyword_str().starts_with("CD") && c.keyword_str().contains('_'));
        for i in 1..=naxis {
            let cdelt = Self::axis_f64(header, "CDELT", i, 1.0)?;
            for j in 1..=naxis {
                let identity = if i == j { 1.0 } else { 0.0 };
                wcs.matrix[i - 1][j - 1] = if has_cd {
                    header.get_f64(&format!("CD{i}_{j}"))?.unwrap_or(0.0)
                } else {
                    cdelt * header.get_f64(&format!("PC{i}_{j}"))?.unwrap_or(identity)
                };
            }
        }
        Ok(wcs)
    }

    fn sub(&self, axes: &[usize]) -> Result<Self> {
        let n = self.naxis();
        if let Some(bad) = axes.iter().find(|&&a| a == 0 || a > n) {
            return Err(Error::InvalidValue(format!("WCS axis {bad} out of range 1..={n}")));
        }
        let pick = |v: &[f64]| axes.iter().map(|&a| v[a - 1]).collect::<Vec<_>>();
        Ok(HeaderWcs {
            ctype: axes.iter().map(|&a| self.ctype[a - 1].clone()).collect(),
            cunit: axes.iter().map(|&a| self.cunit[a - 1].clone()).collect(),
            crpix: pick(&self.crpix),
            crval: pick(&self.crval),
            matrix: axes.iter().map(|&r| pick(&self.matrix[r - 1])).collect(),
            lonpole: self.lonpole,
            pv: axes.iter().map(|&a| self.pv[a - 1]).collect(),
            rest: self.rest,
            wavelength_frame: self.wavelength_frame,
        })
    }

    fn axis_types(&self) -> Vec<AxisType> {
        self.ctype.iter().map(|c| axis_type(c)).collect()
    }

    fn ctype(&self, axis: usize) -> Option<&str> {
        axis.checked_sub(1)
            .and_then(|i| self.ctype.get(i))
            .map(String::as_str)
    }

    fn sky_bounding_box(&self, region: &SkyRegion) -> Result<Option<PixelBox>> {
        if self.naxis() != 2 || self.axis_types().iter().any(|t| *t != AxisType::Celestial) {
            return Err(Error::InvalidValue(
                "sky projection needs exactly two celestial axes".into(),
            ));
        }
        let lon = if is_longitude(&self.ctype[0]) { 0 } else { 1 };
        let lat = 1 - lon;
        let m = &self.matrix;
        let det = m[0][0] * m[1][1] - m[0][1] * m[1][0];
        if det == 0.0 || !det.is_finite() {
            return Err(Error::InvalidValue("singular WCS matrix".into()));
        }
        let projection = SkyProjection::new(&CelestialParams {
            code: self.ctype[lon].get(5..8).unwrap_or("").to_string(),
            crpix: [self.crpix[0], self.crpix[1]],
            cd: [[m[lon][0], m[lon][1]], [m[lat][0], m[lat][1]]],
            crval: (self.crval[lon], self.crval[lat]),
            lonpole: self.lonpole,
            pv_lon: self.pv[lon],
            pv_lat: self.pv[lat],
        })?;

        let mut bbox = PixelBox {
            x_min: f64::INFINITY,
            x_max: f64::NEG_INFINITY,
            y_min: f64::INFINITY,
            y_max: f64::NEG_INFINITY,
        };
        let (mut projected, mut skipped) = (0usize, 0usize);
        for (ra, dec) in region.boundary() {
            let Some((px, py)) = projection.pixel(ra, dec) else {
                skipped += 1;
                continue;
            };
            projected += 1;
            bbox.x_min = bbox.x_min.min(px);
            bbox.x_max = bbox.x_max.max(px);
            bbox.y_min = bbox.y_min.min(py);
            bbox.y_max = bbox.y_max.max(py);
        }

        if skipped > 0 {
            let (lon0, lat0) = (self.crval[lon], self.crval[lat]);
            if region.contains(lon0, lat0) {
                debug!("{skipped} boundary points do not project around ({lon0}, {lat0}); region covers the image");
                return Ok(Some(PixelBox::UNBOUNDED));
            }
            if projected == 0 {
                debug!("no boundary point projects with {}", self.ctype[lon]);
                return Ok(None);
            }
            debug!("{skipped} of {} boundary points do not project", skipped + projected);
        }
        Ok(Some(PixelBox {
            x_min: bbox.x_min.round(),
            x_max: bbox.x_max.round(),
            y_min: bbox.y_min.round(),
            y_max: bbox.y_max.round(),
        }))
    }

    fn to_wavelength(&self) -> Result<Self> {
        self.single_axis()?;
        let (ty, _) = spectral::parse_ctype(&self.ctype[0])?;
        ty.unit_scale(&self.cunit[0])?;
        self.rest.check(ty)?;
        Ok(HeaderWcs {
            wavelength_frame: true,
            ..self.clone()
        })
    }

    fn world_to_pixel(&self, world: f64) -> Result<f64> {
        self.single_axis()?;
        let (native, algorithm) = if self.wavelength_frame {
            let (ty, algorithm) = spectral::parse_ctype(&self.ctype[0])?;
            let si = spectral::from_wavelength(ty, world, &self.rest)?;
            (si / ty.unit_scale(&self.cunit[0])?, algorithm)
        } else if axis_type(&self.ctype[0]) == AxisType::Spectral {
            (world, spectral::parse_ctype(&self.ctype[0])?.1)
        } else {
            (world, Algorithm::Linear)
        };

        let scale = self.matrix[0][0];
        if scale == 0.0 {
            return Err(Error::InvalidValue(format!("zero increment on {}", self.ctype[0])));
        }
        let (crpix, crval) = (self.crpix[0], self.crval[0]);
        match algorithm {
            Algorithm::Linear => Ok(crpix + (native - crval) / scale),
            Algorithm::Log => {
                let ratio = native / crval;
                if ratio.is_nan() || ratio <= 0.0 {
                    return Err(Error::SpectralConversion(format!(
                        "{native} is outside the domain of {}",
                        self.ctype[0]
                    )));
                }
                Ok(crpix + crval * ratio.ln() / scale)
            }
        }
    }
}
