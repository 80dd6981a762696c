//! The cutout engine: requests, region translation, clipping and the
//! header rewriter.
//!
//! [`cutout`] is the entry point. It resolves which HDUs a
//! [`CutoutSpecification`] applies to, turns each request into one pixel
//! range per axis and slices the matching HDUs.

pub mod axes;
pub mod clip;
pub mod compose;
pub mod extension;
pub mod range;
pub mod request;
pub mod rewrite;
pub mod translate;

use log::debug;

use crate::error::Result;
use crate::hdu::Hdu;
use crate::wcs::{HeaderWcs, WcsProjector};

pub use axes::{classify_axes, AxisRoleMap};
pub use compose::Composition;
pub use range::{AxisSelection, PixelRange};
pub use request::{
    AxisRole, CutoutSpecification, ExtensionSelector, PixelCutout, PixelEntry, PolarizationState,
    Shape, WorldCutout,
};

/// Number of points sampled along a circle's circumference.
pub const DEFAULT_CIRCLE_VERTICES: usize = 64;

/// Knobs that change how cutouts are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CutoutOptions {
    /// Rewrite `CDi_j` matrices as `PCi_j`.
    pub prefer_pc: bool,
    pub circle_vertices: usize,
}

impl Default for CutoutOptions {
    fn default() -> Self {
        CutoutOptions {
            prefer_pc: false,
            circle_vertices: DEFAULT_CIRCLE_VERTICES,
        }
    }
}

/// Outcome of cutting one HDU.
#[derive(Debug, Clone, PartialEq)]
pub enum CutoutResult {
    Extracted(Hdu),
    NoOverlap(String),
}

/// What to cut from one HDU.
#[derive(Debug, Clone, Copy)]
pub enum HduRequest<'a> {
    Pixel(&'a [AxisSelection]),
    World(&'a WorldCutout),
}

/// Cut `hdus` with the built-in header WCS.
///
/// Returns the output HDUs in file order. Fails with
/// [`Error::NoOverlap`](crate::Error::NoOverlap) when nothing in the file
/// was cut.
pub fn cutout(
    spec: &CutoutSpecification,
    hdus: &[Hdu],
    options: &CutoutOptions,
) -> Result<Vec<Hdu>> {
    cutout_with::<HeaderWcs>(spec, hdus, options)
}

/// [`cutout`] with a caller-chosen WCS backend.
pub fn cutout_with<W: WcsProjector>(
    spec: &CutoutSpecification,
    hdus: &[Hdu],
    options: &CutoutOptions,
) -> Result<Vec<Hdu>> {
    extension::resolve::<W>(spec, hdus, options)
}

/// Work out the full-rank pixel ranges `request` selects on `hdu`.
///
/// Validation problems are errors; a request that misses the HDU is
/// [`Composition::NoOverlap`].
pub fn plan<W: WcsProjector>(
    hdu: &Hdu,
    request: HduRequest<'_>,
    options: &CutoutOptions,
) -> Result<Composition> {
    let naxes = hdu.header.naxes()?;
    match request {
        HduRequest::Pixel(axes) => compose::compose_pixel(&naxes, axes).map(Composition::Ranges),
        HduRequest::World(world) => {
            let wcs = W::from_header(&hdu.header)?;
            let roles = classify_axes(&wcs)?;
            debug!("axis roles {roles:?} for shape {naxes:?}");
            let mut outcomes = Vec::with_capacity(world.shapes().len());
            for shape in world.shapes() {
                let outcome =
                    translate::translate(shape, &hdu.header, &wcs, &roles, &naxes, options)?;
                outcomes.push((shape.role(), outcome));
            }
            Ok(compose::compose_world(&naxes, outcomes))
        }
    }
}
