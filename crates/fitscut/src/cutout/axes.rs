use crate::error::{Error, Result};
use crate::wcs::{AxisType, WcsProjector};

use super::request::AxisRole;

/// Which 1-based header axes carry each [`AxisRole`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AxisRoleMap {
    /// Longitude-like then latitude-like axis, in header order.
    pub position: Vec<usize>,
    pub spectral: Option<usize>,
    /// Never populated: time axes are not cut.
    pub temporal: Option<usize>,
    pub polarization: Option<usize>,
}

impl AxisRoleMap {
    /// Axes assigned to `role`, empty when the header lacks it.
    pub fn axes(&self, role: AxisRole) -> Vec<usize> {
        match role {
            AxisRole::Position => self.position.clone(),
            AxisRole::Spectral => self.spectral.into_iter().collect(),
            AxisRole::Temporal => self.temporal.into_iter().collect(),
            AxisRole::Polarization => self.polarization.into_iter().collect(),
        }
    }
}

/// Assign roles to the axes of a WCS.
///
/// Fails on any axis that is neither celestial, spectral nor Stokes.
pub fn classify_axes<W: WcsProjector>(wcs: &W) -> Result<AxisRoleMap> {
    let mut map = AxisRoleMap::default();
    for (i, ty) in wcs.axis_types().into_iter().enumerate() {
        let axis = i + 1;
        match ty {
            AxisType::Celestial => {
                if map.position.len() < 2 {
                    map.position.push(axis);
                }
            }
            AxisType::Spectral => {
                map.spectral.get_or_insert(axis);
            }
            AxisType::Stokes => {
                map.polarization.get_or_insert(axis);
            }
            AxisType::Time | AxisType::Linear => {
                return Err(Error::UnknownAxisType {
                    axis,
                    ctype: wcs.ctype(axis).unwrap_or("").to_string(),
                })
            }
        }
    }
    Ok(map)
}
