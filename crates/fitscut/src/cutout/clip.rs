//! Clamping candidate intervals to an axis and rejecting misses.
//!
//! Each role has its own rule. Spatial bounds are
//! only clamped (misses are caught earlier, on the bounding box). Spectral
//! bounds reject a range that starts on the last pixel or ends on the
//! first; polarization bounds reject only ranges wholly off the axis.

use super::range::PixelRange;
use super::request::AxisRole;

/// Clamp `[lower, upper]` to an axis of length `len`, or `None` when the
/// role's rule rejects it.
pub fn clip(role: AxisRole, lower: f64, upper: f64, len: usize) -> Option<PixelRange> {
    match role {
        AxisRole::Position => Some(clip_spatial(lower, upper, len)),
        AxisRole::Spectral => clip_spectral(lower, upper, len),
        AxisRole::Polarization => clip_polarization(lower, upper, len),
        AxisRole::Temporal => None,
    }
}

pub fn clip_spatial(lower: f64, upper: f64, len: usize) -> PixelRange {
    PixelRange::from_f64(lower.max(1.0), upper.min(len as f64))
}

pub fn clip_spectral(lower: f64, upper: f64, len: usize) -> Option<PixelRange> {
    let n = len as i64;
    let z1 = (lower.floor() as i64).max(1);
    let z2 = (upper.ceil() as i64).min(n);
    if z1 >= n || z2 <= 1 {
        return None;
    }
    Some(PixelRange::new(z1, z2))
}

pub fn clip_polarization(lower: f64, upper: f64, len: usize) -> Option<PixelRange> {
    let n = len as i64;
    let p1 = (lower.floor() as i64).max(1);
    let p2 = (upper.ceil() as i64).min(n);
    if p1 > n || p2 < 1 {
        return None;
    }
    Some(PixelRange::new(p1, p2))
}
