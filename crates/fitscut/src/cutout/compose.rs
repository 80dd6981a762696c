//! Combining per-shape results into one range per axis.

use log::debug;

use crate::error::{Error, Result};

use super::clip::clip;
use super::range::{AxisSelection, PixelRange};
use super::request::AxisRole;
use super::translate::{axis_len, Translation};

/// Full-rank ranges for one HDU, or why nothing was selected.
#[derive(Debug, Clone, PartialEq)]
pub enum Composition {
    Ranges(Vec<PixelRange>),
    NoOverlap(String),
}

/// Resolve pixel-cutout axis selections against the image shape; unlisted
/// axes take their whole length.
pub fn compose_pixel(naxes: &[usize], axes: &[AxisSelection]) -> Result<Vec<PixelRange>> {
    if axes.len() > naxes.len() {
        return Err(Error::InvalidSpecification(format!(
            "{} axis ranges given for a {}-axis image",
            axes.len(),
            naxes.len()
        )));
    }
    Ok(naxes
        .iter()
        .enumerate()
        .map(|(i, &len)| axes.get(i).unwrap_or(&AxisSelection::FULL).resolve(len))
        .collect())
}

/// Merge translated shapes.
///
/// Each shape constrains only its own axes. A shape rejected by translation
/// or clipping leaves its axes at full range; the HDU is a miss only when
/// every shape was rejected.
pub fn compose_world(naxes: &[usize], outcomes: Vec<(AxisRole, Translation)>) -> Composition {
    let mut ranges: Vec<PixelRange> = naxes
        .iter()
        .map(|&len| AxisSelection::FULL.resolve(len))
        .collect();
    let mut misses = Vec::new();
    let mut hits = 0usize;

    'shapes: for (role, outcome) in outcomes {
        let intervals = match outcome {
            Translation::NoOverlap(reason) => {
                misses.push(format!("{}: {reason}", role.name()));
                continue;
            }
            Translation::Intervals(intervals) => intervals,
        };

        let mut clipped = Vec::with_capacity(intervals.len());
        for iv in intervals {
            let len = axis_len(naxes, iv.axis);
            match clip(role, iv.lower, iv.upper, len) {
                Some(range) => clipped.push((iv.axis, range)),
                None => {
                    misses.push(format!(
                        "{}: pixels {}..{} fall outside axis {} of length {len}",
                        role.name(),
                        iv.lower,
                        iv.upper,
                        iv.axis
                    ));
                    continue 'shapes;
                }
            }
        }
        for (axis, range) in clipped {
            if let Some(slot) = ranges.get_mut(axis - 1) {
                *slot = range;
            }
        }
        hits += 1;
    }

    if hits == 0 {
        return Composition::NoOverlap(if misses.is_empty() {
            "no shapes to cut".into()
        } else {
            misses.join("; ")
        });
    }
    if !misses.is_empty() {
        debug!("partial overlap, ignoring: {}", misses.join("; "));
    }
    Composition::Ranges(ranges)
}
