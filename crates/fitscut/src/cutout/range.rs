//! 1-based inclusive pixel ranges and per-axis selections.

/// A 1-based, inclusive pixel interval along one axis.
///
/// `lower > upper` selects the axis in descending order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRange {
    pub lower: i64,
    pub upper: i64,
    /// Stride between selected pixels, at least 1.
    pub step: i64,
}

impl PixelRange {
    pub fn new(lower: i64, upper: i64) -> Self {
        PixelRange::with_step(lower, upper, 1)
    }

    pub fn with_step(lower: i64, upper: i64, step: i64) -> Self {
        PixelRange {
            lower,
            upper,
            step: step.max(1),
        }
    }

    /// Build from fractional bounds, rounding each to the nearest pixel.
    pub fn from_f64(lower: f64, upper: f64) -> Self {
        PixelRange::new(lower.round() as i64, upper.round() as i64)
    }

    pub fn is_reversed(&self) -> bool {
        self.lower > self.upper
    }

    /// Number of pixels spanned, ignoring the step.
    pub fn get_shape(&self) -> i64 {
        (self.upper - self.lower).abs() + 1
    }

    /// 0-based index of the centre pixel.
    pub fn get_position(&self) -> i64 {
        self.lower.min(self.upper) - 1 + self.get_shape() / 2
    }

    /// Inverse of [`get_position`](Self::get_position) for an ascending range.
    pub fn from_position(position: i64, shape: i64) -> Self {
        let lower = position - shape / 2 + 1;
        PixelRange::new(lower, lower + shape - 1)
    }
}

/// The request for one axis of a pixel cutout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AxisSelection {
    /// `*`, `-*` or `*:step`: the whole axis.
    All { reversed: bool, step: i64 },
    /// An explicit range.
    Range(PixelRange),
}

impl AxisSelection {
    /// The whole axis, ascending, unit step.
    pub const FULL: AxisSelection = AxisSelection::All {
        reversed: false,
        step: 1,
    };

    /// Concrete range against an axis of length `len`.
    pub fn resolve(&self, len: usize) -> PixelRange {
        let len = len as i64;
        match *self {
            AxisSelection::All {
                reversed: false,
                step,
            } => PixelRange::with_step(1, len, step),
            AxisSelection::All {
                reversed: true,
                step,
            } => PixelRange::with_step(len, 1, step),
            AxisSelection::Range(range) => range,
        }
    }
}
