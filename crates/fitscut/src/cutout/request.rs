//! Cutout request types and the region grammar.
//!
//! Pixel requests use the cfitsio bracket syntax, e.g. `[1][20:40,*]` or
//! `[SCI,2][-*,10:90:2]`. World requests are shape keywords followed by
//! values, e.g. `CIRCLE 150.1 2.2 0.05 BAND 4e-7 5e-7 POL I V`.

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

use super::range::{AxisSelection, PixelRange};

// ── Extension selectors ──

/// Identifies one HDU of a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtensionSelector {
    /// 0-based position among all HDUs.
    ByIndex(usize),
    /// `EXTNAME`.
    ByName(String),
    /// `EXTNAME` and 1-based `EXTVER`.
    ByNameVersion(String, i64),
}

impl ExtensionSelector {
    /// Does the HDU at `index` with identity (`extname`, `extver`) match, in
    /// a file of `hdu_count` HDUs?
    ///
    /// An index selects by position. Its digits are compared with `EXTNAME`
    /// only when no HDU sits at that position. `extver` is 0 when the header
    /// has none; that compares equal to version 1. Names compare
    /// case-insensitively after trimming.
    pub fn matches(&self, index: usize, extname: Option<&str>, extver: i64, hdu_count: usize) -> bool {
        let same_name = |name: &str| extname.is_some_and(|n| n.trim().eq_ignore_ascii_case(name.trim()));
        match self {
            ExtensionSelector::ByIndex(n) if *n < hdu_count => *n == index,
            ExtensionSelector::ByIndex(n) => same_name(&n.to_string()),
            ExtensionSelector::ByName(name) => same_name(name),
            ExtensionSelector::ByNameVersion(name, version) => {
                let effective = if extver == 0 { 1 } else { extver };
                same_name(name) && effective == *version
            }
        }
    }
}

impl fmt::Display for ExtensionSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtensionSelector::ByIndex(n) => write!(f, "[{n}]"),
            ExtensionSelector::ByName(name) => write!(f, "[{name}]"),
            ExtensionSelector::ByNameVersion(name, v) => write!(f, "[{name},{v}]"),
        }
    }
}

/// One `(extension, axes)` entry of a pixel cutout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelEntry {
    pub extension: ExtensionSelector,
    /// Per-axis selections; axes not listed take the whole axis.
    pub axes: Vec<AxisSelection>,
}

/// Explicit pixel ranges per extension.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PixelCutout {
    pub entries: Vec<PixelEntry>,
}

// ── World shapes ──

/// The kind of axis a shape constrains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AxisRole {
    Position,
    Spectral,
    Temporal,
    Polarization,
}

impl AxisRole {
    pub fn name(self) -> &'static str {
        match self {
            AxisRole::Position => "position",
            AxisRole::Spectral => "spectral",
            AxisRole::Temporal => "temporal",
            AxisRole::Polarization => "polarization",
        }
    }
}

/// Polarization states with their FITS `STOKES` axis codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolarizationState {
    I,
    Q,
    U,
    V,
    Poli,
    Fpoli,
    Pola,
    Epoli,
    Cpoli,
    Npoli,
    Rr,
    Ll,
    Rl,
    Lr,
    Xx,
    Yy,
    Xy,
    Yx,
}

static POLARIZATION_STATES: [(&str, PolarizationState, i64); 18] = [
    ("I", PolarizationState::I, 1),
    ("Q", PolarizationState::Q, 2),
    ("U", PolarizationState::U, 3),
    ("V", PolarizationState::V, 4),
    ("POLI", PolarizationState::Poli, 5),
    ("FPOLI", PolarizationState::Fpoli, 6),
    ("POLA", PolarizationState::Pola, 7),
    ("EPOLI", PolarizationState::Epoli, 8),
    ("CPOLI", PolarizationState::Cpoli, 9),
    ("NPOLI", PolarizationState::Npoli, 10),
    ("RR", PolarizationState::Rr, -1),
    ("LL", PolarizationState::Ll, -2),
    ("RL", PolarizationState::Rl, -3),
    ("LR", PolarizationState::Lr, -4),
    ("XX", PolarizationState::Xx, -5),
    ("YY", PolarizationState::Yy, -6),
    ("XY", PolarizationState::Xy, -7),
    ("YX", PolarizationState::Yx, -8),
];

impl PolarizationState {
    /// Look up a state by name, case-insensitively.
    pub fn from_name(name: &str) -> Option<Self> {
        POLARIZATION_STATES
            .iter()
            .find(|(n, _, _)| n.eq_ignore_ascii_case(name))
            .map(|&(_, state, _)| state)
    }

    /// FITS `STOKES` code.
    pub fn code(self) -> i64 {
        POLARIZATION_STATES
            .iter()
            .find(|(_, s, _)| *s == self)
            .map(|&(_, _, code)| code)
            .unwrap_or(0)
    }

    pub fn name(self) -> &'static str {
        POLARIZATION_STATES
            .iter()
            .find(|(_, s, _)| *s == self)
            .map(|&(n, _, _)| n)
            .unwrap_or("")
    }

    /// State carried by a `STOKES` code.
    pub fn from_code(code: i64) -> Option<Self> {
        POLARIZATION_STATES
            .iter()
            .find(|(_, _, c)| *c == code)
            .map(|&(_, state, _)| state)
    }
}

/// A world-coordinate constraint on one kind of axis.
#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    /// Sky circle; all values in degrees.
    Circle { ra: f64, dec: f64, radius: f64 },
    /// Sky polygon; vertices in degrees.
    Polygon { vertices: Vec<(f64, f64)> },
    /// Spectral band as vacuum wavelengths in metres.
    Energy { lower: f64, upper: f64 },
    /// Time interval (MJD); never cut.
    Time { lower: f64, upper: f64 },
    Polarization { states: Vec<PolarizationState> },
}

impl Shape {
    pub fn role(&self) -> AxisRole {
        match self {
            Shape::Circle { .. } | Shape::Polygon { .. } => AxisRole::Position,
            Shape::Energy { .. } => AxisRole::Spectral,
            Shape::Time { .. } => AxisRole::Temporal,
            Shape::Polarization { .. } => AxisRole::Polarization,
        }
    }
}

/// Shapes to cut, at most one per [`AxisRole`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorldCutout {
    shapes: Vec<Shape>,
}

impl WorldCutout {
    pub fn new() -> Self {
        WorldCutout::default()
    }

    /// Add a shape, rejecting a second shape for the same role.
    pub fn push(&mut self, shape: Shape) -> Result<()> {
        let role = shape.role();
        if self.shapes.iter().any(|s| s.role() == role) {
            return Err(Error::DuplicateAxisRole(role.name()));
        }
        self.shapes.push(shape);
        Ok(())
    }

    pub fn shapes(&self) -> &[Shape] {
        &self.shapes
    }
}

/// A parsed cutout request.
#[derive(Debug, Clone, PartialEq)]
pub enum CutoutSpecification {
    Pixel(PixelCutout),
    World(WorldCutout),
}

impl CutoutSpecification {
    /// Parse one request string.
    pub fn parse(spec: &str) -> Result<Self> {
        let trimmed = spec.trim();
        if trimmed.is_empty() {
            return Err(invalid("empty cutout specification"));
        }
        if trimmed.starts_with('[') {
            parse_pixel(trimmed).map(CutoutSpecification::Pixel)
        } else {
            parse_world(trimmed).map(CutoutSpecification::World)
        }
    }

    /// Parse several request strings into one request. Pixel entries
    /// concatenate and world shapes merge; the two kinds cannot be mixed.
    pub fn parse_all<S: AsRef<str>>(specs: &[S]) -> Result<Self> {
        let mut merged: Option<CutoutSpecification> = None;
        for spec in specs {
            let next = CutoutSpecification::parse(spec.as_ref())?;
            merged = Some(match (merged, next) {
                (None, next) => next,
                (Some(CutoutSpecification::Pixel(mut acc)), CutoutSpecification::Pixel(p)) => {
                    acc.entries.extend(p.entries);
                    CutoutSpecification::Pixel(acc)
                }
                (Some(CutoutSpecification::World(mut acc)), CutoutSpecification::World(w)) => {
                    for shape in w.shapes {
                        acc.push(shape)?;
                    }
                    CutoutSpecification::World(acc)
                }
                _ => return Err(invalid("pixel and world cutouts cannot be mixed")),
            });
        }
        merged.ok_or_else(|| invalid("no cutout specification given"))
    }
}

impl FromStr for CutoutSpecification {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        CutoutSpecification::parse(s)
    }
}

fn invalid(msg: impl Into<String>) -> Error {
    Error::InvalidSpecification(msg.into())
}

// ── Pixel grammar ──

fn parse_pixel(spec: &str) -> Result<PixelCutout> {
    let mut cutout = PixelCutout::default();
    let mut current: Option<(ExtensionSelector, Option<Vec<AxisSelection>>)> = None;
    let mut rest = spec;

    loop {
        rest = rest.trim_start();
        if rest.is_empty() {
            break;
        }
        let Some(body) = rest.strip_prefix('[') else {
            return Err(invalid(format!("unexpected text '{rest}'")));
        };
        let close = body
            .find(']')
            .ok_or_else(|| invalid(format!("unbalanced brackets in '{spec}'")))?;
        let block = &body[..close];
        if block.contains('[') {
            return Err(invalid(format!("unbalanced brackets in '{spec}'")));
        }
        rest = &body[close + 1..];

        if block.contains(':') || block.contains('*') {
            let axes = parse_axes(block)?;
            let (_, ranges) = current.get_or_insert_with(|| (ExtensionSelector::ByIndex(0), None));
            if ranges.is_some() {
                return Err(invalid(format!("more than one range block in '{spec}'")));
            }
            *ranges = Some(axes);
        } else {
            let selector = parse_extension(block)?;
            if let Some((extension, axes)) = current.replace((selector, None)) {
                cutout.entries.push(PixelEntry {
                    extension,
                    axes: axes.unwrap_or_default(),
                });
            }
        }
    }

    if let Some((extension, axes)) = current {
        cutout.entries.push(PixelEntry {
            extension,
            axes: axes.unwrap_or_default(),
        });
    }
    Ok(cutout)
}

fn parse_extension(block: &str) -> Result<ExtensionSelector> {
    let block = block.trim();
    if block.is_empty() {
        return Err(invalid("empty extension block"));
    }
    if let Ok(index) = block.parse::<usize>() {
        return Ok(ExtensionSelector::ByIndex(index));
    }
    match block.split_once(',') {
        Some((name, version)) => {
            let name = name.trim();
            let version: i64 = version
                .trim()
                .parse()
                .map_err(|_| invalid(format!("bad extension version in '[{block}]'")))?;
            if name.is_empty() || version < 0 {
                return Err(invalid(format!("bad extension block '[{block}]'")));
            }
            Ok(ExtensionSelector::ByNameVersion(name.to_string(), version.max(1)))
        }
        None => Ok(ExtensionSelector::ByName(block.to_string())),
    }
}

fn parse_step(text: &str) -> Result<i64> {
    match text.trim().parse::<i64>() {
        Ok(step) if step >= 1 => Ok(step),
        _ => Err(invalid(format!("step '{text}' must be a positive integer"))),
    }
}

fn parse_bound(text: &str) -> Result<i64> {
    let value: f64 = text
        .trim()
        .parse()
        .map_err(|_| invalid(format!("pixel bound '{text}' is not a number")))?;
    if !value.is_finite() {
        return Err(invalid(format!("pixel bound '{text}' is not finite")));
    }
    Ok(value.round() as i64)
}

fn parse_axes(block: &str) -> Result<Vec<AxisSelection>> {
    block.split(',').map(parse_axis).collect()
}

fn parse_axis(entry: &str) -> Result<AxisSelection> {
    let entry = entry.trim();
    let parts: Vec<&str> = entry.split(':').collect();
    let all = |reversed: bool, step: i64| Ok(AxisSelection::All { reversed, step });
    match parts.as_slice() {
        ["*"] => all(false, 1),
        ["-*"] => all(true, 1),
        ["*", step] => all(false, parse_step(step)?),
        ["-*", step] => all(true, parse_step(step)?),
        [lo, hi] => Ok(AxisSelection::Range(PixelRange::new(
            parse_bound(lo)?,
            parse_bound(hi)?,
        ))),
        [lo, hi, step] => Ok(AxisSelection::Range(PixelRange::with_step(
            parse_bound(lo)?,
            parse_bound(hi)?,
            parse_step(step)?,
        ))),
        _ => Err(invalid(format!("bad axis range '{entry}'"))),
    }
}

// ── World grammar ──

const SHAPE_NAMES: [&str; 5] = ["CIRCLE", "POLYGON", "BAND", "TIME", "POL"];

fn parse_world(spec: &str) -> Result<WorldCutout> {
    let tokens = spec
        .split(|c: char| c.is_whitespace() || c == '&')
        .filter(|t| !t.is_empty());

    let mut groups: Vec<(String, Vec<&str>)> = Vec::new();
    for token in tokens {
        let upper = token.to_ascii_uppercase();
        if SHAPE_NAMES.contains(&upper.as_str()) {
            groups.push((upper, Vec::new()));
        } else if let Some((_, values)) = groups.last_mut() {
            values.push(token);
        } else {
            return Err(invalid(format!("'{token}' does not follow a shape name")));
        }
    }
    if groups.is_empty() {
        return Err(invalid("no shapes in world cutout"));
    }

    let mut cutout = WorldCutout::new();
    for (name, values) in groups {
        cutout.push(parse_shape(&name, &values)?)?;
    }
    Ok(cutout)
}

fn numbers(name: &str, values: &[&str]) -> Result<Vec<f64>> {
    values
        .iter()
        .map(|v| {
            v.parse::<f64>()
                .ok()
                .filter(|x| x.is_finite())
                .ok_or_else(|| invalid(format!("{name} value '{v}' is not a number")))
        })
        .collect()
}

fn parse_shape(name: &str, values: &[&str]) -> Result<Shape> {
    match name {
        "CIRCLE" => match numbers(name, values)?.as_slice() {
            &[ra, dec, radius] => Ok(Shape::Circle { ra, dec, radius }),
            other => Err(invalid(format!(
                "CIRCLE needs 3 values (ra dec radius), got {}",
                other.len()
            ))),
        },
        "POLYGON" => {
            let nums = numbers(name, values)?;
            if nums.len() < 6 || nums.len() % 2 != 0 {
                return Err(invalid(format!(
                    "POLYGON needs an even count of at least 6 values, got {}",
                    nums.len()
                )));
            }
            Ok(Shape::Polygon {
                vertices: nums.chunks_exact(2).map(|p| (p[0], p[1])).collect(),
            })
        }
        "BAND" | "TIME" => match numbers(name, values)?.as_slice() {
            &[lower, upper] if name == "BAND" => Ok(Shape::Energy { lower, upper }),
            &[lower, upper] => Ok(Shape::Time { lower, upper }),
            other => Err(invalid(format!("{name} needs 2 values, got {}", other.len()))),
        },
        _ => {
            if values.is_empty() {
                return Err(invalid("POL needs at least one state"));
            }
            let states = values
                .iter()
                .map(|v| {
                    PolarizationState::from_name(v)
                        .ok_or_else(|| invalid(format!("unknown polarization state '{v}'")))
                })
                .collect::<Result<Vec<_>>>()?;
            Ok(Shape::Polarization { states })
        }
    }
}
