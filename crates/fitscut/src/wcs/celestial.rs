//! Celestial projections and sky region sampling.
//!
//! Projections come from `mapproj`; this module reads their FITS parameters
//! (`PVi_m`, `LONPOLE`) and binds them to an image's linear transform. All
//! angles are in degrees at the public boundary.

use mapproj::{
    conic::{cod::Cod, coe::Coe, coo::Coo, cop::Cop},
    cylindrical::{car::Car, cea::Cea, cyp::Cyp, mer::Mer},
    img2celestial::Img2Celestial,
    img2proj::WcsImgXY2ProjXY,
    pseudocyl::{ait::Ait, mol::Mol, par::Par, sfl::Sfl},
    zenithal::{
        air::Air, arc::Arc, azp::Azp, ncp::Ncp, sin::Sin, stg::Stg, szp::Szp, tan::Tan, zea::Zea,
        zpn::Zpn,
    },
    CanonicalProjection, CenteredProjection, LonLat,
};

use crate::error::{Error, Result};

/// `PVi_0` to `PVi_20` of one axis.
pub type ProjParams = [Option<f64>; 21];

/// Everything needed to place one celestial projection on an image.
#[derive(Debug, Clone, PartialEq)]
pub struct CelestialParams {
    /// Three-letter projection code from CTYPE columns 6-8.
    pub code: String,
    pub crpix: [f64; 2],
    /// Pixel offset to intermediate world coordinates in degrees. Row 0 is
    /// the longitude axis.
    pub cd: [[f64; 2]; 2],
    /// Reference point (longitude, latitude).
    pub crval: (f64, f64),
    pub lonpole: Option<f64>,
    /// Parameters attached to the longitude axis.
    pub pv_lon: ProjParams,
    /// Parameters attached to the latitude axis.
    pub pv_lat: ProjParams,
}

/// A `mapproj` projection that can be configured from FITS parameters.
trait FitsProjection: CanonicalProjection + Sized {
    fn from_pv(pv: &ProjParams) -> Result<Self>;

    /// Native latitude of the fiducial point in degrees.
    fn fiducial_latitude(_pv: &ProjParams) -> Result<f64> {
        Ok(0.0)
    }
}

fn param(pv: &ProjParams, m: usize, default: f64) -> f64 {
    pv[m].unwrap_or(default)
}

macro_rules! plain_projection {
    ($theta_0:expr; $($proj:ident => $make:expr),* $(,)?) => {
        $(
            impl FitsProjection for $proj {
                fn from_pv(_: &ProjParams) -> Result<Self> {
                    Ok($make)
                }

                fn fiducial_latitude(_: &ProjParams) -> Result<f64> {
                    Ok($theta_0)
                }
            }
        )*
    };
}

plain_projection!(90.0; Tan => Tan::new(), Stg => Stg::new(), Arc => Arc::new(), Zea => Zea::new(), Ncp => Ncp::new());
plain_projection!(0.0; Car => Car::default(), Mer => Mer::default(), Sfl => Sfl::default(),
    Par => Par::default(), Mol => Mol::default(), Ait => Ait::default());

impl FitsProjection for Sin {
    fn from_pv(pv: &ProjParams) -> Result<Self> {
        if param(pv, 1, 0.0) != 0.0 || param(pv, 2, 0.0) != 0.0 {
            return Err(Error::UnsupportedProjection("SIN with slant parameters".into()));
        }
        Ok(Sin::new())
    }

    fn fiducial_latitude(_: &ProjParams) -> Result<f64> {
        Ok(90.0)
    }
}

impl FitsProjection for Azp {
    fn from_pv(pv: &ProjParams) -> Result<Self> {
        Ok(Azp::from_params(param(pv, 1, 0.0), param(pv, 2, 0.0).to_radians()))
    }

    fn fiducial_latitude(_: &ProjParams) -> Result<f64> {
        Ok(90.0)
    }
}

impl FitsProjection for Szp {
    fn from_pv(pv: &ProjParams) -> Result<Self> {
        Ok(Szp::from_params(
            param(pv, 1, 0.0),
            param(pv, 2, 0.0).to_radians(),
            param(pv, 3, 90.0).to_radians(),
        ))
    }

    fn fiducial_latitude(_: &ProjParams) -> Result<f64> {
        Ok(90.0)
    }
}

impl FitsProjection for Air {
    fn from_pv(pv: &ProjParams) -> Result<Self> {
        Ok(Air::from_param(param(pv, 1, 90.0).to_radians()))
    }

    fn fiducial_latitude(_: &ProjParams) -> Result<f64> {
        Ok(90.0)
    }
}

impl FitsProjection for Zpn {
    fn from_pv(pv: &ProjParams) -> Result<Self> {
        let last = pv.iter().rposition(Option::is_some).map_or(0, |i| i + 1);
        let coeffs = pv[..last].iter().map(|p| p.unwrap_or(0.0)).collect::<Vec<_>>();
        Zpn::from_params(coeffs)
            .ok_or_else(|| Error::UnsupportedProjection("ZPN polynomial is negative in [0, pi]".into()))
    }

    fn fiducial_latitude(_: &ProjParams) -> Result<f64> {
        Ok(90.0)
    }
}

impl FitsProjection for Cyp {
    fn from_pv(pv: &ProjParams) -> Result<Self> {
        Ok(Cyp::from_params(param(pv, 1, 1.0), param(pv, 2, 1.0)))
    }
}

impl FitsProjection for Cea {
    fn from_pv(pv: &ProjParams) -> Result<Self> {
        Ok(Cea::from_param(param(pv, 1, 1.0)))
    }
}

/// `PVi_1` (θ_a) is mandatory for conics.
fn conic_standard_latitude(code: &str, pv: &ProjParams) -> Result<f64> {
    pv[1].ok_or_else(|| Error::MissingKeyword(format!("PVi_1 (standard latitude) for {code}")))
}

macro_rules! conic_projection {
    ($($proj:ident => $code:literal),* $(,)?) => {
        $(
            impl FitsProjection for $proj {
                fn from_pv(pv: &ProjParams) -> Result<Self> {
                    let theta_a = conic_standard_latitude($code, pv)?;
                    Ok($proj::from_params(theta_a.to_radians(), param(pv, 2, 0.0).to_radians()))
                }

                fn fiducial_latitude(pv: &ProjParams) -> Result<f64> {
                    conic_standard_latitude($code, pv)
                }
            }
        )*
    };
}

conic_projection!(Cop => "COP", Cod => "COD", Coe => "COE", Coo => "COO");

/// Rotation of the projection around the reference point, in radians.
///
/// `LONPOLE` defaults as in FITS WCS Paper II. Zenithal projections take any
/// `LONPOLE`; other families only support the default orientation.
fn positional_angle(code: &str, theta_0: f64, crval_lat: f64, lonpole: Option<f64>) -> Result<f64> {
    let default = if crval_lat >= theta_0 { 0.0 } else { 180.0 };
    if theta_0 >= 90.0 {
        let lonpole = lonpole.unwrap_or(if crval_lat >= 90.0 { 0.0 } else { 180.0 });
        return Ok((lonpole - 180.0).to_radians());
    }
    match lonpole {
        None => Ok(0.0),
        Some(phi_p) if phi_p == default => Ok(0.0),
        Some(phi_p) => Err(Error::UnsupportedProjection(format!("{code} with LONPOLE = {phi_p}"))),
    }
}

fn bind<P: FitsProjection>(params: &CelestialParams) -> Result<Img2Celestial<P, WcsImgXY2ProjXY>> {
    let projection = P::from_pv(&params.pv_lat)?;
    let theta_0 = P::fiducial_latitude(&params.pv_lat)?;
    if params.pv_lon[1].is_some_and(|phi_0| phi_0 != 0.0)
        || params.pv_lon[2].is_some_and(|t| t != theta_0)
    {
        return Err(Error::UnsupportedProjection(format!(
            "{} with a user-defined fiducial point",
            params.code
        )));
    }
    let angle = positional_angle(&params.code, theta_0, params.crval.1, params.lonpole)?;

    let mut centered = CenteredProjection::new(projection);
    let reference = LonLat::new(params.crval.0.to_radians(), params.crval.1.to_radians());
    centered.set_proj_center_from_lonlat_and_positional_angle(&reference, angle);

    let [[cd11, cd12], [cd21, cd22]] = params.cd;
    let img2proj = WcsImgXY2ProjXY::from_cd(params.crpix[0], params.crpix[1], cd11, cd12, cd21, cd22);
    Ok(Img2Celestial::new(img2proj, centered))
}

macro_rules! sky_projections {
    ($($code:literal => $proj:ident),* $(,)?) => {
        /// A celestial projection bound to an image.
        pub enum SkyProjection {
            $($proj(Img2Celestial<$proj, WcsImgXY2ProjXY>),)*
        }

        impl SkyProjection {
            /// Build the projection named by `params.code`.
            pub fn new(params: &CelestialParams) -> Result<Self> {
                match params.code.trim() {
                    $($code => Ok(SkyProjection::$proj(bind::<$proj>(params)?)),)*
                    other => Err(Error::UnsupportedProjection(other.to_string())),
                }
            }

            /// 1-based pixel position of (`lon`, `lat`), or `None` outside
            /// the projection's domain.
            pub fn pixel(&self, lon: f64, lat: f64) -> Option<(f64, f64)> {
                let lonlat = LonLat::new(lon.to_radians(), lat.to_radians());
                let xy = match self {
                    $(SkyProjection::$proj(p) => p.lonlat2img(&lonlat),)*
                }?;
                (xy.x().is_finite() && xy.y().is_finite()).then(|| (xy.x(), xy.y()))
            }
        }
    };
}

sky_projections! {
    "AZP" => Azp,
    "SZP" => Szp,
    "TAN" => Tan,
    "STG" => Stg,
    "SIN" => Sin,
    "ARC" => Arc,
    "ZPN" => Zpn,
    "ZEA" => Zea,
    "AIR" => Air,
    "NCP" => Ncp,
    "CYP" => Cyp,
    "CEA" => Cea,
    "CAR" => Car,
    "MER" => Mer,
    "SFL" => Sfl,
    "PAR" => Par,
    "MOL" => Mol,
    "AIT" => Ait,
    "COP" => Cop,
    "COD" => Cod,
    "COE" => Coe,
    "COO" => Coo,
}

/// Great-circle distance in degrees.
pub fn angular_distance(a: (f64, f64), b: (f64, f64)) -> f64 {
    let a = LonLat::new(a.0.to_radians(), a.1.to_radians());
    let b = LonLat::new(b.0.to_radians(), b.1.to_radians());
    a.haversine_dist(&b).to_degrees()
}

/// Even-odd test of `point` against a polygon, with longitudes unwrapped
/// around the point. Polygons enclosing a pole are not handled.
pub fn polygon_contains(vertices: &[(f64, f64)], point: (f64, f64)) -> bool {
    let unwrap = |lon: f64| point.0 + (lon - point.0 + 180.0).rem_euclid(360.0) - 180.0;
    let mut inside = false;
    for (i, &(lon_a, lat_a)) in vertices.iter().enumerate() {
        let (lon_b, lat_b) = vertices[(i + 1) % vertices.len()];
        let (xa, xb) = (unwrap(lon_a), unwrap(lon_b));
        if (lat_a > point.1) != (lat_b > point.1) {
            let x = xa + (point.1 - lat_a) / (lat_b - lat_a) * (xb - xa);
            if point.0 < x {
                inside = !inside;
            }
        }
    }
    inside
}

fn radec_to_xyz(ra: f64, dec: f64) -> [f64; 3] {
    let (a, d) = (ra.to_radians(), dec.to_radians());
    [d.cos() * a.cos(), d.cos() * a.sin(), d.sin()]
}

fn xyz_to_radec(v: [f64; 3]) -> (f64, f64) {
    let ra = v[1].atan2(v[0]).to_degrees().rem_euclid(360.0);
    let dec = v[2].clamp(-1.0, 1.0).asin().to_degrees();
    (ra, dec)
}

/// Points on a small circle of `radius` degrees around (`ra`, `dec`),
/// starting due north and walking east.
pub fn circle_boundary(ra: f64, dec: f64, radius: f64, samples: usize) -> Vec<(f64, f64)> {
    let (a0, d0) = (ra.to_radians(), dec.to_radians());
    let r = radius.to_radians();
    (0..samples.max(3))
        .map(|k| {
            let bearing = std::f64::consts::TAU * k as f64 / samples.max(3) as f64;
            let d = (d0.sin() * r.cos() + d0.cos() * r.sin() * bearing.cos())
                .clamp(-1.0, 1.0)
                .asin();
            let a = a0 + (bearing.sin() * r.sin() * d0.cos()).atan2(r.cos() - d0.sin() * d.sin());
            (a.to_degrees().rem_euclid(360.0), d.to_degrees())
        })
        .collect()
}

/// Vertices of a spherical polygon with `per_edge - 1` extra points inserted
/// along each great-circle edge.
pub fn densify_polygon(vertices: &[(f64, f64)], per_edge: usize) -> Vec<(f64, f64)> {
    let per_edge = per_edge.max(1);
    let mut out = Vec::with_capacity(vertices.len() * per_edge);
    for (i, &(ra, dec)) in vertices.iter().enumerate() {
        let (next_ra, next_dec) = vertices[(i + 1) % vertices.len()];
        let a = radec_to_xyz(ra, dec);
        let b = radec_to_xyz(next_ra, next_dec);
        out.push((ra, dec));
        for k in 1..per_edge {
            let t = k as f64 / per_edge as f64;
            let v = [
                a[0] + t * (b[0] - a[0]),
                a[1] + t * (b[1] - a[1]),
                a[2] + t * (b[2] - a[2]),
            ];
            let norm = (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt();
            if norm > f64::EPSILON {
                out.push(xyz_to_radec([v[0] / norm, v[1] / norm, v[2] / norm]));
            }
        }
    }
    out
}
