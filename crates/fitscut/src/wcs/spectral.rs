//! Spectral axis types and conversion from vacuum wavelength (FITS WCS
//! Paper III).

use crate::error::{Error, Result};

/// Speed of light in vacuum, m/s.
pub const SPEED_OF_LIGHT: f64 = 299_792_458.0;

/// Planck constant, J s.
pub const PLANCK: f64 = 6.626_070_15e-34;

const ELECTRON_VOLT: f64 = 1.602_176_634e-19;

/// Spectral coordinate type from the first four CTYPE characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpectralType {
    Freq,
    Ener,
    Wavn,
    Vrad,
    Wave,
    Vopt,
    Zopt,
    Awav,
    Velo,
    Beta,
}

impl SpectralType {
    pub fn from_code(code: &str) -> Option<Self> {
        Some(match code {
            "FREQ" => SpectralType::Freq,
            "ENER" => SpectralType::Ener,
            "WAVN" => SpectralType::Wavn,
            "VRAD" => SpectralType::Vrad,
            "WAVE" => SpectralType::Wave,
            "VOPT" => SpectralType::Vopt,
            "ZOPT" => SpectralType::Zopt,
            "AWAV" => SpectralType::Awav,
            "VELO" => SpectralType::Velo,
            "BETA" => SpectralType::Beta,
            _ => return None,
        })
    }

    /// Multiplier taking a value in `cunit` to SI. A blank unit means SI.
    pub fn unit_scale(self, cunit: &str) -> Result<f64> {
        let unit = cunit.trim();
        let scale = match self {
            SpectralType::Freq => match unit {
                "" | "Hz" => Some(1.0),
                "kHz" => Some(1e3),
                "MHz" => Some(1e6),
                "GHz" => Some(1e9),
                _ => None,
            },
            SpectralType::Ener => match unit {
                "" | "J" => Some(1.0),
                "erg" => Some(1e-7),
                "eV" => Some(ELECTRON_VOLT),
                "keV" => Some(1e3 * ELECTRON_VOLT),
                "MeV" => Some(1e6 * ELECTRON_VOLT),
                _ => None,
            },
            SpectralType::Wavn => match unit {
                "" | "/m" | "1/m" | "m-1" | "m**-1" => Some(1.0),
                "/cm" | "1/cm" | "cm-1" | "cm**-1" => Some(100.0),
                _ => None,
            },
            SpectralType::Wave | SpectralType::Awav => match unit {
                "" | "m" => Some(1.0),
                "cm" => Some(1e-2),
                "mm" => Some(1e-3),
                "um" => Some(1e-6),
                "nm" => Some(1e-9),
                "Angstrom" | "angstrom" => Some(1e-10),
                _ => None,
            },
            SpectralType::Vrad | SpectralType::Vopt | SpectralType::Velo => match unit {
                "" | "m/s" | "m s-1" => Some(1.0),
                "km/s" | "km s-1" => Some(1e3),
                _ => None,
            },
            SpectralType::Zopt | SpectralType::Beta => unit.is_empty().then_some(1.0),
        };
        scale.ok_or_else(|| {
            Error::SpectralConversion(format!("unit '{unit}' is not supported for {self:?}"))
        })
    }
}

/// Spectral algorithm from CTYPE columns 6-8.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Algorithm {
    Linear,
    Log,
}

/// Split a spectral CTYPE such as `WAVE-LOG` into type and algorithm.
pub fn parse_ctype(ctype: &str) -> Result<(SpectralType, Algorithm)> {
    let ctype = ctype.trim();
    let code = ctype.get(..4).unwrap_or(ctype).trim_end_matches('-');
    let ty = SpectralType::from_code(code)
        .ok_or_else(|| Error::SpectralConversion(format!("'{ctype}' is not a spectral axis")))?;
    let algorithm = match ctype.get(5..).map(str::trim) {
        None | Some("") => Algorithm::Linear,
        Some("LOG") => Algorithm::Log,
        Some(other) => {
            return Err(Error::SpectralConversion(format!(
                "spectral algorithm '{other}' is not supported"
            )))
        }
    };
    Ok((ty, algorithm))
}

/// Rest frequency and wavelength; either can stand in for the other.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RestFrame {
    /// `RESTFRQ`, Hz.
    pub frequency: Option<f64>,
    /// `RESTWAV`, m.
    pub wavelength: Option<f64>,
}

impl RestFrame {
    fn rest_frequency(&self) -> Option<f64> {
        self.frequency
            .filter(|f| *f > 0.0)
            .or_else(|| self.wavelength.filter(|w| *w > 0.0).map(|w| SPEED_OF_LIGHT / w))
    }

    fn rest_wavelength(&self) -> Option<f64> {
        self.wavelength
            .filter(|w| *w > 0.0)
            .or_else(|| self.frequency.filter(|f| *f > 0.0).map(|f| SPEED_OF_LIGHT / f))
    }

    /// Fails when `ty` is a velocity-like type and no rest value is known.
    pub fn check(&self, ty: SpectralType) -> Result<()> {
        let needs_rest = matches!(
            ty,
            SpectralType::Vrad
                | SpectralType::Vopt
                | SpectralType::Zopt
                | SpectralType::Velo
                | SpectralType::Beta
        );
        if needs_rest && self.rest_frequency().is_none() {
            return Err(Error::SpectralConversion(format!(
                "RESTFRQ or RESTWAV is required to convert {ty:?} to wavelength"
            )));
        }
        Ok(())
    }
}

/// Convert a vacuum wavelength to air (Paper III, eq. 65).
pub fn vacuum_to_air(wavelength: f64) -> f64 {
    let s2 = (wavelength * 1e6).powi(-2);
    let n = 1.0 + 1e-6 * (287.6155 + 1.62887 * s2 + 0.01360 * s2 * s2);
    wavelength / n
}

/// Express a vacuum wavelength (m) as a value of `ty`, in SI units.
pub fn from_wavelength(ty: SpectralType, wavelength: f64, rest: &RestFrame) -> Result<f64> {
    if wavelength.is_nan() || wavelength <= 0.0 {
        return Err(Error::SpectralConversion(format!(
            "wavelength {wavelength} m is not positive"
        )));
    }
    rest.check(ty)?;
    let missing = || Error::SpectralConversion(format!("no rest value for {ty:?}"));
    let z = || -> Result<f64> {
        let rest_wav = rest.rest_wavelength().ok_or_else(missing)?;
        Ok((wavelength - rest_wav) / rest_wav)
    };
    let beta = || -> Result<f64> {
        let rest_wav = rest.rest_wavelength().ok_or_else(missing)?;
        let (l2, r2) = (wavelength * wavelength, rest_wav * rest_wav);
        Ok((l2 - r2) / (l2 + r2))
    };

    Ok(match ty {
        SpectralType::Wave => wavelength,
        SpectralType::Awav => vacuum_to_air(wavelength),
        SpectralType::Freq => SPEED_OF_LIGHT / wavelength,
        SpectralType::Ener => PLANCK * SPEED_OF_LIGHT / wavelength,
        SpectralType::Wavn => 1.0 / wavelength,
        SpectralType::Vrad => {
            let rest_freq = rest.rest_frequency().ok_or_else(missing)?;
            let freq = SPEED_OF_LIGHT / wavelength;
            SPEED_OF_LIGHT * (rest_freq - freq) / rest_freq
        }
        SpectralType::Zopt => z()?,
        SpectralType::Vopt => SPEED_OF_LIGHT * z()?,
        SpectralType::Beta => beta()?,
        SpectralType::Velo => SPEED_OF_LIGHT * beta()?,
    })
}
