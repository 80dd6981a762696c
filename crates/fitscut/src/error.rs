use thiserror::Error;

/// All errors that can occur while reading FITS data or computing a cutout.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed FITS header block.
    #[error("invalid FITS header: {0}")]
    InvalidHeader(&'static str),
    /// Premature end of data while reading.
    #[error("unexpected end of file")]
    UnexpectedEof,
    /// Unrecognized BITPIX value.
    #[error("invalid BITPIX value: {0}")]
    InvalidBitpix(i64),
    /// Malformed keyword name in a header card.
    #[error("invalid keyword name")]
    InvalidKeyword,
    /// A header value could not be interpreted as the requested type.
    #[error("invalid value for keyword {0}")]
    InvalidValue(String),
    /// A required keyword was not found in the header.
    #[error("missing required keyword: {0}")]
    MissingKeyword(String),

    /// The cutout request does not follow the region grammar.
    #[error("invalid cutout specification: {0}")]
    InvalidSpecification(String),
    /// Two shapes constrain the same kind of axis.
    #[error("more than one {0} shape in cutout specification")]
    DuplicateAxisRole(&'static str),
    /// Temporal cutouts are never performed.
    #[error("TIME cutouts are not supported")]
    UnsupportedTimeCutout,
    /// The header carries an axis type the engine cannot classify.
    #[error("unsupported axis type '{ctype}' on axis {axis}")]
    UnknownAxisType { axis: usize, ctype: String },
    /// Single-extension request that names an HDU not present in the file.
    #[error("extension {0} not found")]
    ExtensionNotFound(String),
    /// Conversion of a spectral axis to wavelength failed.
    #[error("spectral conversion failed: {0}")]
    SpectralConversion(String),
    /// Projection code the WCS backend does not implement.
    #[error("projection '{0}' is not supported")]
    UnsupportedProjection(String),

    /// Nothing in the file intersects the requested region.
    #[error("no overlap: {0}")]
    NoOverlap(String),

    /// The input or output stream could not be used.
    #[error("unusable source or target: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = core::result::Result<T, Error>;

impl Error {
    /// Returns `true` when the request was valid but selected no pixels.
    pub fn is_no_overlap(&self) -> bool {
        matches!(self, Error::NoOverlap(_))
    }

    /// Returns `true` for errors caused by the request or by WCS metadata the
    /// engine cannot work with.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Error::InvalidSpecification(_)
                | Error::DuplicateAxisRole(_)
                | Error::UnsupportedTimeCutout
                | Error::UnknownAxisType { .. }
                | Error::ExtensionNotFound(_)
                | Error::SpectralConversion(_)
                | Error::UnsupportedProjection(_)
                | Error::MissingKeyword(_)
        )
    }
}
