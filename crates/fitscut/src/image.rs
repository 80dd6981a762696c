//! Image pixel data for FITS HDUs.
//!
//! Pixels are held in their on-disk BITPIX type in FITS axis order (NAXIS1
//! varies fastest). No BSCALE/BZERO calibration is applied, so a cutout
//! carries the raw values and the scaling keywords unchanged.

use bytemuck::pod_collect_to_vec;
use ndarray::{ArrayView, IxDyn, ShapeBuilder, Slice};

use crate::error::{Error, Result};

/// Image pixel data extracted from a FITS HDU, typed by BITPIX.
#[derive(Debug, Clone, PartialEq)]
pub enum ImageData {
    U8(Vec<u8>),
    I16(Vec<i16>),
    I32(Vec<i32>),
    I64(Vec<i64>),
    F32(Vec<f32>),
    F64(Vec<f64>),
}

/// Returns the number of bytes per pixel for a given BITPIX value.
pub fn bytes_per_pixel(bitpix: i64) -> Result<usize> {
    match bitpix {
        8 | 16 | 32 | 64 | -32 | -64 => Ok((bitpix.unsigned_abs() / 8) as usize),
        _ => Err(Error::InvalidBitpix(bitpix)),
    }
}

impl ImageData {
    /// Decode big-endian on-disk bytes into native-endian pixels.
    pub fn decode(raw: &[u8], bitpix: i64) -> Result<Self> {
        let bpp = bytes_per_pixel(bitpix)?;
        if raw.len() % bpp != 0 {
            return Err(Error::UnexpectedEof);
        }
        Ok(match bitpix {
            8 => ImageData::U8(raw.to_vec()),
            16 => {
                let mut pixels: Vec<i16> = pod_collect_to_vec(raw);
                pixels.iter_mut().for_each(|v| *v = i16::from_be(*v));
                ImageData::I16(pixels)
            }
            32 => {
                let mut pixels: Vec<i32> = pod_collect_to_vec(raw);
                pixels.iter_mut().for_each(|v| *v = i32::from_be(*v));
                ImageData::I32(pixels)
            }
            64 => {
                let mut pixels: Vec<i64> = pod_collect_to_vec(raw);
                pixels.iter_mut().for_each(|v| *v = i64::from_be(*v));
                ImageData::I64(pixels)
            }
            -32 => {
                let mut pixels: Vec<f32> = pod_collect_to_vec(raw);
                pixels
                    .iter_mut()
                    .for_each(|v| *v = f32::from_bits(u32::from_be(v.to_bits())));
                ImageData::F32(pixels)
            }
            _ => {
                let mut pixels: Vec<f64> = pod_collect_to_vec(raw);
                pixels
                    .iter_mut()
                    .for_each(|v| *v = f64::from_bits(u64::from_be(v.to_bits())));
                ImageData::F64(pixels)
            }
        })
    }

    /// Serialize into big-endian bytes (not block padded).
    pub fn to_be_bytes(&self) -> Vec<u8> {
        match self {
            ImageData::U8(v) => v.clone(),
            ImageData::I16(v) => v.iter().flat_map(|x| x.to_be_bytes()).collect(),
            ImageData::I32(v) => v.iter().flat_map(|x| x.to_be_bytes()).collect(),
            ImageData::I64(v) => v.iter().flat_map(|x| x.to_be_bytes()).collect(),
            ImageData::F32(v) => v.iter().flat_map(|x| x.to_be_bytes()).collect(),
            ImageData::F64(v) => v.iter().flat_map(|x| x.to_be_bytes()).collect(),
        }
    }

    /// The BITPIX value matching this pixel type.
    pub fn bitpix(&self) -> i64 {
        match self {
            ImageData::U8(_) => 8,
            ImageData::I16(_) => 16,
            ImageData::I32(_) => 32,
            ImageData::I64(_) => 64,
            ImageData::F32(_) => -32,
            ImageData::F64(_) => -64,
        }
    }

    /// Number of pixels.
    pub fn len(&self) -> usize {
        match self {
            ImageData::U8(v) => v.len(),
            ImageData::I16(v) => v.len(),
            ImageData::I32(v) => v.len(),
            ImageData::I64(v) => v.len(),
            ImageData::F32(v) => v.len(),
            ImageData::F64(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Extract a strided sub-array.
    ///
    /// `naxes` is the FITS shape (NAXIS1 first) and `slices` holds one
    /// 0-based [`Slice`] per axis; a negative step walks the axis backwards
    /// from the end of the slice. The result is again in FITS axis order.
    pub fn slice(&self, naxes: &[usize], slices: &[Slice]) -> Result<ImageData> {
        if slices.len() != naxes.len() {
            return Err(Error::InvalidHeader("slice rank does not match NAXIS"));
        }
        Ok(match self {
            ImageData::U8(v) => ImageData::U8(slice_fits_order(v, naxes, slices)?),
            ImageData::I16(v) => ImageData::I16(slice_fits_order(v, naxes, slices)?),
            ImageData::I32(v) => ImageData::I32(slice_fits_order(v, naxes, slices)?),
            ImageData::I64(v) => ImageData::I64(slice_fits_order(v, naxes, slices)?),
            ImageData::F32(v) => ImageData::F32(slice_fits_order(v, naxes, slices)?),
            ImageData::F64(v) => ImageData::F64(slice_fits_order(v, naxes, slices)?),
        })
    }
}

fn slice_fits_order<T: Copy>(pixels: &[T], naxes: &[usize], slices: &[Slice]) -> Result<Vec<T>> {
    if naxes.is_empty() {
        return Ok(pixels.to_vec());
    }
    // Column-major layout puts NAXIS1 on axis 0 with unit stride.
    let view = ArrayView::from_shape(IxDyn(naxes).f(), pixels)
        .map_err(|_| Error::InvalidHeader("data length does not match NAXISn"))?;
    let cut = view.slice_each_axis(|ax| slices[ax.axis.index()]);
    // Iterating the transpose in logical order yields axis 0 fastest.
    Ok(cut.t().iter().copied().collect())
}
