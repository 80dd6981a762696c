pub mod block;
pub mod cutout;
pub mod error;
pub mod hdu;
pub mod header;
pub mod image;
pub mod value;
pub mod wcs;

pub use block::{BLOCK_SIZE, CARDS_PER_BLOCK, CARD_SIZE};
pub use cutout::{cutout, cutout_with, CutoutOptions, CutoutResult, CutoutSpecification};
pub use error::{Error, Result};
pub use hdu::{parse_fits, write_fits, FitsFile, Hdu, HduKind};
pub use header::{Card, Header};
pub use image::ImageData;
pub use value::Value;
pub use wcs::{HeaderWcs, WcsProjector};
