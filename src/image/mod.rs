//! Captured pin photos: data-URI parsing and the front/back/angled image set.

pub mod capture;
pub mod data_uri;

pub use capture::{CapturedImageSet, ImageSlot};
pub use data_uri::{DataUri, DataUriError, DecodedImage, decode_image, strip_data_uri_prefix};
