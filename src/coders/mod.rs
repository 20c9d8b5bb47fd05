//! Format coders.
//!
//! - [`raw`]: headerless interleaved/planar streams (BGR, RGB, GRAY, CMYK
//!   and their alpha variants). Geometry comes from [`ImageInfo::size`].
//! - [`farbfeld`]: a self-describing 16-bit RGBA format.
//!
//! [`ImageInfo::size`]: crate::ImageInfo::size

pub mod farbfeld;
pub mod raw;
