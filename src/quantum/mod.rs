//! Quantum descriptor: how a raw byte buffer maps onto cache channels.
//!
//! A [`QuantumInfo`] fixes depth, endianness, sample format, padding and the
//! float range for one read or write pass. The [`QuantumType`] naming which
//! channels a buffer carries is passed per call, so one descriptor serves
//! every sub-pass of a line or plane interlaced frame.

mod bits;
mod export;
mod import;

use core::str::FromStr;

use bitflags::bitflags;

use crate::error::RawError;
use crate::image::Image;
use crate::info::ImageInfo;
use crate::pixel::{Colorspace, ImageType, QUANTUM_RANGE, StorageClass};

pub use export::export_quantum_pixels;
pub use import::import_quantum_pixels;

/// Which channels, in which order, a raw buffer encodes.
#[non_exhaustive]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum QuantumType {
    #[default]
    Undefined,
    Index,
    IndexAlpha,
    Gray,
    GrayAlpha,
    Red,
    Cyan,
    Green,
    Magenta,
    Blue,
    Yellow,
    Alpha,
    Opacity,
    Black,
    Rgb,
    Rgba,
    Rgbo,
    Bgr,
    Bgra,
    Bgro,
    Cmyk,
    Cmyka,
    Cmyko,
}

bitflags! {
    /// Cache channels a quantum type reads or writes.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct ChannelMask: u8 {
        const RED     = 0b0000_0001;
        const GREEN   = 0b0000_0010;
        const BLUE    = 0b0000_0100;
        const OPACITY = 0b0000_1000;
        /// Colormap index, or black for CMYK images.
        const INDEX   = 0b0001_0000;
        const RGB     = Self::RED.bits() | Self::GREEN.bits() | Self::BLUE.bits();
    }
}

/// A single sample slot within a pixel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Channel {
    Red,
    Green,
    Blue,
    /// Stored inverted, as opacity.
    Alpha,
    /// Stored as is.
    Opacity,
    /// Black of a CMYK image, carried in the index channel.
    Black,
    Index,
    Gray,
}

impl QuantumType {
    /// Samples per pixel.
    pub fn packet_size(self) -> usize {
        self.sequence().len().max(1)
    }

    /// Cache channels written on import (and read on export).
    pub fn channels(self) -> ChannelMask {
        match self {
            Self::Undefined => ChannelMask::empty(),
            Self::Index => ChannelMask::RGB | ChannelMask::OPACITY | ChannelMask::INDEX,
            Self::IndexAlpha => ChannelMask::RGB | ChannelMask::OPACITY | ChannelMask::INDEX,
            Self::Gray | Self::Rgb | Self::Bgr => ChannelMask::RGB,
            Self::GrayAlpha | Self::Rgba | Self::Rgbo | Self::Bgra | Self::Bgro => {
                ChannelMask::RGB | ChannelMask::OPACITY
            }
            Self::Red | Self::Cyan => ChannelMask::RED,
            Self::Green | Self::Magenta => ChannelMask::GREEN,
            Self::Blue | Self::Yellow => ChannelMask::BLUE,
            Self::Alpha | Self::Opacity => ChannelMask::OPACITY,
            Self::Black => ChannelMask::INDEX,
            Self::Cmyk => ChannelMask::RGB | ChannelMask::INDEX,
            Self::Cmyka | Self::Cmyko => ChannelMask::all(),
        }
    }

    /// Whether the type carries an alpha or opacity sample.
    pub fn has_alpha(self) -> bool {
        self.sequence()
            .iter()
            .any(|c| matches!(c, Channel::Alpha | Channel::Opacity))
    }

    /// Whether the type needs a colormapped image.
    pub fn needs_colormap(self) -> bool {
        matches!(self, Self::Index | Self::IndexAlpha)
    }

    /// Whether the type needs a CMYK image.
    pub fn needs_cmyk(self) -> bool {
        matches!(self, Self::Black | Self::Cmyk | Self::Cmyka | Self::Cmyko)
    }

    /// The quantum type that carries every channel of `image`.
    pub fn natural_for(image: &Image) -> Self {
        let matte = image.matte;
        if image.storage_class() == StorageClass::Pseudo {
            return if matte { Self::IndexAlpha } else { Self::Index };
        }
        match image.colorspace() {
            Colorspace::Cmyk if matte => Self::Cmyka,
            Colorspace::Cmyk => Self::Cmyk,
            Colorspace::Gray if matte => Self::GrayAlpha,
            Colorspace::Gray => Self::Gray,
            _ if matte => Self::Rgba,
            _ => Self::Rgb,
        }
    }

    pub(crate) fn sequence(self) -> &'static [Channel] {
        use Channel::*;
        match self {
            Self::Undefined => &[],
            Self::Index => &[Index],
            Self::IndexAlpha => &[Index, Alpha],
            Self::Gray => &[Gray],
            Self::GrayAlpha => &[Gray, Alpha],
            Self::Red | Self::Cyan => &[Red],
            Self::Green | Self::Magenta => &[Green],
            Self::Blue | Self::Yellow => &[Blue],
            Self::Alpha => &[Alpha],
            Self::Opacity => &[Opacity],
            Self::Black => &[Black],
            Self::Rgb => &[Red, Green, Blue],
            Self::Rgba => &[Red, Green, Blue, Alpha],
            Self::Rgbo => &[Red, Green, Blue, Opacity],
            Self::Bgr => &[Blue, Green, Red],
            Self::Bgra => &[Blue, Green, Red, Alpha],
            Self::Bgro => &[Blue, Green, Red, Opacity],
            Self::Cmyk => &[Red, Green, Blue, Black],
            Self::Cmyka => &[Red, Green, Blue, Black, Alpha],
            Self::Cmyko => &[Red, Green, Blue, Black, Opacity],
        }
    }
}

/// Byte order of multi-byte samples.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Endian {
    /// Unspecified; read and written as MSB first.
    #[default]
    Undefined,
    Lsb,
    Msb,
}

impl FromStr for Endian {
    type Err = RawError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "undefined" => Ok(Self::Undefined),
            "lsb" | "little" => Ok(Self::Lsb),
            "msb" | "big" => Ok(Self::Msb),
            _ => Err(RawError::InvalidOption(format!("unrecognized endian type `{s}'"))),
        }
    }
}

/// Sample encoding.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum QuantumFormat {
    #[default]
    Undefined,
    Unsigned,
    /// IEEE half, single or double precision, chosen by depth.
    FloatingPoint,
}

impl FromStr for QuantumFormat {
    type Err = RawError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "undefined" => Ok(Self::Undefined),
            "unsigned" => Ok(Self::Unsigned),
            "floating-point" | "floatingpoint" | "float" => Ok(Self::FloatingPoint),
            _ => Err(RawError::InvalidOption(format!(
                "unrecognized quantum format `{s}'"
            ))),
        }
    }
}

/// Per-pass description of the raw sample encoding.
#[derive(Clone, Debug, PartialEq)]
pub struct QuantumInfo {
    depth: u32,
    endian: Endian,
    format: QuantumFormat,
    pad: usize,
    pack: bool,
    min_is_white: bool,
    minimum: f64,
    maximum: f64,
    scale: f64,
}

impl Default for QuantumInfo {
    fn default() -> Self {
        Self {
            depth: 8,
            endian: Endian::Undefined,
            format: QuantumFormat::Undefined,
            pad: 0,
            pack: true,
            min_is_white: false,
            minimum: 0.0,
            maximum: 1.0,
            scale: f64::from(QUANTUM_RANGE),
        }
    }
}

impl QuantumInfo {
    /// Descriptor for `image` under the options of `info`.
    ///
    /// Depth and endianness come from the image; `quantum:format`,
    /// `quantum:minimum`, `quantum:maximum`, `quantum:scale`,
    /// `quantum:polarity` and `quantum:pad` from the options.
    pub fn new(info: &ImageInfo, image: &Image) -> Result<Self, RawError> {
        let mut quantum = QuantumInfo {
            endian: image.endian,
            ..Self::default()
        };
        if let Some(format) = info.option("quantum:format") {
            quantum.format = format.parse()?;
        }
        if let Some(minimum) = info.option("quantum:minimum") {
            quantum.minimum = parse_real("quantum:minimum", minimum)?;
        }
        if let Some(maximum) = info.option("quantum:maximum") {
            quantum.maximum = parse_real("quantum:maximum", maximum)?;
        }
        quantum.scale = if quantum.minimum == 0.0 && quantum.maximum == 0.0 {
            0.0
        } else if quantum.minimum == quantum.maximum {
            let scale = f64::from(QUANTUM_RANGE) / quantum.minimum;
            quantum.minimum = 0.0;
            scale
        } else {
            f64::from(QUANTUM_RANGE) / (quantum.maximum - quantum.minimum)
        };
        if let Some(scale) = info.option("quantum:scale") {
            quantum.scale = parse_real("quantum:scale", scale)?;
        }
        if let Some(polarity) = info.option("quantum:polarity") {
            quantum.min_is_white = polarity.eq_ignore_ascii_case("min-is-white");
        }
        if let Some(pad) = info.option("quantum:pad") {
            quantum.pad = pad
                .trim()
                .parse()
                .map_err(|_| RawError::InvalidOption(format!("quantum:pad `{pad}'")))?;
        }
        quantum.with_depth(image.depth)
    }

    /// Set the sample depth. Floating point formats round up to 16, 32 or
    /// 64 bits; unsigned samples must be 1..=32 bits.
    pub fn with_depth(mut self, depth: u32) -> Result<Self, RawError> {
        self.depth = match self.format {
            QuantumFormat::FloatingPoint if depth > 32 => 64,
            QuantumFormat::FloatingPoint if depth > 16 => 32,
            QuantumFormat::FloatingPoint => 16,
            _ if (1..=32).contains(&depth) => depth,
            _ => {
                return Err(RawError::InvalidOption(format!(
                    "unsupported sample depth {depth}"
                )));
            }
        };
        Ok(self)
    }

    /// Switch sample format, re-deriving the depth.
    pub fn with_format(mut self, format: QuantumFormat) -> Result<Self, RawError> {
        self.format = format;
        let depth = self.depth;
        self.with_depth(depth)
    }

    pub fn with_endian(mut self, endian: Endian) -> Self {
        self.endian = endian;
        self
    }

    /// Bytes skipped after every pixel.
    pub fn with_pad(mut self, pad: usize) -> Self {
        self.pad = pad;
        self
    }

    /// Whether samples narrower than a byte multiple are bit-packed (the
    /// default) or each rounded up to whole bytes.
    pub fn with_pack(mut self, pack: bool) -> Self {
        self.pack = pack;
        self
    }

    pub fn with_min_is_white(mut self, min_is_white: bool) -> Self {
        self.min_is_white = min_is_white;
        self
    }

    pub fn depth(&self) -> u32 {
        self.depth
    }

    pub fn endian(&self) -> Endian {
        self.endian
    }

    pub fn format(&self) -> QuantumFormat {
        self.format
    }

    pub fn pad(&self) -> usize {
        self.pad
    }

    pub fn pack(&self) -> bool {
        self.pack
    }

    pub fn min_is_white(&self) -> bool {
        self.min_is_white
    }

    pub fn minimum(&self) -> f64 {
        self.minimum
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub(crate) fn is_float(&self) -> bool {
        self.format == QuantumFormat::FloatingPoint
    }

    /// Bytes one row of `columns` pixels of `quantum_type` occupies.
    ///
    /// Packed: `ceil(packet * columns * depth / 8)`. Unpacked:
    /// `packet * columns * ceil(depth / 8)`. With padding every pixel starts
    /// on a byte boundary and is followed by `pad` bytes.
    pub fn extent(&self, columns: usize, quantum_type: QuantumType) -> usize {
        self.checked_extent(columns, quantum_type).unwrap_or(usize::MAX)
    }

    /// As [`QuantumInfo::extent`], `None` when the row length overflows.
    pub fn checked_extent(&self, columns: usize, quantum_type: QuantumType) -> Option<usize> {
        let packet = quantum_type.packet_size();
        let depth = self.depth as usize;
        if self.pad > 0 {
            let pixel = if self.pack {
                (packet * depth).div_ceil(8)
            } else {
                packet * depth.div_ceil(8)
            };
            return columns.checked_mul(pixel.checked_add(self.pad)?);
        }
        if self.pack {
            Some(columns.checked_mul(packet * depth)?.div_ceil(8))
        } else {
            columns.checked_mul(packet * depth.div_ceil(8))
        }
    }
}

fn parse_real(name: &str, value: &str) -> Result<f64, RawError> {
    value
        .trim()
        .parse()
        .map_err(|_| RawError::InvalidOption(format!("{name} `{value}' is not a number")))
}

/// Record on `image` the classification implied by the quantum type that
/// produced its pixels.
pub fn set_quantum_image_type(image: &mut Image, quantum_type: QuantumType) {
    let matte = image.matte;
    image.image_type = match quantum_type {
        QuantumType::Index | QuantumType::IndexAlpha if matte => ImageType::PaletteMatte,
        QuantumType::Index | QuantumType::IndexAlpha => ImageType::Palette,
        QuantumType::Gray | QuantumType::GrayAlpha if matte => ImageType::GrayscaleMatte,
        QuantumType::Gray | QuantumType::GrayAlpha if image.depth == 1 => ImageType::Bilevel,
        QuantumType::Gray | QuantumType::GrayAlpha => ImageType::Grayscale,
        QuantumType::Cyan
        | QuantumType::Magenta
        | QuantumType::Yellow
        | QuantumType::Black
        | QuantumType::Cmyk
        | QuantumType::Cmyka
        | QuantumType::Cmyko
            if matte =>
        {
            ImageType::ColorSeparationMatte
        }
        QuantumType::Cyan
        | QuantumType::Magenta
        | QuantumType::Yellow
        | QuantumType::Black
        | QuantumType::Cmyk
        | QuantumType::Cmyka
        | QuantumType::Cmyko => ImageType::ColorSeparation,
        _ if matte => ImageType::TrueColorMatte,
        _ => ImageType::TrueColor,
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packet_sizes() {
        assert_eq!(QuantumType::Gray.packet_size(), 1);
        assert_eq!(QuantumType::GrayAlpha.packet_size(), 2);
        assert_eq!(QuantumType::Bgr.packet_size(), 3);
        assert_eq!(QuantumType::Bgro.packet_size(), 4);
        assert_eq!(QuantumType::Cmyk.packet_size(), 4);
        assert_eq!(QuantumType::Cmyka.packet_size(), 5);
    }

    #[test]
    fn packed_and_unpacked_extent() {
        let q = QuantumInfo::default().with_depth(12).unwrap();
        assert_eq!(q.extent(3, QuantumType::Rgb), (3 * 3 * 12usize).div_ceil(8));
        let q = q.with_pack(false);
        assert_eq!(q.extent(3, QuantumType::Rgb), 3 * 3 * 2);
    }

    #[test]
    fn one_bit_rows_round_up_to_bytes() {
        let q = QuantumInfo::default().with_depth(1).unwrap();
        assert_eq!(q.extent(9, QuantumType::Gray), 2);
    }

    #[test]
    fn pad_is_added_per_pixel() {
        let q = QuantumInfo::default().with_pad(1);
        assert_eq!(q.extent(5, QuantumType::Bgr), 5 * 4);
    }

    #[test]
    fn overflowing_extent_is_none() {
        let q = QuantumInfo::default().with_depth(32).unwrap();
        assert_eq!(q.checked_extent(usize::MAX / 4, QuantumType::Cmyka), None);
        let padded = q.clone().with_pad(usize::MAX);
        assert_eq!(padded.checked_extent(1, QuantumType::Gray), None);
        assert_eq!(q.extent(usize::MAX / 4, QuantumType::Cmyka), usize::MAX);
        assert_eq!(q.checked_extent(4, QuantumType::Cmyka), Some(80));
    }

    #[test]
    fn float_depth_rounds_up() {
        let q = QuantumInfo::default()
            .with_format(QuantumFormat::FloatingPoint)
            .unwrap();
        assert_eq!(q.depth(), 16);
        assert_eq!(q.clone().with_depth(24).unwrap().depth(), 32);
        assert_eq!(q.with_depth(33).unwrap().depth(), 64);
    }

    #[test]
    fn unsigned_depth_bounds() {
        assert!(QuantumInfo::default().with_depth(0).is_err());
        assert!(QuantumInfo::default().with_depth(33).is_err());
        assert!(QuantumInfo::default().with_depth(32).is_ok());
    }

    #[test]
    fn options_are_read() {
        let info = ImageInfo::new("RGB")
            .with_option("quantum:format", "floating-point")
            .with_option("quantum:minimum", "-1")
            .with_option("quantum:maximum", "1")
            .with_option("quantum:polarity", "min-is-white");
        let mut image = Image::new(1, 1).unwrap();
        image.depth = 32;
        let q = QuantumInfo::new(&info, &image).unwrap();
        assert_eq!(q.format(), QuantumFormat::FloatingPoint);
        assert_eq!(q.depth(), 32);
        assert_eq!(q.minimum(), -1.0);
        assert_eq!(q.scale(), f64::from(QUANTUM_RANGE) / 2.0);
        assert!(q.min_is_white());
    }

    #[test]
    fn bad_option_value_is_an_option_error() {
        let info = ImageInfo::new("RGB").with_option("quantum:format", "bogus");
        let image = Image::new(1, 1).unwrap();
        let err = QuantumInfo::new(&info, &image).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Option);
    }

    #[test]
    fn natural_type_follows_image_state() {
        let mut image = Image::new(2, 2).unwrap();
        assert_eq!(QuantumType::natural_for(&image), QuantumType::Rgb);
        image.matte = true;
        assert_eq!(QuantumType::natural_for(&image), QuantumType::Rgba);
        image.set_colorspace(Colorspace::Cmyk);
        assert_eq!(QuantumType::natural_for(&image), QuantumType::Cmyka);
    }

    #[test]
    fn image_type_recorded() {
        let mut image = Image::new(1, 1).unwrap();
        set_quantum_image_type(&mut image, QuantumType::Bgr);
        assert_eq!(image.image_type, ImageType::TrueColor);
        image.matte = true;
        set_quantum_image_type(&mut image, QuantumType::Bgra);
        assert_eq!(image.image_type, ImageType::TrueColorMatte);
    }
}
