//! Pixel cache sample types and the scaling rules between raw sample depths
//! and the fixed 16-bit quantum.

use core::str::FromStr;

use crate::error::RawError;

/// One channel sample in the pixel cache.
pub type Quantum = u16;

/// Colormap index (or the black channel of a CMYK image).
pub type IndexPacket = Quantum;

/// Largest quantum value.
pub const QUANTUM_RANGE: Quantum = u16::MAX;

/// Bits per cache sample.
pub const QUANTUM_DEPTH: u32 = 16;

/// Opacity value of a fully opaque pixel (opacity is inverted alpha).
pub const OPAQUE_OPACITY: Quantum = 0;

/// Opacity value of a fully transparent pixel.
pub const TRANSPARENT_OPACITY: Quantum = QUANTUM_RANGE;

/// The canonical cache pixel: red, green, blue and opacity at 16 bits.
///
/// For CMYK images red/green/blue carry cyan/magenta/yellow and black lives
/// in the index channel.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct PixelPacket {
    pub red: Quantum,
    pub green: Quantum,
    pub blue: Quantum,
    pub opacity: Quantum,
}

impl PixelPacket {
    pub const BLACK: PixelPacket = PixelPacket::rgb(0, 0, 0);
    pub const WHITE: PixelPacket = PixelPacket::rgb(QUANTUM_RANGE, QUANTUM_RANGE, QUANTUM_RANGE);
    pub const TRANSPARENT: PixelPacket = PixelPacket {
        red: 0,
        green: 0,
        blue: 0,
        opacity: TRANSPARENT_OPACITY,
    };

    /// Opaque pixel from three channels.
    pub const fn rgb(red: Quantum, green: Quantum, blue: Quantum) -> Self {
        Self {
            red,
            green,
            blue,
            opacity: OPAQUE_OPACITY,
        }
    }

    /// Pixel from three channels plus alpha (not opacity).
    pub const fn rgba(red: Quantum, green: Quantum, blue: Quantum, alpha: Quantum) -> Self {
        Self {
            red,
            green,
            blue,
            opacity: QUANTUM_RANGE - alpha,
        }
    }

    pub fn alpha(&self) -> Quantum {
        QUANTUM_RANGE - self.opacity
    }

    pub fn set_alpha(&mut self, alpha: Quantum) {
        self.opacity = QUANTUM_RANGE - alpha;
    }

    /// Rec.601 luma, as used for grayscale export.
    pub fn intensity(&self) -> Quantum {
        pixel_intensity(self)
    }
}

#[inline]
pub fn scale_char_to_quantum(value: u8) -> Quantum {
    Quantum::from(value) * 257
}

#[inline]
pub fn scale_quantum_to_char(quantum: Quantum) -> u8 {
    ((u32::from(quantum) + 128) / 257) as u8
}

#[inline]
pub fn scale_short_to_quantum(value: u16) -> Quantum {
    value
}

#[inline]
pub fn scale_quantum_to_short(quantum: Quantum) -> u16 {
    quantum
}

#[inline]
pub fn scale_long_to_quantum(value: u32) -> Quantum {
    ((u64::from(value) + 32768) / 65537) as Quantum
}

#[inline]
pub fn scale_quantum_to_long(quantum: Quantum) -> u32 {
    u32::from(quantum) * 65537
}

/// Maximum sample value at `depth` bits (1..=32).
#[inline]
pub fn quantum_range_for_depth(depth: u32) -> u64 {
    if depth >= 64 {
        u64::MAX
    } else {
        (1u64 << depth) - 1
    }
}

/// Scale a sample in `0..=range` to the quantum, rounding to nearest.
#[inline]
pub fn scale_any_to_quantum(value: u64, range: u64) -> Quantum {
    if range == 0 {
        return 0;
    }
    let value = value.min(range);
    ((u128::from(value) * u128::from(QUANTUM_RANGE) + u128::from(range / 2)) / u128::from(range))
        as Quantum
}

/// Scale a quantum to a sample in `0..=range`, rounding to nearest.
#[inline]
pub fn scale_quantum_to_any(quantum: Quantum, range: u64) -> u64 {
    ((u128::from(quantum) * u128::from(range) + u128::from(QUANTUM_RANGE / 2))
        / u128::from(QUANTUM_RANGE)) as u64
}

/// Round and clamp a real value into `[0, QUANTUM_RANGE]`. NaN maps to 0.
#[inline]
pub fn clamp_to_quantum(value: f64) -> Quantum {
    if value.is_nan() || value <= 0.0 {
        return 0;
    }
    if value >= f64::from(QUANTUM_RANGE) {
        return QUANTUM_RANGE;
    }
    (value + 0.5) as Quantum
}

/// Rec.601 luma of a pixel: `(299R + 587G + 114B + 500) / 1000`.
#[inline]
pub fn pixel_intensity(pixel: &PixelPacket) -> Quantum {
    let r = u32::from(pixel.red);
    let g = u32::from(pixel.green);
    let b = u32::from(pixel.blue);
    ((r * 299 + g * 587 + b * 114 + 500) / 1000) as Quantum
}

/// How the red/green/blue channels of the cache are to be read.
#[non_exhaustive]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Colorspace {
    /// Linear RGB.
    Rgb,
    /// sRGB, the default for raw RGB-family data.
    #[default]
    Srgb,
    /// Gray: red == green == blue.
    Gray,
    /// Cyan, magenta, yellow in red/green/blue, black in the index channel.
    Cmyk,
    /// RGB with a meaningful alpha channel.
    Transparent,
}

impl Colorspace {
    /// Whether red/green/blue carry red/green/blue.
    pub fn is_rgb_compatible(self) -> bool {
        matches!(self, Self::Rgb | Self::Srgb | Self::Gray | Self::Transparent)
    }
}

impl FromStr for Colorspace {
    type Err = RawError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "rgb" => Ok(Self::Rgb),
            "srgb" => Ok(Self::Srgb),
            "gray" | "grey" => Ok(Self::Gray),
            "cmyk" => Ok(Self::Cmyk),
            "transparent" => Ok(Self::Transparent),
            _ => Err(RawError::InvalidOption(format!("unrecognized colorspace `{s}'"))),
        }
    }
}

/// Whether pixels are stored directly or as colormap indexes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum StorageClass {
    #[default]
    Direct,
    /// Colormapped: the index channel selects a colormap entry.
    Pseudo,
}

/// Image classification recorded after a decode, from the quantum type that
/// produced the pixels.
#[non_exhaustive]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ImageType {
    #[default]
    Undefined,
    Bilevel,
    Grayscale,
    GrayscaleMatte,
    Palette,
    PaletteMatte,
    TrueColor,
    TrueColorMatte,
    ColorSeparation,
    ColorSeparationMatte,
}

/// Interleaved pixel memory layout, for moving whole images in and out of
/// plain byte buffers.
#[non_exhaustive]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PixelLayout {
    /// Single channel, 8-bit grayscale.
    Gray8,
    /// Single channel, 16-bit grayscale (native endian).
    Gray16,
    /// 3 channels, 8-bit RGB.
    Rgb8,
    /// 4 channels, 8-bit RGBA.
    Rgba8,
    /// 3 channels, 8-bit BGR.
    Bgr8,
    /// 4 channels, 8-bit BGRA.
    Bgra8,
    /// 4 channels, 8-bit BGRX (opaque; 4th byte is padding, written as zero).
    Bgrx8,
    /// 3 channels, 16-bit RGB (native endian).
    Rgb16,
    /// 4 channels, 16-bit RGBA (native endian).
    Rgba16,
}

impl PixelLayout {
    /// Bytes per pixel for this layout.
    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            Self::Gray8 => 1,
            Self::Gray16 => 2,
            Self::Rgb8 | Self::Bgr8 => 3,
            Self::Rgba8 | Self::Bgra8 | Self::Bgrx8 => 4,
            Self::Rgb16 => 6,
            Self::Rgba16 => 8,
        }
    }

    /// Number of channels.
    pub fn channels(&self) -> usize {
        match self {
            Self::Gray8 | Self::Gray16 => 1,
            Self::Rgb8 | Self::Bgr8 | Self::Rgb16 => 3,
            Self::Rgba8 | Self::Bgra8 | Self::Bgrx8 | Self::Rgba16 => 4,
        }
    }

    /// Whether the layout carries a real alpha channel.
    pub fn has_alpha(&self) -> bool {
        matches!(self, Self::Rgba8 | Self::Bgra8 | Self::Rgba16)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn char_scaling_roundtrips() {
        for v in 0..=255u8 {
            assert_eq!(scale_quantum_to_char(scale_char_to_quantum(v)), v);
        }
        assert_eq!(scale_char_to_quantum(255), QUANTUM_RANGE);
    }

    #[test]
    fn any_scaling_roundtrips_up_to_16_bits() {
        for depth in 1..=16u32 {
            let range = quantum_range_for_depth(depth);
            let step = (range / 257).max(1);
            let mut v = 0;
            while v <= range {
                let q = scale_any_to_quantum(v, range);
                assert_eq!(scale_quantum_to_any(q, range), v, "depth {depth} value {v}");
                v += step;
            }
            assert_eq!(scale_any_to_quantum(range, range), QUANTUM_RANGE);
        }
    }

    #[test]
    fn long_scaling_endpoints() {
        assert_eq!(scale_long_to_quantum(0), 0);
        assert_eq!(scale_long_to_quantum(u32::MAX), QUANTUM_RANGE);
        assert_eq!(scale_long_to_quantum(scale_quantum_to_long(1234)), 1234);
    }

    #[test]
    fn clamp() {
        assert_eq!(clamp_to_quantum(-3.0), 0);
        assert_eq!(clamp_to_quantum(f64::NAN), 0);
        assert_eq!(clamp_to_quantum(70000.0), QUANTUM_RANGE);
        assert_eq!(clamp_to_quantum(1.6), 2);
    }

    #[test]
    fn alpha_is_inverted_opacity() {
        let p = PixelPacket::rgba(1, 2, 3, 1000);
        assert_eq!(p.opacity, QUANTUM_RANGE - 1000);
        assert_eq!(p.alpha(), 1000);
    }

    #[test]
    fn intensity_of_white_is_full_range() {
        assert_eq!(PixelPacket::WHITE.intensity(), QUANTUM_RANGE);
        assert_eq!(PixelPacket::BLACK.intensity(), 0);
    }

    #[test]
    fn colorspace_names() {
        assert_eq!("GRAY".parse::<Colorspace>().unwrap(), Colorspace::Gray);
        assert_eq!("grey".parse::<Colorspace>().unwrap(), Colorspace::Gray);
        assert!("lab".parse::<Colorspace>().is_err());
        assert!(!Colorspace::Cmyk.is_rgb_compatible());
    }
}
