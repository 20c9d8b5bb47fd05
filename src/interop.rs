//! Whole-image conversion to and from plain interleaved buffers.

use crate::colorspace::transform_colorspace;
use crate::error::RawError;
use crate::image::Image;
use crate::pixel::{Colorspace, PixelLayout};
use crate::quantum::{
    Endian, QuantumInfo, QuantumType, export_quantum_pixels, import_quantum_pixels,
};

#[cfg(feature = "rgb")]
use crate::pixel::{
    PixelPacket, scale_char_to_quantum, scale_quantum_to_char, scale_quantum_to_short,
    scale_short_to_quantum,
};

fn native_endian() -> Endian {
    if cfg!(target_endian = "little") {
        Endian::Lsb
    } else {
        Endian::Msb
    }
}

/// Quantum descriptor and type that read or write `layout`.
fn layout_quantum(layout: PixelLayout) -> Result<(QuantumInfo, QuantumType), RawError> {
    let (quantum_type, depth, pad) = match layout {
        PixelLayout::Gray8 => (QuantumType::Gray, 8, 0),
        PixelLayout::Gray16 => (QuantumType::Gray, 16, 0),
        PixelLayout::Rgb8 => (QuantumType::Rgb, 8, 0),
        PixelLayout::Rgba8 => (QuantumType::Rgba, 8, 0),
        PixelLayout::Bgr8 => (QuantumType::Bgr, 8, 0),
        PixelLayout::Bgra8 => (QuantumType::Bgra, 8, 0),
        PixelLayout::Bgrx8 => (QuantumType::Bgr, 8, 1),
        PixelLayout::Rgb16 => (QuantumType::Rgb, 16, 0),
        PixelLayout::Rgba16 => (QuantumType::Rgba, 16, 0),
    };
    let quantum = QuantumInfo::default()
        .with_depth(depth)?
        .with_endian(native_endian())
        .with_pad(pad);
    Ok((quantum, quantum_type))
}

impl Image {
    /// All pixels packed as `layout`, rows top to bottom. 16-bit layouts are
    /// native endian. CMYK images are converted to RGB first.
    pub fn to_interleaved(&self, layout: PixelLayout) -> Result<Vec<u8>, RawError> {
        let (quantum, quantum_type) = layout_quantum(layout)?;
        let converted;
        let image = if self.colorspace() == Colorspace::Cmyk {
            let mut copy = self.clone();
            transform_colorspace(&mut copy, Colorspace::Srgb);
            converted = copy;
            &converted
        } else {
            self
        };
        let row_len = quantum.extent(image.columns() as usize, quantum_type);
        let mut out = vec![0u8; row_len * image.rows() as usize];
        for (y, chunk) in (0..image.rows()).zip(out.chunks_exact_mut(row_len.max(1))) {
            let source = image.row_source(y).ok_or(RawError::InvalidRegion {
                x: 0,
                y: i64::from(y),
                width: image.columns() as usize,
                height: 1,
            })?;
            export_quantum_pixels(&quantum, quantum_type, &source, chunk)?;
        }
        Ok(out)
    }

    /// A `width` x `height` image from `layout` bytes. Fails with
    /// [`RawError::UnexpectedEof`] when `bytes` is too short.
    pub fn from_interleaved(
        bytes: &[u8],
        width: u32,
        height: u32,
        layout: PixelLayout,
    ) -> Result<Image, RawError> {
        let (quantum, quantum_type) = layout_quantum(layout)?;
        let mut image = Image::new(width, height)?;
        image.matte = layout.has_alpha();
        image.depth = quantum.depth();
        if layout.channels() == 1 {
            image.set_colorspace(Colorspace::Gray);
        }
        let row_len = width as usize * layout.bytes_per_pixel();
        let needed = row_len * height as usize;
        if bytes.len() < needed {
            return Err(RawError::eof("interleaved buffer"));
        }
        for (y, row) in (0..height).zip(bytes.chunks_exact(row_len)) {
            if let Some(mut target) = image.row_target(y) {
                import_quantum_pixels(&quantum, quantum_type, row, &mut target)?;
            }
        }
        Ok(image)
    }
}

/// Typed pixels from the `rgb` crate that map onto the cache.
#[cfg(feature = "rgb")]
pub trait RawPixel: Copy {
    const LAYOUT: PixelLayout;

    fn from_packet(packet: &PixelPacket) -> Self;

    fn to_packet(self) -> PixelPacket;
}

#[cfg(feature = "rgb")]
impl RawPixel for rgb::RGB8 {
    const LAYOUT: PixelLayout = PixelLayout::Rgb8;

    fn from_packet(p: &PixelPacket) -> Self {
        rgb::RGB8 {
            r: scale_quantum_to_char(p.red),
            g: scale_quantum_to_char(p.green),
            b: scale_quantum_to_char(p.blue),
        }
    }

    fn to_packet(self) -> PixelPacket {
        PixelPacket::rgb(
            scale_char_to_quantum(self.r),
            scale_char_to_quantum(self.g),
            scale_char_to_quantum(self.b),
        )
    }
}

#[cfg(feature = "rgb")]
impl RawPixel for rgb::RGBA8 {
    const LAYOUT: PixelLayout = PixelLayout::Rgba8;

    fn from_packet(p: &PixelPacket) -> Self {
        rgb::RGBA8 {
            r: scale_quantum_to_char(p.red),
            g: scale_quantum_to_char(p.green),
            b: scale_quantum_to_char(p.blue),
            a: scale_quantum_to_char(p.alpha()),
        }
    }

    fn to_packet(self) -> PixelPacket {
        PixelPacket::rgba(
            scale_char_to_quantum(self.r),
            scale_char_to_quantum(self.g),
            scale_char_to_quantum(self.b),
            scale_char_to_quantum(self.a),
        )
    }
}

#[cfg(feature = "rgb")]
impl RawPixel for rgb::alt::BGR8 {
    const LAYOUT: PixelLayout = PixelLayout::Bgr8;

    fn from_packet(p: &PixelPacket) -> Self {
        rgb::alt::BGR8 {
            b: scale_quantum_to_char(p.blue),
            g: scale_quantum_to_char(p.green),
            r: scale_quantum_to_char(p.red),
        }
    }

    fn to_packet(self) -> PixelPacket {
        PixelPacket::rgb(
            scale_char_to_quantum(self.r),
            scale_char_to_quantum(self.g),
            scale_char_to_quantum(self.b),
        )
    }
}

#[cfg(feature = "rgb")]
impl RawPixel for rgb::alt::BGRA8 {
    const LAYOUT: PixelLayout = PixelLayout::Bgra8;

    fn from_packet(p: &PixelPacket) -> Self {
        rgb::alt::BGRA8 {
            b: scale_quantum_to_char(p.blue),
            g: scale_quantum_to_char(p.green),
            r: scale_quantum_to_char(p.red),
            a: scale_quantum_to_char(p.alpha()),
        }
    }

    fn to_packet(self) -> PixelPacket {
        PixelPacket::rgba(
            scale_char_to_quantum(self.r),
            scale_char_to_quantum(self.g),
            scale_char_to_quantum(self.b),
            scale_char_to_quantum(self.a),
        )
    }
}

#[cfg(feature = "rgb")]
impl RawPixel for rgb::RGBA16 {
    const LAYOUT: PixelLayout = PixelLayout::Rgba16;

    fn from_packet(p: &PixelPacket) -> Self {
        rgb::RGBA16 {
            r: scale_quantum_to_short(p.red),
            g: scale_quantum_to_short(p.green),
            b: scale_quantum_to_short(p.blue),
            a: scale_quantum_to_short(p.alpha()),
        }
    }

    fn to_packet(self) -> PixelPacket {
        PixelPacket::rgba(
            scale_short_to_quantum(self.r),
            scale_short_to_quantum(self.g),
            scale_short_to_quantum(self.b),
            scale_short_to_quantum(self.a),
        )
    }
}

#[cfg(feature = "rgb")]
impl Image {
    /// Every pixel as `P`, row-major. CMYK images are converted to RGB
    /// first; pinged images yield nothing.
    pub fn to_pixels<P: RawPixel>(&self) -> Vec<P> {
        if self.colorspace() == Colorspace::Cmyk {
            let mut copy = self.clone();
            transform_colorspace(&mut copy, Colorspace::Srgb);
            return copy.pixels().iter().map(P::from_packet).collect();
        }
        self.pixels().iter().map(P::from_packet).collect()
    }

    /// An image from `width * height` typed pixels.
    pub fn from_pixels<P: RawPixel>(pixels: &[P], width: u32, height: u32) -> Result<Image, RawError> {
        let mut image = Image::new(width, height)?;
        if pixels.len() < image.pixels().len() {
            return Err(RawError::eof("pixel slice"));
        }
        image.matte = P::LAYOUT.has_alpha();
        for (dst, src) in image.pixels_mut().iter_mut().zip(pixels) {
            *dst = src.to_packet();
        }
        Ok(image)
    }

    /// Every pixel as `P` in an [`imgref::ImgVec`].
    #[cfg(feature = "imgref")]
    pub fn to_imgvec<P: RawPixel>(&self) -> imgref::ImgVec<P> {
        imgref::ImgVec::new(
            self.to_pixels(),
            self.columns() as usize,
            self.rows() as usize,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pixel::{PixelPacket, QUANTUM_RANGE};

    #[test]
    fn bgra_buffer_round_trip() {
        let bytes: Vec<u8> = (0..24).collect();
        let image = Image::from_interleaved(&bytes, 3, 2, PixelLayout::Bgra8).unwrap();
        assert!(image.matte);
        let p = image.pixel(0, 0).unwrap();
        assert_eq!(p.blue, 0);
        assert_eq!(p.red, 2 * 257);
        assert_eq!(image.to_interleaved(PixelLayout::Bgra8).unwrap(), bytes);
    }

    #[test]
    fn bgrx_padding_is_zero() {
        let mut image = Image::new(1, 1).unwrap();
        image.pixels_mut()[0] = PixelPacket::rgb(QUANTUM_RANGE, 0, 0);
        assert_eq!(image.to_interleaved(PixelLayout::Bgrx8).unwrap(), [0, 0, 255, 0]);
    }

    #[test]
    fn sixteen_bit_is_native_endian() {
        let mut image = Image::new(1, 1).unwrap();
        image.pixels_mut()[0] = PixelPacket::rgb(0x1234, 0, 0);
        let out = image.to_interleaved(PixelLayout::Rgb16).unwrap();
        assert_eq!(&out[..2], &0x1234u16.to_ne_bytes());
    }

    #[test]
    fn short_buffer_is_corrupt() {
        let err = Image::from_interleaved(&[0; 5], 2, 1, PixelLayout::Rgb8).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::CorruptImage);
    }

    #[cfg(feature = "rgb")]
    #[test]
    fn typed_pixels() {
        let pixels = [rgb::RGBA8 { r: 1, g: 2, b: 3, a: 4 }; 4];
        let image = Image::from_pixels(&pixels, 2, 2).unwrap();
        let back: Vec<rgb::alt::BGRA8> = image.to_pixels();
        assert_eq!((back[3].b, back[3].a), (3, 4));
    }
}
