//! Cache row to raw bytes.

use super::bits::{SampleFormat, SampleWriter};
use super::import::check_storage;
use super::{Channel, QuantumInfo, QuantumType};
use crate::cache::RowSource;
use crate::error::RawError;
use crate::pixel::{QUANTUM_RANGE, pixel_intensity};

/// Pack one row of `source` into `out` as `quantum_type` samples.
///
/// Writes exactly [`QuantumInfo::extent`] bytes (pad bytes and the unused
/// bits of a trailing partial byte are zero) and returns that count, capped
/// at `out.len()`. Gray is exported as luma. Index types read the index
/// channel and need a colormapped source; black needs a CMYK source.
pub fn export_quantum_pixels(
    quantum: &QuantumInfo,
    quantum_type: QuantumType,
    source: &RowSource<'_>,
    out: &mut [u8],
) -> Result<usize, RawError> {
    check_storage(
        quantum_type,
        source.storage_class,
        source.colorspace,
        source.indexes.is_some(),
    )?;
    let columns = source.pixels.len();
    let extent = quantum.extent(columns, quantum_type);
    let format = SampleFormat::new(quantum);
    let len = out.len();
    let mut writer = SampleWriter::new(out, quantum.endian());
    let sequence = quantum_type.sequence();
    let index_at = |x: usize| {
        source
            .indexes
            .and_then(|i| i.get(x).copied())
            .unwrap_or(0)
    };

    for (x, pixel) in source.pixels.iter().enumerate() {
        for &channel in sequence {
            match channel {
                Channel::Red => format.write_quantum(&mut writer, pixel.red),
                Channel::Green => format.write_quantum(&mut writer, pixel.green),
                Channel::Blue => format.write_quantum(&mut writer, pixel.blue),
                Channel::Alpha => format.write_quantum(&mut writer, QUANTUM_RANGE - pixel.opacity),
                Channel::Opacity => format.write_quantum(&mut writer, pixel.opacity),
                Channel::Gray => {
                    let mut gray = pixel_intensity(pixel);
                    if quantum.min_is_white() {
                        gray = QUANTUM_RANGE - gray;
                    }
                    format.write_quantum(&mut writer, gray);
                }
                Channel::Black => format.write_quantum(&mut writer, index_at(x)),
                Channel::Index => format.write_index(&mut writer, index_at(x)),
            }
        }
        if quantum.pad() > 0 {
            writer.zeros(quantum.pad());
        }
    }
    writer.align();
    debug_assert!(writer.written() == extent.min(len));
    Ok(extent.min(len))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pixel::{Colorspace, PixelPacket, StorageClass, scale_char_to_quantum};

    fn source(pixels: &[PixelPacket]) -> RowSource<'_> {
        RowSource {
            pixels,
            indexes: None,
            colormap: &[],
            colorspace: Colorspace::Srgb,
            storage_class: StorageClass::Direct,
        }
    }

    fn px(b: u8, g: u8, r: u8, a: u8) -> PixelPacket {
        PixelPacket::rgba(
            scale_char_to_quantum(r),
            scale_char_to_quantum(g),
            scale_char_to_quantum(b),
            scale_char_to_quantum(a),
        )
    }

    #[test]
    fn bgra_order() {
        let q = QuantumInfo::default();
        let pixels = [px(1, 2, 3, 4), px(5, 6, 7, 8)];
        let mut out = [0u8; 8];
        let n = export_quantum_pixels(&q, QuantumType::Bgra, &source(&pixels), &mut out).unwrap();
        assert_eq!(n, 8);
        assert_eq!(out, [1, 2, 3, 4, 5, 6, 7, 8]);
    }

    #[test]
    fn opacity_is_written_as_stored() {
        let q = QuantumInfo::default();
        let pixels = [px(0, 0, 0, 0)];
        let mut out = [0u8; 4];
        export_quantum_pixels(&q, QuantumType::Bgro, &source(&pixels), &mut out).unwrap();
        assert_eq!(out[3], 255);
    }

    #[test]
    fn gray_is_luma() {
        let q = QuantumInfo::default();
        let pixels = [PixelPacket::rgb(QUANTUM_RANGE, 0, 0)];
        let mut out = [0u8; 1];
        export_quantum_pixels(&q, QuantumType::Gray, &source(&pixels), &mut out).unwrap();
        assert_eq!(out[0], 76);
    }

    #[test]
    fn partial_trailing_byte_is_zero_filled() {
        let q = QuantumInfo::default().with_depth(1).unwrap();
        let pixels = [PixelPacket::WHITE, PixelPacket::BLACK, PixelPacket::WHITE];
        let mut out = [0xffu8; 1];
        let n = export_quantum_pixels(&q, QuantumType::Gray, &source(&pixels), &mut out).unwrap();
        assert_eq!(n, 1);
        assert_eq!(out[0], 0b1010_0000);
    }

    #[test]
    fn index_needs_colormap() {
        let q = QuantumInfo::default();
        let pixels = [PixelPacket::BLACK];
        let mut out = [0u8; 1];
        let err =
            export_quantum_pixels(&q, QuantumType::Index, &source(&pixels), &mut out).unwrap_err();
        assert!(matches!(err, RawError::ColormappedImageRequired));
    }

    #[test]
    fn index_written_verbatim() {
        let q = QuantumInfo::default();
        let colormap = [PixelPacket::BLACK; 4];
        let pixels = [PixelPacket::BLACK; 2];
        let indexes = [3u16, 1];
        let src = RowSource {
            pixels: &pixels,
            indexes: Some(&indexes),
            colormap: &colormap,
            colorspace: Colorspace::Srgb,
            storage_class: StorageClass::Pseudo,
        };
        let mut out = [0u8; 2];
        export_quantum_pixels(&q, QuantumType::Index, &src, &mut out).unwrap();
        assert_eq!(out, [3, 1]);
    }

    #[test]
    fn pad_bytes_are_zero() {
        let q = QuantumInfo::default().with_pad(2);
        let pixels = [px(9, 9, 9, 255)];
        let mut out = [0xffu8; 5];
        let n = export_quantum_pixels(&q, QuantumType::Bgr, &source(&pixels), &mut out).unwrap();
        assert_eq!(n, 5);
        assert_eq!(out, [9, 9, 9, 0, 0]);
    }

    #[test]
    fn half_float_export() {
        let q = QuantumInfo::default()
            .with_format(crate::QuantumFormat::FloatingPoint)
            .unwrap();
        let pixels = [PixelPacket::WHITE];
        let mut out = [0u8; 2];
        export_quantum_pixels(&q, QuantumType::Red, &source(&pixels), &mut out).unwrap();
        assert_eq!(out, [0x3c, 0x00]);
    }
}
