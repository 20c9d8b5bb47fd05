//! Raw bytes to cache row.

use log::warn;

use super::bits::{SampleFormat, SampleReader};
use super::{Channel, QuantumInfo, QuantumType};
use crate::cache::RowTarget;
use crate::error::RawError;
use crate::pixel::{Colorspace, QUANTUM_RANGE, StorageClass};

/// Unpack one row of `quantum_type` samples from `bytes` into `target`.
///
/// Only the channels `quantum_type` names are written; every other channel of
/// `target` keeps its value. The row width is `target.pixels.len()`.
///
/// Returns the number of bytes the row occupies, capped at `bytes.len()`. A
/// short buffer is not an error here: missing samples read as zero and the
/// caller compares the count against [`QuantumInfo::extent`].
///
/// Fails without touching `target` when `quantum_type` needs a colormapped or
/// CMYK image the target is not. A colormap index outside the colormap is
/// stored as index 0; the row is completed and then
/// [`RawError::InvalidColormapIndex`] is returned.
pub fn import_quantum_pixels(
    quantum: &QuantumInfo,
    quantum_type: QuantumType,
    bytes: &[u8],
    target: &mut RowTarget<'_>,
) -> Result<usize, RawError> {
    check_target(quantum_type, target)?;
    let columns = target.pixels.len();
    let extent = quantum.extent(columns, quantum_type);
    let format = SampleFormat::new(quantum);
    let mut reader = SampleReader::new(bytes, quantum.endian());
    let sequence = quantum_type.sequence();
    let colormap = target.colormap;
    let mut range_exception = false;

    for x in 0..columns {
        let pixel = &mut target.pixels[x];
        for &channel in sequence {
            let sample = format.read(&mut reader);
            match channel {
                Channel::Red => pixel.red = format.to_quantum(sample),
                Channel::Green => pixel.green = format.to_quantum(sample),
                Channel::Blue => pixel.blue = format.to_quantum(sample),
                Channel::Alpha => pixel.opacity = QUANTUM_RANGE - format.to_quantum(sample),
                Channel::Opacity => pixel.opacity = format.to_quantum(sample),
                Channel::Gray => {
                    let mut gray = format.to_quantum(sample);
                    if quantum.min_is_white() {
                        gray = QUANTUM_RANGE - gray;
                    }
                    pixel.red = gray;
                    pixel.green = gray;
                    pixel.blue = gray;
                }
                Channel::Black => {
                    let black = format.to_quantum(sample);
                    if let Some(slot) = target.indexes.as_deref_mut().and_then(|i| i.get_mut(x)) {
                        *slot = black;
                    }
                }
                Channel::Index => {
                    let raw = format.to_index(sample);
                    let index = if raw < colormap.len() {
                        raw
                    } else {
                        range_exception = true;
                        0
                    };
                    if let Some(slot) = target.indexes.as_deref_mut().and_then(|i| i.get_mut(x)) {
                        *slot = index as u16;
                    }
                    if let Some(entry) = colormap.get(index) {
                        *pixel = *entry;
                    }
                }
            }
        }
        if quantum.pad() > 0 {
            reader.skip(quantum.pad());
        }
    }

    if range_exception {
        warn!(
            "colormap index out of range (colormap has {} entries)",
            colormap.len()
        );
        return Err(RawError::InvalidColormapIndex);
    }
    Ok(extent.min(bytes.len()))
}

pub(super) fn check_storage(
    quantum_type: QuantumType,
    storage_class: StorageClass,
    colorspace: Colorspace,
    has_indexes: bool,
) -> Result<(), RawError> {
    if quantum_type == QuantumType::Undefined {
        return Err(RawError::UnsupportedVariant(
            "undefined quantum type".into(),
        ));
    }
    if quantum_type.needs_colormap() && (storage_class != StorageClass::Pseudo || !has_indexes) {
        return Err(RawError::ColormappedImageRequired);
    }
    if quantum_type.needs_cmyk() && (colorspace != Colorspace::Cmyk || !has_indexes) {
        return Err(RawError::ColorSeparatedImageRequired);
    }
    Ok(())
}

fn check_target(quantum_type: QuantumType, target: &RowTarget<'_>) -> Result<(), RawError> {
    check_storage(
        quantum_type,
        target.storage_class,
        target.colorspace,
        target.indexes.is_some(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pixel::{IndexPacket, PixelPacket, scale_char_to_quantum};

    fn target<'a>(
        pixels: &'a mut [PixelPacket],
        indexes: Option<&'a mut [IndexPacket]>,
        colormap: &'a [PixelPacket],
    ) -> RowTarget<'a> {
        let storage_class = if colormap.is_empty() {
            StorageClass::Direct
        } else {
            StorageClass::Pseudo
        };
        RowTarget {
            pixels,
            indexes,
            colormap,
            colorspace: Colorspace::Srgb,
            storage_class,
        }
    }

    #[test]
    fn bgr_bytes_land_in_reversed_channels() {
        let q = QuantumInfo::default();
        let mut pixels = [PixelPacket::default(); 2];
        let mut row = target(&mut pixels, None, &[]);
        let n = import_quantum_pixels(&q, QuantumType::Bgr, &[1, 2, 3, 4, 5, 6], &mut row).unwrap();
        assert_eq!(n, 6);
        assert_eq!(pixels[0].blue, scale_char_to_quantum(1));
        assert_eq!(pixels[0].green, scale_char_to_quantum(2));
        assert_eq!(pixels[0].red, scale_char_to_quantum(3));
        assert_eq!(pixels[1].red, scale_char_to_quantum(6));
    }

    #[test]
    fn untouched_channels_survive() {
        let q = QuantumInfo::default();
        let mut pixels = [PixelPacket::rgba(7, 8, 9, 100)];
        let mut row = target(&mut pixels, None, &[]);
        import_quantum_pixels(&q, QuantumType::Green, &[255], &mut row).unwrap();
        assert_eq!(pixels[0].red, 7);
        assert_eq!(pixels[0].green, QUANTUM_RANGE);
        assert_eq!(pixels[0].blue, 9);
        assert_eq!(pixels[0].alpha(), 100);
    }

    #[test]
    fn alpha_inverts_and_opacity_does_not() {
        let q = QuantumInfo::default();
        let mut pixels = [PixelPacket::default()];
        let mut row = target(&mut pixels, None, &[]);
        import_quantum_pixels(&q, QuantumType::Alpha, &[10], &mut row).unwrap();
        assert_eq!(pixels[0].opacity, QUANTUM_RANGE - scale_char_to_quantum(10));
        let mut row = target(&mut pixels, None, &[]);
        import_quantum_pixels(&q, QuantumType::Opacity, &[10], &mut row).unwrap();
        assert_eq!(pixels[0].opacity, scale_char_to_quantum(10));
    }

    #[test]
    fn short_buffer_reports_short_count() {
        let q = QuantumInfo::default();
        let mut pixels = [PixelPacket::WHITE; 4];
        let mut row = target(&mut pixels, None, &[]);
        let n = import_quantum_pixels(&q, QuantumType::Rgb, &[255; 5], &mut row).unwrap();
        assert_eq!(n, 5);
        assert!(n < q.extent(4, QuantumType::Rgb));
        assert_eq!(pixels[3], PixelPacket::BLACK);
    }

    #[test]
    fn index_out_of_range_is_zeroed_and_reported() {
        let q = QuantumInfo::default();
        let colormap = [PixelPacket::rgb(1, 1, 1), PixelPacket::rgb(2, 2, 2)];
        let mut pixels = [PixelPacket::default(); 3];
        let mut indexes = [9u16; 3];
        let mut row = target(&mut pixels, Some(&mut indexes), &colormap);
        let err = import_quantum_pixels(&q, QuantumType::Index, &[1, 5, 0], &mut row).unwrap_err();
        assert!(matches!(err, RawError::InvalidColormapIndex));
        assert_eq!(indexes, [1, 0, 0]);
        assert_eq!(pixels[0], colormap[1]);
        assert_eq!(pixels[1], colormap[0]);
    }

    #[test]
    fn index_needs_pseudo_class() {
        let q = QuantumInfo::default();
        let mut pixels = [PixelPacket::default()];
        let mut row = target(&mut pixels, None, &[]);
        let err = import_quantum_pixels(&q, QuantumType::Index, &[0], &mut row).unwrap_err();
        assert!(matches!(err, RawError::ColormappedImageRequired));
    }

    #[test]
    fn black_needs_cmyk() {
        let q = QuantumInfo::default();
        let mut pixels = [PixelPacket::default()];
        let mut indexes = [0u16];
        let mut row = target(&mut pixels, Some(&mut indexes), &[]);
        let err = import_quantum_pixels(&q, QuantumType::Black, &[0], &mut row).unwrap_err();
        assert!(matches!(err, RawError::ColorSeparatedImageRequired));
        row.colorspace = Colorspace::Cmyk;
        import_quantum_pixels(&q, QuantumType::Black, &[255], &mut row).unwrap();
        assert_eq!(indexes[0], QUANTUM_RANGE);
    }

    #[test]
    fn one_bit_gray_with_min_is_white() {
        let q = QuantumInfo::default()
            .with_depth(1)
            .unwrap()
            .with_min_is_white(true);
        let mut pixels = [PixelPacket::default(); 3];
        let mut row = target(&mut pixels, None, &[]);
        let n = import_quantum_pixels(&q, QuantumType::Gray, &[0b0100_0000], &mut row).unwrap();
        assert_eq!(n, 1);
        assert_eq!(pixels[0], PixelPacket::WHITE);
        assert_eq!(pixels[1], PixelPacket::BLACK);
        assert_eq!(pixels[2], PixelPacket::WHITE);
    }

    #[test]
    fn twelve_bit_samples_scale_to_full_range() {
        let q = QuantumInfo::default().with_depth(12).unwrap();
        let mut pixels = [PixelPacket::default()];
        let mut row = target(&mut pixels, None, &[]);
        // 0xFFF then 0x000, packed into three bytes.
        let n = import_quantum_pixels(&q, QuantumType::GrayAlpha, &[0xff, 0xf0, 0x00], &mut row)
            .unwrap();
        assert_eq!(n, 3);
        assert_eq!(pixels[0].red, QUANTUM_RANGE);
        assert_eq!(pixels[0].opacity, QUANTUM_RANGE);
    }

    #[test]
    fn lsb_sixteen_bit() {
        let q = QuantumInfo::default()
            .with_depth(16)
            .unwrap()
            .with_endian(crate::Endian::Lsb);
        let mut pixels = [PixelPacket::default()];
        let mut row = target(&mut pixels, None, &[]);
        import_quantum_pixels(&q, QuantumType::Red, &[0x34, 0x12], &mut row).unwrap();
        assert_eq!(pixels[0].red, 0x1234);
    }

    #[test]
    fn single_precision_floats_use_minimum_and_scale() {
        let q = QuantumInfo::default()
            .with_format(crate::QuantumFormat::FloatingPoint)
            .unwrap()
            .with_depth(32)
            .unwrap();
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&0.5f32.to_be_bytes());
        bytes.extend_from_slice(&2.0f32.to_be_bytes());
        let mut pixels = [PixelPacket::default(); 2];
        let mut row = target(&mut pixels, None, &[]);
        import_quantum_pixels(&q, QuantumType::Blue, &bytes, &mut row).unwrap();
        assert_eq!(pixels[0].blue, 32768);
        assert_eq!(pixels[1].blue, QUANTUM_RANGE);
    }

    #[test]
    fn pad_bytes_are_skipped() {
        let q = QuantumInfo::default().with_pad(1);
        let mut pixels = [PixelPacket::default(); 2];
        let mut row = target(&mut pixels, None, &[]);
        let n = import_quantum_pixels(&q, QuantumType::Bgr, &[1, 2, 3, 99, 4, 5, 6, 99], &mut row)
            .unwrap();
        assert_eq!(n, 8);
        assert_eq!(pixels[1].blue, scale_char_to_quantum(4));
    }
}
