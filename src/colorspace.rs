//! Pixel value conversion between the colorspaces raw formats write.
//!
//! CMYK is ink coverage: cyan, magenta and yellow in the red, green and blue
//! channels and black in the index channel, with black pulled out of the
//! other three (undercolour removal).

use log::debug;

use crate::image::Image;
use crate::pixel::{Colorspace, PixelPacket, QUANTUM_RANGE, Quantum, clamp_to_quantum, pixel_intensity};

const RANGE: f64 = QUANTUM_RANGE as f64;

/// Convert the pixel values of `image` to `target` and retag it.
///
/// Handles any RGB-compatible colorspace to CMYK or gray and back. Opacity
/// is left alone. Converting to the current colorspace, or between the
/// RGB-compatible spaces, only retags.
pub fn transform_colorspace(image: &mut Image, target: Colorspace) {
    let source = image.colorspace();
    if source == target {
        return;
    }
    debug!("transforming {source:?} to {target:?}");
    if source == Colorspace::Cmyk {
        cmyk_to_rgb(image);
        image.set_colorspace(Colorspace::Srgb);
    }
    match target {
        Colorspace::Cmyk => {
            image.set_colorspace(Colorspace::Cmyk);
            rgb_to_cmyk(image);
        }
        Colorspace::Gray => {
            for pixel in image.pixels_mut() {
                let gray = pixel_intensity(pixel);
                pixel.red = gray;
                pixel.green = gray;
                pixel.blue = gray;
            }
            image.set_colorspace(Colorspace::Gray);
        }
        other => image.set_colorspace(other),
    }
}

fn rgb_to_cmyk(image: &mut Image) {
    let mut blacks = Vec::with_capacity(image.pixels().len());
    for pixel in image.pixels_mut() {
        let (cyan, magenta, yellow, black) = rgb_to_cmyk_pixel(pixel);
        pixel.red = cyan;
        pixel.green = magenta;
        pixel.blue = yellow;
        blacks.push(black);
    }
    for (index, black) in image.indexes_mut().iter_mut().zip(blacks) {
        *index = black;
    }
}

fn rgb_to_cmyk_pixel(pixel: &PixelPacket) -> (Quantum, Quantum, Quantum, Quantum) {
    let cyan = 1.0 - f64::from(pixel.red) / RANGE;
    let magenta = 1.0 - f64::from(pixel.green) / RANGE;
    let yellow = 1.0 - f64::from(pixel.blue) / RANGE;
    let black = cyan.min(magenta).min(yellow);
    if black >= 1.0 {
        return (0, 0, 0, QUANTUM_RANGE);
    }
    let remove = |v: f64| clamp_to_quantum(RANGE * (v - black) / (1.0 - black));
    (
        remove(cyan),
        remove(magenta),
        remove(yellow),
        clamp_to_quantum(RANGE * black),
    )
}

fn cmyk_to_rgb(image: &mut Image) {
    let blacks = image.indexes().to_vec();
    for (i, pixel) in image.pixels_mut().iter_mut().enumerate() {
        let black = f64::from(blacks.get(i).copied().unwrap_or(0)) / RANGE;
        let ink = |v: Quantum| {
            let v = f64::from(v) / RANGE;
            clamp_to_quantum(RANGE * (1.0 - (v * (1.0 - black) + black)))
        };
        pixel.red = ink(pixel.red);
        pixel.green = ink(pixel.green);
        pixel.blue = ink(pixel.blue);
    }
}
