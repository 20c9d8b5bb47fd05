//! Farbfeld: 8-byte magic (`farbfeld`), width and height as big-endian u32,
//! then RGBA samples as big-endian u16.
//!
//! Rows go through the same quantum engine as the raw formats, at 16-bit
//! MSB `RGBA`.

use enough::Stop;
use log::trace;

use crate::blob::{BlobReader, BlobSink, BlobStore};
use crate::colorspace::transform_colorspace;
use crate::error::{DecodeError, RawError};
use crate::image::{Image, ImageList};
use crate::info::{ImageInfo, LOAD_IMAGE_TAG, SAVE_IMAGE_TAG};
use crate::pixel::Colorspace;
use crate::quantum::{
    Endian, QuantumInfo, QuantumType, export_quantum_pixels, import_quantum_pixels,
    set_quantum_image_type,
};
use crate::registry::{Codec, CoderInfo};

const MAGIC: &[u8; 8] = b"farbfeld";
const HEADER_LEN: usize = 16;

/// Farbfeld codec.
#[derive(Clone, Debug)]
pub struct FarbfeldCoder {
    info: CoderInfo,
}

impl Default for FarbfeldCoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FarbfeldCoder {
    pub fn new() -> Self {
        let mut info = CoderInfo::new("FARBFELD", "Farbfeld");
        info.adjoin = false;
        Self { info }
    }
}

/// Parse the header, returning (width, height).
fn parse_header(data: &[u8], filename: &str) -> Result<(u32, u32), RawError> {
    let header = data.get(..HEADER_LEN).ok_or_else(|| RawError::eof(filename))?;
    if &header[..8] != MAGIC {
        return Err(RawError::NoDecoder(format!("`{filename}' is not farbfeld")));
    }
    let width = u32::from_be_bytes([header[8], header[9], header[10], header[11]]);
    let height = u32::from_be_bytes([header[12], header[13], header[14], header[15]]);
    if width == 0 || height == 0 {
        return Err(RawError::InvalidGeometry(format!("{width}x{height}")));
    }
    Ok((width, height))
}

fn quantum() -> Result<QuantumInfo, RawError> {
    Ok(QuantumInfo::default()
        .with_depth(16)?
        .with_endian(Endian::Msb))
}

impl FarbfeldCoder {
    fn read(
        &self,
        info: &ImageInfo,
        data: &[u8],
        stop: &dyn Stop,
    ) -> Result<Image, (RawError, Option<Image>)> {
        let (width, height) = parse_header(data, &info.filename).map_err(|e| (e, None))?;
        let quantum = quantum().map_err(|e| (e, None))?;
        let length = quantum.extent(width as usize, QuantumType::Rgba);
        if !info.ping && data.len().saturating_sub(HEADER_LEN) < length {
            return Err((RawError::eof(&info.filename), None));
        }
        let mut image = if info.ping {
            Image::pinged(width, height)
        } else {
            Image::with_limits(width, height, &info.limits)
        }
        .map_err(|e| (e, None))?;
        image.depth = 16;
        image.matte = true;
        image.magick = self.info.name.clone();
        image.filename = info.filename.clone();
        if info.ping {
            return Ok(image);
        }

        let mut stream = BlobReader::new(data);
        stream.discard(HEADER_LEN);
        for y in 0..height {
            if let Err(reason) = stop.check() {
                return Err((reason.into(), Some(image)));
            }
            let bytes = stream.read_stream(length);
            if bytes.len() != length {
                return Err((RawError::eof(&info.filename), Some(image)));
            }
            let imported = match image.row_target(y) {
                Some(mut target) => {
                    import_quantum_pixels(&quantum, QuantumType::Rgba, bytes, &mut target)
                }
                None => Ok(0),
            };
            if let Err(e) = imported {
                return Err((e, Some(image)));
            }
            if let Err(e) = info.report(LOAD_IMAGE_TAG, u64::from(y), u64::from(height)) {
                return Err((e, Some(image)));
            }
        }
        set_quantum_image_type(&mut image, QuantumType::Rgba);
        Ok(image)
    }
}

impl Codec for FarbfeldCoder {
    fn info(&self) -> &CoderInfo {
        &self.info
    }

    fn decode(
        &self,
        info: &ImageInfo,
        store: &dyn BlobStore,
        stop: &dyn Stop,
    ) -> Result<ImageList, DecodeError> {
        trace!("decoding farbfeld `{}'", info.filename);
        let data = store.read(&info.filename)?;
        match self.read(info, &data, stop) {
            Ok(image) => Ok(ImageList::from(image)),
            Err((error, partial)) => Err(DecodeError {
                error,
                partial: partial.map(ImageList::from).unwrap_or_default(),
            }),
        }
    }

    fn encode(
        &self,
        info: &ImageInfo,
        images: &ImageList,
        sink: &mut dyn BlobSink,
        stop: &dyn Stop,
    ) -> Result<(), RawError> {
        trace!("encoding farbfeld `{}'", info.filename);
        let image = images
            .first()
            .ok_or_else(|| RawError::InvalidOption("no images to write".into()))?;
        let mut frame = image.clone();
        if !frame.colorspace().is_rgb_compatible() {
            transform_colorspace(&mut frame, Colorspace::Srgb);
        }
        if !frame.matte {
            frame.set_alpha_opaque();
        }

        let quantum = quantum()?;
        let (width, height) = (frame.columns(), frame.rows());
        let length = quantum.extent(width as usize, QuantumType::Rgba);
        let mut out = Vec::with_capacity(HEADER_LEN + length * height as usize);
        out.extend_from_slice(MAGIC);
        out.extend_from_slice(&width.to_be_bytes());
        out.extend_from_slice(&height.to_be_bytes());
        let mut row = vec![0u8; length];
        for y in 0..height {
            stop.check()?;
            let source = frame.row_source(y).ok_or(RawError::InvalidRegion {
                x: 0,
                y: i64::from(y),
                width: width as usize,
                height: 1,
            })?;
            export_quantum_pixels(&quantum, QuantumType::Rgba, &source, &mut row)?;
            out.extend_from_slice(&row);
            info.report(SAVE_IMAGE_TAG, u64::from(y), u64::from(height))?;
        }
        sink.write(&info.filename, &out)
    }

    fn sniff(&self, header: &[u8]) -> bool {
        header.len() >= 8 && &header[..8] == MAGIC
    }
}
