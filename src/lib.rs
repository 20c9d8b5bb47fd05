//! # zenraw
//!
//! Raw pixel stream codecs built on a bit-exact quantum import/export
//! pipeline.
//!
//! A raw stream carries samples and nothing else: the caller supplies the
//! geometry, sample depth, byte order and channel interleaving. zenraw turns
//! such streams into [`Image`] frames and back.
//!
//! ## Layers
//!
//! - **Quantum engine** ([`quantum`]): packs and unpacks one row of samples
//!   of any depth (1 to 32 bit integers, 16/32/64 bit floats), endianness
//!   and padding into the 16-bit pixel cache.
//! - **Interlace driver** ([`interlace`]): runs the engine over a frame in
//!   None, Line, Plane or Partition layout, with inline cropping through a
//!   one-row virtual canvas.
//! - **Coders** ([`coders`]): BGR, BGRA, BGRO, RGB, RGBA, RGBO, GRAY, CMYK,
//!   CMYKA and farbfeld, looked up through a [`CoderRegistry`].
//! - **Pixel views** ([`ImageView`]): parallel per-row iteration over image
//!   regions.
//!
//! ## Usage
//!
//! ```no_run
//! use zenraw::{CoderRegistry, Geometry, ImageInfo, Interlace, Unstoppable};
//!
//! let registry = CoderRegistry::with_defaults();
//! let data: &[u8] = &[]; // 640x480 BGRA samples
//!
//! let info = ImageInfo::new("BGRA").with_size(Geometry::new(640, 480));
//! let frames = registry.read_blob(&info, data, &Unstoppable)?;
//!
//! let out = ImageInfo::new("RGB").with_interlace(Interlace::Plane);
//! let planar = registry.write_blob(&out, &frames, &Unstoppable)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! Cropping and frame selection use the usual filename syntax:
//!
//! ```no_run
//! use zenraw::{CoderRegistry, FileStore, Geometry, ImageInfo, Unstoppable};
//!
//! let info = ImageInfo::from_spec("bgr:frames.raw[100x100+10+20]")?
//!     .with_size(Geometry::new(640, 480));
//! let frames = CoderRegistry::with_defaults().read_image(&info, &FileStore, &Unstoppable)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Non-Goals
//!
//! - Formats with their own compression or container (PNG, JPEG, WebP, ...)
//! - Color management
//! - Resampling and filtering

#![forbid(unsafe_code)]

mod blob;
mod cache;
mod colorspace;
mod error;
mod geometry;
mod image;
mod info;
mod interop;
mod limits;
mod pixel;
mod registry;
mod view;

pub mod coders;
pub mod interlace;
pub mod quantum;

// Re-exports
pub use blob::{BlobReader, BlobSink, BlobStore, FileStore, MemoryStore, SliceStore};
pub use cache::{AuthenticPixels, RowSource, RowTarget, VirtualPixelMethod};
pub use colorspace::transform_colorspace;
pub use enough::{Stop, StopReason, Unstoppable};
pub use error::{DecodeError, ErrorKind, RawError};
pub use geometry::Geometry;
pub use image::{Image, ImageList};
pub use info::{
    ImageInfo, LOAD_IMAGE_TAG, LOAD_IMAGES_TAG, ProgressMonitor, SAVE_IMAGE_TAG, SAVE_IMAGES_TAG,
};
pub use interlace::Interlace;
#[cfg(feature = "rgb")]
pub use interop::RawPixel;
pub use limits::Limits;
pub use pixel::{
    Colorspace, ImageType, IndexPacket, OPAQUE_OPACITY, PixelLayout, PixelPacket, QUANTUM_DEPTH,
    QUANTUM_RANGE, Quantum, StorageClass, TRANSPARENT_OPACITY, clamp_to_quantum, pixel_intensity,
    quantum_range_for_depth, scale_any_to_quantum, scale_char_to_quantum, scale_long_to_quantum,
    scale_quantum_to_any, scale_quantum_to_char, scale_quantum_to_long, scale_quantum_to_short,
    scale_short_to_quantum,
};
pub use quantum::{Endian, QuantumFormat, QuantumInfo, QuantumType};
pub use registry::{Codec, CoderInfo, CoderRegistry};
pub use view::{ImageView, PixelRow, PixelRowMut};
