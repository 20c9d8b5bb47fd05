//! Headerless raw streams: BGR, RGB, GRAY, CMYK and their alpha variants.
//!
//! ## Reading
//!
//! [`ImageInfo::size`] gives the stream geometry (its X offset is a header
//! length skipped first); [`ImageInfo::extract`] crops every frame. With
//! `number_scenes` set, `scene` whole frames are skipped before decoding and
//! at most `number_scenes` frames are returned. Otherwise frames are read
//! until the stream no longer holds another full first row.
//!
//! ## Writing
//!
//! Each frame is normalised on a working copy: converted to the variant's
//! colorspace, given an opaque alpha channel when the variant has one and
//! the image does not, and sampled at [`ImageInfo::depth`]. With `adjoin`
//! every frame is appended to one blob; without it only the first frame is
//! written.

use std::borrow::Cow;

use enough::Stop;
use log::{debug, trace, warn};

use crate::blob::{BlobReader, BlobSink, BlobStore};
use crate::colorspace::transform_colorspace;
use crate::error::{DecodeError, RawError};
use crate::geometry::Geometry;
use crate::image::{Image, ImageList};
use crate::info::{ImageInfo, LOAD_IMAGES_TAG, SAVE_IMAGES_TAG};
use crate::interlace::{
    ChannelPass, ChannelPlan, FrameLayout, FrameOutput, FrameReader, FrameWriter, Interlace,
    PartitionBlobs,
};
use crate::pixel::{Colorspace, StorageClass};
use crate::quantum::{Endian, QuantumInfo, QuantumType, set_quantum_image_type};
use crate::registry::{Codec, CoderInfo};

/// The registered raw formats.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RawVariant {
    Bgr,
    Bgra,
    /// BGR plus an opacity (not alpha) channel.
    Bgro,
    Rgb,
    Rgba,
    Rgbo,
    Gray,
    Cmyk,
    Cmyka,
}

const BGR_LINE: &[ChannelPass] = &[
    ChannelPass::new(QuantumType::Blue, "B"),
    ChannelPass::new(QuantumType::Green, "G"),
    ChannelPass::new(QuantumType::Red, "R"),
    ChannelPass::alpha(QuantumType::Alpha, "A"),
];

const BGR_PLANE: &[ChannelPass] = &[
    ChannelPass::new(QuantumType::Red, "R"),
    ChannelPass::new(QuantumType::Green, "G"),
    ChannelPass::new(QuantumType::Blue, "B"),
    ChannelPass::alpha(QuantumType::Alpha, "A"),
];

const BGRO_LINE: &[ChannelPass] = &[
    ChannelPass::new(QuantumType::Blue, "B"),
    ChannelPass::new(QuantumType::Green, "G"),
    ChannelPass::new(QuantumType::Red, "R"),
    ChannelPass::alpha(QuantumType::Opacity, "O"),
];

const BGRO_PLANE: &[ChannelPass] = &[
    ChannelPass::new(QuantumType::Red, "R"),
    ChannelPass::new(QuantumType::Green, "G"),
    ChannelPass::new(QuantumType::Blue, "B"),
    ChannelPass::alpha(QuantumType::Opacity, "O"),
];

const RGB_PASSES: &[ChannelPass] = BGR_PLANE;
const RGBO_PASSES: &[ChannelPass] = BGRO_PLANE;

const CMYK_PASSES: &[ChannelPass] = &[
    ChannelPass::new(QuantumType::Cyan, "C"),
    ChannelPass::new(QuantumType::Magenta, "M"),
    ChannelPass::new(QuantumType::Yellow, "Y"),
    ChannelPass::new(QuantumType::Black, "K"),
    ChannelPass::alpha(QuantumType::Alpha, "A"),
];

const GRAY_PARTITION: &[ChannelPass] = &[ChannelPass::new(QuantumType::Gray, "")];

const BGR_PLAN: ChannelPlan = ChannelPlan {
    opaque: QuantumType::Bgr,
    matte: QuantumType::Bgra,
    line: BGR_LINE,
    plane: BGR_PLANE,
    partition: BGR_LINE,
    single_channel: false,
};

const BGRO_PLAN: ChannelPlan = ChannelPlan {
    opaque: QuantumType::Bgr,
    matte: QuantumType::Bgro,
    line: BGRO_LINE,
    plane: BGRO_PLANE,
    partition: BGRO_LINE,
    single_channel: false,
};

const RGB_PLAN: ChannelPlan = ChannelPlan {
    opaque: QuantumType::Rgb,
    matte: QuantumType::Rgba,
    line: RGB_PASSES,
    plane: RGB_PASSES,
    partition: RGB_PASSES,
    single_channel: false,
};

const RGBO_PLAN: ChannelPlan = ChannelPlan {
    opaque: QuantumType::Rgb,
    matte: QuantumType::Rgbo,
    line: RGBO_PASSES,
    plane: RGBO_PASSES,
    partition: RGBO_PASSES,
    single_channel: false,
};

const GRAY_PLAN: ChannelPlan = ChannelPlan {
    opaque: QuantumType::Gray,
    matte: QuantumType::GrayAlpha,
    line: &[],
    plane: &[],
    partition: GRAY_PARTITION,
    single_channel: true,
};

const CMYK_PLAN: ChannelPlan = ChannelPlan {
    opaque: QuantumType::Cmyk,
    matte: QuantumType::Cmyka,
    line: CMYK_PASSES,
    plane: CMYK_PASSES,
    partition: CMYK_PASSES,
    single_channel: false,
};

impl RawVariant {
    pub const ALL: [RawVariant; 9] = [
        Self::Bgr,
        Self::Bgra,
        Self::Bgro,
        Self::Rgb,
        Self::Rgba,
        Self::Rgbo,
        Self::Gray,
        Self::Cmyk,
        Self::Cmyka,
    ];

    pub fn tag(self) -> &'static str {
        match self {
            Self::Bgr => "BGR",
            Self::Bgra => "BGRA",
            Self::Bgro => "BGRO",
            Self::Rgb => "RGB",
            Self::Rgba => "RGBA",
            Self::Rgbo => "RGBO",
            Self::Gray => "GRAY",
            Self::Cmyk => "CMYK",
            Self::Cmyka => "CMYKA",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|v| v.tag().eq_ignore_ascii_case(tag))
    }

    fn description(self) -> &'static str {
        match self {
            Self::Bgr => "Raw blue, green, and red samples",
            Self::Bgra => "Raw blue, green, red, and alpha samples",
            Self::Bgro => "Raw blue, green, red, and opacity samples",
            Self::Rgb => "Raw red, green, and blue samples",
            Self::Rgba => "Raw red, green, blue, and alpha samples",
            Self::Rgbo => "Raw red, green, blue, and opacity samples",
            Self::Gray => "Raw gray samples",
            Self::Cmyk => "Raw cyan, magenta, yellow, and black samples",
            Self::Cmyka => "Raw cyan, magenta, yellow, black, and alpha samples",
        }
    }

    /// Whether frames carry an alpha (or opacity) channel.
    pub fn matte(self) -> bool {
        matches!(
            self,
            Self::Bgra | Self::Bgro | Self::Rgba | Self::Rgbo | Self::Cmyka
        )
    }

    pub fn plan(self) -> &'static ChannelPlan {
        match self {
            Self::Bgr | Self::Bgra => &BGR_PLAN,
            Self::Bgro => &BGRO_PLAN,
            Self::Rgb | Self::Rgba => &RGB_PLAN,
            Self::Rgbo => &RGBO_PLAN,
            Self::Gray => &GRAY_PLAN,
            Self::Cmyk | Self::Cmyka => &CMYK_PLAN,
        }
    }

    pub fn colorspace(self) -> Colorspace {
        match self {
            Self::Gray => Colorspace::Gray,
            Self::Cmyk | Self::Cmyka => Colorspace::Cmyk,
            _ => Colorspace::Srgb,
        }
    }
}

/// Codec for one [`RawVariant`].
#[derive(Clone, Debug)]
pub struct RawCoder {
    variant: RawVariant,
    info: CoderInfo,
}

impl RawCoder {
    pub fn new(variant: RawVariant) -> Self {
        let mut info = CoderInfo::new(variant.tag(), variant.description());
        info.raw = true;
        info.endian_support = true;
        Self { variant, info }
    }

    pub fn variant(&self) -> RawVariant {
        self.variant
    }

    /// A blank frame of the extract geometry, typed for this variant. Pinged
    /// frames carry no pixel storage.
    fn frame(
        &self,
        info: &ImageInfo,
        extract: Geometry,
        scene: u32,
        ping: bool,
    ) -> Result<Image, RawError> {
        let mut image = if ping {
            Image::pinged(extract.width, extract.height)?
        } else {
            Image::with_limits(extract.width, extract.height, &info.limits)?
        };
        image.depth = info.depth;
        image.endian = info.endian;
        image.matte = self.variant.matte();
        image.set_colorspace(self.variant.colorspace());
        image.scene = scene;
        image.page = extract;
        image.magick = self.info.name.clone();
        image.filename = info.filename.clone();
        Ok(image)
    }

    fn read_frames(
        &self,
        info: &ImageInfo,
        store: &dyn BlobStore,
        stop: &dyn Stop,
        list: &mut ImageList,
    ) -> Result<(), (RawError, Option<Image>)> {
        let size = match info.size {
            Some(size) if size.width > 0 && size.height > 0 => size,
            _ => return Err((RawError::MissingImageSize, None)),
        };
        info.limits.check(size.width, size.height).map_err(|e| (e, None))?;
        let extract = extract_window(size, info.extract);
        let plan = self.variant.plan();
        let interlace = plan.effective(info.interlace);
        let matte = self.variant.matte();
        let offset = usize::try_from(size.x).unwrap_or(0);

        let first_scene = if info.number_scenes != 0 { info.scene } else { 0 };
        let template = self
            .frame(info, extract, first_scene, true)
            .map_err(|e| (e, None))?;
        let quantum = QuantumInfo::new(info, &template).map_err(|e| (e, None))?;
        let layout = FrameLayout {
            stream_width: size.width,
            stream_height: size.height,
            x: extract.x,
            y: extract.y,
            offset,
        };
        let mut reader = FrameReader {
            info,
            quantum: &quantum,
            plan,
            interlace,
            layout,
            stop,
            report: true,
        };
        let passes = plan.passes(interlace, matte);
        let Some(first_pass) = passes.first().copied() else {
            return Err((RawError::UnsupportedVariant(self.info.name.clone()), None));
        };
        let frame_length = reader.frame_length(matte).map_err(|e| (e, None))?;
        let first_row = reader
            .row_length(first_pass.quantum_type)
            .map_err(|e| (e, None))?;
        debug!(
            "{} stream {}x{}{:+} ({interlace:?}, {frame_length} bytes per frame), extract {}",
            self.info.name, size.width, size.height, size.x, extract
        );

        let main = if interlace == Interlace::Partition {
            Cow::Borrowed(&[][..])
        } else {
            store.read(&info.filename).map_err(|e| (e, None))?
        };
        let mut stream = BlobReader::new(&main);
        let mut partitions = PartitionBlobs::new(store);
        if interlace == Interlace::Partition {
            let name = format!("{}{}", info.filename, first_pass.suffix);
            let start = reader
                .partition_skip(first_scene, first_pass.quantum_type)
                .map_err(|e| (e, None))?;
            let blob = partitions.get(&name).map_err(|e| (e, None))?;
            if blob.len().saturating_sub(start) < first_row {
                return Err((RawError::eof(&name), None));
            }
        } else {
            if !stream.discard(offset) {
                return Err((RawError::eof(&info.filename), None));
            }
            if info.number_scenes != 0 && info.scene > 0 {
                debug!("skipping {} frames", info.scene);
                let skip = (info.scene as usize)
                    .checked_mul(frame_length)
                    .ok_or(RawError::DimensionsTooLarge {
                        width: size.width,
                        height: size.height,
                    })
                    .map_err(|e| (e, None))?;
                if !stream.discard(skip) {
                    return Err((RawError::eof(&info.filename), None));
                }
            }
            if stream.remaining() < first_row {
                return Err((RawError::eof(&info.filename), None));
            }
        }
        let mut image = self
            .frame(info, extract, first_scene, info.ping)
            .map_err(|e| (e, None))?;

        loop {
            if info.ping {
                if interlace != Interlace::Partition && !stream.discard(frame_length) {
                    return Err((RawError::eof(&info.filename), Some(image)));
                }
            } else if let Err(e) = reader.read(&mut stream, &mut partitions, &mut image) {
                return Err((e, Some(image)));
            }
            if !info.ping {
                set_quantum_image_type(&mut image, plan.interleaved(matte));
            }
            let scene = image.scene;
            list.push(image);
            reader.report = false;

            if info.number_scenes != 0
                && scene >= info.scene.saturating_add(info.number_scenes - 1)
            {
                break;
            }
            let more = if interlace == Interlace::Partition {
                let name = format!("{}{}", info.filename, first_pass.suffix);
                let needed = reader
                    .partition_skip(scene.saturating_add(1), first_pass.quantum_type)
                    .ok()
                    .and_then(|start| start.checked_add(first_row));
                match (partitions.get(&name), needed) {
                    (Ok(blob), Some(needed)) => blob.len() >= needed,
                    _ => false,
                }
            } else {
                stream.remaining() >= first_row
            };
            if !more {
                break;
            }
            if let Err(e) = info.report(LOAD_IMAGES_TAG, stream.tell() as u64, stream.len() as u64)
            {
                return Err((e, None));
            }
            if let Err(e) = stop.check() {
                return Err((e.into(), None));
            }
            image = self
                .frame(info, extract, scene + 1, info.ping)
                .map_err(|e| (e, None))?;
        }
        Ok(())
    }

    /// Working copy of `image` in this variant's colorspace, alpha and depth.
    fn normalise<'a>(&self, info: &ImageInfo, image: &'a Image) -> Cow<'a, Image> {
        let target = self.variant.colorspace();
        let matte = self.variant.matte();
        let converted = image.colorspace() != target
            && !(target == Colorspace::Srgb && image.colorspace().is_rgb_compatible());
        let unchanged = !converted
            && image.storage_class() == StorageClass::Direct
            && image.matte == matte
            && image.depth == info.depth
            && (info.endian == Endian::Undefined || image.endian == info.endian);
        if unchanged {
            return Cow::Borrowed(image);
        }
        let mut frame = image.clone();
        if frame.storage_class() == StorageClass::Pseudo {
            let colormap = core::mem::take(&mut frame.colormap);
            let indexes = frame.indexes().to_vec();
            for (pixel, index) in frame.pixels_mut().iter_mut().zip(indexes) {
                if let Some(color) = colormap.get(usize::from(index)) {
                    *pixel = *color;
                }
            }
            frame.colormap = colormap;
            frame.set_storage_class(StorageClass::Direct);
        }
        if converted {
            debug!("converting {:?} to {target:?}", frame.colorspace());
            transform_colorspace(&mut frame, target);
        }
        if matte && !frame.matte {
            frame.set_alpha_opaque();
        }
        frame.matte = matte;
        frame.depth = info.depth;
        if info.endian != Endian::Undefined {
            frame.endian = info.endian;
        }
        Cow::Owned(frame)
    }
}

/// The crop window: `extract` where given, the whole stream otherwise.
fn extract_window(size: Geometry, extract: Option<Geometry>) -> Geometry {
    let Some(extract) = extract else {
        return Geometry::new(size.width, size.height);
    };
    let width = if extract.has_width && extract.width > 0 {
        extract.width
    } else {
        size.width
    };
    let height = if extract.has_height && extract.height > 0 {
        extract.height
    } else {
        size.height
    };
    Geometry::with_offset(width, height, extract.x, extract.y)
}

impl Codec for RawCoder {
    fn info(&self) -> &CoderInfo {
        &self.info
    }

    fn decode(
        &self,
        info: &ImageInfo,
        store: &dyn BlobStore,
        stop: &dyn Stop,
    ) -> Result<ImageList, DecodeError> {
        trace!("decoding {} `{}'", self.info.name, info.filename);
        let mut list = ImageList::new();
        match self.read_frames(info, store, stop, &mut list) {
            Ok(()) => Ok(list),
            Err((error, current)) => {
                if let Some(image) = current {
                    list.push(image);
                }
                warn!(
                    "{} `{}': {error} after {} frame(s)",
                    self.info.name,
                    info.filename,
                    list.len()
                );
                Err(DecodeError {
                    error,
                    partial: list,
                })
            }
        }
    }

    fn encode(
        &self,
        info: &ImageInfo,
        images: &ImageList,
        sink: &mut dyn BlobSink,
        stop: &dyn Stop,
    ) -> Result<(), RawError> {
        trace!("encoding {} `{}'", self.info.name, info.filename);
        if images.is_empty() {
            return Err(RawError::InvalidOption("no images to write".into()));
        }
        let plan = self.variant.plan();
        let interlace = plan.effective(info.interlace);
        let count = if info.adjoin { images.len() } else { 1 };
        let mut out = FrameOutput::default();

        for (index, image) in images.iter().take(count).enumerate() {
            stop.check()?;
            if image.is_pinged() {
                return Err(RawError::InvalidRegion {
                    x: 0,
                    y: 0,
                    width: image.columns() as usize,
                    height: image.rows() as usize,
                });
            }
            let frame = self.normalise(info, image);
            let frame = &*frame;
            let quantum = QuantumInfo::new(info, frame)?;
            let writer = FrameWriter {
                info,
                quantum: &quantum,
                plan,
                interlace,
                stop,
                report: index == 0,
            };
            writer.write(frame, &mut out)?;
            if count > 1 {
                info.report(SAVE_IMAGES_TAG, index as u64, count as u64)?;
            }
        }

        if interlace == Interlace::Partition {
            for (suffix, data) in &out.partitions {
                sink.write(&format!("{}{suffix}", info.filename), data)?;
            }
        } else {
            sink.write(&info.filename, &out.main)?;
        }
        Ok(())
    }
}
