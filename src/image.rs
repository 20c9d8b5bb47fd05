//! Images and image lists.

use log::debug;

use crate::cache::VirtualPixelMethod;
use crate::error::RawError;
use crate::geometry::Geometry;
use crate::limits::Limits;
use crate::pixel::{Colorspace, ImageType, IndexPacket, OPAQUE_OPACITY, PixelPacket, StorageClass};
use crate::quantum::Endian;

/// One frame: geometry, colour metadata and its pixel storage.
///
/// Pixels live in a row-major `Vec<PixelPacket>`. An index channel is kept
/// alongside whenever the image is colormapped or CMYK. A pinged image has
/// geometry but no pixel storage.
#[derive(Clone, Debug, PartialEq)]
pub struct Image {
    columns: u32,
    rows: u32,
    /// Bits per sample the image was read at or should be written at.
    pub depth: u32,
    colorspace: Colorspace,
    /// Whether the opacity channel is meaningful.
    pub matte: bool,
    storage_class: StorageClass,
    pub colormap: Vec<PixelPacket>,
    /// Position of this frame in its source stream.
    pub scene: u32,
    pub image_type: ImageType,
    pub background_color: PixelPacket,
    pub virtual_pixel_method: VirtualPixelMethod,
    /// Region of the source stream this frame was cut from: the stream
    /// width and height plus the extract offset.
    pub page: Geometry,
    pub endian: Endian,
    /// Format tag the image was read as.
    pub magick: String,
    pub filename: String,
    pinged: bool,
    properties: Vec<(String, String)>,
    pixels: Vec<PixelPacket>,
    indexes: Vec<IndexPacket>,
}

impl Image {
    /// A `columns` x `rows` image filled with opaque black.
    pub fn new(columns: u32, rows: u32) -> Result<Self, RawError> {
        Self::with_limits(columns, rows, &Limits::default())
    }

    /// As [`Image::new`], refusing geometry beyond `limits`.
    pub fn with_limits(columns: u32, rows: u32, limits: &Limits) -> Result<Self, RawError> {
        let count = Self::checked_len(columns, rows, limits)?;
        Ok(Self {
            columns,
            rows,
            depth: 8,
            colorspace: Colorspace::Srgb,
            matte: false,
            storage_class: StorageClass::Direct,
            colormap: Vec::new(),
            scene: 0,
            image_type: ImageType::Undefined,
            background_color: PixelPacket::WHITE,
            virtual_pixel_method: VirtualPixelMethod::default(),
            page: Geometry::new(columns, rows),
            endian: Endian::Undefined,
            magick: String::new(),
            filename: String::new(),
            pinged: false,
            properties: Vec::new(),
            pixels: blank_pixels(count)?,
            indexes: Vec::new(),
        })
    }

    /// Geometry-only image, as produced by a ping.
    pub fn pinged(columns: u32, rows: u32) -> Result<Self, RawError> {
        if columns == 0 || rows == 0 {
            return Err(RawError::InvalidGeometry(format!("{columns}x{rows}")));
        }
        let mut image = Self::new(1, 1)?;
        image.columns = columns;
        image.rows = rows;
        image.page = Geometry::new(columns, rows);
        image.pixels = Vec::new();
        image.pinged = true;
        Ok(image)
    }

    fn checked_len(columns: u32, rows: u32, limits: &Limits) -> Result<usize, RawError> {
        if columns == 0 || rows == 0 {
            return Err(RawError::InvalidGeometry(format!("{columns}x{rows}")));
        }
        let bytes = limits.check_frame(
            columns,
            rows,
            core::mem::size_of::<PixelPacket>() + core::mem::size_of::<IndexPacket>(),
        )?;
        debug!("allocating {columns}x{rows} pixel cache ({bytes} bytes)");
        Ok(columns as usize * rows as usize)
    }

    /// A new image with this image's metadata and a fresh opaque black
    /// `columns` x `rows` canvas. Properties, colormap, colorspace and matte
    /// carry over.
    pub fn clone_geometry(&self, columns: u32, rows: u32) -> Result<Self, RawError> {
        self.clone_geometry_with_limits(columns, rows, &Limits::default())
    }

    pub(crate) fn clone_geometry_with_limits(
        &self,
        columns: u32,
        rows: u32,
        limits: &Limits,
    ) -> Result<Self, RawError> {
        let count = Self::checked_len(columns, rows, limits)?;
        let mut image = Self {
            columns,
            rows,
            depth: self.depth,
            colorspace: self.colorspace,
            matte: self.matte,
            storage_class: self.storage_class,
            colormap: self.colormap.clone(),
            scene: self.scene,
            image_type: self.image_type,
            background_color: self.background_color,
            virtual_pixel_method: self.virtual_pixel_method,
            page: Geometry::new(columns, rows),
            endian: self.endian,
            magick: self.magick.clone(),
            filename: self.filename.clone(),
            pinged: false,
            properties: self.properties.clone(),
            pixels: blank_pixels(count)?,
            indexes: Vec::new(),
        };
        image.sync_index_channel();
        Ok(image)
    }

    /// Resize the canvas, discarding pixels. Every pixel becomes opaque black.
    pub fn set_extent(&mut self, columns: u32, rows: u32, limits: &Limits) -> Result<(), RawError> {
        let count = Self::checked_len(columns, rows, limits)?;
        self.columns = columns;
        self.rows = rows;
        self.pinged = false;
        self.pixels = blank_pixels(count)?;
        self.indexes.clear();
        self.sync_index_channel();
        Ok(())
    }

    pub fn columns(&self) -> u32 {
        self.columns
    }

    pub fn rows(&self) -> u32 {
        self.rows
    }

    pub fn colorspace(&self) -> Colorspace {
        self.colorspace
    }

    pub fn is_pinged(&self) -> bool {
        self.pinged
    }

    /// Change how the channels are interpreted. Pixel values are not
    /// converted; see [`crate::transform_colorspace`] for that.
    pub fn set_colorspace(&mut self, colorspace: Colorspace) {
        self.colorspace = colorspace;
        self.sync_index_channel();
    }

    pub fn storage_class(&self) -> StorageClass {
        self.storage_class
    }

    /// Switch between direct and colormapped storage. Switching to
    /// [`StorageClass::Pseudo`] allocates a zeroed index channel.
    pub fn set_storage_class(&mut self, storage_class: StorageClass) {
        self.storage_class = storage_class;
        self.sync_index_channel();
    }

    /// Whether an index channel is present (colormapped or CMYK images).
    pub fn has_indexes(&self) -> bool {
        !self.indexes.is_empty()
    }

    fn needs_indexes(&self) -> bool {
        self.storage_class == StorageClass::Pseudo || self.colorspace == Colorspace::Cmyk
    }

    fn sync_index_channel(&mut self) {
        if self.pinged {
            return;
        }
        if self.needs_indexes() {
            self.indexes.resize(self.pixels.len(), 0);
        } else {
            self.indexes.clear();
        }
    }

    /// Mark whether the opacity channel is meaningful. Pixel values are kept.
    pub fn set_matte(&mut self, matte: bool) {
        self.matte = matte;
    }

    /// Turn on the alpha channel with every pixel fully opaque.
    pub fn set_alpha_opaque(&mut self) {
        self.matte = true;
        for p in &mut self.pixels {
            p.opacity = OPAQUE_OPACITY;
        }
    }

    /// Set a named property, replacing an existing value.
    pub fn set_property(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self.properties.iter_mut().find(|(k, _)| k == name) {
            Some((_, v)) => *v = value,
            None => self.properties.push((name.to_string(), value)),
        }
    }

    pub fn property(&self, name: &str) -> Option<&str> {
        self.properties
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Properties in insertion order.
    pub fn properties(&self) -> impl Iterator<Item = (&str, &str)> {
        self.properties.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// All pixels, row-major. Empty for pinged images.
    pub fn pixels(&self) -> &[PixelPacket] {
        &self.pixels
    }

    pub fn pixels_mut(&mut self) -> &mut [PixelPacket] {
        &mut self.pixels
    }

    /// The index channel, row-major. Empty unless colormapped or CMYK.
    pub fn indexes(&self) -> &[IndexPacket] {
        &self.indexes
    }

    pub fn indexes_mut(&mut self) -> &mut [IndexPacket] {
        &mut self.indexes
    }

    /// Pixels, indexes and colormap borrowed at once.
    pub(crate) fn cache_parts_mut(
        &mut self,
    ) -> (&mut [PixelPacket], &mut [IndexPacket], &[PixelPacket]) {
        (&mut self.pixels, &mut self.indexes, &self.colormap)
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<PixelPacket> {
        if x >= self.columns || y >= self.rows {
            return None;
        }
        self.pixels
            .get(y as usize * self.columns as usize + x as usize)
            .copied()
    }

    /// One row of pixels, or `None` if `y` is out of range or the image is
    /// pinged.
    pub fn row(&self, y: u32) -> Option<&[PixelPacket]> {
        let w = self.columns as usize;
        let start = (y as usize).checked_mul(w)?;
        if y >= self.rows {
            return None;
        }
        self.pixels.get(start..start + w)
    }

    pub fn row_mut(&mut self, y: u32) -> Option<&mut [PixelPacket]> {
        let w = self.columns as usize;
        let start = (y as usize).checked_mul(w)?;
        if y >= self.rows {
            return None;
        }
        self.pixels.get_mut(start..start + w)
    }
}

/// Opaque black pixel storage, or an error when the allocator refuses it.
fn blank_pixels(count: usize) -> Result<Vec<PixelPacket>, RawError> {
    let mut pixels = Vec::new();
    pixels
        .try_reserve_exact(count)
        .map_err(|e| RawError::LimitExceeded(format!("pixel cache of {count} pixels: {e}")))?;
    pixels.resize(count, PixelPacket::BLACK);
    Ok(pixels)
}

/// An owned, ordered sequence of frames.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ImageList {
    frames: Vec<Image>,
}

impl ImageList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, image: Image) {
        self.frames.push(image);
    }

    pub fn first(&self) -> Option<&Image> {
        self.frames.first()
    }

    pub fn get(&self, index: usize) -> Option<&Image> {
        self.frames.get(index)
    }

    pub fn last_mut(&mut self) -> Option<&mut Image> {
        self.frames.last_mut()
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn iter(&self) -> core::slice::Iter<'_, Image> {
        self.frames.iter()
    }

    pub fn iter_mut(&mut self) -> core::slice::IterMut<'_, Image> {
        self.frames.iter_mut()
    }

    pub fn into_vec(self) -> Vec<Image> {
        self.frames
    }
}

impl From<Image> for ImageList {
    fn from(image: Image) -> Self {
        Self {
            frames: vec![image],
        }
    }
}

impl From<Vec<Image>> for ImageList {
    fn from(frames: Vec<Image>) -> Self {
        Self { frames }
    }
}

impl FromIterator<Image> for ImageList {
    fn from_iter<I: IntoIterator<Item = Image>>(iter: I) -> Self {
        Self {
            frames: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for ImageList {
    type Item = Image;
    type IntoIter = std::vec::IntoIter<Image>;

    fn into_iter(self) -> Self::IntoIter {
        self.frames.into_iter()
    }
}

impl<'a> IntoIterator for &'a ImageList {
    type Item = &'a Image;
    type IntoIter = core::slice::Iter<'a, Image>;

    fn into_iter(self) -> Self::IntoIter {
        self.frames.iter()
    }
}
