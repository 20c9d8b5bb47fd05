//! Pixel cache view: virtual (read-only, edge-extended) and authentic
//! (read-write, commit on sync) windows onto an image's pixels.

use std::borrow::Cow;
use std::str::FromStr;

use crate::error::RawError;
use crate::image::Image;
use crate::pixel::{Colorspace, IndexPacket, PixelPacket, QUANTUM_RANGE, StorageClass};

/// What a virtual read returns for coordinates outside the canvas.
#[non_exhaustive]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum VirtualPixelMethod {
    /// The image's background colour.
    Background,
    /// Opaque black.
    Black,
    /// Nearest edge pixel.
    #[default]
    Edge,
    /// Opaque mid gray.
    Gray,
    /// Reflect at the edges.
    Mirror,
    /// Repeat the image.
    Tile,
    /// Fully transparent black.
    Transparent,
    /// Opaque white.
    White,
}

impl FromStr for VirtualPixelMethod {
    type Err = RawError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "background" => Ok(Self::Background),
            "black" => Ok(Self::Black),
            "edge" => Ok(Self::Edge),
            "gray" | "grey" => Ok(Self::Gray),
            "mirror" => Ok(Self::Mirror),
            "tile" => Ok(Self::Tile),
            "transparent" => Ok(Self::Transparent),
            "white" => Ok(Self::White),
            _ => Err(RawError::InvalidOption(format!(
                "unrecognized virtual pixel method `{s}'"
            ))),
        }
    }
}

impl VirtualPixelMethod {
    /// Map a coordinate into `0..extent`, or `None` when the method paints a
    /// constant outside the canvas.
    fn locate(self, v: i64, extent: u32) -> Option<usize> {
        let n = i64::from(extent);
        if (0..n).contains(&v) {
            return Some(v as usize);
        }
        match self {
            Self::Edge => Some(v.clamp(0, n - 1) as usize),
            Self::Tile => Some(v.rem_euclid(n) as usize),
            Self::Mirror => {
                let m = v.rem_euclid(2 * n);
                Some(if m >= n { 2 * n - 1 - m } else { m } as usize)
            }
            _ => None,
        }
    }

    fn constant(self, background: PixelPacket) -> PixelPacket {
        match self {
            Self::Background => background,
            Self::Gray => PixelPacket::rgb(QUANTUM_RANGE / 2, QUANTUM_RANGE / 2, QUANTUM_RANGE / 2),
            Self::White => PixelPacket::WHITE,
            Self::Transparent => PixelPacket::TRANSPARENT,
            _ => PixelPacket::BLACK,
        }
    }
}

/// A read-only row handed to the export engine.
#[derive(Clone, Copy, Debug)]
pub struct RowSource<'a> {
    pub pixels: &'a [PixelPacket],
    /// Index (or black) channel; `None` for direct RGB images.
    pub indexes: Option<&'a [IndexPacket]>,
    pub colormap: &'a [PixelPacket],
    pub colorspace: Colorspace,
    pub storage_class: StorageClass,
}

/// A writable row handed to the import engine.
#[derive(Debug)]
pub struct RowTarget<'a> {
    pub pixels: &'a mut [PixelPacket],
    pub indexes: Option<&'a mut [IndexPacket]>,
    pub colormap: &'a [PixelPacket],
    pub colorspace: Colorspace,
    pub storage_class: StorageClass,
}

impl Image {
    /// Read a `columns` x `rows` window at (`x`, `y`), which may extend past
    /// the canvas. Outside pixels follow [`Image::virtual_pixel_method`].
    ///
    /// Borrowed when the window is contiguous in storage (one in-canvas row
    /// segment, or whole in-canvas rows).
    pub fn virtual_pixels(
        &self,
        x: i64,
        y: i64,
        columns: usize,
        rows: usize,
    ) -> Cow<'_, [PixelPacket]> {
        if self.is_pinged() {
            return Cow::Owned(vec![self.background_color; columns * rows]);
        }
        if let Some(range) = self.contiguous(x, y, columns, rows) {
            return Cow::Borrowed(&self.pixels()[range]);
        }
        let method = self.virtual_pixel_method;
        let fill = method.constant(self.background_color);
        let mut out = Vec::with_capacity(columns * rows);
        for j in 0..rows as i64 {
            let sy = method.locate(y.saturating_add(j), self.rows());
            for i in 0..columns as i64 {
                let value = match (method.locate(x.saturating_add(i), self.columns()), sy) {
                    (Some(sx), Some(sy)) => self
                        .pixels()
                        .get(sy * self.columns() as usize + sx)
                        .copied()
                        .unwrap_or(fill),
                    _ => fill,
                };
                out.push(value);
            }
        }
        Cow::Owned(out)
    }

    /// Index channel counterpart of [`Image::virtual_pixels`]. Outside
    /// constant-filled regions read as index 0; images without an index
    /// channel read as all zero.
    pub fn virtual_indexes(
        &self,
        x: i64,
        y: i64,
        columns: usize,
        rows: usize,
    ) -> Cow<'_, [IndexPacket]> {
        if !self.has_indexes() {
            return Cow::Owned(vec![0; columns * rows]);
        }
        if let Some(range) = self.contiguous(x, y, columns, rows) {
            return Cow::Borrowed(&self.indexes()[range]);
        }
        let method = self.virtual_pixel_method;
        let mut out = Vec::with_capacity(columns * rows);
        for j in 0..rows as i64 {
            let sy = method.locate(y.saturating_add(j), self.rows());
            for i in 0..columns as i64 {
                let value = match (method.locate(x.saturating_add(i), self.columns()), sy) {
                    (Some(sx), Some(sy)) => self
                        .indexes()
                        .get(sy * self.columns() as usize + sx)
                        .copied()
                        .unwrap_or(0),
                    _ => 0,
                };
                out.push(value);
            }
        }
        Cow::Owned(out)
    }

    fn contiguous(
        &self,
        x: i64,
        y: i64,
        columns: usize,
        rows: usize,
    ) -> Option<core::ops::Range<usize>> {
        if self.is_pinged() || columns == 0 || rows == 0 {
            return None;
        }
        let (x, y) = (usize::try_from(x).ok()?, usize::try_from(y).ok()?);
        let width = self.columns() as usize;
        if y.checked_add(rows)? > self.rows() as usize || x.checked_add(columns)? > width {
            return None;
        }
        if rows == 1 || (x == 0 && columns == width) {
            let start = y * width + x;
            return Some(start..start + columns * rows);
        }
        None
    }

    /// A read-only row of the canvas for the export engine.
    pub fn row_source(&self, y: u32) -> Option<RowSource<'_>> {
        let pixels = self.row(y)?;
        let width = self.columns() as usize;
        let start = y as usize * width;
        let indexes = if self.has_indexes() {
            self.indexes().get(start..start + width)
        } else {
            None
        };
        Some(RowSource {
            pixels,
            indexes,
            colormap: &self.colormap,
            colorspace: self.colorspace(),
            storage_class: self.storage_class(),
        })
    }

    /// A writable row of the canvas for the import engine.
    pub fn row_target(&mut self, y: u32) -> Option<RowTarget<'_>> {
        if y >= self.rows() || self.is_pinged() {
            return None;
        }
        let width = self.columns() as usize;
        let start = y as usize * width;
        let colorspace = self.colorspace();
        let storage_class = self.storage_class();
        let (pixels, indexes, colormap) = self.cache_parts_mut();
        let indexes = if indexes.is_empty() {
            None
        } else {
            indexes.get_mut(start..start + width)
        };
        Some(RowTarget {
            pixels: pixels.get_mut(start..start + width)?,
            indexes,
            colormap,
            colorspace,
            storage_class,
        })
    }

    /// Open a writable window loaded with the current pixels. Changes are
    /// committed by [`AuthenticPixels::sync`].
    pub fn authentic_pixels(
        &mut self,
        x: i64,
        y: i64,
        columns: usize,
        rows: usize,
    ) -> Result<AuthenticPixels<'_>, RawError> {
        let (x, y) = self.check_region(x, y, columns, rows)?;
        let width = self.columns() as usize;
        let mut pixels = Vec::with_capacity(columns * rows);
        let mut indexes = Vec::new();
        for j in y..y + rows {
            let start = j * width + x;
            pixels.extend_from_slice(&self.pixels()[start..start + columns]);
            if self.has_indexes() {
                indexes.extend_from_slice(&self.indexes()[start..start + columns]);
            }
        }
        Ok(AuthenticPixels {
            image: self,
            x,
            y,
            columns,
            rows,
            pixels,
            indexes,
        })
    }

    /// Open a writable window without loading it: it starts opaque black
    /// with zero indexes and replaces the region on sync.
    pub fn queue_authentic_pixels(
        &mut self,
        x: i64,
        y: i64,
        columns: usize,
        rows: usize,
    ) -> Result<AuthenticPixels<'_>, RawError> {
        let (x, y) = self.check_region(x, y, columns, rows)?;
        let indexes = if self.has_indexes() {
            vec![0; columns * rows]
        } else {
            Vec::new()
        };
        Ok(AuthenticPixels {
            image: self,
            x,
            y,
            columns,
            rows,
            pixels: vec![PixelPacket::BLACK; columns * rows],
            indexes,
        })
    }

    fn check_region(
        &self,
        x: i64,
        y: i64,
        columns: usize,
        rows: usize,
    ) -> Result<(usize, usize), RawError> {
        let inside = !self.is_pinged()
            && columns > 0
            && rows > 0
            && x >= 0
            && y >= 0
            && (x as u64).saturating_add(columns as u64) <= u64::from(self.columns())
            && (y as u64).saturating_add(rows as u64) <= u64::from(self.rows());
        if !inside {
            return Err(RawError::InvalidRegion {
                x,
                y,
                width: columns,
                height: rows,
            });
        }
        Ok((x as usize, y as usize))
    }
}

/// A staged, writable region of an image.
///
/// Dropping it without [`AuthenticPixels::sync`] discards the changes.
#[derive(Debug)]
pub struct AuthenticPixels<'a> {
    image: &'a mut Image,
    x: usize,
    y: usize,
    columns: usize,
    rows: usize,
    pixels: Vec<PixelPacket>,
    indexes: Vec<IndexPacket>,
}

impl AuthenticPixels<'_> {
    pub fn columns(&self) -> usize {
        self.columns
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn pixels(&self) -> &[PixelPacket] {
        &self.pixels
    }

    pub fn pixels_mut(&mut self) -> &mut [PixelPacket] {
        &mut self.pixels
    }

    /// Staged index channel; empty when the image has none.
    pub fn indexes_mut(&mut self) -> &mut [IndexPacket] {
        &mut self.indexes
    }

    /// Commit the staged region to the image.
    pub fn sync(self) {
        let width = self.image.columns() as usize;
        let has_indexes = !self.indexes.is_empty();
        let (pixels, indexes, _) = self.image.cache_parts_mut();
        for j in 0..self.rows {
            let dst = (self.y + j) * width + self.x;
            let src = j * self.columns;
            pixels[dst..dst + self.columns].copy_from_slice(&self.pixels[src..src + self.columns]);
            if has_indexes {
                indexes[dst..dst + self.columns]
                    .copy_from_slice(&self.indexes[src..src + self.columns]);
            }
        }
    }
}
