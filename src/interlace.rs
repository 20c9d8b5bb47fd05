//! Interlace-scheme driver.
//!
//! Sequences quantum import/export calls for one frame under one of four
//! channel layouts:
//!
//! - **None**: every row holds all channels interleaved.
//! - **Line**: every row is stored once per channel, channel after channel.
//! - **Plane**: the whole frame is stored once per channel.
//! - **Partition**: as Plane, but each channel lives in its own blob named
//!   `<filename><SUFFIX>`.
//!
//! Reads go through a one-row virtual canvas as wide as the stream. Each
//! imported row is copied into the destination at `y - extract.y`, starting
//! from canvas column `extract.x`, so crop windows need not align with the
//! stream. Canvas columns outside the stream read as black.

use std::borrow::Cow;
use std::str::FromStr;

use enough::Stop;
use log::{debug, warn};

use crate::blob::{BlobReader, BlobStore};
use crate::error::RawError;
use crate::image::Image;
use crate::info::{ImageInfo, LOAD_IMAGE_TAG, SAVE_IMAGE_TAG};
use crate::cache::VirtualPixelMethod;
use crate::quantum::{
    ChannelMask, QuantumInfo, QuantumType, export_quantum_pixels, import_quantum_pixels,
};

/// Channel interleaving of a raw stream.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Interlace {
    #[default]
    None,
    Line,
    Plane,
    Partition,
}

impl FromStr for Interlace {
    type Err = RawError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" | "no" | "nointerlace" => Ok(Self::None),
            "line" | "lineinterlace" => Ok(Self::Line),
            "plane" | "planeinterlace" => Ok(Self::Plane),
            "partition" | "partitioninterlace" => Ok(Self::Partition),
            _ => Err(RawError::InvalidOption(format!(
                "unrecognized interlace type `{s}'"
            ))),
        }
    }
}

/// One channel sub-pass of a line, plane or partition layout.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChannelPass {
    pub quantum_type: QuantumType,
    /// Appended to the filename to name the partition blob.
    pub suffix: &'static str,
    /// Only present when the image has an alpha channel.
    pub alpha: bool,
}

impl ChannelPass {
    pub const fn new(quantum_type: QuantumType, suffix: &'static str) -> Self {
        Self {
            quantum_type,
            suffix,
            alpha: false,
        }
    }

    pub const fn alpha(quantum_type: QuantumType, suffix: &'static str) -> Self {
        Self {
            quantum_type,
            suffix,
            alpha: true,
        }
    }
}

/// How a format lays out its channels under each interlace scheme.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChannelPlan {
    /// Interleaved type without alpha.
    pub opaque: QuantumType,
    /// Interleaved type with alpha.
    pub matte: QuantumType,
    pub line: &'static [ChannelPass],
    pub plane: &'static [ChannelPass],
    pub partition: &'static [ChannelPass],
    /// Single-channel formats have no line or plane layout of their own.
    pub single_channel: bool,
}

impl ChannelPlan {
    pub fn interleaved(&self, matte: bool) -> QuantumType {
        if matte { self.matte } else { self.opaque }
    }

    /// The scheme actually used for `requested`.
    pub fn effective(&self, requested: Interlace) -> Interlace {
        match requested {
            Interlace::Line | Interlace::Plane if self.single_channel => {
                warn!("{requested:?} interlace ignored for a single-channel format");
                Interlace::None
            }
            other => other,
        }
    }

    /// Sub-passes of one frame, in stream order.
    pub fn passes(&self, interlace: Interlace, matte: bool) -> Vec<ChannelPass> {
        let table = match interlace {
            Interlace::None => {
                return vec![ChannelPass {
                    quantum_type: self.interleaved(matte),
                    suffix: "",
                    alpha: matte,
                }];
            }
            Interlace::Line => self.line,
            Interlace::Plane => self.plane,
            Interlace::Partition => self.partition,
        };
        table
            .iter()
            .filter(|pass| matte || !pass.alpha)
            .copied()
            .collect()
    }
}

/// Where a frame sits in its stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameLayout {
    /// Width of every stream row, and of the virtual canvas.
    pub stream_width: u32,
    /// Rows per frame in the stream.
    pub stream_height: u32,
    /// Extract offset into the stream.
    pub x: i64,
    pub y: i64,
    /// Header bytes skipped at the start of the stream (and of every
    /// partition blob).
    pub offset: usize,
}

/// Lazily opened partition blobs, kept for the whole call.
pub struct PartitionBlobs<'s> {
    store: &'s dyn BlobStore,
    blobs: Vec<(String, Cow<'s, [u8]>)>,
}

impl<'s> PartitionBlobs<'s> {
    pub fn new(store: &'s dyn BlobStore) -> Self {
        Self {
            store,
            blobs: Vec::new(),
        }
    }

    pub fn get(&mut self, name: &str) -> Result<&[u8], RawError> {
        let position = match self.blobs.iter().position(|(n, _)| n == name) {
            Some(position) => position,
            None => {
                debug!("opening partition blob `{name}'");
                let data = self.store.read(name)?;
                self.blobs.push((name.to_string(), data));
                self.blobs.len() - 1
            }
        };
        Ok(&self.blobs[position].1)
    }
}

/// Plane and partition progress is reported in coarse steps out of this
/// many; one more when there is an alpha pass.
fn coarse_span(matte: bool) -> u64 {
    if matte { 6 } else { 5 }
}

/// Reads one frame.
pub struct FrameReader<'a> {
    pub info: &'a ImageInfo,
    pub quantum: &'a QuantumInfo,
    pub plan: &'a ChannelPlan,
    pub interlace: Interlace,
    pub layout: FrameLayout,
    pub stop: &'a dyn Stop,
    /// Report `Load/Image` progress (first frame only).
    pub report: bool,
}

impl FrameReader<'_> {
    /// Bytes one frame occupies in the main stream. Zero for partition.
    pub fn frame_length(&self, matte: bool) -> Result<usize, RawError> {
        if self.interlace == Interlace::Partition {
            return Ok(0);
        }
        self.plan
            .passes(self.interlace, matte)
            .iter()
            .try_fold(0usize, |total, pass| {
                total
                    .checked_add(self.plane_length(pass.quantum_type)?)
                    .ok_or_else(|| self.too_large())
            })
    }

    /// Bytes one frame of a single quantum type occupies.
    pub fn plane_length(&self, quantum_type: QuantumType) -> Result<usize, RawError> {
        self.row_length(quantum_type)?
            .checked_mul(self.layout.stream_height as usize)
            .ok_or_else(|| self.too_large())
    }

    /// Bytes one stream row of a single quantum type occupies.
    pub fn row_length(&self, quantum_type: QuantumType) -> Result<usize, RawError> {
        self.quantum
            .checked_extent(self.layout.stream_width as usize, quantum_type)
            .ok_or_else(|| self.too_large())
    }

    /// Where scene `scene` of a partition blob starts.
    pub fn partition_skip(&self, scene: u32, quantum_type: QuantumType) -> Result<usize, RawError> {
        (scene as usize)
            .checked_mul(self.plane_length(quantum_type)?)
            .and_then(|skip| skip.checked_add(self.layout.offset))
            .ok_or_else(|| self.too_large())
    }

    fn too_large(&self) -> RawError {
        RawError::DimensionsTooLarge {
            width: self.layout.stream_width,
            height: self.layout.stream_height,
        }
    }

    /// Decode the frame into `image`, which is already sized to the extract
    /// window. `stream` is positioned at the start of the frame.
    ///
    /// On error, rows decoded so far stay in `image`.
    pub fn read(
        &self,
        stream: &mut BlobReader<'_>,
        partitions: &mut PartitionBlobs<'_>,
        image: &mut Image,
    ) -> Result<(), RawError> {
        let mut canvas = image.clone_geometry_with_limits(
            self.layout.stream_width,
            1,
            &self.info.limits,
        )?;
        canvas.virtual_pixel_method = VirtualPixelMethod::Black;
        let passes = self.plan.passes(self.interlace, image.matte);
        debug!(
            "reading {}x{} frame ({:?}, canvas {} wide, extract {:+}{:+})",
            image.columns(),
            image.rows(),
            self.interlace,
            self.layout.stream_width,
            self.layout.x,
            self.layout.y
        );
        let rows = self.layout.stream_height;
        match self.interlace {
            Interlace::None | Interlace::Line => {
                for y in 0..rows {
                    self.stop.check()?;
                    for pass in &passes {
                        let length = self.row_length(pass.quantum_type)?;
                        let bytes = stream.read_stream(length);
                        if bytes.len() != length {
                            return Err(RawError::eof(&self.info.filename));
                        }
                        self.import_row(&mut canvas, image, pass.quantum_type, bytes, y)?;
                    }
                    if self.report {
                        self.info
                            .report(LOAD_IMAGE_TAG, u64::from(y), u64::from(rows))?;
                    }
                }
            }
            Interlace::Plane => {
                for (k, pass) in passes.iter().enumerate() {
                    let length = self.row_length(pass.quantum_type)?;
                    for y in 0..rows {
                        self.stop.check()?;
                        let bytes = stream.read_stream(length);
                        if bytes.len() != length {
                            return Err(RawError::eof(&self.info.filename));
                        }
                        self.import_row(&mut canvas, image, pass.quantum_type, bytes, y)?;
                    }
                    self.coarse_progress(k as u64 + 1, image.matte)?;
                }
                self.finish_coarse_progress(passes.len() as u64, image.matte)?;
            }
            Interlace::Partition => {
                for (k, pass) in passes.iter().enumerate() {
                    let name = format!("{}{}", self.info.filename, pass.suffix);
                    let blob = partitions.get(&name)?;
                    let mut reader = BlobReader::new(blob);
                    let skip = self.partition_skip(image.scene, pass.quantum_type)?;
                    if !reader.discard(skip) {
                        return Err(RawError::eof(&name));
                    }
                    let length = self.row_length(pass.quantum_type)?;
                    for y in 0..rows {
                        self.stop.check()?;
                        let bytes = reader.read_stream(length);
                        if bytes.len() != length {
                            return Err(RawError::eof(&name));
                        }
                        self.import_row(&mut canvas, image, pass.quantum_type, bytes, y)?;
                    }
                    self.coarse_progress(k as u64 + 1, image.matte)?;
                }
                self.finish_coarse_progress(passes.len() as u64, image.matte)?;
            }
        }
        Ok(())
    }

    fn import_row(
        &self,
        canvas: &mut Image,
        image: &mut Image,
        quantum_type: QuantumType,
        bytes: &[u8],
        stream_y: u32,
    ) -> Result<(), RawError> {
        if let Some(mut target) = canvas.row_target(0) {
            import_quantum_pixels(self.quantum, quantum_type, bytes, &mut target)?;
        }
        let dy = i64::from(stream_y).saturating_sub(self.layout.y);
        if dy < 0 || dy >= i64::from(image.rows()) {
            return Ok(());
        }
        copy_channels(canvas, image, self.layout.x, dy, quantum_type.channels())
    }

    fn coarse_progress(&self, step: u64, matte: bool) -> Result<(), RawError> {
        if self.report {
            self.info.report(LOAD_IMAGE_TAG, step, coarse_span(matte))?;
        }
        Ok(())
    }

    fn finish_coarse_progress(&self, done: u64, matte: bool) -> Result<(), RawError> {
        let span = coarse_span(matte);
        for step in done + 1..=span {
            self.coarse_progress(step, matte)?;
        }
        Ok(())
    }
}

/// Copy the `mask` channels of canvas row 0, starting at canvas column `x`,
/// into row `y` of `image`.
fn copy_channels(
    canvas: &Image,
    image: &mut Image,
    x: i64,
    y: i64,
    mask: ChannelMask,
) -> Result<(), RawError> {
    let columns = image.columns() as usize;
    let source = canvas.virtual_pixels(x, 0, columns, 1);
    let source_indexes = if mask.contains(ChannelMask::INDEX) {
        Some(canvas.virtual_indexes(x, 0, columns, 1))
    } else {
        None
    };
    let mut row = image.authentic_pixels(0, y, columns, 1)?;
    for (dst, src) in row.pixels_mut().iter_mut().zip(source.iter()) {
        if mask.contains(ChannelMask::RED) {
            dst.red = src.red;
        }
        if mask.contains(ChannelMask::GREEN) {
            dst.green = src.green;
        }
        if mask.contains(ChannelMask::BLUE) {
            dst.blue = src.blue;
        }
        if mask.contains(ChannelMask::OPACITY) {
            dst.opacity = src.opacity;
        }
    }
    if let Some(indexes) = source_indexes {
        let dst = row.indexes_mut();
        let n = dst.len().min(indexes.len());
        dst[..n].copy_from_slice(&indexes[..n]);
    }
    row.sync();
    Ok(())
}

/// Encoded output of one or more frames: the main stream, plus one buffer per
/// partition suffix.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FrameOutput {
    pub main: Vec<u8>,
    pub partitions: Vec<(&'static str, Vec<u8>)>,
}

impl FrameOutput {
    fn partition_mut(&mut self, suffix: &'static str) -> &mut Vec<u8> {
        let position = match self.partitions.iter().position(|(s, _)| *s == suffix) {
            Some(position) => position,
            None => {
                self.partitions.push((suffix, Vec::new()));
                self.partitions.len() - 1
            }
        };
        &mut self.partitions[position].1
    }
}

/// Writes one frame.
pub struct FrameWriter<'a> {
    pub info: &'a ImageInfo,
    pub quantum: &'a QuantumInfo,
    pub plan: &'a ChannelPlan,
    pub interlace: Interlace,
    pub stop: &'a dyn Stop,
    /// Report `Save/Image` progress.
    pub report: bool,
}

impl FrameWriter<'_> {
    /// Encode `image` and append it to `out`.
    pub fn write(&self, image: &Image, out: &mut FrameOutput) -> Result<(), RawError> {
        let passes = self.plan.passes(self.interlace, image.matte);
        let rows = image.rows();
        let mut buffer = Vec::new();
        match self.interlace {
            Interlace::None | Interlace::Line => {
                for y in 0..rows {
                    self.stop.check()?;
                    for pass in &passes {
                        self.export_row(image, pass.quantum_type, y, &mut buffer)?;
                        out.main.extend_from_slice(&buffer);
                    }
                    if self.report {
                        self.info
                            .report(SAVE_IMAGE_TAG, u64::from(y), u64::from(rows))?;
                    }
                }
            }
            Interlace::Plane | Interlace::Partition => {
                for (k, pass) in passes.iter().enumerate() {
                    let sink = if self.interlace == Interlace::Partition {
                        out.partition_mut(pass.suffix)
                    } else {
                        &mut out.main
                    };
                    for y in 0..rows {
                        self.stop.check()?;
                        self.export_row(image, pass.quantum_type, y, &mut buffer)?;
                        sink.extend_from_slice(&buffer);
                    }
                    self.coarse_progress(k as u64 + 1, image.matte)?;
                }
                for step in passes.len() as u64 + 1..=coarse_span(image.matte) {
                    self.coarse_progress(step, image.matte)?;
                }
            }
        }
        Ok(())
    }

    fn export_row(
        &self,
        image: &Image,
        quantum_type: QuantumType,
        y: u32,
        buffer: &mut Vec<u8>,
    ) -> Result<(), RawError> {
        let source = image.row_source(y).ok_or(RawError::InvalidRegion {
            x: 0,
            y: i64::from(y),
            width: image.columns() as usize,
            height: 1,
        })?;
        buffer.clear();
        buffer.resize(self.quantum.extent(source.pixels.len(), quantum_type), 0);
        let written = export_quantum_pixels(self.quantum, quantum_type, &source, buffer)?;
        buffer.truncate(written);
        Ok(())
    }

    fn coarse_progress(&self, step: u64, matte: bool) -> Result<(), RawError> {
        if self.report {
            self.info.report(SAVE_IMAGE_TAG, step, coarse_span(matte))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LINE: &[ChannelPass] = &[
        ChannelPass::new(QuantumType::Blue, "B"),
        ChannelPass::new(QuantumType::Green, "G"),
        ChannelPass::new(QuantumType::Red, "R"),
        ChannelPass::alpha(QuantumType::Alpha, "A"),
    ];

    const PLAN: ChannelPlan = ChannelPlan {
        opaque: QuantumType::Bgr,
        matte: QuantumType::Bgra,
        line: LINE,
        plane: LINE,
        partition: LINE,
        single_channel: false,
    };

    #[test]
    fn interlace_names() {
        assert_eq!("Plane".parse::<Interlace>().unwrap(), Interlace::Plane);
        assert_eq!("PartitionInterlace".parse::<Interlace>().unwrap(), Interlace::Partition);
        assert!("zigzag".parse::<Interlace>().is_err());
    }

    #[test]
    fn alpha_pass_only_with_matte() {
        assert_eq!(PLAN.passes(Interlace::Line, false).len(), 3);
        assert_eq!(PLAN.passes(Interlace::Line, true).len(), 4);
        let none = PLAN.passes(Interlace::None, true);
        assert_eq!(none.len(), 1);
        assert_eq!(none[0].quantum_type, QuantumType::Bgra);
    }

    #[test]
    fn single_channel_plans_collapse_line_and_plane() {
        let plan = ChannelPlan {
            single_channel: true,
            ..PLAN
        };
        assert_eq!(plan.effective(Interlace::Plane), Interlace::None);
        assert_eq!(plan.effective(Interlace::Partition), Interlace::Partition);
    }

    #[test]
    fn partition_output_is_grouped_by_suffix() {
        let mut out = FrameOutput::default();
        out.partition_mut("B").push(1);
        out.partition_mut("G").push(2);
        out.partition_mut("B").push(3);
        assert_eq!(out.partitions, vec![("B", vec![1, 3]), ("G", vec![2])]);
    }
}
