//! Parallel row iterators over a region of an image.
//!
//! Rows of the region are handed to a callback on a rayon pool, each row
//! borrowed by exactly one worker. Returning `false` from the callback (or
//! from the progress monitor) clears a shared status flag; rows that have
//! not started yet are then skipped, rows already running finish. Progress
//! is counted under a mutex, so every row is counted once but the order of
//! reports is unspecified.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use log::debug;
use rayon::prelude::*;

use crate::error::RawError;
use crate::image::Image;
use crate::info::ProgressMonitor;
use crate::pixel::{IndexPacket, PixelPacket};

/// One read-only row of a view.
#[derive(Clone, Copy, Debug)]
pub struct PixelRow<'a> {
    /// Image coordinates of the first pixel.
    pub x: i64,
    pub y: i64,
    pub pixels: &'a [PixelPacket],
    /// Empty when the image has no index channel.
    pub indexes: &'a [IndexPacket],
}

/// One writable row of a view.
#[derive(Debug)]
pub struct PixelRowMut<'a> {
    pub x: i64,
    pub y: i64,
    pub pixels: &'a mut [PixelPacket],
    pub indexes: &'a mut [IndexPacket],
}

/// A rectangular region plus iteration settings.
///
/// The same view can drive several images: [`ImageView::transfer`] reads the
/// region from one image and writes the same region of another.
#[derive(Clone)]
pub struct ImageView {
    x: i64,
    y: i64,
    width: usize,
    height: usize,
    description: &'static str,
    workers: Option<usize>,
    monitor: Option<Arc<dyn ProgressMonitor>>,
}

impl core::fmt::Debug for ImageView {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ImageView")
            .field("x", &self.x)
            .field("y", &self.y)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("description", &self.description)
            .field("workers", &self.workers)
            .field("monitor", &self.monitor.is_some())
            .finish()
    }
}

struct Status<'a> {
    running: AtomicBool,
    done: Mutex<u64>,
    total: u64,
    description: &'static str,
    monitor: Option<&'a dyn ProgressMonitor>,
}

impl Status<'_> {
    fn running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    fn row_finished(&self, ok: bool) {
        if !ok {
            self.running.store(false, Ordering::Release);
        }
        if let Some(monitor) = self.monitor {
            let mut done = self.done.lock().unwrap_or_else(|e| e.into_inner());
            *done += 1;
            if !monitor.progress(self.description, *done, self.total) {
                self.running.store(false, Ordering::Release);
            }
        }
    }
}

impl ImageView {
    /// A view of the whole of `image`.
    pub fn new(image: &Image) -> Self {
        Self::region(0, 0, image.columns() as usize, image.rows() as usize)
    }

    /// A `width` x `height` view at (`x`, `y`).
    pub fn region(x: i64, y: i64, width: usize, height: usize) -> Self {
        Self {
            x,
            y,
            width,
            height,
            description: "ImageView",
            workers: None,
            monitor: None,
        }
    }

    /// Progress tag passed to the monitor.
    pub fn with_description(mut self, description: &'static str) -> Self {
        self.description = description;
        self
    }

    /// Run on a dedicated pool of `workers` threads instead of the global
    /// pool.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = Some(workers);
        self
    }

    pub fn with_monitor(mut self, monitor: impl ProgressMonitor + 'static) -> Self {
        self.monitor = Some(Arc::new(monitor));
        self
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    fn status(&self) -> Status<'_> {
        Status {
            running: AtomicBool::new(true),
            done: Mutex::new(0),
            total: self.height as u64,
            description: self.description,
            monitor: self.monitor.as_deref(),
        }
    }

    fn run<R: Send>(&self, job: impl FnOnce() -> R + Send) -> Result<R, RawError> {
        match self.workers {
            Some(workers) => {
                let pool = rayon::ThreadPoolBuilder::new()
                    .num_threads(workers)
                    .build()
                    .map_err(|e| RawError::Delegate(format!("failed to build thread pool: {e}")))?;
                Ok(pool.install(job))
            }
            None => Ok(job()),
        }
    }

    /// The region as whole-row storage offsets of `image`, when it lies
    /// inside the canvas.
    fn bounds(&self, image: &Image) -> Result<(usize, usize), RawError> {
        let inside = !image.is_pinged()
            && self.x >= 0
            && self.y >= 0
            && (self.x as u64).saturating_add(self.width as u64) <= u64::from(image.columns())
            && (self.y as u64).saturating_add(self.height as u64) <= u64::from(image.rows());
        if !inside {
            return Err(RawError::InvalidRegion {
                x: self.x,
                y: self.y,
                width: self.width,
                height: self.height,
            });
        }
        Ok((self.x as usize, self.y as usize))
    }

    /// Read every row. `Ok(false)` when the callback or monitor stopped the
    /// iteration early.
    pub fn get<F>(&self, image: &Image, f: F) -> Result<bool, RawError>
    where
        F: Fn(&PixelRow<'_>) -> bool + Sync,
    {
        let (x, y) = self.bounds(image)?;
        let stride = image.columns() as usize;
        let status = self.status();
        debug!("{}: get {}x{}+{x}+{y}", self.description, self.width, self.height);
        self.run(|| {
            (0..self.height).into_par_iter().for_each(|j| {
                if !status.running() {
                    return;
                }
                let start = (y + j) * stride + x;
                let row = PixelRow {
                    x: x as i64,
                    y: (y + j) as i64,
                    pixels: &image.pixels()[start..start + self.width],
                    indexes: image
                        .indexes()
                        .get(start..start + self.width)
                        .unwrap_or_default(),
                };
                status.row_finished(f(&row));
            });
        })?;
        Ok(status.running())
    }

    /// Write every row without reading it: rows start opaque black with
    /// zero indexes.
    pub fn set<F>(&self, image: &mut Image, f: F) -> Result<bool, RawError>
    where
        F: Fn(&mut PixelRowMut<'_>) -> bool + Sync,
    {
        self.for_each_row_mut(image, true, f)
    }

    /// Read, modify and write back every row.
    pub fn update<F>(&self, image: &mut Image, f: F) -> Result<bool, RawError>
    where
        F: Fn(&mut PixelRowMut<'_>) -> bool + Sync,
    {
        self.for_each_row_mut(image, false, f)
    }

    /// Read each row of the region from `source` and write the same row of
    /// `destination`. The source region may extend past its canvas; the
    /// missing pixels follow the source's virtual pixel method.
    pub fn transfer<F>(&self, source: &Image, destination: &mut Image, f: F) -> Result<bool, RawError>
    where
        F: Fn(&PixelRow<'_>, &mut PixelRowMut<'_>) -> bool + Sync,
    {
        self.for_each_row_mut(destination, false, |dst| {
            let pixels = source.virtual_pixels(dst.x, dst.y, self.width, 1);
            let indexes = source.virtual_indexes(dst.x, dst.y, self.width, 1);
            let src = PixelRow {
                x: dst.x,
                y: dst.y,
                pixels: &pixels,
                indexes: if source.has_indexes() { &indexes[..] } else { &[] },
            };
            f(&src, dst)
        })
    }

    /// As [`ImageView::transfer`], with a second read-only `duplex` input.
    pub fn duplex_transfer<F>(
        &self,
        source: &Image,
        duplex: &Image,
        destination: &mut Image,
        f: F,
    ) -> Result<bool, RawError>
    where
        F: Fn(&PixelRow<'_>, &PixelRow<'_>, &mut PixelRowMut<'_>) -> bool + Sync,
    {
        self.for_each_row_mut(destination, false, |dst| {
            let pixels = source.virtual_pixels(dst.x, dst.y, self.width, 1);
            let duplex_pixels = duplex.virtual_pixels(dst.x, dst.y, self.width, 1);
            let src = PixelRow {
                x: dst.x,
                y: dst.y,
                pixels: &pixels,
                indexes: &[],
            };
            let dup = PixelRow {
                x: dst.x,
                y: dst.y,
                pixels: &duplex_pixels,
                indexes: &[],
            };
            f(&src, &dup, dst)
        })
    }

    fn for_each_row_mut<F>(&self, image: &mut Image, queue: bool, f: F) -> Result<bool, RawError>
    where
        F: Fn(&mut PixelRowMut<'_>) -> bool + Sync,
    {
        let (x, y) = self.bounds(image)?;
        let stride = image.columns() as usize;
        let (width, height) = (self.width, self.height);
        let status = self.status();
        debug!(
            "{}: {} {width}x{height}+{x}+{y}",
            self.description,
            if queue { "set" } else { "update" }
        );
        let (pixels, indexes, _) = image.cache_parts_mut();
        let rows = &mut pixels[y * stride..(y + height) * stride];
        let index_rows: Vec<&mut [IndexPacket]> = if indexes.is_empty() {
            (0..height).map(|_| <&mut [IndexPacket]>::default()).collect()
        } else {
            indexes[y * stride..(y + height) * stride]
                .chunks_mut(stride)
                .map(|row| &mut row[x..x + width])
                .collect()
        };
        self.run(|| {
            rows.par_chunks_mut(stride)
                .zip(index_rows.into_par_iter())
                .enumerate()
                .for_each(|(j, (row, index_row))| {
                    if !status.running() {
                        return;
                    }
                    let pixels = &mut row[x..x + width];
                    if queue {
                        pixels.fill(PixelPacket::BLACK);
                        index_row.fill(0);
                    }
                    let mut view = PixelRowMut {
                        x: x as i64,
                        y: (y + j) as i64,
                        pixels,
                        indexes: index_row,
                    };
                    status.row_finished(f(&mut view));
                });
        })?;
        Ok(status.running())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn gradient(columns: u32, rows: u32) -> Image {
        let mut image = Image::new(columns, rows).unwrap();
        for (i, p) in image.pixels_mut().iter_mut().enumerate() {
            p.red = i as u16;
        }
        image
    }

    #[test]
    fn get_visits_every_row_once() {
        let image = gradient(4, 16);
        let rows = AtomicUsize::new(0);
        let sum = AtomicUsize::new(0);
        let done = ImageView::new(&image)
            .get(&image, |row| {
                rows.fetch_add(1, Ordering::Relaxed);
                let s: usize = row.pixels.iter().map(|p| p.red as usize).sum();
                sum.fetch_add(s, Ordering::Relaxed);
                true
            })
            .unwrap();
        assert!(done);
        assert_eq!(rows.into_inner(), 16);
        assert_eq!(sum.into_inner(), (0..64).sum::<usize>());
    }

    #[test]
    fn set_starts_from_black() {
        let mut image = gradient(3, 3);
        ImageView::region(1, 1, 2, 2)
            .set(&mut image, |row| {
                assert!(row.pixels.iter().all(|p| p.red == 0));
                row.pixels.fill(PixelPacket::WHITE);
                true
            })
            .unwrap();
        assert_eq!(image.pixel(0, 0).unwrap().red, 0);
        assert_eq!(image.pixel(0, 1).unwrap().red, 3);
        assert_eq!(image.pixel(1, 1).unwrap(), PixelPacket::WHITE);
        assert_eq!(image.pixel(2, 2).unwrap(), PixelPacket::WHITE);
    }

    #[test]
    fn update_reads_current_values() {
        let mut image = gradient(2, 2);
        ImageView::new(&image)
            .with_workers(2)
            .update(&mut image, |row| {
                for p in row.pixels.iter_mut() {
                    p.green = p.red * 2;
                }
                true
            })
            .unwrap();
        assert_eq!(image.pixel(1, 1).unwrap().green, 6);
    }

    #[test]
    fn transfer_copies_region() {
        let source = gradient(4, 4);
        let mut destination = Image::new(4, 4).unwrap();
        ImageView::region(0, 2, 4, 2)
            .transfer(&source, &mut destination, |src, dst| {
                dst.pixels.copy_from_slice(src.pixels);
                true
            })
            .unwrap();
        assert_eq!(destination.pixel(3, 3).unwrap().red, 15);
        assert_eq!(destination.pixel(3, 1).unwrap().red, 0);
    }

    #[test]
    fn duplex_transfer_combines_inputs() {
        let a = gradient(2, 2);
        let mut b = Image::new(2, 2).unwrap();
        b.pixels_mut().fill(PixelPacket::rgb(0, 0, 10));
        let mut out = Image::new(2, 2).unwrap();
        ImageView::new(&a)
            .duplex_transfer(&a, &b, &mut out, |src, dup, dst| {
                for ((d, s), u) in dst.pixels.iter_mut().zip(src.pixels).zip(dup.pixels) {
                    d.red = s.red + u.blue;
                }
                true
            })
            .unwrap();
        assert_eq!(out.pixel(1, 1).unwrap().red, 13);
    }

    #[test]
    fn callback_false_stops() {
        let mut image = gradient(1, 64);
        let done = ImageView::new(&image)
            .with_workers(1)
            .update(&mut image, |row| row.y < 3)
            .unwrap();
        assert!(!done);
    }

    #[test]
    fn monitor_sees_every_row() {
        let image = gradient(2, 8);
        let last = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&last);
        ImageView::new(&image)
            .with_description("Test/View")
            .with_monitor(move |tag: &str, offset: u64, span: u64| {
                assert_eq!(tag, "Test/View");
                seen.lock().unwrap().push((offset, span));
                true
            })
            .get(&image, |_| true)
            .unwrap();
        let mut reports = last.lock().unwrap().clone();
        reports.sort();
        assert_eq!(reports, (1..=8).map(|i| (i, 8)).collect::<Vec<_>>());
    }

    #[test]
    fn region_outside_is_rejected() {
        let mut image = gradient(2, 2);
        let err = ImageView::region(1, 0, 2, 1)
            .update(&mut image, |_| true)
            .unwrap_err();
        assert!(matches!(err, RawError::InvalidRegion { .. }));
    }
}
