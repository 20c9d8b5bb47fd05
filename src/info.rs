//! Per-call read/write configuration.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::error::RawError;
use crate::geometry::Geometry;
use crate::interlace::Interlace;
use crate::limits::Limits;
use crate::quantum::Endian;

/// Progress tag for the rows of one frame being read.
pub const LOAD_IMAGE_TAG: &str = "Load/Image";
/// Progress tag for frames of a sequence being read.
pub const LOAD_IMAGES_TAG: &str = "Load/Images";
/// Progress tag for the rows of one frame being written.
pub const SAVE_IMAGE_TAG: &str = "Save/Image";
/// Progress tag for frames of a sequence being written.
pub const SAVE_IMAGES_TAG: &str = "Save/Images";

/// Receives `(tag, offset, span)` progress reports. Returning `false` asks
/// the operation to stop.
pub trait ProgressMonitor: Send + Sync {
    fn progress(&self, tag: &str, offset: u64, span: u64) -> bool;
}

impl<F> ProgressMonitor for F
where
    F: Fn(&str, u64, u64) -> bool + Send + Sync,
{
    fn progress(&self, tag: &str, offset: u64, span: u64) -> bool {
        self(tag, offset, span)
    }
}

/// Read/write settings for one call. Built once, then only borrowed.
#[derive(Clone)]
pub struct ImageInfo {
    /// Format tag, e.g. `BGRA`. Empty means "detect".
    pub magick: String,
    /// Base name of the blob; partition blobs append a channel suffix.
    pub filename: String,
    /// Stream width and height; the X offset is the header length in bytes.
    pub size: Option<Geometry>,
    /// Crop window cut from every frame of the stream.
    pub extract: Option<Geometry>,
    pub interlace: Interlace,
    /// First frame to return.
    pub scene: u32,
    /// Number of frames to return; 0 means all.
    pub number_scenes: u32,
    /// Read geometry only.
    pub ping: bool,
    /// Bits per sample.
    pub depth: u32,
    pub endian: Endian,
    /// Write every frame of a list into one blob.
    pub adjoin: bool,
    pub limits: Limits,
    options: BTreeMap<String, String>,
    monitor: Option<Arc<dyn ProgressMonitor>>,
}

impl fmt::Debug for ImageInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageInfo")
            .field("magick", &self.magick)
            .field("filename", &self.filename)
            .field("size", &self.size)
            .field("extract", &self.extract)
            .field("interlace", &self.interlace)
            .field("scene", &self.scene)
            .field("number_scenes", &self.number_scenes)
            .field("ping", &self.ping)
            .field("depth", &self.depth)
            .field("endian", &self.endian)
            .field("adjoin", &self.adjoin)
            .field("limits", &self.limits)
            .field("options", &self.options)
            .field("monitor", &self.monitor.is_some())
            .finish()
    }
}

impl Default for ImageInfo {
    fn default() -> Self {
        Self {
            magick: String::new(),
            filename: String::new(),
            size: None,
            extract: None,
            interlace: Interlace::None,
            scene: 0,
            number_scenes: 0,
            ping: false,
            depth: 8,
            endian: Endian::Undefined,
            adjoin: true,
            limits: Limits::default(),
            options: BTreeMap::new(),
            monitor: None,
        }
    }
}

impl ImageInfo {
    /// Settings for format `magick` with everything else defaulted.
    pub fn new(magick: &str) -> Self {
        Self {
            magick: magick.to_ascii_uppercase(),
            ..Self::default()
        }
    }

    /// Parse a `[FORMAT:]filename[geometry|scenes]` specification.
    ///
    /// The format comes from the prefix, else the file extension. A trailing
    /// bracket holds either a scene selection (`[2]`, `[1-3]`) or an extract
    /// geometry (`[100x100+10+20]`).
    pub fn from_spec(spec: &str) -> Result<Self, RawError> {
        let mut info = Self::default();
        let mut rest = spec;

        if let Some((prefix, tail)) = rest.split_once(':')
            && prefix.len() > 1
            && prefix.chars().all(|c| c.is_ascii_alphanumeric())
        {
            info.magick = prefix.to_ascii_uppercase();
            rest = tail;
        }

        if rest.ends_with(']')
            && let Some(open) = rest.rfind('[')
        {
            let inner = &rest[open + 1..rest.len() - 1];
            rest = &rest[..open];
            if let Some((first, last)) = parse_scenes(inner) {
                info.scene = first;
                info.number_scenes = last - first + 1;
            } else {
                info.extract = Some(Geometry::parse(inner)?);
            }
        }

        if rest.is_empty() {
            return Err(RawError::InvalidOption(format!("no filename in `{spec}'")));
        }
        info.filename = rest.to_string();
        if info.magick.is_empty()
            && let Some((_, ext)) = rest.rsplit_once('.')
            && !ext.is_empty()
            && !ext.contains(['/', '\\'])
        {
            info.magick = ext.to_ascii_uppercase();
        }
        Ok(info)
    }

    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = filename.into();
        self
    }

    /// Stream geometry; `x` is a header length skipped before the pixels.
    pub fn with_size(mut self, size: Geometry) -> Self {
        self.size = Some(size);
        self
    }

    pub fn with_extract(mut self, extract: Geometry) -> Self {
        self.extract = Some(extract);
        self
    }

    pub fn with_interlace(mut self, interlace: Interlace) -> Self {
        self.interlace = interlace;
        self
    }

    /// Select `count` frames starting at `scene` (`count == 0` means all).
    pub fn with_scene(mut self, scene: u32, count: u32) -> Self {
        self.scene = scene;
        self.number_scenes = count;
        self
    }

    pub fn with_depth(mut self, depth: u32) -> Self {
        self.depth = depth;
        self
    }

    pub fn with_endian(mut self, endian: Endian) -> Self {
        self.endian = endian;
        self
    }

    pub fn with_adjoin(mut self, adjoin: bool) -> Self {
        self.adjoin = adjoin;
        self
    }

    pub fn with_ping(mut self, ping: bool) -> Self {
        self.ping = ping;
        self
    }

    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// Set a free-form option such as `quantum:format`.
    pub fn with_option(mut self, name: &str, value: &str) -> Self {
        self.options
            .insert(name.to_ascii_lowercase(), value.to_string());
        self
    }

    pub fn with_monitor(mut self, monitor: impl ProgressMonitor + 'static) -> Self {
        self.monitor = Some(Arc::new(monitor));
        self
    }

    /// Option value by case-insensitive name.
    pub fn option(&self, name: &str) -> Option<&str> {
        self.options
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Report progress. Fails with [`RawError::ProgressCancelled`] when the
    /// monitor asks to stop.
    pub(crate) fn report(&self, tag: &'static str, offset: u64, span: u64) -> Result<(), RawError> {
        match &self.monitor {
            Some(monitor) if !monitor.progress(tag, offset, span) => {
                Err(RawError::ProgressCancelled { tag })
            }
            _ => Ok(()),
        }
    }
}

/// `N` or `A-B` (in either order).
fn parse_scenes(s: &str) -> Option<(u32, u32)> {
    if s.is_empty() || !s.chars().all(|c| c.is_ascii_digit() || c == '-') {
        return None;
    }
    match s.split_once('-') {
        None => {
            let n = s.parse().ok()?;
            Some((n, n))
        }
        Some((a, b)) => {
            let a: u32 = a.parse().ok()?;
            let b: u32 = b.parse().ok()?;
            Some((a.min(b), a.max(b)))
        }
    }
}
