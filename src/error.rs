use enough::StopReason;

use crate::image::ImageList;

/// Errors from the quantum pipeline, the interlace driver and the coders.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum RawError {
    #[error("must specify image size")]
    MissingImageSize,

    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),

    #[error("invalid option: {0}")]
    InvalidOption(String),

    #[error("unexpected end of file: `{filename}'")]
    UnexpectedEof { filename: String },

    #[error("invalid colormap index")]
    InvalidColormapIndex,

    #[error("dimensions too large: {width}x{height}")]
    DimensionsTooLarge { width: u32, height: u32 },

    #[error("limit exceeded: {0}")]
    LimitExceeded(String),

    #[error("unable to open file `{filename}': {reason}")]
    FileOpen { filename: String, reason: String },

    #[error("delegate library failed: {0}")]
    Delegate(String),

    #[error("colormapped image required")]
    ColormappedImageRequired,

    #[error("color separated (CMYK) image required")]
    ColorSeparatedImageRequired,

    #[error("pixel region {width}x{height}+{x}+{y} is outside the image")]
    InvalidRegion {
        x: i64,
        y: i64,
        width: usize,
        height: usize,
    },

    #[error("unsupported format variant: {0}")]
    UnsupportedVariant(String),

    #[error("no decode delegate for this image format `{0}'")]
    NoDecoder(String),

    #[error("no encode delegate for this image format `{0}'")]
    NoEncoder(String),

    #[error("operation cancelled")]
    Cancelled(StopReason),

    #[error("operation cancelled by progress monitor during `{tag}'")]
    ProgressCancelled { tag: &'static str },
}

/// Coarse classification of a [`RawError`], mirroring the severity classes
/// raw-format callers branch on.
#[non_exhaustive]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A required option (geometry, image size) is missing or malformed.
    Option,
    /// The pixel stream is shorter than its geometry implies, or inconsistent.
    CorruptImage,
    /// An allocation would exceed a configured limit or address space.
    ResourceLimit,
    /// A blob could not be opened.
    FileOpen,
    /// A wrapped third-party library failed.
    Delegate,
    /// The image is not in a state the operation accepts.
    Image,
    /// No coder handles the requested format or variant.
    MissingDelegate,
    /// Cooperative cancellation (stop token or progress monitor).
    Cancelled,
}

impl RawError {
    /// Which class of failure this is.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MissingImageSize | Self::InvalidGeometry(_) | Self::InvalidOption(_) => {
                ErrorKind::Option
            }
            Self::UnexpectedEof { .. } | Self::InvalidColormapIndex => ErrorKind::CorruptImage,
            Self::DimensionsTooLarge { .. } | Self::LimitExceeded(_) => ErrorKind::ResourceLimit,
            Self::FileOpen { .. } => ErrorKind::FileOpen,
            Self::Delegate(_) => ErrorKind::Delegate,
            Self::ColormappedImageRequired
            | Self::ColorSeparatedImageRequired
            | Self::InvalidRegion { .. } => ErrorKind::Image,
            Self::UnsupportedVariant(_) | Self::NoDecoder(_) | Self::NoEncoder(_) => {
                ErrorKind::MissingDelegate
            }
            Self::Cancelled(_) | Self::ProgressCancelled { .. } => ErrorKind::Cancelled,
        }
    }

    pub(crate) fn eof(filename: &str) -> Self {
        Self::UnexpectedEof {
            filename: filename.into(),
        }
    }
}

impl From<StopReason> for RawError {
    fn from(r: StopReason) -> Self {
        RawError::Cancelled(r)
    }
}

/// A decode that failed part-way.
///
/// `partial` holds the frames completed before the failure followed by the
/// frame that was being decoded when it happened. Rows the decoder never
/// reached keep their initial value (opaque black). It is empty when the
/// failure happened before any pixel storage was allocated.
#[derive(Debug, thiserror::Error)]
#[error("{error}")]
pub struct DecodeError {
    #[source]
    pub error: RawError,
    pub partial: ImageList,
}

impl DecodeError {
    pub fn kind(&self) -> ErrorKind {
        self.error.kind()
    }

    /// Drop the partial frames and keep only the error.
    pub fn into_error(self) -> RawError {
        self.error
    }
}

impl From<RawError> for DecodeError {
    fn from(error: RawError) -> Self {
        DecodeError {
            error,
            partial: ImageList::new(),
        }
    }
}
