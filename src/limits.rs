/// Resource limits for pixel storage allocation.
///
/// All fields default to `None` (no limit). Checked whenever a frame's pixel
/// storage is sized, before any allocation happens.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Limits {
    pub max_width: Option<u64>,
    pub max_height: Option<u64>,
    /// Maximum pixel count (width * height) of a single frame.
    pub max_pixels: Option<u64>,
    /// Maximum bytes of pixel storage for a single frame.
    pub max_memory_bytes: Option<u64>,
}

impl Limits {
    /// Check frame dimensions against the width, height and pixel limits.
    pub(crate) fn check(&self, width: u32, height: u32) -> Result<(), crate::RawError> {
        let pixels = u64::from(width) * u64::from(height);
        let checks = [
            ("width", u64::from(width), self.max_width),
            ("height", u64::from(height), self.max_height),
            ("pixel count", pixels, self.max_pixels),
        ];
        for (what, value, limit) in checks {
            if let Some(limit) = limit
                && value > limit
            {
                return Err(crate::RawError::LimitExceeded(format!(
                    "{what} {value} exceeds limit {limit}"
                )));
            }
        }
        Ok(())
    }

    /// Check an allocation size against the memory limit.
    pub(crate) fn check_memory(&self, bytes: usize) -> Result<(), crate::RawError> {
        match self.max_memory_bytes {
            Some(limit) if bytes as u64 > limit => Err(crate::RawError::LimitExceeded(format!(
                "allocation {bytes} bytes exceeds memory limit {limit}"
            ))),
            _ => Ok(()),
        }
    }

    /// Check a full frame: dimensions first, then the storage it needs at
    /// `bytes_per_pixel`.
    pub(crate) fn check_frame(
        &self,
        width: u32,
        height: u32,
        bytes_per_pixel: usize,
    ) -> Result<usize, crate::RawError> {
        self.check(width, height)?;
        let bytes = (width as usize)
            .checked_mul(height as usize)
            .and_then(|wh| wh.checked_mul(bytes_per_pixel))
            .ok_or(crate::RawError::DimensionsTooLarge { width, height })?;
        self.check_memory(bytes)?;
        Ok(bytes)
    }
}
