//! Absolute geometry strings: `WxH+X+Y`.
//!
//! Used for the `size` (stream dimensions plus header offset) and `extract`
//! (crop window) options of raw formats.

use core::fmt;
use core::str::FromStr;

use crate::error::RawError;

/// A parsed `WxH+X+Y` geometry. Absent parts are zero and flagged as such.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Geometry {
    pub width: u32,
    pub height: u32,
    pub x: i64,
    pub y: i64,
    pub has_width: bool,
    pub has_height: bool,
    pub has_x: bool,
    pub has_y: bool,
}

impl Geometry {
    /// A plain `WxH` geometry.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            has_width: true,
            has_height: true,
            ..Self::default()
        }
    }

    /// `WxH+X+Y`.
    pub fn with_offset(width: u32, height: u32, x: i64, y: i64) -> Self {
        Self {
            x,
            y,
            has_x: true,
            has_y: true,
            ..Self::new(width, height)
        }
    }

    /// Whether an X or Y offset was given.
    pub fn has_offset(&self) -> bool {
        self.has_x || self.has_y
    }

    /// Parse an absolute geometry. Resize modifiers (`!<>^%@`) are accepted
    /// and ignored.
    pub fn parse(s: &str) -> Result<Self, RawError> {
        let invalid = || RawError::InvalidGeometry(s.to_string());
        let cleaned: String = s
            .chars()
            .filter(|c| !matches!(c, '!' | '<' | '>' | '^' | '%' | '@') && !c.is_whitespace())
            .collect();
        if cleaned.is_empty() {
            return Err(invalid());
        }

        // Split "WxH" from the signed offsets.
        let offset_start = cleaned.find(['+', '-']).unwrap_or(cleaned.len());
        let (extent, offsets) = cleaned.split_at(offset_start);

        let mut geometry = Geometry::default();
        if !extent.is_empty() {
            let lower = extent.to_ascii_lowercase();
            let (w, h) = match lower.split_once('x') {
                Some((w, h)) => (w, Some(h)),
                None => (lower.as_str(), None),
            };
            if !w.is_empty() {
                geometry.width = w.parse().map_err(|_| invalid())?;
                geometry.has_width = true;
            }
            match h {
                Some(h) if !h.is_empty() => {
                    geometry.height = h.parse().map_err(|_| invalid())?;
                    geometry.has_height = true;
                }
                Some(_) => {}
                None => {
                    // "W" alone means a square.
                    geometry.height = geometry.width;
                    geometry.has_height = geometry.has_width;
                }
            }
        }

        let mut rest = offsets;
        for slot in 0..2 {
            if rest.is_empty() {
                break;
            }
            let sign: i64 = if rest.starts_with('-') { -1 } else { 1 };
            let body = &rest[1..];
            let end = body.find(['+', '-']).unwrap_or(body.len());
            let value: i64 = body[..end].parse().map_err(|_| invalid())?;
            if slot == 0 {
                geometry.x = sign * value;
                geometry.has_x = true;
            } else {
                geometry.y = sign * value;
                geometry.has_y = true;
            }
            rest = &body[end..];
        }
        if !rest.is_empty() {
            return Err(invalid());
        }
        Ok(geometry)
    }
}

impl FromStr for Geometry {
    type Err = RawError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Geometry::parse(s)
    }
}

impl fmt::Display for Geometry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)?;
        if self.has_offset() {
            write!(f, "{:+}{:+}", self.x, self.y)?;
        }
        Ok(())
    }
}
