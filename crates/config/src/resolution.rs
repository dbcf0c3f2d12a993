//! Typed `width:height` resolution entries for the downscale catalog.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A video resolution in pixels.
///
/// Serialized as the `"w:h"` string ffmpeg's `scale` filter accepts, so the
/// catalog in `sweep.toml` reads `resolutions = ["1920:1080", "1280:720"]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

/// Error returned when a `"w:h"` string cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseResolutionError(String);

impl fmt::Display for ParseResolutionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid resolution '{}', expected <width>:<height>", self.0)
    }
}

impl std::error::Error for ParseResolutionError {}

impl Resolution {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Total pixel count, used to order catalog entries.
    pub fn pixels(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }

    /// Aspect ratio rounded to two decimal places, expressed in hundredths.
    ///
    /// 1920:1080 and 1280:720 both give 178; comparing integers avoids
    /// float equality on the rounded ratio.
    pub fn aspect_key(&self) -> i64 {
        if self.height == 0 {
            return 0;
        }
        (f64::from(self.width) / f64::from(self.height) * 100.0).round() as i64
    }

    /// Whether `self` has the same rounded aspect ratio as `other`.
    pub fn same_aspect(&self, other: &Resolution) -> bool {
        self.aspect_key() == other.aspect_key()
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.width, self.height)
    }
}

impl FromStr for Resolution {
    type Err = ParseResolutionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ParseResolutionError(s.to_string());
        let (w, h) = s.trim().split_once(':').ok_or_else(invalid)?;
        let width = w.trim().parse::<u32>().map_err(|_| invalid())?;
        let height = h.trim().parse::<u32>().map_err(|_| invalid())?;
        if width == 0 || height == 0 {
            return Err(invalid());
        }
        Ok(Self { width, height })
    }
}

impl TryFrom<String> for Resolution {
    type Error = ParseResolutionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Resolution> for String {
    fn from(value: Resolution) -> Self {
        value.to_string()
    }
}
