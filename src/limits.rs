//! Configurable resource limits for animation decoding.
//!
//! These limits protect against malicious or malformed inputs that could
//! cause excessive memory usage: huge canvases, endless frame sequences or
//! absurd chunk sizes.

use crate::error::DecodeError;

/// Configuration for decode limits.
///
/// All limits are optional; `None` means unlimited.
///
/// # Example
///
/// ```rust
/// use zenanim::Limits;
///
/// let limits = Limits::default()
///     .max_dimensions(4096, 4096)
///     .max_frame_count(500);
///
/// // Or start with no limits for trusted inputs
/// let unlimited = Limits::none();
/// ```
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub struct Limits {
    /// Maximum canvas width in pixels.
    pub max_width: Option<u32>,

    /// Maximum canvas height in pixels.
    pub max_height: Option<u32>,

    /// Maximum total canvas pixels (width * height).
    pub max_total_pixels: Option<u64>,

    /// Maximum number of frames in an animation.
    pub max_frame_count: Option<u64>,

    /// Maximum bytes held by one animation's pixel buffers, and the largest
    /// single frame payload accepted from a container.
    pub max_memory: Option<u64>,
}

impl Default for Limits {
    /// Default limits suitable for untrusted input.
    ///
    /// - Max dimensions: 16384 x 16384
    /// - Max total pixels: 100 megapixels
    /// - Max frames: 10,000
    /// - Max memory: 1 GB
    fn default() -> Self {
        Self {
            max_width: Some(16384),
            max_height: Some(16384),
            max_total_pixels: Some(100_000_000),
            max_frame_count: Some(10_000),
            max_memory: Some(1024 * 1024 * 1024),
        }
    }
}

impl Limits {
    /// Create limits with no restrictions.
    ///
    /// **Warning**: Only use this for trusted inputs!
    #[must_use]
    pub fn none() -> Self {
        Self {
            max_width: None,
            max_height: None,
            max_total_pixels: None,
            max_frame_count: None,
            max_memory: None,
        }
    }

    /// Set maximum dimensions.
    #[must_use]
    pub fn max_dimensions(mut self, width: u32, height: u32) -> Self {
        self.max_width = Some(width);
        self.max_height = Some(height);
        self
    }

    /// Set maximum total pixels.
    #[must_use]
    pub fn max_total_pixels(mut self, pixels: u64) -> Self {
        self.max_total_pixels = Some(pixels);
        self
    }

    /// Set maximum frame count.
    #[must_use]
    pub fn max_frame_count(mut self, count: u64) -> Self {
        self.max_frame_count = Some(count);
        self
    }

    /// Set maximum memory usage in bytes.
    #[must_use]
    pub fn max_memory(mut self, bytes: u64) -> Self {
        self.max_memory = Some(bytes);
        self
    }

    /// Check if canvas dimensions are within limits.
    pub fn check_dimensions(&self, width: u32, height: u32) -> Result<(), DecodeError> {
        if let Some(max_w) = self.max_width {
            if width > max_w {
                return Err(DecodeError::LimitExceeded(format!(
                    "width {width} exceeds limit {max_w}"
                )));
            }
        }

        if let Some(max_h) = self.max_height {
            if height > max_h {
                return Err(DecodeError::LimitExceeded(format!(
                    "height {height} exceeds limit {max_h}"
                )));
            }
        }

        let total_pixels = u64::from(width) * u64::from(height);
        if let Some(max_pixels) = self.max_total_pixels {
            if total_pixels > max_pixels {
                return Err(DecodeError::LimitExceeded(format!(
                    "total pixels {total_pixels} exceeds limit {max_pixels}"
                )));
            }
        }

        Ok(())
    }

    /// Check whether one more frame may be added to `count` existing frames.
    pub fn check_frame_count(&self, count: usize) -> Result<(), DecodeError> {
        if let Some(max) = self.max_frame_count {
            if count as u64 >= max {
                return Err(DecodeError::LimitExceeded(format!(
                    "frame count {count} reaches limit {max}"
                )));
            }
        }
        Ok(())
    }

    /// Check if memory usage is within limits.
    pub fn check_memory(&self, bytes: u64) -> Result<(), DecodeError> {
        if let Some(max) = self.max_memory {
            if bytes > max {
                return Err(DecodeError::LimitExceeded(format!(
                    "{bytes} bytes exceeds memory limit {max}"
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_limits() {
        let limits = Limits::default();
        assert!(limits.max_width.is_some());
        assert!(limits.max_height.is_some());
    }

    #[test]
    fn check_dimensions_ok() {
        let limits = Limits::default().max_dimensions(1000, 1000);
        assert!(limits.check_dimensions(500, 500).is_ok());
        assert!(limits.check_dimensions(1000, 1000).is_ok());
    }

    #[test]
    fn check_dimensions_too_large() {
        let limits = Limits::default().max_dimensions(1000, 1000);
        let result = limits.check_dimensions(1001, 500);
        assert!(matches!(result, Err(DecodeError::LimitExceeded(_))));
    }

    #[test]
    fn check_total_pixels() {
        let limits = Limits::default().max_total_pixels(1_000_000);
        assert!(limits.check_dimensions(1000, 1000).is_ok());
        assert!(limits.check_dimensions(1001, 1000).is_err());
    }

    #[test]
    fn frame_count_is_exclusive() {
        let limits = Limits::none().max_frame_count(2);
        assert!(limits.check_frame_count(0).is_ok());
        assert!(limits.check_frame_count(1).is_ok());
        assert!(limits.check_frame_count(2).is_err());
    }

    #[test]
    fn no_limits() {
        let limits = Limits::none();
        assert!(limits.check_dimensions(u32::MAX, u32::MAX).is_ok());
        assert!(limits.check_frame_count(usize::MAX).is_ok());
        assert!(limits.check_memory(u64::MAX).is_ok());
    }
}
