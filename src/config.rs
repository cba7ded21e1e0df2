//! Decode options.

use crate::limits::Limits;

/// How frames are materialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DecodeMode {
    /// Decode every frame before returning the handle.
    #[default]
    Eager,
    /// Read only the first frame header up front and decode frames as the
    /// cursor advances.
    Streaming,
}

/// Options for opening an animation.
///
/// # Example
///
/// ```rust
/// use zenanim::{DecodeConfig, Limits};
///
/// let config = DecodeConfig::new()
///     .limits(Limits::default().max_frame_count(100))
///     .use_background_hint(true);
/// ```
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DecodeConfig {
    pub(crate) limits: Limits,
    pub(crate) background_color: Option<[u8; 4]>,
    pub(crate) use_background_hint: bool,
}

impl DecodeConfig {
    /// Default options: default limits, transparent background.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set resource limits.
    #[must_use]
    pub fn limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// Use a fixed RGBA background color for disposal and the initial canvas.
    ///
    /// Takes precedence over the container's background hint.
    #[must_use]
    pub fn background_color(mut self, rgba: [u8; 4]) -> Self {
        self.background_color = Some(rgba);
        self
    }

    /// Use the background color declared by the container, when present.
    ///
    /// Off by default: most viewers ignore the hint and clear to transparent.
    #[must_use]
    pub fn use_background_hint(mut self, enabled: bool) -> Self {
        self.use_background_hint = enabled;
        self
    }

    /// Resolve the canvas background for a container that declared `hint`.
    pub(crate) fn resolve_background(&self, hint: Option<[u8; 4]>) -> [u8; 4] {
        self.background_color
            .or(hint.filter(|_| self.use_background_hint))
            .unwrap_or([0; 4])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn background_precedence() {
        let hint = Some([1, 2, 3, 255]);
        assert_eq!(DecodeConfig::new().resolve_background(hint), [0; 4]);
        assert_eq!(
            DecodeConfig::new()
                .use_background_hint(true)
                .resolve_background(hint),
            [1, 2, 3, 255]
        );
        assert_eq!(
            DecodeConfig::new()
                .use_background_hint(true)
                .background_color([9, 9, 9, 9])
                .resolve_background(hint),
            [9, 9, 9, 9]
        );
        assert_eq!(
            DecodeConfig::new()
                .use_background_hint(true)
                .resolve_background(None),
            [0; 4]
        );
    }
}
