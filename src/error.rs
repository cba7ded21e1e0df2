//! Error types for opening, decoding and navigating animations.

use thiserror::Error;

use crate::source::SourceError;

/// Errors that can occur while opening or stepping through an animation.
///
/// Every variant is a per-operation result; nothing is stored globally.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DecodeError {
    /// The stream could not be opened as a container of the selected format:
    /// bad signature, truncated header or an unusable header.
    #[error("Cannot open image: {0}")]
    Open(#[source] SourceError),

    /// No enabled codec recognised the stream's magic bytes.
    #[error("Unrecognized image format")]
    UnrecognizedFormat,

    /// The first frame header could not be read during a glance.
    #[error("Invalid format: {0}")]
    Format(#[source] SourceError),

    /// A single frame could not be decoded.
    ///
    /// While slurping this only truncates the animation; it is returned to
    /// the caller from a streaming `advance`, which leaves the handle usable.
    #[error("Frame {index} could not be decoded: {source}")]
    Frame {
        /// 0-based index of the frame that failed.
        index: usize,
        /// What the bitstream decoder reported.
        #[source]
        source: SourceError,
    },

    /// The header parsed but not a single frame could be decoded.
    #[error("No frames could be decoded")]
    NoFrames,

    /// `advance` was called past the last frame.
    #[error("End of animation")]
    EndOfAnimation,

    /// The handle was used after `recycle`.
    #[error("Animation used after recycle")]
    UseAfterRecycle,

    /// A configured [`Limits`](crate::Limits) bound was exceeded.
    #[error("Limit exceeded: {0}")]
    LimitExceeded(String),

    /// The canvas is too large to address on this platform.
    #[error("Image too large")]
    ImageTooLarge,

    /// Invalid function call or parameter.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}

impl DecodeError {
    /// Returns `true` for [`DecodeError::EndOfAnimation`], the benign
    /// end-of-timeline signal.
    pub fn is_end_of_animation(&self) -> bool {
        matches!(self, Self::EndOfAnimation)
    }
}
