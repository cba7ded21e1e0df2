//! The bitstream decoder boundary.
//!
//! A [`FrameSource`] turns a byte stream into raw, uncomposited frames plus
//! their control blocks, one frame per call. Compositing, disposal and timing
//! are handled elsewhere; sources only report what the container declares.

use std::io;

use thiserror::Error;

use crate::frame::{Blend, Disposal, Rect};

pub(crate) mod gif;
pub(crate) mod webp;

pub use self::gif::GifSource;
pub use self::webp::WebpSource;

/// Errors reported by a [`FrameSource`].
///
/// These are the decoder's own signals; callers see them wrapped in a
/// [`DecodeError`](crate::DecodeError) that says in which phase they occurred.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SourceError {
    /// Reading from the underlying stream failed.
    #[error("IO error: {0}")]
    Io(io::Error),

    /// The data ended in the middle of a structure.
    #[error("Unexpected end of data")]
    Truncated,

    /// The file signature did not match.
    #[error("Invalid signature: {0:x?}")]
    SignatureInvalid([u8; 4]),

    /// A chunk header was missing, unknown where required, or inconsistent.
    #[error("Invalid chunk header: {0:x?}")]
    ChunkHeaderInvalid([u8; 4]),

    /// The data is structurally wrong.
    #[error("Malformed data: {0}")]
    Malformed(String),

    /// The file may be valid, but this crate doesn't support decoding it.
    #[error("Unsupported feature: {0}")]
    Unsupported(String),

    /// A declared payload is larger than the configured memory limit.
    #[error("Payload of {0} bytes exceeds the memory limit")]
    PayloadTooLarge(u64),

    /// The GIF decoder failed.
    #[error("GIF error: {0}")]
    Gif(#[from] ::gif::DecodingError),

    /// The VP8/VP8L bitstream decoder failed.
    #[error("WebP bitstream error: {0}")]
    WebP(#[from] image_webp::DecodingError),
}

impl From<io::Error> for SourceError {
    fn from(e: io::Error) -> Self {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            Self::Truncated
        } else {
            Self::Io(e)
        }
    }
}

/// Number of times that an animation loops.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum LoopCount {
    /// The animation loops forever.
    Forever,
    /// The animation is played the specified number of times.
    Times(std::num::NonZeroU16),
}

impl LoopCount {
    /// Play once.
    pub const ONCE: Self = match std::num::NonZeroU16::new(1) {
        Some(n) => Self::Times(n),
        None => Self::Forever,
    };
}

impl std::fmt::Display for LoopCount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoopCount::Forever => f.write_str("infinite"),
            LoopCount::Times(n) => write!(f, "{} time{}", n, if n.get() == 1 { "" } else { "s" }),
        }
    }
}

impl From<u16> for LoopCount {
    fn from(n: u16) -> Self {
        match std::num::NonZeroU16::new(n) {
            None => LoopCount::Forever,
            Some(n) => LoopCount::Times(n),
        }
    }
}

/// Canvas-level information available once the container header is parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanvasHeader {
    /// Canvas width in pixels.
    pub width: u32,
    /// Canvas height in pixels.
    pub height: u32,
    /// Background color declared by the container, RGBA.
    pub background_hint: Option<[u8; 4]>,
    /// Loop count declared by the container.
    pub loop_count: LoopCount,
}

/// The graphic control block of one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlBlock {
    /// Disposal method.
    pub disposal: Disposal,
    /// Transparent key; see [`FrameRecord::transparent_index`](crate::FrameRecord).
    pub transparent_index: Option<u8>,
    /// Display time in milliseconds.
    pub delay_ms: u32,
    /// Blend method for direct-color pixels.
    pub blend: Blend,
}

/// A frame's placement and control data, without pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// Declared rectangle on the canvas.
    pub region: Rect,
    /// Control block, `None` when missing or malformed.
    ///
    /// The built-in sources always supply one: the `gif` crate fills in
    /// defaults for frames without a graphic control extension, and every
    /// `ANMF` chunk carries its own control fields. `None` is for other
    /// [`FrameSource`] implementations.
    pub control: Option<ControlBlock>,
}

/// Pixel payload of a raw frame, covering exactly its region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FramePixels {
    /// One palette index per pixel.
    Indexed {
        /// Row-major indices, `width * height` long.
        indices: Vec<u8>,
        /// RGB triples.
        palette: Vec<u8>,
    },
    /// Row-major RGBA8, `width * height * 4` long.
    Rgba(Vec<u8>),
}

/// One decoded but not yet composited frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrame {
    /// Placement and control data.
    pub header: FrameHeader,
    /// Decoded pixels.
    pub pixels: FramePixels,
}

impl RawFrame {
    /// Bytes held by the pixel payload.
    pub fn byte_len(&self) -> usize {
        match &self.pixels {
            FramePixels::Indexed { indices, palette } => indices.len() + palette.len(),
            FramePixels::Rgba(data) => data.len(),
        }
    }
}

/// A format-specific decoder producing raw frames in presentation order.
///
/// Implementations own the stream they read from, so dropping the source
/// releases it. Besides the built-in [`GifSource`] and [`WebpSource`], any
/// implementation can be driven through
/// [`Animation::from_source`](crate::Animation::from_source).
pub trait FrameSource {
    /// Canvas information parsed when the source was opened.
    fn header(&self) -> &CanvasHeader;

    /// Read the next frame's header without decoding its pixels.
    ///
    /// Repeated calls return the same header until [`read_frame`](Self::read_frame)
    /// consumes the frame. `Ok(None)` means the stream has no further frames.
    fn peek_frame(&mut self) -> Result<Option<FrameHeader>, SourceError>;

    /// Decode the next frame. `Ok(None)` means the stream has no further frames.
    fn read_frame(&mut self) -> Result<Option<RawFrame>, SourceError>;
}
