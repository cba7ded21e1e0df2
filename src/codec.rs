//! Format detection and codec dispatch.

use std::fmt;
use std::io::Read;

use crate::adapter::DecoderHandle;
use crate::animation::Animation;
use crate::config::{DecodeConfig, DecodeMode};
use crate::error::DecodeError;
use crate::source::{LoopCount, SourceError};
use crate::stream::Stream;

/// Supported container formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ImageFormat {
    /// Graphics Interchange Format (87a and 89a).
    Gif,
    /// WebP, still or animated.
    WebP,
}

impl ImageFormat {
    /// MIME type.
    pub fn mime_type(self) -> &'static str {
        match self {
            Self::Gif => "image/gif",
            Self::WebP => "image/webp",
        }
    }

    /// Common file extension.
    pub fn extension(self) -> &'static str {
        match self {
            Self::Gif => "gif",
            Self::WebP => "webp",
        }
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Gif => "GIF",
            Self::WebP => "WebP",
        })
    }
}

/// A format decoder known to the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Codec {
    /// GIF via the `gif` crate.
    Gif,
    /// WebP container parsed here, bitstreams via `image-webp`.
    WebP,
}

impl Codec {
    /// Every codec, in detection order.
    pub const ALL: [Codec; 2] = [Codec::Gif, Codec::WebP];

    /// The format this codec decodes.
    pub fn format(self) -> ImageFormat {
        match self {
            Self::Gif => ImageFormat::Gif,
            Self::WebP => ImageFormat::WebP,
        }
    }

    /// Human-readable description.
    pub fn description(self) -> &'static str {
        match self {
            Self::Gif => "GIF 87a/89a, indexed frames with graphic control extensions",
            Self::WebP => "WebP (VP8, VP8L, extended and animated RIFF containers)",
        }
    }

    /// Check the stream's magic bytes without consuming them.
    ///
    /// A stream too short to hold the whole signature never matches.
    pub fn detects<R: Read>(self, stream: &mut Stream<R>) -> Result<bool, SourceError> {
        match self {
            Self::Gif => {
                let mut magic = [0u8; 6];
                let n = stream.peek(&mut magic)?;
                Ok(n == magic.len() && (&magic == b"GIF87a" || &magic == b"GIF89a"))
            }
            Self::WebP => {
                let mut magic = [0u8; 12];
                let n = stream.peek(&mut magic)?;
                Ok(n == magic.len() && &magic[0..4] == b"RIFF" && &magic[8..12] == b"WEBP")
            }
        }
    }
}

/// Header-level information about an image, without decoding frames.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct ImageInfo {
    /// Canvas width in pixels.
    pub width: u32,
    /// Canvas height in pixels.
    pub height: u32,
    /// Detected format.
    pub format: ImageFormat,
    /// Always `false`: opacity is only known once a frame is read.
    pub opaque: bool,
    /// Always `None`: counting frames requires decoding them.
    pub frame_count: Option<usize>,
    /// Loop count declared by the container.
    pub loop_count: LoopCount,
}

/// Runtime set of enabled codecs.
///
/// # Example
///
/// ```rust
/// use zenanim::{CodecRegistry, ImageFormat};
///
/// let registry = CodecRegistry::none().with_format(ImageFormat::Gif, true);
/// assert!(registry.is_enabled(ImageFormat::Gif));
/// assert!(!registry.is_enabled(ImageFormat::WebP));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodecRegistry {
    gif: bool,
    webp: bool,
}

impl Default for CodecRegistry {
    fn default() -> Self {
        Self::all()
    }
}

impl CodecRegistry {
    /// Every codec enabled.
    pub fn all() -> Self {
        Self {
            gif: true,
            webp: true,
        }
    }

    /// No codec enabled.
    pub fn none() -> Self {
        Self {
            gif: false,
            webp: false,
        }
    }

    /// Enable or disable the codec for `format`.
    #[must_use]
    pub fn with_format(mut self, format: ImageFormat, enabled: bool) -> Self {
        match format {
            ImageFormat::Gif => self.gif = enabled,
            ImageFormat::WebP => self.webp = enabled,
        }
        self
    }

    /// Whether the codec for `format` is enabled.
    pub fn is_enabled(&self, format: ImageFormat) -> bool {
        match format {
            ImageFormat::Gif => self.gif,
            ImageFormat::WebP => self.webp,
        }
    }

    /// Enabled codecs, in detection order.
    pub fn codecs(&self) -> impl Iterator<Item = Codec> + '_ {
        Codec::ALL
            .into_iter()
            .filter(move |c| self.is_enabled(c.format()))
    }

    /// Pick the first enabled codec whose magic bytes match.
    pub fn detect<R: Read>(&self, stream: &mut Stream<R>) -> Result<Codec, DecodeError> {
        for codec in self.codecs() {
            if codec.detects(stream).map_err(DecodeError::Open)? {
                return Ok(codec);
            }
        }
        Err(DecodeError::UnrecognizedFormat)
    }

    /// Detect the format and open an animation.
    #[tracing::instrument(skip(self, reader, config))]
    pub fn decode<'a, R: Read + 'a>(
        &self,
        reader: R,
        mode: DecodeMode,
        config: &DecodeConfig,
    ) -> Result<Animation<'a>, DecodeError> {
        let mut stream = Stream::new(reader);
        let codec = self.detect(&mut stream)?;
        let decoder = DecoderHandle::open(codec, stream, config)?;
        Animation::open(decoder, mode, config)
    }

    /// Read only the container header.
    #[tracing::instrument(skip(self, reader))]
    pub fn probe<R: Read>(&self, reader: R) -> Result<ImageInfo, DecodeError> {
        let mut stream = Stream::new(reader);
        let codec = self.detect(&mut stream)?;
        let decoder = DecoderHandle::open(codec, stream, &DecodeConfig::new())?;
        let header = decoder.header();
        let info = ImageInfo {
            width: header.width,
            height: header.height,
            format: codec.format(),
            opaque: false,
            frame_count: None,
            loop_count: header.loop_count,
        };
        decoder.close();
        Ok(info)
    }
}
