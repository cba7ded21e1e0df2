//! The decoder adapter: owns a [`FrameSource`] and turns its errors into
//! [`DecodeError`]s according to the phase they occur in.
//!
//! | phase            | source error becomes                 |
//! |------------------|--------------------------------------|
//! | open             | [`DecodeError::Open`]                |
//! | glance           | [`DecodeError::Format`]              |
//! | slurp            | truncation (or [`DecodeError::NoFrames`]) |
//! | streaming `next` | [`DecodeError::Frame`]               |

use std::io::Read;

use crate::codec::{Codec, ImageFormat};
use crate::config::DecodeConfig;
use crate::error::DecodeError;
use crate::limits::Limits;
use crate::source::{
    CanvasHeader, FrameHeader, FrameSource, GifSource, RawFrame, SourceError, WebpSource,
};
use crate::stream::Stream;

/// An open format decoder. Dropping it releases the decoder and its stream.
pub(crate) struct DecoderHandle<'a> {
    source: Box<dyn FrameSource + 'a>,
    format: ImageFormat,
    limits: Limits,
    decoded: usize,
}

impl<'a> DecoderHandle<'a> {
    /// Parse the container header with `codec`.
    pub(crate) fn open<R: Read + 'a>(
        codec: Codec,
        stream: Stream<R>,
        config: &DecodeConfig,
    ) -> Result<Self, DecodeError> {
        let source: Box<dyn FrameSource + 'a> = match codec {
            Codec::Gif => Box::new(GifSource::new(stream).map_err(DecodeError::Open)?),
            Codec::WebP => {
                Box::new(WebpSource::new(stream, &config.limits).map_err(DecodeError::Open)?)
            }
        };
        Self::from_source(source, codec.format(), config.limits.clone())
    }

    pub(crate) fn from_source(
        source: Box<dyn FrameSource + 'a>,
        format: ImageFormat,
        limits: Limits,
    ) -> Result<Self, DecodeError> {
        let header = source.header();
        limits.check_dimensions(header.width, header.height)?;
        tracing::debug!(
            %format,
            width = header.width,
            height = header.height,
            loop_count = %header.loop_count,
            "opened decoder"
        );
        Ok(Self {
            source,
            format,
            limits,
            decoded: 0,
        })
    }

    pub(crate) fn header(&self) -> &CanvasHeader {
        self.source.header()
    }

    pub(crate) fn format(&self) -> ImageFormat {
        self.format
    }

    pub(crate) fn limits(&self) -> &Limits {
        &self.limits
    }

    /// Read the first frame's header without decoding pixels.
    pub(crate) fn glance(&mut self) -> Result<FrameHeader, DecodeError> {
        match self.source.peek_frame() {
            Ok(Some(header)) => {
                tracing::debug!(region = ?header.region, "glanced first frame");
                Ok(header)
            }
            Ok(None) => Err(DecodeError::Format(SourceError::Malformed(
                "no frame in stream".into(),
            ))),
            Err(e) => Err(DecodeError::Format(e)),
        }
    }

    /// Decode the next frame.
    ///
    /// Reaching the frame-count limit ends the stream early.
    pub(crate) fn next(&mut self) -> Result<Option<RawFrame>, DecodeError> {
        let index = self.decoded;
        if let Err(e) = self.limits.check_frame_count(index) {
            tracing::warn!(error = %e, "stopping at frame limit");
            return Ok(None);
        }
        match self.source.read_frame() {
            Ok(Some(frame)) => {
                self.decoded += 1;
                Ok(Some(frame))
            }
            Ok(None) => Ok(None),
            Err(source) => Err(DecodeError::Frame { index, source }),
        }
    }

    /// Decode every remaining frame.
    ///
    /// A frame that fails to decode truncates the animation to the frames
    /// before it; the decoder is not read past it.
    pub(crate) fn slurp(&mut self) -> Result<Vec<RawFrame>, DecodeError> {
        let mut frames = Vec::new();
        let mut bytes = 0u64;
        loop {
            match self.next() {
                Ok(Some(frame)) => {
                    bytes += frame.byte_len() as u64;
                    if let Err(e) = self.limits.check_memory(bytes) {
                        tracing::warn!(error = %e, kept = frames.len(), "truncating animation");
                        break;
                    }
                    frames.push(frame);
                }
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!(error = %e, kept = frames.len(), "truncating animation");
                    break;
                }
            }
        }
        if frames.is_empty() {
            return Err(DecodeError::NoFrames);
        }
        tracing::debug!(frames = frames.len(), bytes, "slurped animation");
        Ok(frames)
    }

    /// Release the decoder and its stream.
    pub(crate) fn close(self) {
        tracing::trace!(format = %self.format, decoded = self.decoded, "closing decoder");
    }
}
