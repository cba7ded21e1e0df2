//! GIF frame source backed by the `gif` crate.
//!
//! The `gif` decoder is configured for indexed output, so frames arrive as
//! palette indices plus their graphic control extension; transparency and
//! disposal are applied by the canvas, not here.

use std::io::Read;

use ::gif::{ColorOutput, DecodeOptions, Decoder, DisposalMethod, Frame, Repeat};

use super::{
    CanvasHeader, ControlBlock, FrameHeader, FramePixels, FrameSource, LoopCount, RawFrame,
    SourceError,
};
use crate::frame::{Blend, Disposal, Rect};
use crate::stream::Stream;

/// GIF delays are stored in hundredths of a second.
const DELAY_UNIT_MS: u32 = 10;

/// Frame header plus the palette it will be drawn with.
struct Pending {
    header: FrameHeader,
    palette: Vec<u8>,
}

/// Streaming GIF frame source.
pub struct GifSource<R: Read> {
    decoder: Decoder<Stream<R>>,
    header: CanvasHeader,
    global_palette: Vec<u8>,
    pending: Option<Pending>,
    finished: bool,
}

impl<R: Read> GifSource<R> {
    /// Parse the GIF header and logical screen descriptor.
    pub fn new(stream: Stream<R>) -> Result<Self, SourceError> {
        let mut options = DecodeOptions::new();
        options.set_color_output(ColorOutput::Indexed);
        let decoder = options.read_info(stream)?;

        let width = u32::from(decoder.width());
        let height = u32::from(decoder.height());
        if width == 0 || height == 0 {
            return Err(SourceError::Malformed(format!(
                "empty logical screen {width}x{height}"
            )));
        }

        let global_palette = decoder.global_palette().map(<[u8]>::to_vec).unwrap_or_default();
        let background_hint = decoder
            .bg_color()
            .and_then(|i| global_palette.get(i * 3..i * 3 + 3))
            .map(|c| [c[0], c[1], c[2], 0xff]);
        let loop_count = loop_count(decoder.repeat());

        Ok(Self {
            decoder,
            header: CanvasHeader {
                width,
                height,
                background_hint,
                loop_count,
            },
            global_palette,
            pending: None,
            finished: false,
        })
    }

    fn pending(&mut self) -> Result<Option<&Pending>, SourceError> {
        if self.pending.is_none() && !self.finished {
            match self.decoder.next_frame_info()? {
                Some(frame) => {
                    let palette = frame
                        .palette
                        .clone()
                        .unwrap_or_else(|| self.global_palette.clone());
                    self.pending = Some(Pending {
                        header: frame_header(frame),
                        palette,
                    });
                }
                None => self.finished = true,
            }
            // The NETSCAPE extension may only have been seen now.
            self.header.loop_count = loop_count(self.decoder.repeat());
        }
        Ok(self.pending.as_ref())
    }
}

impl<R: Read> FrameSource for GifSource<R> {
    fn header(&self) -> &CanvasHeader {
        &self.header
    }

    fn peek_frame(&mut self) -> Result<Option<FrameHeader>, SourceError> {
        Ok(self.pending()?.map(|p| p.header))
    }

    fn read_frame(&mut self) -> Result<Option<RawFrame>, SourceError> {
        if self.pending()?.is_none() {
            return Ok(None);
        }
        let Some(Pending { header, palette }) = self.pending.take() else {
            return Ok(None);
        };

        let mut indices = vec![0u8; header.region.area() as usize];
        self.decoder.read_into_buffer(&mut indices)?;

        Ok(Some(RawFrame {
            header,
            pixels: FramePixels::Indexed { indices, palette },
        }))
    }
}

/// `Repeat::Finite(n)` counts repetitions after the first play.
fn loop_count(repeat: Repeat) -> LoopCount {
    match repeat {
        Repeat::Infinite => LoopCount::Forever,
        Repeat::Finite(n) => LoopCount::from(n.saturating_add(1)),
    }
}

fn frame_header(frame: &Frame<'_>) -> FrameHeader {
    let disposal = match frame.dispose {
        DisposalMethod::Background => Disposal::RestoreBackground,
        DisposalMethod::Previous => Disposal::RestorePrevious,
        _ => Disposal::None,
    };
    FrameHeader {
        region: Rect::new(
            u32::from(frame.left),
            u32::from(frame.top),
            u32::from(frame.width),
            u32::from(frame.height),
        ),
        control: Some(ControlBlock {
            disposal,
            transparent_index: frame.transparent,
            delay_ms: u32::from(frame.delay) * DELAY_UNIT_MS,
            blend: Blend::AlphaBlend,
        }),
    }
}
