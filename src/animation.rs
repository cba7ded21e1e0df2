//! The animation cursor.
//!
//! An [`Animation`] owns the frame records, the composite canvas and, in
//! streaming mode, the decoder. Frames are composited strictly in order as
//! the cursor advances:
//!
//! ```text
//! Unstarted --advance--> Presenting(0) --advance--> ... --advance--> Finished(n-1)
//!     \___________________________ recycle ___________________________/
//!                                      |
//!                                   Recycled
//! ```

use std::collections::VecDeque;

use crate::adapter::DecoderHandle;
use crate::canvas::Canvas;
use crate::codec::ImageFormat;
use crate::config::{DecodeConfig, DecodeMode};
use crate::error::DecodeError;
use crate::frame::{FrameRecord, FrameStore};
use crate::source::{FrameSource, LoopCount, RawFrame};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cursor {
    Unstarted,
    Presenting(usize),
    Finished(usize),
}

/// Where frames come from.
enum Supply<'a> {
    /// Every frame was decoded up front.
    Eager(Vec<RawFrame>),
    /// Frames are decoded as the cursor advances. `decoder` is `None` once
    /// the stream has been released.
    Streaming {
        decoder: Option<DecoderHandle<'a>>,
        /// Frames decoded by [`Animation::complete`] but not presented yet.
        pending: VecDeque<RawFrame>,
        /// Frames taken from the decoder so far, presented or pending.
        pulled: usize,
    },
}

struct Inner<'a> {
    format: ImageFormat,
    width: u32,
    height: u32,
    opaque: bool,
    completed: bool,
    loop_count: LoopCount,
    store: FrameStore,
    canvas: Canvas,
    supply: Supply<'a>,
    cursor: Cursor,
}

/// A decoded animation, presented one frame at a time.
///
/// Every method returns [`DecodeError::UseAfterRecycle`] once
/// [`recycle`](Self::recycle) has been called.
///
/// # Example
///
/// ```no_run
/// use zenanim::{decode, DecodeConfig, DecodeMode};
///
/// let file = std::fs::File::open("anim.gif")?;
/// let mut anim = decode(std::io::BufReader::new(file), DecodeMode::Streaming, &DecodeConfig::new())?;
/// loop {
///     match anim.advance() {
///         Ok(index) => println!("frame {index}, {} ms", anim.delay(index)?),
///         Err(e) if e.is_end_of_animation() => break,
///         Err(e) => return Err(e.into()),
///     }
/// }
/// anim.recycle()?;
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct Animation<'a> {
    inner: Option<Inner<'a>>,
}

impl<'a> Animation<'a> {
    pub(crate) fn open(
        mut decoder: DecoderHandle<'a>,
        mode: DecodeMode,
        config: &DecodeConfig,
    ) -> Result<Self, DecodeError> {
        let header = decoder.header().clone();
        let format = decoder.format();
        let background = config.resolve_background(header.background_hint);
        let mut store = FrameStore::new();

        let (supply, canvas, opaque, completed, loop_count) = match mode {
            DecodeMode::Eager => {
                let frames = decoder.slurp()?;
                let limits = decoder.limits().clone();
                let loop_count = decoder.header().loop_count;
                decoder.close();
                for frame in &frames {
                    store.record_frame(frame.header.control.as_ref(), frame.header.region);
                }
                let canvas = Canvas::new(
                    header.width,
                    header.height,
                    background,
                    store.uses_backup(),
                    &limits,
                )?;
                let opaque = store
                    .get(0)
                    .is_some_and(|r| r.transparent_index.is_none());
                (Supply::Eager(frames), canvas, opaque, true, loop_count)
            }
            DecodeMode::Streaming => {
                let first = decoder.glance()?;
                let loop_count = decoder.header().loop_count;
                store.record_frame(first.control.as_ref(), first.region);
                let opaque = store
                    .get(0)
                    .is_some_and(|r| r.transparent_index.is_none());
                let canvas = Canvas::new(
                    header.width,
                    header.height,
                    background,
                    false,
                    decoder.limits(),
                )?;
                let supply = Supply::Streaming {
                    decoder: Some(decoder),
                    pending: VecDeque::new(),
                    pulled: 0,
                };
                (supply, canvas, opaque, false, loop_count)
            }
        };

        tracing::debug!(
            %format,
            width = header.width,
            height = header.height,
            ?mode,
            frames = store.len(),
            opaque,
            "animation ready"
        );

        Ok(Self {
            inner: Some(Inner {
                format,
                width: header.width,
                height: header.height,
                opaque,
                completed,
                loop_count,
                store,
                canvas,
                supply,
                cursor: Cursor::Unstarted,
            }),
        })
    }

    /// Open an animation over a caller-provided [`FrameSource`].
    ///
    /// `format` is what [`format`](Self::format) reports. Frames whose
    /// [`FrameHeader::control`](crate::source::FrameHeader::control) is `None`
    /// are recorded with default control data (no disposal, no transparency,
    /// zero delay) and logged at `warn`.
    pub fn from_source<S: FrameSource + 'a>(
        source: S,
        format: ImageFormat,
        mode: DecodeMode,
        config: &DecodeConfig,
    ) -> Result<Self, DecodeError> {
        let decoder = DecoderHandle::from_source(Box::new(source), format, config.limits.clone())?;
        Self::open(decoder, mode, config)
    }

    fn inner(&self) -> Result<&Inner<'a>, DecodeError> {
        self.inner.as_ref().ok_or(DecodeError::UseAfterRecycle)
    }

    fn inner_mut(&mut self) -> Result<&mut Inner<'a>, DecodeError> {
        self.inner.as_mut().ok_or(DecodeError::UseAfterRecycle)
    }

    /// Canvas width in pixels.
    pub fn width(&self) -> Result<u32, DecodeError> {
        Ok(self.inner()?.width)
    }

    /// Canvas height in pixels.
    pub fn height(&self) -> Result<u32, DecodeError> {
        Ok(self.inner()?.height)
    }

    /// Container format.
    pub fn format(&self) -> Result<ImageFormat, DecodeError> {
        Ok(self.inner()?.format)
    }

    /// `true` when the first frame declares no transparency.
    pub fn opaque(&self) -> Result<bool, DecodeError> {
        Ok(self.inner()?.opaque)
    }

    /// `true` once every frame is known and the stream has been released.
    pub fn completed(&self) -> Result<bool, DecodeError> {
        Ok(self.inner()?.completed)
    }

    /// Number of frames known so far. Grows while streaming.
    pub fn frame_count(&self) -> Result<usize, DecodeError> {
        Ok(self.inner()?.store.len())
    }

    /// Display time of frame `index`, in milliseconds.
    pub fn delay(&self, index: usize) -> Result<u32, DecodeError> {
        let inner = self.inner()?;
        inner
            .store
            .get(index)
            .map(|r| r.delay_ms)
            .ok_or_else(|| {
                DecodeError::InvalidParameter(format!(
                    "frame {index} out of range ({} known)",
                    inner.store.len()
                ))
            })
    }

    /// Size of the composite buffer in bytes.
    pub fn byte_count(&self) -> Result<usize, DecodeError> {
        Ok(self.inner()?.canvas.byte_count())
    }

    /// The composite canvas, row-major RGBA8.
    pub fn pixels(&self) -> Result<&[u8], DecodeError> {
        Ok(self.inner()?.canvas.pixels())
    }

    /// Index of the frame on the canvas, `None` before the first advance.
    pub fn current_index(&self) -> Result<Option<usize>, DecodeError> {
        Ok(match self.inner()?.cursor {
            Cursor::Unstarted => None,
            Cursor::Presenting(i) | Cursor::Finished(i) => Some(i),
        })
    }

    /// Loop count declared by the container.
    pub fn loop_count(&self) -> Result<LoopCount, DecodeError> {
        Ok(self.inner()?.loop_count)
    }

    /// Sum of the known frames' delays.
    pub fn total_duration_ms(&self) -> Result<u64, DecodeError> {
        Ok(self.inner()?.store.total_delay_ms())
    }

    /// Records of the known frames.
    pub fn records(&self) -> Result<&[FrameRecord], DecodeError> {
        Ok(self.inner()?.store.records())
    }

    /// Composite the next frame and return its index.
    ///
    /// Past the last frame this returns [`DecodeError::EndOfAnimation`]. In
    /// streaming mode a frame that fails to decode returns
    /// [`DecodeError::Frame`] and ends the animation at the frame before it:
    /// the stream is released, [`frame_count`](Self::frame_count) drops the
    /// failed frame and later calls return `EndOfAnimation`.
    pub fn advance(&mut self) -> Result<usize, DecodeError> {
        self.inner_mut()?.advance()
    }

    /// Decode every remaining frame now and release the stream.
    ///
    /// A frame that fails to decode ends the animation before it. Frames are
    /// still presented through [`advance`](Self::advance). Does nothing when
    /// already completed. Returns [`DecodeError::NoFrames`] when no frame of
    /// the stream could be decoded.
    pub fn complete(&mut self) -> Result<(), DecodeError> {
        self.inner_mut()?.complete()
    }

    /// Return to the state before the first frame.
    ///
    /// Only eagerly decoded animations can be rewound.
    pub fn rewind(&mut self) -> Result<(), DecodeError> {
        let inner = self.inner_mut()?;
        if !matches!(inner.supply, Supply::Eager(_)) {
            return Err(DecodeError::InvalidParameter(
                "only eagerly decoded animations can be rewound".into(),
            ));
        }
        inner.canvas.reset();
        inner.cursor = Cursor::Unstarted;
        Ok(())
    }

    /// Release the buffers and, if still held, the stream.
    pub fn recycle(&mut self) -> Result<(), DecodeError> {
        let inner = self.inner.take().ok_or(DecodeError::UseAfterRecycle)?;
        tracing::trace!(format = %inner.format, frames = inner.store.len(), "recycled");
        Ok(())
    }
}

impl std::fmt::Debug for Animation<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.inner {
            Some(inner) => f
                .debug_struct("Animation")
                .field("format", &inner.format)
                .field("width", &inner.width)
                .field("height", &inner.height)
                .field("frames", &inner.store.len())
                .field("completed", &inner.completed)
                .field("cursor", &inner.cursor)
                .finish(),
            None => f.write_str("Animation(recycled)"),
        }
    }
}

impl Inner<'_> {
    fn advance(&mut self) -> Result<usize, DecodeError> {
        let index = match self.cursor {
            Cursor::Unstarted => 0,
            Cursor::Presenting(i) => i + 1,
            Cursor::Finished(_) => return Err(DecodeError::EndOfAnimation),
        };

        let streamed = match self.supply {
            Supply::Streaming { .. } => self.pull()?,
            Supply::Eager(_) => None,
        };
        let frame = match (&self.supply, &streamed) {
            (Supply::Eager(frames), _) => frames.get(index),
            (Supply::Streaming { .. }, streamed) => streamed.as_ref(),
        };

        let Some(frame) = frame else {
            if let Cursor::Presenting(last) = self.cursor {
                self.cursor = Cursor::Finished(last);
            }
            return Err(DecodeError::EndOfAnimation);
        };

        if self.store.len() <= index {
            self.store.record_frame(frame.header.control.as_ref(), frame.header.region);
        }
        let previous = index.checked_sub(1).and_then(|i| self.store.get(i)).copied();
        let record = self.store.get(index).copied().ok_or_else(|| {
            DecodeError::InvalidParameter(format!("frame {index} has no record"))
        })?;

        self.canvas.compose(previous.as_ref(), &record, &frame.pixels)?;
        self.cursor = Cursor::Presenting(index);
        Ok(index)
    }

    /// Take the next frame in streaming mode, releasing the stream at its end.
    fn pull(&mut self) -> Result<Option<RawFrame>, DecodeError> {
        let Supply::Streaming {
            decoder,
            pending,
            pulled,
        } = &mut self.supply
        else {
            return Ok(None);
        };
        if let Some(frame) = pending.pop_front() {
            return Ok(Some(frame));
        }
        let Some(handle) = decoder.as_mut() else {
            return Ok(None);
        };
        let error = match handle.next() {
            Ok(Some(frame)) => {
                *pulled += 1;
                return Ok(Some(frame));
            }
            Ok(None) => None,
            Err(e) => Some(e),
        };

        // A failed frame ends the stream; nothing after it is presented.
        if let Some(handle) = decoder.take() {
            handle.close();
        }
        self.store.truncate(*pulled);
        self.completed = true;
        match error {
            Some(e) => {
                tracing::warn!(error = %e, kept = *pulled, "truncating animation");
                Err(e)
            }
            None => {
                tracing::debug!(frames = *pulled, "end of stream");
                Ok(None)
            }
        }
    }

    fn complete(&mut self) -> Result<(), DecodeError> {
        let Supply::Streaming {
            decoder,
            pending,
            pulled,
        } = &mut self.supply
        else {
            return Ok(());
        };
        if let Some(mut handle) = decoder.take() {
            loop {
                match handle.next() {
                    Ok(Some(frame)) => {
                        if self.store.len() <= *pulled {
                            self.store
                                .record_frame(frame.header.control.as_ref(), frame.header.region);
                        }
                        *pulled += 1;
                        pending.push_back(frame);
                    }
                    Ok(None) => break,
                    Err(e) => {
                        tracing::warn!(error = %e, kept = *pulled, "truncating animation");
                        break;
                    }
                }
            }
            handle.close();
            self.store.truncate(*pulled);
            self.completed = true;
            tracing::debug!(frames = *pulled, "completed animation");
        }
        if *pulled == 0 {
            return Err(DecodeError::NoFrames);
        }
        Ok(())
    }
}
