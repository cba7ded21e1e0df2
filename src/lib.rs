//! Frame assembly for animated GIF and WebP images.
//!
//! This crate turns a stream of raw decoded frames and their control data
//! (disposal, transparency, delay) into a navigable animation: every call to
//! [`Animation::advance`] leaves the fully composited next frame on an RGBA8
//! canvas.
//!
//! Bitstream decoding is delegated: GIF frames come from the [`gif`] crate,
//! WebP frames from [`image-webp`]. The WebP container itself is parsed here,
//! chunk by chunk, so streaming decodes only read what they present.
//!
//! # Decoding
//!
//! ```rust,no_run
//! use zenanim::{decode, DecodeConfig, DecodeMode};
//!
//! let data: &[u8] = &[]; // your GIF or WebP data
//! let mut anim = decode(data, DecodeMode::Eager, &DecodeConfig::new())?;
//! println!(
//!     "{}x{}, {} frames, {} ms",
//!     anim.width()?,
//!     anim.height()?,
//!     anim.frame_count()?,
//!     anim.total_duration_ms()?
//! );
//! while let Ok(index) = anim.advance() {
//!     let rgba = anim.pixels()?;
//!     // show `rgba` for anim.delay(index)? milliseconds
//! #   let _ = (rgba, index);
//! }
//! # Ok::<(), zenanim::DecodeError>(())
//! ```
//!
//! # Modes
//!
//! - [`DecodeMode::Eager`] decodes every frame before returning. A frame that
//!   fails to decode truncates the animation; [`Animation::frame_count`]
//!   reports the frames that survived.
//! - [`DecodeMode::Streaming`] reads only the first frame header up front and
//!   decodes on [`Animation::advance`]. The frame count grows as frames are
//!   discovered and [`Animation::completed`] turns `true` at the end of the
//!   stream.
//!
//! # Probing
//!
//! ```rust,no_run
//! let data: &[u8] = &[];
//! let info = zenanim::probe(data)?;
//! println!("{}x{} {}", info.width, info.height, info.format);
//! # Ok::<(), zenanim::DecodeError>(())
//! ```
//!
//! [`gif`]: https://docs.rs/gif
//! [`image-webp`]: https://docs.rs/image-webp

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod adapter;
mod animation;
mod canvas;
mod codec;
mod config;
mod error;
mod frame;
mod limits;
pub mod source;
mod stream;
mod vec_writer;

use std::io::Read;

pub use animation::Animation;
pub use codec::{Codec, CodecRegistry, ImageFormat, ImageInfo};
pub use config::{DecodeConfig, DecodeMode};
pub use error::DecodeError;
pub use frame::{Blend, Disposal, FrameRecord, FrameStore, Prepare, Rect};
pub use limits::Limits;
pub use source::{LoopCount, SourceError};
pub use stream::Stream;

/// Detect the format of `reader` and open it as an animation, with every
/// codec enabled.
pub fn decode<'a, R: Read + 'a>(
    reader: R,
    mode: DecodeMode,
    config: &DecodeConfig,
) -> Result<Animation<'a>, DecodeError> {
    CodecRegistry::all().decode(reader, mode, config)
}

/// Read only the header of `reader`: dimensions and format.
///
/// The frame count is always reported as unknown.
pub fn probe<R: Read>(reader: R) -> Result<ImageInfo, DecodeError> {
    CodecRegistry::all().probe(reader)
}
