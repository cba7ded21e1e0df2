//! Streaming WebP frame source.
//!
//! The RIFF container is parsed chunk by chunk straight off the stream, so a
//! glance only consumes the header and the first frame's chunk. Each frame's
//! VP8/VP8L bitstream (plus `ALPH`, if any) is rewrapped as a still WebP and
//! decoded to RGBA with `image-webp`.
//!
//! Supported layouts:
//!
//! - simple lossy (`VP8 `) and lossless (`VP8L`) stills,
//! - extended stills (`VP8X` + optional `ALPH` + `VP8 `/`VP8L`),
//! - animations (`VP8X` + `ANIM` + `ANMF`...).

use std::io::{Cursor, Read};

use byteorder_lite::{ByteOrder, LittleEndian};

use super::{
    CanvasHeader, ControlBlock, FrameHeader, FramePixels, FrameSource, LoopCount, RawFrame,
    SourceError,
};
use crate::frame::{Blend, Disposal, Rect};
use crate::limits::Limits;
use crate::stream::Stream;
use crate::vec_writer::{chunk_size, write_chunk, VecWriter};

const VP8_MAGIC: [u8; 3] = [0x9d, 0x01, 0x2a];
const VP8L_SIGNATURE: u8 = 0x2f;
/// Bytes of the ANMF payload before its sub-chunks.
const ANMF_HEADER_SIZE: usize = 16;

const FLAG_ALPHA: u8 = 0b0001_0000;
const FLAG_ANIMATION: u8 = 0b0000_0010;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Layout {
    Simple,
    ExtendedStill,
    Animated,
}

/// The `VP8 `/`VP8L` chunk of a simple file, whose first bytes were consumed
/// to learn the dimensions.
struct SimpleChunk {
    lossless: bool,
    size: u64,
    prefix: Vec<u8>,
}

/// Compressed data of one frame.
struct FrameBits {
    alpha: Option<Vec<u8>>,
    bitstream: Vec<u8>,
    lossless: bool,
}

impl FrameBits {
    fn has_alpha(&self) -> bool {
        if self.lossless {
            vp8l_alpha_hint(&self.bitstream)
        } else {
            self.alpha.is_some()
        }
    }
}

struct Pending {
    header: FrameHeader,
    bits: FrameBits,
}

/// Streaming WebP frame source.
pub struct WebpSource<R: Read> {
    stream: Stream<R>,
    header: CanvasHeader,
    /// Stream position where the RIFF payload ends.
    riff_end: u64,
    max_payload: Option<u64>,
    layout: Layout,
    simple: Option<SimpleChunk>,
    pending: Option<Pending>,
    finished: bool,
}

impl<R: Read> WebpSource<R> {
    /// Parse the RIFF header and the first chunk.
    ///
    /// For animations this also reads up to and including the `ANIM` chunk.
    pub fn new(mut stream: Stream<R>, limits: &Limits) -> Result<Self, SourceError> {
        let start = stream.position();

        let riff = stream.read_fourcc()?;
        if &riff != b"RIFF" {
            return Err(SourceError::SignatureInvalid(riff));
        }
        let riff_size = u64::from(stream.read_u32_le()?);
        let webp = stream.read_fourcc()?;
        if &webp != b"WEBP" {
            return Err(SourceError::SignatureInvalid(webp));
        }

        let fourcc = stream.read_fourcc()?;
        let size = u64::from(stream.read_u32_le()?);

        let (layout, width, height, simple) = match &fourcc {
            b"VP8 " => {
                if size < 10 {
                    return Err(SourceError::ChunkHeaderInvalid(fourcc));
                }
                let prefix = stream.read_vec(10)?;
                let (w, h) = vp8_dimensions(&prefix)?;
                let chunk = SimpleChunk {
                    lossless: false,
                    size,
                    prefix,
                };
                (Layout::Simple, w, h, Some(chunk))
            }
            b"VP8L" => {
                if size < 5 {
                    return Err(SourceError::ChunkHeaderInvalid(fourcc));
                }
                let prefix = stream.read_vec(5)?;
                let (w, h) = vp8l_dimensions(&prefix)?;
                let chunk = SimpleChunk {
                    lossless: true,
                    size,
                    prefix,
                };
                (Layout::Simple, w, h, Some(chunk))
            }
            b"VP8X" => {
                if size < 10 {
                    return Err(SourceError::ChunkHeaderInvalid(fourcc));
                }
                let flags = stream.read_u8()?;
                stream.skip(3)?;
                let w = stream.read_u24_le()? + 1;
                let h = stream.read_u24_le()? + 1;
                stream.skip(size + (size & 1) - 10)?;
                tracing::trace!(flags, alpha = flags & FLAG_ALPHA != 0, "VP8X header");
                let layout = if flags & FLAG_ANIMATION != 0 {
                    Layout::Animated
                } else {
                    Layout::ExtendedStill
                };
                (layout, w, h, None)
            }
            _ => return Err(SourceError::ChunkHeaderInvalid(fourcc)),
        };

        if width == 0 || height == 0 {
            return Err(SourceError::Malformed(format!(
                "empty canvas {width}x{height}"
            )));
        }

        let mut source = Self {
            stream,
            header: CanvasHeader {
                width,
                height,
                background_hint: None,
                loop_count: LoopCount::ONCE,
            },
            riff_end: start + 8 + riff_size,
            max_payload: limits.max_memory,
            layout,
            simple,
            pending: None,
            finished: false,
        };
        if layout == Layout::Animated {
            source.read_anim()?;
        }
        Ok(source)
    }

    /// Skip to the `ANIM` chunk and read the background color and loop count.
    fn read_anim(&mut self) -> Result<(), SourceError> {
        while let Some((fourcc, size)) = self.next_chunk()? {
            match &fourcc {
                b"ANIM" => {
                    if size < 6 {
                        return Err(SourceError::ChunkHeaderInvalid(fourcc));
                    }
                    let anim = self.read_payload(size)?;
                    // Stored as BGRA.
                    self.header.background_hint = Some([anim[2], anim[1], anim[0], anim[3]]);
                    self.header.loop_count = LoopCount::from(LittleEndian::read_u16(&anim[4..6]));
                    return Ok(());
                }
                b"ANMF" => {
                    return Err(SourceError::Malformed("ANMF before ANIM".into()));
                }
                _ => self.skip_payload(size)?,
            }
        }
        Err(SourceError::Malformed("missing ANIM chunk".into()))
    }

    /// Read the next top-level chunk header.
    ///
    /// Returns `None` at the end of the RIFF payload, or when the data ends
    /// cleanly on a chunk boundary.
    fn next_chunk(&mut self) -> Result<Option<([u8; 4], u64)>, SourceError> {
        if self.stream.position() + 8 > self.riff_end || self.stream.at_eof()? {
            return Ok(None);
        }
        let fourcc = self.stream.read_fourcc()?;
        let size = u64::from(self.stream.read_u32_le()?);
        Ok(Some((fourcc, size)))
    }

    fn read_payload(&mut self, size: u64) -> Result<Vec<u8>, SourceError> {
        if self.max_payload.is_some_and(|max| size > max) {
            return Err(SourceError::PayloadTooLarge(size));
        }
        let data = self.stream.read_vec(size)?;
        self.skip_padding(size)?;
        Ok(data)
    }

    fn skip_payload(&mut self, size: u64) -> Result<(), SourceError> {
        self.stream.skip(size)?;
        self.skip_padding(size)
    }

    /// Odd payloads are followed by one pad byte, which some writers omit at
    /// the very end of the file.
    fn skip_padding(&mut self, size: u64) -> Result<(), SourceError> {
        if size & 1 == 1 && !self.stream.at_eof()? {
            self.stream.skip(1)?;
        }
        Ok(())
    }

    fn full_canvas(&self) -> Rect {
        Rect::new(0, 0, self.header.width, self.header.height)
    }

    fn read_simple(&mut self) -> Result<Option<Pending>, SourceError> {
        let Some(SimpleChunk {
            lossless,
            size,
            mut prefix,
        }) = self.simple.take()
        else {
            return Ok(None);
        };
        let rest = self.read_payload(size - prefix.len() as u64)?;
        prefix.extend_from_slice(&rest);
        let bits = FrameBits {
            alpha: None,
            bitstream: prefix,
            lossless,
        };
        Ok(Some(Pending {
            header: FrameHeader {
                region: self.full_canvas(),
                control: Some(still_control(bits.has_alpha())),
            },
            bits,
        }))
    }

    fn scan_still(&mut self) -> Result<Option<Pending>, SourceError> {
        let mut alpha = None;
        while let Some((fourcc, size)) = self.next_chunk()? {
            match &fourcc {
                b"ALPH" => alpha = Some(self.read_payload(size)?),
                b"VP8 " | b"VP8L" => {
                    let lossless = &fourcc == b"VP8L";
                    let bits = FrameBits {
                        alpha: if lossless { None } else { alpha },
                        bitstream: self.read_payload(size)?,
                        lossless,
                    };
                    return Ok(Some(Pending {
                        header: FrameHeader {
                            region: self.full_canvas(),
                            control: Some(still_control(bits.has_alpha())),
                        },
                        bits,
                    }));
                }
                _ => self.skip_payload(size)?,
            }
        }
        Ok(None)
    }

    fn scan_animated(&mut self) -> Result<Option<Pending>, SourceError> {
        while let Some((fourcc, size)) = self.next_chunk()? {
            if &fourcc == b"ANMF" {
                if size < (ANMF_HEADER_SIZE + 8) as u64 {
                    return Err(SourceError::ChunkHeaderInvalid(fourcc));
                }
                let payload = self.read_payload(size)?;
                return parse_anmf(&payload).map(Some);
            }
            self.skip_payload(size)?;
        }
        Ok(None)
    }

    fn pending(&mut self) -> Result<Option<&Pending>, SourceError> {
        if self.pending.is_none() && !self.finished {
            let next = match self.layout {
                Layout::Simple => self.read_simple()?,
                Layout::ExtendedStill => self.scan_still()?,
                Layout::Animated => self.scan_animated()?,
            };
            match next {
                Some(pending) => {
                    self.finished = self.layout != Layout::Animated;
                    self.pending = Some(pending);
                }
                None => self.finished = true,
            }
        }
        Ok(self.pending.as_ref())
    }
}

impl<R: Read> FrameSource for WebpSource<R> {
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
        let Some(Pending { header, bits }) = self.pending.take() else {
            return Ok(None);
        };
        let rgba = decode_bits(&bits, header.region.width, header.region.height)?;
        Ok(Some(RawFrame {
            header,
            pixels: FramePixels::Rgba(rgba),
        }))
    }
}

fn still_control(has_alpha: bool) -> ControlBlock {
    ControlBlock {
        disposal: Disposal::None,
        transparent_index: has_alpha.then_some(0),
        delay_ms: 0,
        blend: Blend::Overwrite,
    }
}

/// Read a 24-bit little-endian value from 3 bytes.
fn read_u24_le(bytes: &[u8]) -> u32 {
    u32::from(bytes[0]) | (u32::from(bytes[1]) << 8) | (u32::from(bytes[2]) << 16)
}

fn vp8_dimensions(prefix: &[u8]) -> Result<(u32, u32), SourceError> {
    let tag = read_u24_le(&prefix[0..3]);
    if tag & 1 != 0 {
        return Err(SourceError::Unsupported("non-keyframe VP8 frame".into()));
    }
    if prefix[3..6] != VP8_MAGIC {
        return Err(SourceError::Malformed(format!(
            "invalid VP8 magic: {:x?}",
            &prefix[3..6]
        )));
    }
    let w = LittleEndian::read_u16(&prefix[6..8]) & 0x3fff;
    let h = LittleEndian::read_u16(&prefix[8..10]) & 0x3fff;
    Ok((u32::from(w), u32::from(h)))
}

fn vp8l_dimensions(prefix: &[u8]) -> Result<(u32, u32), SourceError> {
    if prefix[0] != VP8L_SIGNATURE {
        return Err(SourceError::Malformed(format!(
            "invalid VP8L signature: {:x}",
            prefix[0]
        )));
    }
    let header = LittleEndian::read_u32(&prefix[1..5]);
    let version = header >> 29;
    if version != 0 {
        return Err(SourceError::Unsupported(format!("VP8L version {version}")));
    }
    Ok(((header & 0x3fff) + 1, ((header >> 14) & 0x3fff) + 1))
}

/// The `alpha_is_used` bit of a VP8L header.
fn vp8l_alpha_hint(bitstream: &[u8]) -> bool {
    bitstream.len() >= 5
        && bitstream[0] == VP8L_SIGNATURE
        && (LittleEndian::read_u32(&bitstream[1..5]) >> 28) & 1 != 0
}

// ANMF payload layout:
// 3 bytes: Frame X (in 2-pixel units)
// 3 bytes: Frame Y (in 2-pixel units)
// 3 bytes: Frame Width Minus One
// 3 bytes: Frame Height Minus One
// 3 bytes: Frame Duration
// 1 byte:  Flags (dispose[0], blend[1], reserved[2-7])
// Then: sub-chunks (ALPH + VP8, or VP8L)
fn parse_anmf(d: &[u8]) -> Result<Pending, SourceError> {
    let region = Rect::new(
        read_u24_le(&d[0..3]) * 2,
        read_u24_le(&d[3..6]) * 2,
        read_u24_le(&d[6..9]) + 1,
        read_u24_le(&d[9..12]) + 1,
    );
    let delay_ms = read_u24_le(&d[12..15]);
    let flags = d[15];
    let disposal = if flags & 1 != 0 {
        Disposal::RestoreBackground
    } else {
        Disposal::None
    };
    let blend = if flags & 2 != 0 {
        Blend::Overwrite
    } else {
        Blend::AlphaBlend
    };

    let mut alpha = None;
    let mut sub = &d[ANMF_HEADER_SIZE..];
    while sub.len() >= 8 {
        let fourcc = [sub[0], sub[1], sub[2], sub[3]];
        let size = LittleEndian::read_u32(&sub[4..8]) as usize;
        let end = 8usize
            .checked_add(size)
            .ok_or(SourceError::ChunkHeaderInvalid(fourcc))?;
        let body = sub.get(8..end).ok_or(SourceError::Truncated)?;
        match &fourcc {
            b"ALPH" => alpha = Some(body.to_vec()),
            b"VP8 " | b"VP8L" => {
                let lossless = &fourcc == b"VP8L";
                let bits = FrameBits {
                    alpha: if lossless { None } else { alpha },
                    bitstream: body.to_vec(),
                    lossless,
                };
                let control = ControlBlock {
                    disposal,
                    transparent_index: bits.has_alpha().then_some(0),
                    delay_ms,
                    blend,
                };
                return Ok(Pending {
                    header: FrameHeader {
                        region,
                        control: Some(control),
                    },
                    bits,
                });
            }
            _ => {}
        }
        sub = &sub[(end + (size & 1)).min(sub.len())..];
    }
    Err(SourceError::Malformed("ANMF chunk without image data".into()))
}

/// Rewrap a frame's chunks as a still WebP file.
fn still_container(bits: &FrameBits, width: u32, height: u32) -> Vec<u8> {
    let image_chunk = if bits.lossless { b"VP8L" } else { b"VP8 " };
    let mut out = Vec::new();

    match &bits.alpha {
        Some(alpha) if !bits.lossless => {
            let total = 4 + chunk_size(10) + chunk_size(alpha.len()) + chunk_size(bits.bitstream.len());
            out.write_all(b"RIFF");
            out.write_u32_le(total);
            out.write_all(b"WEBP");

            let mut vp8x = Vec::with_capacity(10);
            vp8x.push(FLAG_ALPHA);
            vp8x.write_all(&[0; 3]);
            vp8x.write_u24_le(width - 1);
            vp8x.write_u24_le(height - 1);
            write_chunk(&mut out, b"VP8X", &vp8x);
            write_chunk(&mut out, b"ALPH", alpha);
        }
        _ => {
            out.write_all(b"RIFF");
            out.write_u32_le(4 + chunk_size(bits.bitstream.len()));
            out.write_all(b"WEBP");
        }
    }
    write_chunk(&mut out, image_chunk, &bits.bitstream);
    out
}

/// Decode one frame's bitstream to RGBA8.
fn decode_bits(bits: &FrameBits, width: u32, height: u32) -> Result<Vec<u8>, SourceError> {
    let container = still_container(bits, width, height);
    let mut decoder = image_webp::WebPDecoder::new(Cursor::new(container))?;
    if decoder.dimensions() != (width, height) {
        let (w, h) = decoder.dimensions();
        return Err(SourceError::Malformed(format!(
            "frame declared {width}x{height} but bitstream is {w}x{h}"
        )));
    }
    let size = decoder
        .output_buffer_size()
        .ok_or_else(|| SourceError::Malformed("frame too large".into()))?;
    let mut buf = vec![0u8; size];
    decoder.read_image(&mut buf)?;

    if decoder.has_alpha() {
        Ok(buf)
    } else {
        let mut rgba = Vec::with_capacity(buf.len() / 3 * 4);
        for px in buf.chunks_exact(3) {
            rgba.extend_from_slice(&[px[0], px[1], px[2], 0xff]);
        }
        Ok(rgba)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vp8l_header_fields() {
        // 3x2, alpha used, version 0.
        let header: u32 = 2 | (1 << 14) | (1 << 28);
        let mut prefix = vec![VP8L_SIGNATURE];
        prefix.extend_from_slice(&header.to_le_bytes());
        assert_eq!(vp8l_dimensions(&prefix).unwrap(), (3, 2));
        assert!(vp8l_alpha_hint(&prefix));

        prefix[0] = 0;
        assert!(matches!(vp8l_dimensions(&prefix), Err(SourceError::Malformed(_))));
    }

    #[test]
    fn vp8_rejects_interframes() {
        let prefix = [0x01, 0, 0, 0x9d, 0x01, 0x2a, 4, 0, 4, 0];
        assert!(matches!(vp8_dimensions(&prefix), Err(SourceError::Unsupported(_))));
        let prefix = [0x00, 0, 0, 0x9d, 0x01, 0x2a, 4, 0, 3, 0];
        assert_eq!(vp8_dimensions(&prefix).unwrap(), (4, 3));
    }

    #[test]
    fn anmf_fields_and_subchunks() {
        let mut d = Vec::new();
        d.write_u24_le(3); // x = 6
        d.write_u24_le(1); // y = 2
        d.write_u24_le(9); // w = 10
        d.write_u24_le(4); // h = 5
        d.write_u24_le(120);
        d.push(0b11);
        write_chunk(&mut d, b"XYZW", &[1, 2, 3]);
        write_chunk(&mut d, b"VP8 ", &[0; 12]);

        let pending = parse_anmf(&d).unwrap();
        assert_eq!(pending.header.region, Rect::new(6, 2, 10, 5));
        let control = pending.header.control.unwrap();
        assert_eq!(control.delay_ms, 120);
        assert_eq!(control.disposal, Disposal::RestoreBackground);
        assert_eq!(control.blend, Blend::Overwrite);
        assert_eq!(control.transparent_index, None);
        assert!(!pending.bits.lossless);
        assert_eq!(pending.bits.bitstream.len(), 12);
    }

    #[test]
    fn anmf_without_image_is_malformed() {
        let mut d = vec![0u8; ANMF_HEADER_SIZE];
        write_chunk(&mut d, b"ALPH", &[0; 4]);
        assert!(matches!(parse_anmf(&d), Err(SourceError::Malformed(_))));
    }

    #[test]
    fn lossy_alpha_container_is_extended() {
        let bits = FrameBits {
            alpha: Some(vec![0; 3]),
            bitstream: vec![0; 10],
            lossless: false,
        };
        let out = still_container(&bits, 4, 4);
        assert_eq!(&out[12..16], b"VP8X");
        assert_eq!(&out[30..34], b"ALPH");
        let riff_size = LittleEndian::read_u32(&out[4..8]) as usize;
        assert_eq!(riff_size + 8, out.len());
    }
}
