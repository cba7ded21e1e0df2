//! Fixture builders shared by the integration tests.
#![allow(dead_code)]

use std::borrow::Cow;

use gif::{DisposalMethod, Encoder, Repeat};
use image_webp::{ColorType, WebPEncoder};

pub const RED: [u8; 4] = [255, 0, 0, 255];
pub const GREEN: [u8; 4] = [0, 255, 0, 255];
pub const BLUE: [u8; 4] = [0, 0, 255, 255];
pub const CLEAR: [u8; 4] = [0, 0, 0, 0];

/// RGB palette used by the GIF fixtures: 0 = red, 1 = green, 2 = blue, 3 = white.
pub const PALETTE: [u8; 12] = [255, 0, 0, 0, 255, 0, 0, 0, 255, 255, 255, 255];

/// Pixel at (x, y) of an RGBA canvas `width` pixels wide.
pub fn pixel(rgba: &[u8], width: u32, x: u32, y: u32) -> [u8; 4] {
    let i = ((y * width + x) * 4) as usize;
    [rgba[i], rgba[i + 1], rgba[i + 2], rgba[i + 3]]
}

/// Create a solid-color RGBA frame.
pub fn solid_rgba(width: u32, height: u32, color: [u8; 4]) -> Vec<u8> {
    color.repeat((width * height) as usize)
}

// ============================================================================
// GIF
// ============================================================================

/// One GIF frame filled with a single palette index.
pub struct GifFrame {
    pub left: u16,
    pub top: u16,
    pub width: u16,
    pub height: u16,
    pub index: u8,
    pub transparent: Option<u8>,
    pub dispose: DisposalMethod,
    /// Hundredths of a second.
    pub delay: u16,
}

impl GifFrame {
    pub fn full(width: u16, height: u16, index: u8) -> Self {
        Self {
            left: 0,
            top: 0,
            width,
            height,
            index,
            transparent: None,
            dispose: DisposalMethod::Keep,
            delay: 0,
        }
    }

    pub fn at(left: u16, top: u16, width: u16, height: u16, index: u8) -> Self {
        Self {
            left,
            top,
            ..Self::full(width, height, index)
        }
    }

    pub fn dispose(mut self, dispose: DisposalMethod) -> Self {
        self.dispose = dispose;
        self
    }

    pub fn delay(mut self, delay: u16) -> Self {
        self.delay = delay;
        self
    }

    pub fn transparent(mut self, index: u8) -> Self {
        self.transparent = Some(index);
        self
    }
}

/// Encode a GIF using [`PALETTE`] as the global palette.
pub fn gif(width: u16, height: u16, frames: &[GifFrame], repeat: Repeat) -> Vec<u8> {
    let mut out = Vec::new();
    {
        let mut encoder = Encoder::new(&mut out, width, height, &PALETTE).unwrap();
        encoder.set_repeat(repeat).unwrap();
        for f in frames {
            let mut frame = gif::Frame::default();
            frame.left = f.left;
            frame.top = f.top;
            frame.width = f.width;
            frame.height = f.height;
            frame.transparent = f.transparent;
            frame.dispose = f.dispose;
            frame.delay = f.delay;
            frame.buffer = Cow::Owned(vec![f.index; usize::from(f.width) * usize::from(f.height)]);
            encoder.write_frame(&frame).unwrap();
        }
    }
    out
}

/// Byte offset where frame `index` starts in a GIF built from `frames`.
pub fn gif_frame_offset(width: u16, height: u16, frames: &[GifFrame], index: usize) -> usize {
    // Everything but the trailer byte.
    gif(width, height, &frames[..index], Repeat::Infinite).len() - 1
}

/// Replace the image separator of frame `index` with an unknown block type,
/// so its header and pixels cannot be read.
pub fn corrupt_gif_frame(
    data: &mut [u8],
    width: u16,
    height: u16,
    frames: &[GifFrame],
    index: usize,
) {
    let mut pos = gif_frame_offset(width, height, frames, index);
    // Skip the graphic control extension and any other extension blocks.
    while data[pos] == 0x21 {
        pos += 2;
        while data[pos] != 0 {
            pos += usize::from(data[pos]) + 1;
        }
        pos += 1;
    }
    assert_eq!(data[pos], 0x2c, "expected an image descriptor");
    data[pos] = 0x42;
}

// ============================================================================
// WebP
// ============================================================================

/// Encode a still lossless WebP. Opaque input is encoded without alpha.
pub fn still_webp(rgba: &[u8], width: u32, height: u32) -> Vec<u8> {
    let mut out = Vec::new();
    if rgba.chunks_exact(4).all(|px| px[3] == 255) {
        let rgb: Vec<u8> = rgba
            .chunks_exact(4)
            .flat_map(|px| [px[0], px[1], px[2]])
            .collect();
        WebPEncoder::new(&mut out)
            .encode(&rgb, width, height, ColorType::Rgb8)
            .unwrap();
    } else {
        WebPEncoder::new(&mut out)
            .encode(rgba, width, height, ColorType::Rgba8)
            .unwrap();
    }
    out
}

/// The `VP8L` chunk (header, payload and padding) of a still lossless WebP.
fn vp8l_chunk(rgba: &[u8], width: u32, height: u32) -> Vec<u8> {
    let file = still_webp(rgba, width, height);
    let pos = file.windows(4).position(|w| w == b"VP8L").unwrap();
    let size = u32::from_le_bytes(file[pos + 4..pos + 8].try_into().unwrap()) as usize;
    let end = (pos + 8 + size + (size & 1)).min(file.len());
    let mut chunk = file[pos..end].to_vec();
    if chunk.len() % 2 == 1 {
        chunk.push(0);
    }
    chunk
}

/// One ANMF frame.
pub struct WebpFrame {
    /// Must be even.
    pub x: u32,
    /// Must be even.
    pub y: u32,
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
    pub duration_ms: u32,
    pub dispose_background: bool,
    pub overwrite: bool,
}

impl WebpFrame {
    pub fn solid(x: u32, y: u32, width: u32, height: u32, color: [u8; 4]) -> Self {
        Self {
            x,
            y,
            width,
            height,
            rgba: solid_rgba(width, height, color),
            duration_ms: 0,
            dispose_background: false,
            overwrite: false,
        }
    }

    pub fn duration(mut self, ms: u32) -> Self {
        self.duration_ms = ms;
        self
    }

    pub fn dispose_background(mut self) -> Self {
        self.dispose_background = true;
        self
    }

    pub fn overwrite(mut self) -> Self {
        self.overwrite = true;
        self
    }
}

/// An animated WebP plus the byte offset of each `ANMF` chunk.
pub struct Muxed {
    pub data: Vec<u8>,
    pub frame_offsets: Vec<usize>,
}

fn push_u24(out: &mut Vec<u8>, v: u32) {
    out.extend_from_slice(&v.to_le_bytes()[..3]);
}

fn push_chunk(out: &mut Vec<u8>, name: &[u8; 4], data: &[u8]) {
    out.extend_from_slice(name);
    out.extend_from_slice(&(data.len() as u32).to_le_bytes());
    out.extend_from_slice(data);
    if data.len() % 2 == 1 {
        out.push(0);
    }
}

impl Muxed {
    /// Zero the VP8L signature of frame `index`. Its `ANMF` header still
    /// parses; decoding its pixels fails.
    pub fn corrupt_frame(&mut self, index: usize) {
        // ANMF chunk header, ANMF fields, VP8L chunk header.
        let signature = self.frame_offsets[index] + 8 + 16 + 8;
        assert_eq!(self.data[signature], 0x2f);
        self.data[signature] = 0;
    }
}

/// Assemble an animated WebP. `background` is RGBA; it is stored as BGRA.
pub fn animated_webp(
    width: u32,
    height: u32,
    background: [u8; 4],
    loop_count: u16,
    frames: &[WebpFrame],
) -> Muxed {
    let mut body = Vec::new();
    body.extend_from_slice(b"WEBP");

    let mut vp8x = vec![0x10 | 0x02, 0, 0, 0];
    push_u24(&mut vp8x, width - 1);
    push_u24(&mut vp8x, height - 1);
    push_chunk(&mut body, b"VP8X", &vp8x);

    let mut anim = vec![background[2], background[1], background[0], background[3]];
    anim.extend_from_slice(&loop_count.to_le_bytes());
    push_chunk(&mut body, b"ANIM", &anim);

    let mut frame_offsets = Vec::new();
    for f in frames {
        let mut anmf = Vec::new();
        push_u24(&mut anmf, f.x / 2);
        push_u24(&mut anmf, f.y / 2);
        push_u24(&mut anmf, f.width - 1);
        push_u24(&mut anmf, f.height - 1);
        push_u24(&mut anmf, f.duration_ms);
        anmf.push(u8::from(f.dispose_background) | (u8::from(f.overwrite) << 1));
        anmf.extend_from_slice(&vp8l_chunk(&f.rgba, f.width, f.height));

        // RIFF header is 8 bytes ahead of `body`.
        frame_offsets.push(8 + body.len());
        push_chunk(&mut body, b"ANMF", &anmf);
    }

    let mut data = Vec::with_capacity(8 + body.len());
    data.extend_from_slice(b"RIFF");
    data.extend_from_slice(&(body.len() as u32).to_le_bytes());
    data.extend_from_slice(&body);
    Muxed {
        data,
        frame_offsets,
    }
}
