//! Criterion benchmarks for frame assembly.
//!
//! Run with: cargo bench --bench decode_benchmark

use std::borrow::Cow;
use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use zenanim::{decode, DecodeConfig, DecodeMode};

const FRAMES: u16 = 24;

/// A GIF where each frame moves a small square and disposes it to background.
fn make_gif(size: u16) -> Vec<u8> {
    let palette = [0, 0, 0, 255, 0, 0, 0, 255, 0, 0, 0, 255];
    let square = size / 4;
    let mut out = Vec::new();
    {
        let mut encoder = gif::Encoder::new(&mut out, size, size, &palette).unwrap();
        encoder.set_repeat(gif::Repeat::Infinite).unwrap();
        for i in 0..FRAMES {
            let mut frame = gif::Frame::default();
            frame.left = (i * 3) % (size - square);
            frame.top = (i * 5) % (size - square);
            frame.width = square;
            frame.height = square;
            frame.delay = 4;
            frame.dispose = if i % 2 == 0 {
                gif::DisposalMethod::Background
            } else {
                gif::DisposalMethod::Previous
            };
            frame.buffer = Cow::Owned(vec![(i % 3 + 1) as u8; usize::from(square).pow(2)]);
            encoder.write_frame(&frame).unwrap();
        }
    }
    out
}

/// An animated lossless WebP of full-canvas frames.
fn make_webp(size: u32) -> Vec<u8> {
    fn chunk(out: &mut Vec<u8>, name: &[u8; 4], data: &[u8]) {
        out.extend_from_slice(name);
        out.extend_from_slice(&(data.len() as u32).to_le_bytes());
        out.extend_from_slice(data);
        if data.len() % 2 == 1 {
            out.push(0);
        }
    }

    let mut body = b"WEBP".to_vec();
    let mut vp8x = vec![0x12, 0, 0, 0];
    vp8x.extend_from_slice(&(size - 1).to_le_bytes()[..3]);
    vp8x.extend_from_slice(&(size - 1).to_le_bytes()[..3]);
    chunk(&mut body, b"VP8X", &vp8x);
    chunk(&mut body, b"ANIM", &[0, 0, 0, 0, 0, 0]);

    for i in 0..u32::from(FRAMES) {
        let rgba: Vec<u8> = (0..size * size)
            .flat_map(|p| [(p + i) as u8, (p * 3) as u8, (i * 10) as u8, 255 - (p % 7) as u8])
            .collect();
        let mut still = Vec::new();
        image_webp::WebPEncoder::new(&mut still)
            .encode(&rgba, size, size, image_webp::ColorType::Rgba8)
            .unwrap();
        let vp8l = still.windows(4).position(|w| w == b"VP8L").unwrap();

        let mut anmf = vec![0; 6];
        anmf.extend_from_slice(&(size - 1).to_le_bytes()[..3]);
        anmf.extend_from_slice(&(size - 1).to_le_bytes()[..3]);
        anmf.extend_from_slice(&[40, 0, 0, 0]);
        anmf.extend_from_slice(&still[vp8l..]);
        chunk(&mut body, b"ANMF", &anmf);
    }

    let mut out = b"RIFF".to_vec();
    out.extend_from_slice(&(body.len() as u32).to_le_bytes());
    out.extend_from_slice(&body);
    out
}

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode");

    for (name, data, size) in [
        ("gif_256", make_gif(256), 256u64),
        ("webp_128", make_webp(128), 128u64),
    ] {
        group.throughput(Throughput::Elements(size * size * u64::from(FRAMES)));

        for mode in [DecodeMode::Eager, DecodeMode::Streaming] {
            group.bench_with_input(
                BenchmarkId::new(format!("{mode:?}"), name),
                &data,
                |b, data| {
                    b.iter(|| {
                        let mut anim =
                            decode(black_box(&data[..]), mode, &DecodeConfig::new()).unwrap();
                        while anim.advance().is_ok() {}
                        black_box(anim.pixels().unwrap()[0])
                    })
                },
            );
        }
    }

    group.finish();
}

criterion_group!(benches, bench_decode);
criterion_main!(benches);
