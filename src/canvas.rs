//! The composite canvas: current and backup RGBA buffers plus the disposal
//! rules applied between frames.

use crate::error::DecodeError;
use crate::frame::{Blend, Disposal, FrameRecord, Prepare, Rect};
use crate::limits::Limits;
use crate::source::FramePixels;

/// RGBA8 composite buffer with an optional backup for
/// [`Disposal::RestorePrevious`].
pub(crate) struct Canvas {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
    backup: Option<Vec<u8>>,
    background: [u8; 4],
    limits: Limits,
}

impl Canvas {
    /// Allocate a canvas filled with `background`.
    ///
    /// With `with_backup` the backup buffer is allocated now; otherwise it is
    /// allocated the first time a frame needs it.
    pub(crate) fn new(
        width: u32,
        height: u32,
        background: [u8; 4],
        with_backup: bool,
        limits: &Limits,
    ) -> Result<Self, DecodeError> {
        let bytes = u64::from(width) * u64::from(height) * 4;
        let len = usize::try_from(bytes).map_err(|_| DecodeError::ImageTooLarge)?;
        limits.check_memory(if with_backup { bytes * 2 } else { bytes })?;

        let pixels = background.repeat(len / 4);
        let backup = with_backup.then(|| pixels.clone());
        Ok(Self {
            width,
            height,
            pixels,
            backup,
            background,
            limits: limits.clone(),
        })
    }

    pub(crate) fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub(crate) fn byte_count(&self) -> usize {
        self.pixels.len()
    }

    #[cfg(test)]
    pub(crate) fn has_backup(&self) -> bool {
        self.backup.is_some()
    }

    /// Clear the whole canvas to the background color.
    pub(crate) fn reset(&mut self) {
        for px in self.pixels.chunks_exact_mut(4) {
            px.copy_from_slice(&self.background);
        }
    }

    /// Draw one frame: prepare the canvas according to the previous frame's
    /// disposal, snapshot the region if this frame restores it later, then blit.
    pub(crate) fn compose(
        &mut self,
        previous: Option<&FrameRecord>,
        record: &FrameRecord,
        pixels: &FramePixels,
    ) -> Result<(), DecodeError> {
        if let Some(prev) = previous {
            if let Some(area) = prev.region.clip(self.width, self.height) {
                match record.prepare {
                    Prepare::Background => self.fill(area),
                    Prepare::UseBackup => self.restore(area),
                    Prepare::None => {}
                }
            }
        }

        let Some(area) = record.region.clip(self.width, self.height) else {
            tracing::trace!(region = ?record.region, "frame lies outside the canvas");
            return Ok(());
        };

        if record.disposal == Disposal::RestorePrevious {
            self.snapshot(area)?;
        }

        tracing::trace!(
            x = area.x,
            y = area.y,
            width = area.width,
            height = area.height,
            prepare = ?record.prepare,
            "composite frame"
        );

        match pixels {
            FramePixels::Indexed { indices, palette } => {
                self.blit_indexed(record, area, indices, palette)
            }
            FramePixels::Rgba(data) => self.blit_rgba(record, area, data),
        }
        Ok(())
    }

    /// Byte range of one clipped row within a canvas-sized buffer.
    fn row_range(&self, area: Rect, row: u32) -> std::ops::Range<usize> {
        let start = ((area.y + row) as usize * self.width as usize + area.x as usize) * 4;
        start..start + area.width as usize * 4
    }

    fn fill(&mut self, area: Rect) {
        for row in 0..area.height {
            let range = self.row_range(area, row);
            for px in self.pixels[range].chunks_exact_mut(4) {
                px.copy_from_slice(&self.background);
            }
        }
    }

    fn restore(&mut self, area: Rect) {
        let Some(backup) = &self.backup else {
            tracing::warn!("restore-previous without a snapshot, leaving canvas as is");
            return;
        };
        for row in 0..area.height {
            let range = self.row_range(area, row);
            self.pixels[range.clone()].copy_from_slice(&backup[range]);
        }
    }

    fn snapshot(&mut self, area: Rect) -> Result<(), DecodeError> {
        if self.backup.is_none() {
            self.limits.check_memory(self.pixels.len() as u64 * 2)?;
            tracing::debug!(bytes = self.pixels.len(), "allocating backup buffer");
            self.backup = Some(vec![0; self.pixels.len()]);
        }
        for row in 0..area.height {
            let range = self.row_range(area, row);
            if let Some(backup) = self.backup.as_mut() {
                backup[range.clone()].copy_from_slice(&self.pixels[range]);
            }
        }
        Ok(())
    }

    /// Offset of the clipped area's first pixel inside the frame's own buffer.
    fn source_start(region: Rect, area: Rect, row: u32) -> usize {
        (area.y - region.y + row) as usize * region.width as usize + (area.x - region.x) as usize
    }

    fn blit_indexed(&mut self, record: &FrameRecord, area: Rect, indices: &[u8], palette: &[u8]) {
        for row in 0..area.height {
            let src = Self::source_start(record.region, area, row);
            let Some(src_row) = indices.get(src..src + area.width as usize) else {
                break;
            };
            let range = self.row_range(area, row);
            for (dst, &index) in self.pixels[range].chunks_exact_mut(4).zip(src_row) {
                if record.transparent_index == Some(index) {
                    continue;
                }
                let i = usize::from(index) * 3;
                if let Some(rgb) = palette.get(i..i + 3) {
                    dst.copy_from_slice(&[rgb[0], rgb[1], rgb[2], 0xff]);
                }
            }
        }
    }

    fn blit_rgba(&mut self, record: &FrameRecord, area: Rect, data: &[u8]) {
        for row in 0..area.height {
            let src = Self::source_start(record.region, area, row) * 4;
            let Some(src_row) = data.get(src..src + area.width as usize * 4) else {
                break;
            };
            let range = self.row_range(area, row);
            let dst_row = &mut self.pixels[range];
            match record.blend {
                Blend::Overwrite => dst_row.copy_from_slice(src_row),
                Blend::AlphaBlend => {
                    for (dst, src) in dst_row.chunks_exact_mut(4).zip(src_row.chunks_exact(4)) {
                        blend_over(dst, src);
                    }
                }
            }
        }
    }
}

/// Non-premultiplied source-over.
fn blend_over(dst: &mut [u8], src: &[u8]) {
    let sa = u32::from(src[3]);
    match sa {
        0 => {}
        255 => dst.copy_from_slice(src),
        _ => {
            let da = u32::from(dst[3]);
            let dst_weight = da * (255 - sa);
            // Output alpha scaled by 255.
            let out_a = sa * 255 + dst_weight;
            for c in 0..3 {
                let v = u32::from(src[c]) * sa * 255 + u32::from(dst[c]) * dst_weight;
                dst[c] = ((v + out_a / 2) / out_a) as u8;
            }
            dst[3] = ((out_a + 127) / 255) as u8;
        }
    }
}
