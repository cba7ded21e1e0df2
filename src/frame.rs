//! Per-frame control records and the ordered store that holds them.

use crate::source::ControlBlock;

/// What happens to a frame's canvas region once its display time elapses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Disposal {
    /// Leave the frame on the canvas.
    #[default]
    None,
    /// Clear the frame's region to the background color.
    RestoreBackground,
    /// Restore the region to what it was before the frame was drawn.
    RestorePrevious,
}

/// How direct-color frame pixels are combined with the canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Blend {
    /// Composite source-over; fully transparent pixels leave the canvas as is.
    #[default]
    AlphaBlend,
    /// Replace the canvas region with the frame's pixels.
    Overwrite,
}

/// Canvas preparation required before a frame is drawn, derived from the
/// disposal of the frame before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Prepare {
    /// Draw on top of the canvas as the previous frame left it.
    #[default]
    None,
    /// Clear the previous frame's region to background first.
    Background,
    /// Copy the backup buffer over the previous frame's region first.
    UseBackup,
}

impl Prepare {
    fn after(previous: Option<&FrameRecord>) -> Self {
        match previous.map(|p| p.disposal) {
            Some(Disposal::RestoreBackground) => Self::Background,
            Some(Disposal::RestorePrevious) => Self::UseBackup,
            Some(Disposal::None) | None => Self::None,
        }
    }
}

/// A rectangle on the canvas, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    /// Left edge.
    pub x: u32,
    /// Top edge.
    pub y: u32,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Rect {
    /// Create a rectangle.
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Intersect with a `canvas_width` x `canvas_height` canvas at the origin.
    ///
    /// Returns `None` when nothing of the rectangle lies on the canvas.
    pub fn clip(&self, canvas_width: u32, canvas_height: u32) -> Option<Rect> {
        let x0 = self.x.min(canvas_width);
        let y0 = self.y.min(canvas_height);
        let x1 = self.x.saturating_add(self.width).min(canvas_width);
        let y1 = self.y.saturating_add(self.height).min(canvas_height);
        if x1 <= x0 || y1 <= y0 {
            return None;
        }
        Some(Rect::new(x0, y0, x1 - x0, y1 - y0))
    }

    /// Number of pixels covered.
    pub fn area(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }
}

/// Disposal, transparency and timing of one frame. Immutable once recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameRecord {
    /// Transparent palette index for indexed frames. For direct-color frames
    /// `Some(0)` means the frame carries alpha and alpha 0 is transparent.
    pub transparent_index: Option<u8>,
    /// What happens to this frame's region after it is shown.
    pub disposal: Disposal,
    /// Display time in milliseconds.
    pub delay_ms: u32,
    /// Where the frame is drawn, as declared by the container (unclipped).
    pub region: Rect,
    /// How direct-color pixels are combined with the canvas.
    pub blend: Blend,
    /// What the canvas must do before this frame is drawn.
    pub prepare: Prepare,
}

impl FrameRecord {
    /// Build a record from the decoder's control block.
    ///
    /// A missing or malformed control block degrades to no disposal, no
    /// transparency and zero delay rather than failing.
    pub fn from_control(
        control: Option<&ControlBlock>,
        region: Rect,
        previous: Option<&FrameRecord>,
    ) -> Self {
        let prepare = Prepare::after(previous);
        match control {
            Some(c) => Self {
                transparent_index: c.transparent_index,
                disposal: c.disposal,
                delay_ms: c.delay_ms,
                region,
                blend: c.blend,
                prepare,
            },
            None => Self {
                transparent_index: None,
                disposal: Disposal::None,
                delay_ms: 0,
                region,
                blend: Blend::default(),
                prepare,
            },
        }
    }
}

/// Ordered sequence of [`FrameRecord`]s, indexed in presentation order.
#[derive(Debug, Clone, Default)]
pub struct FrameStore {
    records: Vec<FrameRecord>,
    total_delay_ms: u64,
    uses_backup: bool,
}

impl FrameStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the record for the next frame and return it.
    pub fn record_frame(&mut self, control: Option<&ControlBlock>, region: Rect) -> &FrameRecord {
        if control.is_none() {
            tracing::warn!(
                index = self.records.len(),
                "missing frame control data, using defaults"
            );
        }
        let record = FrameRecord::from_control(control, region, self.records.last());
        self.total_delay_ms += u64::from(record.delay_ms);
        self.uses_backup |= record.disposal == Disposal::RestorePrevious;
        self.records.push(record);
        &self.records[self.records.len() - 1]
    }

    /// Drop records past `len`, for streams that end before a glanced frame
    /// could be decoded.
    pub(crate) fn truncate(&mut self, len: usize) {
        if len >= self.records.len() {
            return;
        }
        self.records.truncate(len);
        self.total_delay_ms = self.records.iter().map(|r| u64::from(r.delay_ms)).sum();
        self.uses_backup = self
            .records
            .iter()
            .any(|r| r.disposal == Disposal::RestorePrevious);
    }

    /// Number of recorded frames.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns `true` if nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Record at `index`, if recorded.
    pub fn get(&self, index: usize) -> Option<&FrameRecord> {
        self.records.get(index)
    }

    /// All records in presentation order.
    pub fn records(&self) -> &[FrameRecord] {
        &self.records
    }

    /// Sum of all recorded delays.
    pub fn total_delay_ms(&self) -> u64 {
        self.total_delay_ms
    }

    /// Whether any recorded frame uses [`Disposal::RestorePrevious`].
    pub fn uses_backup(&self) -> bool {
        self.uses_backup
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn control(disposal: Disposal, delay_ms: u32) -> ControlBlock {
        ControlBlock {
            disposal,
            transparent_index: None,
            delay_ms,
            blend: Blend::AlphaBlend,
        }
    }

    #[test]
    fn prepare_follows_previous_disposal() {
        let mut store = FrameStore::new();
        let r = Rect::new(0, 0, 4, 4);
        store.record_frame(Some(&control(Disposal::RestoreBackground, 10)), r);
        store.record_frame(Some(&control(Disposal::RestorePrevious, 10)), r);
        store.record_frame(Some(&control(Disposal::None, 10)), r);
        store.record_frame(Some(&control(Disposal::None, 10)), r);

        let prepares: Vec<_> = store.records().iter().map(|r| r.prepare).collect();
        assert_eq!(
            prepares,
            [
                Prepare::None,
                Prepare::Background,
                Prepare::UseBackup,
                Prepare::None
            ]
        );
        assert!(store.uses_backup());
        assert_eq!(store.total_delay_ms(), 40);
    }

    #[test]
    fn missing_control_falls_back_to_defaults() {
        let mut store = FrameStore::new();
        let record = *store.record_frame(None, Rect::new(2, 2, 1, 1));
        assert_eq!(record.disposal, Disposal::None);
        assert_eq!(record.transparent_index, None);
        assert_eq!(record.delay_ms, 0);
        assert_eq!(record.region, Rect::new(2, 2, 1, 1));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn clip_to_canvas() {
        assert_eq!(Rect::new(6, 6, 4, 4).clip(8, 8), Some(Rect::new(6, 6, 2, 2)));
        assert_eq!(Rect::new(8, 0, 4, 4).clip(8, 8), None);
        assert_eq!(Rect::new(0, 0, 0, 4).clip(8, 8), None);
        assert_eq!(Rect::new(u32::MAX - 1, 0, 10, 1).clip(8, 8), None);
        assert_eq!(Rect::new(1, 1, 2, 2).clip(8, 8), Some(Rect::new(1, 1, 2, 2)));
    }
}
