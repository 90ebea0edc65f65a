//! Frame delivery.

use crossbeam_channel::{Receiver, Sender, TrySendError};

use crate::cache::RasterCache;
use crate::span::DirtySpan;

/// A completed frame, borrowed from the cache for the duration of
/// [`FrameSink::present`].
pub struct Frame<'a> {
    number: u64,
    cache: &'a RasterCache,
}

impl<'a> Frame<'a> {
    #[must_use]
    pub fn new(number: u64, cache: &'a RasterCache) -> Self {
        Self { number, cache }
    }

    #[must_use]
    pub fn number(&self) -> u64 {
        self.number
    }

    #[must_use]
    pub fn width(&self) -> usize {
        self.cache.width()
    }

    #[must_use]
    pub fn height(&self) -> usize {
        self.cache.height()
    }

    /// `(line, span, pixels[xs..=xe])` for every line that changed.
    pub fn dirty(&self) -> impl Iterator<Item = (usize, DirtySpan, &'a [u8])> {
        self.cache.dirty_lines()
    }

    #[must_use]
    pub fn dirty_line_count(&self) -> usize {
        self.dirty().count()
    }

    /// Whole line, for sinks that keep their own copy.
    #[must_use]
    pub fn line(&self, index: usize) -> Option<&'a [u8]> {
        self.cache.line(index).map(|l| l.pixels.as_slice())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameStatus {
    Presented,
    /// The consumer was not ready. Advisory; emulation carries on.
    Dropped,
}

/// Receiver of completed frames.
pub trait FrameSink {
    fn present(&mut self, frame: &Frame<'_>) -> FrameStatus;

    /// Returns true once after the sink needs every line redrawn, such as
    /// after a resize. The renderer then invalidates its cache.
    fn take_full_refresh_request(&mut self) -> bool {
        false
    }
}

/// Discards frames. For headless runs.
#[derive(Debug, Default)]
pub struct NullSink;

impl FrameSink for NullSink {
    fn present(&mut self, _frame: &Frame<'_>) -> FrameStatus {
        FrameStatus::Presented
    }
}

/// Keeps an RGBA copy of the whole screen, patched with each frame's
/// dirty spans.
pub struct FullFrameSink {
    palette: [u32; 16],
    width: usize,
    height: usize,
    rgba: Vec<u8>,
    frames: u64,
    refresh: bool,
}

impl FullFrameSink {
    /// `palette` holds ARGB32 colours indexed by the low nybble of each pixel.
    #[must_use]
    pub fn new(palette: [u32; 16]) -> Self {
        Self {
            palette,
            width: 0,
            height: 0,
            rgba: Vec::new(),
            frames: 0,
            refresh: true,
        }
    }

    #[must_use]
    pub fn width(&self) -> usize {
        self.width
    }

    #[must_use]
    pub fn height(&self) -> usize {
        self.height
    }

    /// RGBA8888, row-major.
    #[must_use]
    pub fn rgba(&self) -> &[u8] {
        &self.rgba
    }

    #[must_use]
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// RGBA of one pixel.
    #[must_use]
    pub fn pixel(&self, x: usize, y: usize) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = (y * self.width + x) * 4;
        let mut px = [0; 4];
        px.copy_from_slice(&self.rgba[i..i + 4]);
        Some(px)
    }

    /// Change the palette. Everything is redrawn on the next frame.
    pub fn set_palette(&mut self, palette: [u32; 16]) {
        self.palette = palette;
        self.refresh = true;
    }

    fn rgba_of(&self, index: u8) -> [u8; 4] {
        let argb = self.palette[usize::from(index & 0x0F)];
        let [a, r, g, b] = argb.to_be_bytes();
        [r, g, b, a]
    }
}

impl FrameSink for FullFrameSink {
    fn present(&mut self, frame: &Frame<'_>) -> FrameStatus {
        if frame.width() != self.width || frame.height() != self.height {
            log::debug!(
                "full-frame sink: resizing to {}x{}",
                frame.width(),
                frame.height()
            );
            self.width = frame.width();
            self.height = frame.height();
            self.rgba = vec![0; self.width * self.height * 4];
            self.refresh = true;
        }
        for (y, span, pixels) in frame.dirty() {
            let row = y * self.width;
            for (offset, &index) in pixels.iter().enumerate() {
                let i = (row + span.xs + offset) * 4;
                let rgba = self.rgba_of(index);
                self.rgba[i..i + 4].copy_from_slice(&rgba);
            }
        }
        self.frames += 1;
        FrameStatus::Presented
    }

    fn take_full_refresh_request(&mut self) -> bool {
        std::mem::take(&mut self.refresh)
    }
}

/// Owned copy of a frame's dirty spans, for another thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameSnapshot {
    pub number: u64,
    pub width: usize,
    pub height: usize,
    pub lines: Vec<(usize, DirtySpan, Vec<u8>)>,
}

impl FrameSnapshot {
    #[must_use]
    pub fn capture(frame: &Frame<'_>) -> Self {
        Self {
            number: frame.number(),
            width: frame.width(),
            height: frame.height(),
            lines: frame
                .dirty()
                .map(|(y, span, pixels)| (y, span, pixels.to_vec()))
                .collect(),
        }
    }

    /// Patch a `width * height` index buffer with the dirty spans.
    pub fn apply_to(&self, screen: &mut [u8]) {
        for (y, span, pixels) in &self.lines {
            let start = y * self.width + span.xs;
            if let Some(dest) = screen.get_mut(start..start + pixels.len()) {
                dest.copy_from_slice(pixels);
            }
        }
    }
}

/// Hands frames to a host thread through a one-slot channel. If the host
/// has not taken the previous frame, the new one is dropped; the core
/// never waits.
pub struct ChannelSink {
    sender: Sender<FrameSnapshot>,
    dropped: u64,
}

impl ChannelSink {
    #[must_use]
    pub fn channel() -> (Self, Receiver<FrameSnapshot>) {
        let (sender, receiver) = crossbeam_channel::bounded(1);
        (Self { sender, dropped: 0 }, receiver)
    }

    /// Frames not delivered so far.
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

impl FrameSink for ChannelSink {
    fn present(&mut self, frame: &Frame<'_>) -> FrameStatus {
        match self.sender.try_send(FrameSnapshot::capture(frame)) {
            Ok(()) => FrameStatus::Presented,
            Err(TrySendError::Full(_)) => {
                self.dropped += 1;
                log::trace!("channel sink: frame {} dropped", frame.number());
                FrameStatus::Dropped
            }
            Err(TrySendError::Disconnected(_)) => {
                self.dropped += 1;
                if self.dropped == 1 {
                    log::debug!("channel sink: receiver gone");
                }
                FrameStatus::Dropped
            }
        }
    }
}
