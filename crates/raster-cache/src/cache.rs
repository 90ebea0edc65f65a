//! Per-line cache storage.

use crate::span::DirtySpan;

/// Everything cached for one visible scanline.
#[derive(Debug, Clone)]
pub struct CacheLine {
    /// Rendered palette indices, one per pixel.
    pub pixels: Vec<u8>,
    /// Graphics pattern bytes (character rows or bitmap bytes), one per
    /// text column.
    pub pattern: Vec<u8>,
    /// Colour nybbles, one per text column.
    pub colour: Vec<u8>,
    /// Screen codes, one per text column.
    pub screen: Vec<u8>,
    pub border: u8,
    pub background: [u8; 4],
    /// Display mode the line was rendered in.
    pub mode: u8,
    pub x_scroll: u8,
    /// Sprite registers and data bytes the line was composed with. Empty
    /// unless the cache was built [`with_sprite_bytes`](RasterCache::with_sprite_bytes).
    pub sprites: Vec<u8>,
    /// Whether the line held graphics or only border.
    pub displayed: bool,
    /// Set until the line is first rendered, and by
    /// [`RasterCache::invalidate_all`].
    pub never_rendered: bool,
    /// Changed columns since the last presented frame.
    pub span: Option<DirtySpan>,
}

impl CacheLine {
    fn new(width: usize, text_cols: usize) -> Self {
        Self {
            pixels: vec![0; width],
            pattern: vec![0; text_cols],
            colour: vec![0; text_cols],
            screen: vec![0; text_cols],
            border: 0,
            background: [0; 4],
            mode: 0,
            x_scroll: 0,
            sprites: Vec::new(),
            displayed: false,
            never_rendered: true,
            span: None,
        }
    }
}

/// One [`CacheLine`] per visible scanline.
#[derive(Debug, Clone)]
pub struct RasterCache {
    width: usize,
    text_cols: usize,
    lines: Vec<CacheLine>,
}

impl RasterCache {
    #[must_use]
    pub fn new(width: usize, height: usize, text_cols: usize) -> Self {
        Self {
            width,
            text_cols,
            lines: (0..height).map(|_| CacheLine::new(width, text_cols)).collect(),
        }
    }

    /// Give every line `len` bytes of sprite source cache.
    #[must_use]
    pub fn with_sprite_bytes(mut self, len: usize) -> Self {
        for line in &mut self.lines {
            line.sprites = vec![0; len];
        }
        self
    }

    #[must_use]
    pub fn width(&self) -> usize {
        self.width
    }

    #[must_use]
    pub fn height(&self) -> usize {
        self.lines.len()
    }

    #[must_use]
    pub fn text_cols(&self) -> usize {
        self.text_cols
    }

    #[must_use]
    pub fn line(&self, index: usize) -> Option<&CacheLine> {
        self.lines.get(index)
    }

    pub fn line_mut(&mut self, index: usize) -> Option<&mut CacheLine> {
        self.lines.get_mut(index)
    }

    /// Force every line to redraw in full on its next render.
    pub fn invalidate_all(&mut self) {
        log::debug!("raster cache: invalidating {} lines", self.lines.len());
        for line in &mut self.lines {
            line.never_rendered = true;
        }
    }

    /// Lines changed since the last presented frame, with the dirty pixels.
    pub fn dirty_lines(&self) -> impl Iterator<Item = (usize, DirtySpan, &[u8])> {
        self.lines.iter().enumerate().filter_map(|(index, line)| {
            line.span
                .map(|span| (index, span, &line.pixels[span.xs..=span.xe]))
        })
    }

    /// Forget the spans once a frame has been presented.
    pub fn clear_spans(&mut self) {
        for line in &mut self.lines {
            line.span = None;
        }
    }
}
