//! MOS 6569 (PAL) / 6567 (NTSC) VIC-II video chip.
//!
//! The chip renders one raster line at a time into a [`RasterCache`]. The
//! machine calls [`VicII::end_of_line`] from a periodic alarm every
//! [`VideoStandard::cycles_per_line`] cycles; each call fetches the video
//! matrix on badlines, renders the finished line and advances the raster
//! counter.
//!
//! Rendering compares every run against the cached line so a frame
//! carries only the pixels that changed. The per-line source caches
//! (screen codes, colour nybbles, pattern bytes) are refreshed first and
//! the graphics run is regenerated only when one of them changed.
//!
//! Sprites are fetched for every line and laid over the graphics run.
//! Their registers and data bytes are cached per line too, and a line
//! carrying sprites is always recomposed so collisions are seen every
//! frame. The window is written in successive runs on one accumulator:
//! graphics up to the first sprite pixel, the sprite run, graphics after.
//!
//! # Framebuffer
//!
//! 416 pixels wide: 48 px border, 320 px display window, 48 px border.
//! Height and the first kept raster line come from the video standard.
//! Pixels are palette indices into [`PALETTE`].

#![allow(clippy::cast_possible_truncation)]

pub mod palette;
mod render;
mod sprites;
mod standard;

use emu_core::{Observable, Value};
use raster_cache::{
    DirtySpan, Frame, FrameSink, FrameStatus, IndexedSource, RasterCache, SpanAccumulator,
    fill_const, fill_from, fill_indexed,
};

pub use palette::PALETTE;
pub use render::DisplayMode;
pub use standard::VideoStandard;

use sprites::{Overlay, SPRITE_STATE_LEN, SpriteRow};

/// Framebuffer width in pixels.
pub const WIDTH: usize = 416;

/// Character columns in the display window.
pub const TEXT_COLS: usize = 40;

/// Left border width with 40 columns.
const BORDER: usize = 48;

/// First line on which badlines can occur.
const DISPLAY_START_LINE: u16 = 0x30;

/// Last line on which badlines can occur (exclusive).
const DISPLAY_END_LINE: u16 = 0xF8;

/// Mask of the 1 KiB video matrix and colour RAM.
const MATRIX_MASK: usize = 0x3FF;

/// Mask of the 8 KiB bitmap window.
const BITMAP_MASK: usize = 0x1FFF;

/// Cached mode bit: 40-column window.
const MODE_CSEL: u8 = 0x08;
/// Cached mode bit: line lies in the vertical display window.
const MODE_WINDOW: u8 = 0x10;

/// What the VIC-II sees of memory.
///
/// The machine applies the CIA2 bank selection and the character ROM
/// overlay; the chip only supplies 14-bit addresses.
pub trait VideoMemory {
    /// Byte at `addr` (0-$3FFF) in the current 16 KiB bank.
    fn vic_read(&self, addr: u16) -> u8;
    /// Colour RAM nybble at `offset` (0-$3FF).
    fn colour_read(&self, offset: u16) -> u8;
}

/// VIC-II chip.
pub struct VicII {
    standard: VideoStandard,

    /// Registers ($D000-$D03F).
    regs: [u8; 0x40],

    /// Current raster line.
    raster_line: u16,

    /// Raster compare value for IRQ ($D012 + bit 7 of $D011).
    raster_compare: u16,

    /// IRQ status register ($D019).
    irq_status: u8,

    /// IRQ enable mask ($D01A).
    irq_enable: u8,

    /// DEN latch, set when DEN=1 is seen during line $30.
    den_latch: bool,

    /// Display state: set by a badline, cleared after the eighth pixel row.
    display_state: bool,

    /// Character row being displayed (VCBASE / 40).
    row: u16,

    /// Pixel row within the character row (RC, 0-7).
    rc: u8,

    /// Screen codes fetched on badlines, laid out as the 1 KiB video matrix.
    matrix: Vec<u8>,

    /// Colour nybbles fetched on badlines.
    colour: Vec<u8>,

    /// Bitmap bytes fetched for the current line, at their 8 KiB offsets.
    bitmap: Vec<u8>,

    /// Sprite-sprite collisions ($D01E). Cleared by reading.
    sprite_collision: u8,

    /// Sprite-background collisions ($D01F). Cleared by reading.
    background_collision: u8,

    cache: RasterCache,

    /// Frames completed.
    frame: u64,
}

impl VicII {
    #[must_use]
    pub fn new(standard: VideoStandard) -> Self {
        Self {
            standard,
            regs: [0; 0x40],
            raster_line: 0,
            raster_compare: 0,
            irq_status: 0,
            irq_enable: 0,
            den_latch: false,
            display_state: false,
            row: 0,
            rc: 0,
            matrix: vec![0; MATRIX_MASK + 1],
            colour: vec![0; MATRIX_MASK + 1],
            bitmap: vec![0; BITMAP_MASK + 1],
            sprite_collision: 0,
            background_collision: 0,
            cache: RasterCache::new(WIDTH, usize::from(standard.visible_lines()), TEXT_COLS)
                .with_sprite_bytes(SPRITE_STATE_LEN),
            frame: 0,
        }
    }

    /// Power-on state. The cache is kept but every line redraws in full.
    pub fn reset(&mut self) {
        self.regs = [0; 0x40];
        self.raster_line = 0;
        self.raster_compare = 0;
        self.irq_status = 0;
        self.irq_enable = 0;
        self.den_latch = false;
        self.display_state = false;
        self.row = 0;
        self.rc = 0;
        self.sprite_collision = 0;
        self.background_collision = 0;
        self.cache.invalidate_all();
    }

    #[must_use]
    pub fn standard(&self) -> VideoStandard {
        self.standard
    }

    #[must_use]
    pub fn raster_line(&self) -> u16 {
        self.raster_line
    }

    #[must_use]
    pub fn frame_number(&self) -> u64 {
        self.frame
    }

    #[must_use]
    pub fn height(&self) -> usize {
        self.cache.height()
    }

    #[must_use]
    pub fn cache(&self) -> &RasterCache {
        &self.cache
    }

    /// Force a full redraw of every line on its next render.
    pub fn invalidate_cache(&mut self) {
        self.cache.invalidate_all();
    }

    /// The most recently completed frame.
    #[must_use]
    pub fn frame(&self) -> Frame<'_> {
        Frame::new(self.frame, &self.cache)
    }

    /// Lines with pixels changed since the last presented frame.
    #[must_use]
    pub fn dirty_line_count(&self) -> usize {
        self.cache.dirty_lines().count()
    }

    /// Hand the completed frame to `sink`.
    ///
    /// Once the sink takes the frame the next one collects changes from
    /// scratch. A dropped frame keeps its spans, so they reach the sink
    /// with the next frame it does take.
    pub fn present(&mut self, sink: &mut dyn FrameSink) -> FrameStatus {
        let status = sink.present(&Frame::new(self.frame, &self.cache));
        if status == FrameStatus::Presented {
            self.cache.clear_spans();
        }
        status
    }

    fn screen_base(&self) -> u16 {
        u16::from(self.regs[0x18] >> 4) * 0x0400
    }

    fn char_base(&self) -> u16 {
        u16::from((self.regs[0x18] >> 1) & 0x07) * 0x0800
    }

    fn bitmap_base(&self) -> u16 {
        if self.regs[0x18] & 0x08 != 0 { 0x2000 } else { 0x0000 }
    }

    /// Whether the current line is a badline.
    #[must_use]
    pub fn is_badline(&self) -> bool {
        let yscroll = u16::from(self.regs[0x11] & 0x07);
        self.den_latch
            && (DISPLAY_START_LINE..DISPLAY_END_LINE).contains(&self.raster_line)
            && (self.raster_line & 7) == yscroll
    }

    /// Fetch the 40 screen codes and colours for the current row.
    fn fetch_matrix_row(&mut self, memory: &impl VideoMemory) {
        let screen_base = self.screen_base();
        let row_base = self.row * TEXT_COLS as u16;
        for col in 0..TEXT_COLS as u16 {
            let offset = (row_base + col) & MATRIX_MASK as u16;
            self.matrix[usize::from(offset)] = memory.vic_read((screen_base + offset) & 0x3FFF);
            self.colour[usize::from(offset)] = memory.colour_read(offset) & 0x0F;
        }
    }

    /// Close the current raster line: fetch on a badline, render, then
    /// advance the raster counter and evaluate the raster compare.
    /// Returns `true` when the frame just completed.
    pub fn end_of_line(&mut self, memory: &impl VideoMemory) -> bool {
        let line = self.raster_line;
        if line == DISPLAY_START_LINE && self.regs[0x11] & 0x10 != 0 {
            self.den_latch = true;
        }
        if self.is_badline() {
            self.fetch_matrix_row(memory);
            self.display_state = true;
            self.rc = 0;
        }

        self.render_line(memory, line);

        if self.display_state {
            if self.rc == 7 {
                self.display_state = false;
                self.row += 1;
            }
            self.rc = (self.rc + 1) & 7;
        }

        self.raster_line += 1;
        let mut frame_complete = false;
        if self.raster_line >= self.standard.lines_per_frame() {
            self.raster_line = 0;
            self.den_latch = false;
            self.display_state = false;
            self.row = 0;
            self.frame += 1;
            frame_complete = true;
        }

        if self.raster_line == self.raster_compare {
            self.irq_status |= 0x01;
        }
        frame_complete
    }

    /// Render raster `line` into the cache and latch its sprite
    /// collisions. Returns the columns that changed, or `None` if nothing
    /// did or the line is not kept.
    pub fn render_line(&mut self, memory: &impl VideoMemory, line: u16) -> Option<DirtySpan> {
        let sprites = SpriteRow::fetch(&self.regs, line, self.screen_base(), memory);
        let first = self.standard.first_visible_line();
        if line < first || line >= first + self.standard.visible_lines() {
            self.latch_unseen(&sprites);
            return None;
        }
        let index = usize::from(line - first);

        let d011 = self.regs[0x11];
        let d016 = self.regs[0x16];
        let mode = DisplayMode::from_registers(d011, d016);
        let x_scroll = d016 & 0x07;
        let border = self.regs[0x20] & 0x0F;
        let background = [
            self.regs[0x21] & 0x0F,
            self.regs[0x22] & 0x0F,
            self.regs[0x23] & 0x0F,
            self.regs[0x24] & 0x0F,
        ];

        // RSEL: 25 rows ($33-$FA) or 24 rows ($37-$F6).
        let (top, bottom) = if d011 & 0x08 != 0 {
            (0x33, 0xFB)
        } else {
            (0x37, 0xF7)
        };
        let in_window = self.den_latch && (top..bottom).contains(&line);
        // CSEL: 40 columns, or 38 with 7 px more left border and 9 px right.
        let csel = d016 & 0x08 != 0;
        let (left, right) = if csel {
            (BORDER, BORDER + TEXT_COLS * 8)
        } else {
            (BORDER + 7, BORDER + TEXT_COLS * 8 - 9)
        };
        let graphics = in_window && self.display_state;
        let mode_bits = mode.bits()
            | if csel { MODE_CSEL } else { 0 }
            | if in_window { MODE_WINDOW } else { 0 };

        let char_base = self.char_base();
        let bitmap_base = self.bitmap_base();
        let sprite_state = sprites.state();
        let sprites_on_line = !sprites.is_empty();
        let row_base = usize::from(self.row) * TEXT_COLS;
        let rc = self.rc;

        let cached = self.cache.line_mut(index)?;
        let no_check = cached.never_rendered
            || cached.mode != mode_bits
            || cached.x_scroll != x_scroll
            || cached.border != border
            || cached.background != background
            || cached.displayed != graphics;

        let mut acc = SpanAccumulator::new();
        let mut overlay = None;
        if in_window {
            fill_const(&mut cached.pixels, 0..left, border, &mut acc, no_check);

            let mut sources = SpanAccumulator::new();
            let sprite_sources = fill_from(
                &mut cached.sprites,
                0..SPRITE_STATE_LEN,
                &sprite_state,
                &mut sources,
                no_check,
            );

            let mut fresh = [0u8; TEXT_COLS * 8];
            let mut foreground = [false; TEXT_COLS * 8];
            let rendered = if graphics {
                let screen = fill_indexed(
                    &mut cached.screen,
                    0..TEXT_COLS,
                    &self.matrix,
                    IndexedSource::linear(row_base, MATRIX_MASK),
                    &mut sources,
                    no_check,
                );
                let colour = fill_indexed(
                    &mut cached.colour,
                    0..TEXT_COLS,
                    &self.colour,
                    IndexedSource::linear(row_base, MATRIX_MASK),
                    &mut sources,
                    no_check,
                );
                let pattern = if mode.is_bitmap() {
                    let bitmap = IndexedSource {
                        base: row_base * 8 + usize::from(rc),
                        stride: 8,
                        mask: BITMAP_MASK,
                    };
                    for col in 0..TEXT_COLS {
                        let offset = (bitmap.base + col * 8) & BITMAP_MASK;
                        self.bitmap[offset] = memory.vic_read(bitmap_base + offset as u16);
                    }
                    fill_indexed(
                        &mut cached.pattern,
                        0..TEXT_COLS,
                        &self.bitmap,
                        bitmap,
                        &mut sources,
                        no_check,
                    )
                } else {
                    // ECM takes the top two bits of the code as the
                    // background select.
                    let code_mask = if mode == DisplayMode::ExtendedText { 0x3F } else { 0xFF };
                    let mut fetched = [0u8; TEXT_COLS];
                    for (col, byte) in fetched.iter_mut().enumerate() {
                        let code = u16::from(cached.screen[col] & code_mask);
                        *byte = memory.vic_read((char_base + code * 8 + u16::from(rc)) & 0x3FFF);
                    }
                    fill_from(&mut cached.pattern, 0..TEXT_COLS, &fetched, &mut sources, no_check)
                };

                let redraw = screen.changed
                    || colour.changed
                    || pattern.changed
                    || sprite_sources.changed
                    || sprites_on_line
                    || no_check;
                if redraw {
                    render::graphics_run(
                        mode,
                        &cached.pattern,
                        &cached.screen,
                        &cached.colour,
                        background,
                        x_scroll,
                        &mut fresh,
                    );
                    if sprites_on_line {
                        render::foreground_run(mode, &cached.pattern, &cached.colour, x_scroll, &mut foreground);
                    }
                }
                redraw
            } else {
                let idle_addr = if mode == DisplayMode::ExtendedText { 0x39FF } else { 0x3FFF };
                let idle = memory.vic_read(idle_addr);
                render::idle_run(mode, idle, background, &mut fresh);
                if sprites_on_line {
                    render::idle_foreground(mode, idle, &mut foreground);
                }
                true
            };

            if rendered {
                let mut composed = [0u8; WIDTH];
                composed[BORDER..BORDER + TEXT_COLS * 8].copy_from_slice(&fresh);
                let laid = sprites.overlay(&mut composed, left..right, &foreground, BORDER);
                match laid.drawn {
                    Some((xs, xe)) => {
                        fill_from(&mut cached.pixels, left..xs, &composed[left..], &mut acc, no_check);
                        fill_from(&mut cached.pixels, xs..xe, &composed[xs..], &mut acc, no_check);
                        fill_from(&mut cached.pixels, xe..right, &composed[xe..], &mut acc, no_check);
                    }
                    None => {
                        fill_from(&mut cached.pixels, left..right, &composed[left..], &mut acc, no_check);
                    }
                }
                overlay = Some(laid);
            }
            fill_const(&mut cached.pixels, right..WIDTH, border, &mut acc, no_check);
        } else {
            fill_const(&mut cached.pixels, 0..WIDTH, border, &mut acc, no_check);
        }

        cached.border = border;
        cached.background = background;
        cached.mode = mode_bits;
        cached.x_scroll = x_scroll;
        cached.displayed = graphics;
        cached.never_rendered = false;

        let span = acc.span();
        cached.span = match (cached.span, span) {
            (Some(before), Some(now)) => Some(before.union(now)),
            (before, now) => before.or(now),
        };

        match overlay {
            Some(laid) => self.latch_collisions(laid),
            None => self.latch_unseen(&sprites),
        }
        span
    }

    /// Collisions of sprites on a line with no graphics shown. Only
    /// sprite-sprite contacts are possible there.
    fn latch_unseen(&mut self, sprites: &SpriteRow) {
        if sprites.is_empty() {
            return;
        }
        let mut scratch = [0u8; WIDTH];
        let laid = sprites.overlay(&mut scratch, 0..0, &[], 0);
        self.latch_collisions(laid);
    }

    /// Merge a line's collisions into $D01E/$D01F. The first collision
    /// after a register was cleared raises its interrupt flag.
    fn latch_collisions(&mut self, laid: Overlay) {
        if laid.sprite_collision != 0 {
            if self.sprite_collision == 0 {
                self.irq_status |= 0x04;
            }
            self.sprite_collision |= laid.sprite_collision;
        }
        if laid.background_collision != 0 {
            if self.background_collision == 0 {
                self.irq_status |= 0x02;
            }
            self.background_collision |= laid.background_collision;
        }
    }

    /// Read a register, with read side effects.
    pub fn read(&mut self, reg: u8) -> u8 {
        let value = self.peek(reg);
        match reg & 0x3F {
            0x1E => self.sprite_collision = 0,
            0x1F => self.background_collision = 0,
            _ => {}
        }
        value
    }

    /// Read a register without side effects.
    #[must_use]
    pub fn peek(&self, reg: u8) -> u8 {
        match reg & 0x3F {
            0x11 => {
                // Raster bit 8 replaces the compare bit on read.
                let raster_hi = if self.raster_line & 0x100 != 0 { 0x80 } else { 0x00 };
                (self.regs[0x11] & 0x7F) | raster_hi
            }
            0x12 => (self.raster_line & 0xFF) as u8,
            0x16 => self.regs[0x16] | 0xC0,
            0x18 => self.regs[0x18] | 0x01,
            0x19 => {
                // Bit 7 is the OR of all active and enabled flags.
                let any_active = if self.irq_active() { 0x80 } else { 0x00 };
                self.irq_status | any_active | 0x70
            }
            0x1A => self.irq_enable | 0xF0,
            0x1E => self.sprite_collision,
            0x1F => self.background_collision,
            r @ 0x20..=0x2E => self.regs[usize::from(r)] | 0xF0,
            r @ 0x00..=0x1D => self.regs[usize::from(r)],
            // Unused registers return $FF.
            _ => 0xFF,
        }
    }

    pub fn write(&mut self, reg: u8, value: u8) {
        let r = reg & 0x3F;
        log::trace!("vic: ${:02X} <- {value:#04X}", 0xD000 + u16::from(r));
        self.regs[usize::from(r)] = value;

        match r {
            0x11 => {
                self.raster_compare =
                    (self.raster_compare & 0x00FF) | (u16::from(value & 0x80) << 1);
            }
            0x12 => {
                self.raster_compare = (self.raster_compare & 0x0100) | u16::from(value);
            }
            0x19 => {
                // Acknowledge by writing 1 bits.
                self.irq_status &= !value & 0x0F;
            }
            0x1A => {
                self.irq_enable = value & 0x0F;
            }
            _ => {}
        }
    }

    #[must_use]
    pub fn irq_active(&self) -> bool {
        self.irq_status & self.irq_enable & 0x0F != 0
    }
}

impl Observable for VicII {
    fn query(&self, path: &str) -> Option<Value> {
        match path {
            "raster_line" => Some(self.raster_line.into()),
            "raster_compare" => Some(self.raster_compare.into()),
            "frame" => Some(self.frame.into()),
            "irq_status" => Some(self.irq_status.into()),
            "irq_enable" => Some(self.irq_enable.into()),
            "irq" => Some(self.irq_active().into()),
            "badline" => Some(self.is_badline().into()),
            "border" => Some((self.regs[0x20] & 0x0F).into()),
            "sprites.enabled" => Some(self.regs[0x15].into()),
            "sprites.collision" => Some(self.sprite_collision.into()),
            "sprites.background_collision" => Some(self.background_collision.into()),
            "mode" => Some(
                format!("{:?}", DisplayMode::from_registers(self.regs[0x11], self.regs[0x16]))
                    .as_str()
                    .into(),
            ),
            _ => None,
        }
    }

    fn query_paths(&self) -> &'static [&'static str] {
        &[
            "raster_line",
            "raster_compare",
            "frame",
            "irq_status",
            "irq_enable",
            "irq",
            "badline",
            "border",
            "sprites.enabled",
            "sprites.collision",
            "sprites.background_collision",
            "mode",
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 16 KiB bank with a character generator at $1000 and the screen at
    /// $0400, as seen from bank 0 after power-on.
    struct TestMemory {
        bank: Vec<u8>,
        colour: Vec<u8>,
    }

    impl TestMemory {
        fn new(glyph: u8) -> Self {
            let mut bank = vec![0; 0x4000];
            bank[0x1000..0x2000].fill(glyph);
            Self {
                bank,
                colour: vec![0x01; 0x400],
            }
        }
    }

    impl VideoMemory for TestMemory {
        fn vic_read(&self, addr: u16) -> u8 {
            self.bank[usize::from(addr & 0x3FFF)]
        }

        fn colour_read(&self, offset: u16) -> u8 {
            self.colour[usize::from(offset & 0x3FF)]
        }
    }

    fn text_vic() -> VicII {
        let mut vic = VicII::new(VideoStandard::Pal);
        vic.write(0x11, 0x1B); // DEN, RSEL, YSCROLL=3
        vic.write(0x16, 0x08); // CSEL
        vic.write(0x18, 0x14); // Screen $0400, chars $1000
        vic.write(0x20, 0x0E);
        vic.write(0x21, 0x06);
        vic
    }

    fn run_frame(vic: &mut VicII, memory: &TestMemory) {
        while !vic.end_of_line(memory) {}
    }

    fn fb_row(line: u16) -> usize {
        usize::from(line - VideoStandard::Pal.first_visible_line())
    }

    #[test]
    fn initial_state() {
        let vic = VicII::new(VideoStandard::Pal);
        assert_eq!(vic.raster_line(), 0);
        assert!(!vic.irq_active());
        assert_eq!(vic.height(), 284);
    }

    #[test]
    fn raster_advances() {
        let (mut vic, memory) = (VicII::new(VideoStandard::Pal), TestMemory::new(0));
        assert!(!vic.end_of_line(&memory));
        assert_eq!(vic.raster_line(), 1);
    }

    #[test]
    fn frame_complete_after_full_frame() {
        let memory = TestMemory::new(0);
        for standard in [VideoStandard::Pal, VideoStandard::Ntsc] {
            let mut vic = VicII::new(standard);
            let lines = (0..).take_while(|_| !vic.end_of_line(&memory)).count() + 1;
            assert_eq!(lines, usize::from(standard.lines_per_frame()));
            assert_eq!(vic.raster_line(), 0);
            assert_eq!(vic.frame_number(), 1);
        }
    }

    #[test]
    fn raster_irq() {
        let (mut vic, memory) = (VicII::new(VideoStandard::Pal), TestMemory::new(0));
        vic.write(0x12, 1);
        vic.write(0x1A, 0x01);

        vic.end_of_line(&memory);
        assert!(vic.irq_active());
        assert_eq!(vic.read(0x19), 0xF1);

        vic.write(0x19, 0x01);
        assert!(!vic.irq_active());
    }

    #[test]
    fn raster_compare_bit_8() {
        let (mut vic, memory) = (VicII::new(VideoStandard::Pal), TestMemory::new(0));
        vic.write(0x11, 0x80);
        vic.write(0x12, 0x05);
        vic.write(0x1A, 0x01);
        for _ in 0..0x105 {
            vic.end_of_line(&memory);
        }
        assert!(vic.irq_active());
        assert_eq!(vic.read(0x11) & 0x80, 0x80);
        assert_eq!(vic.read(0x12), 0x05);
    }

    #[test]
    fn register_read_write() {
        let mut vic = VicII::new(VideoStandard::Pal);
        vic.write(0x20, 0x06);
        assert_eq!(vic.read(0x20), 0xF6);
        vic.write(0x21, 0x01);
        assert_eq!(vic.read(0x21), 0xF1);
        assert_eq!(vic.read(0x2F), 0xFF);
        assert_eq!(vic.read(0x3F), 0xFF);
        assert_eq!(vic.read(0x6F), 0xFF);
    }

    #[test]
    fn badlines_follow_yscroll() {
        let (mut vic, memory) = (text_vic(), TestMemory::new(0));
        let mut badlines = Vec::new();
        loop {
            if vic.is_badline() {
                badlines.push(vic.raster_line());
            }
            if vic.end_of_line(&memory) {
                break;
            }
        }
        assert_eq!(badlines.len(), 25);
        assert_eq!(badlines[0], 0x33);
        assert!(badlines.iter().all(|l| l & 7 == 3));
    }

    #[test]
    fn text_line_layout() {
        let (mut vic, mut memory) = (text_vic(), TestMemory::new(0x80));
        memory.bank[0x0400] = 0x01;
        run_frame(&mut vic, &memory);

        let line = vic.cache().line(fb_row(0x33)).map(|l| l.pixels.clone());
        let line = line.unwrap_or_default();
        assert_eq!(line[BORDER - 1], 0x0E, "left border");
        assert_eq!(line[BORDER], 0x01, "glyph bit 7 in colour RAM colour");
        assert_eq!(line[BORDER + 1], 0x06, "background");
        assert_eq!(line[BORDER + 320], 0x0E, "right border");

        let border_line = vic.cache().line(fb_row(0x20)).map(|l| l.pixels.clone());
        assert!(border_line.unwrap_or_default().iter().all(|&p| p == 0x0E));
    }

    #[test]
    fn unchanged_frame_is_clean() {
        let (mut vic, memory) = (text_vic(), TestMemory::new(0x3C));
        let mut sink = raster_cache::NullSink;
        run_frame(&mut vic, &memory);
        assert_eq!(vic.dirty_line_count(), vic.height());
        vic.present(&mut sink);

        run_frame(&mut vic, &memory);
        assert_eq!(vic.dirty_line_count(), 0);
    }

    #[test]
    fn one_character_change_is_tight() {
        let (mut vic, mut memory) = (text_vic(), TestMemory::new(0xFF));
        let mut sink = raster_cache::NullSink;
        run_frame(&mut vic, &memory);
        vic.present(&mut sink);

        // Column 10 of row 0 gets a different colour.
        memory.colour[10] = 0x07;
        run_frame(&mut vic, &memory);
        let dirty: Vec<_> = vic.frame().dirty().map(|(y, span, _)| (y, span)).collect();
        assert_eq!(dirty.len(), 8);
        let xs = BORDER + 10 * 8;
        for (n, (y, span)) in dirty.into_iter().enumerate() {
            assert_eq!(y, fb_row(0x33) + n);
            assert_eq!(span, DirtySpan::new(xs, xs + 7));
        }
    }

    #[test]
    fn border_colour_change_redraws_lines() {
        let (mut vic, memory) = (text_vic(), TestMemory::new(0));
        let mut sink = raster_cache::NullSink;
        run_frame(&mut vic, &memory);
        vic.present(&mut sink);

        vic.write(0x20, 0x02);
        run_frame(&mut vic, &memory);
        assert_eq!(vic.dirty_line_count(), vic.height());
        let top = vic.frame().dirty().next().map(|(_, span, _)| span);
        assert_eq!(top, Some(DirtySpan::new(0, WIDTH - 1)));
    }

    #[test]
    fn invalidate_forces_full_spans() {
        let (mut vic, memory) = (text_vic(), TestMemory::new(0));
        let mut sink = raster_cache::NullSink;
        run_frame(&mut vic, &memory);
        vic.present(&mut sink);

        vic.invalidate_cache();
        run_frame(&mut vic, &memory);
        assert!(vic.frame().dirty().all(|(_, span, _)| span == DirtySpan::new(0, WIDTH - 1)));
        assert_eq!(vic.dirty_line_count(), vic.height());
    }

    #[test]
    fn thirty_eight_columns_widen_border() {
        let (mut vic, memory) = (text_vic(), TestMemory::new(0xFF));
        vic.write(0x16, 0x00);
        run_frame(&mut vic, &memory);
        let line = vic.cache().line(fb_row(0x40)).map(|l| l.pixels.clone());
        let line = line.unwrap_or_default();
        assert_eq!(line[BORDER + 6], 0x0E);
        assert_eq!(line[BORDER + 7], 0x01, "glyph pixel in colour RAM colour");
        // Right border starts 9 px early.
        assert_eq!(line[BORDER + 310], 0x01);
        assert!(line[BORDER + 311..].iter().all(|&p| p == 0x0E));
    }

    #[test]
    fn hires_bitmap_reads_8k_window() {
        let (mut vic, mut memory) = (text_vic(), TestMemory::new(0));
        vic.write(0x11, 0x3B); // BMM
        vic.write(0x18, 0x18); // Screen $0400, bitmap $2000
        memory.bank[0x0400] = 0x1C; // fg white, bg medium grey
        memory.bank[0x2000] = 0x80;
        run_frame(&mut vic, &memory);

        let line = vic.cache().line(fb_row(0x33)).map(|l| l.pixels.clone());
        let line = line.unwrap_or_default();
        assert_eq!(line[BORDER], 0x01);
        assert_eq!(line[BORDER + 1], 0x0C);
    }

    #[test]
    fn invalid_mode_renders_black() {
        let (mut vic, memory) = (text_vic(), TestMemory::new(0xFF));
        vic.write(0x11, 0x7B); // ECM + BMM
        run_frame(&mut vic, &memory);
        let line = vic.cache().line(fb_row(0x40)).map(|l| l.pixels.clone());
        let line = line.unwrap_or_default();
        assert!(line[BORDER..BORDER + 320].iter().all(|&p| p == 0));
        assert_eq!(line[0], 0x0E);
    }

    #[test]
    fn display_disabled_shows_border() {
        let (mut vic, memory) = (text_vic(), TestMemory::new(0xFF));
        vic.write(0x11, 0x0B); // DEN off
        run_frame(&mut vic, &memory);
        assert!(vic.cache().line(fb_row(0x80)).is_some_and(|l| l.pixels.iter().all(|&p| p == 0x0E)));
    }

    /// Solid sprite 0 in colour 7 at framebuffer column 64, lines $40-$54.
    fn with_sprite(vic: &mut VicII, memory: &mut TestMemory) {
        memory.bank[0x07F8] = 13;
        memory.bank[0x07F9] = 13;
        memory.bank[0x0340..0x0380].fill(0xFF);
        vic.write(0x00, 24 + 16);
        vic.write(0x01, 0x40);
        vic.write(0x27, 0x07);
        vic.write(0x15, 0x01);
    }

    #[test]
    fn sprite_drawn_over_background() {
        let (mut vic, mut memory) = (text_vic(), TestMemory::new(0));
        with_sprite(&mut vic, &mut memory);
        run_frame(&mut vic, &memory);

        let line = vic.cache().line(fb_row(0x40)).map(|l| l.pixels.clone()).unwrap_or_default();
        assert_eq!(line[63], 0x06);
        assert!(line[64..88].iter().all(|&p| p == 0x07));
        assert_eq!(line[88], 0x06);
        let below = vic.cache().line(fb_row(0x40 + 21)).map(|l| l.pixels.clone()).unwrap_or_default();
        assert_eq!(below[64], 0x06);
    }

    #[test]
    fn moving_sprite_dirties_only_its_lines() {
        let (mut vic, mut memory) = (text_vic(), TestMemory::new(0));
        let mut sink = raster_cache::NullSink;
        with_sprite(&mut vic, &mut memory);
        run_frame(&mut vic, &memory);
        vic.present(&mut sink);

        run_frame(&mut vic, &memory);
        assert_eq!(vic.dirty_line_count(), 0, "still sprite is clean");
        vic.present(&mut sink);

        vic.write(0x00, 24 + 17);
        run_frame(&mut vic, &memory);
        let dirty: Vec<_> = vic.frame().dirty().map(|(y, span, _)| (y, span)).collect();
        assert_eq!(dirty.len(), 21);
        for (n, (y, span)) in dirty.into_iter().enumerate() {
            assert_eq!(y, fb_row(0x40) + n);
            assert_eq!(span, DirtySpan::new(64, 88));
        }
    }

    #[test]
    fn x_expanded_multicolour_sprite() {
        let (mut vic, mut memory) = (text_vic(), TestMemory::new(0));
        with_sprite(&mut vic, &mut memory);
        memory.bank[0x0340..0x0343].copy_from_slice(&[0b0110_1100, 0, 0]);
        vic.write(0x1C, 0x01);
        vic.write(0x1D, 0x01);
        vic.write(0x25, 0x02);
        vic.write(0x26, 0x05);
        run_frame(&mut vic, &memory);

        let line = vic.cache().line(fb_row(0x40)).map(|l| l.pixels.clone()).unwrap_or_default();
        // %01 %10 %11 %00, each pair four pixels wide.
        assert_eq!(&line[64..80], &[2, 2, 2, 2, 7, 7, 7, 7, 5, 5, 5, 5, 6, 6, 6, 6]);
    }

    #[test]
    fn sprite_behind_foreground_is_hidden() {
        let (mut vic, mut memory) = (text_vic(), TestMemory::new(0xFF));
        with_sprite(&mut vic, &mut memory);
        vic.write(0x1B, 0x01);
        run_frame(&mut vic, &memory);
        let line = vic.cache().line(fb_row(0x40)).map(|l| l.pixels.clone()).unwrap_or_default();
        assert!(line[64..88].iter().all(|&p| p == 0x01));
        assert_eq!(vic.peek(0x1F), 0x01);
    }

    #[test]
    fn sprite_collisions_latch_and_clear_on_read() {
        let (mut vic, mut memory) = (text_vic(), TestMemory::new(0));
        with_sprite(&mut vic, &mut memory);
        vic.write(0x02, 24 + 30);
        vic.write(0x03, 0x48);
        vic.write(0x15, 0x03);
        vic.write(0x1A, 0x04);
        run_frame(&mut vic, &memory);

        assert!(vic.irq_active());
        assert_eq!(vic.peek(0x1E), 0x03);
        assert_eq!(vic.peek(0x1F), 0x00, "blank characters");
        assert_eq!(vic.read(0x1E), 0x03);
        assert_eq!(vic.read(0x1E), 0x00);

        vic.write(0x19, 0x04);
        assert!(!vic.irq_active());
    }

    #[test]
    fn observable_paths_resolve() {
        let vic = text_vic();
        for path in vic.query_paths() {
            assert!(vic.query(path).is_some(), "{path}");
        }
        assert_eq!(vic.query("mode"), Some(Value::String("StandardText".into())));
    }
}
