//! Sprite fetch and composition for one raster line.
//!
//! Sprites are evaluated per line: [`SpriteRow::fetch`] reads the three
//! data bytes of every sprite that covers the line, [`SpriteRow::overlay`]
//! lays them over a rendered graphics run and reports the collisions.
//! Lower-numbered sprites are drawn on top.

use crate::VideoMemory;

pub(crate) const SPRITES: usize = 8;

/// Sprite X=24 is the left edge of the display window, which starts at
/// framebuffer column 48.
const SPRITE_X_TO_FB: isize = 24;

/// Source bytes cached per line: eight per sprite plus the two shared
/// multicolour registers.
pub(crate) const SPRITE_STATE_LEN: usize = SPRITES * 8 + 2;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct SpriteSlice {
    /// 9-bit X coordinate.
    x: u16,
    data: [u8; 3],
    colour: u8,
    multicolour: bool,
    x_expand: bool,
    /// Priority bit set: foreground graphics cover this sprite.
    behind: bool,
}

impl SpriteSlice {
    fn width(self) -> usize {
        if self.x_expand { 48 } else { 24 }
    }

    /// Colour of pixel `px` (0..width) or `None` where transparent.
    fn pixel(self, px: usize, mc: [u8; 2]) -> Option<u8> {
        let pos = if self.x_expand { px / 2 } else { px };
        let bits = (u32::from(self.data[0]) << 16) | (u32::from(self.data[1]) << 8) | u32::from(self.data[2]);
        if self.multicolour {
            match (bits >> (22 - (pos / 2) * 2)) & 0x03 {
                0b00 => None,
                0b01 => Some(mc[0]),
                0b10 => Some(self.colour),
                _ => Some(mc[1]),
            }
        } else if (bits >> (23 - pos)) & 1 != 0 {
            Some(self.colour)
        } else {
            None
        }
    }
}

/// The sprites covering one raster line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct SpriteRow {
    slices: [Option<SpriteSlice>; SPRITES],
    mc: [u8; 2],
}

/// Result of laying the sprites over one line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct Overlay {
    /// Framebuffer columns `[xs, xe)` where a sprite pixel replaced graphics.
    pub drawn: Option<(usize, usize)>,
    /// Sprites that touched another sprite.
    pub sprite_collision: u8,
    /// Sprites that touched foreground graphics.
    pub background_collision: u8,
}

impl SpriteRow {
    /// Fetch the sprite data for raster `line` from the registers and the
    /// pointers at `screen_base + $3F8`.
    pub(crate) fn fetch(regs: &[u8; 0x40], line: u16, screen_base: u16, memory: &impl VideoMemory) -> Self {
        let enable = regs[0x15];
        let y_expand = regs[0x17];
        let mut row = Self {
            slices: [None; SPRITES],
            mc: [regs[0x25] & 0x0F, regs[0x26] & 0x0F],
        };

        for (i, slot) in row.slices.iter_mut().enumerate() {
            let bit = 1u8 << i;
            if enable & bit == 0 {
                continue;
            }
            let expanded = y_expand & bit != 0;
            let height = if expanded { 42 } else { 21 };
            let line_in_sprite = line.wrapping_sub(u16::from(regs[1 + i * 2]));
            if line_in_sprite >= height {
                continue;
            }
            let data_line = if expanded { line_in_sprite / 2 } else { line_in_sprite };

            let pointer = memory.vic_read((screen_base + 0x03F8 + i as u16) & 0x3FFF);
            let base = u16::from(pointer) * 64 + data_line * 3;
            let data = [0u16, 1, 2].map(|n| memory.vic_read((base + n) & 0x3FFF));

            *slot = Some(SpriteSlice {
                x: u16::from(regs[i * 2]) | if regs[0x10] & bit != 0 { 0x100 } else { 0 },
                data,
                colour: regs[0x27 + i] & 0x0F,
                multicolour: regs[0x1C] & bit != 0,
                x_expand: regs[0x1D] & bit != 0,
                behind: regs[0x1B] & bit != 0,
            });
        }
        row
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.slices.iter().all(Option::is_none)
    }

    /// Everything that decides this line's sprite pixels, as cached bytes.
    pub(crate) fn state(&self) -> [u8; SPRITE_STATE_LEN] {
        let mut out = [0; SPRITE_STATE_LEN];
        for (chunk, slice) in out.chunks_exact_mut(8).zip(&self.slices) {
            if let Some(s) = slice {
                let flags = u8::from(s.multicolour) | (u8::from(s.x_expand) << 1) | (u8::from(s.behind) << 2);
                let [x_lo, x_hi] = s.x.to_le_bytes();
                chunk.copy_from_slice(&[1, x_lo, x_hi, s.data[0], s.data[1], s.data[2], s.colour, flags]);
            }
        }
        out[SPRITES * 8] = self.mc[0];
        out[SPRITES * 8 + 1] = self.mc[1];
        out
    }

    /// Lay the sprites over `pixels`, a full framebuffer line.
    ///
    /// Only columns in `window` are drawn; the border covers the rest.
    /// `foreground` flags the graphics pixels of the run that starts at
    /// framebuffer column `fg_start`, for priority and collisions.
    pub(crate) fn overlay(
        &self,
        pixels: &mut [u8],
        window: std::ops::Range<usize>,
        foreground: &[bool],
        fg_start: usize,
    ) -> Overlay {
        let mut result = Overlay::default();
        let width = pixels.len();
        // Sprites present at each column, and the colour of the topmost one.
        let mut coverage = vec![0u8; width];
        let mut top: Vec<Option<(u8, bool)>> = vec![None; width];

        for (i, slice) in self.slices.iter().enumerate().rev() {
            let Some(s) = slice else { continue };
            let origin = s.x as isize + SPRITE_X_TO_FB;
            for px in 0..s.width() {
                let Ok(x) = usize::try_from(origin + px as isize) else {
                    continue;
                };
                if x >= width {
                    break;
                }
                if let Some(colour) = s.pixel(px, self.mc) {
                    coverage[x] |= 1 << i;
                    top[x] = Some((colour, s.behind));
                }
            }
        }

        let is_foreground =
            |x: usize| x.checked_sub(fg_start).and_then(|i| foreground.get(i)).copied().unwrap_or(false);

        for x in 0..width {
            let cov = coverage[x];
            if cov == 0 {
                continue;
            }
            if cov.count_ones() >= 2 {
                result.sprite_collision |= cov;
            }
            let fg = is_foreground(x);
            if fg {
                result.background_collision |= cov;
            }
            let Some((colour, behind)) = top[x] else { continue };
            if !window.contains(&x) || (behind && fg) {
                continue;
            }
            pixels[x] = colour;
            result.drawn = Some(match result.drawn {
                Some((xs, _)) => (xs, x + 1),
                None => (x, x + 1),
            });
        }
        result
    }
}
