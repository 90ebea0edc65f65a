//! Pixel generation for the display modes.
//!
//! Each character cell turns one pattern byte, one screen byte and one
//! colour nybble into 8 palette indices.

use crate::TEXT_COLS;

/// Graphics mode selected by ECM/BMM ($D011) and MCM ($D016).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayMode {
    StandardText,
    MulticolourText,
    ExtendedText,
    HiresBitmap,
    MulticolourBitmap,
    /// ECM together with BMM or MCM. Displays black.
    Invalid,
}

impl DisplayMode {
    #[must_use]
    pub fn from_registers(d011: u8, d016: u8) -> Self {
        let ecm = d011 & 0x40 != 0;
        let bmm = d011 & 0x20 != 0;
        let mcm = d016 & 0x10 != 0;
        match (ecm, bmm, mcm) {
            (false, false, false) => Self::StandardText,
            (false, false, true) => Self::MulticolourText,
            (true, false, false) => Self::ExtendedText,
            (false, true, false) => Self::HiresBitmap,
            (false, true, true) => Self::MulticolourBitmap,
            _ => Self::Invalid,
        }
    }

    #[must_use]
    pub fn is_bitmap(self) -> bool {
        matches!(self, Self::HiresBitmap | Self::MulticolourBitmap)
    }

    /// ECM/BMM/MCM packed as stored in the line cache.
    pub(crate) fn bits(self) -> u8 {
        match self {
            Self::StandardText => 0,
            Self::MulticolourText => 1,
            Self::ExtendedText => 2,
            Self::HiresBitmap => 3,
            Self::MulticolourBitmap => 4,
            Self::Invalid => 5,
        }
    }
}

fn hires(pattern: u8, fg: u8, bg: u8) -> [u8; 8] {
    let mut out = [0; 8];
    for (px, slot) in out.iter_mut().enumerate() {
        *slot = if (pattern >> (7 - px)) & 1 != 0 { fg } else { bg };
    }
    out
}

/// Each bit pair selects one of four colours and covers two pixels.
fn multicolour(pattern: u8, colours: [u8; 4]) -> [u8; 8] {
    let mut out = [0; 8];
    for pair in 0..4 {
        let colour = colours[usize::from((pattern >> (6 - pair * 2)) & 0x03)];
        out[pair * 2] = colour;
        out[pair * 2 + 1] = colour;
    }
    out
}

/// 8 pixels for one character cell.
pub(crate) fn cell(
    mode: DisplayMode,
    pattern: u8,
    screen: u8,
    colour: u8,
    background: [u8; 4],
) -> [u8; 8] {
    let [bg0, bg1, bg2, _] = background;
    match mode {
        DisplayMode::StandardText => hires(pattern, colour & 0x0F, bg0),
        DisplayMode::MulticolourText => {
            // Colour bit 3 picks multicolour for this cell only.
            if colour & 0x08 == 0 {
                hires(pattern, colour & 0x07, bg0)
            } else {
                multicolour(pattern, [bg0, bg1, bg2, colour & 0x07])
            }
        }
        DisplayMode::ExtendedText => {
            hires(pattern, colour & 0x0F, background[usize::from(screen >> 6)])
        }
        DisplayMode::HiresBitmap => hires(pattern, screen >> 4, screen & 0x0F),
        DisplayMode::MulticolourBitmap => {
            multicolour(pattern, [bg0, screen >> 4, screen & 0x0F, colour & 0x0F])
        }
        DisplayMode::Invalid => [0; 8],
    }
}

/// Render the 320-pixel graphics run. Columns shifted right by `x_scroll`
/// uncover background colour 0 at the left edge.
pub(crate) fn graphics_run(
    mode: DisplayMode,
    pattern: &[u8],
    screen: &[u8],
    colour: &[u8],
    background: [u8; 4],
    x_scroll: u8,
    out: &mut [u8; TEXT_COLS * 8],
) {
    let shift = usize::from(x_scroll & 0x07);
    let uncovered = if mode == DisplayMode::Invalid {
        0
    } else {
        background[0]
    };
    out[..shift].fill(uncovered);
    for col in 0..TEXT_COLS {
        let pixels = cell(mode, pattern[col], screen[col], colour[col], background);
        for (i, &px) in pixels.iter().enumerate() {
            if let Some(slot) = out.get_mut(shift + col * 8 + i) {
                *slot = px;
            }
        }
    }
}

/// Foreground pixels of one cell as a mask, leftmost pixel in bit 7.
/// Multicolour pairs %10 and %11 count as foreground, %01 as background.
pub(crate) fn foreground(mode: DisplayMode, pattern: u8, colour: u8) -> u8 {
    let multicolour = match mode {
        DisplayMode::MulticolourText => colour & 0x08 != 0,
        DisplayMode::MulticolourBitmap => true,
        _ => false,
    };
    if multicolour {
        let high = pattern & 0xAA;
        high | (high >> 1)
    } else {
        pattern
    }
}

/// Foreground flags for the graphics run, laid out as [`graphics_run`]
/// lays out its pixels.
pub(crate) fn foreground_run(
    mode: DisplayMode,
    pattern: &[u8],
    colour: &[u8],
    x_scroll: u8,
    out: &mut [bool; TEXT_COLS * 8],
) {
    let shift = usize::from(x_scroll & 0x07);
    out[..shift].fill(false);
    for col in 0..TEXT_COLS {
        let mask = foreground(mode, pattern[col], colour[col]);
        for i in 0..8 {
            if let Some(slot) = out.get_mut(shift + col * 8 + i) {
                *slot = (mask >> (7 - i)) & 1 != 0;
            }
        }
    }
}

/// Graphics while the sequencer is idle: every cell shows the idle
/// pattern byte with screen and colour reading as zero.
pub(crate) fn idle_run(
    mode: DisplayMode,
    pattern: u8,
    background: [u8; 4],
    out: &mut [u8; TEXT_COLS * 8],
) {
    let pixels = cell(mode, pattern, 0, 0, background);
    for chunk in out.chunks_exact_mut(8) {
        chunk.copy_from_slice(&pixels);
    }
}

/// Foreground flags while the sequencer is idle.
pub(crate) fn idle_foreground(mode: DisplayMode, pattern: u8, out: &mut [bool; TEXT_COLS * 8]) {
    let mask = foreground(mode, pattern, 0);
    for chunk in out.chunks_exact_mut(8) {
        for (i, slot) in chunk.iter_mut().enumerate() {
            *slot = (mask >> (7 - i)) & 1 != 0;
        }
    }
}
