//! PAL and NTSC timing.

use serde::{Deserialize, Serialize};

/// Video standard the chip runs at.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoStandard {
    /// 6569: 63 cycles x 312 lines.
    #[default]
    Pal,
    /// 6567R8: 65 cycles x 263 lines.
    Ntsc,
}

impl VideoStandard {
    #[must_use]
    pub const fn cycles_per_line(self) -> u32 {
        match self {
            Self::Pal => 63,
            Self::Ntsc => 65,
        }
    }

    #[must_use]
    pub const fn lines_per_frame(self) -> u16 {
        match self {
            Self::Pal => 312,
            Self::Ntsc => 263,
        }
    }

    #[must_use]
    pub const fn cycles_per_frame(self) -> u32 {
        self.cycles_per_line() * self.lines_per_frame() as u32
    }

    /// First raster line kept in the frame (top of the upper border).
    #[must_use]
    pub const fn first_visible_line(self) -> u16 {
        match self {
            Self::Pal => 6,
            Self::Ntsc => 16,
        }
    }

    #[must_use]
    pub const fn visible_lines(self) -> u16 {
        match self {
            Self::Pal => 284,
            Self::Ntsc => 247,
        }
    }

    /// Nominal CPU clock in Hz.
    #[must_use]
    pub const fn cpu_hz(self) -> u32 {
        match self {
            Self::Pal => 985_248,
            Self::Ntsc => 1_022_727,
        }
    }

    /// Mains frequency the CIA TOD clocks are fed from.
    #[must_use]
    pub const fn tod_hz(self) -> u32 {
        match self {
            Self::Pal => 50,
            Self::Ntsc => 60,
        }
    }
}
