//! C64 keyboard matrix.
//!
//! CIA1 port A drives the rows (a 0 bit selects a row) and port B reads
//! the columns back, active low.

/// 8x8 key matrix. `rows[r]` has bit `c` set while the key at row `r`,
/// column `c` is held.
#[derive(Debug, Clone, Default)]
pub struct KeyboardMatrix {
    rows: [u8; 8],
}

impl KeyboardMatrix {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_key(&mut self, row: u8, col: u8, pressed: bool) {
        if row < 8 && col < 8 {
            if pressed {
                self.rows[usize::from(row)] |= 1 << col;
            } else {
                self.rows[usize::from(row)] &= !(1 << col);
            }
        }
    }

    #[must_use]
    pub fn is_pressed(&self, row: u8, col: u8) -> bool {
        row < 8 && col < 8 && self.rows[usize::from(row)] & (1 << col) != 0
    }

    /// Column levels for the row selection on port A.
    #[must_use]
    pub fn scan(&self, row_select: u8) -> u8 {
        let mut columns = 0u8;
        for (row, &keys) in self.rows.iter().enumerate() {
            if row_select & (1 << row) == 0 {
                columns |= keys;
            }
        }
        !columns
    }

    pub fn release_all(&mut self) {
        self.rows = [0; 8];
    }
}
