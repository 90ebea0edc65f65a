//! Commodore 64 assembled from the scheduled chip crates.
//!
//! One [`Scheduler`](emu_core::Scheduler) drives everything. The CPU
//! executes whole instructions and then ticks the bus, which advances the
//! scheduler and routes each due alarm to the chip that owns it: CIA
//! timers and TOD, the expansion VIA, the RTC second tick and the VIC-II
//! raster line. One PAL frame is 312 lines x 63 cycles = 19,656 cycles.

mod bus;
mod c64;
pub mod capture;
pub mod config;
pub mod input;
mod keyboard;
mod memory;
pub mod prg;

pub use bus::{C64Bus, MachineEvent};
pub use c64::{C64, FrameReport, StopHandle};
pub use config::{ConfigError, MachineConfig, Roms};
pub use input::{InputEvent, InputQueue, InputSender, JoystickState};
pub use keyboard::KeyboardMatrix;
pub use memory::C64Memory;
pub use prg::LoadError;
