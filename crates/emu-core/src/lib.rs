//! Core traits and types for cycle-stepped emulation.
//!
//! Every chip in a machine is driven from one cycle counter. The CPU
//! advances it after each instruction and the [`Scheduler`] dispatches the
//! alarms that fall due, in cycle order.

mod bus;
mod cpu;
mod observable;
mod scheduler;

pub use bus::{Bus, InterruptLines, SimpleBus};
pub use cpu::Cpu;
pub use observable::{Observable, Value};
pub use scheduler::{Alarm, CLOCK_MAX, Cycle, Scheduler};
