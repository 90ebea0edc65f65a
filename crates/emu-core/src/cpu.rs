//! CPU interface.

use crate::Bus;

/// A processor that executes one whole instruction per call.
///
/// The bus is passed in, not owned, so the machine can keep its chips on
/// the bus and still hand the CPU a mutable borrow for each step.
pub trait Cpu {
    /// Execute one instruction, or take a pending interrupt, and return the
    /// cycles it consumed. The bus has been ticked by that amount when this
    /// returns.
    fn step<B: Bus>(&mut self, bus: &mut B) -> u32;

    /// Run the reset sequence.
    fn reset<B: Bus>(&mut self, bus: &mut B);

    /// Current program counter.
    fn pc(&self) -> u16;
}
