//! Semantics of the individual instruction classes.
//!
//! Each handler reads its operands from the [`Cpu`](super::Cpu), performs
//! the operation and writes back its result, then reports how execution
//! continues through an [`Effect`]. Handlers never advance the program
//! counter themselves.

pub mod alu;
pub mod branch;
pub mod memory;
pub mod system;

use super::StopReason;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// Continue with the following instruction.
    Next,
    /// Control transfer taken to the given address.
    Jump(u32),
    /// Stop before completing the instruction.
    Stop(StopReason),
    /// The program asked to exit with the given status.
    Exit(u32),
}
