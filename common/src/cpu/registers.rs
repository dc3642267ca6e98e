use std::{fmt::Display, ops::Index};

use crate::isa::Register;

/// A register file indexed by architectural register number.
///
/// Writes to register 0 are discarded and reads of it always return zero.
pub trait Registers: Index<Register, Output = u32> + Display {
    fn read(&self, reg: Register) -> u32;
    fn write(&mut self, reg: Register, value: u32);
}
