//! Instruction-set simulator for Nios II.
//!
//! A [`Simulator`] owns a CPU, a sparse [`memory::AddressSpace`] and a branch
//! trace. Programs are loaded from ELF files, then driven one instruction at a
//! time or until they stop, exit, or are interrupted from another thread.

pub mod btrace;
pub mod cpu;
pub mod elf;
pub mod emulator;
pub mod error;
pub mod memory;
pub mod system;

pub use emulator::{InterruptHandle, Simulator};

pub(crate) const LOG_TARGET: &str = "nios2::sim";
