//! What the unwinder needs from the program being inspected.

use nios2_common::isa::{Encoding, Register, RegisterLayout};
use nios2_sim::{elf::ElfFile, Simulator};

use crate::error::{Result, UnwindError};

/// Read access to target memory. Words are little-endian.
pub trait Target {
    fn read_memory(&self, address: u32, buf: &mut [u8]) -> Result<()>;

    fn read_u32(&self, address: u32) -> Result<u32> {
        let mut bytes = [0; 4];
        self.read_memory(address, &mut bytes)?;
        Ok(u32::from_le_bytes(bytes))
    }
}

impl<E: Encoding> Target for Simulator<E> {
    fn read_memory(&self, address: u32, buf: &mut [u8]) -> Result<()> {
        if Simulator::<E>::read_memory(self, address, buf) == buf.len() {
            Ok(())
        } else {
            Err(UnwindError::MemoryRead {
                address,
                len: buf.len(),
            })
        }
    }
}

/// Function boundaries of the inspected program.
pub trait Symbols {
    /// Entry address of the function containing `pc`.
    fn function_start(&self, pc: u32) -> Option<u32>;

    fn function_name(&self, _pc: u32) -> Option<&str> {
        None
    }

    /// Whether `pc` lies in a procedure linkage table.
    fn in_plt(&self, _pc: u32) -> bool {
        false
    }
}

impl Symbols for ElfFile {
    fn function_start(&self, pc: u32) -> Option<u32> {
        self.function_containing(pc).map(|sym| sym.value)
    }

    fn function_name(&self, pc: u32) -> Option<&str> {
        self.function_containing(pc).map(|sym| sym.name.as_str())
    }

    fn in_plt(&self, pc: u32) -> bool {
        ElfFile::in_plt(self, pc)
    }
}

/// No symbol information. Every frame is then outermost unless it is a
/// signal trampoline.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoSymbols;

impl Symbols for NoSymbols {
    fn function_start(&self, _pc: u32) -> Option<u32> {
        None
    }
}

/// Register values of one frame, indexed like the register file.
/// Registers whose value could not be recovered are `None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterSet {
    layout: RegisterLayout,
    values: Vec<Option<u32>>,
}

impl RegisterSet {
    pub fn new(layout: RegisterLayout) -> Self {
        Self {
            layout,
            values: vec![None; layout.num_regs()],
        }
    }

    /// All registers known, in register-file order.
    pub fn from_values(layout: RegisterLayout, values: &[u32]) -> Result<Self> {
        if values.len() != layout.num_regs() {
            return Err(UnwindError::RegisterCount {
                expected: layout.num_regs(),
                found: values.len(),
            });
        }
        Ok(Self {
            layout,
            values: values.iter().copied().map(Some).collect(),
        })
    }

    /// The live registers of a simulator.
    pub fn from_simulator<E: Encoding>(sim: &Simulator<E>) -> Result<Self> {
        Self::from_values(E::LAYOUT, &sim.fetch_registers())
    }

    pub fn layout(&self) -> RegisterLayout {
        self.layout
    }

    pub fn get(&self, reg: Register) -> Result<u32> {
        if reg == Register::ZERO {
            return Ok(0);
        }
        self.values
            .get(reg.index())
            .copied()
            .flatten()
            .ok_or(UnwindError::RegisterUnavailable(reg))
    }

    pub fn value(&self, reg: Register) -> Option<u32> {
        self.get(reg).ok()
    }

    pub fn set(&mut self, reg: Register, value: Option<u32>) {
        if let Some(slot) = self.values.get_mut(reg.index()) {
            *slot = value;
        }
    }

    pub fn pc(&self) -> Result<u32> {
        self.get(self.layout.pc())
    }

    pub fn sp(&self) -> Result<u32> {
        self.get(Register::SP)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Register, Option<u32>)> + '_ {
        self.values
            .iter()
            .enumerate()
            .map(|(i, value)| (Register::new(i as u8), *value))
    }
}
