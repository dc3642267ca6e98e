use std::{cell::OnceCell, fmt};

use nios2_common::isa::{Encoding, Register};
use serde::Serialize;

use crate::{
    target::RegisterSet,
    unwinders::{SigtrampUnwinder, Unwinder},
};

/// Identity of a frame: its CFA and the entry of the function it runs.
/// Two frames with the same identity mean the unwind is looping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct FrameId {
    pub stack: u32,
    pub code: u32,
}

impl fmt::Display for FrameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{stack=0x{:08x}, code=0x{:08x}}}", self.stack, self.code)
    }
}

/// Where the caller's value of a register can be found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterLocation {
    /// Untouched by this frame.
    Same,
    /// Saved in memory.
    Memory(u32),
    /// Held in another register of this frame.
    InRegister(Register),
    /// Not stored anywhere, but known.
    Value(u32),
    Undefined,
}

/// What one unwinder learned about a frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameCache {
    pub unwinder: &'static str,
    pub id: FrameId,
    pub base: u32,
    locations: Vec<RegisterLocation>,
}

impl FrameCache {
    /// Every register unchanged from the caller.
    pub fn new(unwinder: &'static str, id: FrameId, base: u32, num_regs: usize) -> Self {
        Self {
            unwinder,
            id,
            base,
            locations: vec![RegisterLocation::Same; num_regs],
        }
    }

    pub fn location(&self, reg: Register) -> RegisterLocation {
        self.locations
            .get(reg.index())
            .copied()
            .unwrap_or(RegisterLocation::Undefined)
    }

    pub fn set_location(&mut self, reg: Register, location: RegisterLocation) {
        if let Some(slot) = self.locations.get_mut(reg.index()) {
            *slot = location;
        }
    }
}

/// A physical frame on the stack. Level 0 is the one currently executing.
///
/// The frame is unwound at most once; the result, or the knowledge that
/// this is the outermost frame, is kept for later queries.
#[derive(Debug)]
pub struct Frame {
    level: usize,
    registers: RegisterSet,
    /// The next inner frame is a signal trampoline, so `pc` is where the
    /// signal arrived rather than a return address.
    interrupted: bool,
    cache: OnceCell<Option<FrameCache>>,
}

impl Frame {
    pub fn innermost(registers: RegisterSet) -> Self {
        Self::new(0, registers, false)
    }

    fn new(level: usize, registers: RegisterSet, interrupted: bool) -> Self {
        Self {
            level,
            registers,
            interrupted,
            cache: OnceCell::new(),
        }
    }

    pub fn level(&self) -> usize {
        self.level
    }

    pub fn is_innermost(&self) -> bool {
        self.level == 0
    }

    pub fn registers(&self) -> &RegisterSet {
        &self.registers
    }

    pub fn pc(&self) -> Option<u32> {
        self.registers.pc().ok()
    }

    /// An address inside the function this frame is running, for symbol
    /// lookups. A caller's pc is a return address and may already be the
    /// first byte of the next function when the call ended its body.
    pub fn address_in_block(&self) -> Option<u32> {
        let pc = self.pc()?;
        if self.is_innermost() || self.interrupted {
            Some(pc)
        } else {
            Some(pc.wrapping_sub(1))
        }
    }

    /// The unwind result, or `None` for the outermost frame.
    pub fn cache<E: Encoding>(&self, unwinder: &Unwinder<'_, E>) -> Option<&FrameCache> {
        self.cache
            .get_or_init(|| unwinder.unwind_frame(self))
            .as_ref()
    }

    pub fn id<E: Encoding>(&self, unwinder: &Unwinder<'_, E>) -> Option<FrameId> {
        self.cache(unwinder).map(|cache| cache.id)
    }

    /// The frame that called this one.
    pub fn caller<E: Encoding>(&self, unwinder: &Unwinder<'_, E>) -> Option<Frame> {
        let cache = self.cache(unwinder)?;
        let layout = self.registers.layout();

        let mut registers = RegisterSet::new(layout);
        for (reg, value) in self.registers.iter() {
            let caller_value = match cache.location(reg) {
                RegisterLocation::Same => value,
                RegisterLocation::Memory(address) => unwinder.target().read_u32(address).ok(),
                RegisterLocation::InRegister(other) => self.registers.value(other),
                RegisterLocation::Value(value) => Some(value),
                RegisterLocation::Undefined => None,
            };
            registers.set(reg, caller_value);
        }

        let interrupted = cache.unwinder == SigtrampUnwinder::NAME;
        Some(Frame::new(self.level + 1, registers, interrupted))
    }
}
