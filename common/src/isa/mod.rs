//! Instruction-set definitions for Nios II and its DPX variant.
//!
//! The two encodings share one decoded form, [`Instruction`], so the
//! interpreter and the prologue analyzer are written once and parameterized by
//! an [`Encoding`]. Each encoding supplies its bit layout, its opcode table,
//! and the handful of fixed instruction patterns the unwinder looks for.

mod dpx;
pub mod elf_flags;
pub mod ext_regs;
mod instruction;
mod layout;
mod nios2;
mod opcode;
mod register;

pub use dpx::Dpx;
pub use instruction::{Instruction, InstructionType};
pub use layout::{ctl, status, RegisterLayout};
pub use nios2::Nios2;
pub use opcode::Opcode;
pub use register::{Register, NUM_BASE_GPRS};

use std::fmt::Debug;

use crate::error::DecodeError;

/// One row of an encoding's opcode table.
///
/// A word `w` belongs to the row when `w & mask == match_bits`. `op` and `ext`
/// are the primary opcode and the sub-opcode the row selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpcodeEntry {
    pub opcode: Opcode,
    pub op: u32,
    pub ext: Option<u32>,
    pub match_bits: u32,
    pub mask: u32,
}

impl OpcodeEntry {
    pub const fn new(opcode: Opcode, op: u32, ext: Option<u32>, match_bits: u32, mask: u32) -> Self {
        Self {
            opcode,
            op,
            ext,
            match_bits,
            mask,
        }
    }

    pub fn name(&self) -> &'static str {
        self.opcode.mnemonic()
    }

    pub fn matches(&self, word: u32) -> bool {
        word & self.mask == self.match_bits
    }
}

/// An instruction pattern in which the bits set in `mask` are wildcards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WildInsn {
    pub insn: u32,
    pub mask: u32,
}

impl WildInsn {
    pub const fn new(insn: u32, mask: u32) -> Self {
        Self { insn, mask }
    }

    pub fn matches(&self, word: u32) -> bool {
        word & !self.mask == self.insn
    }
}

/// A Nios II instruction encoding.
pub trait Encoding: Copy + Default + Debug + Send + Sync + 'static {
    const NAME: &'static str;

    const LAYOUT: RegisterLayout;

    /// Software breakpoint inserted by debuggers (`trap 31`).
    const BREAKPOINT: u32;

    /// `break 3`, the target of compiler-generated stack-overflow checks.
    const STACK_CHECK_BREAK: u32;

    /// Call sequence emitted ahead of the prologue when profiling is enabled.
    const PROFILER_PREAMBLE: &'static [WildInsn];

    /// Entry sequence of the interrupt dispatcher. Empty when the variant has
    /// no interrupts.
    const IRQ_ENTRY_PREAMBLE: &'static [WildInsn];

    /// Whether frames may be exception handlers returning through `ea`.
    const EXCEPTION_HANDLERS: bool;

    const OPCODES: &'static [OpcodeEntry];

    fn decode(word: u32) -> Result<Instruction, DecodeError>;

    fn encode(ins: &Instruction) -> u32;

    /// Destination of a `call`/`jmpi` located at `pc` with the given 26-bit field.
    fn jump_target(pc: u32, imm26: u32) -> u32;

    /// Look up the table row for `word`.
    fn find_opcode(word: u32) -> Option<&'static OpcodeEntry> {
        Self::OPCODES.iter().find(|entry| entry.matches(word))
    }

    /// The two-instruction `movi r2, nr; trap` sequence a Linux signal
    /// trampoline uses to re-enter the kernel.
    fn sigreturn_trampoline(nr: u32) -> [u32; 2] {
        let movi = Instruction::new(Opcode::ADDI, Register::ZERO, Register::R2, Register::ZERO, nr);
        let trap = Instruction::new(Opcode::TRAP, Register::ZERO, Register::ZERO, Register::EA, 0);
        [Self::encode(&movi), Self::encode(&trap)]
    }
}

/// Sign-extend the low `bits` bits of `imm`.
#[inline]
pub const fn sign_extension(imm: u32, bits: u32) -> i32 {
    let mask = 1u32 << (bits - 1);
    let value = imm & ((1u32 << bits) - 1);
    if value & mask != 0 {
        (value as i32) | (!((1u32 << bits) - 1) as i32)
    } else {
        value as i32
    }
}
