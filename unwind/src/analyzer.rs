//! Prologue analysis.
//!
//! Compilers for Nios II emit prologues built from a handful of parts, in
//! varying order and interleaved with ordinary code:
//!
//! 1. an optional profiling call (`nextpc r8; mov r9,ra; movhi/addi r10; call
//!    mcount; mov ra,r9`, or the shorter `mov r8,ra; call mcount; mov ra,r8`),
//! 2. the interrupt dispatcher entry (`rdctl et,estatus; andi et,et,1; ...`),
//! 3. one stack adjustment (`addi sp,sp,-N`, `sub sp,sp,r8` after loading N
//!    into r8, or a switch to a new stack with `stw sp,N(rx); mov sp,rx`),
//! 4. an optional stack-overflow check ending in `break 3`,
//! 5. stores of callee-saved and control registers relative to `sp`, or to
//!    `r8` pointing back at the CFA for large frames,
//! 6. an optional `mov fp,sp`.
//!
//! Rather than matching fixed templates, the analyzer executes the
//! instructions symbolically from the function entry until it meets a branch,
//! call or return, tracking for each register which entry value it holds
//! plus a constant offset, and where each entry value was stored.
//!
//! [`scan`] does the symbolic execution and needs nothing but code memory.
//! [`resolve`] turns its result into addresses using the register values of
//! the frame being unwound.

use nios2_common::{
    constants::INSTRUCTION_SIZE,
    isa::{Encoding, Instruction, Opcode, Register, RegisterLayout, WildInsn},
};
use tracing::{debug, trace};

use crate::{
    target::{RegisterSet, Target},
    LOG_TARGET,
};

/// How far past the function entry the scan looks.
pub const SCAN_LIMIT: u32 = 200;

/// What a register holds: the entry value of `base` plus `offset`.
///
/// A `base` of `zero` means the register holds the constant `offset`. A base
/// past the general registers names the entry value of a control register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegValue {
    pub base: Option<Register>,
    pub offset: i32,
}

impl RegValue {
    const UNKNOWN: RegValue = RegValue {
        base: None,
        offset: 0,
    };

    fn entry(reg: Register) -> Self {
        Self {
            base: Some(reg),
            offset: 0,
        }
    }

    fn is(&self, reg: Register) -> bool {
        self.base == Some(reg)
    }

    fn is_constant(&self) -> bool {
        self.is(Register::ZERO)
    }
}

/// Where the entry value of a register was stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SavedAt {
    NotSaved,
    /// At the entry value of `base` plus `offset`.
    Relative { base: Register, offset: i32 },
    Address(u32),
}

impl SavedAt {
    fn relative(base: Option<Register>, offset: i32) -> Self {
        match base {
            None => SavedAt::NotSaved,
            Some(Register::ZERO) => SavedAt::Address(offset as u32),
            Some(base) => SavedAt::Relative { base, offset },
        }
    }

    fn is_relative_to(&self, reg: Register) -> bool {
        matches!(self, SavedAt::Relative { base, .. } if *base == reg)
    }

    fn base(&self) -> Option<Register> {
        match self {
            SavedAt::NotSaved => None,
            SavedAt::Relative { base, .. } => Some(*base),
            SavedAt::Address(_) => Some(Register::ZERO),
        }
    }

    fn offset(&self) -> i32 {
        match self {
            SavedAt::NotSaved => 0,
            SavedAt::Relative { offset, .. } => *offset,
            SavedAt::Address(address) => *address as i32,
        }
    }
}

/// Result of the symbolic execution of a prologue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrologueAnalysis {
    pub start_pc: u32,
    pub query_pc: u32,
    /// Address following the last instruction that belongs to the prologue.
    pub prologue_end: u32,
    pub exception_handler: bool,
    /// `ra`, or `ea` for exception handlers.
    pub return_register: Register,
    values: Vec<RegValue>,
    saved: Vec<SavedAt>,
}

impl PrologueAnalysis {
    fn new(layout: RegisterLayout, start_pc: u32, query_pc: u32) -> Self {
        Self {
            start_pc,
            query_pc,
            prologue_end: start_pc,
            exception_handler: false,
            return_register: Register::RA,
            values: default_values(layout),
            saved: vec![SavedAt::NotSaved; layout.num_regs()],
        }
    }

    /// Register contents as of the query pc.
    pub fn value(&self, reg: Register) -> RegValue {
        self.values
            .get(reg.index())
            .copied()
            .unwrap_or(RegValue::UNKNOWN)
    }

    pub fn saved(&self, reg: Register) -> SavedAt {
        self.saved
            .get(reg.index())
            .copied()
            .unwrap_or(SavedAt::NotSaved)
    }

    /// The register the CFA is computed from: `fp` once it has been set up
    /// from `sp`, else `sp` while it still tracks its entry value.
    pub fn base_register(&self) -> Option<Register> {
        if self.value(Register::FP).is(Register::SP) {
            Some(Register::FP)
        } else if self.value(Register::SP).is(Register::SP) {
            Some(Register::SP)
        } else {
            None
        }
    }

    /// A frame that does not adjust the stack or never stores its return
    /// address is a leaf, or never returns.
    pub fn is_leaf(&self, base: Register) -> bool {
        self.value(base).offset == 0
            || !self.saved(Register::RA).is_relative_to(Register::SP)
            || !self.saved(self.return_register).is_relative_to(Register::SP)
    }
}

fn default_values(layout: RegisterLayout) -> Vec<RegValue> {
    (0..layout.num_regs())
        .map(|i| RegValue::entry(Register::new(i as u8)))
        .collect()
}

fn set<T>(table: &mut [T], reg: Register, value: T) {
    if let Some(slot) = table.get_mut(reg.index()) {
        *slot = value;
    }
}

fn saved_at(saved: &[SavedAt], reg: Register) -> SavedAt {
    saved.get(reg.index()).copied().unwrap_or(SavedAt::NotSaved)
}

fn read_word(target: &dyn Target, pc: u32) -> Option<u32> {
    target.read_u32(pc).ok()
}

fn decode<E: Encoding>(target: &dyn Target, pc: u32) -> Option<Instruction> {
    read_word(target, pc).and_then(|word| E::decode(word).ok())
}

fn matches_sequence(target: &dyn Target, start: u32, sequence: &[WildInsn]) -> bool {
    !sequence.is_empty()
        && sequence.iter().enumerate().all(|(i, wild)| {
            read_word(target, start.wrapping_add(i as u32 * INSTRUCTION_SIZE))
                .is_some_and(|word| wild.matches(word))
        })
}

/// Symbolically execute the prologue of the function at `start_pc`,
/// reporting register contents as of `query_pc`.
///
/// `innermost` is set for the frame that is currently executing; only then
/// can `query_pc` sit in an epilogue that has already released the frame.
pub fn scan<E: Encoding>(
    target: &dyn Target,
    start_pc: u32,
    query_pc: u32,
    innermost: bool,
) -> PrologueAnalysis {
    let layout = E::LAYOUT;
    let mut analysis = PrologueAnalysis::new(layout, start_pc, query_pc);
    let limit_pc = start_pc.saturating_add(SCAN_LIMIT);
    let mut pc = start_pc;

    let profiler = E::PROFILER_PREAMBLE;
    if matches_sequence(target, pc, profiler) {
        pc = pc.saturating_add(profiler.len() as u32 * INSTRUCTION_SIZE);
    }

    let irq_entry = E::IRQ_ENTRY_PREAMBLE;
    if E::EXCEPTION_HANDLERS && matches_sequence(target, pc, irq_entry) {
        pc = pc.saturating_add(irq_entry.len() as u32 * INSTRUCTION_SIZE);
        analysis.exception_handler = true;
    }

    // `live` keeps evolving after `query_pc` so later stores can still mark
    // an exception handler; `at_query` is what gets reported.
    let mut live = analysis.values.clone();
    let mut at_query: Option<Vec<RegValue>> = None;
    let saved = &mut analysis.saved;

    while pc < limit_pc {
        if pc == query_pc && at_query.is_none() {
            at_query = Some(live.clone());
        }

        let insn_pc = pc;
        let Some(word) = read_word(target, pc) else {
            debug!(target: LOG_TARGET, "prologue scan stopped at unreadable 0x{pc:08x}");
            break;
        };
        pc = pc.saturating_add(INSTRUCTION_SIZE);

        let Ok(ins) = E::decode(word) else {
            continue;
        };
        trace!(target: LOG_TARGET, "0x{insn_pc:08x}: {ins}");

        let value = |reg: Register| live.get(reg.index()).copied().unwrap_or(RegValue::UNKNOWN);
        let mut prologue_insn = false;
        let mut within_prologue = true;

        match ins.opcode {
            Opcode::ADD => {
                let (ra, rb, rc) = (ins.op_a, ins.op_b, ins.op_c);
                let sp_saved = saved_at(saved, Register::SP);

                if rc == Register::SP
                    && rb == Register::ZERO
                    && sp_saved != SavedAt::NotSaved
                    && value(ra).base == sp_saved.base()
                {
                    // Stack switch: the old sp was stored near the new one.
                    // Whatever was saved relative to the old stack is lost;
                    // fake a high-water mark 4 bytes above the stored sp.
                    let new_offset = value(ra)
                        .offset
                        .wrapping_sub(sp_saved.offset())
                        .wrapping_sub(4);
                    for slot in saved.iter_mut() {
                        if slot.is_relative_to(Register::SP) {
                            *slot = SavedAt::NotSaved;
                        }
                    }
                    for slot in live.iter_mut() {
                        if slot.is(Register::SP) {
                            slot.base = None;
                        }
                    }
                    let sp = RegValue {
                        base: Some(Register::SP),
                        offset: new_offset,
                    };
                    set(&mut live, Register::SP, sp);
                    set(
                        saved,
                        Register::SP,
                        SavedAt::Relative {
                            base: Register::SP,
                            offset: -4,
                        },
                    );
                } else if rc != Register::ZERO {
                    let (a, b) = (value(ra), value(rb));
                    let base = if b.is_constant() {
                        a.base
                    } else if a.is_constant() {
                        b.base
                    } else {
                        None
                    };
                    let sum = RegValue {
                        base,
                        offset: a.offset.wrapping_add(b.offset),
                    };
                    set(&mut live, rc, sum);
                }
                prologue_insn = true;
            }

            Opcode::SUB => {
                let (a, b) = (value(ins.op_a), value(ins.op_b));
                if ins.op_c != Register::ZERO {
                    let difference = RegValue {
                        base: if b.is_constant() { a.base } else { None },
                        offset: a.offset.wrapping_sub(b.offset),
                    };
                    set(&mut live, ins.op_c, difference);
                }
            }

            Opcode::ADDI => {
                let (ra, rb) = (ins.op_a, ins.op_b);
                // Only the first stack adjustment belongs to the prologue;
                // later ones are alloca or the epilogue.
                if rb == Register::SP
                    && (value(rb).offset != 0 || !value(ra).is(Register::SP))
                {
                    break;
                }
                let a = value(ra);
                if rb != Register::ZERO {
                    let sum = RegValue {
                        base: a.base,
                        offset: a.offset.wrapping_add(ins.simm()),
                    };
                    set(&mut live, rb, sum);
                }
                prologue_insn = true;
            }

            Opcode::ORHI => {
                let a = value(ins.op_a);
                if ins.op_b != Register::ZERO {
                    let high = RegValue {
                        base: if a.is_constant() { Some(Register::ZERO) } else { None },
                        offset: a.offset | ins.imm as i32,
                    };
                    set(&mut live, ins.op_b, high);
                }
            }

            Opcode::MOVHI20 => {
                if ins.op_b != Register::ZERO {
                    let high = RegValue {
                        base: Some(Register::ZERO),
                        offset: ins.imm as i32,
                    };
                    set(&mut live, ins.op_b, high);
                }
            }

            Opcode::STW | Opcode::STWIO => {
                let (addr, stored) = (value(ins.op_a), value(ins.op_b));
                // For exception handlers ea-4 is stored as the return address.
                let original = stored.base.filter(|&orig| {
                    orig != Register::ZERO
                        && (stored.offset == 0
                            || (E::EXCEPTION_HANDLERS && orig == Register::EA && stored.offset == -4))
                });

                if let Some(orig) = original {
                    let current = saved_at(saved, orig);
                    if (addr.is(Register::SP) && !current.is_relative_to(Register::SP))
                        || current == SavedAt::NotSaved
                    {
                        if insn_pc < query_pc {
                            let slot =
                                SavedAt::relative(addr.base, addr.offset.wrapping_add(ins.simm()));
                            set(saved, orig, slot);
                        }
                        prologue_insn = true;

                        if E::EXCEPTION_HANDLERS && (orig == Register::EA || orig == layout.estatus())
                        {
                            analysis.exception_handler = true;
                        }
                    }
                }
            }

            Opcode::RDCTL => {
                if ins.op_c != Register::ZERO {
                    // Control registers this core does not have hold nothing
                    // the unwinder can recover.
                    let ctl = layout.ctl(ins.imm as usize);
                    let entry = if layout.contains(ctl) {
                        RegValue::entry(ctl)
                    } else {
                        RegValue::UNKNOWN
                    };
                    set(&mut live, ins.op_c, entry);
                }
                prologue_insn = true;
            }

            Opcode::CALL
                if value(Register::R8) == RegValue::entry(Register::RA)
                    && value(Register::SP) == RegValue::entry(Register::SP) =>
            {
                // A call to mcount, made with ra copied to r8 before the
                // stack adjustment. mcount clobbers r2-r3, r9-r15 and ra.
                for n in (2..=3).chain(9..=15).chain([Register::RA.number()]) {
                    set(&mut live, Register::new(n), RegValue::UNKNOWN);
                }
                prologue_insn = true;
            }

            // bgeu sp, rx, +4 ; break 3
            Opcode::BGEU if ins.op_a == Register::SP && ins.simm() == 4 => {
                if read_word(target, pc) == Some(E::STACK_CHECK_BREAK) {
                    pc = pc.saturating_add(INSTRUCTION_SIZE);
                } else {
                    within_prologue = false;
                }
            }

            // bltu sp, rx, .Lstack_overflow, where the target is break 3
            Opcode::BLTU if ins.op_a == Register::SP => {
                let target_pc = pc.wrapping_add(ins.imm);
                if read_word(target, target_pc) != Some(E::STACK_CHECK_BREAK) {
                    within_prologue = false;
                }
            }

            opcode if opcode.is_control_transfer() => within_prologue = false,

            _ => {}
        }

        if prologue_insn {
            analysis.prologue_end = pc;
        }
        if !within_prologue {
            break;
        }
    }

    analysis.values = at_query.unwrap_or(live);

    if innermost && query_pc > start_pc && in_epilogue::<E>(target, query_pc) {
        // The frame is already torn down; everything is back in place.
        analysis.values = default_values(layout);
        analysis.saved = vec![SavedAt::NotSaved; layout.num_regs()];
    }

    if analysis.exception_handler {
        analysis.return_register = Register::EA;
    }

    analysis
}

/// Whether `pc` is the return (or tail jump) right after the stack was
/// released.
fn in_epilogue<E: Encoding>(target: &dyn Target, pc: u32) -> bool {
    let Some(prev) = decode::<E>(target, pc.wrapping_sub(INSTRUCTION_SIZE)) else {
        return false;
    };
    let sp = Register::SP;
    let releases_stack = match prev.opcode {
        Opcode::ADDI | Opcode::LDW => prev.op_a == sp && prev.op_b == sp,
        Opcode::ADD => prev.op_a == sp && prev.op_c == sp,
        _ => false,
    };
    if !releases_stack {
        return false;
    }

    decode::<E>(target, pc).is_some_and(|ins| {
        matches!(
            ins.opcode,
            Opcode::RET | Opcode::ERET | Opcode::JMP | Opcode::BR
        )
    })
}

/// A frame whose CFA could be reached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnwindCache {
    /// Function entry.
    pub pc: u32,
    /// Current value of the base register.
    pub base: u32,
    pub cfa: u32,
    pub prologue_end: u32,
    pub return_register: Register,
    pub exception_handler: bool,
    /// Resolved save address of each register's caller value.
    saved: Vec<Option<u32>>,
}

impl UnwindCache {
    pub fn saved_address(&self, reg: Register) -> Option<u32> {
        self.saved.get(reg.index()).copied().flatten()
    }

    /// Registers with a known save slot.
    pub fn saved_registers(&self) -> impl Iterator<Item = (Register, u32)> + '_ {
        self.saved
            .iter()
            .enumerate()
            .filter_map(|(i, addr)| addr.map(|addr| (Register::new(i as u8), addr)))
    }
}

/// Resolve `analysis` against the registers of the frame it describes.
///
/// Returns `None` when the CFA cannot be reached. That frame is then the
/// outermost one.
pub fn resolve(
    analysis: &PrologueAnalysis,
    registers: &RegisterSet,
    target: &dyn Target,
    innermost: bool,
) -> Option<UnwindCache> {
    let layout = registers.layout();
    let Some(base_register) = analysis.base_register() else {
        debug!(target: LOG_TARGET, "cannot reach cfa: stack pointer lost");
        return None;
    };

    if analysis.is_leaf(base_register) && !innermost {
        // Not innermost, so it made a call. It can only be a leaf if it was
        // interrupted, in which case ra would not point back into it.
        if registers.value(Register::RA) == Some(analysis.query_pc) {
            debug!(
                target: LOG_TARGET,
                "cannot reach cfa: no return from 0x{:08x}",
                analysis.start_pc
            );
            return None;
        }
    }

    let base = registers.value(base_register)?;
    let frame_high = base.wrapping_sub(analysis.value(base_register).offset as u32);

    let mut gp = None;
    let mut saved = Vec::with_capacity(layout.num_regs());
    for slot in &analysis.saved {
        let address = match *slot {
            SavedAt::NotSaved => None,
            SavedAt::Address(address) => Some(address),
            SavedAt::Relative { base, offset } if base == Register::SP => {
                Some(frame_high.wrapping_add(offset as u32))
            }
            SavedAt::Relative { base, offset } if base == Register::GP => {
                if gp.is_none() {
                    gp = registers.value(Register::GP);
                }
                gp.map(|gp| gp.wrapping_add(offset as u32))
            }
            SavedAt::Relative { .. } => None,
        };
        saved.push(address);
    }

    // After a stack switch the entry sp was spilled; otherwise it is the
    // high-water mark.
    let cfa = match saved.get(Register::SP.index()).copied().flatten() {
        Some(address) => target.read_u32(address).ok()?,
        None => frame_high,
    };

    if analysis.exception_handler {
        // Returning from an exception restores status from estatus.
        let estatus = saved.get_mut(layout.estatus().index()).and_then(Option::take);
        set(&mut saved, layout.status(), estatus);
    }

    debug!(
        target: LOG_TARGET,
        retreg = %analysis.return_register,
        base = %base_register,
        "cfa=0x{cfa:08x}"
    );

    Some(UnwindCache {
        pc: analysis.start_pc,
        base,
        cfa,
        prologue_end: analysis.prologue_end,
        return_register: analysis.return_register,
        exception_handler: analysis.exception_handler,
        saved,
    })
}

/// Analyze the prologue of the function at `start_pc` for a frame stopped
/// at `query_pc`.
pub fn analyze_prologue<E: Encoding>(
    target: &dyn Target,
    start_pc: u32,
    registers: &RegisterSet,
    innermost: bool,
) -> (PrologueAnalysis, Option<UnwindCache>) {
    let query_pc = registers.value(registers.layout().pc()).unwrap_or(start_pc);
    let _span = tracing::debug_span!(
        target: LOG_TARGET,
        "analyze_prologue",
        start_pc,
        query_pc,
    )
    .entered();

    let analysis = scan::<E>(target, start_pc, query_pc, innermost);
    let cache = resolve(&analysis, registers, target, innermost);
    (analysis, cache)
}

/// The first address past the prologue of the function at `start_pc`, or
/// `start_pc` itself when there is no prologue to skip.
pub fn skip_prologue<E: Encoding>(target: &dyn Target, start_pc: u32) -> u32 {
    let analysis = scan::<E>(target, start_pc, start_pc.saturating_add(SCAN_LIMIT), false);
    analysis.prologue_end.max(start_pc)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use nios2_common::isa::{Dpx, Nios2, Opcode};
    use nios2_common_testing::asm::{self, words};

    use super::*;
    use crate::error::{Result, UnwindError};

    const START: u32 = 0x1000;

    /// Words laid out from a base address.
    struct Code(HashMap<u32, u8>);

    impl Code {
        fn new(base: u32, program: &[Instruction]) -> Self {
            Self::encoded::<Nios2>(base, program)
        }

        fn encoded<E: Encoding>(base: u32, program: &[Instruction]) -> Self {
            let mut code = Code(HashMap::new());
            code.place(base, &words::<E>(program));
            code
        }

        fn place(&mut self, base: u32, words: &[u32]) {
            for (i, word) in words.iter().enumerate() {
                for (j, byte) in word.to_le_bytes().into_iter().enumerate() {
                    self.0.insert(base.wrapping_add((i * 4 + j) as u32), byte);
                }
            }
        }
    }

    impl Target for Code {
        fn read_memory(&self, address: u32, buf: &mut [u8]) -> Result<()> {
            for (i, byte) in buf.iter_mut().enumerate() {
                let addr = address.wrapping_add(i as u32);
                *byte = *self.0.get(&addr).ok_or(UnwindError::MemoryRead {
                    address: addr,
                    len: 1,
                })?;
            }
            Ok(())
        }
    }

    fn frame_prologue() -> Vec<Instruction> {
        vec![
            asm::addi(Register::SP, Register::SP, -16),
            asm::stw(Register::RA, 12, Register::SP),
            asm::stw(Register::FP, 8, Register::SP),
            asm::mov(Register::FP, Register::SP),
            asm::call(0x2000),
            asm::ldw(Register::RA, 12, Register::SP),
            asm::ldw(Register::FP, 8, Register::SP),
            asm::addi(Register::SP, Register::SP, 16),
            asm::ret(),
        ]
    }

    fn registers(pc: u32, sp: u32, fp: u32, ra: u32) -> RegisterSet {
        registers_in(Nios2::LAYOUT, pc, sp, fp, ra)
    }

    fn registers_in(layout: RegisterLayout, pc: u32, sp: u32, fp: u32, ra: u32) -> RegisterSet {
        let mut regs = RegisterSet::new(layout);
        regs.set(layout.pc(), Some(pc));
        regs.set(Register::SP, Some(sp));
        regs.set(Register::FP, Some(fp));
        regs.set(Register::RA, Some(ra));
        regs.set(Register::GP, Some(0x8000));
        regs
    }

    #[test]
    fn test_leaf_ret() {
        let code = Code::new(START, &[asm::ret()]);
        let analysis = scan::<Nios2>(&code, START, START, true);
        assert_eq!(analysis.prologue_end, START);
        assert_eq!(analysis.base_register(), Some(Register::SP));
        assert!(analysis.saved.iter().all(|s| *s == SavedAt::NotSaved));
        assert_eq!(analysis.return_register, Register::RA);

        let cache = resolve(&analysis, &registers(START, 0x7000, 0, 0x1234), &code, true).unwrap();
        assert_eq!(cache.cfa, 0x7000);
        assert_eq!(cache.saved_registers().count(), 0);
    }

    #[test]
    fn test_frame_round_trip() {
        let code = Code::new(START, &frame_prologue());
        let entry_sp = 0x7000;

        // Stopped at the call, after the frame is set up.
        let regs = registers(START + 16, entry_sp - 16, entry_sp - 16, 0x1234);
        let (analysis, cache) = analyze_prologue::<Nios2>(&code, START, &regs, true);
        assert_eq!(analysis.prologue_end, START + 16);
        assert_eq!(analysis.base_register(), Some(Register::FP));
        assert_eq!(analysis.value(Register::FP), RegValue { base: Some(Register::SP), offset: -16 });
        assert_eq!(analysis.saved(Register::RA), SavedAt::Relative { base: Register::SP, offset: -4 });

        let cache = cache.unwrap();
        assert_eq!(cache.cfa, entry_sp);
        assert_eq!(cache.base, entry_sp - 16);
        assert_eq!(cache.saved_address(Register::RA), Some(entry_sp - 4));
        assert_eq!(cache.saved_address(Register::FP), Some(entry_sp - 8));
    }

    #[test]
    fn test_stores_after_query_pc_are_ignored() {
        let code = Code::new(START, &frame_prologue());
        let entry_sp = 0x7000;

        // Stopped on the store of ra.
        let regs = registers(START + 4, entry_sp - 16, 0, 0x1234);
        let analysis = scan::<Nios2>(&code, START, START + 4, true);
        assert_eq!(analysis.saved(Register::RA), SavedAt::NotSaved);
        // The scan still covers the whole prologue.
        assert_eq!(analysis.prologue_end, START + 16);
        assert_eq!(analysis.base_register(), Some(Register::SP));

        let cache = resolve(&analysis, &regs, &code, true).unwrap();
        assert_eq!(cache.cfa, entry_sp);
        assert_eq!(cache.saved_address(Register::RA), None);
    }

    #[test]
    fn test_epilogue_resets_frame() {
        let code = Code::new(START, &frame_prologue());
        // Stopped on `ret`, right after `addi sp, sp, 16`.
        let regs = registers(START + 32, 0x7000, 0x6000, 0x1234);
        let (analysis, cache) = analyze_prologue::<Nios2>(&code, START, &regs, true);
        assert_eq!(analysis.base_register(), Some(Register::SP));
        assert_eq!(analysis.saved(Register::RA), SavedAt::NotSaved);
        assert_eq!(cache.unwrap().cfa, 0x7000);

        // The same pc in an outer frame is not an epilogue.
        let analysis = scan::<Nios2>(&code, START, START + 32, false);
        assert_ne!(analysis.saved(Register::RA), SavedAt::NotSaved);
    }

    #[test]
    fn test_large_frame_through_r8() {
        let program = [
            asm::movhi(Register::R8, 1),
            asm::addi(Register::R8, Register::R8, 0x10),
            asm::sub(Register::SP, Register::SP, Register::R8),
            asm::add(Register::R8, Register::R8, Register::SP),
            asm::stw(Register::RA, -4, Register::R8),
            asm::ret(),
        ];
        let code = Code::new(START, &program);
        let analysis = scan::<Nios2>(&code, START, START + 20, true);

        assert_eq!(analysis.value(Register::SP), RegValue { base: Some(Register::SP), offset: -0x1_0010 });
        assert_eq!(analysis.value(Register::R8), RegValue { base: Some(Register::SP), offset: 0 });
        assert_eq!(analysis.saved(Register::RA), SavedAt::Relative { base: Register::SP, offset: -4 });
    }

    #[test]
    fn test_second_stack_adjustment_ends_scan() {
        let program = [
            asm::addi(Register::SP, Register::SP, -8),
            asm::stw(Register::RA, 4, Register::SP),
            asm::addi(Register::SP, Register::SP, -32),
            asm::stw(Register::new(16), 0, Register::SP),
        ];
        let code = Code::new(START, &program);
        let analysis = scan::<Nios2>(&code, START, START + 16, true);
        assert_eq!(analysis.prologue_end, START + 8);
        assert_eq!(analysis.value(Register::SP).offset, -8);
        assert_eq!(analysis.saved(Register::new(16)), SavedAt::NotSaved);
    }

    #[test]
    fn test_stack_check_is_transparent() {
        let program = [
            asm::addi(Register::SP, Register::SP, -8),
            asm::branch(Opcode::BGEU, Register::SP, Register::ET, 4),
            asm::brk(3),
            asm::stw(Register::RA, 4, Register::SP),
            asm::ret(),
        ];
        let code = Code::new(START, &program);
        let analysis = scan::<Nios2>(&code, START, START + 16, true);
        assert_eq!(analysis.prologue_end, START + 16);
        assert!(analysis.saved(Register::RA).is_relative_to(Register::SP));

        // Without the break it is an ordinary branch.
        let program = [
            asm::addi(Register::SP, Register::SP, -8),
            asm::branch(Opcode::BGEU, Register::SP, Register::ET, 4),
            asm::nop(),
            asm::stw(Register::RA, 4, Register::SP),
        ];
        let code = Code::new(START, &program);
        let analysis = scan::<Nios2>(&code, START, START + 16, true);
        assert_eq!(analysis.prologue_end, START + 4);
        assert_eq!(analysis.saved(Register::RA), SavedAt::NotSaved);
    }

    #[test]
    fn test_mcount_call_clobbers() {
        let program = [
            asm::mov(Register::R8, Register::RA),
            asm::call(0x4000),
            asm::mov(Register::RA, Register::R8),
            asm::addi(Register::SP, Register::SP, -8),
            asm::stw(Register::RA, 4, Register::SP),
            asm::ret(),
        ];
        let code = Code::new(START, &program);
        let analysis = scan::<Nios2>(&code, START, START + 20, true);
        assert_eq!(analysis.prologue_end, START + 20);
        assert_eq!(analysis.value(Register::R2).base, None);
        assert_eq!(analysis.value(Register::RA), RegValue::entry(Register::RA));
        assert!(analysis.saved(Register::RA).is_relative_to(Register::SP));
    }

    #[test]
    fn test_profiler_preamble_skipped() {
        let mut code = Code::new(START, &[]);
        let preamble = [0x0010_e03a, 0xf813_883a, 0x0280_0034, 0x5280_0004, 0x0000_1000, 0x483f_883a];
        code.place(START, &preamble);
        code.place(
            START + 24,
            &words::<Nios2>(&[asm::addi(Register::SP, Register::SP, -8), asm::ret()]),
        );
        let analysis = scan::<Nios2>(&code, START, START + 28, true);
        assert_eq!(analysis.prologue_end, START + 28);
        assert_eq!(analysis.value(Register::R9), RegValue::entry(Register::R9));
    }

    #[test]
    fn test_exception_handler() {
        let program = [
            asm::rdctl(Register::ET, 0x1),
            asm::addi(Register::SP, Register::SP, -16),
            asm::stw(Register::ET, 4, Register::SP),
            asm::addi(Register::EA, Register::EA, -4),
            asm::stw(Register::EA, 0, Register::SP),
            asm::stw(Register::RA, 8, Register::SP),
            asm::eret(),
        ];
        let code = Code::new(START, &program);
        let layout = Nios2::LAYOUT;
        let regs = registers(START + 24, 0x7000 - 16, 0, 0);
        let (analysis, cache) = analyze_prologue::<Nios2>(&code, START, &regs, true);

        assert!(analysis.exception_handler);
        assert_eq!(analysis.return_register, Register::EA);
        assert_eq!(analysis.value(Register::ET), RegValue::entry(layout.estatus()));

        let cache = cache.unwrap();
        assert_eq!(cache.saved_address(Register::EA), Some(0x7000 - 16));
        assert_eq!(cache.saved_address(layout.status()), Some(0x7000 - 12));
        assert_eq!(cache.saved_address(layout.estatus()), None);
    }

    #[test]
    fn test_stack_switch() {
        let new_stack = 0x0100_0000;
        let [hi, lo] = asm::movia(Register::R8, new_stack);
        let program = [
            hi,
            lo,
            asm::stw(Register::SP, -4, Register::R8),
            asm::addi(Register::R8, Register::R8, -4),
            asm::mov(Register::SP, Register::R8),
            asm::ret(),
        ];
        let mut code = Code::new(START, &program);
        let entry_sp = 0x7000u32;
        code.place(new_stack - 4, &[entry_sp]);

        let regs = registers(START + 20, new_stack - 4, 0, 0x1234);
        let (analysis, cache) = analyze_prologue::<Nios2>(&code, START, &regs, true);
        // The old sp sits just above the new one.
        assert_eq!(analysis.value(Register::SP), RegValue { base: Some(Register::SP), offset: -4 });
        assert_eq!(analysis.saved(Register::SP), SavedAt::Relative { base: Register::SP, offset: -4 });

        let cache = cache.unwrap();
        assert_eq!(cache.saved_address(Register::SP), Some(new_stack - 4));
        assert_eq!(cache.cfa, entry_sp);
    }

    #[test]
    fn test_outer_leaf_pointing_at_itself_is_outermost() {
        let code = Code::new(START, &[asm::nop(), asm::nop(), asm::ret()]);
        let regs = registers(START + 4, 0x7000, 0, START + 4);
        let (_, cache) = analyze_prologue::<Nios2>(&code, START, &regs, false);
        assert!(cache.is_none());

        let regs = registers(START + 4, 0x7000, 0, 0x5000);
        let (_, cache) = analyze_prologue::<Nios2>(&code, START, &regs, false);
        assert_eq!(cache.unwrap().cfa, 0x7000);
    }

    #[test]
    fn test_skip_prologue() {
        let code = Code::new(START, &frame_prologue());
        assert_eq!(skip_prologue::<Nios2>(&code, START), START + 16);

        let code = Code::new(START, &[asm::ret()]);
        assert_eq!(skip_prologue::<Nios2>(&code, START), START);

        // Unreadable code has no prologue.
        assert_eq!(skip_prologue::<Nios2>(&code, 0x9000), 0x9000);
    }

    #[test]
    fn test_missing_control_register_has_no_provenance() {
        // ctl20 does not exist in the 49-register file.
        let program = [
            asm::addi(Register::SP, Register::SP, -8),
            asm::rdctl(Register::R4, 20),
            asm::stw(Register::R4, 0, Register::SP),
            asm::ret(),
        ];
        let code = Code::new(START, &program);
        let analysis = scan::<Nios2>(&code, START, START + 12, true);
        assert_eq!(analysis.value(Register::R4).base, None);
        assert!(analysis.saved.iter().all(|s| *s == SavedAt::NotSaved));
        assert_eq!(analysis.prologue_end, START + 8);

        // ctl1 does.
        let program = [
            asm::addi(Register::SP, Register::SP, -8),
            asm::rdctl(Register::R4, 1),
            asm::stw(Register::R4, 0, Register::SP),
            asm::ret(),
        ];
        let code = Code::new(START, &program);
        let analysis = scan::<Nios2>(&code, START, START + 12, true);
        let estatus = Nios2::LAYOUT.estatus();
        assert_eq!(analysis.saved(estatus), SavedAt::Relative { base: Register::SP, offset: -8 });
    }

    #[test]
    fn test_scan_at_top_of_address_space() {
        let start = u32::MAX - 7;
        let program = [
            asm::addi(Register::SP, Register::SP, -8),
            asm::stw(Register::RA, 4, Register::SP),
        ];
        let code = Code::new(start, &program);
        let analysis = scan::<Nios2>(&code, start, u32::MAX, false);
        assert_eq!(analysis.value(Register::SP).offset, -8);
        assert_eq!(analysis.saved(Register::RA), SavedAt::Relative { base: Register::SP, offset: -4 });
        assert_eq!(skip_prologue::<Nios2>(&code, start), u32::MAX);
    }

    #[test]
    fn test_dpx_frame_round_trip() {
        let code = Code::encoded::<Dpx>(START, &frame_prologue());
        let entry_sp = 0x7000;

        let regs = registers_in(Dpx::LAYOUT, START + 16, entry_sp - 16, entry_sp - 16, 0x1234);
        let (analysis, cache) = analyze_prologue::<Dpx>(&code, START, &regs, true);
        assert_eq!(analysis.prologue_end, START + 16);
        assert_eq!(analysis.base_register(), Some(Register::FP));
        assert_eq!(analysis.saved(Register::RA), SavedAt::Relative { base: Register::SP, offset: -4 });

        let cache = cache.unwrap();
        assert_eq!(cache.cfa, entry_sp);
        assert_eq!(cache.saved_address(Register::RA), Some(entry_sp - 4));
        assert_eq!(cache.saved_address(Register::FP), Some(entry_sp - 8));

        // Stopped on `ret` after the frame is released.
        let regs = registers_in(Dpx::LAYOUT, START + 32, entry_sp, 0x6000, 0x1234);
        let (analysis, cache) = analyze_prologue::<Dpx>(&code, START, &regs, true);
        assert_eq!(analysis.saved(Register::RA), SavedAt::NotSaved);
        assert_eq!(cache.unwrap().cfa, entry_sp);
    }

    #[test]
    fn test_dpx_stack_check_uses_scaled_offset() {
        let program = [
            asm::addi(Register::SP, Register::SP, -8),
            asm::branch(Opcode::BGEU, Register::SP, Register::ET, 4),
            asm::brk(3),
            asm::stw(Register::RA, 4, Register::SP),
            asm::ret(),
        ];
        let code = Code::encoded::<Dpx>(START, &program);
        let analysis = scan::<Dpx>(&code, START, START + 16, true);
        assert_eq!(analysis.prologue_end, START + 16);
        assert!(analysis.saved(Register::RA).is_relative_to(Register::SP));
    }

    #[test]
    fn test_dpx_large_frame_through_movhi20() {
        let program = [
            Instruction::new_itype(Opcode::MOVHI20, Register::ZERO, Register::R8, 0x1000),
            asm::sub(Register::SP, Register::SP, Register::R8),
            asm::stw(Register::new(40), 0, Register::SP),
            asm::ret(),
        ];
        let code = Code::encoded::<Dpx>(START, &program);
        let analysis = scan::<Dpx>(&code, START, START + 12, true);
        assert_eq!(analysis.value(Register::R8), RegValue { base: Some(Register::ZERO), offset: 0x1000 });
        assert_eq!(analysis.value(Register::SP), RegValue { base: Some(Register::SP), offset: -0x1000 });
        assert_eq!(
            analysis.saved(Register::new(40)),
            SavedAt::Relative { base: Register::SP, offset: -0x1000 }
        );
    }

    #[test]
    fn test_dpx_has_no_exception_handlers() {
        let program = [
            asm::addi(Register::SP, Register::SP, -8),
            asm::stw(Register::EA, 4, Register::SP),
            asm::stw(Register::RA, 0, Register::SP),
            asm::ret(),
        ];
        let code = Code::encoded::<Dpx>(START, &program);
        let analysis = scan::<Dpx>(&code, START, START + 12, true);
        assert!(!analysis.exception_handler);
        assert_eq!(analysis.return_register, Register::RA);
        assert!(analysis.saved(Register::EA).is_relative_to(Register::SP));

        let code = Code::new(START, &program);
        let analysis = scan::<Nios2>(&code, START, START + 12, true);
        assert!(analysis.exception_handler);
        assert_eq!(analysis.return_register, Register::EA);
    }
}
