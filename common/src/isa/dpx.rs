//! The DPX encoding: a 4-bit primary opcode, 64 general purpose registers and
//! a denser immediate layout.
//!
//! ```text
//! IX:    | OP:31..28 | SUB:27..26 | IMM26:25..0                          |
//! I12:   | OP:31..28 | A:27..22   | B:21..16 | SUB:15..12 | IMM12:11..0   |
//! I5:    | OP:31..28 | A:27..22   | B:21..16 | 0:15..12 | SUB:11..8 | 0:7..5 | IMM5:4..0 |
//! I16:   | OP:31..28 | A:27..22   | B:21..16 | IMM16:15..0                |
//! R3:    | OP:31..28 | A:27..22   | B:21..16 | C:15..10 | CUSTOM:9 | 0:8..6 | SUB:5..0 |
//! ```
//!
//! `movhi20` stores its destination in bits 25..20 and the value in 19..0.
//! The data-cache group selects its operation with the low two bits of B.

use super::{
    sign_extension, Encoding, Instruction, OpcodeEntry, Opcode, Register, RegisterLayout,
    WildInsn,
};
use crate::error::DecodeError;

const OP_SHIFT: u32 = 28;
const OP_MASK: u32 = 0xF << OP_SHIFT;
const A_MASK: u32 = 0x3F << 22;
const B_MASK: u32 = 0x3F << 16;
const C_MASK: u32 = 0x3F << 10;
const IX_SUB_MASK: u32 = 0x3 << 26;
const I12_SUB_MASK: u32 = 0xF << 12;
const I5_SUB_MASK: u32 = 0xF << 8;
const I5_RESERVED_MASK: u32 = 0x7 << 5;
const R3_SUB_MASK: u32 = 0x3F;
const R3_CUSTOM_BIT: u32 = 1 << 9;
const R3_RESERVED_MASK: u32 = 0x7 << 6;

const OP_IX: u32 = 0x0;
const OP_I12A: u32 = 0x1;
const OP_I12B: u32 = 0x2;
const OP_R3: u32 = 0x3;

const I12A_I5: u32 = 0x0;
const I12B_DCACHE: u32 = 0xD;

/// Sub-opcode numbers of the I5 and data-cache groups are listed after the
/// sixteen I12 sub-opcodes so that one `ext` value names a row.
const NESTED_EXT: u32 = 0x10;
/// `ext` of the custom-instruction row.
const CUSTOM_EXT: u32 = 0x40;

const fn field_op(word: u32) -> u32 {
    word >> OP_SHIFT
}

const fn field_a(word: u32) -> u8 {
    (word >> 22) as u8 & 0x3F
}

const fn field_b(word: u32) -> u8 {
    (word >> 16) as u8 & 0x3F
}

const fn field_c(word: u32) -> u8 {
    (word >> 10) as u8 & 0x3F
}

const fn set_a(reg: u8) -> u32 {
    (reg as u32 & 0x3F) << 22
}

const fn set_b(reg: u8) -> u32 {
    (reg as u32 & 0x3F) << 16
}

const fn set_c(reg: u8) -> u32 {
    (reg as u32 & 0x3F) << 10
}

/// Primary opcode and sub-opcode of `word`, in the numbering used by [`OPCODES`].
fn selector(word: u32) -> (u32, Option<u32>) {
    let op = field_op(word);
    let ext = match op {
        OP_IX => Some((word & IX_SUB_MASK) >> 26),
        OP_I12A | OP_I12B => {
            let sub = (word & I12_SUB_MASK) >> 12;
            match (op, sub) {
                (OP_I12A, I12A_I5) => Some(NESTED_EXT | ((word & I5_SUB_MASK) >> 8)),
                (OP_I12B, I12B_DCACHE) => Some(NESTED_EXT | ((word >> 16) & 0x3)),
                _ => Some(sub),
            }
        }
        OP_R3 if word & R3_CUSTOM_BIT != 0 => Some(CUSTOM_EXT),
        OP_R3 => Some(word & R3_SUB_MASK),
        _ => None,
    };
    (op, ext)
}

const fn ix(opcode: Opcode, sub: u32) -> OpcodeEntry {
    OpcodeEntry::new(
        opcode,
        OP_IX,
        Some(sub),
        (OP_IX << OP_SHIFT) | (sub << 26),
        OP_MASK | IX_SUB_MASK,
    )
}

const fn i12(opcode: Opcode, op: u32, sub: u32) -> OpcodeEntry {
    OpcodeEntry::new(
        opcode,
        op,
        Some(sub),
        (op << OP_SHIFT) | (sub << 12),
        OP_MASK | I12_SUB_MASK,
    )
}

const fn i5(opcode: Opcode, sub: u32, mask: u32, bits: u32) -> OpcodeEntry {
    OpcodeEntry::new(
        opcode,
        OP_I12A,
        Some(NESTED_EXT | sub),
        (OP_I12A << OP_SHIFT) | (I12A_I5 << 12) | (sub << 8) | bits,
        OP_MASK | I12_SUB_MASK | I5_SUB_MASK | I5_RESERVED_MASK | mask,
    )
}

const fn dcache(opcode: Opcode, sub: u32) -> OpcodeEntry {
    OpcodeEntry::new(
        opcode,
        OP_I12B,
        Some(NESTED_EXT | sub),
        (OP_I12B << OP_SHIFT) | (I12B_DCACHE << 12) | (sub << 16),
        OP_MASK | I12_SUB_MASK | B_MASK,
    )
}

const fn i16(opcode: Opcode, op: u32) -> OpcodeEntry {
    OpcodeEntry::new(opcode, op, None, op << OP_SHIFT, OP_MASK)
}

const fn r3(opcode: Opcode, sub: u32) -> OpcodeEntry {
    r3_fixed(opcode, sub, 0, 0)
}

const fn r3_fixed(opcode: Opcode, sub: u32, mask: u32, bits: u32) -> OpcodeEntry {
    OpcodeEntry::new(
        opcode,
        OP_R3,
        Some(sub),
        (OP_R3 << OP_SHIFT) | sub | bits,
        OP_MASK | R3_CUSTOM_BIT | R3_RESERVED_MASK | R3_SUB_MASK | mask,
    )
}

const OPCODES: &[OpcodeEntry] = &[
    ix(Opcode::CALL, 0),
    ix(Opcode::JMPI, 1),
    ix(Opcode::MOVHI20, 2),
    i12(Opcode::CMPGEI, OP_I12A, 0x1),
    i12(Opcode::CMPLTI, OP_I12A, 0x2),
    i12(Opcode::CMPNEI, OP_I12A, 0x3),
    i12(Opcode::CMPEQI, OP_I12A, 0x4),
    i12(Opcode::CMPGEUI, OP_I12A, 0x5),
    i12(Opcode::CMPLTUI, OP_I12A, 0x6),
    i12(Opcode::RDPRS, OP_I12A, 0x7),
    i12(Opcode::BGE, OP_I12A, 0x8),
    i12(Opcode::BLT, OP_I12A, 0x9),
    i12(Opcode::BNE, OP_I12A, 0xA),
    i12(Opcode::BEQ, OP_I12A, 0xB),
    i12(Opcode::BGEU, OP_I12A, 0xC),
    i12(Opcode::BLTU, OP_I12A, 0xD),
    i5(Opcode::ROLI, 0x0, 0, 0),
    i5(Opcode::SLLI, 0x1, 0, 0),
    i5(Opcode::SRLI, 0x2, 0, 0),
    i5(Opcode::SRAI, 0x3, 0, 0),
    i5(Opcode::TRAP, 0x4, B_MASK, set_b(29)),
    i5(Opcode::BREAK, 0x5, B_MASK, set_b(30)),
    i12(Opcode::LDB, OP_I12B, 0x0),
    i12(Opcode::LDH, OP_I12B, 0x1),
    i12(Opcode::LDW, OP_I12B, 0x2),
    i12(Opcode::ADDI, OP_I12B, 0x3),
    i12(Opcode::LDBU, OP_I12B, 0x4),
    i12(Opcode::LDHU, OP_I12B, 0x5),
    i12(Opcode::STB, OP_I12B, 0x6),
    i12(Opcode::STH, OP_I12B, 0x7),
    i12(Opcode::STW, OP_I12B, 0x8),
    i12(Opcode::MULI, OP_I12B, 0x9),
    i12(Opcode::INSERT, OP_I12B, 0xA),
    i12(Opcode::EXTRACT, OP_I12B, 0xB),
    i12(Opcode::MERGE, OP_I12B, 0xC),
    dcache(Opcode::INITD, 0),
    dcache(Opcode::INITDA, 1),
    dcache(Opcode::FLUSHD, 2),
    dcache(Opcode::FLUSHDA, 3),
    i16(Opcode::SNDI, 0x4),
    i16(Opcode::RCVI, 0x5),
    i16(Opcode::ANDI, 0x6),
    i16(Opcode::ANDCI, 0x7),
    i16(Opcode::ANDCHI, 0x8),
    i16(Opcode::ORI, 0x9),
    i16(Opcode::XORI, 0xA),
    i16(Opcode::ANDHI, 0xC),
    i16(Opcode::ORHI, 0xE),
    i16(Opcode::XORHI, 0xF),
    r3_fixed(Opcode::ERET, 0x01, A_MASK | B_MASK | C_MASK, set_a(29) | set_b(30)),
    r3(Opcode::FORK, 0x02),
    r3(Opcode::ROL, 0x03),
    r3(Opcode::FLUSHP, 0x04),
    r3_fixed(Opcode::RET, 0x05, A_MASK | B_MASK | C_MASK, set_a(31)),
    r3(Opcode::NOR, 0x06),
    r3(Opcode::MULXUU, 0x07),
    r3(Opcode::CMPGE, 0x08),
    r3_fixed(Opcode::BRET, 0x09, A_MASK | C_MASK, set_a(30)),
    r3(Opcode::EXIT, 0x0A),
    r3(Opcode::ROR, 0x0B),
    r3(Opcode::FLUSHI, 0x0C),
    r3(Opcode::JMP, 0x0D),
    r3(Opcode::AND, 0x0E),
    r3(Opcode::CMPLT, 0x10),
    r3(Opcode::CIDALLOC, 0x11),
    r3(Opcode::SLL, 0x13),
    r3(Opcode::WRPRS, 0x14),
    r3(Opcode::NEXTPC, 0x15),
    r3(Opcode::OR, 0x16),
    r3(Opcode::MULXSU, 0x17),
    r3(Opcode::CMPNE, 0x18),
    r3(Opcode::SRL, 0x1B),
    r3_fixed(Opcode::CALLR, 0x1D, B_MASK | C_MASK, set_c(31)),
    r3(Opcode::XOR, 0x1E),
    r3(Opcode::MULXSS, 0x1F),
    r3(Opcode::CMPEQ, 0x20),
    r3(Opcode::SND, 0x21),
    r3(Opcode::DIVU, 0x24),
    r3(Opcode::DIV, 0x25),
    r3(Opcode::RDCTL, 0x26),
    r3(Opcode::MUL, 0x27),
    r3(Opcode::CMPGEU, 0x28),
    r3(Opcode::INITI, 0x29),
    r3(Opcode::RCV, 0x2A),
    r3(Opcode::WRCTL, 0x2E),
    r3(Opcode::CMPLTU, 0x30),
    r3(Opcode::ADD, 0x31),
    r3(Opcode::TXALLOC, 0x32),
    r3(Opcode::JREL, 0x35),
    r3(Opcode::SYNC, 0x36),
    r3(Opcode::SUB, 0x39),
    r3(Opcode::RXFREE, 0x3A),
    r3(Opcode::SRA, 0x3B),
    OpcodeEntry::new(
        Opcode::CUSTOM,
        OP_R3,
        Some(CUSTOM_EXT),
        (OP_R3 << OP_SHIFT) | R3_CUSTOM_BIT,
        OP_MASK | R3_CUSTOM_BIT,
    ),
];

/// The DPX encoding.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Dpx;

impl Dpx {
    fn lookup(word: u32) -> Result<&'static OpcodeEntry, DecodeError> {
        let (op, ext) = selector(word);
        let entry = OPCODES
            .iter()
            .find(|entry| entry.op == op && entry.ext == ext)
            .ok_or(DecodeError::Unimplemented(word))?;
        if !entry.matches(word) {
            return Err(DecodeError::IllegalFormat(word, entry.opcode));
        }
        Ok(entry)
    }
}

fn is_i16(opcode: Opcode) -> bool {
    matches!(
        opcode,
        Opcode::SNDI
            | Opcode::RCVI
            | Opcode::ANDI
            | Opcode::ANDCI
            | Opcode::ANDCHI
            | Opcode::ORI
            | Opcode::XORI
            | Opcode::ANDHI
            | Opcode::ORHI
            | Opcode::XORHI
    )
}

fn is_i5(opcode: Opcode) -> bool {
    matches!(
        opcode,
        Opcode::ROLI | Opcode::SLLI | Opcode::SRLI | Opcode::SRAI | Opcode::TRAP | Opcode::BREAK
    )
}

fn is_dcache(opcode: Opcode) -> bool {
    matches!(
        opcode,
        Opcode::INITD | Opcode::INITDA | Opcode::FLUSHD | Opcode::FLUSHDA
    )
}

fn expand_imm12(opcode: Opcode, imm12: u32) -> u32 {
    match opcode {
        Opcode::CMPGEUI | Opcode::CMPLTUI => imm12,
        Opcode::INSERT | Opcode::EXTRACT | Opcode::MERGE => imm12,
        _ if opcode.is_conditional_branch() => (sign_extension(imm12, 12) << 2) as u32,
        _ => sign_extension(imm12, 12) as u32,
    }
}

fn compress_imm12(opcode: Opcode, imm: u32) -> u32 {
    if opcode.is_conditional_branch() {
        ((imm as i32) >> 2) as u32 & 0xFFF
    } else {
        imm & 0xFFF
    }
}

fn expand_imm16(opcode: Opcode, imm16: u32) -> u32 {
    match opcode {
        Opcode::ANDHI | Opcode::ORHI | Opcode::XORHI | Opcode::ANDCHI => imm16 << 16,
        _ => imm16,
    }
}

fn compress_imm16(opcode: Opcode, imm: u32) -> u32 {
    match opcode {
        Opcode::ANDHI | Opcode::ORHI | Opcode::XORHI | Opcode::ANDCHI => imm >> 16,
        _ => imm & 0xFFFF,
    }
}

impl Encoding for Dpx {
    const NAME: &'static str = "nios2dpx";

    const LAYOUT: RegisterLayout = RegisterLayout::DPX;

    const BREAKPOINT: u32 = 0x101D_041F;

    const STACK_CHECK_BREAK: u32 = 0x101E_0503;

    const PROFILER_PREAMBLE: &'static [WildInsn] = &[
        WildInsn::new(0x3000_2015, 0x0000_0000), // nextpc r8
        WildInsn::new(0x37c0_2431, 0x0000_0000), // mov r9,ra
        WildInsn::new(0xe00a_0000, 0x0000_ffff), // movhi r10,%hi(...)
        WildInsn::new(0x228a_3000, 0x0000_0fff), // addi r10,r10,%lo(...)
        WildInsn::new(0x0000_0000, 0x03ff_ffff), // call <mcount>
        WildInsn::new(0x3240_7c31, 0x0000_0000), // mov ra,r9
    ];

    const IRQ_ENTRY_PREAMBLE: &'static [WildInsn] = &[];

    const EXCEPTION_HANDLERS: bool = false;

    const OPCODES: &'static [OpcodeEntry] = OPCODES;

    fn decode(word: u32) -> Result<Instruction, DecodeError> {
        let opcode = Self::lookup(word)?.opcode;
        let a = Register::new(field_a(word));
        let b = Register::new(field_b(word));
        let c = Register::new(field_c(word));
        let zero = Register::ZERO;

        let ins = match opcode {
            Opcode::CALL | Opcode::JMPI => {
                Instruction::new(opcode, zero, zero, zero, word & 0x03FF_FFFF)
            }
            Opcode::MOVHI20 => {
                let dest = Register::new((word >> 20) as u8 & 0x3F);
                Instruction::new_itype(opcode, zero, dest, (word & 0xF_FFFF) << 12)
            }
            Opcode::CUSTOM => {
                let n = word & 0x3F;
                let flags = (word >> 6) & 0x7;
                Instruction::new(opcode, a, b, c, n | (flags << 8))
            }
            Opcode::RDCTL | Opcode::WRCTL => Instruction::new(opcode, a, zero, c, b.number() as u32),
            _ if is_i5(opcode) => Instruction::new(opcode, a, zero, b, word & 0x1F),
            _ if is_dcache(opcode) => {
                Instruction::new_itype(opcode, a, zero, expand_imm12(opcode, word & 0xFFF))
            }
            _ if is_i16(opcode) => {
                Instruction::new_itype(opcode, a, b, expand_imm16(opcode, word & 0xFFFF))
            }
            _ if field_op(word) == OP_R3 => Instruction::new(opcode, a, b, c, 0),
            _ => Instruction::new_itype(opcode, a, b, expand_imm12(opcode, word & 0xFFF)),
        };
        Ok(ins)
    }

    fn encode(ins: &Instruction) -> u32 {
        let Some(entry) = OPCODES.iter().find(|entry| entry.opcode == ins.opcode) else {
            return 0;
        };
        let opcode = ins.opcode;
        let a = set_a(ins.op_a.number());
        let b = set_b(ins.op_b.number());
        let c = set_c(ins.op_c.number());

        let fields = match opcode {
            Opcode::CALL | Opcode::JMPI => ins.imm & 0x03FF_FFFF,
            Opcode::MOVHI20 => ((ins.op_b.number() as u32 & 0x3F) << 20) | (ins.imm >> 12),
            Opcode::CUSTOM => a | b | c | (ins.imm & 0x3F) | (((ins.imm >> 8) & 0x7) << 6),
            Opcode::RDCTL | Opcode::WRCTL => a | c | set_b(ins.imm as u8),
            _ if is_i5(opcode) => a | set_b(ins.op_c.number()) | (ins.imm & 0x1F),
            _ if is_dcache(opcode) => a | compress_imm12(opcode, ins.imm),
            _ if is_i16(opcode) => a | b | compress_imm16(opcode, ins.imm),
            _ if entry.op == OP_R3 => a | b | c,
            _ => a | b | compress_imm12(opcode, ins.imm),
        };
        (fields & !entry.mask) | entry.match_bits
    }

    /// DPX call targets are absolute word addresses.
    fn jump_target(_pc: u32, imm26: u32) -> u32 {
        imm26 << 2
    }
}
