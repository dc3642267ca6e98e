//! The base Nios II (R1) encoding.
//!
//! ```text
//! I-type:  | A:31..27 | B:26..22 | IMM16:21..6              | OP:5..0 |
//! R-type:  | A:31..27 | B:26..22 | C:21..17 | OPX:16..11 | IMM5:10..6 | OP=0x3a |
//! J-type:  | IMM26:31..6                                   | OP:5..0 |
//! ```

use super::{
    sign_extension, Encoding, Instruction, InstructionType, OpcodeEntry, Opcode, Register,
    RegisterLayout, WildInsn,
};
use crate::error::DecodeError;

const OP_MASK: u32 = 0x3F;
const OPX_SHIFT: u32 = 11;
const OPX_MASK: u32 = 0x3F << OPX_SHIFT;
const A_MASK: u32 = 0x1F << 27;
const B_MASK: u32 = 0x1F << 22;
const C_MASK: u32 = 0x1F << 17;
const IMM5_MASK: u32 = 0x1F << 6;

/// Primary opcode selecting the R-type group.
const OP_OPX: u32 = 0x3A;

const fn field_a(word: u32) -> u8 {
    (word >> 27) as u8 & 0x1F
}

const fn field_b(word: u32) -> u8 {
    (word >> 22) as u8 & 0x1F
}

const fn field_c(word: u32) -> u8 {
    (word >> 17) as u8 & 0x1F
}

const fn field_opx(word: u32) -> u32 {
    (word >> OPX_SHIFT) & 0x3F
}

const fn field_imm5(word: u32) -> u32 {
    (word >> 6) & 0x1F
}

const fn field_imm16(word: u32) -> u32 {
    (word >> 6) & 0xFFFF
}

const fn set_a(reg: u8) -> u32 {
    (reg as u32 & 0x1F) << 27
}

const fn set_b(reg: u8) -> u32 {
    (reg as u32 & 0x1F) << 22
}

const fn set_c(reg: u8) -> u32 {
    (reg as u32 & 0x1F) << 17
}

const fn itype(opcode: Opcode, op: u32) -> OpcodeEntry {
    OpcodeEntry::new(opcode, op, None, op, OP_MASK)
}

/// An I-type row whose listed register fields are fixed.
const fn itype_fixed(opcode: Opcode, op: u32, mask: u32, bits: u32) -> OpcodeEntry {
    OpcodeEntry::new(opcode, op, None, op | bits, OP_MASK | mask)
}

/// An R-type row; the unused `imm5` field must be zero.
const fn rtype(opcode: Opcode, opx: u32) -> OpcodeEntry {
    rtype_fixed(opcode, opx, IMM5_MASK, 0)
}

const fn rtype_fixed(opcode: Opcode, opx: u32, mask: u32, bits: u32) -> OpcodeEntry {
    OpcodeEntry::new(
        opcode,
        OP_OPX,
        Some(opx),
        OP_OPX | (opx << OPX_SHIFT) | bits,
        OP_MASK | OPX_MASK | mask,
    )
}

const OPCODES: &[OpcodeEntry] = &[
    itype(Opcode::CALL, 0x00),
    itype(Opcode::JMPI, 0x01),
    itype(Opcode::LDBU, 0x03),
    itype(Opcode::ADDI, 0x04),
    itype(Opcode::STB, 0x05),
    itype_fixed(Opcode::BR, 0x06, A_MASK | B_MASK, 0),
    itype(Opcode::LDB, 0x07),
    itype(Opcode::CMPGEI, 0x08),
    itype(Opcode::LDHU, 0x0B),
    itype(Opcode::ANDI, 0x0C),
    itype(Opcode::STH, 0x0D),
    itype(Opcode::BGE, 0x0E),
    itype(Opcode::LDH, 0x0F),
    itype(Opcode::CMPLTI, 0x10),
    itype_fixed(Opcode::INITDA, 0x13, B_MASK, 0),
    itype(Opcode::ORI, 0x14),
    itype(Opcode::STW, 0x15),
    itype(Opcode::BLT, 0x16),
    itype(Opcode::LDW, 0x17),
    itype(Opcode::CMPNEI, 0x18),
    itype_fixed(Opcode::FLUSHDA, 0x1B, B_MASK, 0),
    itype(Opcode::XORI, 0x1C),
    itype(Opcode::BNE, 0x1E),
    itype(Opcode::CMPEQI, 0x20),
    itype(Opcode::LDBUIO, 0x23),
    itype(Opcode::MULI, 0x24),
    itype(Opcode::STBIO, 0x25),
    itype(Opcode::BEQ, 0x26),
    itype(Opcode::LDBIO, 0x27),
    itype(Opcode::CMPGEUI, 0x28),
    itype(Opcode::LDHUIO, 0x2B),
    itype(Opcode::ANDHI, 0x2C),
    itype(Opcode::STHIO, 0x2D),
    itype(Opcode::BGEU, 0x2E),
    itype(Opcode::LDHIO, 0x2F),
    itype(Opcode::CMPLTUI, 0x30),
    itype(Opcode::CUSTOM, 0x32),
    itype_fixed(Opcode::INITD, 0x33, B_MASK, 0),
    itype(Opcode::ORHI, 0x34),
    itype(Opcode::STWIO, 0x35),
    itype(Opcode::BLTU, 0x36),
    itype(Opcode::LDWIO, 0x37),
    itype(Opcode::RDPRS, 0x38),
    itype_fixed(Opcode::FLUSHD, 0x3B, B_MASK, 0),
    itype(Opcode::XORHI, 0x3C),
    // `eret` and `bret` leave B unchecked: assemblers emit both 0 and the
    // status register number there.
    rtype_fixed(Opcode::ERET, 0x01, A_MASK | C_MASK | IMM5_MASK, set_a(29)),
    rtype_fixed(Opcode::ROLI, 0x02, B_MASK, 0),
    rtype(Opcode::ROL, 0x03),
    rtype_fixed(Opcode::FLUSHP, 0x04, A_MASK | B_MASK | C_MASK | IMM5_MASK, 0),
    rtype_fixed(Opcode::RET, 0x05, A_MASK | B_MASK | C_MASK | IMM5_MASK, set_a(31)),
    rtype(Opcode::NOR, 0x06),
    rtype(Opcode::MULXUU, 0x07),
    rtype(Opcode::CMPGE, 0x08),
    rtype_fixed(Opcode::BRET, 0x09, A_MASK | C_MASK | IMM5_MASK, set_a(30)),
    rtype(Opcode::ROR, 0x0B),
    rtype_fixed(Opcode::FLUSHI, 0x0C, B_MASK | C_MASK | IMM5_MASK, 0),
    rtype_fixed(Opcode::JMP, 0x0D, B_MASK | C_MASK | IMM5_MASK, 0),
    rtype(Opcode::AND, 0x0E),
    rtype(Opcode::CMPLT, 0x10),
    rtype_fixed(Opcode::SLLI, 0x12, B_MASK, 0),
    rtype(Opcode::SLL, 0x13),
    rtype_fixed(Opcode::WRPRS, 0x14, B_MASK | IMM5_MASK, 0),
    rtype(Opcode::OR, 0x16),
    rtype(Opcode::MULXSU, 0x17),
    rtype(Opcode::CMPNE, 0x18),
    rtype_fixed(Opcode::SRLI, 0x1A, B_MASK, 0),
    rtype(Opcode::SRL, 0x1B),
    rtype_fixed(Opcode::NEXTPC, 0x1C, A_MASK | B_MASK | IMM5_MASK, 0),
    rtype_fixed(Opcode::CALLR, 0x1D, B_MASK | C_MASK | IMM5_MASK, set_c(31)),
    rtype(Opcode::XOR, 0x1E),
    rtype(Opcode::MULXSS, 0x1F),
    rtype(Opcode::CMPEQ, 0x20),
    rtype(Opcode::DIVU, 0x24),
    rtype(Opcode::DIV, 0x25),
    rtype_fixed(Opcode::RDCTL, 0x26, A_MASK | B_MASK, 0),
    rtype(Opcode::MUL, 0x27),
    rtype(Opcode::CMPGEU, 0x28),
    rtype_fixed(Opcode::INITI, 0x29, B_MASK | C_MASK | IMM5_MASK, 0),
    rtype_fixed(Opcode::TRAP, 0x2D, A_MASK | B_MASK | C_MASK, set_c(29)),
    rtype_fixed(Opcode::WRCTL, 0x2E, B_MASK | C_MASK, 0),
    rtype(Opcode::CMPLTU, 0x30),
    rtype(Opcode::ADD, 0x31),
    rtype_fixed(Opcode::BREAK, 0x34, A_MASK | B_MASK | C_MASK, set_c(30)),
    rtype_fixed(Opcode::SYNC, 0x36, A_MASK | B_MASK | C_MASK | IMM5_MASK, 0),
    rtype(Opcode::SUB, 0x39),
    rtype_fixed(Opcode::SRAI, 0x3A, B_MASK, 0),
    rtype(Opcode::SRA, 0x3B),
];

/// The base Nios II encoding.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Nios2;

impl Nios2 {
    fn lookup(word: u32) -> Result<&'static OpcodeEntry, DecodeError> {
        let op = word & OP_MASK;
        let ext = (op == OP_OPX).then(|| field_opx(word));
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

/// Expand a raw 16-bit immediate into its operand value.
fn expand_imm16(opcode: Opcode, imm16: u32) -> u32 {
    match opcode {
        Opcode::ANDI | Opcode::ORI | Opcode::XORI | Opcode::CMPGEUI | Opcode::CMPLTUI => imm16,
        Opcode::ANDHI | Opcode::ORHI | Opcode::XORHI => imm16 << 16,
        _ => sign_extension(imm16, 16) as u32,
    }
}

fn compress_imm16(opcode: Opcode, imm: u32) -> u32 {
    match opcode {
        Opcode::ANDHI | Opcode::ORHI | Opcode::XORHI => imm >> 16,
        _ => imm & 0xFFFF,
    }
}

/// `custom` packs N and the readra/readrb/writerc flags into bits 16..6.
const CUSTOM_SELECTOR_MASK: u32 = 0x7FF;

impl Encoding for Nios2 {
    const NAME: &'static str = "nios2";

    const LAYOUT: RegisterLayout = RegisterLayout::NIOS2;

    const BREAKPOINT: u32 = 0x003B_6FFA;

    const STACK_CHECK_BREAK: u32 = 0x003D_A0FA;

    const PROFILER_PREAMBLE: &'static [WildInsn] = &[
        WildInsn::new(0x0010_e03a, 0x0000_0000), // nextpc r8
        WildInsn::new(0xf813_883a, 0x0000_0000), // mov r9,ra
        WildInsn::new(0x0280_0034, 0x003f_ffc0), // movhi r10,257
        WildInsn::new(0x5280_0004, 0x003f_ffc0), // addi r10,r10,-31992
        WildInsn::new(0x0000_0000, 0xffff_ffc0), // call <mcount>
        WildInsn::new(0x483f_883a, 0x0000_0000), // mov ra,r9
    ];

    const IRQ_ENTRY_PREAMBLE: &'static [WildInsn] = &[
        WildInsn::new(0x0031_307a, 0x0000_0000), // rdctl et,estatus
        WildInsn::new(0xc600_004c, 0x0000_0000), // andi et,et,1
        WildInsn::new(0xc000_0026, 0x003f_ffc0), // beq et,zero,<software_exception>
        WildInsn::new(0x0031_313a, 0x0000_0000), // rdctl et,ipending
        WildInsn::new(0xc000_0026, 0x003f_ffc0), // beq et,zero,<software_exception>
    ];

    const EXCEPTION_HANDLERS: bool = true;

    const OPCODES: &'static [OpcodeEntry] = OPCODES;

    fn decode(word: u32) -> Result<Instruction, DecodeError> {
        let entry = Self::lookup(word)?;
        let opcode = entry.opcode;
        let a = Register::new(field_a(word));
        let b = Register::new(field_b(word));
        let c = Register::new(field_c(word));

        let ins = match opcode {
            Opcode::CALL | Opcode::JMPI => {
                Instruction::new(opcode, Register::ZERO, Register::ZERO, Register::ZERO, word >> 6)
            }
            Opcode::CUSTOM => {
                Instruction::new(opcode, a, b, c, (word >> 6) & CUSTOM_SELECTOR_MASK)
            }
            _ => match opcode.ins_type() {
                InstructionType::RType => Instruction::new(opcode, a, b, c, field_imm5(word)),
                _ => Instruction::new_itype(opcode, a, b, expand_imm16(opcode, field_imm16(word))),
            },
        };
        Ok(ins)
    }

    fn encode(ins: &Instruction) -> u32 {
        let Some(entry) = OPCODES.iter().find(|entry| entry.opcode == ins.opcode) else {
            return 0;
        };
        let a = set_a(ins.op_a.number());
        let b = set_b(ins.op_b.number());
        let c = set_c(ins.op_c.number());

        let fields = match ins.opcode {
            Opcode::CALL | Opcode::JMPI => ins.imm << 6,
            Opcode::CUSTOM => a | b | c | ((ins.imm & CUSTOM_SELECTOR_MASK) << 6),
            _ => match ins.opcode.ins_type() {
                InstructionType::RType => a | b | c | ((ins.imm & 0x1F) << 6),
                _ => a | b | (compress_imm16(ins.opcode, ins.imm) << 6),
            },
        };
        // Fixed fields come from the table so that, for example, `ret` always
        // names `ra`.
        (fields & !entry.mask) | entry.match_bits
    }

    fn jump_target(pc: u32, imm26: u32) -> u32 {
        (pc & 0xF000_0000) | (imm26 << 2)
    }
}
