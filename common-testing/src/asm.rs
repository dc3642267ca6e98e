//! Instruction constructors that take their operands in assembler order.
//!
//! ```
//! use nios2_common::isa::{Nios2, Register};
//! use nios2_common_testing::asm::{self, assemble};
//!
//! let code = assemble::<Nios2>(&[asm::addi(Register::SP, Register::SP, -16), asm::ret()]);
//! assert_eq!(code.len(), 8);
//! ```

use nios2_common::isa::{Encoding, Instruction, Opcode, Register};

/// Encode `program` as little-endian bytes.
pub fn assemble<E: Encoding>(program: &[Instruction]) -> Vec<u8> {
    program
        .iter()
        .flat_map(|ins| E::encode(ins).to_le_bytes())
        .collect()
}

/// Encode `program` as instruction words.
pub fn words<E: Encoding>(program: &[Instruction]) -> Vec<u32> {
    program.iter().map(E::encode).collect()
}

pub fn nop() -> Instruction {
    add(Register::ZERO, Register::ZERO, Register::ZERO)
}

pub fn add(c: Register, a: Register, b: Register) -> Instruction {
    Instruction::new_rtype(Opcode::ADD, c, a, b)
}

pub fn sub(c: Register, a: Register, b: Register) -> Instruction {
    Instruction::new_rtype(Opcode::SUB, c, a, b)
}

pub fn rtype(opcode: Opcode, c: Register, a: Register, b: Register) -> Instruction {
    Instruction::new_rtype(opcode, c, a, b)
}

pub fn mov(c: Register, a: Register) -> Instruction {
    add(c, a, Register::ZERO)
}

pub fn addi(b: Register, a: Register, imm: i32) -> Instruction {
    Instruction::new_itype(Opcode::ADDI, a, b, imm as u32)
}

pub fn itype(opcode: Opcode, b: Register, a: Register, imm: i32) -> Instruction {
    Instruction::new_itype(opcode, a, b, imm as u32)
}

pub fn movi(b: Register, imm: i32) -> Instruction {
    addi(b, Register::ZERO, imm)
}

pub fn movui(b: Register, imm: u16) -> Instruction {
    Instruction::new_itype(Opcode::ORI, Register::ZERO, b, imm as u32)
}

pub fn movhi(b: Register, imm: u16) -> Instruction {
    Instruction::new_itype(Opcode::ORHI, Register::ZERO, b, (imm as u32) << 16)
}

/// `movhi` then `ori`, loading a full 32-bit constant.
pub fn movia(b: Register, value: u32) -> [Instruction; 2] {
    [
        movhi(b, (value >> 16) as u16),
        Instruction::new_itype(Opcode::ORI, b, b, value & 0xFFFF),
    ]
}

pub fn ldw(b: Register, offset: i32, a: Register) -> Instruction {
    Instruction::new_itype(Opcode::LDW, a, b, offset as u32)
}

pub fn stw(b: Register, offset: i32, a: Register) -> Instruction {
    Instruction::new_itype(Opcode::STW, a, b, offset as u32)
}

pub fn load_store(opcode: Opcode, b: Register, offset: i32, a: Register) -> Instruction {
    Instruction::new_itype(opcode, a, b, offset as u32)
}

/// Branch by a byte offset relative to the following instruction.
pub fn branch(opcode: Opcode, a: Register, b: Register, offset: i32) -> Instruction {
    Instruction::new_itype(opcode, a, b, offset as u32)
}

pub fn br(offset: i32) -> Instruction {
    branch(Opcode::BR, Register::ZERO, Register::ZERO, offset)
}

/// `call` to an absolute, word-aligned target in the same 256 MiB region.
pub fn call(target: u32) -> Instruction {
    Instruction::new(Opcode::CALL, Register::ZERO, Register::ZERO, Register::ZERO, (target >> 2) & 0x3FF_FFFF)
}

pub fn jmpi(target: u32) -> Instruction {
    Instruction::new(Opcode::JMPI, Register::ZERO, Register::ZERO, Register::ZERO, (target >> 2) & 0x3FF_FFFF)
}

pub fn callr(a: Register) -> Instruction {
    Instruction::new(Opcode::CALLR, a, Register::ZERO, Register::RA, 0)
}

pub fn jmp(a: Register) -> Instruction {
    Instruction::new(Opcode::JMP, a, Register::ZERO, Register::ZERO, 0)
}

pub fn ret() -> Instruction {
    Instruction::new(Opcode::RET, Register::RA, Register::ZERO, Register::ZERO, 0)
}

pub fn eret() -> Instruction {
    Instruction::new(Opcode::ERET, Register::EA, Register::ZERO, Register::ZERO, 0)
}

pub fn trap(imm: u32) -> Instruction {
    Instruction::new(Opcode::TRAP, Register::ZERO, Register::ZERO, Register::EA, imm)
}

pub fn brk(imm: u32) -> Instruction {
    Instruction::new(Opcode::BREAK, Register::ZERO, Register::ZERO, Register::BA, imm)
}

pub fn rdctl(c: Register, n: u32) -> Instruction {
    Instruction::new(Opcode::RDCTL, Register::ZERO, Register::ZERO, c, n)
}

pub fn wrctl(n: u32, a: Register) -> Instruction {
    Instruction::new(Opcode::WRCTL, a, Register::ZERO, Register::ZERO, n)
}

pub fn nextpc(c: Register) -> Instruction {
    Instruction::new(Opcode::NEXTPC, Register::ZERO, Register::ZERO, c, 0)
}

/// `ori zero, zero, code`, the simulator syscall form.
pub fn syscall(code: u16) -> Instruction {
    movui(Register::ZERO, code)
}
