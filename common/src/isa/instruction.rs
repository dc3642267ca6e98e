use std::fmt::Display;

use serde::{Deserialize, Serialize};

use super::{Opcode, Register};

#[derive(Debug, Default, PartialEq, Eq, Clone, Copy, Hash, Serialize, Deserialize)]
pub enum InstructionType {
    RType,
    #[default]
    IType,
    JType,
}

/// A decoded instruction, in a form shared by both encodings.
///
/// Operand roles follow the base Nios II assembly syntax:
///
/// * I-type: `op_a` is the base or first source, `op_b` the destination (or
///   the second source of a store or branch), `imm` the operand value. Signed
///   immediates and branch offsets are stored sign-extended; `*hi` immediates
///   are already shifted into the upper half-word; branch offsets are byte
///   offsets relative to the following instruction.
/// * R-type: `op_a` and `op_b` are sources, `op_c` the destination. Shift and
///   trap counts, control register numbers and custom-instruction selectors
///   live in `imm`.
/// * J-type: `imm` holds the raw 26-bit target field. For `movhi20`, `op_b` is
///   the destination and `imm` the shifted 20-bit value.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Instruction {
    pub opcode: Opcode,
    pub op_a: Register,
    pub op_b: Register,
    pub op_c: Register,
    pub imm: u32,
}

impl Instruction {
    pub fn new(opcode: Opcode, op_a: Register, op_b: Register, op_c: Register, imm: u32) -> Self {
        Self {
            opcode,
            op_a,
            op_b,
            op_c,
            imm,
        }
    }

    pub fn new_itype(opcode: Opcode, op_a: Register, op_b: Register, imm: u32) -> Self {
        Self::new(opcode, op_a, op_b, Register::ZERO, imm)
    }

    pub fn new_rtype(opcode: Opcode, op_c: Register, op_a: Register, op_b: Register) -> Self {
        Self::new(opcode, op_a, op_b, op_c, 0)
    }

    pub fn ins_type(&self) -> InstructionType {
        self.opcode.ins_type()
    }

    /// The immediate as a signed value.
    pub fn simm(&self) -> i32 {
        self.imm as i32
    }

    /// Register written by the instruction, if any.
    pub fn destination(&self) -> Option<Register> {
        let dest = match self.opcode {
            Opcode::CALL | Opcode::CALLR => Register::RA,
            Opcode::MOVHI20 => self.op_b,
            _ if self.opcode.is_store()
                || self.opcode.is_conditional_branch()
                || self.opcode.is_control_transfer() =>
            {
                return None
            }
            Opcode::INITD | Opcode::INITDA | Opcode::FLUSHD | Opcode::FLUSHDA => return None,
            Opcode::TRAP | Opcode::BREAK => return None,
            Opcode::WRCTL | Opcode::SNDI | Opcode::SND => return None,
            _ => match self.ins_type() {
                InstructionType::IType => self.op_b,
                InstructionType::RType => self.op_c,
                InstructionType::JType => return None,
            },
        };
        (dest != Register::ZERO).then_some(dest)
    }
}

impl Display for Instruction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let op = self.opcode;
        match op {
            Opcode::RET | Opcode::ERET | Opcode::BRET | Opcode::SYNC | Opcode::FLUSHP => {
                write!(f, "{op}")
            }
            Opcode::CALL | Opcode::JMPI => write!(f, "{op} 0x{:07x}", self.imm),
            Opcode::MOVHI20 => write!(f, "{op} {}, 0x{:x}", self.op_b, self.imm >> 12),
            Opcode::BR => write!(f, "{op} {}", self.simm()),
            Opcode::JMP | Opcode::CALLR | Opcode::FLUSHI | Opcode::INITI | Opcode::JREL => {
                write!(f, "{op} {}", self.op_a)
            }
            Opcode::NEXTPC => write!(f, "{op} {}", self.op_c),
            Opcode::TRAP | Opcode::BREAK => write!(f, "{op} {}", self.imm),
            Opcode::RDCTL => write!(f, "{op} {}, ctl{}", self.op_c, self.imm),
            Opcode::WRCTL => write!(f, "{op} ctl{}, {}", self.imm, self.op_a),
            Opcode::SLLI | Opcode::SRLI | Opcode::SRAI | Opcode::ROLI => {
                write!(f, "{op} {}, {}, {}", self.op_c, self.op_a, self.imm)
            }
            _ if op.is_load() || op.is_store() => {
                write!(f, "{op} {}, {}({})", self.op_b, self.simm(), self.op_a)
            }
            _ if op.is_conditional_branch() => {
                write!(f, "{op} {}, {}, {}", self.op_a, self.op_b, self.simm())
            }
            _ => match self.ins_type() {
                InstructionType::IType => {
                    write!(f, "{op} {}, {}, {}", self.op_b, self.op_a, self.simm())
                }
                InstructionType::RType => {
                    write!(f, "{op} {}, {}, {}", self.op_c, self.op_a, self.op_b)
                }
                InstructionType::JType => write!(f, "{op} 0x{:x}", self.imm),
            },
        }
    }
}
