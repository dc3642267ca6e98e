use nios2_common::{
    cpu::Registers,
    isa::{Instruction, InstructionType, Opcode},
};

use super::Effect;
use crate::cpu::{Cpu, Features, StopReason};

/// Result of an arithmetic, logic, compare or shift operation.
///
/// `b` is the second register operand, or the expanded immediate for the
/// immediate forms. `None` for opcodes that are not ALU operations.
pub fn alu(opcode: Opcode, a: u32, b: u32) -> Option<u32> {
    let value = match opcode {
        Opcode::ADD | Opcode::ADDI => a.wrapping_add(b),
        Opcode::SUB => a.wrapping_sub(b),
        Opcode::AND | Opcode::ANDI | Opcode::ANDHI => a & b,
        Opcode::OR | Opcode::ORI | Opcode::ORHI => a | b,
        Opcode::XOR | Opcode::XORI | Opcode::XORHI => a ^ b,
        Opcode::NOR => !(a | b),

        Opcode::MUL | Opcode::MULI => a.wrapping_mul(b),
        Opcode::MULXSS => ((a as i32 as i64 * b as i32 as i64) >> 32) as u32,
        Opcode::MULXSU => ((a as i32 as i64 * b as i64) >> 32) as u32,
        Opcode::MULXUU => ((a as u64 * b as u64) >> 32) as u32,
        Opcode::DIV => div(a, b),
        Opcode::DIVU => divu(a, b),

        Opcode::CMPEQ | Opcode::CMPEQI => (a == b) as u32,
        Opcode::CMPNE | Opcode::CMPNEI => (a != b) as u32,
        Opcode::CMPGE | Opcode::CMPGEI => ((a as i32) >= (b as i32)) as u32,
        Opcode::CMPLT | Opcode::CMPLTI => ((a as i32) < (b as i32)) as u32,
        Opcode::CMPGEU | Opcode::CMPGEUI => (a >= b) as u32,
        Opcode::CMPLTU | Opcode::CMPLTUI => (a < b) as u32,

        Opcode::SLL | Opcode::SLLI => a << (b & 0x1F),
        Opcode::SRL | Opcode::SRLI => a >> (b & 0x1F),
        Opcode::SRA | Opcode::SRAI => ((a as i32) >> (b & 0x1F)) as u32,
        Opcode::ROL | Opcode::ROLI => a.rotate_left(b & 0x1F),
        Opcode::ROR => a.rotate_right(b & 0x1F),

        _ => return None,
    };
    Some(value)
}

/// Signed division. Division by zero and `MIN / -1` saturate instead of
/// trapping.
fn div(a: u32, b: u32) -> u32 {
    let (a, b) = (a as i32, b as i32);
    if b == 0 {
        0x8000_0000
    } else if a == i32::MIN && b == -1 {
        0x7FFF_FFFF
    } else {
        (a / b) as u32
    }
}

fn divu(a: u32, b: u32) -> u32 {
    a.checked_div(b).unwrap_or(u32::MAX)
}

/// Whether the configured core implements `opcode`.
pub fn is_present(opcode: Opcode, features: &Features) -> bool {
    match opcode {
        Opcode::DIV | Opcode::DIVU => features.hwdiv,
        Opcode::MUL | Opcode::MULI => features.hwmul,
        Opcode::MULXSS | Opcode::MULXSU | Opcode::MULXUU => features.hwmulx,
        _ => true,
    }
}

/// Execute an ALU instruction in either operand form.
pub fn execute_alu(cpu: &mut Cpu, ins: &Instruction, word: u32) -> Effect {
    if !is_present(ins.opcode, &cpu.features) {
        return Effect::Stop(StopReason::UnimplementedInstruction(word));
    }

    let a = cpu.registers.read(ins.op_a);
    let (b, dest) = match ins.opcode {
        // The immediate shifts and rotates keep their count in `imm`.
        Opcode::SLLI | Opcode::SRLI | Opcode::SRAI | Opcode::ROLI => (ins.imm, ins.op_c),
        _ => match ins.ins_type() {
            InstructionType::RType => (cpu.registers.read(ins.op_b), ins.op_c),
            _ => (ins.imm, ins.op_b),
        },
    };

    match alu(ins.opcode, a, b) {
        Some(value) => {
            cpu.registers.write(dest, value);
            Effect::Next
        }
        None => Effect::Stop(StopReason::UnimplementedInstruction(word)),
    }
}
