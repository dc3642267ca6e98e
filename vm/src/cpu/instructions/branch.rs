use nios2_common::{
    cpu::Registers,
    isa::{Encoding, Instruction, Opcode, Register},
};

use super::Effect;
use crate::cpu::{Cpu, StopReason};

/// Outcome of a conditional branch comparison, `None` for other opcodes.
pub fn branch_taken(opcode: Opcode, a: u32, b: u32) -> Option<bool> {
    let taken = match opcode {
        Opcode::BEQ => a == b,
        Opcode::BNE => a != b,
        Opcode::BGE => (a as i32) >= (b as i32),
        Opcode::BLT => (a as i32) < (b as i32),
        Opcode::BGEU => a >= b,
        Opcode::BLTU => a < b,
        _ => return None,
    };
    Some(taken)
}

fn jump_to(target: u32) -> Effect {
    if target % 4 != 0 {
        Effect::Stop(StopReason::MisalignedDestination(target))
    } else {
        Effect::Jump(target)
    }
}

/// `br` and the conditional branches.
pub fn execute_branch(cpu: &mut Cpu, ins: &Instruction) -> Effect {
    let taken = match ins.opcode {
        Opcode::BR => true,
        opcode => {
            let a = cpu.registers.read(ins.op_a);
            let b = cpu.registers.read(ins.op_b);
            branch_taken(opcode, a, b).unwrap_or(false)
        }
    };
    if taken {
        jump_to(cpu.pc.next().wrapping_add(ins.imm))
    } else {
        Effect::Next
    }
}

/// `call` and `jmpi`.
pub fn execute_jump_immediate<E: Encoding>(cpu: &mut Cpu, ins: &Instruction) -> Effect {
    let target = E::jump_target(cpu.pc.value, ins.imm);
    if ins.opcode == Opcode::CALL {
        cpu.registers.write(Register::RA, cpu.pc.next());
    }
    Effect::Jump(target)
}

/// `jmp`, `ret` and `callr`.
pub fn execute_jump_register(cpu: &mut Cpu, ins: &Instruction) -> Effect {
    let target = cpu.registers.read(ins.op_a);
    let effect = jump_to(target);
    if ins.opcode == Opcode::CALLR && matches!(effect, Effect::Jump(_)) {
        cpu.registers.write(Register::RA, cpu.pc.next());
    }
    effect
}

/// `nextpc rC`.
pub fn execute_nextpc(cpu: &mut Cpu, ins: &Instruction) -> Effect {
    cpu.registers.write(ins.op_c, cpu.pc.next());
    Effect::Next
}
