//! Software single-step: where execution goes after the instruction at a pc.

use nios2_common::{
    constants::INSTRUCTION_SIZE,
    isa::{Encoding, Opcode},
};

use nios2_sim::cpu::instructions::branch::branch_taken;

use crate::{
    error::Result,
    target::{RegisterSet, Target},
};

/// Address of the instruction executed after the one at `pc`, given the
/// register values before it runs.
///
/// Words that do not decode are assumed to fall through.
pub fn next_pc<E: Encoding>(target: &dyn Target, registers: &RegisterSet, pc: u32) -> Result<u32> {
    let word = target.read_u32(pc)?;
    let next = pc.wrapping_add(INSTRUCTION_SIZE);
    let Ok(ins) = E::decode(word) else {
        return Ok(next);
    };
    let branch_target = next.wrapping_add(ins.imm);

    let pc = match ins.opcode {
        opcode if opcode.is_conditional_branch() => {
            let a = registers.get(ins.op_a)?;
            let b = registers.get(ins.op_b)?;
            if branch_taken(opcode, a, b) == Some(true) {
                branch_target
            } else {
                next
            }
        }
        Opcode::BR => branch_target,
        Opcode::CALL | Opcode::JMPI => E::jump_target(pc, ins.imm),
        Opcode::JMP | Opcode::CALLR | Opcode::RET => registers.get(ins.op_a)?,
        _ => next,
    };
    Ok(pc)
}
