use nios2_common::{
    cpu::Registers,
    isa::{ctl, Encoding, Instruction, Opcode, Register},
};

use super::Effect;
use crate::cpu::{Cpu, StopReason};

/// Instructions that stop the CPU when `status.U` is set.
pub fn requires_supervisor(opcode: Opcode) -> bool {
    matches!(
        opcode,
        Opcode::RDCTL
            | Opcode::WRCTL
            | Opcode::ERET
            | Opcode::BRET
            | Opcode::RDPRS
            | Opcode::WRPRS
            | Opcode::INITI
            | Opcode::INITD
    )
}

/// `rdctl rC, ctlN`. Control registers past the end of the bank read as zero.
pub fn execute_rdctl(cpu: &mut Cpu, ins: &Instruction) -> Effect {
    let value = cpu.ctl(ins.imm as usize);
    cpu.registers.write(ins.op_c, value);
    Effect::Next
}

/// `wrctl ctlN, rA`. `cpuid` and `ipending` are read-only.
pub fn execute_wrctl(cpu: &mut Cpu, ins: &Instruction) -> Effect {
    let n = ins.imm as usize;
    if n != ctl::CPUID && n != ctl::IPENDING {
        let value = cpu.registers.read(ins.op_a);
        cpu.set_ctl(n, value);
    }
    Effect::Next
}

/// `eret` and `bret`: restore `status` and return through `ea` or `ba`.
pub fn execute_exception_return(cpu: &mut Cpu, ins: &Instruction) -> Effect {
    let (saved, link) = match ins.opcode {
        Opcode::BRET => (ctl::BSTATUS, Register::BA),
        _ => (ctl::ESTATUS, Register::EA),
    };
    let target = cpu.registers.read(link);
    if target % 4 != 0 {
        return Effect::Stop(StopReason::MisalignedDestination(target));
    }
    let status = cpu.ctl(saved);
    cpu.set_ctl(ctl::STATUS, status);
    Effect::Jump(target)
}

/// `rdprs` and `wrprs`. There is a single register set, so the previous set
/// is the current one.
pub fn execute_shadow_register(cpu: &mut Cpu, ins: &Instruction) -> Effect {
    let a = cpu.registers.read(ins.op_a);
    match ins.opcode {
        Opcode::RDPRS => cpu.registers.write(ins.op_b, a.wrapping_add(ins.imm)),
        _ => cpu.registers.write(ins.op_c, a),
    }
    Effect::Next
}

/// `trap` and `break`. The debugger breakpoint word reports as a breakpoint.
pub fn execute_trap<E: Encoding>(ins: &Instruction, word: u32) -> Effect {
    if ins.opcode == Opcode::BREAK || word == E::BREAKPOINT {
        Effect::Stop(StopReason::Breakpoint)
    } else {
        Effect::Stop(StopReason::Trap(ins.imm))
    }
}
