//! Opcode dispatch.
//!
//! Every [`Opcode`] is named explicitly, so adding one to the ISA tables
//! fails to compile until the simulator decides what to do with it.

use nios2_common::isa::{Encoding, Instruction, Opcode};

use crate::{
    cpu::{
        instructions::{alu, branch, memory, system, Effect},
        Cpu, StopReason,
    },
    memory::AddressSpace,
    system::{SyscallInstruction, SyscallOutcome},
};

pub(crate) fn execute<E: Encoding>(
    cpu: &mut Cpu,
    address_space: &mut AddressSpace,
    logs: &mut Option<Vec<Vec<u8>>>,
    ins: &Instruction,
    word: u32,
) -> Effect {
    if system::requires_supervisor(ins.opcode) && cpu.is_user_mode() {
        return Effect::Stop(StopReason::SupervisorOnly(ins.opcode));
    }

    match ins.opcode {
        Opcode::ORI if SyscallInstruction::is_syscall(ins) => {
            let mut syscall = SyscallInstruction::decode(ins, cpu);
            let outcome = syscall.execute(logs, address_space);
            syscall.write_back(cpu);
            match outcome {
                SyscallOutcome::Continue => Effect::Next,
                SyscallOutcome::Exit(code) => Effect::Exit(code),
            }
        }

        Opcode::ADDI
        | Opcode::ANDI
        | Opcode::ORI
        | Opcode::XORI
        | Opcode::ANDHI
        | Opcode::ORHI
        | Opcode::XORHI
        | Opcode::MULI
        | Opcode::CMPGEI
        | Opcode::CMPLTI
        | Opcode::CMPNEI
        | Opcode::CMPEQI
        | Opcode::CMPGEUI
        | Opcode::CMPLTUI
        | Opcode::ADD
        | Opcode::SUB
        | Opcode::AND
        | Opcode::OR
        | Opcode::XOR
        | Opcode::NOR
        | Opcode::MUL
        | Opcode::MULXSS
        | Opcode::MULXSU
        | Opcode::MULXUU
        | Opcode::DIV
        | Opcode::DIVU
        | Opcode::CMPEQ
        | Opcode::CMPNE
        | Opcode::CMPGE
        | Opcode::CMPGEU
        | Opcode::CMPLT
        | Opcode::CMPLTU
        | Opcode::SLL
        | Opcode::SLLI
        | Opcode::SRL
        | Opcode::SRLI
        | Opcode::SRA
        | Opcode::SRAI
        | Opcode::ROL
        | Opcode::ROLI
        | Opcode::ROR => alu::execute_alu(cpu, ins, word),

        Opcode::LDB
        | Opcode::LDBU
        | Opcode::LDH
        | Opcode::LDHU
        | Opcode::LDW
        | Opcode::LDBIO
        | Opcode::LDBUIO
        | Opcode::LDHIO
        | Opcode::LDHUIO
        | Opcode::LDWIO => memory::execute_load(cpu, address_space, ins),

        Opcode::STB
        | Opcode::STH
        | Opcode::STW
        | Opcode::STBIO
        | Opcode::STHIO
        | Opcode::STWIO => memory::execute_store(cpu, address_space, ins),

        Opcode::BR
        | Opcode::BEQ
        | Opcode::BNE
        | Opcode::BGE
        | Opcode::BGEU
        | Opcode::BLT
        | Opcode::BLTU => branch::execute_branch(cpu, ins),

        Opcode::CALL | Opcode::JMPI => branch::execute_jump_immediate::<E>(cpu, ins),
        Opcode::RET | Opcode::JMP | Opcode::CALLR => branch::execute_jump_register(cpu, ins),
        Opcode::NEXTPC => branch::execute_nextpc(cpu, ins),

        Opcode::ERET | Opcode::BRET => system::execute_exception_return(cpu, ins),
        Opcode::TRAP | Opcode::BREAK => system::execute_trap::<E>(ins, word),
        Opcode::RDCTL => system::execute_rdctl(cpu, ins),
        Opcode::WRCTL => system::execute_wrctl(cpu, ins),
        Opcode::RDPRS | Opcode::WRPRS => system::execute_shadow_register(cpu, ins),

        // No caches are modelled.
        Opcode::INITD
        | Opcode::INITDA
        | Opcode::FLUSHD
        | Opcode::FLUSHDA
        | Opcode::INITI
        | Opcode::FLUSHI
        | Opcode::FLUSHP
        | Opcode::SYNC => Effect::Next,

        Opcode::MOVHI20 => {
            cpu.write_register(ins.op_b, ins.imm);
            Effect::Next
        }

        // Thread, messaging and bit-field operations of DPX are not simulated.
        Opcode::CUSTOM
        | Opcode::ANDCI
        | Opcode::ANDCHI
        | Opcode::INSERT
        | Opcode::EXTRACT
        | Opcode::MERGE
        | Opcode::SNDI
        | Opcode::RCVI
        | Opcode::SND
        | Opcode::RCV
        | Opcode::FORK
        | Opcode::EXIT
        | Opcode::CIDALLOC
        | Opcode::TXALLOC
        | Opcode::RXFREE
        | Opcode::JREL => Effect::Stop(StopReason::UnimplementedInstruction(word)),
    }
}

#[cfg(test)]
mod tests {
    use nios2_common::isa::{ctl, status, Nios2, Register};

    use super::*;

    #[test]
    fn test_user_mode_blocks_supervisor_ops() {
        let mut cpu = Cpu::default();
        cpu.set_ctl(ctl::STATUS, status::U);
        let mut memory = AddressSpace::new();
        let rdctl = Instruction::new(Opcode::RDCTL, Register::ZERO, Register::ZERO, Register::R4, 0);
        assert_eq!(
            execute::<Nios2>(&mut cpu, &mut memory, &mut None, &rdctl, 0),
            Effect::Stop(StopReason::SupervisorOnly(Opcode::RDCTL))
        );
    }

    #[test]
    fn test_cache_ops_and_custom() {
        let mut cpu = Cpu::default();
        let mut memory = AddressSpace::new();
        let sync = Instruction::new(Opcode::SYNC, Register::ZERO, Register::ZERO, Register::ZERO, 0);
        assert_eq!(execute::<Nios2>(&mut cpu, &mut memory, &mut None, &sync, 0), Effect::Next);

        let custom = Instruction::new(Opcode::CUSTOM, Register::R4, Register::R5, Register::R6, 1);
        assert_eq!(
            execute::<Nios2>(&mut cpu, &mut memory, &mut None, &custom, 0x32),
            Effect::Stop(StopReason::UnimplementedInstruction(0x32))
        );
    }

    #[test]
    fn test_ori_to_other_registers_is_alu() {
        let mut cpu = Cpu::default();
        let mut memory = AddressSpace::new();
        let ori = Instruction::new_itype(Opcode::ORI, Register::ZERO, Register::R4, 0x10);
        assert_eq!(execute::<Nios2>(&mut cpu, &mut memory, &mut None, &ori, 0), Effect::Next);
        assert_eq!(cpu.read_register(Register::R4), Some(0x10));
    }
}
