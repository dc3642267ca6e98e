use nios2_common::{
    cpu::Registers,
    isa::{sign_extension, Instruction, Opcode},
};

use super::Effect;
use crate::{
    cpu::{Cpu, StopReason},
    memory::{AddressSpace, AvmFlags},
};

fn access_flags(opcode: Opcode) -> AvmFlags {
    if opcode.is_io() {
        AvmFlags::DATA | AvmFlags::NOCACHE
    } else {
        AvmFlags::DATA
    }
}

/// Effective address and width of a load or store, or the fault it raises.
fn effective_address(cpu: &Cpu, ins: &Instruction) -> Result<(u32, usize), StopReason> {
    let address = cpu.registers.read(ins.op_a).wrapping_add(ins.imm);
    let width = ins.opcode.access_width().unwrap_or(4);
    if address as usize % width != 0 {
        return Err(StopReason::MisalignedData(address));
    }
    Ok((address, width))
}

fn extend(opcode: Opcode, raw: u32) -> u32 {
    match opcode {
        Opcode::LDB | Opcode::LDBIO => sign_extension(raw, 8) as u32,
        Opcode::LDH | Opcode::LDHIO => sign_extension(raw, 16) as u32,
        _ => raw,
    }
}

/// `ldb`, `ldbu`, `ldh`, `ldhu`, `ldw` and their `io` forms.
pub fn execute_load(cpu: &mut Cpu, memory: &AddressSpace, ins: &Instruction) -> Effect {
    let (address, width) = match effective_address(cpu, ins) {
        Ok(access) => access,
        Err(reason) => return Effect::Stop(reason),
    };

    let mut bytes = [0u8; 4];
    if memory
        .read_exact(address, &mut bytes[..width], access_flags(ins.opcode))
        .is_err()
    {
        return Effect::Stop(StopReason::DataAccess(address));
    }

    let value = extend(ins.opcode, u32::from_le_bytes(bytes));
    cpu.registers.write(ins.op_b, value);
    Effect::Next
}

/// `stb`, `sth`, `stw` and their `io` forms.
pub fn execute_store(cpu: &mut Cpu, memory: &mut AddressSpace, ins: &Instruction) -> Effect {
    let (address, width) = match effective_address(cpu, ins) {
        Ok(access) => access,
        Err(reason) => return Effect::Stop(reason),
    };

    let bytes = cpu.registers.read(ins.op_b).to_le_bytes();
    match memory.write_exact(address, &bytes[..width], access_flags(ins.opcode)) {
        Ok(()) => Effect::Next,
        Err(_) => Effect::Stop(StopReason::DataAccess(address)),
    }
}
