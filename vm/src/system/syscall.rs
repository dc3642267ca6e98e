//! Simulator syscalls.
//!
//! A program requests host services with `ori zero, zero, <code>`, an
//! instruction that is otherwise a no-op. Arguments are taken from `r4`..`r6`
//! and the result, if any, is written to `r2`.
//!
//! Supported codes:
//!
//! - `0x0001` write(fd, ptr, len): only `fd` 1 and 2 are honored. Bytes that
//!   cannot be read are emitted as `0xff`, but output stops at the first
//!   4 KiB block with no readable byte. Returns the number of bytes emitted,
//!   or `-1` for any other descriptor or when the host refuses the output.
//! - `0x0010` _exit(code): the program exits with the low 8 bits of `code`.
//!
//! Every other code, including the `0xcafe` marker, falls through as a no-op.

use std::io::{self, Write as _};

use nios2_common::{
    cpu::Registers,
    isa::{Instruction, Opcode, Register},
};
use tracing::{debug, warn};

use crate::{
    cpu::Cpu,
    memory::{AddressSpace, AvmFlags},
    LOG_TARGET,
};

/// Output of `write` is read and emitted in blocks of this size.
const WRITE_BLOCK: u32 = 0x1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyscallCode {
    Write = 0x0001,
    Exit = 0x0010,
    Magic = 0xcafe,
}

impl SyscallCode {
    pub fn try_from(value: u32) -> Option<Self> {
        let code = match value {
            0x0001 => SyscallCode::Write,
            0x0010 => SyscallCode::Exit,
            0xcafe => SyscallCode::Magic,
            _ => return None,
        };
        Some(code)
    }
}

impl From<SyscallCode> for u32 {
    fn from(val: SyscallCode) -> Self {
        val as u32
    }
}

/// Result of running a syscall.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyscallOutcome {
    Continue,
    Exit(u32),
}

/// A decoded syscall request.
pub struct SyscallInstruction {
    code: Option<SyscallCode>,

    /// Register write performed after the call, if any.
    result: Option<(Register, u32)>,

    /// Values of `r4`, `r5` and `r6`.
    args: [u32; 3],
}

impl SyscallInstruction {
    /// Whether `ins` is the syscall form of `ori`.
    pub fn is_syscall(ins: &Instruction) -> bool {
        ins.opcode == Opcode::ORI && ins.op_a == Register::ZERO && ins.op_b == Register::ZERO
    }

    pub fn decode(ins: &Instruction, cpu: &Cpu) -> Self {
        Self {
            code: SyscallCode::try_from(ins.imm),
            result: None,
            args: [
                cpu.registers[Register::R4],
                cpu.registers[Register::R5],
                cpu.registers[Register::R6],
            ],
        }
    }

    pub fn code(&self) -> Option<SyscallCode> {
        self.code
    }

    fn execute_write(
        &mut self,
        logs: &mut Option<Vec<Vec<u8>>>,
        memory: &AddressSpace,
        fd: u32,
        buf_addr: u32,
        count: u32,
    ) {
        if fd != 1 && fd != 2 {
            self.result = Some((Register::R2, u32::MAX));
            return;
        }

        let result = match logs {
            Some(logger) => {
                let mut captured = Vec::new();
                let result = write_blocks(memory, buf_addr, count, |block| {
                    captured.extend_from_slice(block);
                    Ok(())
                });
                logger.push(captured);
                result
            }
            None => write_blocks(memory, buf_addr, count, |block| write_host(fd, block)),
        };
        self.result = Some((Register::R2, result));
    }

    pub fn execute(
        &mut self,
        logs: &mut Option<Vec<Vec<u8>>>,
        memory: &AddressSpace,
    ) -> SyscallOutcome {
        match self.code {
            Some(SyscallCode::Write) => {
                let [fd, buf, count] = self.args;
                self.execute_write(logs, memory, fd, buf, count);
                SyscallOutcome::Continue
            }
            Some(SyscallCode::Exit) => {
                debug!(target: LOG_TARGET, code = self.args[0], "program exit");
                SyscallOutcome::Exit(self.args[0])
            }
            Some(SyscallCode::Magic) | None => SyscallOutcome::Continue,
        }
    }

    // All the write back to registers is done in the write_back function
    pub fn write_back(&self, cpu: &mut Cpu) {
        if let Some((reg, value)) = self.result {
            cpu.registers.write(reg, value);
        }
    }

    pub fn get_result(&self) -> Option<(Register, u32)> {
        self.result
    }
}

/// Emit `count` bytes from `buf_addr` through `emit`, a block at a time.
/// Returns the byte count for `r2`.
fn write_blocks(
    memory: &AddressSpace,
    buf_addr: u32,
    count: u32,
    mut emit: impl FnMut(&[u8]) -> io::Result<()>,
) -> u32 {
    let mut block = Vec::with_capacity(WRITE_BLOCK as usize);
    let mut written = 0u32;

    while written < count {
        let len = (count - written).min(WRITE_BLOCK);
        let address = buf_addr.wrapping_add(written);
        block.clear();
        let mut readable = false;
        for i in 0..len {
            let mut byte = [0xFF];
            readable |= memory.read(address.wrapping_add(i), &mut byte, AvmFlags::DATA) == 1;
            block.push(byte[0]);
        }
        if !readable {
            debug!(target: LOG_TARGET, "write stopped at unmapped 0x{address:08x}");
            break;
        }

        if let Err(e) = emit(&block) {
            warn!(target: LOG_TARGET, "write to host failed: {e}");
            return if written == 0 { u32::MAX } else { written };
        }
        written += len;
    }
    written
}

fn write_host(fd: u32, buf: &[u8]) -> io::Result<()> {
    if fd == 1 {
        let mut out = io::stdout().lock();
        out.write_all(buf)?;
        out.flush()
    } else {
        io::stderr().lock().write_all(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ori(imm: u32) -> Instruction {
        Instruction::new_itype(Opcode::ORI, Register::ZERO, Register::ZERO, imm)
    }

    fn memory() -> AddressSpace {
        let mut memory = AddressSpace::new();
        memory
            .add_memory("data", 0x1000, AvmFlags::DATA, Some(b"hello"), 5)
            .unwrap();
        memory
    }

    #[test]
    fn test_syscall_form() {
        assert!(SyscallInstruction::is_syscall(&ori(0x10)));
        let not_syscall = Instruction::new_itype(Opcode::ORI, Register::R4, Register::ZERO, 0x10);
        assert!(!SyscallInstruction::is_syscall(&not_syscall));
    }

    #[test]
    fn test_write_captures_output() {
        let mut cpu = Cpu::default();
        cpu.registers.write(Register::R4, 1);
        cpu.registers.write(Register::R5, 0x1000);
        cpu.registers.write(Register::R6, 7);

        let mut logs = Some(Vec::new());
        let mut syscall = SyscallInstruction::decode(&ori(0x0001), &cpu);
        assert_eq!(syscall.execute(&mut logs, &memory()), SyscallOutcome::Continue);
        syscall.write_back(&mut cpu);

        // The two bytes past the section are unreadable.
        assert_eq!(logs, Some(vec![b"hello\xff\xff".to_vec()]));
        assert_eq!(cpu.registers.read(Register::R2), 7);
    }

    #[test]
    fn test_write_stops_at_unmapped_block() {
        let mut cpu = Cpu::default();
        cpu.registers.write(Register::R4, 2);
        cpu.registers.write(Register::R5, 0x1000);
        // Left at its reset value.
        cpu.registers.write(Register::R6, 0xDEAD_BEEF);

        let mut logs = Some(Vec::new());
        let mut syscall = SyscallInstruction::decode(&ori(0x0001), &cpu);
        assert_eq!(syscall.execute(&mut logs, &memory()), SyscallOutcome::Continue);
        syscall.write_back(&mut cpu);

        let mut expected = b"hello".to_vec();
        expected.resize(WRITE_BLOCK as usize, 0xFF);
        assert_eq!(logs, Some(vec![expected]));
        assert_eq!(cpu.registers.read(Register::R2), WRITE_BLOCK);

        // Nothing readable at all.
        cpu.registers.write(Register::R5, 0x8000_0000 - WRITE_BLOCK);
        let mut logs = Some(Vec::new());
        let mut syscall = SyscallInstruction::decode(&ori(0x0001), &cpu);
        syscall.execute(&mut logs, &memory());
        syscall.write_back(&mut cpu);
        assert_eq!(logs, Some(vec![vec![]]));
        assert_eq!(cpu.registers.read(Register::R2), 0);
    }

    #[test]
    fn test_write_reports_host_failure() {
        let memory = memory();
        let broken =
            |_: &[u8]| -> io::Result<()> { Err(io::Error::from(io::ErrorKind::BrokenPipe)) };
        assert_eq!(write_blocks(&memory, 0x1000, 5, broken), u32::MAX);

        // A failure after the first block reports what got out.
        let mut blocks = 0;
        let second_fails = |_: &[u8]| -> io::Result<()> {
            blocks += 1;
            if blocks == 1 {
                Ok(())
            } else {
                Err(io::Error::from(io::ErrorKind::BrokenPipe))
            }
        };
        let mut large = AddressSpace::new();
        large
            .add_memory("data", 0x1000, AvmFlags::DATA, None, 2 * WRITE_BLOCK)
            .unwrap();
        assert_eq!(
            write_blocks(&large, 0x1000, 2 * WRITE_BLOCK, second_fails),
            WRITE_BLOCK
        );
    }

    #[test]
    fn test_write_rejects_other_descriptors() {
        let mut cpu = Cpu::default();
        cpu.registers.write(Register::R4, 3);
        let mut logs = Some(Vec::new());
        let mut syscall = SyscallInstruction::decode(&ori(0x0001), &cpu);
        syscall.execute(&mut logs, &memory());
        syscall.write_back(&mut cpu);
        assert_eq!(cpu.registers.read(Register::R2), u32::MAX);
        assert_eq!(logs, Some(vec![]));
    }

    #[test]
    fn test_exit_and_no_ops() {
        let mut cpu = Cpu::default();
        cpu.registers.write(Register::R4, 0x107);
        let mut logs = None;

        let mut exit = SyscallInstruction::decode(&ori(0x0010), &cpu);
        assert_eq!(exit.execute(&mut logs, &memory()), SyscallOutcome::Exit(0x107));

        for code in [0xcafe, 0x1234] {
            let mut other = SyscallInstruction::decode(&ori(code), &cpu);
            assert_eq!(other.execute(&mut logs, &memory()), SyscallOutcome::Continue);
            assert_eq!(other.get_result(), None);
        }
    }
}
