//! The simulated Nios II core: register file, program counter, execution
//! state and the static features of the configured CPU.

use std::fmt;

use nios2_common::{
    cpu::{Registers, PC},
    isa::{ctl, status, Opcode, Register, RegisterLayout},
};
use nios2_config::SimConfig;
use serde::Serialize;

use super::registerfile::RegisterFile;

/// Host signal numbers reported for a stopped CPU.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[repr(i32)]
pub enum Signal {
    SIGINT = 2,
    SIGILL = 4,
    SIGTRAP = 5,
    SIGBUS = 7,
    SIGSEGV = 11,
}

impl Signal {
    pub fn number(self) -> i32 {
        self as i32
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Why the CPU stopped. Faults leave `pc` at the offending instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StopReason {
    /// `break`, or the debugger breakpoint word.
    Breakpoint,
    /// `trap` with the given immediate.
    Trap(u32),
    /// Single step completed.
    Step,
    /// External interrupt request.
    Interrupted,
    /// The word matches no opcode, or needs an absent hardware feature.
    UnimplementedInstruction(u32),
    /// A known opcode with non-zero reserved fields.
    IllegalFormat(u32, Opcode),
    /// Load or store address not aligned to the access width.
    MisalignedData(u32),
    /// Control transfer to an address that is not word aligned.
    MisalignedDestination(u32),
    /// Supervisor-only instruction executed in user mode.
    SupervisorOnly(Opcode),
    /// Load or store outside the data address space.
    DataAccess(u32),
    /// Instruction fetch outside the instruction address space.
    InstructionAccess(u32),
}

impl StopReason {
    pub fn signal(&self) -> Signal {
        match self {
            StopReason::Breakpoint | StopReason::Trap(_) | StopReason::Step => Signal::SIGTRAP,
            StopReason::Interrupted => Signal::SIGINT,
            StopReason::UnimplementedInstruction(_)
            | StopReason::IllegalFormat(..)
            | StopReason::SupervisorOnly(_) => Signal::SIGILL,
            StopReason::MisalignedData(_) | StopReason::MisalignedDestination(_) => Signal::SIGBUS,
            StopReason::DataAccess(_) | StopReason::InstructionAccess(_) => Signal::SIGSEGV,
        }
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::Breakpoint => write!(f, "breakpoint"),
            StopReason::Trap(n) => write!(f, "trap {n}"),
            StopReason::Step => write!(f, "single step"),
            StopReason::Interrupted => write!(f, "interrupted"),
            StopReason::UnimplementedInstruction(word) => {
                write!(f, "unimplemented instruction 0x{word:08x}")
            }
            StopReason::IllegalFormat(word, opcode) => {
                write!(f, "illegal instruction format for \"{opcode}\": 0x{word:08x}")
            }
            StopReason::MisalignedData(addr) => write!(f, "misaligned data address 0x{addr:08x}"),
            StopReason::MisalignedDestination(addr) => {
                write!(f, "misaligned destination address 0x{addr:08x}")
            }
            StopReason::SupervisorOnly(opcode) => {
                write!(f, "supervisor-only instruction \"{opcode}\"")
            }
            StopReason::DataAccess(addr) => write!(f, "data access fault at 0x{addr:08x}"),
            StopReason::InstructionAccess(addr) => {
                write!(f, "instruction access fault at 0x{addr:08x}")
            }
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExecState {
    #[default]
    Running,
    Stopped(StopReason),
    /// Exit status, truncated to 8 bits.
    Exited(u8),
}

impl ExecState {
    /// Signal reported to a debugger, if the CPU is stopped.
    pub fn signal(&self) -> Option<Signal> {
        match self {
            ExecState::Stopped(reason) => Some(reason.signal()),
            _ => None,
        }
    }
}

/// Static properties of the simulated core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Features {
    pub hwdiv: bool,
    pub hwmul: bool,
    pub hwmulx: bool,
    pub mmu: bool,
    pub mpu: bool,
    pub cpuid: u32,
    pub reset_addr: u32,
    pub exception_addr: u32,
    pub break_addr: u32,
}

impl Default for Features {
    fn default() -> Self {
        Self::from(&SimConfig::default())
    }
}

impl From<&SimConfig> for Features {
    fn from(config: &SimConfig) -> Self {
        Self {
            hwdiv: config.hwdiv,
            hwmul: config.hwmul,
            hwmulx: config.hwmulx,
            mmu: config.mmu,
            mpu: config.mpu,
            cpuid: config.cpuid,
            reset_addr: 0,
            exception_addr: config.exception_addr,
            break_addr: config.break_addr,
        }
    }
}

/// Value general purpose registers hold after reset.
pub const RESET_GPR_VALUE: u32 = 0xDEAD_BEEF;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cpu {
    /// General purpose and control registers.
    pub registers: RegisterFile,

    /// The current program counter (PC).
    pub pc: PC,

    pub state: ExecState,

    pub features: Features,
}

impl Cpu {
    pub fn new(layout: RegisterLayout, features: Features) -> Self {
        let mut cpu = Self {
            registers: RegisterFile::new(layout),
            pc: PC::default(),
            state: ExecState::default(),
            features,
        };
        cpu.reset();
        cpu
    }

    pub fn layout(&self) -> RegisterLayout {
        self.registers.layout()
    }

    /// Reinitialize registers and state from the configured features.
    pub fn reset(&mut self) {
        let layout = self.layout();
        self.registers.clear();
        for n in 1..layout.num_gprs {
            self.registers.write(Register::new(n as u8), RESET_GPR_VALUE);
        }
        self.registers.write(layout.status(), status::RSIE);
        self.registers.write(layout.ctl(ctl::CPUID), self.features.cpuid);
        self.pc = PC::new(self.features.reset_addr);
        self.state = ExecState::Running;
    }

    /// Read any register by its register-file index, including `pc`.
    pub fn read_register(&self, reg: Register) -> Option<u32> {
        let layout = self.layout();
        if !layout.contains(reg) {
            return None;
        }
        Some(if reg == layout.pc() {
            self.pc.value
        } else {
            self.registers.read(reg)
        })
    }

    /// Write any register by its register-file index. Returns `false` for
    /// indices outside the layout.
    pub fn write_register(&mut self, reg: Register, value: u32) -> bool {
        let layout = self.layout();
        if !layout.contains(reg) {
            return false;
        }
        if reg == layout.pc() {
            self.pc = PC::new(value);
        } else {
            self.registers.write(reg, value);
        }
        true
    }

    /// Every register in register-file order.
    pub fn fetch_registers(&self) -> Vec<u32> {
        let layout = self.layout();
        (0..layout.num_regs())
            .map(|n| self.read_register(Register::new(n as u8)).unwrap_or(0))
            .collect()
    }

    pub fn ctl(&self, n: usize) -> u32 {
        self.registers.read_ctl(n)
    }

    pub fn set_ctl(&mut self, n: usize, value: u32) {
        self.registers.write_ctl(n, value);
    }

    pub fn is_user_mode(&self) -> bool {
        self.ctl(ctl::STATUS) & status::U != 0
    }
}

impl Default for Cpu {
    fn default() -> Self {
        Self::new(RegisterLayout::NIOS2, Features::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reset_values() {
        let features = Features {
            cpuid: 0x42,
            reset_addr: 0x1000,
            ..Features::default()
        };
        let mut cpu = Cpu::new(RegisterLayout::NIOS2, features);
        cpu.write_register(Register::R4, 7);
        cpu.state = ExecState::Exited(1);
        cpu.reset();

        let layout = RegisterLayout::NIOS2;
        assert_eq!(cpu.read_register(Register::ZERO), Some(0));
        assert_eq!(cpu.read_register(Register::R4), Some(RESET_GPR_VALUE));
        assert_eq!(cpu.read_register(Register::RA), Some(RESET_GPR_VALUE));
        assert_eq!(cpu.read_register(layout.pc()), Some(0x1000));
        assert_eq!(cpu.read_register(layout.status()), Some(status::RSIE));
        assert_eq!(cpu.read_register(layout.estatus()), Some(0));
        assert_eq!(cpu.read_register(layout.ctl(ctl::CPUID)), Some(0x42));
        assert_eq!(cpu.read_register(Register::new(49)), None);
        assert_eq!(cpu.state, ExecState::Running);
    }

    #[test]
    fn test_fetch_registers() {
        let cpu = Cpu::new(RegisterLayout::DPX, Features::default());
        let regs = cpu.fetch_registers();
        assert_eq!(regs.len(), 129);
        assert_eq!(regs[0], 0);
        assert_eq!(regs[63], RESET_GPR_VALUE);
        assert_eq!(regs[65], status::RSIE);
    }

    #[test]
    fn test_stop_signals() {
        assert_eq!(StopReason::Breakpoint.signal(), Signal::SIGTRAP);
        assert_eq!(StopReason::IllegalFormat(0, Opcode::ADD).signal(), Signal::SIGILL);
        assert_eq!(StopReason::MisalignedData(2).signal().number(), 7);
        assert_eq!(StopReason::DataAccess(0).signal(), Signal::SIGSEGV);
        assert_eq!(ExecState::Stopped(StopReason::Interrupted).signal(), Some(Signal::SIGINT));
        assert_eq!(ExecState::Exited(0).signal(), None);
    }
}
