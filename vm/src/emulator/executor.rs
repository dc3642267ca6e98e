//! The simulator front end.
//!
//! A [`Simulator`] is parameterized by the instruction [`Encoding`] it runs.
//! Programs are loaded with [`Simulator::load_elf`] and driven by
//! [`Simulator::step_or_run`], which executes instructions until the CPU
//! leaves the running state, one instruction has completed in single-step
//! mode, or an [`InterruptHandle`] fires.
//!
//! ```
//! use nios2_common::isa::Nios2;
//! use nios2_config::SimConfig;
//! use nios2_sim::{cpu::ExecState, memory::AvmFlags, Simulator};
//!
//! // movi r4, 7 ; ori zero, zero, 0x10 (exit)
//! let code: Vec<u8> = [0x0100_01C4u32, 0x0000_0414]
//!     .iter()
//!     .flat_map(|w| w.to_le_bytes())
//!     .collect();
//!
//! let mut sim = Simulator::<Nios2>::new(SimConfig::default());
//! sim.memory
//!     .add_memory("text", 0x1000, AvmFlags::MASTER_MASK, Some(&code), 8)
//!     .unwrap();
//! sim.write_register(sim.layout().pc(), 0x1000);
//! assert_eq!(sim.run(), ExecState::Exited(7));
//! ```

use std::{
    marker::PhantomData,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use nios2_common::{
    error::DecodeError,
    isa::{elf_flags::Arch, Dpx, Encoding, Nios2, Register, RegisterLayout},
};
use nios2_config::SimConfig;
use tracing::{debug, trace, warn};

use super::dispatch;
use crate::{
    btrace::{BranchTrace, BtraceCommand, BTRACE_HELP},
    cpu::{instructions::Effect, Cpu, ExecState, Features, Signal, StopReason},
    elf::ElfFile,
    error::{Result, VMErrorKind},
    memory::{AddressSpace, AvmFlags},
    LOG_TARGET,
};

/// Requests that a running simulator stop before its next instruction.
#[derive(Debug, Clone)]
pub struct InterruptHandle(Arc<AtomicBool>);

impl InterruptHandle {
    pub fn interrupt(&self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

#[derive(Debug)]
pub struct Simulator<E: Encoding = Nios2> {
    pub cpu: Cpu,

    pub memory: AddressSpace,

    btrace: BranchTrace,

    config: SimConfig,

    interrupt: Arc<AtomicBool>,

    /// Captured `write` syscall output. Printed to the host when `None`.
    logs: Option<Vec<Vec<u8>>>,

    program: Option<ElfFile>,

    _encoding: PhantomData<E>,
}

impl<E: Encoding> Default for Simulator<E> {
    fn default() -> Self {
        Self::new(SimConfig::default())
    }
}

impl<E: Encoding> Simulator<E> {
    pub fn new(config: SimConfig) -> Self {
        Self {
            cpu: Cpu::new(E::LAYOUT, Features::from(&config)),
            memory: AddressSpace::new(),
            btrace: BranchTrace::new(config.btrace_mode, config.btrace_size),
            config,
            interrupt: Arc::new(AtomicBool::new(false)),
            logs: None,
            program: None,
            _encoding: PhantomData,
        }
    }

    /// Capture program output instead of printing it.
    pub fn with_logs(mut self) -> Self {
        self.logs = Some(Vec::new());
        self
    }

    pub fn logs(&self) -> Option<&[Vec<u8>]> {
        self.logs.as_deref()
    }

    pub fn layout(&self) -> RegisterLayout {
        E::LAYOUT
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn btrace(&self) -> &BranchTrace {
        &self.btrace
    }

    /// The loaded executable, if any.
    pub fn program(&self) -> Option<&ElfFile> {
        self.program.as_ref()
    }

    /// Replace the address space with the program's segments, map the heap
    /// and stack, and reset the CPU at the program's entry point.
    pub fn load_elf(&mut self, elf: &ElfFile) -> Result<()> {
        let found = match elf.arch()? {
            Arch::Nios2 => Nios2::NAME,
            Arch::Dpx => Dpx::NAME,
        };
        if found != E::NAME {
            Err(VMErrorKind::EncodingMismatch {
                expected: E::NAME,
                found,
            })?;
        }

        self.memory.clear_sections();
        for segment in &elf.segments {
            let mut flags = AvmFlags::INSTRUCTION | AvmFlags::DATA;
            if !segment.writable {
                flags |= AvmFlags::READONLY;
            }
            self.memory
                .add_memory("", segment.vaddr, flags, None, segment.mem_size)?;

            // Anything past the file contents is .bss.
            let mut image = segment.data.clone();
            image.resize(segment.mem_size as usize, 0);
            self.memory.force_write(segment.vaddr, &image, AvmFlags::DATA);
            debug!(
                target: LOG_TARGET,
                "loaded segment 0x{:08x}-0x{:08x}",
                segment.vaddr,
                segment.vaddr.wrapping_add(segment.mem_size)
            );
        }

        let heap_base = self
            .memory
            .end_address(AvmFlags::INSTRUCTION | AvmFlags::DATA);
        self.add_optional_section("heap", heap_base, self.config.heap_size);
        self.add_optional_section("stack", self.config.stack_base, self.config.stack_size);

        self.cpu.features.reset_addr = elf.entry;
        self.program = Some(elf.clone());
        self.reset();
        Ok(())
    }

    /// Heap and stack are best effort; the program may already cover them.
    fn add_optional_section(&mut self, name: &str, base: u32, size: u32) {
        if size == 0 {
            return;
        }
        let flags = AvmFlags::INSTRUCTION | AvmFlags::DATA;
        if let Err(e) = self.memory.add_memory(name, base, flags, None, size) {
            warn!(target: LOG_TARGET, "cannot map {name} at 0x{base:08x}: {e}");
        }
    }

    /// Reinitialize the CPU from the configured features.
    pub fn reset(&mut self) {
        self.cpu.reset();
        self.interrupt.store(false, Ordering::SeqCst);
    }

    pub fn step(&mut self) -> ExecState {
        self.step_or_run(true)
    }

    pub fn run(&mut self) -> ExecState {
        self.step_or_run(false)
    }

    /// Execute until the CPU stops or exits, or for one instruction when
    /// `single_step` is set. An exited CPU stays exited.
    pub fn step_or_run(&mut self, single_step: bool) -> ExecState {
        if let ExecState::Exited(_) = self.cpu.state {
            return self.cpu.state;
        }

        self.cpu.state = ExecState::Running;
        loop {
            if self.interrupt.swap(false, Ordering::SeqCst) {
                self.stop_with(StopReason::Interrupted);
                break;
            }

            self.execute_instruction();
            if self.cpu.state != ExecState::Running {
                break;
            }

            if single_step {
                self.cpu.state = ExecState::Stopped(StopReason::Step);
                break;
            }
        }
        self.cpu.state
    }

    fn stop_with(&mut self, reason: StopReason) {
        debug!(
            target: LOG_TARGET,
            signal = %reason.signal(),
            "stopped at 0x{:08x}: {reason}",
            self.cpu.pc.value
        );
        self.cpu.state = ExecState::Stopped(reason);
    }

    /// Fetch, decode and execute the instruction at `pc`.
    fn execute_instruction(&mut self) {
        let pc = self.cpu.pc.value;
        let word = match self.memory.read_u32(pc, AvmFlags::INSTRUCTION) {
            Ok(word) => word,
            Err(_) => return self.stop_with(StopReason::InstructionAccess(pc)),
        };

        let ins = match E::decode(word) {
            Ok(ins) => ins,
            Err(DecodeError::Unimplemented(word)) => {
                return self.stop_with(StopReason::UnimplementedInstruction(word))
            }
            Err(DecodeError::IllegalFormat(word, opcode)) => {
                return self.stop_with(StopReason::IllegalFormat(word, opcode))
            }
        };
        trace!(target: LOG_TARGET, "0x{pc:08x}: {ins}");

        match dispatch::execute::<E>(&mut self.cpu, &mut self.memory, &mut self.logs, &ins, word) {
            Effect::Next => self.cpu.pc.step(),
            Effect::Jump(target) => {
                self.btrace.record(pc, target);
                self.cpu.pc.jump(target);
            }
            Effect::Stop(reason) => self.stop_with(reason),
            Effect::Exit(code) => {
                self.cpu.pc.step();
                debug!(target: LOG_TARGET, code, "exited");
                self.cpu.state = ExecState::Exited(code as u8);
            }
        }
    }

    pub fn interrupt_handle(&self) -> InterruptHandle {
        InterruptHandle(self.interrupt.clone())
    }

    /// Ask the run loop to stop before the next instruction.
    pub fn stop(&self) {
        self.interrupt.store(true, Ordering::SeqCst);
    }

    pub fn stop_reason(&self) -> (ExecState, Option<Signal>) {
        (self.cpu.state, self.cpu.state.signal())
    }

    pub fn read_register(&self, reg: Register) -> Option<u32> {
        self.cpu.read_register(reg)
    }

    pub fn write_register(&mut self, reg: Register, value: u32) -> bool {
        self.cpu.write_register(reg, value)
    }

    pub fn fetch_registers(&self) -> Vec<u32> {
        self.cpu.fetch_registers()
    }

    /// Debugger read; returns the number of bytes read.
    pub fn read_memory(&self, address: u32, buf: &mut [u8]) -> usize {
        self.memory.read(address, buf, AvmFlags::DATA)
    }

    /// Debugger write. Read-only sections accept it, so breakpoints can be
    /// planted in code.
    pub fn write_memory(&mut self, address: u32, buf: &[u8]) -> usize {
        self.memory.force_write(address, buf, AvmFlags::DATA)
    }

    /// Run a simulator command line such as `btrace show 10`.
    pub fn do_command(&mut self, command: &str) -> Result<String> {
        let mut words = command.split_whitespace();
        match words.next() {
            Some("btrace") => match BtraceCommand::parse(words)? {
                BtraceCommand::Help => Ok(BTRACE_HELP.to_string()),
                BtraceCommand::Init { mode, size } => {
                    self.btrace = BranchTrace::new(mode, size);
                    Ok(String::new())
                }
                BtraceCommand::Show { limit } => Ok(self.btrace.show(limit)),
            },
            Some("info") => match words.next() {
                None => Ok(self.info(false)),
                Some("verbose") => Ok(self.info(true)),
                Some(other) => Err(VMErrorKind::InvalidOption("info".into(), other.into()))?,
            },
            _ => Err(VMErrorKind::UnknownCommand(command.trim().to_string()))?,
        }
    }

    /// Summary of the simulated CPU and its memory map.
    pub fn info(&self, verbose: bool) -> String {
        let features = &self.cpu.features;
        let mut out = format!(
            "encoding: {}\nstate: {:?}\nhwdiv: {}, hwmul: {}, hwmulx: {}, mmu: {}, mpu: {}\n\
             reset: 0x{:08x}, exception: 0x{:08x}, break: 0x{:08x}\n",
            E::NAME,
            self.cpu.state,
            features.hwdiv,
            features.hwmul,
            features.hwmulx,
            features.mmu,
            features.mpu,
            features.reset_addr,
            features.exception_addr,
            features.break_addr,
        );
        out.push_str(&self.memory.dump_sections(verbose));
        out
    }
}

#[cfg(test)]
mod tests {
    use nios2_common::isa::Register;
    use nios2_common_testing::asm::{self, assemble};

    use super::*;

    fn simulator(program: &[nios2_common::isa::Instruction]) -> Simulator<Nios2> {
        let code = assemble::<Nios2>(program);
        let mut sim = Simulator::<Nios2>::default().with_logs();
        sim.memory
            .add_memory("text", 0x1000, AvmFlags::MASTER_MASK, Some(&code), code.len() as u32)
            .unwrap();
        sim.memory
            .add_memory("data", 0x8000, AvmFlags::DATA, None, 0x100)
            .unwrap();
        sim.write_register(sim.layout().pc(), 0x1000);
        sim
    }

    #[test]
    fn test_single_step() {
        let mut sim = simulator(&[asm::movi(Register::R4, 1), asm::movi(Register::R5, 2)]);
        assert_eq!(sim.step(), ExecState::Stopped(StopReason::Step));
        assert_eq!(sim.read_register(Register::R4), Some(1));
        assert_eq!(sim.cpu.pc.value, 0x1004);
        assert_eq!(sim.stop_reason(), (ExecState::Stopped(StopReason::Step), Some(Signal::SIGTRAP)));
    }

    #[test]
    fn test_fetch_outside_memory() {
        let mut sim = simulator(&[asm::nop()]);
        assert_eq!(sim.run(), ExecState::Stopped(StopReason::InstructionAccess(0x1004)));
        assert_eq!(sim.cpu.pc.value, 0x1004);
    }

    #[test]
    fn test_interrupt_before_next_instruction() {
        let mut sim = simulator(&[asm::br(-4)]);
        let handle = sim.interrupt_handle();
        handle.interrupt();
        assert_eq!(sim.run(), ExecState::Stopped(StopReason::Interrupted));
        assert_eq!(sim.cpu.pc.value, 0x1000);
        assert_eq!(sim.stop_reason().1, Some(Signal::SIGINT));

        // The request is consumed.
        assert_eq!(sim.step(), ExecState::Stopped(StopReason::Step));
        assert_eq!(sim.cpu.pc.value, 0x1000);
    }

    #[test]
    fn test_exited_stays_exited() {
        let mut sim = simulator(&[asm::movi(Register::R4, 3), asm::syscall(0x0010)]);
        assert_eq!(sim.run(), ExecState::Exited(3));
        assert_eq!(sim.run(), ExecState::Exited(3));
        assert_eq!(sim.stop_reason(), (ExecState::Exited(3), None));
    }

    #[test]
    fn test_branch_trace_records_jumps() {
        let mut sim = simulator(&[
            asm::br(0),
            asm::call(0x100C),
            asm::trap(0),
            asm::ret(),
        ]);
        assert_eq!(sim.run(), ExecState::Stopped(StopReason::Trap(0)));
        assert_eq!(sim.cpu.pc.value, 0x1008);
        let show = sim.do_command("btrace show").unwrap();
        assert!(show.contains("-00003 0x00001000 0x00001004"));
        assert!(show.contains("-00002 0x00001004 0x0000100c"));
        assert!(show.contains("-00001 0x0000100c 0x00001008"));
    }

    #[test]
    fn test_commands() {
        let mut sim = simulator(&[asm::nop()]);
        assert_eq!(sim.do_command("btrace").unwrap(), BTRACE_HELP);
        assert_eq!(sim.do_command("btrace init linear 4").unwrap(), "");
        assert_eq!(sim.btrace().size(), 4);
        assert!(sim.do_command("info").unwrap().contains("sections: 2"));
        assert_eq!(
            sim.do_command("frobnicate").unwrap_err(),
            VMErrorKind::UnknownCommand("frobnicate".into())
        );
    }

    #[test]
    fn test_debugger_memory_access() {
        let mut sim = simulator(&[asm::nop()]);
        sim.memory
            .add_memory("rom", 0x9000, AvmFlags::DATA | AvmFlags::READONLY, None, 4)
            .unwrap();
        assert_eq!(sim.write_memory(0x9000, &Nios2::BREAKPOINT.to_le_bytes()), 4);
        let mut buf = [0; 8];
        assert_eq!(sim.read_memory(0x9000, &mut buf), 4);
        assert_eq!(u32::from_le_bytes(buf[..4].try_into().unwrap()), Nios2::BREAKPOINT);
    }
}
