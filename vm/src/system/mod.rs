mod syscall;

pub use syscall::{SyscallCode, SyscallInstruction, SyscallOutcome};
