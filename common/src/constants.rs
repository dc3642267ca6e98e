pub const WORD_SIZE: usize = 4;
pub const INSTRUCTION_SIZE: u32 = 4;

/// The upper address bit selects the uncached alias of the lower half of the address space.
pub const UNCACHED_ADDRESS_BIT: u32 = 1 << 31;

/// Linux syscall numbers used by the signal trampolines.
pub const NR_SIGRETURN: u32 = 119;
pub const NR_RT_SIGRETURN: u32 = 173;
