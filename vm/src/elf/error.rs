use thiserror::Error;

/// Failures while reading a Nios II executable.
#[derive(Debug, Error)]
pub enum ElfError {
    #[error("not a 32-bit ELF file")]
    Not32Bit,

    /// `e_machine` is not `EM_ALTERA_NIOS2`.
    #[error("not a Nios II ELF file (e_machine {0})")]
    NotNios2(u16),

    #[error("not an executable ELF file")]
    NotExecutable,

    #[error("unknown Nios II architecture in e_flags 0x{0:08x}")]
    UnknownArch(u32),

    /// A segment or the entry point lies outside the 32-bit address space.
    #[error("invalid virtual address 0x{0:x}")]
    InvalidVirtualAddress(u64),

    #[error("segment memory size does not fit in 32 bits")]
    InvalidMemorySize,

    /// `p_filesz` is larger than `p_memsz`.
    #[error("segment size exceeds memory size")]
    SegmentSizeExceedsMemorySize,

    #[error("entry point does not fit in 32 bits")]
    InvalidEntryPointOffset,

    #[error("no program headers")]
    NoProgramHeader,

    /// No `PT_LOAD` segment.
    #[error("no loadable segment")]
    NoSegmentAvailable,

    #[error(transparent)]
    Parse(#[from] elf::ParseError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl PartialEq for ElfError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Parse(a), Self::Parse(b)) => a.to_string() == b.to_string(),
            (Self::Io(a), Self::Io(b)) => a.kind() == b.kind(),
            (Self::NotNios2(a), Self::NotNios2(b)) => a == b,
            (Self::UnknownArch(a), Self::UnknownArch(b)) => a == b,
            (Self::InvalidVirtualAddress(a), Self::InvalidVirtualAddress(b)) => a == b,
            (a, b) => std::mem::discriminant(a) == std::mem::discriminant(b),
        }
    }
}

pub type Result<T, E = ElfError> = std::result::Result<T, E>;
