use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MemoryError {
    // Nothing is mapped at the address, or the mapping refused the access class
    #[error("Invalid memory access: 0x{0:08X}")]
    InvalidMemoryAccess(u32),

    // Fewer bytes were transferred than requested
    #[error("Short memory access at 0x{0:08X}: {1} of {2} bytes")]
    ShortAccess(u32, usize, usize),

    // Zero-length sections are never inserted
    #[error("Empty memory section at 0x{0:08X}")]
    EmptySection(u32),

    // New section intersects an existing one
    #[error("Memory section 0x{0:08X}-0x{1:08X} overlaps an existing section")]
    SectionOverlap(u32, u32),

    // Address calculation overflow
    #[error("Address calculation overflow")]
    AddressCalculationOverflow,
}
