use nios2_common::isa::Register;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum UnwindError {
    #[error("cannot read {len} bytes of target memory at 0x{address:08x}")]
    MemoryRead { address: u32, len: usize },

    #[error("value of {0} is not available")]
    RegisterUnavailable(Register),

    #[error("register set holds {found} values, layout needs {expected}")]
    RegisterCount { expected: usize, found: usize },
}

pub type Result<T, E = UnwindError> = std::result::Result<T, E>;
