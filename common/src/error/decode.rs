use thiserror::Error;

use crate::isa::Opcode;

/// Reasons an instruction word cannot be turned into an [`Instruction`](crate::isa::Instruction).
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    // The word does not match any opcode/extension pattern
    #[error("Unimplemented instruction: 0x{0:08X}")]
    Unimplemented(u32),

    // Recognized opcode whose reserved fields are not zero
    #[error("Illegal instruction format for \"{1}\": 0x{0:08X}")]
    IllegalFormat(u32, Opcode),
}

impl DecodeError {
    pub fn word(&self) -> u32 {
        match self {
            DecodeError::Unimplemented(word) | DecodeError::IllegalFormat(word, _) => *word,
        }
    }
}
