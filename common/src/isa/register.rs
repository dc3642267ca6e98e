use serde::{Deserialize, Serialize};
use std::fmt::Display;

pub const NUM_BASE_GPRS: usize = 32;

/// A register number as it appears in an instruction field or a register-file index.
///
/// General purpose registers occupy the low indices; the program counter and the
/// control registers follow, at positions given by the active
/// [`RegisterLayout`](super::RegisterLayout).
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Register(u8);

impl Register {
    pub const ZERO: Register = Register(0);
    pub const AT: Register = Register(1);
    pub const R2: Register = Register(2);
    pub const R3: Register = Register(3);
    pub const R4: Register = Register(4);
    pub const R5: Register = Register(5);
    pub const R6: Register = Register(6);
    pub const R7: Register = Register(7);
    pub const R8: Register = Register(8);
    pub const R9: Register = Register(9);
    pub const R15: Register = Register(15);
    pub const R23: Register = Register(23);
    pub const ET: Register = Register(24);
    pub const BT: Register = Register(25);
    pub const GP: Register = Register(26);
    pub const SP: Register = Register(27);
    pub const FP: Register = Register(28);
    pub const EA: Register = Register(29);
    pub const BA: Register = Register(30);
    pub const RA: Register = Register(31);

    pub const fn new(index: u8) -> Self {
        Self(index)
    }

    pub const fn index(self) -> usize {
        self.0 as usize
    }

    pub const fn number(self) -> u8 {
        self.0
    }

    /// Conventional name for a general purpose register, `None` past r31.
    pub fn abi_name(&self) -> Option<&'static str> {
        let name = match self.0 {
            0 => "zero", // Hardwired zero
            1 => "at",   // Assembler temporary
            24 => "et",  // Exception temporary
            25 => "bt",  // Breakpoint temporary
            26 => "gp",  // Global pointer
            27 => "sp",  // Stack pointer
            28 => "fp",  // Frame pointer
            29 => "ea",  // Exception return address
            30 => "ba",  // Breakpoint return address
            31 => "ra",  // Return address
            2..=23 => GPR_NAMES[self.0 as usize],
            _ => return None,
        };
        Some(name)
    }
}

const GPR_NAMES: [&str; 24] = [
    "zero", "at", "r2", "r3", "r4", "r5", "r6", "r7", "r8", "r9", "r10", "r11", "r12", "r13",
    "r14", "r15", "r16", "r17", "r18", "r19", "r20", "r21", "r22", "r23",
];

impl From<u8> for Register {
    fn from(value: u8) -> Self {
        Register(value)
    }
}

impl From<Register> for usize {
    fn from(reg: Register) -> Self {
        reg.index()
    }
}

impl Display for Register {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.abi_name() {
            Some(name) => f.write_str(name),
            None => write!(f, "r{}", self.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_from_u8() {
        assert_eq!(Register::from(0), Register::ZERO);
        assert_eq!(Register::from(27), Register::SP);
        assert_eq!(Register::from(31), Register::RA);
        assert_eq!(Register::from(45).index(), 45);
    }

    #[test]
    fn test_register_display() {
        assert_eq!(Register::ZERO.to_string(), "zero");
        assert_eq!(Register::R8.to_string(), "r8");
        assert_eq!(Register::ET.to_string(), "et");
        assert_eq!(Register::SP.to_string(), "sp");
        assert_eq!(Register::RA.to_string(), "ra");
        assert_eq!(Register::new(40).to_string(), "r40");
    }
}
