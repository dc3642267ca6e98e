//! Calling-convention helpers.

use nios2_common::isa::Register;

use crate::{error::Result, target::RegisterSet};

/// Values longer than this are returned through memory.
pub const MAX_REGISTER_RETURN: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnConvention {
    /// In `r2`, and `r3` for the upper word.
    Register,
    /// Through a caller-provided buffer.
    Struct,
}

pub fn return_convention(len: usize) -> ReturnConvention {
    if len > MAX_REGISTER_RETURN {
        ReturnConvention::Struct
    } else {
        ReturnConvention::Register
    }
}

/// Copy a `len`-byte return value out of `r2`/`r3`, little-endian.
pub fn extract_return_value(registers: &RegisterSet, len: usize) -> Result<Vec<u8>> {
    let mut bytes = registers.get(Register::R2)?.to_le_bytes().to_vec();
    if len > 4 {
        bytes.extend(registers.get(Register::R3)?.to_le_bytes());
    }
    bytes.truncate(len.min(MAX_REGISTER_RETURN));
    Ok(bytes)
}

/// Place a return value of up to 8 bytes in `r2`/`r3`.
pub fn store_return_value(registers: &mut RegisterSet, value: &[u8]) {
    let word = |bytes: &[u8]| {
        let mut buf = [0; 4];
        buf[..bytes.len()].copy_from_slice(bytes);
        u32::from_le_bytes(buf)
    };
    let (low, high) = value.split_at(value.len().min(4));
    registers.set(Register::R2, Some(word(low)));
    if !high.is_empty() {
        registers.set(Register::R3, Some(word(&high[..high.len().min(4)])));
    }
}

/// Stack frames are word aligned.
pub fn frame_align(addr: u32) -> u32 {
    addr & !3
}
