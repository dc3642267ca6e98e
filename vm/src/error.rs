use std::{backtrace::Backtrace, fmt::Display, panic::Location};

pub use nios2_common::error::*;

use thiserror::Error;

use crate::elf::ElfError;

#[derive(Debug)]
pub struct VMError {
    pub source: VMErrorKind,
    pub location: &'static Location<'static>,
    pub backtrace: Backtrace,
}

impl Display for VMError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{} at ", self.source)?;
        writeln!(f, "Location: {}", self.location)?;
        write!(f, "Backtrace: {}", self.backtrace)?;
        Ok(())
    }
}

impl std::error::Error for VMError {}

impl<T> From<T> for VMError
where
    T: Into<VMErrorKind>,
{
    #[track_caller]
    fn from(source: T) -> Self {
        VMError {
            source: source.into(),
            location: Location::caller(),
            backtrace: Backtrace::capture(),
        }
    }
}

impl PartialEq<VMErrorKind> for VMError {
    fn eq(&self, other: &VMErrorKind) -> bool {
        self.source == *other
    }
}

/// Host-level simulator failures.
///
/// Faults raised by the simulated program are not errors; they stop the CPU
/// with a [`StopReason`](crate::cpu::StopReason).
#[derive(Debug, Error, PartialEq)]
pub enum VMErrorKind {
    // Loading a program whose machine does not match the simulator's encoding
    #[error("Program is built for {found}, simulator runs {expected}")]
    EncodingMismatch {
        expected: &'static str,
        found: &'static str,
    },

    // Unknown simulator command
    #[error("Unknown command \"{0}\"")]
    UnknownCommand(String),

    // Unknown or malformed command option
    #[error("Invalid option for {0}: {1}")]
    InvalidOption(String, String),

    // More options than the command accepts
    #[error("too many options for {0}: {1}")]
    TooManyOptions(String, String),

    #[error("Wrapped MemoryError: {0}")]
    MemoryError(#[from] nios2_common::error::MemoryError),

    #[error("Wrapped DecodeError: {0}")]
    DecodeError(#[from] nios2_common::error::DecodeError),

    // ElfError wrapper
    #[error("Wrapped ElfError: {0}")]
    ElfError(#[from] ElfError),
}

/// Result type for VM functions that can produce errors.
pub type Result<T, E = VMError> = std::result::Result<T, E>;
