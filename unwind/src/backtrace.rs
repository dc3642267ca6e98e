use std::{collections::HashSet, fmt};

use nios2_common::isa::{Encoding, Register};
use serde::Serialize;
use tracing::debug;

use crate::{
    frame::{Frame, FrameId},
    target::RegisterSet,
    unwinders::Unwinder,
    LOG_TARGET,
};

/// Frames deeper than this are not walked.
pub const DEFAULT_DEPTH_LIMIT: usize = 256;

/// One line of a backtrace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BacktraceFrame {
    pub level: usize,
    pub pc: u32,
    pub sp: Option<u32>,
    pub function: Option<String>,
    pub id: Option<FrameId>,
    pub unwinder: Option<&'static str>,
}

impl fmt::Display for BacktraceFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:<3} 0x{:08x} in ", self.level, self.pc)?;
        match &self.function {
            Some(name) => write!(f, "{name} ()"),
            None => write!(f, "?? ()"),
        }
    }
}

impl<E: Encoding> Unwinder<'_, E> {
    /// Walk the stack outwards from `registers`, innermost frame first.
    ///
    /// The walk stops at the outermost frame, when a caller repeats a frame
    /// already seen, or after `limit` frames.
    pub fn backtrace(&self, registers: RegisterSet, limit: usize) -> Vec<BacktraceFrame> {
        let mut frames = Vec::new();
        let mut seen = HashSet::new();
        let mut frame = Frame::innermost(registers);

        while frames.len() < limit {
            let Some(pc) = frame.pc() else {
                break;
            };
            let cache = frame.cache(self);
            let id = cache.map(|cache| cache.id);
            if let Some(id) = id {
                if !seen.insert(id) {
                    debug!(target: LOG_TARGET, "frame {id} repeats; stack corrupt?");
                    break;
                }
            }
            frames.push(BacktraceFrame {
                level: frame.level(),
                pc,
                sp: frame.registers().value(Register::SP),
                function: frame
                    .address_in_block()
                    .and_then(|address| self.symbols().function_name(address))
                    .map(str::to_owned),
                id,
                unwinder: cache.map(|cache| cache.unwinder),
            });
            if id.is_none() {
                break;
            }

            let Some(caller) = frame.caller(self) else {
                break;
            };
            if caller.pc().unwrap_or(0) == 0 {
                break;
            }
            frame = caller;
        }

        frames
    }
}
