//! Linux signal trampolines: `movi r2, __NR_[rt_]sigreturn; trap`.
//!
//! The interrupted registers sit in the signal frame just above the
//! trampoline, in `struct sigcontext` order.

use nios2_common::{
    constants::{INSTRUCTION_SIZE, NR_RT_SIGRETURN, NR_SIGRETURN},
    isa::{Encoding, Register},
};

use super::{FrameUnwinder, Unwinder};
use crate::{
    frame::{Frame, FrameCache, FrameId, RegisterLocation},
    target::Target,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SigtrampKind {
    Sigreturn,
    RtSigreturn,
}

impl SigtrampKind {
    fn syscall(self) -> u32 {
        match self {
            SigtrampKind::Sigreturn => NR_SIGRETURN,
            SigtrampKind::RtSigreturn => NR_RT_SIGRETURN,
        }
    }
}

/// Find the trampoline containing `pc`, returning its kind and first
/// instruction.
pub fn find_trampoline<E: Encoding>(target: &dyn Target, pc: u32) -> Option<(SigtrampKind, u32)> {
    let read = |addr: u32| target.read_u32(addr).ok();
    for kind in [SigtrampKind::Sigreturn, SigtrampKind::RtSigreturn] {
        let [movi, trap] = E::sigreturn_trampoline(kind.syscall());
        for func in [pc, pc.wrapping_sub(INSTRUCTION_SIZE)] {
            if read(func) == Some(movi) && read(func.wrapping_add(INSTRUCTION_SIZE)) == Some(trap) {
                return Some((kind, func));
            }
        }
    }
    None
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SigtrampUnwinder;

impl SigtrampUnwinder {
    pub const NAME: &'static str = "sigtramp";
}

impl<E: Encoding> FrameUnwinder<E> for SigtrampUnwinder {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn sniff(&self, ctx: &Unwinder<'_, E>, frame: &Frame) -> bool {
        frame
            .pc()
            .is_some_and(|pc| find_trampoline::<E>(ctx.target(), pc).is_some())
    }

    fn unwind(&self, ctx: &Unwinder<'_, E>, frame: &Frame) -> Option<FrameCache> {
        let (kind, func) = find_trampoline::<E>(ctx.target(), frame.pc()?)?;
        let registers = frame.registers();
        let layout = registers.layout();
        let name = <Self as FrameUnwinder<E>>::name(self);
        let word = |base: u32, n: u32| RegisterLocation::Memory(base.wrapping_add(n * 4));

        let cache = match kind {
            SigtrampKind::Sigreturn => {
                let base = func.wrapping_add(16);
                let id = FrameId {
                    stack: base,
                    code: func,
                };
                let mut cache = FrameCache::new(name, id, base, layout.num_regs());
                for i in 0..8 {
                    cache.set_location(Register::new(8 + i as u8), word(base, i));
                }
                for i in 0..7 {
                    cache.set_location(Register::new(1 + i as u8), word(base, i + 8));
                }
                cache.set_location(Register::RA, word(base, 16));
                cache.set_location(Register::FP, word(base, 17));
                cache.set_location(Register::SP, word(base, 18));
                cache.set_location(Register::GP, word(base, 19));
                cache.set_location(layout.estatus(), word(base, 20));
                cache.set_location(layout.pc(), word(base, 21));
                cache
            }
            SigtrampKind::RtSigreturn => {
                let sp = registers.value(Register::SP)?;
                let base = func.wrapping_add(41 * 4);
                let id = FrameId {
                    stack: sp,
                    code: func,
                };
                let mut cache = FrameCache::new(name, id, base, layout.num_regs());
                for i in 0..23 {
                    cache.set_location(Register::new(1 + i as u8), word(base, i));
                }
                cache.set_location(Register::RA, word(base, 23));
                cache.set_location(Register::FP, word(base, 24));
                cache.set_location(Register::GP, word(base, 25));
                cache.set_location(layout.pc(), word(base, 27));
                cache.set_location(Register::SP, word(base, 28));
                cache
            }
        };
        Some(cache)
    }
}
