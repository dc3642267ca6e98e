use nios2_common::isa::{Encoding, Register};

use super::{FrameUnwinder, Unwinder};
use crate::frame::{Frame, FrameCache, FrameId, RegisterLocation};

/// Unwinds PLT stubs, which jump on without touching the stack.
#[derive(Debug, Default, Clone, Copy)]
pub struct StubUnwinder;

impl<E: Encoding> FrameUnwinder<E> for StubUnwinder {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn sniff(&self, ctx: &Unwinder<'_, E>, frame: &Frame) -> bool {
        frame
            .address_in_block()
            .is_some_and(|address| ctx.symbols().in_plt(address))
    }

    fn unwind(&self, ctx: &Unwinder<'_, E>, frame: &Frame) -> Option<FrameCache> {
        let registers = frame.registers();
        let address = frame.address_in_block()?;
        let sp = registers.value(Register::SP)?;
        let start = ctx.symbols().function_start(address).unwrap_or(frame.pc()?);

        let id = FrameId {
            stack: sp,
            code: start,
        };
        let layout = registers.layout();
        let mut cache =
            FrameCache::new(<Self as FrameUnwinder<E>>::name(self), id, sp, layout.num_regs());
        cache.set_location(layout.pc(), RegisterLocation::InRegister(Register::RA));
        Some(cache)
    }
}
