use nios2_common::isa::{Encoding, Register};

use super::{FrameUnwinder, Unwinder};
use crate::{
    analyzer::analyze_prologue,
    frame::{Frame, FrameCache, FrameId, RegisterLocation},
};

/// Unwinds ordinary functions by analyzing their prologue. Accepts every
/// frame, so it goes last.
#[derive(Debug, Default, Clone, Copy)]
pub struct PrologueUnwinder;

impl<E: Encoding> FrameUnwinder<E> for PrologueUnwinder {
    fn name(&self) -> &'static str {
        "prologue"
    }

    fn sniff(&self, _ctx: &Unwinder<'_, E>, _frame: &Frame) -> bool {
        true
    }

    fn unwind(&self, ctx: &Unwinder<'_, E>, frame: &Frame) -> Option<FrameCache> {
        let start = ctx.symbols().function_start(frame.address_in_block()?)?;
        let registers = frame.registers();
        let layout = registers.layout();

        let (_, unwound) =
            analyze_prologue::<E>(ctx.target(), start, registers, frame.is_innermost());
        let unwound = unwound?;

        let id = FrameId {
            stack: unwound.cfa,
            code: start,
        };
        let mut cache = FrameCache::new(
            <Self as FrameUnwinder<E>>::name(self),
            id,
            unwound.base,
            layout.num_regs(),
        );

        for (reg, address) in unwound.saved_registers() {
            cache.set_location(reg, RegisterLocation::Memory(address));
        }
        if unwound.cfa != 0 {
            cache.set_location(Register::SP, RegisterLocation::Value(unwound.cfa));
        }

        let return_register = unwound.return_register;
        let pc_location = match unwound.saved_address(return_register) {
            Some(address) => RegisterLocation::Memory(address),
            None => RegisterLocation::InRegister(return_register),
        };
        cache.set_location(layout.pc(), pc_location);

        Some(cache)
    }
}
