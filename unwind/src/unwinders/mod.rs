//! Frame unwinders, tried in priority order until one claims the frame.

use std::marker::PhantomData;

use nios2_common::isa::Encoding;
use tracing::debug;

use crate::{
    frame::{Frame, FrameCache},
    target::{Symbols, Target},
    LOG_TARGET,
};

mod prologue;
mod sigtramp;
mod stub;

pub use prologue::PrologueUnwinder;
pub use sigtramp::{SigtrampKind, SigtrampUnwinder};
pub use stub::StubUnwinder;

/// One strategy for finding where a frame saved its caller's registers.
pub trait FrameUnwinder<E: Encoding>: Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether this unwinder handles `frame`.
    fn sniff(&self, ctx: &Unwinder<'_, E>, frame: &Frame) -> bool;

    /// Unwind `frame`, or `None` if it is the outermost frame.
    fn unwind(&self, ctx: &Unwinder<'_, E>, frame: &Frame) -> Option<FrameCache>;
}

/// The unwinders consulted for every frame, highest priority first.
pub fn default_unwinders<E: Encoding>() -> Vec<Box<dyn FrameUnwinder<E>>> {
    vec![
        Box::new(SigtrampUnwinder),
        Box::new(StubUnwinder),
        Box::new(PrologueUnwinder),
    ]
}

/// Unwinds frames of a program through its memory and symbols.
pub struct Unwinder<'a, E: Encoding> {
    target: &'a dyn Target,
    symbols: &'a dyn Symbols,
    unwinders: Vec<Box<dyn FrameUnwinder<E>>>,
    _encoding: PhantomData<E>,
}

impl<'a, E: Encoding> Unwinder<'a, E> {
    pub fn new(target: &'a dyn Target, symbols: &'a dyn Symbols) -> Self {
        Self::with_unwinders(target, symbols, default_unwinders())
    }

    pub fn with_unwinders(
        target: &'a dyn Target,
        symbols: &'a dyn Symbols,
        unwinders: Vec<Box<dyn FrameUnwinder<E>>>,
    ) -> Self {
        Self {
            target,
            symbols,
            unwinders,
            _encoding: PhantomData,
        }
    }

    pub fn target(&self) -> &dyn Target {
        self.target
    }

    pub fn symbols(&self) -> &dyn Symbols {
        self.symbols
    }

    pub fn unwinder_names(&self) -> Vec<&'static str> {
        self.unwinders.iter().map(|u| u.name()).collect()
    }

    /// Run the first unwinder that claims `frame`.
    pub(crate) fn unwind_frame(&self, frame: &Frame) -> Option<FrameCache> {
        let unwinder = self.unwinders.iter().find(|u| u.sniff(self, frame))?;
        let cache = unwinder.unwind(self, frame);
        match &cache {
            Some(cache) => debug!(
                target: LOG_TARGET,
                level = frame.level(),
                unwinder = unwinder.name(),
                "frame id {}",
                cache.id
            ),
            None => debug!(
                target: LOG_TARGET,
                level = frame.level(),
                unwinder = unwinder.name(),
                "outermost frame"
            ),
        }
        cache
    }
}
