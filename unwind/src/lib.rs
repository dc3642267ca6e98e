//! Stack unwinding for Nios II and Nios II/DPX programs.
//!
//! Frames are unwound without debug information: ordinary functions by
//! symbolically executing their prologue ([`analyzer`]), Linux signal
//! trampolines and PLT stubs by their fixed layouts. Each frame is handled
//! by the first unwinder in [`unwinders::default_unwinders`] that claims it.
//!
//! ```ignore
//! let unwinder = Unwinder::<Nios2>::new(&sim, program);
//! for frame in unwinder.backtrace(RegisterSet::from_simulator(&sim)?, DEFAULT_DEPTH_LIMIT) {
//!     println!("{frame}");
//! }
//! ```

pub mod abi;
pub mod analyzer;
pub mod backtrace;
pub mod error;
pub mod frame;
pub mod regset;
pub mod step;
pub mod target;
pub mod unwinders;

pub use analyzer::{analyze_prologue, skip_prologue};
pub use backtrace::{BacktraceFrame, DEFAULT_DEPTH_LIMIT};
pub use frame::{Frame, FrameCache, FrameId, RegisterLocation};
pub use step::next_pc;
pub use target::{NoSymbols, RegisterSet, Symbols, Target};
pub use unwinders::Unwinder;

pub(crate) const LOG_TARGET: &str = "nios2::unwind";
