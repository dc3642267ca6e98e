pub mod instructions;
mod registerfile;
mod state;

pub use registerfile::RegisterFile;
pub use state::{Cpu, ExecState, Features, Signal, StopReason, RESET_GPR_VALUE};
