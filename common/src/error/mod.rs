mod decode;
mod memory;

pub use decode::DecodeError;
pub use memory::MemoryError;
