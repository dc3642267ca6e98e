mod pc;
mod registers;

pub use pc::PC;
pub use registers::Registers;
