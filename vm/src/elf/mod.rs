mod error;
mod loader;
mod parser;

pub use error::ElfError;
pub use loader::{ElfFile, ElfSection, ElfSegment, ElfSymbol};
