//! Helpers shared by the workspace tests: instruction constructors in
//! assembler order, and a writer for small Nios II ELF executables.

pub mod asm;
pub mod elf;

pub use asm::assemble;
pub use elf::ElfBuilder;
