//! ELF loader for Nios II executables.
//!
//! Only what the simulator and the unwinder need is kept: the entry point,
//! the `e_flags` word that selects the encoding, every `PT_LOAD` segment with
//! its file bytes, the allocated sections and the function symbols.
//!
//! ```no_run
//! use nios2_sim::elf::ElfFile;
//!
//! let elf = ElfFile::from_path("hello.elf").unwrap();
//! println!("entry 0x{:08x}", elf.entry);
//! ```

use std::path::Path;

use elf::{endian::LittleEndian, ElfBytes};
use nios2_common::isa::elf_flags::{Arch, ElfFlags};

use super::{
    error::{ElfError, Result},
    parser,
};

/// A `PT_LOAD` segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElfSegment {
    pub vaddr: u32,
    pub mem_size: u32,
    pub writable: bool,
    pub executable: bool,
    /// File contents; shorter than `mem_size` when the segment has `.bss`.
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElfSection {
    pub name: String,
    pub addr: u32,
    pub size: u32,
}

impl ElfSection {
    pub fn contains(&self, address: u32) -> bool {
        self.addr <= address && address - self.addr < self.size
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElfSymbol {
    pub name: String,
    pub value: u32,
    pub size: u32,
}

#[derive(Debug, Clone)]
pub struct ElfFile {
    /// The entrypoint of the program.
    pub entry: u32,

    pub flags: ElfFlags,

    pub segments: Vec<ElfSegment>,

    pub sections: Vec<ElfSection>,

    /// Function symbols, sorted by address.
    pub symbols: Vec<ElfSymbol>,
}

impl ElfFile {
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let elf = ElfBytes::<LittleEndian>::minimal_parse(data)?;

        parser::validate_elf_header(&elf.ehdr)?;

        let entry = elf
            .ehdr
            .e_entry
            .try_into()
            .map_err(|_| ElfError::InvalidEntryPointOffset)?;

        Ok(ElfFile {
            entry,
            flags: ElfFlags(elf.ehdr.e_flags),
            segments: parser::parse_segments(&elf)?,
            sections: parser::parse_sections(&elf)?,
            symbols: parser::parse_symbols(&elf)?,
        })
    }

    pub fn from_path<P: AsRef<Path> + ?Sized>(path: &P) -> Result<Self> {
        let data = std::fs::read(path)?;
        Self::from_bytes(&data)
    }

    pub fn arch(&self) -> Result<Arch> {
        self.flags.arch().ok_or(ElfError::UnknownArch(self.flags.0))
    }

    /// The function whose range covers `address`. Symbols without a size
    /// cover everything up to the next symbol.
    pub fn function_containing(&self, address: u32) -> Option<&ElfSymbol> {
        let index = self.symbols.partition_point(|sym| sym.value <= address);
        let sym = self.symbols[..index].last()?;
        if sym.size == 0 || address - sym.value < sym.size {
            Some(sym)
        } else {
            None
        }
    }

    pub fn symbol(&self, name: &str) -> Option<&ElfSymbol> {
        self.symbols.iter().find(|sym| sym.name == name)
    }

    pub fn section(&self, name: &str) -> Option<&ElfSection> {
        self.sections.iter().find(|section| section.name == name)
    }

    /// Whether `address` lies in a procedure linkage table.
    pub fn in_plt(&self, address: u32) -> bool {
        self.sections
            .iter()
            .any(|section| section.name.starts_with(".plt") && section.contains(address))
    }
}
